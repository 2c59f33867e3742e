use super::LabApi;
use crate::errors::ServiceError;
use crate::models::lenient::normalize_text;
use crate::models::{
    Attachment, CustomerId, CustomerInput, CustomerRequest, NewOrderParameter, NewQuotation,
    Order, OrderForm, OrderId, OrderParameter, OrderParameterId, Parameter, ParameterId,
    ParameterInput, Quotation, QuotationId, ResultUpdate, Sample, SampleId, SampleInput,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use tokio::sync::RwLock;
use tracing::debug;

/// Calls that can be made to fail on purpose.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FailurePoint {
    ListParameters,
    CreateParameter(String),
    CreateCustomer,
    UpdateCustomer,
    DeleteCustomer,
    CreateOrder,
    UpdateOrder,
    DeleteOrder,
    CreateQuotation,
    DeleteQuotation,
    CreateOrderParameter(ParameterId),
    UpdateResult(ParameterId),
    DeleteSample,
}

#[derive(Default)]
struct Store {
    next_id: i64,
    parameters: BTreeMap<ParameterId, Parameter>,
    customers: BTreeMap<CustomerId, CustomerRequest>,
    orders: BTreeMap<OrderId, Order>,
    documents: BTreeMap<OrderId, Attachment>,
    quotations: BTreeMap<QuotationId, Quotation>,
    order_parameters: BTreeMap<OrderParameterId, OrderParameter>,
    samples: BTreeMap<SampleId, Sample>,
}

impl Store {
    fn allocate(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// A `LabApi` that keeps everything in memory.
///
/// Deletes honour the same foreign keys as the relational store behind the
/// real API: a record still referenced by a child is refused with 409.
#[derive(Default)]
pub struct InMemoryLabApi {
    store: RwLock<Store>,
    failures: RwLock<HashSet<FailurePoint>>,
}

fn not_found(what: &str, id: i64) -> ServiceError {
    ServiceError::Api {
        status: 404,
        body: format!("{{\"detail\":\"{} {} not found\"}}", what, id),
    }
}

fn still_referenced(what: &str, id: i64, by: &str) -> ServiceError {
    ServiceError::Api {
        status: 409,
        body: format!(
            "{{\"detail\":\"{} {} is still referenced by {}\"}}",
            what, id, by
        ),
    }
}

impl InMemoryLabApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the catalog, keeping the given ids.
    pub async fn with_parameters(parameters: Vec<Parameter>) -> Self {
        let api = Self::new();
        {
            let mut store = api.store.write().await;
            for parameter in parameters {
                store.next_id = store.next_id.max(parameter.id);
                store.parameters.insert(parameter.id, parameter);
            }
        }
        api
    }

    pub async fn fail_on(&self, point: FailurePoint) {
        self.failures.write().await.insert(point);
    }

    pub async fn clear_failures(&self) {
        self.failures.write().await.clear();
    }

    async fn check(&self, point: FailurePoint) -> Result<(), ServiceError> {
        if self.failures.read().await.contains(&point) {
            debug!(?point, "injected failure");
            return Err(ServiceError::Api {
                status: 500,
                body: format!("injected failure: {:?}", point),
            });
        }
        Ok(())
    }

    pub async fn document(&self, order_id: OrderId) -> Option<Attachment> {
        self.store.read().await.documents.get(&order_id).cloned()
    }

    pub async fn all_order_parameters(&self) -> Vec<OrderParameter> {
        self.store
            .read()
            .await
            .order_parameters
            .values()
            .cloned()
            .collect()
    }
}

#[async_trait]
impl LabApi for InMemoryLabApi {
    async fn list_parameters(&self) -> Result<Vec<Parameter>, ServiceError> {
        self.check(FailurePoint::ListParameters).await?;
        Ok(self.store.read().await.parameters.values().cloned().collect())
    }

    async fn get_parameter(&self, id: ParameterId) -> Result<Option<Parameter>, ServiceError> {
        Ok(self.store.read().await.parameters.get(&id).cloned())
    }

    async fn create_parameter(&self, input: &ParameterInput) -> Result<Parameter, ServiceError> {
        self.check(FailurePoint::CreateParameter(input.name.clone()))
            .await?;
        let mut store = self.store.write().await;
        if let Some(parent) = input.parent_id {
            if !store.parameters.contains_key(&parent) {
                return Err(not_found("parent parameter", parent));
            }
        }
        let id = store.allocate();
        let parameter = Parameter::from_input(id, input);
        store.parameters.insert(id, parameter.clone());
        Ok(parameter)
    }

    async fn update_parameter(
        &self,
        id: ParameterId,
        input: &ParameterInput,
    ) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        let existing = store
            .parameters
            .get_mut(&id)
            .ok_or_else(|| not_found("parameter", id))?;
        let mut updated = Parameter::from_input(id, input);
        updated.is_active = existing.is_active;
        updated.is_delete = existing.is_delete;
        *existing = updated;
        Ok(())
    }

    async fn delete_parameter(&self, id: ParameterId) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        if store.parameters.values().any(|p| p.parent_id == Some(id)) {
            return Err(still_referenced("parameter", id, "child parameters"));
        }
        store
            .parameters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("parameter", id))
    }

    async fn list_customers(&self) -> Result<Vec<CustomerRequest>, ServiceError> {
        Ok(self.store.read().await.customers.values().cloned().collect())
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRequest>, ServiceError> {
        Ok(self.store.read().await.customers.get(&id).cloned())
    }

    async fn create_customer(
        &self,
        input: &CustomerInput,
    ) -> Result<CustomerRequest, ServiceError> {
        self.check(FailurePoint::CreateCustomer).await?;
        let mut store = self.store.write().await;
        let id = store.allocate();
        let customer = CustomerRequest::from_input(id, input);
        store.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn update_customer(
        &self,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<(), ServiceError> {
        self.check(FailurePoint::UpdateCustomer).await?;
        let mut store = self.store.write().await;
        let existing = store
            .customers
            .get_mut(&id)
            .ok_or_else(|| not_found("customer request", id))?;
        *existing = CustomerRequest::from_input(id, input);
        Ok(())
    }

    async fn delete_customer(&self, id: CustomerId) -> Result<(), ServiceError> {
        self.check(FailurePoint::DeleteCustomer).await?;
        let mut store = self.store.write().await;
        if store.orders.values().any(|o| o.customer_id == id) {
            return Err(still_referenced("customer request", id, "an order"));
        }
        store
            .customers
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("customer request", id))
    }

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        Ok(self.store.read().await.orders.values().cloned().collect())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ServiceError> {
        Ok(self.store.read().await.orders.get(&id).cloned())
    }

    async fn orders_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .store
            .read()
            .await
            .orders
            .values()
            .filter(|o| o.customer_id == customer_id)
            .cloned()
            .collect())
    }

    async fn create_order(
        &self,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<Order, ServiceError> {
        self.check(FailurePoint::CreateOrder).await?;
        let mut store = self.store.write().await;
        if !store.customers.contains_key(&form.customer_id) {
            return Err(not_found("customer request", form.customer_id));
        }
        let id = store.allocate();
        let order = Order::from_form(id, form, document);
        store.orders.insert(id, order.clone());
        if let Some(doc) = document {
            store.documents.insert(id, doc.clone());
        }
        Ok(order)
    }

    async fn update_order(
        &self,
        id: OrderId,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<(), ServiceError> {
        self.check(FailurePoint::UpdateOrder).await?;
        let mut store = self.store.write().await;
        let existing = store
            .orders
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("order", id))?;
        let mut updated = Order::from_form(id, form, document);
        if document.is_none() {
            updated.order_req_doc = existing.order_req_doc;
        }
        store.orders.insert(id, updated);
        if let Some(doc) = document {
            store.documents.insert(id, doc.clone());
        }
        Ok(())
    }

    async fn delete_order(&self, id: OrderId) -> Result<(), ServiceError> {
        self.check(FailurePoint::DeleteOrder).await?;
        let mut store = self.store.write().await;
        if store.samples.values().any(|s| s.order_id == id) {
            return Err(still_referenced("order", id, "samples"));
        }
        if store.quotations.values().any(|q| q.order_id == Some(id)) {
            return Err(still_referenced("order", id, "a quotation"));
        }
        store.documents.remove(&id);
        store
            .orders
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("order", id))
    }

    async fn list_quotations(&self) -> Result<Vec<Quotation>, ServiceError> {
        Ok(self.store.read().await.quotations.values().cloned().collect())
    }

    async fn create_quotation(
        &self,
        quotation: &NewQuotation,
    ) -> Result<QuotationId, ServiceError> {
        self.check(FailurePoint::CreateQuotation).await?;
        let mut store = self.store.write().await;
        if !store.orders.contains_key(&quotation.order_id) {
            return Err(not_found("order", quotation.order_id));
        }
        let id = store.allocate();
        store.quotations.insert(
            id,
            Quotation {
                id,
                order_id: Some(quotation.order_id),
                customer_id: Some(quotation.customer_id),
                parameter_info: quotation.parameter_info.clone(),
                pdf_url: None,
                created_at: Some(Utc::now()),
            },
        );
        Ok(id)
    }

    async fn delete_quotation(&self, id: QuotationId) -> Result<(), ServiceError> {
        self.check(FailurePoint::DeleteQuotation).await?;
        let mut store = self.store.write().await;
        if store.order_parameters.values().any(|op| op.quotation_id == id) {
            return Err(still_referenced("quotation", id, "order parameters"));
        }
        store
            .quotations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("quotation", id))
    }

    async fn order_parameters(
        &self,
        quotation_id: QuotationId,
    ) -> Result<Vec<OrderParameter>, ServiceError> {
        Ok(self
            .store
            .read()
            .await
            .order_parameters
            .values()
            .filter(|op| op.quotation_id == quotation_id)
            .cloned()
            .collect())
    }

    async fn create_order_parameter(&self, entry: &NewOrderParameter) -> Result<(), ServiceError> {
        self.check(FailurePoint::CreateOrderParameter(entry.parameter_id))
            .await?;
        let mut store = self.store.write().await;
        if !store.quotations.contains_key(&entry.quotation_id) {
            return Err(not_found("quotation", entry.quotation_id));
        }
        let id = store.allocate();
        store.order_parameters.insert(
            id,
            OrderParameter {
                id,
                quotation_id: entry.quotation_id,
                parameter_id: entry.parameter_id,
                cost: Some(entry.cost),
                result: normalize_text(&entry.result),
                protocol_used: None,
                home_protocol: None,
                is_active: Some(entry.is_active),
                is_delete: Some(entry.is_delete),
            },
        );
        Ok(())
    }

    async fn update_result(
        &self,
        quotation_id: QuotationId,
        parameter_id: ParameterId,
        update: &ResultUpdate,
    ) -> Result<(), ServiceError> {
        self.check(FailurePoint::UpdateResult(parameter_id)).await?;
        let mut store = self.store.write().await;
        let entry = store
            .order_parameters
            .values_mut()
            .find(|op| op.quotation_id == quotation_id && op.parameter_id == parameter_id)
            .ok_or_else(|| not_found("order parameter for parameter", parameter_id))?;
        entry.result = normalize_text(&update.result);
        entry.protocol_used = update.protocol_used.clone();
        entry.home_protocol = update.home_protocol.clone();
        Ok(())
    }

    async fn delete_order_parameter(&self, id: OrderParameterId) -> Result<(), ServiceError> {
        self.store
            .write()
            .await
            .order_parameters
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("order parameter", id))
    }

    async fn list_samples(&self) -> Result<Vec<Sample>, ServiceError> {
        Ok(self.store.read().await.samples.values().cloned().collect())
    }

    async fn create_sample(&self, input: &SampleInput) -> Result<Sample, ServiceError> {
        let mut store = self.store.write().await;
        if !store.orders.contains_key(&input.order_id) {
            return Err(not_found("order", input.order_id));
        }
        let id = store.allocate();
        let sample = Sample::from_input(id, input);
        store.samples.insert(id, sample.clone());
        Ok(sample)
    }

    async fn update_sample(&self, id: SampleId, input: &SampleInput) -> Result<(), ServiceError> {
        let mut store = self.store.write().await;
        let existing = store
            .samples
            .get_mut(&id)
            .ok_or_else(|| not_found("sample", id))?;
        *existing = Sample::from_input(id, input);
        Ok(())
    }

    async fn delete_sample(&self, id: SampleId) -> Result<(), ServiceError> {
        self.check(FailurePoint::DeleteSample).await?;
        self.store
            .write()
            .await
            .samples
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("sample", id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn customer_input() -> CustomerInput {
        CustomerInput {
            name: "Ravi".into(),
            email: "ravi@acme.in".into(),
            phone_number: "98".into(),
            address: "Surat".into(),
            ..CustomerInput::default()
        }
    }

    #[tokio::test]
    async fn delete_refuses_referenced_customer() {
        let api = InMemoryLabApi::new();
        let customer = api.create_customer(&customer_input()).await.unwrap();
        let form = OrderForm {
            customer_id: customer.id,
            order_req_comment: Some("pH".into()),
            status: "Quotation Check".into(),
            order_number: "Ravi/01012024/ORDERNo1".into(),
        };
        let order = api.create_order(&form, None).await.unwrap();

        assert_matches!(
            api.delete_customer(customer.id).await,
            Err(ServiceError::Api { status: 409, .. })
        );
        api.delete_order(order.id).await.unwrap();
        api.delete_customer(customer.id).await.unwrap();
        assert!(api.get_customer(customer.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn result_text_is_stored_normalized() {
        let api = InMemoryLabApi::new();
        let customer = api.create_customer(&customer_input()).await.unwrap();
        let form = OrderForm {
            customer_id: customer.id,
            order_req_comment: Some("pH".into()),
            status: "Quotation Check".into(),
            order_number: "Ravi/01012024/ORDERNo1".into(),
        };
        let order = api.create_order(&form, None).await.unwrap();
        let quotation_id = api
            .create_quotation(&NewQuotation {
                customer_id: customer.id,
                order_id: order.id,
                parameter_info: Vec::new(),
            })
            .await
            .unwrap();
        let pending = NewOrderParameter::pending(quotation_id, 2, rust_decimal::Decimal::ONE);
        api.create_order_parameter(&pending).await.unwrap();
        assert_eq!(api.order_parameters(quotation_id).await.unwrap()[0].result, None);

        let update = |result: &str| ResultUpdate {
            result: result.into(),
            protocol_used: None,
            home_protocol: None,
        };
        api.update_result(quotation_id, 2, &update(" 7.2 ")).await.unwrap();
        assert_eq!(
            api.order_parameters(quotation_id).await.unwrap()[0].result.as_deref(),
            Some("7.2")
        );
        api.update_result(quotation_id, 2, &update("None")).await.unwrap();
        assert_eq!(api.order_parameters(quotation_id).await.unwrap()[0].result, None);
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_api_error() {
        let api = InMemoryLabApi::new();
        api.fail_on(FailurePoint::CreateCustomer).await;
        assert_matches!(
            api.create_customer(&customer_input()).await,
            Err(ServiceError::Api { status: 500, .. })
        );
        api.clear_failures().await;
        assert!(api.create_customer(&customer_input()).await.is_ok());
    }
}
