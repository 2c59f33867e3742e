//! Access to the laboratory REST API.
//!
//! Services only ever talk to [`LabApi`]; [`HttpLabApi`] is the production
//! implementation and [`InMemoryLabApi`] backs the mock server and the tests.

use crate::errors::ServiceError;
use crate::models::{
    Attachment, CustomerId, CustomerInput, CustomerRequest, NewOrderParameter, NewQuotation,
    Order, OrderForm, OrderId, OrderParameter, OrderParameterId, Parameter, ParameterId,
    ParameterInput, Quotation, QuotationId, ResultUpdate, Sample, SampleId, SampleInput,
};
use async_trait::async_trait;
use serde::Deserialize;

pub mod http;
pub mod memory;

pub use self::http::HttpLabApi;
pub use self::memory::{FailurePoint, InMemoryLabApi};

/// A body that may be a single record or a list of records.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }

    /// First record, if any.
    pub fn into_first(self) -> Option<T> {
        self.into_vec().into_iter().next()
    }
}

/// Operations on the laboratory records.
///
/// Only the id of a created record is taken from the API; the rest is built
/// from the submitted input. Updates return nothing, callers that need fresh
/// state read it back.
#[async_trait]
pub trait LabApi: Send + Sync {
    async fn list_parameters(&self) -> Result<Vec<Parameter>, ServiceError>;
    /// Zero-or-one lookup; the API may answer with an object or a list.
    async fn get_parameter(&self, id: ParameterId) -> Result<Option<Parameter>, ServiceError>;
    async fn create_parameter(&self, input: &ParameterInput) -> Result<Parameter, ServiceError>;
    async fn update_parameter(
        &self,
        id: ParameterId,
        input: &ParameterInput,
    ) -> Result<(), ServiceError>;
    async fn delete_parameter(&self, id: ParameterId) -> Result<(), ServiceError>;

    async fn list_customers(&self) -> Result<Vec<CustomerRequest>, ServiceError>;
    async fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRequest>, ServiceError>;
    async fn create_customer(&self, input: &CustomerInput)
        -> Result<CustomerRequest, ServiceError>;
    async fn update_customer(
        &self,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<(), ServiceError>;
    async fn delete_customer(&self, id: CustomerId) -> Result<(), ServiceError>;

    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError>;
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ServiceError>;
    async fn orders_for_customer(&self, customer_id: CustomerId)
        -> Result<Vec<Order>, ServiceError>;
    async fn create_order(
        &self,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<Order, ServiceError>;
    async fn update_order(
        &self,
        id: OrderId,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<(), ServiceError>;
    async fn delete_order(&self, id: OrderId) -> Result<(), ServiceError>;

    async fn list_quotations(&self) -> Result<Vec<Quotation>, ServiceError>;
    async fn create_quotation(&self, quotation: &NewQuotation)
        -> Result<QuotationId, ServiceError>;
    async fn delete_quotation(&self, id: QuotationId) -> Result<(), ServiceError>;

    async fn get_quotation(&self, id: QuotationId) -> Result<Option<Quotation>, ServiceError> {
        Ok(self
            .list_quotations()
            .await?
            .into_iter()
            .find(|quotation| quotation.id == id))
    }

    async fn quotations_for_order(&self, order_id: OrderId) -> Result<Vec<Quotation>, ServiceError> {
        Ok(self
            .list_quotations()
            .await?
            .into_iter()
            .filter(|quotation| quotation.order_id == Some(order_id))
            .collect())
    }

    async fn order_parameters(
        &self,
        quotation_id: QuotationId,
    ) -> Result<Vec<OrderParameter>, ServiceError>;
    async fn create_order_parameter(&self, entry: &NewOrderParameter) -> Result<(), ServiceError>;
    async fn update_result(
        &self,
        quotation_id: QuotationId,
        parameter_id: ParameterId,
        update: &ResultUpdate,
    ) -> Result<(), ServiceError>;
    async fn delete_order_parameter(&self, id: OrderParameterId) -> Result<(), ServiceError>;

    async fn list_samples(&self) -> Result<Vec<Sample>, ServiceError>;
    async fn create_sample(&self, input: &SampleInput) -> Result<Sample, ServiceError>;
    async fn update_sample(&self, id: SampleId, input: &SampleInput) -> Result<(), ServiceError>;
    async fn delete_sample(&self, id: SampleId) -> Result<(), ServiceError>;

    async fn samples_for_order(&self, order_id: OrderId) -> Result<Vec<Sample>, ServiceError> {
        Ok(self
            .list_samples()
            .await?
            .into_iter()
            .filter(|sample| sample.order_id == order_id)
            .collect())
    }
}
