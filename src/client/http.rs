use super::{LabApi, OneOrMany};
use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::models::{
    Attachment, CustomerId, CustomerInput, CustomerRequest, NewOrderParameter, NewQuotation,
    Order, OrderForm, OrderId, OrderParameter, OrderParameterId, Parameter, ParameterId,
    ParameterInput, Quotation, QuotationId, ResultUpdate, Sample, SampleId, SampleInput,
};
use async_trait::async_trait;
use reqwest::{multipart, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// `LabApi` over HTTP.
///
/// Success is 200, 201 or 204; any other status becomes
/// [`ServiceError::Api`] carrying the raw response body. Requests are never
/// retried.
#[derive(Clone)]
pub struct HttpLabApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLabApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("labdesk/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::InternalError(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self, ServiceError> {
        Self::new(&config.api_base_url, config.request_timeout())
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, action: &str) -> Result<Response, ServiceError> {
        let response = request.send().await.map_err(|e| {
            warn!(action, error = %e, "request did not complete");
            ServiceError::Network(format!("{} failed: {}", action, e))
        })?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT
        ) {
            debug!(action, status = status.as_u16(), "request succeeded");
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(action, status = status.as_u16(), %body, "API rejected request");
        Err(ServiceError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn read_json<T: DeserializeOwned>(
        response: Response,
        action: &str,
    ) -> Result<T, ServiceError> {
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::Network(format!("{} failed: {}", action, e)))?;
        serde_json::from_str(&text).map_err(|e| {
            ServiceError::SerializationError(format!("Failed to parse {} response: {}", action, e))
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, action: &str) -> Result<T, ServiceError> {
        let response = self.send(self.client.get(self.endpoint(path)), action).await?;
        Self::read_json(response, action).await
    }

    /// GET where a 404 means "no such record".
    async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
        action: &str,
    ) -> Result<Option<OneOrMany<T>>, ServiceError> {
        match self.get_json::<OneOrMany<T>>(path, action).await {
            Ok(found) => Ok(Some(found)),
            Err(ServiceError::Api { status: 404, .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// POSTs JSON and extracts the id of the created record.
    async fn create_json<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        id_keys: &[&str],
        action: &str,
    ) -> Result<i64, ServiceError> {
        let response = self
            .send(self.client.post(self.endpoint(path)).json(body), action)
            .await?;
        let value: Value = Self::read_json(response, action).await?;
        created_id(&value, id_keys).ok_or_else(|| {
            ServiceError::SerializationError(format!("{} response carried no id: {}", action, value))
        })
    }

    async fn delete(&self, path: &str, action: &str) -> Result<(), ServiceError> {
        self.send(self.client.delete(self.endpoint(path)), action)
            .await
            .map(|_| ())
    }
}

/// Looks for the first key holding an integer, accepting numeric strings.
fn created_id(value: &Value, keys: &[&str]) -> Option<i64> {
    keys.iter().find_map(|key| match value.get(*key)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn order_multipart(
    form: &OrderForm,
    document: Option<&Attachment>,
) -> Result<multipart::Form, ServiceError> {
    let mut body = multipart::Form::new()
        .text("customer_id", form.customer_id.to_string())
        .text(
            "order_req_comment",
            form.order_req_comment.clone().unwrap_or_default(),
        )
        .text("status", form.status.clone())
        .text("order_number", form.order_number.clone());

    if let Some(doc) = document {
        let part = multipart::Part::bytes(doc.bytes.clone())
            .file_name(doc.file_name.clone())
            .mime_str(&doc.content_type)
            .map_err(|e| ServiceError::validation(format!("Invalid document type: {}", e)))?;
        body = body.part("docfile", part);
    }

    Ok(body)
}

#[async_trait]
impl LabApi for HttpLabApi {
    #[instrument(skip(self))]
    async fn list_parameters(&self) -> Result<Vec<Parameter>, ServiceError> {
        self.get_json("/parameter/", "list parameters").await
    }

    #[instrument(skip(self))]
    async fn get_parameter(&self, id: ParameterId) -> Result<Option<Parameter>, ServiceError> {
        Ok(self
            .get_optional::<Parameter>(&format!("/parameter/p_id/{}", id), "get parameter")
            .await?
            .and_then(OneOrMany::into_first))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_parameter(&self, input: &ParameterInput) -> Result<Parameter, ServiceError> {
        let id = self
            .create_json("/parameter/", input, &["id"], "create parameter")
            .await?;
        Ok(Parameter::from_input(id, input))
    }

    #[instrument(skip(self, input))]
    async fn update_parameter(
        &self,
        id: ParameterId,
        input: &ParameterInput,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&format!("/parameter/{}", id)))
            .json(input);
        self.send(request, "update parameter").await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_parameter(&self, id: ParameterId) -> Result<(), ServiceError> {
        self.delete(&format!("/parameter/{}", id), "delete parameter")
            .await
    }

    #[instrument(skip(self))]
    async fn list_customers(&self) -> Result<Vec<CustomerRequest>, ServiceError> {
        self.get_json("/customer_request/", "list customer requests")
            .await
    }

    #[instrument(skip(self))]
    async fn get_customer(&self, id: CustomerId) -> Result<Option<CustomerRequest>, ServiceError> {
        Ok(self
            .get_optional::<CustomerRequest>(
                &format!("/customer_request/{}", id),
                "get customer request",
            )
            .await?
            .and_then(OneOrMany::into_first))
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn create_customer(
        &self,
        input: &CustomerInput,
    ) -> Result<CustomerRequest, ServiceError> {
        let id = self
            .create_json(
                "/customer_request/",
                input,
                &["id", "customer_id"],
                "create customer request",
            )
            .await?;
        Ok(CustomerRequest::from_input(id, input))
    }

    #[instrument(skip(self, input))]
    async fn update_customer(
        &self,
        id: CustomerId,
        input: &CustomerInput,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&format!("/customer_request/{}", id)))
            .json(input);
        self.send(request, "update customer request")
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_customer(&self, id: CustomerId) -> Result<(), ServiceError> {
        self.delete(&format!("/customer_request/{}", id), "delete customer request")
            .await
    }

    #[instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        self.get_json("/order/", "list orders").await
    }

    #[instrument(skip(self))]
    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, ServiceError> {
        Ok(self
            .get_optional::<Order>(&format!("/order/order_id/{}", id), "get order")
            .await?
            .and_then(OneOrMany::into_first))
    }

    #[instrument(skip(self))]
    async fn orders_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, ServiceError> {
        Ok(self
            .get_optional::<Order>(
                &format!("/order/c_id/{}", customer_id),
                "get orders for customer",
            )
            .await?
            .map(OneOrMany::into_vec)
            .unwrap_or_default())
    }

    #[instrument(skip(self, form, document), fields(order_number = %form.order_number))]
    async fn create_order(
        &self,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<Order, ServiceError> {
        let request = self
            .client
            .post(self.endpoint("/order/"))
            .multipart(order_multipart(form, document)?);
        let response = self.send(request, "create order").await?;
        let value: Value = Self::read_json(response, "create order").await?;
        let id = created_id(&value, &["id", "order_id"]).ok_or_else(|| {
            ServiceError::SerializationError(format!("create order response carried no id: {}", value))
        })?;
        Ok(Order::from_form(id, form, document))
    }

    #[instrument(skip(self, form, document))]
    async fn update_order(
        &self,
        id: OrderId,
        form: &OrderForm,
        document: Option<&Attachment>,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&format!("/order/{}", id)))
            .multipart(order_multipart(form, document)?);
        self.send(request, "update order").await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_order(&self, id: OrderId) -> Result<(), ServiceError> {
        self.delete(&format!("/order/{}", id), "delete order").await
    }

    #[instrument(skip(self))]
    async fn list_quotations(&self) -> Result<Vec<Quotation>, ServiceError> {
        self.get_json("/quotations/", "list quotations").await
    }

    #[instrument(skip(self, quotation), fields(order_id = quotation.order_id))]
    async fn create_quotation(
        &self,
        quotation: &NewQuotation,
    ) -> Result<QuotationId, ServiceError> {
        self.create_json(
            "/quotations/",
            quotation,
            &["quotation_id", "id"],
            "create quotation",
        )
        .await
    }

    #[instrument(skip(self))]
    async fn delete_quotation(&self, id: QuotationId) -> Result<(), ServiceError> {
        self.delete(&format!("/quotations/{}", id), "delete quotation")
            .await
    }

    #[instrument(skip(self))]
    async fn order_parameters(
        &self,
        quotation_id: QuotationId,
    ) -> Result<Vec<OrderParameter>, ServiceError> {
        Ok(self
            .get_optional::<OrderParameter>(
                &format!("/order_parameters/op_id/{}", quotation_id),
                "list order parameters",
            )
            .await?
            .map(OneOrMany::into_vec)
            .unwrap_or_default())
    }

    #[instrument(skip(self, entry), fields(quotation_id = entry.quotation_id, parameter_id = entry.parameter_id))]
    async fn create_order_parameter(&self, entry: &NewOrderParameter) -> Result<(), ServiceError> {
        let request = self
            .client
            .post(self.endpoint("/order_parameters/"))
            .json(entry);
        self.send(request, "create order parameter")
            .await
            .map(|_| ())
    }

    #[instrument(skip(self, update))]
    async fn update_result(
        &self,
        quotation_id: QuotationId,
        parameter_id: ParameterId,
        update: &ResultUpdate,
    ) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&format!(
                "/order_parameters/result/{}/{}",
                quotation_id, parameter_id
            )))
            .json(update);
        self.send(request, "update result").await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_order_parameter(&self, id: OrderParameterId) -> Result<(), ServiceError> {
        self.delete(&format!("/order_parameters/{}", id), "delete order parameter")
            .await
    }

    #[instrument(skip(self))]
    async fn list_samples(&self) -> Result<Vec<Sample>, ServiceError> {
        self.get_json("/samples/get_sample", "list samples").await
    }

    #[instrument(skip(self, input), fields(order_id = input.order_id))]
    async fn create_sample(&self, input: &SampleInput) -> Result<Sample, ServiceError> {
        let id = self
            .create_json("/samples/", input, &["id", "sample_id"], "create sample")
            .await?;
        Ok(Sample::from_input(id, input))
    }

    #[instrument(skip(self, input))]
    async fn update_sample(&self, id: SampleId, input: &SampleInput) -> Result<(), ServiceError> {
        let request = self
            .client
            .put(self.endpoint(&format!("/samples/{}", id)))
            .json(input);
        self.send(request, "update sample").await.map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_sample(&self, id: SampleId) -> Result<(), ServiceError> {
        self.delete(&format!("/samples/{}", id), "delete sample").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn created_id_prefers_listed_keys_in_order() {
        assert_eq!(created_id(&json!({ "quotation_id": 12 }), &["quotation_id", "id"]), Some(12));
        assert_eq!(created_id(&json!({ "id": "7", "order_id": 3 }), &["id"]), Some(7));
        assert_eq!(created_id(&json!({ "message": "ok" }), &["id"]), None);
    }

    #[test]
    fn trailing_slash_is_dropped_from_base_url() {
        let api = HttpLabApi::new("http://lab.local:8000/", Duration::from_secs(5)).unwrap();
        assert_eq!(api.endpoint("/order/"), "http://lab.local:8000/order/");
    }
}
