use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{
    CustomerId, CustomerRequest, Order, OrderId, ParameterLine, QuotationId, Sample,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QuotationOverview {
    pub quotation_id: QuotationId,
    pub order_id: Option<OrderId>,
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub customer_id: Option<CustomerId>,
    pub customer_name: Option<String>,
    pub company: Option<String>,
    pub lines: Vec<ParameterLine>,
    pub total: Decimal,
    pub pdf_url: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// A customer request with the order that belongs to it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestSummary {
    pub customer: CustomerRequest,
    pub order: Option<Order>,
}

#[derive(Clone)]
pub struct OverviewService {
    api: Arc<dyn LabApi>,
}

impl OverviewService {
    pub fn new(api: Arc<dyn LabApi>) -> Self {
        Self { api }
    }

    /// Quotations joined with order and customer, newest first, optionally
    /// narrowed to customers whose name contains `customer_filter`.
    #[instrument(skip(self))]
    pub async fn quotations(
        &self,
        customer_filter: Option<&str>,
    ) -> Result<Vec<QuotationOverview>, ServiceError> {
        let quotations = self.api.list_quotations().await?;
        let orders: HashMap<OrderId, Order> = self
            .api
            .list_orders()
            .await?
            .into_iter()
            .map(|o| (o.id, o))
            .collect();
        let customers: HashMap<CustomerId, CustomerRequest> = self
            .api
            .list_customers()
            .await?
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let needle = customer_filter
            .map(|f| f.trim().to_lowercase())
            .filter(|f| !f.is_empty());

        let mut overview: Vec<QuotationOverview> = quotations
            .into_iter()
            .map(|quotation| {
                let order = quotation.order_id.and_then(|id| orders.get(&id));
                let customer_id = quotation
                    .customer_id
                    .or_else(|| order.map(|o| o.customer_id));
                let customer = customer_id.and_then(|id| customers.get(&id));
                QuotationOverview {
                    quotation_id: quotation.id,
                    order_id: quotation.order_id,
                    order_number: order.map(|o| o.order_number.clone()),
                    status: order.and_then(|o| o.status.clone()),
                    customer_id,
                    customer_name: customer.map(|c| c.name.clone()),
                    company: customer.map(|c| c.c_name.clone()),
                    total: quotation.total(),
                    lines: quotation.parameter_info,
                    pdf_url: quotation.pdf_url,
                    created_at: quotation.created_at,
                }
            })
            .filter(|row| match &needle {
                None => true,
                Some(needle) => row
                    .customer_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(needle)),
            })
            .collect();

        overview.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then(b.quotation_id.cmp(&a.quotation_id))
        });
        Ok(overview)
    }

    /// Live customer requests with their order, matched on name, email or
    /// company.
    #[instrument(skip(self))]
    pub async fn requests(&self, search: Option<&str>) -> Result<Vec<RequestSummary>, ServiceError> {
        let mut by_customer: HashMap<CustomerId, Order> = HashMap::new();
        for order in self.api.list_orders().await? {
            by_customer.entry(order.customer_id).or_insert(order);
        }

        let term = search.unwrap_or_default();
        Ok(self
            .api
            .list_customers()
            .await?
            .into_iter()
            .filter(|c| !c.is_deleted() && c.matches(term))
            .map(|customer| RequestSummary {
                order: by_customer.remove(&customer.id),
                customer,
            })
            .collect())
    }

    pub async fn samples(&self, order_id: OrderId) -> Result<Vec<Sample>, ServiceError> {
        self.api.samples_for_order(order_id).await
    }
}
