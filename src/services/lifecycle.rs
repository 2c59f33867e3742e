use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{
    order_number, Attachment, CustomerId, CustomerInput, CustomerRequest, LifecycleStage,
    NewOrderParameter, NewQuotation, Order, OrderForm, OrderId, OrderParameter, ParameterId, ParameterLine,
    Quotation, QuotationId, Sample, SampleId, SampleInput,
};
use crate::services::basket::SelectionBasket;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use validator::Validate;

/// A quotation whose order parameters were only partly created.
///
/// Kept in the session so a retry reuses the quotation instead of creating
/// a second one.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub order_id: OrderId,
    pub quotation_id: QuotationId,
    /// Lines frozen into the quotation.
    pub lines: Vec<ParameterLine>,
    /// Parameters whose order parameter already exists.
    pub posted: BTreeSet<ParameterId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EntryStatus {
    Created,
    AlreadyCreated,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntryOutcome {
    pub parameter_id: ParameterId,
    pub name: String,
    #[serde(flatten)]
    pub status: EntryStatus,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubmissionReport {
    pub quotation_id: QuotationId,
    pub entries: Vec<EntryOutcome>,
}

impl SubmissionReport {
    pub fn failed(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, EntryStatus::Failed { .. }))
    }

    pub fn succeeded_count(&self) -> usize {
        self.entries.len() - self.failed().count()
    }

    pub fn is_complete(&self) -> bool {
        self.failed().next().is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IntakeOutcome {
    pub customer: CustomerRequest,
    pub order: Order,
}

/// Everything persisted about one order, and the stage it implies.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LifecycleSnapshot {
    pub order: Order,
    pub customer: Option<CustomerRequest>,
    pub quotations: Vec<Quotation>,
    pub order_parameters: Vec<OrderParameter>,
    pub samples: Vec<Sample>,
    pub stage: LifecycleStage,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DeleteReport {
    pub completed: Vec<String>,
}

/// The stage implied by what exists, ignoring the stored label.
pub fn derive_stage(
    has_quotation: bool,
    has_samples: bool,
    order_parameters: &[OrderParameter],
) -> LifecycleStage {
    let live: Vec<&OrderParameter> = order_parameters.iter().filter(|op| !op.is_deleted()).collect();
    let with_result = live.iter().filter(|op| op.has_result()).count();

    if !live.is_empty() && with_result == live.len() {
        LifecycleStage::ResultsComplete
    } else if with_result > 0 {
        LifecycleStage::ResultsInProgress
    } else if has_samples {
        LifecycleStage::SampleRegistered
    } else if has_quotation {
        LifecycleStage::QuotationIssued
    } else {
        LifecycleStage::QuotationPending
    }
}

fn require_comment_or_document(
    comment: Option<&str>,
    document: Option<&Attachment>,
) -> Result<(), ServiceError> {
    let has_comment = comment.is_some_and(|c| !c.trim().is_empty());
    if !has_comment && document.is_none() {
        return Err(ServiceError::validation(
            "Provide a request comment or attach a document",
        ));
    }
    Ok(())
}

/// Differences between the lines a quotation was issued for and the
/// current basket, one description per parameter.
fn selection_drift(quoted: &[ParameterLine], current: &[ParameterLine]) -> Vec<String> {
    let quoted: BTreeMap<ParameterId, &ParameterLine> =
        quoted.iter().map(|l| (l.parameter_id, l)).collect();
    let current: BTreeMap<ParameterId, &ParameterLine> =
        current.iter().map(|l| (l.parameter_id, l)).collect();

    let mut drift = Vec::new();
    for (id, line) in &quoted {
        match current.get(id) {
            None => drift.push(format!("{} removed", id)),
            Some(now) if now.quantity != line.quantity => drift.push(format!(
                "quantity of {} changed from {} to {}",
                id, line.quantity, now.quantity
            )),
            Some(now) if now.cost != line.cost => drift.push(format!(
                "price of {} changed from {} to {}",
                id, line.cost, now.cost
            )),
            Some(_) => {}
        }
    }
    for id in current.keys().filter(|id| !quoted.contains_key(id)) {
        drift.push(format!("{} added", id));
    }
    drift
}

/// Drives a customer request from intake to finished results.
#[derive(Clone)]
pub struct LifecycleService {
    api: Arc<dyn LabApi>,
}

impl LifecycleService {
    pub fn new(api: Arc<dyn LabApi>) -> Self {
        Self { api }
    }

    /// Creates the customer request and its order. A failed order creation
    /// deletes the customer again.
    #[instrument(skip(self, customer, comment, document), fields(customer = %customer.name))]
    pub async fn intake(
        &self,
        customer: CustomerInput,
        comment: Option<String>,
        document: Option<Attachment>,
        today: NaiveDate,
    ) -> Result<IntakeOutcome, ServiceError> {
        customer.validate()?;
        require_comment_or_document(comment.as_deref(), document.as_ref())?;

        let created = self.api.create_customer(&customer).await?;
        let form = OrderForm {
            customer_id: created.id,
            order_req_comment: comment,
            status: LifecycleStage::QuotationPending.to_string(),
            order_number: order_number(&created.name, today, created.id),
        };

        match self.api.create_order(&form, document.as_ref()).await {
            Ok(order) => {
                info!(customer_id = created.id, order_id = order.id, "request taken in");
                Ok(IntakeOutcome {
                    customer: created,
                    order,
                })
            }
            Err(order_err) => {
                warn!(customer_id = created.id, error = %order_err, "order creation failed, removing customer");
                match self.api.delete_customer(created.id).await {
                    Ok(()) => Err(order_err),
                    Err(cleanup_err) => {
                        error!(customer_id = created.id, error = %cleanup_err, "compensation failed");
                        Err(ServiceError::Inconsistent(format!(
                            "order creation failed ({}) and customer request {} could not be removed ({}); it is orphaned",
                            order_err, created.id, cleanup_err
                        )))
                    }
                }
            }
        }
    }

    /// Creates (or, for a remembered partial submission, reuses) the
    /// quotation and one order parameter per basket entry.
    ///
    /// The basket and `pending` are only cleared when every entry exists.
    #[instrument(skip(self, order, basket, pending), fields(order_id = order.id))]
    pub async fn submit_basket(
        &self,
        order: &Order,
        basket: &mut SelectionBasket,
        pending: &mut Option<PendingSubmission>,
    ) -> Result<SubmissionReport, ServiceError> {
        if basket.is_empty() {
            return Err(ServiceError::validation("The basket is empty"));
        }

        let mut submission = match pending.as_ref() {
            Some(existing) if existing.order_id == order.id => {
                let drift = selection_drift(&existing.lines, &basket.to_parameter_lines());
                if !drift.is_empty() {
                    return Err(ServiceError::InvalidOperation(format!(
                        "quotation {} was issued for a different selection ({}); restore it or cancel the pending submission",
                        existing.quotation_id,
                        drift.join(", ")
                    )));
                }
                info!(quotation_id = existing.quotation_id, "resuming partial submission");
                existing.clone()
            }
            Some(existing) => {
                return Err(ServiceError::InvalidOperation(format!(
                    "a submission for order {} is still pending; finish or cancel it first",
                    existing.order_id
                )));
            }
            None => {
                let quotation = NewQuotation {
                    customer_id: order.customer_id,
                    order_id: order.id,
                    parameter_info: basket.to_parameter_lines(),
                };
                let quotation_id = self.api.create_quotation(&quotation).await?;
                info!(quotation_id, "quotation created");
                PendingSubmission {
                    order_id: order.id,
                    quotation_id,
                    lines: quotation.parameter_info,
                    posted: BTreeSet::new(),
                }
            }
        };

        // Walk the quoted lines, not the basket, so every billed line gets
        // its order parameter.
        let mut entries = Vec::with_capacity(submission.lines.len());
        for line in &submission.lines {
            if submission.posted.contains(&line.parameter_id) {
                entries.push(EntryOutcome {
                    parameter_id: line.parameter_id,
                    name: line.name.clone(),
                    status: EntryStatus::AlreadyCreated,
                });
                continue;
            }
            let payload =
                NewOrderParameter::pending(submission.quotation_id, line.parameter_id, line.cost);
            let status = match self.api.create_order_parameter(&payload).await {
                Ok(()) => {
                    submission.posted.insert(line.parameter_id);
                    EntryStatus::Created
                }
                Err(err) => {
                    warn!(parameter_id = line.parameter_id, error = %err, "order parameter not created");
                    EntryStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            entries.push(EntryOutcome {
                parameter_id: line.parameter_id,
                name: line.name.clone(),
                status,
            });
        }

        let report = SubmissionReport {
            quotation_id: submission.quotation_id,
            entries,
        };

        if report.is_complete() {
            basket.clear();
            *pending = None;
            info!(quotation_id = report.quotation_id, "basket submitted");
            if let Err(err) = self.advance_status(order, LifecycleStage::QuotationIssued).await {
                warn!(order_id = order.id, error = %err, "order status label not advanced");
            }
        } else {
            warn!(
                quotation_id = report.quotation_id,
                succeeded = report.succeeded_count(),
                total = report.entries.len(),
                "partial submission kept for retry"
            );
            *pending = Some(submission);
        }
        Ok(report)
    }

    #[instrument(skip(self, input), fields(order_id = input.order_id))]
    pub async fn register_sample(&self, input: SampleInput) -> Result<Sample, ServiceError> {
        input.validate()?;
        let order = self
            .api
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", input.order_id)))?;

        let sample = self.api.create_sample(&input).await?;
        info!(sample_id = sample.id, "sample registered");
        if let Err(err) = self.sync_order(&order).await {
            warn!(order_id = order.id, error = %err, "order status label not refreshed");
        }
        Ok(sample)
    }

    /// Rewrites a registered sample, possibly moving it to another order.
    #[instrument(skip(self, input), fields(order_id = input.order_id))]
    pub async fn update_sample(
        &self,
        sample_id: SampleId,
        input: SampleInput,
    ) -> Result<Sample, ServiceError> {
        input.validate()?;
        let previous = self.find_sample(sample_id).await?;
        let order = self
            .api
            .get_order(input.order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", input.order_id)))?;

        self.api.update_sample(sample_id, &input).await?;
        info!(sample_id, previous_order = previous.order_id, "sample updated");
        if let Err(err) = self.sync_order(&order).await {
            warn!(order_id = order.id, error = %err, "order status label not refreshed");
        }
        Ok(Sample::from_input(sample_id, &input))
    }

    /// Removes a sample and returns what was stored. The status label only
    /// moves forward, so it is left as it was.
    #[instrument(skip(self))]
    pub async fn delete_sample(&self, sample_id: SampleId) -> Result<Sample, ServiceError> {
        let sample = self.find_sample(sample_id).await?;
        self.api.delete_sample(sample_id).await?;
        info!(sample_id, order_id = sample.order_id, "sample deleted");
        Ok(sample)
    }

    async fn find_sample(&self, sample_id: SampleId) -> Result<Sample, ServiceError> {
        self.api
            .list_samples()
            .await?
            .into_iter()
            .find(|sample| sample.id == sample_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Sample {} not found", sample_id)))
    }

    /// Updates the customer then the order; if the order update fails the
    /// customer is put back as it was. A `None` comment leaves the stored
    /// comment in place.
    #[instrument(skip(self, customer, comment, document))]
    pub async fn edit_request(
        &self,
        order_id: OrderId,
        customer: CustomerInput,
        comment: Option<String>,
        document: Option<Attachment>,
    ) -> Result<(), ServiceError> {
        customer.validate()?;
        let order = self
            .api
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        // An omitted comment keeps the stored one.
        let comment = comment.or_else(|| order.order_req_comment.clone());
        if order.order_req_doc.is_none() {
            require_comment_or_document(comment.as_deref(), document.as_ref())?;
        }
        let previous = self
            .api
            .get_customer(order.customer_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Customer request {} not found", order.customer_id))
            })?;

        self.api.update_customer(previous.id, &customer).await?;

        let form = OrderForm {
            customer_id: order.customer_id,
            order_req_comment: comment,
            status: order
                .status
                .clone()
                .unwrap_or_else(|| LifecycleStage::QuotationPending.to_string()),
            order_number: order.order_number.clone(),
        };
        if let Err(order_err) = self.api.update_order(order.id, &form, document.as_ref()).await {
            warn!(order_id, error = %order_err, "order update failed, restoring customer");
            return match self.api.update_customer(previous.id, &previous.to_input()).await {
                Ok(()) => Err(order_err),
                Err(revert_err) => Err(ServiceError::Inconsistent(format!(
                    "order {} was not updated ({}) and customer request {} keeps the new details because the revert failed ({})",
                    order.id, order_err, previous.id, revert_err
                ))),
            };
        }
        info!(order_id, "request edited");
        Ok(())
    }

    /// Deletes samples, quotations with their order parameters, orders, and
    /// finally the customer request. Stops at the first failure.
    #[instrument(skip(self))]
    pub async fn delete_request(&self, customer_id: CustomerId) -> Result<DeleteReport, ServiceError> {
        let mut report = DeleteReport::default();
        let result = self.delete_request_steps(customer_id, &mut report).await;
        match result {
            Ok(()) => {
                info!(customer_id, steps = report.completed.len(), "request deleted");
                Ok(report)
            }
            Err(err) if report.completed.is_empty() => Err(err),
            Err(err) => {
                error!(customer_id, error = %err, completed = ?report.completed, "delete stopped part way");
                Err(ServiceError::Inconsistent(format!(
                    "delete of customer request {} stopped: {}; already completed: {}",
                    customer_id,
                    err,
                    report.completed.join(", ")
                )))
            }
        }
    }

    async fn delete_request_steps(
        &self,
        customer_id: CustomerId,
        report: &mut DeleteReport,
    ) -> Result<(), ServiceError> {
        for order in self.api.orders_for_customer(customer_id).await? {
            for sample in self.api.samples_for_order(order.id).await? {
                self.api.delete_sample(sample.id).await?;
                report.completed.push(format!("sample {}", sample.id));
            }
            for quotation in self.api.quotations_for_order(order.id).await? {
                for op in self.api.order_parameters(quotation.id).await? {
                    self.api.delete_order_parameter(op.id).await?;
                    report.completed.push(format!("order parameter {}", op.id));
                }
                self.api.delete_quotation(quotation.id).await?;
                report.completed.push(format!("quotation {}", quotation.id));
            }
            self.api.delete_order(order.id).await?;
            report.completed.push(format!("order {}", order.id));
        }
        self.api.delete_customer(customer_id).await?;
        report.completed.push(format!("customer request {}", customer_id));
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn snapshot(&self, order_id: OrderId) -> Result<LifecycleSnapshot, ServiceError> {
        let order = self
            .api
            .get_order(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
        self.snapshot_of(order).await
    }

    async fn snapshot_of(&self, order: Order) -> Result<LifecycleSnapshot, ServiceError> {
        let customer = self.api.get_customer(order.customer_id).await?;
        let quotations = self.api.quotations_for_order(order.id).await?;
        let mut order_parameters = Vec::new();
        for quotation in &quotations {
            order_parameters.extend(self.api.order_parameters(quotation.id).await?);
        }
        let samples = self.api.samples_for_order(order.id).await?;
        let stage = derive_stage(!quotations.is_empty(), !samples.is_empty(), &order_parameters);

        Ok(LifecycleSnapshot {
            order,
            customer,
            quotations,
            order_parameters,
            samples,
            stage,
        })
    }

    /// Recomputes the stage and moves the stored label forward if it lags.
    #[instrument(skip(self))]
    pub async fn sync_status(&self, order_id: OrderId) -> Result<LifecycleStage, ServiceError> {
        let snapshot = self.snapshot(order_id).await?;
        self.advance_status(&snapshot.order, snapshot.stage).await?;
        Ok(snapshot.stage)
    }

    async fn sync_order(&self, order: &Order) -> Result<LifecycleStage, ServiceError> {
        let snapshot = self.snapshot_of(order.clone()).await?;
        self.advance_status(order, snapshot.stage).await?;
        Ok(snapshot.stage)
    }

    /// Writes `stage` as the status label unless the current label is
    /// already at or past it.
    async fn advance_status(&self, order: &Order, stage: LifecycleStage) -> Result<bool, ServiceError> {
        if order.status_stage().is_some_and(|current| current >= stage) {
            return Ok(false);
        }
        let form = OrderForm {
            customer_id: order.customer_id,
            order_req_comment: order.order_req_comment.clone(),
            status: stage.to_string(),
            order_number: order.order_number.clone(),
        };
        self.api.update_order(order.id, &form, None).await?;
        info!(order_id = order.id, status = %stage, "order status advanced");
        Ok(true)
    }
}
