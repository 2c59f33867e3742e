use super::{lenient, CustomerId, OrderId};
use crate::errors::ServiceError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strum::{Display, EnumIter, EnumString};

/// Workflow position of an order, from first contact to finished results.
///
/// Variants are ordered; comparisons follow the workflow.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
pub enum LifecycleStage {
    #[strum(to_string = "Intake")]
    Intake,
    #[strum(to_string = "Quotation Check", serialize = "Quotation Pending")]
    #[serde(rename = "Quotation Check", alias = "Quotation Pending")]
    QuotationPending,
    #[strum(to_string = "Quotation Issued")]
    #[serde(rename = "Quotation Issued")]
    QuotationIssued,
    #[strum(to_string = "Sample Registered")]
    #[serde(rename = "Sample Registered")]
    SampleRegistered,
    #[strum(to_string = "Results In Progress")]
    #[serde(rename = "Results In Progress")]
    ResultsInProgress,
    #[strum(to_string = "Results Complete")]
    #[serde(rename = "Results Complete")]
    ResultsComplete,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: CustomerId,
    #[serde(default, deserialize_with = "lenient::text")]
    pub order_number: String,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub order_req_comment: Option<String>,
    /// Reference to the uploaded request document, if any.
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub order_req_doc: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub status: Option<String>,
}

impl Order {
    pub fn from_form(id: OrderId, form: &OrderForm, document: Option<&Attachment>) -> Self {
        Self {
            id,
            customer_id: form.customer_id,
            order_number: form.order_number.clone(),
            order_req_comment: form.order_req_comment.clone(),
            order_req_doc: document.map(|doc| doc.file_name.clone()),
            status: Some(form.status.clone()),
        }
    }

    /// The persisted status label parsed as a stage. Unknown labels yield `None`.
    pub fn status_stage(&self) -> Option<LifecycleStage> {
        self.status.as_deref().and_then(|label| label.parse().ok())
    }
}

/// Multipart form fields for order create/update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderForm {
    pub customer_id: CustomerId,
    pub order_req_comment: Option<String>,
    pub status: String,
    pub order_number: String,
}

/// `"{customer name}/{ddmmyyyy}/ORDERNo{customer id}"`
pub fn order_number(customer_name: &str, date: NaiveDate, customer_id: CustomerId) -> String {
    format!(
        "{}/{}/ORDERNo{}",
        customer_name.trim(),
        date.format("%d%m%Y"),
        customer_id
    )
}

pub const ALLOWED_ATTACHMENT_EXTENSIONS: [&str; 5] = ["pdf", "docx", "txt", "xlsx", "csv"];

/// A document uploaded alongside an order request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl Attachment {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ServiceError> {
        let file_name = file_name.into();
        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let content_type = match extension.as_str() {
            "pdf" => "application/pdf",
            "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
            "txt" => "text/plain",
            "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "csv" => "text/csv",
            _ => {
                return Err(ServiceError::validation(format!(
                    "Unsupported document type '{}'; allowed: {}",
                    file_name,
                    ALLOWED_ATTACHMENT_EXTENSIONS.join(", ")
                )))
            }
        };

        Ok(Self {
            file_name,
            content_type: content_type.to_string(),
            bytes,
        })
    }

    pub fn read_from(path: &Path) -> Result<Self, ServiceError> {
        let bytes = std::fs::read(path)?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("document")
            .to_string();
        Self::new(file_name, bytes)
    }
}
