use super::{lenient, OrderParameterId, ParameterId, QuotationId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A quoted parameter awaiting (or holding) its analysis result.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderParameter {
    pub id: OrderParameterId,
    pub quotation_id: QuotationId,
    pub parameter_id: ParameterId,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    pub cost: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub result: Option<String>,
    #[serde(
        default,
        alias = "protocol_use_for_analysis",
        deserialize_with = "lenient::optional_text"
    )]
    pub protocol_used: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub home_protocol: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_delete: Option<bool>,
}

impl OrderParameter {
    pub fn has_result(&self) -> bool {
        self.result.is_some()
    }

    pub fn is_deleted(&self) -> bool {
        self.is_delete.unwrap_or(false)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewOrderParameter {
    pub quotation_id: QuotationId,
    pub parameter_id: ParameterId,
    pub cost: Decimal,
    /// Sent as the literal `"None"` the API expects for "no result yet".
    pub result: String,
    pub is_delete: bool,
    pub is_active: bool,
}

impl NewOrderParameter {
    pub fn pending(quotation_id: QuotationId, parameter_id: ParameterId, cost: Decimal) -> Self {
        Self {
            quotation_id,
            parameter_id,
            cost,
            result: "None".to_string(),
            is_delete: false,
            is_active: true,
        }
    }
}

/// Body of `PUT /order_parameters/result/{quotation_id}/{parameter_id}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultUpdate {
    pub result: String,
    pub protocol_used: Option<String>,
    pub home_protocol: Option<String>,
}
