use super::{lenient, CustomerId, OrderId, ParameterId, QuotationId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One priced line frozen into a quotation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParameterLine {
    pub parameter_id: ParameterId,
    #[serde(default, deserialize_with = "lenient::text")]
    pub name: String,
    pub cost: Decimal,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

impl ParameterLine {
    pub fn line_total(&self) -> Decimal {
        self.cost * Decimal::from(self.quantity)
    }
}

fn default_quantity() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    #[serde(default)]
    pub order_id: Option<OrderId>,
    #[serde(default)]
    pub customer_id: Option<CustomerId>,
    #[serde(default)]
    pub parameter_info: Vec<ParameterLine>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub pdf_url: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_datetime")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Quotation {
    pub fn total(&self) -> Decimal {
        self.parameter_info.iter().map(ParameterLine::line_total).sum()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NewQuotation {
    pub customer_id: CustomerId,
    pub order_id: OrderId,
    pub parameter_info: Vec<ParameterLine>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn line_total_is_cost_times_quantity() {
        let quotation: Quotation = serde_json::from_value(json!({
            "id": 7,
            "order_id": 3,
            "customer_id": 2,
            "parameter_info": [
                { "parameter_id": 4, "name": "pH", "cost": 500, "quantity": 2 },
                { "parameter_id": 5, "name": "TDS", "cost": "150.50" }
            ],
            "pdf_url": "None",
            "created_at": "2024-05-01T09:30:00"
        }))
        .unwrap();

        assert_eq!(quotation.parameter_info[0].line_total(), dec!(1000));
        assert_eq!(quotation.parameter_info[1].quantity, 1);
        assert_eq!(quotation.total(), dec!(1150.50));
        assert_eq!(quotation.pdf_url, None);
        assert!(quotation.created_at.is_some());
    }
}
