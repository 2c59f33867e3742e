use super::{lenient, OrderId, SampleId};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};
use validator::{Validate, ValidationError};

#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, EnumIter, Serialize, Deserialize,
)]
#[strum(ascii_case_insensitive)]
pub enum SampleCondition {
    Good,
    Average,
    Bad,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub id: SampleId,
    pub order_id: OrderId,
    #[serde(default, deserialize_with = "lenient::text")]
    pub sample_type: String,
    #[serde(
        default,
        alias = "collection_date",
        deserialize_with = "lenient::optional_date"
    )]
    pub collect_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::optional_date")]
    pub receipt_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub collected_by: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub particulars: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub location: String,
    #[serde(default, deserialize_with = "lenient::text")]
    pub quantity: String,
    #[serde(default, deserialize_with = "lenient_condition")]
    pub condition: Option<SampleCondition>,
}

fn lenient_condition<'de, D>(deserializer: D) -> Result<Option<SampleCondition>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(lenient::optional_text(deserializer)?.and_then(|raw| raw.parse().ok()))
}

impl Sample {
    pub fn from_input(id: SampleId, input: &SampleInput) -> Self {
        Self {
            id,
            order_id: input.order_id,
            sample_type: input.sample_type.clone(),
            collect_date: Some(input.collect_date),
            receipt_date: Some(input.receipt_date),
            collected_by: input.collected_by.clone(),
            particulars: input.particulars.clone(),
            location: input.location.clone(),
            quantity: input.quantity.clone(),
            condition: Some(input.condition),
        }
    }
}

/// Body for sample create/update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_sample_dates"))]
pub struct SampleInput {
    pub order_id: OrderId,
    #[validate(length(min = 1, message = "Sample type is required"))]
    pub sample_type: String,
    pub collect_date: NaiveDate,
    pub receipt_date: NaiveDate,
    #[validate(length(min = 1, message = "Collected by is required"))]
    pub collected_by: String,
    pub particulars: String,
    pub location: String,
    #[validate(length(min = 1, message = "Quantity is required"))]
    pub quantity: String,
    pub condition: SampleCondition,
}

fn validate_sample_dates(input: &SampleInput) -> Result<(), ValidationError> {
    if input.receipt_date < input.collect_date {
        let mut err = ValidationError::new("receipt_date");
        err.message = Some("Receipt date cannot be before the collection date".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn input() -> SampleInput {
        SampleInput {
            order_id: 1,
            sample_type: "Drinking water".into(),
            collect_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            receipt_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            collected_by: "Client".into(),
            particulars: "Borewell".into(),
            location: "Plant A".into(),
            quantity: "2 L".into(),
            condition: SampleCondition::Good,
        }
    }

    #[test]
    fn receipt_before_collection_is_rejected() {
        assert!(input().validate().is_ok());
        let bad = SampleInput {
            receipt_date: NaiveDate::from_ymd_opt(2024, 4, 30).unwrap(),
            ..input()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn api_dates_with_time_part_parse() {
        let sample: Sample = serde_json::from_value(json!({
            "id": 2,
            "order_id": 1,
            "sample_type": "Effluent",
            "collection_date": "2024-05-01T00:00:00",
            "receipt_date": "2024-05-02",
            "condition": "Average"
        }))
        .unwrap();
        assert_eq!(sample.collect_date, NaiveDate::from_ymd_opt(2024, 5, 1));
        assert_eq!(sample.condition, Some(SampleCondition::Average));
        assert_eq!("bad".parse::<SampleCondition>().unwrap(), SampleCondition::Bad);
    }
}
