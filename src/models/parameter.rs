use super::{lenient, ParameterId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A node of the test catalog.
///
/// A parameter with a price is a sellable test; one without is a category.
/// Any parameter may be a parent, including priced ones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub id: ParameterId,
    #[serde(deserialize_with = "lenient::text")]
    pub name: String,
    #[serde(default)]
    pub parent_id: Option<ParameterId>,
    #[serde(default, deserialize_with = "lenient::optional_decimal")]
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_f64")]
    pub min_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_f64")]
    pub max_range: Option<f64>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub is_3025_method: Option<String>,
    #[serde(default, deserialize_with = "lenient::optional_text")]
    pub apha_24th_edition_method: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_delete: Option<bool>,
}

impl Parameter {
    pub fn from_input(id: ParameterId, input: &ParameterInput) -> Self {
        Self {
            id,
            name: input.name.clone(),
            parent_id: input.parent_id,
            price: input.price,
            unit: input.unit.clone(),
            min_range: input.min_range,
            max_range: input.max_range,
            is_3025_method: input.is_3025_method.clone(),
            apha_24th_edition_method: input.apha_24th_edition_method.clone(),
            is_active: Some(true),
            is_delete: Some(false),
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.price.is_some()
    }

    pub fn is_category(&self) -> bool {
        self.price.is_none()
    }

    /// Soft-deleted and deactivated parameters never show up in catalog views.
    pub fn is_visible(&self) -> bool {
        !self.is_delete.unwrap_or(false) && self.is_active.unwrap_or(true)
    }

    /// Protocol names offered for result entry, IS method first.
    pub fn protocol_options(&self) -> Vec<&str> {
        [&self.is_3025_method, &self.apha_24th_edition_method]
            .into_iter()
            .filter_map(|method| method.as_deref())
            .collect()
    }

    pub fn has_both_protocols(&self) -> bool {
        self.is_3025_method.is_some() && self.apha_24th_edition_method.is_some()
    }

    pub fn range_label(&self) -> String {
        range_label(self.min_range, self.max_range)
    }
}

/// "min - max" for display, or an empty string when no range is configured.
pub fn range_label(min: Option<f64>, max: Option<f64>) -> String {
    match (min, max) {
        (Some(min), Some(max)) => format!("{min} - {max}"),
        (Some(min), None) => format!(">= {min}"),
        (None, Some(max)) => format!("<= {max}"),
        (None, None) => String::new(),
    }
}

/// Payload for `POST /parameter/` and `PUT /parameter/{id}`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct ParameterInput {
    #[validate(length(min = 1, message = "Parameter name is required"))]
    pub name: String,
    pub parent_id: Option<ParameterId>,
    #[validate(custom = "validate_price")]
    pub price: Option<Decimal>,
    pub unit: Option<String>,
    #[validate(range(min = 0.0, message = "Minimum range cannot be negative"))]
    pub min_range: Option<f64>,
    #[validate(range(min = 0.0, message = "Maximum range cannot be negative"))]
    pub max_range: Option<f64>,
    pub is_3025_method: Option<String>,
    pub apha_24th_edition_method: Option<String>,
}

impl ParameterInput {
    /// Validates field constraints plus the cross-field `min <= max` rule.
    pub fn validate_all(&self) -> Result<(), validator::ValidationErrors> {
        let mut result = self.validate();
        if let (Some(min), Some(max)) = (self.min_range, self.max_range) {
            if min > max {
                let mut err = ValidationError::new("range_order");
                err.message = Some("Minimum range cannot be greater than maximum range".into());
                let mut errors = result.err().unwrap_or_else(validator::ValidationErrors::new);
                errors.add("min_range", err);
                result = Err(errors);
            }
        }
        result
    }
}

impl From<&Parameter> for ParameterInput {
    fn from(parameter: &Parameter) -> Self {
        Self {
            name: parameter.name.clone(),
            parent_id: parameter.parent_id,
            price: parameter.price,
            unit: parameter.unit.clone(),
            min_range: parameter.min_range,
            max_range: parameter.max_range,
            is_3025_method: parameter.is_3025_method.clone(),
            apha_24th_edition_method: parameter.apha_24th_edition_method.clone(),
        }
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        let mut err = ValidationError::new("price");
        err.message = Some("Price cannot be negative".into());
        return Err(err);
    }
    Ok(())
}
