use crate::errors::ServiceError;
use crate::models::{Parameter, ParameterId, ParameterLine};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// A selected test with its quoted price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BasketEntry {
    pub parameter_id: ParameterId,
    pub name: String,
    pub unit_cost: Decimal,
    pub quantity: u32,
}

impl BasketEntry {
    pub fn line_total(&self) -> Decimal {
        self.unit_cost * Decimal::from(self.quantity)
    }
}

/// The tests picked in the current session, keyed by parameter id.
///
/// Selections are independent of how the catalog is being viewed, so they
/// survive switching between the hierarchy and search results.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionBasket {
    entries: BTreeMap<ParameterId, BasketEntry>,
}

impl SelectionBasket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checking inserts the parameter (or refreshes its name and price while
    /// keeping the quantity); unchecking removes it.
    pub fn toggle_select(&mut self, parameter: &Parameter, checked: bool) -> Result<(), ServiceError> {
        if !checked {
            self.entries.remove(&parameter.id);
            debug!(parameter_id = parameter.id, "deselected");
            return Ok(());
        }

        let unit_cost = parameter.price.ok_or_else(|| {
            ServiceError::validation(format!(
                "'{}' is a category and cannot be selected",
                parameter.name
            ))
        })?;

        let quantity = self
            .entries
            .get(&parameter.id)
            .map(|entry| entry.quantity)
            .unwrap_or(1);

        self.entries.insert(
            parameter.id,
            BasketEntry {
                parameter_id: parameter.id,
                name: parameter.name.clone(),
                unit_cost,
                quantity,
            },
        );
        debug!(parameter_id = parameter.id, quantity, "selected");
        Ok(())
    }

    pub fn set_quantity(&mut self, parameter_id: ParameterId, quantity: u32) -> Result<(), ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::validation("Quantity must be at least 1"));
        }
        let entry = self.entries.get_mut(&parameter_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Parameter {} is not in the basket", parameter_id))
        })?;
        entry.quantity = quantity;
        Ok(())
    }

    pub fn grand_total(&self) -> Decimal {
        self.entries.values().map(BasketEntry::line_total).sum()
    }

    pub fn is_selected(&self, parameter_id: ParameterId) -> bool {
        self.entries.contains_key(&parameter_id)
    }

    pub fn get(&self, parameter_id: ParameterId) -> Option<&BasketEntry> {
        self.entries.get(&parameter_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &BasketEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Lines frozen into a quotation, in parameter id order.
    pub fn to_parameter_lines(&self) -> Vec<ParameterLine> {
        self.entries
            .values()
            .map(|entry| ParameterLine {
                parameter_id: entry.parameter_id,
                name: entry.name.clone(),
                cost: entry.unit_cost,
                quantity: entry.quantity,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;

    fn leaf(id: ParameterId, name: &str, price: Decimal) -> Parameter {
        Parameter {
            id,
            name: name.into(),
            parent_id: None,
            price: Some(price),
            unit: None,
            min_range: None,
            max_range: None,
            is_3025_method: None,
            apha_24th_edition_method: None,
            is_active: Some(true),
            is_delete: Some(false),
        }
    }

    #[test]
    fn reselecting_keeps_quantity() {
        let ph = leaf(4, "pH", dec!(100));
        let mut basket = SelectionBasket::new();
        basket.toggle_select(&ph, true).unwrap();
        basket.set_quantity(4, 3).unwrap();
        basket.toggle_select(&ph, true).unwrap();
        assert_eq!(basket.get(4).unwrap().quantity, 3);
        assert_eq!(basket.grand_total(), dec!(300));
    }

    #[test]
    fn category_cannot_be_selected() {
        let mut category = leaf(1, "Water Tests", dec!(0));
        category.price = None;
        let mut basket = SelectionBasket::new();
        assert_matches!(
            basket.toggle_select(&category, true),
            Err(ServiceError::ValidationError(_))
        );
        assert!(basket.is_empty());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut basket = SelectionBasket::new();
        basket.toggle_select(&leaf(4, "pH", dec!(100)), true).unwrap();
        assert_matches!(basket.set_quantity(4, 0), Err(ServiceError::ValidationError(_)));
        assert_matches!(basket.set_quantity(99, 2), Err(ServiceError::NotFound(_)));
        assert_eq!(basket.get(4).unwrap().quantity, 1);
    }

    #[test]
    fn basket_round_trips_through_json() {
        let mut basket = SelectionBasket::new();
        basket.toggle_select(&leaf(4, "pH", dec!(100)), true).unwrap();
        let json = serde_json::to_string(&basket).unwrap();
        let restored: SelectionBasket = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, basket);
    }
}
