use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{Parameter, ParameterId, ParameterInput};
use crate::services::catalog::ParameterCatalog;
use std::sync::Arc;
use tracing::{info, instrument};

/// Range and protocol values set on an existing parameter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterValues {
    pub min_range: Option<f64>,
    pub max_range: Option<f64>,
    pub is_3025_method: Option<String>,
    pub apha_24th_edition_method: Option<String>,
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// In the create/edit form only one protocol is kept: APHA when both are
/// filled in.
fn single_protocol(mut input: ParameterInput) -> ParameterInput {
    input.name = input.name.trim().to_string();
    input.unit = blank_to_none(input.unit);
    input.is_3025_method = blank_to_none(input.is_3025_method);
    input.apha_24th_edition_method = blank_to_none(input.apha_24th_edition_method);
    if input.apha_24th_edition_method.is_some() {
        input.is_3025_method = None;
    }
    input
}

/// Catalog maintenance with validation ahead of every call.
#[derive(Clone)]
pub struct ParameterAdmin {
    api: Arc<dyn LabApi>,
}

impl ParameterAdmin {
    pub fn new(api: Arc<dyn LabApi>) -> Self {
        Self { api }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: ParameterInput) -> Result<Parameter, ServiceError> {
        let input = single_protocol(input);
        input.validate_all()?;
        if let Some(parent) = input.parent_id {
            if self.api.get_parameter(parent).await?.is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Parent parameter {} not found",
                    parent
                )));
            }
        }
        let created = self.api.create_parameter(&input).await?;
        info!(parameter_id = created.id, "parameter created");
        Ok(created)
    }

    /// Re-parenting under one of its own descendants is refused.
    #[instrument(skip(self, input))]
    pub async fn update(&self, id: ParameterId, input: ParameterInput) -> Result<(), ServiceError> {
        let input = single_protocol(input);
        input.validate_all()?;

        if let Some(parent) = input.parent_id {
            let catalog = ParameterCatalog::load(self.api.as_ref()).await?;
            if parent == id || catalog.ancestors(parent).iter().any(|p| p.id == id) {
                return Err(ServiceError::InvalidOperation(format!(
                    "Parameter {} cannot be moved under its own descendant {}",
                    id, parent
                )));
            }
            if catalog.get(parent).is_none() {
                return Err(ServiceError::NotFound(format!(
                    "Parent parameter {} not found",
                    parent
                )));
            }
        }

        self.api.update_parameter(id, &input).await?;
        info!(parameter_id = id, "parameter updated");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: ParameterId) -> Result<(), ServiceError> {
        let catalog = ParameterCatalog::load(self.api.as_ref()).await?;
        let children = catalog.children_of(Some(id));
        if !children.is_empty() {
            return Err(ServiceError::InvalidOperation(format!(
                "Parameter {} still has {} child parameter(s)",
                id,
                children.len()
            )));
        }
        self.api.delete_parameter(id).await?;
        info!(parameter_id = id, "parameter deleted");
        Ok(())
    }

    /// Parameters eligible for the value-set flow: those not used as a parent.
    pub async fn value_set_candidates(&self) -> Result<Vec<Parameter>, ServiceError> {
        let catalog = ParameterCatalog::load(self.api.as_ref()).await?;
        Ok(catalog
            .unparented_ids()
            .into_iter()
            .filter_map(|id| catalog.get(id).cloned())
            .collect())
    }

    /// Sets range and protocols, keeping both protocols if given.
    #[instrument(skip(self, values))]
    pub async fn set_values(&self, id: ParameterId, values: ParameterValues) -> Result<Parameter, ServiceError> {
        let catalog = ParameterCatalog::load(self.api.as_ref()).await?;
        let current = catalog
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("Parameter {} not found", id)))?;
        if catalog.has_children(id) {
            return Err(ServiceError::InvalidOperation(format!(
                "'{}' is used as a parent; values are set on its children",
                current.name
            )));
        }

        let mut input = ParameterInput::from(&current);
        input.min_range = values.min_range;
        input.max_range = values.max_range;
        input.is_3025_method = blank_to_none(values.is_3025_method);
        input.apha_24th_edition_method = blank_to_none(values.apha_24th_edition_method);
        input.validate_all()?;

        self.api.update_parameter(id, &input).await?;
        info!(parameter_id = id, "parameter values set");

        let mut updated = Parameter::from_input(id, &input);
        updated.is_active = current.is_active;
        updated.is_delete = current.is_delete;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apha_wins_in_form_input() {
        let input = single_protocol(ParameterInput {
            name: " pH ".into(),
            is_3025_method: Some("IS:3025 (Part 11)".into()),
            apha_24th_edition_method: Some("4500-H+ B".into()),
            unit: Some("  ".into()),
            ..ParameterInput::default()
        });
        assert_eq!(input.name, "pH");
        assert_eq!(input.is_3025_method, None);
        assert_eq!(input.apha_24th_edition_method.as_deref(), Some("4500-H+ B"));
        assert_eq!(input.unit, None);
    }

    #[test]
    fn is_method_kept_when_alone() {
        let input = single_protocol(ParameterInput {
            name: "pH".into(),
            is_3025_method: Some("IS:3025 (Part 11)".into()),
            apha_24th_edition_method: Some(String::new()),
            ..ParameterInput::default()
        });
        assert_eq!(input.is_3025_method.as_deref(), Some("IS:3025 (Part 11)"));
        assert_eq!(input.apha_24th_edition_method, None);
    }
}
