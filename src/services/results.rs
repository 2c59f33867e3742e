use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::parameter::range_label;
use crate::models::{OrderParameter, Parameter, ParameterId, QuotationId, ResultUpdate};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Where a numeric result falls relative to the configured range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RangeCheck {
    Within,
    Below,
    Above,
    NotNumeric,
    NoRange,
}

pub fn check_range(result: &str, min: Option<f64>, max: Option<f64>) -> RangeCheck {
    if min.is_none() && max.is_none() {
        return RangeCheck::NoRange;
    }
    // `f64` parsing also accepts "NaN" and "inf", which no range can hold.
    let value = match result.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => return RangeCheck::NotNumeric,
    };
    match (min, max) {
        (Some(min), _) if value < min => RangeCheck::Below,
        (_, Some(max)) if value > max => RangeCheck::Above,
        _ => RangeCheck::Within,
    }
}

/// An order parameter joined with its catalog record for display.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResultRow {
    pub order_parameter: OrderParameter,
    pub name: String,
    pub unit: Option<String>,
    pub min_range: Option<f64>,
    pub max_range: Option<f64>,
    pub protocol_options: Vec<String>,
}

impl ResultRow {
    pub fn new(order_parameter: OrderParameter, parameter: Option<&Parameter>) -> Self {
        let name = parameter
            .map(|p| p.name.clone())
            .unwrap_or_else(|| format!("Parameter {}", order_parameter.parameter_id));
        Self {
            name,
            unit: parameter.and_then(|p| p.unit.clone()),
            min_range: parameter.and_then(|p| p.min_range),
            max_range: parameter.and_then(|p| p.max_range),
            protocol_options: parameter
                .map(|p| p.protocol_options().into_iter().map(str::to_string).collect())
                .unwrap_or_default(),
            order_parameter,
        }
    }

    pub fn parameter_id(&self) -> ParameterId {
        self.order_parameter.parameter_id
    }

    pub fn range_label(&self) -> String {
        range_label(self.min_range, self.max_range)
    }
}

/// What the operator typed for one row.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub parameter_id: ParameterId,
    pub result: String,
    /// One of the row's protocol options.
    pub protocol: Option<String>,
    /// Free-text protocol; wins over `protocol` when non-empty.
    pub home_protocol: Option<String>,
}

/// Builds the PUT body for one row; `Ok(None)` means the row stays pending.
pub fn build_update(row: &ResultRow, entry: &ResultEntry) -> Result<Option<ResultUpdate>, ServiceError> {
    let result = entry.result.trim();
    if result.is_empty() {
        return Ok(None);
    }

    let home = entry
        .home_protocol
        .as_deref()
        .map(str::trim)
        .filter(|h| !h.is_empty());
    if let Some(home) = home {
        return Ok(Some(ResultUpdate {
            result: result.to_string(),
            protocol_used: Some(home.to_string()),
            home_protocol: Some(home.to_string()),
        }));
    }

    let choice = entry
        .protocol
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    let protocol_used = match (choice, row.protocol_options.as_slice()) {
        (Some(choice), options) if options.iter().any(|o| o == choice) => Some(choice.to_string()),
        (Some(choice), _) => {
            return Err(ServiceError::validation(format!(
                "'{}' is not a protocol of {}",
                choice, row.name
            )))
        }
        (None, [only]) => Some(only.clone()),
        (None, []) => None,
        (None, _) => {
            return Err(ServiceError::validation(format!(
                "Choose a protocol for {} or enter a home protocol",
                row.name
            )))
        }
    };

    Ok(Some(ResultUpdate {
        result: result.to_string(),
        protocol_used,
        home_protocol: None,
    }))
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RowStatus {
    Saved,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RowOutcome {
    pub parameter_id: ParameterId,
    pub name: String,
    pub result: String,
    pub range: RangeCheck,
    #[serde(flatten)]
    pub status: RowStatus,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ResultReport {
    pub rows: Vec<RowOutcome>,
    /// Rows left without a result.
    pub pending: Vec<ParameterId>,
}

impl ResultReport {
    pub fn all_saved(&self) -> bool {
        self.rows.iter().all(|r| r.status == RowStatus::Saved)
    }

    pub fn out_of_range(&self) -> impl Iterator<Item = &RowOutcome> {
        self.rows
            .iter()
            .filter(|r| matches!(r.range, RangeCheck::Below | RangeCheck::Above))
    }
}

/// A row of the exported result table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ExportRow {
    #[serde(rename = "Parameter")]
    pub parameter: String,
    #[serde(rename = "Result")]
    pub result: String,
    #[serde(rename = "Unit")]
    pub unit: String,
    #[serde(rename = "Protocol")]
    pub protocol: String,
}

/// Rows that have a result, in display order.
pub fn export_rows(rows: &[ResultRow]) -> Vec<ExportRow> {
    rows.iter()
        .filter_map(|row| {
            let result = row.order_parameter.result.clone()?;
            Some(ExportRow {
                parameter: row.name.clone(),
                result,
                unit: row.unit.clone().unwrap_or_default(),
                protocol: row.order_parameter.protocol_used.clone().unwrap_or_default(),
            })
        })
        .collect()
}

pub fn write_csv<W: Write>(rows: &[ExportRow], writer: W) -> Result<(), ServiceError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[derive(Clone)]
pub struct ResultService {
    api: Arc<dyn LabApi>,
}

impl ResultService {
    pub fn new(api: Arc<dyn LabApi>) -> Self {
        Self { api }
    }

    /// Non-deleted order parameters of a quotation with their catalog data.
    #[instrument(skip(self))]
    pub async fn rows(&self, quotation_id: QuotationId) -> Result<Vec<ResultRow>, ServiceError> {
        let order_parameters = self.api.order_parameters(quotation_id).await?;
        let mut rows = Vec::with_capacity(order_parameters.len());
        for op in order_parameters.into_iter().filter(|op| !op.is_deleted()) {
            let parameter = self.api.get_parameter(op.parameter_id).await?;
            if parameter.is_none() {
                warn!(parameter_id = op.parameter_id, "order parameter refers to unknown parameter");
            }
            rows.push(ResultRow::new(op, parameter.as_ref()));
        }
        Ok(rows)
    }

    /// Validates every entry, then sends the non-empty ones concurrently.
    /// Each row succeeds or fails on its own.
    #[instrument(skip(self, entries), fields(entries = entries.len()))]
    pub async fn submit(
        &self,
        quotation_id: QuotationId,
        entries: &[ResultEntry],
    ) -> Result<ResultReport, ServiceError> {
        let rows = self.rows(quotation_id).await?;
        let mut planned = Vec::new();
        let mut report = ResultReport::default();

        for entry in entries {
            let row = rows
                .iter()
                .find(|r| r.parameter_id() == entry.parameter_id)
                .ok_or_else(|| {
                    ServiceError::NotFound(format!(
                        "Parameter {} is not part of quotation {}",
                        entry.parameter_id, quotation_id
                    ))
                })?;
            match build_update(row, entry)? {
                Some(update) => {
                    let range = check_range(&update.result, row.min_range, row.max_range);
                    planned.push((row, update, range));
                }
                None => report.pending.push(entry.parameter_id),
            }
        }

        let api = &self.api;
        let sends = planned.iter().map(|(row, update, _)| async move {
            api.update_result(quotation_id, row.parameter_id(), update).await
        });
        let responses = join_all(sends).await;

        for ((row, update, range), response) in planned.iter().zip(responses) {
            let status = match response {
                Ok(()) => RowStatus::Saved,
                Err(err) => {
                    warn!(parameter_id = row.parameter_id(), error = %err, "result not saved");
                    RowStatus::Failed {
                        error: err.to_string(),
                    }
                }
            };
            if matches!(range, RangeCheck::Below | RangeCheck::Above) {
                warn!(parameter_id = row.parameter_id(), result = %update.result, %range, "result outside configured range");
            }
            report.rows.push(RowOutcome {
                parameter_id: row.parameter_id(),
                name: row.name.clone(),
                result: update.result.clone(),
                range: *range,
                status,
            });
        }

        info!(
            saved = report.rows.iter().filter(|r| r.status == RowStatus::Saved).count(),
            pending = report.pending.len(),
            "results submitted"
        );
        Ok(report)
    }

    /// True when every non-deleted order parameter has a result.
    pub async fn is_complete(&self, quotation_id: QuotationId) -> Result<bool, ServiceError> {
        let rows = self.rows(quotation_id).await?;
        Ok(!rows.is_empty() && rows.iter().all(|r| r.order_parameter.has_result()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    fn row(options: &[&str]) -> ResultRow {
        ResultRow {
            order_parameter: OrderParameter {
                id: 1,
                quotation_id: 9,
                parameter_id: 4,
                cost: None,
                result: None,
                protocol_used: None,
                home_protocol: None,
                is_active: Some(true),
                is_delete: Some(false),
            },
            name: "pH".into(),
            unit: None,
            min_range: Some(6.5),
            max_range: Some(8.5),
            protocol_options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    fn entry(result: &str, protocol: Option<&str>, home: Option<&str>) -> ResultEntry {
        ResultEntry {
            parameter_id: 4,
            result: result.into(),
            protocol: protocol.map(str::to_string),
            home_protocol: home.map(str::to_string),
        }
    }

    #[rstest]
    #[case("7.2", RangeCheck::Within)]
    #[case("6.5", RangeCheck::Within)]
    #[case("5.9", RangeCheck::Below)]
    #[case("9", RangeCheck::Above)]
    #[case("NaN", RangeCheck::NotNumeric)]
    #[case("inf", RangeCheck::NotNumeric)]
    #[case("-infinity", RangeCheck::NotNumeric)]
    #[case("BDL", RangeCheck::NotNumeric)]
    fn range_flags(#[case] result: &str, #[case] expected: RangeCheck) {
        assert_eq!(check_range(result, Some(6.5), Some(8.5)), expected);
    }

    #[test]
    fn no_range_configured() {
        assert_eq!(check_range("12", None, None), RangeCheck::NoRange);
    }

    #[test]
    fn both_protocols_require_a_choice() {
        let row = row(&["IS:3025", "APHA 4500"]);
        assert_matches!(
            build_update(&row, &entry("7.1", None, None)),
            Err(ServiceError::ValidationError(_))
        );
        let update = build_update(&row, &entry("7.1", Some("APHA 4500"), None))
            .unwrap()
            .unwrap();
        assert_eq!(update.protocol_used.as_deref(), Some("APHA 4500"));
    }

    #[test]
    fn home_protocol_wins() {
        let row = row(&["IS:3025", "APHA 4500"]);
        let update = build_update(&row, &entry("7.1", Some("IS:3025"), Some("Internal SOP-4")))
            .unwrap()
            .unwrap();
        assert_eq!(update.protocol_used.as_deref(), Some("Internal SOP-4"));
        assert_eq!(update.home_protocol.as_deref(), Some("Internal SOP-4"));
    }

    #[test]
    fn single_protocol_is_implied_and_blank_result_skipped() {
        let row = row(&["IS:3025"]);
        let update = build_update(&row, &entry("7.1", None, None)).unwrap().unwrap();
        assert_eq!(update.protocol_used.as_deref(), Some("IS:3025"));
        assert_eq!(build_update(&row, &entry("   ", None, None)).unwrap(), None);
    }

    #[test]
    fn export_skips_rows_without_result() {
        let mut with_result = row(&["IS:3025"]);
        with_result.order_parameter.result = Some("7.1".into());
        with_result.order_parameter.protocol_used = Some("IS:3025".into());
        with_result.unit = Some("pH units".into());
        let rows = export_rows(&[with_result, row(&[])]);
        assert_eq!(rows.len(), 1);

        let mut out = Vec::new();
        write_csv(&rows, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "Parameter,Result,Unit,Protocol\npH,7.1,pH units,IS:3025\n");
    }
}
