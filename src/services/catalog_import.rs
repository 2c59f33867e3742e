//! Bulk loading of the catalog from a price list and a unit/method sheet.

use crate::client::LabApi;
use crate::errors::ServiceError;
use crate::models::{lenient::normalize_text, Parameter, ParameterId, ParameterInput};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::str::FromStr;
use tracing::{info, instrument, warn};

const PRICE_SEPARATOR: &str = "====";
const INDENT_WIDTH: usize = 4;

static TRAILING_EQUALS: Lazy<Regex> = Lazy::new(|| Regex::new(r"=+$").expect("valid regex"));

/// One non-blank line of an indented price list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PriceListLine {
    pub line_no: usize,
    pub level: usize,
    pub name: String,
    pub price: Option<Decimal>,
    /// Index into the parsed lines of the enclosing unpriced line.
    pub parent: Option<usize>,
}

fn clean_name(raw: &str) -> String {
    let without_quotes: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\u{201c}' | '\u{201d}'))
        .collect();
    TRAILING_EQUALS
        .replace(without_quotes.trim(), "")
        .trim()
        .to_string()
}

fn parse_price(raw: &str, line_no: usize) -> Result<Option<Decimal>, ServiceError> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '=' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    Decimal::from_str(&cleaned)
        .map(Some)
        .map_err(|_| ServiceError::validation(format!("line {}: invalid price '{}'", line_no, raw.trim())))
}

/// Parses `name ==== price` lines nested by indentation.
///
/// Tabs count as four spaces and every four leading spaces is one level.
/// Only unpriced lines open a scope, so a priced line never gets children.
pub fn parse_price_list(text: &str) -> Result<Vec<PriceListLine>, ServiceError> {
    let mut lines: Vec<PriceListLine> = Vec::new();
    let mut scopes: Vec<(usize, usize)> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        if raw.trim().is_empty() {
            continue;
        }
        let expanded = raw.replace('\t', "    ");
        let indent = expanded.len() - expanded.trim_start_matches(' ').len();
        let level = indent / INDENT_WIDTH;

        let (name, price) = match expanded.rsplit_once(PRICE_SEPARATOR) {
            Some((name, price)) => (clean_name(name), parse_price(price, line_no)?),
            None => (clean_name(&expanded), None),
        };
        if name.is_empty() {
            return Err(ServiceError::validation(format!("line {}: missing name", line_no)));
        }

        while scopes.last().is_some_and(|(scope_level, _)| *scope_level >= level) {
            scopes.pop();
        }
        let parent = scopes.last().map(|(_, position)| *position);

        if price.is_none() {
            scopes.push((level, lines.len()));
        }
        lines.push(PriceListLine {
            line_no,
            level,
            name,
            price,
            parent,
        });
    }
    Ok(lines)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportedLine {
    pub line_no: usize,
    pub name: String,
    pub parameter_id: ParameterId,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct RejectedLine {
    pub line_no: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImportOutcome {
    pub created: Vec<ImportedLine>,
    pub failed: Vec<RejectedLine>,
    /// Lines whose parent failed or was itself skipped.
    pub skipped: Vec<RejectedLine>,
}

impl ImportOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Creates the parsed lines parents-first, mapping local positions to the
/// ids the API assigns.
#[instrument(skip(api, lines), fields(lines = lines.len()))]
pub async fn import_price_list(api: &dyn LabApi, lines: &[PriceListLine]) -> ImportOutcome {
    let mut outcome = ImportOutcome::default();
    let mut created_ids: HashMap<usize, ParameterId> = HashMap::new();

    for (position, line) in lines.iter().enumerate() {
        let parent_id = match line.parent {
            None => None,
            Some(parent) => match created_ids.get(&parent) {
                Some(id) => Some(*id),
                None => {
                    outcome.skipped.push(RejectedLine {
                        line_no: line.line_no,
                        name: line.name.clone(),
                        reason: format!("parent on line {} was not created", lines[parent].line_no),
                    });
                    continue;
                }
            },
        };

        let input = ParameterInput {
            name: line.name.clone(),
            parent_id,
            price: line.price,
            ..ParameterInput::default()
        };
        match api.create_parameter(&input).await {
            Ok(parameter) => {
                created_ids.insert(position, parameter.id);
                outcome.created.push(ImportedLine {
                    line_no: line.line_no,
                    name: line.name.clone(),
                    parameter_id: parameter.id,
                });
            }
            Err(err) => {
                warn!(line_no = line.line_no, name = %line.name, error = %err, "import line failed");
                outcome.failed.push(RejectedLine {
                    line_no: line.line_no,
                    name: line.name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        created = outcome.created.len(),
        failed = outcome.failed.len(),
        skipped = outcome.skipped.len(),
        "price list import finished"
    );
    outcome
}

/// A row of the unit/method sheet.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct MethodSheetRow {
    #[serde(rename = "Processed_Name")]
    pub processed_name: String,
    #[serde(rename = "Unit", default)]
    pub unit: Option<String>,
    #[serde(rename = "IS 3025 Method", default)]
    pub is_3025_method: Option<String>,
    #[serde(rename = "APHA 24th Edition Method", default)]
    pub apha_24th_edition_method: Option<String>,
}

pub fn read_method_sheet<R: Read>(reader: R) -> Result<Vec<MethodSheetRow>, ServiceError> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for record in csv_reader.deserialize::<MethodSheetRow>() {
        let mut row = record?;
        row.unit = row.unit.as_deref().and_then(normalize_text);
        row.is_3025_method = row.is_3025_method.as_deref().and_then(normalize_text);
        row.apha_24th_edition_method = row.apha_24th_edition_method.as_deref().and_then(normalize_text);
        rows.push(row);
    }
    Ok(rows)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct MethodSheetOutcome {
    pub updated: usize,
    pub inserted: usize,
    pub failed: Vec<RejectedLine>,
}

/// Applies unit and methods to every parameter whose name contains the row
/// name (case-insensitive); rows matching nothing become new unpriced
/// parameters.
#[instrument(skip(api, rows), fields(rows = rows.len()))]
pub async fn apply_method_sheet(
    api: &dyn LabApi,
    rows: &[MethodSheetRow],
) -> Result<MethodSheetOutcome, ServiceError> {
    let existing: Vec<Parameter> = api.list_parameters().await?;
    let mut outcome = MethodSheetOutcome::default();

    for (index, row) in rows.iter().enumerate() {
        let line_no = index + 2;
        let needle = row.processed_name.trim().to_lowercase();
        if needle.is_empty() {
            continue;
        }

        let matches: Vec<&Parameter> = existing
            .iter()
            .filter(|p| p.name.trim().to_lowercase().contains(&needle))
            .collect();

        if matches.is_empty() {
            let input = ParameterInput {
                name: row.processed_name.trim().to_string(),
                unit: row.unit.clone(),
                is_3025_method: row.is_3025_method.clone(),
                apha_24th_edition_method: row.apha_24th_edition_method.clone(),
                ..ParameterInput::default()
            };
            match api.create_parameter(&input).await {
                Ok(_) => outcome.inserted += 1,
                Err(err) => outcome.failed.push(RejectedLine {
                    line_no,
                    name: row.processed_name.clone(),
                    reason: err.to_string(),
                }),
            }
            continue;
        }

        for parameter in matches {
            let mut input = ParameterInput::from(parameter);
            input.unit = row.unit.clone();
            input.is_3025_method = row.is_3025_method.clone();
            input.apha_24th_edition_method = row.apha_24th_edition_method.clone();
            match api.update_parameter(parameter.id, &input).await {
                Ok(()) => outcome.updated += 1,
                Err(err) => outcome.failed.push(RejectedLine {
                    line_no,
                    name: parameter.name.clone(),
                    reason: err.to_string(),
                }),
            }
        }
    }

    info!(
        updated = outcome.updated,
        inserted = outcome.inserted,
        failed = outcome.failed.len(),
        "method sheet applied"
    );
    Ok(outcome)
}
