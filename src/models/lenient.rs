//! Deserializers that absorb the loose typing of the laboratory API.
//!
//! The API stores the literal text `"None"` for missing results, sends prices
//! as numbers or numeric strings, and mixes timestamp formats. Everything is
//! normalized here so the rest of the crate sees plain `Option`s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Returns `None` for the spellings the API uses for "absent".
pub fn normalize_text(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "None" || trimmed.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    Ok(match value {
        None => None,
        Some(Scalar::Text(text)) => normalize_text(&text),
        Some(Scalar::Int(n)) => Some(n.to_string()),
        Some(Scalar::Float(f)) => Some(f.to_string()),
        Some(Scalar::Bool(b)) => Some(b.to_string()),
    })
}

/// Like [`optional_text`] but collapses absence to an empty string.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(optional_text(deserializer)?.unwrap_or_default())
}

pub fn optional_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(Scalar::Int(n)) => Ok(Some(Decimal::from(n))),
        Some(Scalar::Float(f)) => Decimal::from_f64(f)
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("price {f} is not representable"))),
        Some(Scalar::Text(text)) => match normalize_text(&text) {
            None => Ok(None),
            Some(text) => Decimal::from_str(&text)
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid decimal '{text}'"))),
        },
        Some(Scalar::Bool(_)) => Err(D::Error::custom("expected a decimal, found a boolean")),
    }
}

pub fn optional_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<Scalar> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(Scalar::Int(n)) => Ok(Some(n as f64)),
        Some(Scalar::Float(f)) => Ok(Some(f)),
        Some(Scalar::Text(text)) => match normalize_text(&text) {
            None => Ok(None),
            Some(text) => text
                .parse::<f64>()
                .map(Some)
                .map_err(|_| D::Error::custom(format!("invalid number '{text}'"))),
        },
        Some(Scalar::Bool(_)) => Err(D::Error::custom("expected a number, found a boolean")),
    }
}

/// Accepts RFC 3339 timestamps or naive `YYYY-MM-DDTHH:MM:SS[.f]` values,
/// which are read as UTC.
pub fn optional_datetime<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = value.as_deref().and_then(normalize_text) else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Some(naive.and_utc()))
        .map_err(|_| D::Error::custom(format!("invalid timestamp '{raw}'")))
}

/// Dates may come back as `2024-05-01` or with a time part attached.
pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    let Some(raw) = value.as_deref().and_then(normalize_text) else {
        return Ok(None);
    };
    let date_part = raw.get(..10).unwrap_or(&raw);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| D::Error::custom(format!("invalid date '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "optional_text")]
        text: Option<String>,
        #[serde(default, deserialize_with = "optional_decimal")]
        price: Option<Decimal>,
        #[serde(default, deserialize_with = "optional_datetime")]
        at: Option<DateTime<Utc>>,
    }

    #[test]
    fn none_spellings_collapse_to_absent() {
        for raw in [json!("None"), json!(""), json!(null), json!("  ")] {
            let probe: Probe = serde_json::from_value(json!({ "text": raw })).unwrap();
            assert_eq!(probe.text, None);
        }
        let probe: Probe = serde_json::from_value(json!({})).unwrap();
        assert_eq!(probe.text, None);
    }

    #[test]
    fn prices_accept_numbers_and_strings() {
        let probe: Probe = serde_json::from_value(json!({ "price": 500 })).unwrap();
        assert_eq!(probe.price, Some(dec!(500)));
        let probe: Probe = serde_json::from_value(json!({ "price": "120.50" })).unwrap();
        assert_eq!(probe.price, Some(dec!(120.50)));
        let probe: Probe = serde_json::from_value(json!({ "price": 99.5 })).unwrap();
        assert_eq!(probe.price, Some(dec!(99.5)));
        assert!(serde_json::from_value::<Probe>(json!({ "price": "abc" })).is_err());
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let probe: Probe =
            serde_json::from_value(json!({ "at": "2024-03-05T10:15:00.123456" })).unwrap();
        assert_eq!(probe.at.unwrap().to_rfc3339(), "2024-03-05T10:15:00.123456+00:00");
    }
}
