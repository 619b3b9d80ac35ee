// Shared pieces of the CSV importers

use chrono::NaiveDate;
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{money, AppError, Result};

/// Date layouts accepted by lenient importers, tried in order
pub const LENIENT_DATE_FORMATS: &[&str] =
    &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// A rejected CSV line; `line` is 1-based and counts the header
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportLineError {
    pub line: u64,
    pub message: String,
}

impl ImportLineError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Rejects a file whose header row differs from `expected`
pub fn require_header(headers: &StringRecord, expected: &[&str]) -> Result<()> {
    let actual: Vec<String> = headers
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase())
        .collect();

    if actual.len() != expected.len() || actual.iter().zip(expected).any(|(a, e)| a != e) {
        return Err(AppError::validation(format!(
            "Invalid CSV header: expected '{}', got '{}'",
            expected.join(","),
            actual.join(",")
        )));
    }
    Ok(())
}

/// Trimmed field, `None` when empty or absent
pub fn optional_field(record: &StringRecord, index: usize) -> Option<String> {
    record
        .get(index)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn required_field(record: &StringRecord, index: usize, name: &str) -> std::result::Result<String, String> {
    optional_field(record, index).ok_or_else(|| format!("{} is required", name))
}

/// Parses a date trying each format in turn
pub fn parse_date(value: &str, formats: &[&str]) -> std::result::Result<NaiveDate, String> {
    let value = value.trim();
    formats
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .ok_or_else(|| format!("Could not parse date '{}'", value))
}

/// Parses a money amount, tolerating a leading pound sign and thousands separators
pub fn parse_amount(value: &str) -> std::result::Result<Decimal, String> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| *c != '£' && *c != ',')
        .collect();

    let amount: Decimal = cleaned
        .parse()
        .map_err(|_| format!("Invalid amount '{}'", value.trim()))?;
    money::validate_scale(amount, "Amount").map_err(|e| e.to_string())?;
    Ok(amount)
}
