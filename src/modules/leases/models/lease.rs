// Leases are standing invoice instructions: a tenant pays `amount` on a
// schedule set by `frequency` between the start and optional end date.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use csv::StringRecord;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::import::{optional_field, parse_amount, parse_date, required_field, LENIENT_DATE_FORMATS};
use crate::core::{money, AppError, Result};

/// Column layout of a lease import
pub const LEASE_CSV_HEADER: &[&str] = &[
    "property_reference",
    "customer_reference",
    "lease_start_date",
    "lease_end_date",
    "rent_amount",
    "payment_day",
    "lease_reference",
];

/// Upper bound on generated schedule entries
const MAX_SCHEDULE_ENTRIES: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeaseFrequency {
    OneTime,
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Yearly,
    MultiMonth,
}

impl LeaseFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaseFrequency::OneTime => "ONE_TIME",
            LeaseFrequency::Daily => "DAILY",
            LeaseFrequency::Weekly => "WEEKLY",
            LeaseFrequency::Monthly => "MONTHLY",
            LeaseFrequency::Quarterly => "QUARTERLY",
            LeaseFrequency::Yearly => "YEARLY",
            LeaseFrequency::MultiMonth => "MULTI_MONTH",
        }
    }

    pub fn requires_payment_day(&self) -> bool {
        matches!(
            self,
            LeaseFrequency::Monthly
                | LeaseFrequency::Quarterly
                | LeaseFrequency::Yearly
                | LeaseFrequency::MultiMonth
        )
    }

    /// Months between payments for month-based frequencies
    pub fn month_step(&self, frequency_months: Option<u32>) -> Option<u32> {
        match self {
            LeaseFrequency::Monthly => Some(1),
            LeaseFrequency::Quarterly => Some(3),
            LeaseFrequency::Yearly => Some(12),
            LeaseFrequency::MultiMonth => frequency_months,
            _ => None,
        }
    }
}

impl std::str::FromStr for LeaseFrequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ONE_TIME" => Ok(LeaseFrequency::OneTime),
            "DAILY" => Ok(LeaseFrequency::Daily),
            "WEEKLY" => Ok(LeaseFrequency::Weekly),
            "MONTHLY" => Ok(LeaseFrequency::Monthly),
            "QUARTERLY" => Ok(LeaseFrequency::Quarterly),
            "YEARLY" => Ok(LeaseFrequency::Yearly),
            "MULTI_MONTH" => Ok(LeaseFrequency::MultiMonth),
            _ => Err(format!("Invalid lease frequency: {}", s)),
        }
    }
}

/// Whether the lease is mirrored to PayProp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    #[default]
    Pending,
    Manual,
    Synced,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "PENDING",
            SyncStatus::Manual => "MANUAL",
            SyncStatus::Synced => "SYNCED",
            SyncStatus::Error => "ERROR",
        }
    }
}

impl std::str::FromStr for SyncStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(SyncStatus::Pending),
            "MANUAL" => Ok(SyncStatus::Manual),
            "SYNCED" => Ok(SyncStatus::Synced),
            "ERROR" => Ok(SyncStatus::Error),
            _ => Err(format!("Invalid sync status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub id: i64,
    pub lease_reference: String,
    pub property_id: i64,
    pub tenant_reference: Option<String>,
    pub amount: Decimal,
    pub frequency: LeaseFrequency,
    pub frequency_months: Option<u32>,
    pub payment_day: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLease {
    pub lease_reference: String,
    pub property_id: i64,
    pub tenant_reference: Option<String>,
    pub amount: Decimal,
    pub frequency: LeaseFrequency,
    pub frequency_months: Option<u32>,
    pub payment_day: Option<u32>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(default)]
    pub sync_status: SyncStatus,
}

impl NewLease {
    pub fn validate(&self) -> Result<()> {
        if self.lease_reference.trim().is_empty() {
            return Err(AppError::validation("Lease reference is required"));
        }
        money::require_positive(self.amount, "Lease amount")?;
        validate_schedule_fields(
            self.frequency,
            self.frequency_months,
            self.payment_day,
            self.start_date,
            self.end_date,
        )
    }
}

fn validate_schedule_fields(
    frequency: LeaseFrequency,
    frequency_months: Option<u32>,
    payment_day: Option<u32>,
    start_date: NaiveDate,
    end_date: Option<NaiveDate>,
) -> Result<()> {
    if frequency.requires_payment_day() {
        match payment_day {
            Some(day) if (1..=31).contains(&day) => {}
            Some(day) => {
                return Err(AppError::validation(format!(
                    "Payment day must be between 1 and 31, got {}",
                    day
                )))
            }
            None => {
                return Err(AppError::validation(format!(
                    "{} leases require a payment day",
                    frequency.as_str()
                )))
            }
        }
    }

    match (frequency, frequency_months) {
        (LeaseFrequency::MultiMonth, Some(months)) if (2..=24).contains(&months) => {}
        (LeaseFrequency::MultiMonth, Some(months)) => {
            return Err(AppError::validation(format!(
                "Multi-month frequency must be 2 to 24 months, got {}",
                months
            )))
        }
        (LeaseFrequency::MultiMonth, None) => {
            return Err(AppError::validation(
                "MULTI_MONTH leases require frequency_months",
            ))
        }
        (_, Some(_)) => {
            return Err(AppError::validation(
                "frequency_months is only valid for MULTI_MONTH leases",
            ))
        }
        (_, None) => {}
    }

    if let Some(end) = end_date {
        if end < start_date {
            return Err(AppError::validation("Lease end date is before its start date"));
        }
    }
    Ok(())
}

fn last_day_of_month(year: i32, month: u32) -> u32 {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    first_of_next
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(28)
}

/// The payment day within a given month, clamped to the month's length
fn payment_date_in_month(month_start: NaiveDate, payment_day: u32) -> Option<NaiveDate> {
    let day = payment_day.min(last_day_of_month(month_start.year(), month_start.month()));
    month_start.with_day(day)
}

impl Lease {
    /// Billing dates falling within `[from, to]`, bounded by the lease term
    pub fn due_dates(&self, from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
        let upper = match self.end_date {
            Some(end) => end.min(to),
            None => to,
        };
        if upper < from || upper < self.start_date {
            return Vec::new();
        }
        let in_window = |d: &NaiveDate| *d >= from && *d >= self.start_date && *d <= upper;

        let mut dates = Vec::new();
        match self.frequency {
            LeaseFrequency::OneTime => {
                if in_window(&self.start_date) {
                    dates.push(self.start_date);
                }
            }
            LeaseFrequency::Daily | LeaseFrequency::Weekly => {
                let step = if self.frequency == LeaseFrequency::Daily { 1 } else { 7 };
                let mut current = self.start_date;
                if from > current {
                    let behind = (from - current).num_days();
                    let steps = (behind + step - 1) / step;
                    current += Duration::days(steps * step);
                }
                while current <= upper && dates.len() < MAX_SCHEDULE_ENTRIES {
                    dates.push(current);
                    current += Duration::days(step);
                }
            }
            _ => {
                let (Some(step), Some(payment_day)) = (
                    self.frequency.month_step(self.frequency_months),
                    self.payment_day,
                ) else {
                    return dates;
                };
                let Some(anchor) = self.start_date.with_day(1) else {
                    return dates;
                };

                let mut offset = 0u32;
                while dates.len() < MAX_SCHEDULE_ENTRIES {
                    let Some(month_start) = anchor.checked_add_months(Months::new(offset)) else {
                        break;
                    };
                    let Some(due) = payment_date_in_month(month_start, payment_day) else {
                        break;
                    };
                    if due > upper {
                        break;
                    }
                    if in_window(&due) {
                        dates.push(due);
                    }
                    offset += step;
                }
            }
        }
        dates
    }
}

/// One data row of a lease import, before the property is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct LeaseImportRow {
    pub property_reference: String,
    pub customer_reference: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub amount: Decimal,
    pub payment_day: u32,
    pub lease_reference: String,
}

impl LeaseImportRow {
    pub fn from_record(record: &StringRecord) -> std::result::Result<Self, String> {
        let property_reference = required_field(record, 0, "property_reference")?;
        let customer_reference = required_field(record, 1, "customer_reference")?;
        let start_date = parse_date(
            &required_field(record, 2, "lease_start_date")?,
            LENIENT_DATE_FORMATS,
        )?;
        let end_date = optional_field(record, 3)
            .map(|d| parse_date(&d, LENIENT_DATE_FORMATS))
            .transpose()?;
        if end_date.is_some_and(|end| end < start_date) {
            return Err("lease_end_date cannot be before lease_start_date".to_string());
        }

        let amount = parse_amount(&required_field(record, 4, "rent_amount")?)?;
        if amount <= Decimal::ZERO {
            return Err("rent_amount must be positive".to_string());
        }

        let payment_day_text = required_field(record, 5, "payment_day")?;
        let payment_day: u32 = payment_day_text
            .parse()
            .map_err(|_| format!("Invalid payment_day: {}", payment_day_text))?;
        if !(1..=31).contains(&payment_day) {
            return Err("payment_day must be between 1 and 31".to_string());
        }

        Ok(Self {
            property_reference,
            customer_reference,
            start_date,
            end_date,
            amount,
            payment_day,
            lease_reference: required_field(record, 6, "lease_reference")?,
        })
    }

    /// Imported leases bill monthly and are never pushed to PayProp
    pub fn into_new_lease(self, property_id: i64, property_name: &str) -> NewLease {
        let description = format!(
            "Lease for {} - {} ({}/month)",
            self.customer_reference,
            property_name,
            crate::core::format_gbp(self.amount)
        );
        NewLease {
            lease_reference: self.lease_reference,
            property_id,
            tenant_reference: Some(self.customer_reference),
            amount: self.amount,
            frequency: LeaseFrequency::Monthly,
            frequency_months: None,
            payment_day: Some(self.payment_day),
            start_date: self.start_date,
            end_date: self.end_date,
            description: Some(description),
            sync_status: SyncStatus::Manual,
        }
    }
}

/// Outcome of a lease import
#[derive(Debug, Clone, Serialize)]
pub struct LeaseImportReport {
    pub imported: usize,
    pub skipped_duplicates: Vec<String>,
    pub errors: Vec<crate::core::import::ImportLineError>,
}
