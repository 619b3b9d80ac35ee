// Property record: ownership, block membership, account balance and the
// occupancy lifecycle used by the lettings team.
//
// Occupancy moves through explicit transitions, each stamping
// last_occupancy_change:
//   OCCUPIED -> NOTICE_GIVEN -> ADVERTISING -> AVAILABLE -> OCCUPIED
// with MAINTENANCE / OFF_MARKET reachable from anywhere.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{money, AppError, Result};

/// Occupancy lifecycle of a lettable unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OccupancyStatus {
    #[default]
    Occupied,
    NoticeGiven,
    Advertising,
    Available,
    Maintenance,
    OffMarket,
}

impl OccupancyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OccupancyStatus::Occupied => "OCCUPIED",
            OccupancyStatus::NoticeGiven => "NOTICE_GIVEN",
            OccupancyStatus::Advertising => "ADVERTISING",
            OccupancyStatus::Available => "AVAILABLE",
            OccupancyStatus::Maintenance => "MAINTENANCE",
            OccupancyStatus::OffMarket => "OFF_MARKET",
        }
    }

    /// Whether `self -> to` is a permitted occupancy transition
    pub fn can_transition_to(&self, to: OccupancyStatus) -> bool {
        use OccupancyStatus::*;

        if *self == to {
            return false;
        }

        match to {
            NoticeGiven => *self == Occupied,
            Advertising => matches!(self, NoticeGiven | Available | Maintenance),
            Available => matches!(self, NoticeGiven | Advertising | Maintenance | OffMarket),
            Occupied => matches!(self, NoticeGiven | Advertising | Available),
            Maintenance | OffMarket => true,
        }
    }
}

impl std::fmt::Display for OccupancyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OccupancyStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "OCCUPIED" => Ok(OccupancyStatus::Occupied),
            "NOTICE_GIVEN" => Ok(OccupancyStatus::NoticeGiven),
            "ADVERTISING" => Ok(OccupancyStatus::Advertising),
            "AVAILABLE" => Ok(OccupancyStatus::Available),
            "MAINTENANCE" => Ok(OccupancyStatus::Maintenance),
            "OFF_MARKET" => Ok(OccupancyStatus::OffMarket),
            _ => Err(format!("Invalid occupancy status: {}", s)),
        }
    }
}

/// An explicit occupancy change with the dates it records
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupancyTransition {
    NoticeGiven {
        notice_date: NaiveDate,
        expected_vacancy_date: NaiveDate,
    },
    StartAdvertising {
        start_date: NaiveDate,
    },
    Available {
        available_from: NaiveDate,
    },
    Occupied,
    Maintenance,
    OffMarket,
}

impl OccupancyTransition {
    pub fn target(&self) -> OccupancyStatus {
        match self {
            OccupancyTransition::NoticeGiven { .. } => OccupancyStatus::NoticeGiven,
            OccupancyTransition::StartAdvertising { .. } => OccupancyStatus::Advertising,
            OccupancyTransition::Available { .. } => OccupancyStatus::Available,
            OccupancyTransition::Occupied => OccupancyStatus::Occupied,
            OccupancyTransition::Maintenance => OccupancyStatus::Maintenance,
            OccupancyTransition::OffMarket => OccupancyStatus::OffMarket,
        }
    }
}

/// Days ahead of expected vacancy at which a property needs attention
pub const VACANCY_ATTENTION_DAYS: i64 = 30;

/// Available balance never goes below zero
pub fn available_balance(current: Decimal, minimum: Decimal) -> Decimal {
    (current - minimum).max(Decimal::ZERO)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: i64,
    pub name: String,
    pub payprop_id: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_name: Option<String>,
    pub is_block_property: bool,
    pub block_property_id: Option<i64>,
    pub account_balance: Decimal,
    pub minimum_balance: Decimal,
    pub occupancy_status: OccupancyStatus,
    pub notice_given_date: Option<NaiveDate>,
    pub expected_vacancy_date: Option<NaiveDate>,
    pub advertising_start_date: Option<NaiveDate>,
    pub available_from_date: Option<NaiveDate>,
    pub last_occupancy_change: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn available_balance(&self) -> Decimal {
        available_balance(self.account_balance, self.minimum_balance)
    }

    /// Applies an occupancy transition, returning the previous status
    pub fn apply_transition(
        &mut self,
        transition: &OccupancyTransition,
        at: DateTime<Utc>,
    ) -> Result<OccupancyStatus> {
        let from = self.occupancy_status;
        let to = transition.target();

        if !from.can_transition_to(to) {
            return Err(AppError::validation(format!(
                "Property {} cannot move from {} to {}",
                self.id, from, to
            )));
        }

        match transition {
            OccupancyTransition::NoticeGiven {
                notice_date,
                expected_vacancy_date,
            } => {
                if expected_vacancy_date < notice_date {
                    return Err(AppError::validation(
                        "Expected vacancy date cannot be before the notice date",
                    ));
                }
                self.notice_given_date = Some(*notice_date);
                self.expected_vacancy_date = Some(*expected_vacancy_date);
            }
            OccupancyTransition::StartAdvertising { start_date } => {
                self.advertising_start_date = Some(*start_date);
            }
            OccupancyTransition::Available { available_from } => {
                self.available_from_date = Some(*available_from);
            }
            OccupancyTransition::Occupied => {
                self.notice_given_date = None;
                self.expected_vacancy_date = None;
                self.advertising_start_date = None;
                self.available_from_date = None;
            }
            OccupancyTransition::Maintenance | OccupancyTransition::OffMarket => {}
        }

        self.occupancy_status = to;
        self.last_occupancy_change = Some(at);
        self.updated_at = at;
        Ok(from)
    }

    /// Available now, or vacating within the attention window
    pub fn needs_attention(&self, today: NaiveDate) -> bool {
        match self.occupancy_status {
            OccupancyStatus::Available => true,
            OccupancyStatus::NoticeGiven => self
                .expected_vacancy_date
                .map(|date| date <= today + Duration::days(VACANCY_ATTENTION_DAYS))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Payload for registering a property
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProperty {
    pub name: String,
    pub payprop_id: Option<String>,
    pub owner_id: Option<i64>,
    pub owner_name: Option<String>,
    #[serde(default)]
    pub is_block_property: bool,
    pub block_property_id: Option<i64>,
    #[serde(default)]
    pub minimum_balance: Decimal,
}

impl NewProperty {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Property name is required"));
        }
        if self.name.len() > 255 {
            return Err(AppError::validation("Property name exceeds 255 characters"));
        }
        money::validate_scale(self.minimum_balance, "minimum_balance")?;
        if self.minimum_balance.is_sign_negative() {
            return Err(AppError::validation("minimum_balance cannot be negative"));
        }
        if self.is_block_property && self.block_property_id.is_some() {
            return Err(AppError::validation(
                "A block property cannot itself belong to a block",
            ));
        }
        Ok(())
    }
}

/// Filter for property listings
#[derive(Debug, Clone, Default)]
pub struct PropertyFilter {
    pub occupancy_status: Option<OccupancyStatus>,
    pub owner_id: Option<i64>,
    pub block_property_id: Option<i64>,
    pub limit: i64,
    pub offset: i64,
}
