use rust_decimal::{Decimal, RoundingStrategy};

use crate::core::{AppError, Result};

/// Pence precision for every stored amount
pub const MONEY_SCALE: u32 = 2;

/// Largest magnitude a DECIMAL(15, 2) column holds
pub fn max_money() -> Decimal {
    Decimal::new(999_999_999_999_999, MONEY_SCALE)
}

/// Rounds to pence, half away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects amounts with sub-penny precision or beyond the column range
pub fn validate_scale(amount: Decimal, field: &str) -> Result<()> {
    if amount.normalize().scale() > MONEY_SCALE {
        return Err(AppError::validation(format!(
            "{} must have at most {} decimal places, got {}",
            field, MONEY_SCALE, amount
        )));
    }
    if amount.abs() > max_money() {
        return Err(AppError::validation(format!(
            "{} is out of range, got {}",
            field, amount
        )));
    }
    Ok(())
}

/// Validates a strictly positive amount at pence precision
pub fn require_positive(amount: Decimal, field: &str) -> Result<Decimal> {
    validate_scale(amount, field)?;
    if amount <= Decimal::ZERO {
        return Err(AppError::validation(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(round_money(amount))
}

/// Validates a signed, non-zero amount at pence precision
pub fn require_non_zero(amount: Decimal, field: &str) -> Result<Decimal> {
    validate_scale(amount, field)?;
    if amount.is_zero() {
        return Err(AppError::validation(format!("{} must not be zero", field)));
    }
    Ok(round_money(amount))
}

/// Formats an amount as sterling, e.g. `£1,234.50` or `-£120.00`
pub fn format_gbp(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    let text = format!("{:.2}", rounded.abs());
    let (whole, pence) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}£{}.{}", sign, grouped, pence)
}
