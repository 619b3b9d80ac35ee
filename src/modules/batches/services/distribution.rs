// Proportional split of a batch difference across its properties.
//
// Shares are proportional to each property's weight, rounded to pence half-up,
// with the last open property absorbing the remainder. Capped properties are
// filled to their cap and the excess is re-spread over the rest.

use rust_decimal::Decimal;

use crate::core::{format_gbp, round_money, AppError, Result};

/// One property taking part in a split
#[derive(Debug, Clone, PartialEq)]
pub struct ShareInput {
    pub property_id: i64,
    /// Relative size; negative weights count by magnitude
    pub weight: Decimal,
    /// Most this property may take; `None` is unlimited
    pub cap: Option<Decimal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Share {
    pub property_id: i64,
    pub amount: Decimal,
}

/// Splits a non-negative `total` over `inputs`, in input order.
///
/// Fails with `InsufficientBalance` when the caps cannot hold the total.
pub fn distribute(total: Decimal, inputs: &[ShareInput]) -> Result<Vec<Share>> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(AppError::validation("Distributed total must not be negative"));
    }
    if inputs.is_empty() {
        if total.is_zero() {
            return Ok(Vec::new());
        }
        return Err(AppError::validation("No properties to distribute across"));
    }

    let caps: Vec<Option<Decimal>> = inputs
        .iter()
        .map(|i| i.cap.map(|c| c.max(Decimal::ZERO)))
        .collect();
    if caps.iter().all(Option::is_some) {
        let capacity: Decimal = caps.iter().flatten().copied().sum();
        if capacity < total {
            return Err(AppError::insufficient_balance(format!(
                "Properties have {} available, {} required",
                format_gbp(capacity),
                format_gbp(total)
            )));
        }
    }

    let mut amounts = vec![Decimal::ZERO; inputs.len()];
    let mut open: Vec<usize> = (0..inputs.len())
        .filter(|&i| caps[i].map_or(true, |c| c > Decimal::ZERO))
        .collect();
    let mut remaining = total;

    while remaining > Decimal::ZERO {
        if open.is_empty() {
            return Err(AppError::insufficient_balance(format!(
                "{} could not be placed within property limits",
                format_gbp(remaining)
            )));
        }

        let weights: Vec<Decimal> = {
            let raw: Vec<Decimal> = open.iter().map(|&i| inputs[i].weight.abs()).collect();
            if raw.iter().all(|w| w.is_zero()) {
                vec![Decimal::ONE; open.len()]
            } else {
                raw
            }
        };
        let weight_total: Decimal = weights.iter().copied().sum();

        let mut left = remaining;
        let mut saturated = Vec::new();
        for (position, &index) in open.iter().enumerate() {
            let proposed = if position + 1 == open.len() {
                left
            } else {
                round_money(remaining * weights[position] / weight_total).min(left)
            };

            let headroom = caps[index].map(|c| c - amounts[index]);
            let granted = match headroom {
                Some(h) if proposed >= h => {
                    saturated.push(index);
                    h
                }
                _ => proposed,
            };

            amounts[index] += granted;
            left -= granted;
        }

        remaining = left;
        open.retain(|i| !saturated.contains(i));
    }

    Ok(inputs
        .iter()
        .zip(amounts)
        .map(|(input, amount)| Share {
            property_id: input.property_id,
            amount,
        })
        .collect())
}
