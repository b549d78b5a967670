// src/money.rs

use rust_decimal::{Decimal, RoundingStrategy};

use crate::errors::{AppError, AppResult};

/// Money is stored with scale 2, rounded half-up (away from zero on ties).
pub const MONEY_SCALE: u32 = 2;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Rejects values with more significant decimal places than the column holds.
/// Trailing zeros do not count, so `1.500` passes at scale 2.
pub fn check_scale(field: &str, value: Decimal, max_scale: u32) -> AppResult<()> {
    if value.normalize().scale() > max_scale {
        return Err(AppError::Validation(format!(
            "{} allows at most {} decimal places",
            field, max_scale
        )));
    }
    Ok(())
}

/// A non-negative amount that is stored exactly.
pub fn check_money(field: &str, amount: Decimal) -> AppResult<()> {
    if amount < Decimal::ZERO {
        return Err(AppError::Validation(format!("{} cannot be negative", field)));
    }
    check_scale(field, amount, MONEY_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_half_up_rounding() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(10.004)), dec!(10.00));
        assert_eq!(round_money(dec!(27272.7272727)), dec!(27272.73));
    }

    #[test]
    fn test_sub_cent_amounts_rejected() {
        assert!(check_money("basic_salary", dec!(0.005)).is_err());
        assert!(check_money("basic_salary", dec!(-1)).is_err());
        assert!(check_money("basic_salary", dec!(1500.50)).is_ok());
        assert!(check_money("basic_salary", dec!(1.500)).is_ok());
        assert!(check_scale("lst_rate", dec!(0.005), 4).is_ok());
        assert!(check_scale("lst_rate", dec!(0.00005), 4).is_err());
    }
}
