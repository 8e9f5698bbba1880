//! Bounds for monetary input.
//!
//! Unit prices are stored as `NUMERIC(12,2)`, booking totals and payments as
//! `NUMERIC(14,2)` so that 100 tickets at the maximum price still fit.

use rust_decimal::Decimal;

use crate::utils::error::{AppError, Result};

/// 9_999_999_999.99
pub fn max_price() -> Decimal {
    Decimal::new(999_999_999_999, 2)
}

/// 999_999_999_999.99
pub fn max_booking_amount() -> Decimal {
    Decimal::new(99_999_999_999_999, 2)
}

fn has_cent_precision(value: Decimal) -> bool {
    value.normalize().scale() <= 2
}

/// Unit prices may be zero.
pub fn check_price(field: &str, value: Decimal) -> Result<()> {
    if value.is_sign_negative() {
        return Err(AppError::ValidationError(format!(
            "{} must not be negative",
            field
        )));
    }
    if value > max_price() || !has_cent_precision(value) {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {} with no more than two decimal places",
            field,
            max_price()
        )));
    }
    Ok(())
}

pub fn check_payment_amount(field: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(AppError::ValidationError(format!(
            "{} must be greater than zero",
            field
        )));
    }
    if value > max_booking_amount() || !has_cent_precision(value) {
        return Err(AppError::ValidationError(format!(
            "{} must be at most {} with no more than two decimal places",
            field,
            max_booking_amount()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_price_bounds() {
        assert!(check_price("ticketPrice", Decimal::ZERO).is_ok());
        assert!(check_price("ticketPrice", dec("9999999999.99")).is_ok());
        assert!(check_price("ticketPrice", dec("12.50")).is_ok());
        assert!(check_price("ticketPrice", dec("12.500")).is_ok());

        assert!(check_price("ticketPrice", dec("10000000000.00")).is_err());
        assert!(check_price("ticketPrice", dec("50000000000000000000000000000")).is_err());
        assert!(check_price("ticketPrice", dec("10.001")).is_err());
        assert!(check_price("ticketPrice", dec("-1")).is_err());
    }

    #[test]
    fn test_payment_amount_rejects_sub_cent_values() {
        assert!(check_payment_amount("amount", dec("49.99")).is_ok());
        assert!(check_payment_amount("amount", dec("49.990")).is_ok());

        let err = check_payment_amount("amount", dec("49.999")).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!(check_payment_amount("amount", Decimal::ZERO).is_err());
        assert!(check_payment_amount("amount", dec("1000000000000.00")).is_err());
    }
}
