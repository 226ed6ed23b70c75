use rust_decimal::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{AppError, AppResult};

/// Monetary values are rounded half-up to 2 decimal places before persistence.
const DECIMAL_PLACES: u32 = 2;

pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(DECIMAL_PLACES, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert a stored decimal amount to the gateway's smallest currency unit.
pub fn to_minor_units(amount: Decimal) -> AppResult<i64> {
    (round_money(amount) * Decimal::from(100))
        .to_i64()
        .ok_or_else(|| {
            AppError::Internal(anyhow::anyhow!("amount {amount} overflows minor units"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_up_to_two_places() {
        assert_eq!(round_money(Decimal::new(10005, 4)), Decimal::new(100, 2)); // 1.0005 -> 1.00
        assert_eq!(round_money(Decimal::new(1005, 3)), Decimal::new(101, 2)); // 1.005 -> 1.01
        assert_eq!(round_money(Decimal::new(999, 2)), Decimal::new(999, 2));
    }

    #[test]
    fn converts_to_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(100000, 2)).unwrap(), 100000); // 1000.00 -> 100000 paise
        assert_eq!(to_minor_units(Decimal::new(1999, 2)).unwrap(), 1999);
        assert_eq!(to_minor_units(Decimal::ZERO).unwrap(), 0);
    }
}
