use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// How money values are rounded for display. Arithmetic stays in `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundingMode {
    /// Never shows a price lower than the true charge.
    #[default]
    Ceiling,
    HalfUp,
}

impl RoundingMode {
    fn strategy(self) -> RoundingStrategy {
        match self {
            RoundingMode::Ceiling => RoundingStrategy::ToPositiveInfinity,
            RoundingMode::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }
}

/// Formats a money value with exactly two fractional digits.
pub fn format_money(value: f64, mode: RoundingMode) -> String {
    match Decimal::from_f64(value) {
        Some(d) => format!("{:.2}", d.round_dp_with_strategy(2, mode.strategy())),
        None => format!("{value:.2}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ceiling_rounds_up() {
        assert_eq!(format_money(10.005, RoundingMode::Ceiling), "10.01");
        assert_eq!(format_money(10.001, RoundingMode::Ceiling), "10.01");
        assert_eq!(format_money(10.0, RoundingMode::Ceiling), "10.00");
        assert_eq!(format_money(0.0, RoundingMode::Ceiling), "0.00");
    }

    #[test]
    fn test_half_up() {
        assert_eq!(format_money(10.005, RoundingMode::HalfUp), "10.01");
        assert_eq!(format_money(10.004, RoundingMode::HalfUp), "10.00");
        assert_eq!(format_money(1234.5, RoundingMode::HalfUp), "1234.50");
    }
}
