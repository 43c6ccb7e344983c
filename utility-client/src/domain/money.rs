//! Presentation rounding for currency and consumption figures.
//!
//! Arithmetic runs at full `Decimal` precision; values are rounded to two
//! places only when they leave the crate (JSON, CSV, logs).

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serializer;

pub const DISPLAY_SCALE: u32 = 2;

/// Round to two decimal places, half away from zero, always carrying two places.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(DISPLAY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(DISPLAY_SCALE);
    rounded
}

pub fn format_money(value: Decimal) -> String {
    round_money(value).to_string()
}

/// `serialize_with` helper emitting a rounded decimal string.
pub fn serialize<S>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_money(*value))
}

pub mod option {
    use rust_decimal::Decimal;
    use serde::Serializer;

    pub fn serialize<S>(value: &Option<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(v) => serializer.serialize_some(&super::format_money(*v)),
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn round_money_pads_and_rounds_half_away_from_zero() {
        assert_eq!(format_money(dec!(25)), "25.00");
        assert_eq!(format_money(dec!(37.5)), "37.50");
        assert_eq!(format_money(dec!(0.125)), "0.13");
        assert_eq!(format_money(dec!(-0.125)), "-0.13");
        assert_eq!(format_money(dec!(33.333333333)), "33.33");
    }
}
