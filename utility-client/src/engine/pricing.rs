use rust_decimal::Decimal;
use serde::Serialize;

use super::ReadingDelta;
use crate::domain::{money, UtilityType};

/// Where a period's total cost came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "basis", rename_all = "snake_case")]
pub enum CostBasis {
    /// The meter's own fixed unit price times consumption.
    UnitPrice {
        #[serde(serialize_with = "money::serialize")]
        unit_price: Decimal,
        #[serde(serialize_with = "money::serialize")]
        total: Decimal,
    },
    /// Sum of the bills recorded for the meter in the period.
    Billed {
        #[serde(serialize_with = "money::serialize")]
        total: Decimal,
    },
    /// The utility's global default rate times consumption.
    UtilityRate {
        #[serde(serialize_with = "money::serialize")]
        unit_price: Decimal,
        #[serde(serialize_with = "money::serialize")]
        total: Decimal,
    },
}

impl CostBasis {
    pub fn total(&self) -> Decimal {
        match self {
            CostBasis::UnitPrice { total, .. } | CostBasis::Billed { total } | CostBasis::UtilityRate { total, .. } => {
                *total
            }
        }
    }
}

/// Pick the total cost for a period.
///
/// Precedence: the meter's unit price, then the billed amount, then the
/// utility default rate. `None` means no cost is known; consumption is still
/// allocated without one.
pub fn resolve_period_cost(
    meter_unit_price: Option<Decimal>,
    consumption: Decimal,
    billed_amount: Option<Decimal>,
    utility_rate: Option<Decimal>,
) -> Option<CostBasis> {
    if let Some(unit_price) = meter_unit_price {
        return priced(unit_price, consumption).map(|total| CostBasis::UnitPrice { unit_price, total });
    }
    if let Some(total) = billed_amount {
        return Some(CostBasis::Billed { total });
    }
    let unit_price = utility_rate?;
    priced(unit_price, consumption).map(|total| CostBasis::UtilityRate { unit_price, total })
}

/// `unit_price × consumption`, `None` when the product does not fit a `Decimal`.
fn priced(unit_price: Decimal, consumption: Decimal) -> Option<Decimal> {
    let total = unit_price.checked_mul(consumption);
    if total.is_none() {
        tracing::warn!(%unit_price, %consumption, "cost overflows, leaving unpriced");
    }
    total
}

/// Unit price implied by a bill: amount divided by the consumption it covers.
///
/// Used to calibrate the default rate when a bill is entered; `None` when the
/// consumption is not positive.
pub fn implied_unit_price(amount: Decimal, consumption: Decimal) -> Option<Decimal> {
    if consumption <= Decimal::ZERO {
        return None;
    }
    amount.checked_div(consumption)
}

/// Cost of a single reading's delta at `unit_price`.
pub fn reading_cost(delta: &ReadingDelta, unit_price: Option<Decimal>) -> Option<Decimal> {
    priced(unit_price?, delta.consumption?)
}

/// Built-in default rate per utility, used when none is configured.
pub fn default_utility_price(utility: UtilityType) -> Decimal {
    match utility {
        UtilityType::Electricity => Decimal::new(65, 2),
        UtilityType::Gas => Decimal::new(35, 2),
        UtilityType::Water => Decimal::new(850, 2),
        UtilityType::Heating => Decimal::new(45000, 2),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use time::macros::date;

    #[test]
    fn meter_unit_price_wins_over_bill() {
        let basis = resolve_period_cost(Some(dec!(0.5)), dec!(50), Some(dec!(75)), Some(dec!(0.65))).unwrap();
        assert_eq!(
            basis,
            CostBasis::UnitPrice {
                unit_price: dec!(0.5),
                total: dec!(25)
            }
        );
    }

    #[test]
    fn bill_is_used_without_unit_price() {
        let basis = resolve_period_cost(None, dec!(50), Some(dec!(75)), Some(dec!(0.65))).unwrap();
        assert_eq!(basis.total(), dec!(75));
    }

    #[test]
    fn utility_rate_is_last_resort() {
        let basis = resolve_period_cost(None, dec!(100), None, Some(dec!(0.65))).unwrap();
        assert_eq!(basis.total(), dec!(65));
        assert_eq!(resolve_period_cost(None, dec!(100), None, None), None);
    }

    #[test]
    fn implied_price_needs_positive_consumption() {
        assert_eq!(implied_unit_price(dec!(75), dec!(50)), Some(dec!(1.5)));
        assert_eq!(implied_unit_price(dec!(75), Decimal::ZERO), None);
        assert_eq!(implied_unit_price(dec!(75), dec!(-3)), None);
    }

    #[test]
    fn reading_cost_requires_delta_and_price() {
        let mut delta = ReadingDelta {
            meter_id: 1,
            reading_id: 2,
            date: date!(2024-01-31),
            value: dec!(150),
            previous_reading_id: Some(1),
            previous_value: Some(dec!(100)),
            consumption: Some(dec!(50)),
        };
        assert_eq!(reading_cost(&delta, Some(dec!(0.65))), Some(dec!(32.5)));
        assert_eq!(reading_cost(&delta, None), None);

        delta.consumption = None;
        assert_eq!(reading_cost(&delta, Some(dec!(0.65))), None);
    }

    #[test]
    fn overflowing_cost_is_left_unpriced() {
        assert_eq!(resolve_period_cost(Some(Decimal::MAX), dec!(2), None, None), None);
        assert_eq!(resolve_period_cost(None, Decimal::MAX, None, Some(dec!(8.50))), None);
        // A bill needs no multiplication, so it still prices the period.
        assert_eq!(
            resolve_period_cost(None, Decimal::MAX, Some(dec!(10)), Some(dec!(8.50))),
            Some(CostBasis::Billed { total: dec!(10) })
        );
    }

    #[test]
    fn default_prices_match_seeded_rates() {
        assert_eq!(default_utility_price(UtilityType::Electricity), dec!(0.65));
        assert_eq!(default_utility_price(UtilityType::Heating), dec!(450.00));
    }
}
