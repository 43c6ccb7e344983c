use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, Month};

use super::{allocate, delta::resolve_deltas, resolve_period_cost, rooms::sort_rooms, CostBasis, EngineError, ReadingDelta};
use crate::domain::{money, Allocation, Meter, Reading, Room, UtilityType};

/// A calendar month used as the billing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPeriod", into = "RawPeriod")]
pub struct BillingPeriod {
    year: i32,
    month: Month,
}

#[derive(Serialize, Deserialize)]
struct RawPeriod {
    year: i32,
    month: u8,
}

impl TryFrom<RawPeriod> for BillingPeriod {
    type Error = EngineError;

    fn try_from(raw: RawPeriod) -> Result<Self, Self::Error> {
        BillingPeriod::new(raw.year, raw.month)
    }
}

impl From<BillingPeriod> for RawPeriod {
    fn from(period: BillingPeriod) -> Self {
        RawPeriod {
            year: period.year,
            month: period.month as u8,
        }
    }
}

impl BillingPeriod {
    pub fn new(year: i32, month: u8) -> Result<Self, EngineError> {
        let m = Month::try_from(month).map_err(|_| EngineError::InvalidPeriod { year, month })?;
        // Reject years `Date` cannot represent so `bounds` never fails later.
        let period = Self { year, month: m };
        period.bounds().map_err(|_| EngineError::InvalidPeriod { year, month })?;
        Ok(period)
    }

    pub fn containing(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> Month {
        self.month
    }

    pub fn contains(&self, date: Date) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Half-open `[first day, first day of next month)` range.
    pub fn bounds(&self) -> Result<(Date, Date), time::error::ComponentRange> {
        let start = Date::from_calendar_date(self.year, self.month, 1)?;
        let (next_year, next_month) = match self.month {
            Month::December => (self.year + 1, Month::January),
            m => (self.year, m.next()),
        };
        let end = Date::from_calendar_date(next_year, next_month, 1)?;
        Ok((start, end))
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

/// Consumption of one meter over one billing period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodConsumption {
    pub meter_id: i32,
    pub period: BillingPeriod,
    #[serde(serialize_with = "money::serialize")]
    pub total: Decimal,
    /// Readings dated inside the period, including first readings that add nothing.
    pub readings_counted: usize,
    /// Negative deltas included in `total`.
    pub anomalies: Vec<ReadingDelta>,
}

/// Sum the deltas of every reading dated inside `period`.
///
/// Each delta is taken against the reading immediately before it, even when
/// that reading falls in an earlier month. A meter's first reading has no
/// delta and contributes zero.
pub fn aggregate_period(meter_id: i32, readings: &[Reading], period: BillingPeriod) -> PeriodConsumption {
    let mut total = Decimal::ZERO;
    let mut readings_counted = 0;
    let mut anomalies = Vec::new();

    for delta in resolve_deltas(meter_id, readings)
        .into_iter()
        .filter(|d| period.contains(d.date))
    {
        readings_counted += 1;
        if let Some(consumption) = delta.consumption {
            total += consumption;
        }
        if delta.is_anomalous() {
            tracing::warn!(
                meter_id,
                reading_id = delta.reading_id,
                consumption = %delta.consumption.unwrap_or_default(),
                "negative consumption delta"
            );
            anomalies.push(delta);
        }
    }

    PeriodConsumption {
        meter_id,
        period,
        total,
        readings_counted,
        anomalies,
    }
}

pub fn aggregate_monthly(meter_id: i32, readings: &[Reading], month: Month, year: i32) -> Decimal {
    aggregate_period(meter_id, readings, BillingPeriod { year, month }).total
}

/// Everything needed to apportion one meter for one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterPeriodInput {
    pub meter: Meter,
    pub period: BillingPeriod,
    /// Rooms served by the meter; reordered by name before allocating.
    #[serde(default)]
    pub rooms: Vec<Room>,
    /// All readings of the meter; earlier months are needed for the first delta.
    #[serde(default)]
    pub readings: Vec<Reading>,
    /// Sum of the meter's bills dated in the period.
    #[serde(default)]
    pub billed_amount: Option<Decimal>,
    /// Default rate for the meter's utility type.
    #[serde(default)]
    pub utility_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeterPeriodReport {
    pub meter_id: i32,
    pub property_id: i32,
    pub utility_type: UtilityType,
    pub consumption: PeriodConsumption,
    pub cost_basis: Option<CostBasis>,
    pub allocation: Allocation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeriodOutcome {
    Allocated(MeterPeriodReport),
    /// Nothing was consumed in the period, so there is nothing to split.
    Skipped(PeriodConsumption),
}

/// Aggregate, price and allocate one meter for one period.
pub fn allocate_period(input: &MeterPeriodInput) -> PeriodOutcome {
    let meter = &input.meter;
    let consumption = aggregate_period(meter.id, &input.readings, input.period);

    if consumption.total.is_zero() {
        tracing::debug!(meter_id = meter.id, period = %input.period, "no consumption in period, skipping");
        return PeriodOutcome::Skipped(consumption);
    }

    let cost_basis = resolve_period_cost(
        meter.unit_price,
        consumption.total,
        input.billed_amount,
        input.utility_rate,
    );
    // Inputs read from a file have not been through `resolve_rooms`.
    let mut rooms = input.rooms.clone();
    sort_rooms(&mut rooms);

    let allocation = allocate(
        consumption.total,
        cost_basis.map(|b| b.total()),
        meter.split_method,
        &rooms,
    );

    PeriodOutcome::Allocated(MeterPeriodReport {
        meter_id: meter.id,
        property_id: meter.property_id,
        utility_type: meter.utility_type,
        consumption,
        cost_basis,
        allocation,
    })
}
