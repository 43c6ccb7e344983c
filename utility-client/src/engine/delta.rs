use rust_decimal::Decimal;
use serde::Serialize;
use time::Date;

use super::EngineError;
use crate::domain::{money, Reading};

/// Consumption recorded by one reading relative to the reading before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingDelta {
    pub meter_id: i32,
    pub reading_id: i32,
    pub date: Date,
    #[serde(serialize_with = "money::serialize")]
    pub value: Decimal,
    pub previous_reading_id: Option<i32>,
    #[serde(serialize_with = "money::option::serialize")]
    pub previous_value: Option<Decimal>,
    /// `None` for the first reading of a meter.
    #[serde(serialize_with = "money::option::serialize")]
    pub consumption: Option<Decimal>,
}

impl ReadingDelta {
    /// A negative delta, typically a replaced or rolled-over meter or a typo.
    pub fn is_anomalous(&self) -> bool {
        matches!(self.consumption, Some(c) if c < Decimal::ZERO)
    }
}

/// Readings of `meter_id` in resolution order: date, then creation time, then id.
///
/// Same-date readings are common (a correction entered later the same day),
/// so the order has to be total for deltas to be reproducible.
pub(crate) fn ordered_for_meter(meter_id: i32, readings: &[Reading]) -> Vec<&Reading> {
    let mut ordered: Vec<&Reading> = readings.iter().filter(|r| r.meter_id == meter_id).collect();
    ordered.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
    ordered
}

fn delta_between(previous: Option<&Reading>, current: &Reading) -> ReadingDelta {
    ReadingDelta {
        meter_id: current.meter_id,
        reading_id: current.id,
        date: current.date,
        value: current.value,
        previous_reading_id: previous.map(|p| p.id),
        previous_value: previous.map(|p| p.value),
        consumption: previous.map(|p| current.value - p.value),
    }
}

/// Resolve the consumption of a single reading against its predecessor.
///
/// Negative deltas are returned as-is; use [`ReadingDelta::is_anomalous`] to
/// flag them.
pub fn resolve_delta(meter_id: i32, readings: &[Reading], reading_id: i32) -> Result<ReadingDelta, EngineError> {
    let ordered = ordered_for_meter(meter_id, readings);
    let pos = ordered
        .iter()
        .position(|r| r.id == reading_id)
        .ok_or(EngineError::ReadingNotFound { meter_id, reading_id })?;

    let previous = pos.checked_sub(1).map(|p| ordered[p]);
    Ok(delta_between(previous, ordered[pos]))
}

/// Resolve every reading of `meter_id` in one ordered pass.
pub fn resolve_deltas(meter_id: i32, readings: &[Reading]) -> Vec<ReadingDelta> {
    let ordered = ordered_for_meter(meter_id, readings);
    let mut previous: Option<&Reading> = None;
    let mut deltas = Vec::with_capacity(ordered.len());

    for current in ordered {
        deltas.push(delta_between(previous, current));
        previous = Some(current);
    }

    deltas
}
