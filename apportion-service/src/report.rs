//! Read-side report assembly: fetch from a [`UtilityStore`], run the engine.

use std::collections::BTreeMap;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use utility_client::{
    db::UtilityStore,
    domain::{money, Allocation, UtilityType},
    engine::{
        aggregate_period, allocate, allocate_period, reading_cost, resolve_delta, BillingPeriod, MeterPeriodReport,
        PeriodConsumption, PeriodOutcome, ReadingDelta,
    },
};

use crate::transform::record_outcome_metrics;

/// A room's cost summed over every meter that serves it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomCostTotal {
    pub room_id: i32,
    pub room_name: String,
    #[serde(serialize_with = "money::serialize")]
    pub total_cost: Decimal,
    /// Meters whose allocation gave this room a cost.
    pub priced_meters: usize,
    /// Meters serving this room with no split formula.
    pub unsupported_meters: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PropertyMonthReport {
    pub property_id: i32,
    pub period: BillingPeriod,
    pub meters: Vec<MeterPeriodReport>,
    /// Meters with no consumption in the period.
    pub skipped_meters: Vec<i32>,
    pub rooms: Vec<RoomCostTotal>,
    #[serde(serialize_with = "money::option::serialize")]
    pub total_cost: Option<Decimal>,
}

/// Per-meter allocations for a property and month, plus per-room cost totals.
pub async fn property_month_report(
    store: &dyn UtilityStore,
    property_id: i32,
    period: BillingPeriod,
) -> Result<PropertyMonthReport> {
    let mut meters = Vec::new();
    let mut skipped_meters = Vec::new();

    for meter in store.meters_for_property(property_id).await? {
        let input = store.period_input(meter, period).await?;
        let outcome = allocate_period(&input);
        record_outcome_metrics(&outcome);

        match outcome {
            PeriodOutcome::Allocated(report) => meters.push(report),
            PeriodOutcome::Skipped(consumption) => skipped_meters.push(consumption.meter_id),
        }
    }

    let rooms = room_totals(&meters);
    let total_cost = meters
        .iter()
        .filter_map(|m| m.allocation.total_cost)
        .fold(None, |acc: Option<Decimal>, cost| Some(acc.unwrap_or_default() + cost));

    Ok(PropertyMonthReport {
        property_id,
        period,
        meters,
        skipped_meters,
        rooms,
        total_cost,
    })
}

fn room_totals(meters: &[MeterPeriodReport]) -> Vec<RoomCostTotal> {
    let mut totals: BTreeMap<i32, RoomCostTotal> = BTreeMap::new();

    for room in meters.iter().flat_map(|m| &m.allocation.rooms) {
        let entry = totals.entry(room.room_id).or_insert_with(|| RoomCostTotal {
            room_id: room.room_id,
            room_name: room.room_name.clone(),
            total_cost: Decimal::ZERO,
            priced_meters: 0,
            unsupported_meters: 0,
        });

        if !room.share.is_supported() {
            entry.unsupported_meters += 1;
        } else if let Some(cost) = room.share.cost() {
            entry.total_cost += cost;
            entry.priced_meters += 1;
        }
    }

    let mut rooms: Vec<RoomCostTotal> = totals.into_values().collect();
    rooms.sort_by(|a, b| a.room_name.cmp(&b.room_name).then(a.room_id.cmp(&b.room_id)));
    rooms
}

/// How one reading's consumption splits across the meter's rooms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReadingBreakdown {
    pub meter_id: i32,
    pub utility_type: UtilityType,
    pub delta: ReadingDelta,
    pub anomalous: bool,
    #[serde(serialize_with = "money::option::serialize")]
    pub cost: Option<Decimal>,
    /// `None` for a first reading, which has no consumption to split.
    pub allocation: Option<Allocation>,
}

/// `Ok(None)` when the reading or its meter does not exist.
pub async fn reading_breakdown(store: &dyn UtilityStore, reading_id: i32) -> Result<Option<ReadingBreakdown>> {
    let Some(reading) = store.reading(reading_id).await? else {
        return Ok(None);
    };
    let Some(meter) = store.meter(reading.meter_id).await? else {
        tracing::warn!(reading_id, meter_id = reading.meter_id, "reading refers to a missing meter");
        return Ok(None);
    };

    let readings = store.readings_for_meter(meter.id).await?;
    let delta = resolve_delta(meter.id, &readings, reading_id)?;
    let cost = reading_cost(&delta, meter.unit_price);

    let allocation = match delta.consumption {
        Some(consumption) => {
            let rooms = store.rooms_for_meter(meter.id).await?;
            Some(allocate(consumption, cost, meter.split_method, &rooms))
        }
        None => None,
    };

    Ok(Some(ReadingBreakdown {
        meter_id: meter.id,
        utility_type: meter.utility_type,
        anomalous: delta.is_anomalous(),
        delta,
        cost,
        allocation,
    }))
}

/// `Ok(None)` when the meter does not exist.
pub async fn meter_consumption(
    store: &dyn UtilityStore,
    meter_id: i32,
    period: BillingPeriod,
) -> Result<Option<PeriodConsumption>> {
    if store.meter(meter_id).await?.is_none() {
        return Ok(None);
    }
    let readings = store.readings_for_meter(meter_id).await?;
    Ok(Some(aggregate_period(meter_id, &readings, period)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn january() -> BillingPeriod {
        BillingPeriod::new(2024, 1).unwrap()
    }

    #[tokio::test]
    async fn property_report_sums_room_costs_across_meters() {
        let store = fixtures::store();
        let report = property_month_report(&store, 1, january()).await.unwrap();

        let meter_ids: Vec<i32> = report.meters.iter().map(|m| m.meter_id).collect();
        assert_eq!(meter_ids, vec![10, 11, 12]);
        assert_eq!(report.skipped_meters, vec![13]);

        // Electricity 75.00 by area (30 / 45) plus water 10 units at 2.00 split equally (10 / 10).
        let a = &report.rooms[0];
        let b = &report.rooms[1];
        assert_eq!((a.room_name.as_str(), a.total_cost), ("Room A", dec!(40)));
        assert_eq!((b.room_name.as_str(), b.total_cost), ("Room B", dec!(55)));
        assert_eq!(a.unsupported_meters, 1);
        assert_eq!(a.priced_meters, 2);
        // Gas has no stored price, so its 3 units cost the default 0.35 each
        // even though the custom split leaves the rooms without a share.
        assert_eq!(report.meters[2].allocation.total_cost, Some(dec!(1.05)));
        assert_eq!(report.total_cost, Some(dec!(96.05)));
    }

    #[tokio::test]
    async fn reading_breakdown_splits_single_delta() {
        let store = fixtures::store();
        let breakdown = reading_breakdown(&store, 111).await.unwrap().unwrap();

        assert_eq!(breakdown.delta.consumption, Some(dec!(10)));
        assert_eq!(breakdown.cost, Some(dec!(20)));
        let allocation = breakdown.allocation.unwrap();
        assert_eq!(allocation.rooms[0].share.cost(), Some(dec!(10)));
    }

    #[tokio::test]
    async fn first_reading_has_no_breakdown() {
        let store = fixtures::store();
        let breakdown = reading_breakdown(&store, 100).await.unwrap().unwrap();

        assert_eq!(breakdown.delta.consumption, None);
        assert!(breakdown.allocation.is_none());
        assert!(reading_breakdown(&store, 9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn meter_consumption_counts_cross_month_delta() {
        let store = fixtures::store();
        let consumption = meter_consumption(&store, 11, january()).await.unwrap().unwrap();

        assert_eq!(consumption.total, dec!(10));
        assert!(meter_consumption(&store, 404, january()).await.unwrap().is_none());
    }
}
