use serde::Serialize;
use utility_client::{
    domain::{money::format_money, RoomShare, NOT_APPLICABLE},
    engine::{implied_unit_price, BillingPeriod, CostBasis, MeterPeriodReport},
};

/// One flat output row: a room's share of one meter for one period.
///
/// A meter with no rooms still produces one row (room columns empty) so its
/// totals appear in the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportRow {
    pub allocation_id: String,
    pub period: String,
    pub property_id: i32,
    pub meter_id: i32,
    pub utility_type: String,
    pub split_method: String,
    pub cost_basis: String,
    pub meter_consumption: String,
    pub meter_cost: String,
    /// Meter cost over meter consumption, empty when either is missing or not positive.
    pub meter_unit_price: String,
    pub room_id: Option<i32>,
    pub room_name: Option<String>,
    pub square_meters: Option<String>,
    pub consumption: Option<String>,
    pub cost: Option<String>,
    pub percentage: Option<String>,
}

impl ReportRow {
    /// Column names in field order, for writers that need a header without a row.
    pub const HEADER: [&'static str; 16] = [
        "allocation_id",
        "period",
        "property_id",
        "meter_id",
        "utility_type",
        "split_method",
        "cost_basis",
        "meter_consumption",
        "meter_cost",
        "meter_unit_price",
        "room_id",
        "room_name",
        "square_meters",
        "consumption",
        "cost",
        "percentage",
    ];
}

fn hash_i32(hasher: &mut blake3::Hasher, v: i32) {
    hasher.update(&v.to_le_bytes());
}

fn hash_opt_i32(hasher: &mut blake3::Hasher, v: Option<i32>) {
    match v {
        Some(x) => {
            hasher.update(&[1]);
            hash_i32(hasher, x);
        }
        None => {
            hasher.update(&[0]);
        }
    }
}

/// Stable id for a (period, meter, room) cell, so re-running a report for the
/// same month yields the same ids.
pub fn allocation_id(period: BillingPeriod, meter_id: i32, room_id: Option<i32>) -> String {
    let mut h = blake3::Hasher::new();
    hash_i32(&mut h, period.year());
    h.update(&[period.month() as u8]);
    hash_i32(&mut h, meter_id);
    hash_opt_i32(&mut h, room_id);
    h.finalize().to_hex().to_string()
}

fn cost_basis_label(basis: Option<&CostBasis>) -> &'static str {
    match basis {
        Some(CostBasis::UnitPrice { .. }) => "unit_price",
        Some(CostBasis::Billed { .. }) => "billed",
        Some(CostBasis::UtilityRate { .. }) => "utility_rate",
        None => "none",
    }
}

fn na() -> Option<String> {
    Some(NOT_APPLICABLE.to_string())
}

pub fn report_rows(report: &MeterPeriodReport) -> Vec<ReportRow> {
    let period = report.consumption.period;
    let allocation = &report.allocation;

    let base = ReportRow {
        allocation_id: allocation_id(period, report.meter_id, None),
        period: period.to_string(),
        property_id: report.property_id,
        meter_id: report.meter_id,
        utility_type: report.utility_type.to_string(),
        split_method: allocation
            .split_method
            .map(|m| m.to_string())
            .unwrap_or_default(),
        cost_basis: cost_basis_label(report.cost_basis.as_ref()).to_string(),
        meter_consumption: format_money(allocation.total_consumption),
        meter_cost: allocation.total_cost.map(format_money).unwrap_or_default(),
        meter_unit_price: allocation
            .total_cost
            .and_then(|cost| implied_unit_price(cost, allocation.total_consumption))
            .map(format_money)
            .unwrap_or_default(),
        room_id: None,
        room_name: None,
        square_meters: None,
        consumption: None,
        cost: None,
        percentage: None,
    };

    if allocation.rooms.is_empty() {
        return vec![base];
    }

    allocation
        .rooms
        .iter()
        .map(|room| {
            let (consumption, cost, percentage) = match &room.share {
                RoomShare::Allocated {
                    consumption,
                    cost,
                    percentage,
                } => (
                    Some(format_money(*consumption)),
                    cost.map(format_money),
                    Some(format_money(*percentage)),
                ),
                RoomShare::Unsupported => (na(), na(), na()),
            };

            ReportRow {
                allocation_id: allocation_id(period, report.meter_id, Some(room.room_id)),
                room_id: Some(room.room_id),
                room_name: Some(room.room_name.clone()),
                square_meters: Some(format_money(room.square_meters)),
                consumption,
                cost,
                percentage,
                ..base.clone()
            }
        })
        .collect()
}
