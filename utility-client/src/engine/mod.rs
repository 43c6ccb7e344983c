//! Pure apportionment engine.
//!
//! Nothing here performs I/O or holds state: callers fetch meters, rooms,
//! readings and bills first (see [`crate::db::UtilityStore`]) and pass them in.

pub mod allocation;
pub mod delta;
pub mod period;
pub mod pricing;
pub mod rooms;

pub use allocation::allocate;
pub use delta::{resolve_delta, resolve_deltas, ReadingDelta};
pub use period::{
    aggregate_monthly, aggregate_period, allocate_period, BillingPeriod, MeterPeriodInput, MeterPeriodReport,
    PeriodConsumption, PeriodOutcome,
};
pub use pricing::{default_utility_price, implied_unit_price, reading_cost, resolve_period_cost, CostBasis};
pub use rooms::resolve_rooms;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("reading {reading_id} not found for meter {meter_id}")]
    ReadingNotFound { meter_id: i32, reading_id: i32 },
    #[error("invalid billing period {year}-{month}")]
    InvalidPeriod { year: i32, month: u8 },
}
