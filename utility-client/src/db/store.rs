use anyhow::Result;
use rust_decimal::Decimal;

use crate::{
    domain::{Meter, Reading, Room, UtilityType},
    engine::{default_utility_price, BillingPeriod, MeterPeriodInput},
};

/// Read-side data access the engine's callers depend on.
///
/// Implementations own all I/O; the engine only ever sees the values they
/// return.
#[async_trait::async_trait]
pub trait UtilityStore: Send + Sync {
    async fn meter(&self, meter_id: i32) -> Result<Option<Meter>>;

    async fn meters(&self) -> Result<Vec<Meter>>;

    async fn meters_for_property(&self, property_id: i32) -> Result<Vec<Meter>>;

    /// All readings of a meter ordered by date, creation time and id.
    async fn readings_for_meter(&self, meter_id: i32) -> Result<Vec<Reading>>;

    async fn reading(&self, reading_id: i32) -> Result<Option<Reading>>;

    /// Rooms served by a meter, ordered by name.
    async fn rooms_for_meter(&self, meter_id: i32) -> Result<Vec<Room>>;

    /// Sum of the meter's bills dated in `period`, `None` when there are none.
    async fn billed_amount(&self, meter_id: i32, period: BillingPeriod) -> Result<Option<Decimal>>;

    async fn utility_price(&self, utility: UtilityType) -> Result<Option<Decimal>>;

    /// Gather every input needed to apportion `meter` over `period`.
    ///
    /// A utility with no stored price falls back to [`default_utility_price`].
    async fn period_input(&self, meter: Meter, period: BillingPeriod) -> Result<MeterPeriodInput> {
        let rooms = self.rooms_for_meter(meter.id).await?;
        let readings = self.readings_for_meter(meter.id).await?;
        let billed_amount = self.billed_amount(meter.id, period).await?;
        let utility_rate = match self.utility_price(meter.utility_type).await? {
            Some(price) => price,
            None => {
                tracing::debug!(meter_id = meter.id, utility = %meter.utility_type, "no stored utility price, using default");
                default_utility_price(meter.utility_type)
            }
        };

        Ok(MeterPeriodInput {
            meter,
            period,
            rooms,
            readings,
            billed_amount,
            utility_rate: Some(utility_rate),
        })
    }
}
