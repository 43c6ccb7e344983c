use std::collections::HashMap;

use anyhow::Result;
use rust_decimal::Decimal;

use super::UtilityStore;
use crate::{
    domain::{Bill, Meter, MeterRoomAssignment, Reading, Room, UtilityType},
    engine::{resolve_rooms, BillingPeriod},
};

/// In-process store for fixtures, demos and tests.
///
/// Built once with the `with_*` methods and read-only afterwards, so it needs
/// no locking.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    meters: Vec<Meter>,
    rooms: Vec<Room>,
    assignments: Vec<MeterRoomAssignment>,
    readings: Vec<Reading>,
    bills: Vec<Bill>,
    prices: HashMap<UtilityType, Decimal>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_meter(mut self, meter: Meter) -> Self {
        self.meters.push(meter);
        self
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.push(room);
        self
    }

    /// Assign a room to a meter; repeated pairs are ignored.
    pub fn assign(mut self, meter_id: i32, room_id: i32) -> Self {
        let assignment = MeterRoomAssignment { meter_id, room_id };
        if !self.assignments.contains(&assignment) {
            self.assignments.push(assignment);
        }
        self
    }

    pub fn with_reading(mut self, reading: Reading) -> Self {
        self.readings.push(reading);
        self
    }

    pub fn with_bill(mut self, bill: Bill) -> Self {
        self.bills.push(bill);
        self
    }

    pub fn with_price(mut self, utility: UtilityType, price: Decimal) -> Self {
        self.prices.insert(utility, price);
        self
    }
}

#[async_trait::async_trait]
impl UtilityStore for MemoryStore {
    async fn meter(&self, meter_id: i32) -> Result<Option<Meter>> {
        Ok(self.meters.iter().find(|m| m.id == meter_id).cloned())
    }

    async fn meters(&self) -> Result<Vec<Meter>> {
        let mut meters = self.meters.clone();
        meters.sort_by_key(|m| (m.property_id, m.id));
        Ok(meters)
    }

    async fn meters_for_property(&self, property_id: i32) -> Result<Vec<Meter>> {
        let mut meters: Vec<Meter> = self
            .meters
            .iter()
            .filter(|m| m.property_id == property_id)
            .cloned()
            .collect();
        meters.sort_by_key(|m| m.id);
        Ok(meters)
    }

    async fn readings_for_meter(&self, meter_id: i32) -> Result<Vec<Reading>> {
        let mut readings: Vec<Reading> = self
            .readings
            .iter()
            .filter(|r| r.meter_id == meter_id)
            .cloned()
            .collect();
        readings.sort_by(|a, b| (a.date, a.created_at, a.id).cmp(&(b.date, b.created_at, b.id)));
        Ok(readings)
    }

    async fn reading(&self, reading_id: i32) -> Result<Option<Reading>> {
        Ok(self.readings.iter().find(|r| r.id == reading_id).cloned())
    }

    async fn rooms_for_meter(&self, meter_id: i32) -> Result<Vec<Room>> {
        Ok(resolve_rooms(meter_id, &self.assignments, &self.rooms))
    }

    async fn billed_amount(&self, meter_id: i32, period: BillingPeriod) -> Result<Option<Decimal>> {
        let amounts: Vec<Decimal> = self
            .bills
            .iter()
            .filter(|b| b.meter_id == meter_id && period.contains(b.date))
            .map(|b| b.amount)
            .collect();

        if amounts.is_empty() {
            Ok(None)
        } else {
            Ok(Some(amounts.into_iter().sum()))
        }
    }

    async fn utility_price(&self, utility: UtilityType) -> Result<Option<Decimal>> {
        Ok(self.prices.get(&utility).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SplitMethod;
    use rust_decimal_macros::dec;
    use time::macros::date;

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_meter(Meter {
                id: 1,
                property_id: 5,
                utility_type: UtilityType::Water,
                meter_number: None,
                split_method: Some(SplitMethod::Equal),
                unit_price: None,
            })
            .with_room(Room {
                id: 1,
                property_id: 5,
                name: "Zeta".to_string(),
                square_meters: dec!(10),
            })
            .with_room(Room {
                id: 2,
                property_id: 5,
                name: "Alpha".to_string(),
                square_meters: dec!(12),
            })
            .assign(1, 1)
            .assign(1, 2)
            .assign(1, 2)
            .with_bill(Bill {
                id: 1,
                meter_id: 1,
                reading_id: None,
                date: date!(2024-01-05),
                amount: dec!(40),
                verified: true,
            })
            .with_bill(Bill {
                id: 2,
                meter_id: 1,
                reading_id: None,
                date: date!(2024-01-25),
                amount: dec!(2.5),
                verified: false,
            })
            .with_bill(Bill {
                id: 3,
                meter_id: 1,
                reading_id: None,
                date: date!(2024-02-01),
                amount: dec!(99),
                verified: false,
            })
            .with_price(UtilityType::Water, dec!(8.50))
    }

    #[tokio::test]
    async fn billed_amount_sums_bills_in_month() {
        let store = store();
        let january = BillingPeriod::new(2024, 1).unwrap();
        let march = BillingPeriod::new(2024, 3).unwrap();

        assert_eq!(store.billed_amount(1, january).await.unwrap(), Some(dec!(42.5)));
        assert_eq!(store.billed_amount(1, march).await.unwrap(), None);
    }

    #[tokio::test]
    async fn period_input_collects_rooms_bills_and_rate() {
        let store = store();
        let meter = store.meter(1).await.unwrap().unwrap();
        let input = store
            .period_input(meter, BillingPeriod::new(2024, 1).unwrap())
            .await
            .unwrap();

        let names: Vec<&str> = input.rooms.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
        assert_eq!(input.billed_amount, Some(dec!(42.5)));
        assert_eq!(input.utility_rate, Some(dec!(8.50)));
    }

    #[tokio::test]
    async fn period_input_falls_back_to_default_rate() {
        let store = store().with_meter(Meter {
            id: 2,
            property_id: 5,
            utility_type: UtilityType::Gas,
            meter_number: None,
            split_method: Some(SplitMethod::Area),
            unit_price: None,
        });
        let meter = store.meter(2).await.unwrap().unwrap();
        let input = store
            .period_input(meter, BillingPeriod::new(2024, 1).unwrap())
            .await
            .unwrap();

        assert_eq!(input.utility_rate, Some(dec!(0.35)));
        assert_eq!(input.billed_amount, None);
    }
}
