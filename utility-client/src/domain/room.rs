use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A rentable sub-unit of a property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Room {
    pub id: i32,
    pub property_id: i32,
    pub name: String,
    /// Floor area in square meters.
    pub square_meters: Decimal,
}

/// Join row linking a meter to one room it serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::FromRow)]
pub struct MeterRoomAssignment {
    pub meter_id: i32,
    pub room_id: i32,
}
