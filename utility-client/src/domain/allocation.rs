use rust_decimal::Decimal;
use serde::{ser::SerializeStruct, Serialize, Serializer};

use super::{money, SplitMethod};

/// Text emitted in place of a number when no split formula applies.
pub const NOT_APPLICABLE: &str = "N/A";

/// One room's part of a meter's consumption and cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomShare {
    Allocated {
        consumption: Decimal,
        /// `None` when no cost is known for the period.
        cost: Option<Decimal>,
        /// Share of the meter total, 0..=100.
        percentage: Decimal,
    },
    /// No formula exists for the meter's split method.
    Unsupported,
}

impl RoomShare {
    pub fn consumption(&self) -> Option<Decimal> {
        match self {
            RoomShare::Allocated { consumption, .. } => Some(*consumption),
            RoomShare::Unsupported => None,
        }
    }

    pub fn cost(&self) -> Option<Decimal> {
        match self {
            RoomShare::Allocated { cost, .. } => *cost,
            RoomShare::Unsupported => None,
        }
    }

    pub fn percentage(&self) -> Option<Decimal> {
        match self {
            RoomShare::Allocated { percentage, .. } => Some(*percentage),
            RoomShare::Unsupported => None,
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, RoomShare::Allocated { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomAllocation {
    pub room_id: i32,
    pub room_name: String,
    pub square_meters: Decimal,
    pub share: RoomShare,
}

impl Serialize for RoomAllocation {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut s = serializer.serialize_struct("RoomAllocation", 6)?;
        s.serialize_field("room_id", &self.room_id)?;
        s.serialize_field("room_name", &self.room_name)?;
        s.serialize_field("square_meters", &money::format_money(self.square_meters))?;
        match &self.share {
            RoomShare::Allocated {
                consumption,
                cost,
                percentage,
            } => {
                s.serialize_field("consumption", &money::format_money(*consumption))?;
                s.serialize_field("cost", &cost.map(money::format_money))?;
                s.serialize_field("percentage", &money::format_money(*percentage))?;
            }
            RoomShare::Unsupported => {
                s.serialize_field("consumption", NOT_APPLICABLE)?;
                s.serialize_field("cost", NOT_APPLICABLE)?;
                s.serialize_field("percentage", NOT_APPLICABLE)?;
            }
        }
        s.end()
    }
}

/// Result of splitting one meter total across its rooms.
///
/// The totals are always present, so a meter with no rooms still reports
/// what it consumed even though `rooms` is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Allocation {
    pub split_method: Option<SplitMethod>,
    #[serde(serialize_with = "money::serialize")]
    pub total_consumption: Decimal,
    #[serde(serialize_with = "money::option::serialize")]
    pub total_cost: Option<Decimal>,
    pub rooms: Vec<RoomAllocation>,
}

impl Allocation {
    pub fn is_supported(&self) -> bool {
        self.rooms.iter().all(|r| r.share.is_supported())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn unsupported_room_serializes_as_not_applicable() {
        let room = RoomAllocation {
            room_id: 7,
            room_name: "Attic".to_string(),
            square_meters: dec!(12.5),
            share: RoomShare::Unsupported,
        };

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["consumption"], "N/A");
        assert_eq!(json["cost"], "N/A");
        assert_eq!(json["percentage"], "N/A");
        assert_eq!(json["square_meters"], "12.50");
    }

    #[test]
    fn allocated_room_serializes_rounded_with_null_cost() {
        let room = RoomAllocation {
            room_id: 1,
            room_name: "A".to_string(),
            square_meters: dec!(20),
            share: RoomShare::Allocated {
                consumption: dec!(16.6666666),
                cost: None,
                percentage: dec!(33.3333333),
            },
        };

        let json = serde_json::to_value(&room).unwrap();
        assert_eq!(json["consumption"], "16.67");
        assert!(json["cost"].is_null());
        assert_eq!(json["percentage"], "33.33");
    }
}
