use crate::domain::{MeterRoomAssignment, Room};

/// Rooms served by `meter_id`, ordered by name (id breaks ties).
///
/// An empty result is valid: the meter simply has no allocation target.
pub fn resolve_rooms(meter_id: i32, assignments: &[MeterRoomAssignment], rooms: &[Room]) -> Vec<Room> {
    let mut served: Vec<Room> = rooms
        .iter()
        .filter(|room| {
            assignments
                .iter()
                .any(|a| a.meter_id == meter_id && a.room_id == room.id)
        })
        .cloned()
        .collect();

    sort_rooms(&mut served);
    served
}

pub(crate) fn sort_rooms(rooms: &mut [Room]) {
    rooms.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn room(id: i32, name: &str) -> Room {
        Room {
            id,
            property_id: 1,
            name: name.to_string(),
            square_meters: Decimal::TEN,
        }
    }

    #[test]
    fn returns_assigned_rooms_sorted_by_name() {
        let rooms = vec![room(1, "Kitchen"), room(2, "Bedroom"), room(3, "Hall")];
        let assignments = vec![
            MeterRoomAssignment { meter_id: 10, room_id: 1 },
            MeterRoomAssignment { meter_id: 10, room_id: 2 },
            MeterRoomAssignment { meter_id: 11, room_id: 3 },
        ];

        let served = resolve_rooms(10, &assignments, &rooms);
        let names: Vec<&str> = served.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Bedroom", "Kitchen"]);
    }

    #[test]
    fn room_can_be_served_by_several_meters() {
        let rooms = vec![room(1, "Studio")];
        let assignments = vec![
            MeterRoomAssignment { meter_id: 10, room_id: 1 },
            MeterRoomAssignment { meter_id: 20, room_id: 1 },
        ];

        assert_eq!(resolve_rooms(10, &assignments, &rooms).len(), 1);
        assert_eq!(resolve_rooms(20, &assignments, &rooms).len(), 1);
    }

    #[test]
    fn unassigned_meter_has_no_rooms() {
        let rooms = vec![room(1, "Studio")];
        assert!(resolve_rooms(99, &[], &rooms).is_empty());
    }
}
