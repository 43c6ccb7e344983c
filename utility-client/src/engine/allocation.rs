use rust_decimal::Decimal;

use crate::domain::{Allocation, Room, RoomAllocation, RoomShare, SplitMethod};

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// Split a meter total across the rooms it serves.
///
/// `area` weights each room by floor area, `equal` divides evenly. Every
/// other method, including a missing one, yields [`RoomShare::Unsupported`]
/// for each room. Values keep full precision; round at the output boundary.
pub fn allocate(
    total_consumption: Decimal,
    total_cost: Option<Decimal>,
    split_method: Option<SplitMethod>,
    rooms: &[Room],
) -> Allocation {
    let shares = match split_method {
        Some(SplitMethod::Area) => area_shares(total_consumption, total_cost, rooms),
        Some(SplitMethod::Equal) => equal_shares(total_consumption, total_cost, rooms),
        Some(SplitMethod::Custom) | Some(SplitMethod::Individual) | None => None,
    };

    let rooms = match shares {
        Some(shares) => rooms
            .iter()
            .zip(shares)
            .map(|(room, share)| room_allocation(room, share))
            .collect(),
        None => rooms
            .iter()
            .map(|room| room_allocation(room, RoomShare::Unsupported))
            .collect(),
    };

    Allocation {
        split_method,
        total_consumption,
        total_cost,
        rooms,
    }
}

fn room_allocation(room: &Room, share: RoomShare) -> RoomAllocation {
    RoomAllocation {
        room_id: room.id,
        room_name: room.name.clone(),
        square_meters: room.square_meters,
        share,
    }
}

fn area_shares(total_consumption: Decimal, total_cost: Option<Decimal>, rooms: &[Room]) -> Option<Vec<RoomShare>> {
    if rooms.is_empty() {
        return Some(Vec::new());
    }
    let Some(total_area) = rooms
        .iter()
        .try_fold(Decimal::ZERO, |acc, r| acc.checked_add(r.square_meters))
    else {
        tracing::warn!(rooms = rooms.len(), "room areas overflow, leaving unallocated");
        return None;
    };
    if total_area <= Decimal::ZERO {
        tracing::warn!(%total_area, "area split over rooms with no floor area, leaving unallocated");
        return None;
    }

    let shares: Option<Vec<RoomShare>> = rooms
        .iter()
        .map(|room| area_share(total_consumption, total_cost, room.square_meters, total_area))
        .collect();
    if shares.is_none() {
        tracing::warn!(%total_consumption, %total_area, "area split overflows, leaving unallocated");
    }
    shares
}

// Multiply before dividing so exact ratios (20/50) stay exact.
fn area_share(
    total_consumption: Decimal,
    total_cost: Option<Decimal>,
    square_meters: Decimal,
    total_area: Decimal,
) -> Option<RoomShare> {
    let weigh = |value: Decimal| value.checked_mul(square_meters)?.checked_div(total_area);

    let cost = match total_cost {
        Some(cost) => Some(weigh(cost)?),
        None => None,
    };
    Some(RoomShare::Allocated {
        consumption: weigh(total_consumption)?,
        cost,
        percentage: weigh(HUNDRED)?,
    })
}

fn equal_shares(total_consumption: Decimal, total_cost: Option<Decimal>, rooms: &[Room]) -> Option<Vec<RoomShare>> {
    if rooms.is_empty() {
        return Some(Vec::new());
    }
    let count = Decimal::from(rooms.len());

    let shares = rooms
        .iter()
        .map(|_| RoomShare::Allocated {
            consumption: total_consumption / count,
            cost: total_cost.map(|cost| cost / count),
            percentage: HUNDRED / count,
        })
        .collect();
    Some(shares)
}
