pub mod allocation;
pub mod bill;
pub mod meter;
pub mod money;
pub mod reading;
pub mod room;

pub use allocation::{Allocation, RoomAllocation, RoomShare, NOT_APPLICABLE};
pub use bill::Bill;
pub use meter::{Meter, SplitMethod, UnknownSplitMethod, UnknownUtilityType, UtilityType};
pub use reading::Reading;
pub use room::{MeterRoomAssignment, Room};
