pub mod memory;
pub mod pg;
pub mod store;

pub use memory::MemoryStore;
pub use pg::PgUtilityStore;
pub use store::UtilityStore;
