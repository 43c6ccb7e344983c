pub mod period_input_file;
pub mod store_month;

pub use period_input_file::PeriodInputFileSource;
pub use store_month::StoreMonthSource;
