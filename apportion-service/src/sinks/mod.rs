pub mod csv_report;
pub mod ndjson;
pub mod rows;

pub use csv_report::CsvReportSink;
pub use ndjson::NdjsonReportSink;
pub use rows::{report_rows, ReportRow};
