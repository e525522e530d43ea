//! Table and checkpoint persistence backends.

pub mod csv;
pub mod json;

pub use self::csv::CsvTableStore;
pub use self::json::JsonTableStore;
