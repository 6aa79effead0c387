//! Pure stages of the schedule pipeline: file name → month, CSV → rows → calendar.

pub mod calendar;
pub mod csv_reader;
pub mod date_parser;
pub mod schema;

pub use calendar::{build_schedule, DailySchedule, MonthlySchedule};
pub use csv_reader::{read_records, CsvMode, RawRecord};
pub use date_parser::{extract_month_year, TargetMonth};
pub use schema::validate_columns;
