//! Output formats for stored artifacts.
//!
//! - [`csv`]: header + rows, fixed column order
//! - [`json`]: compact JSON of the source records
//!
//! # Stored layout
//!
//! ```text
//! {bucket}/
//! ├── {ecdc_folder}/{date}_{division}.csv
//! ├── {ecdc_folder}/ecdc_{division}_latest.csv
//! ├── {cdc_folder}/{date}.csv
//! ├── {cdc_folder}/cdc_latest.csv
//! ├── {paho_folder}/{date}_{name}.csv
//! ├── {paho_folder}/paho_{name}_latest.csv
//! ├── {who_folder}/{date}.csv | {date}.json
//! ├── {who_folder}/who_latest.csv | who_latest.json
//! ├── {linelist_folder}/archives/{date}.csv | {date}.json
//! └── {linelist_folder}/latest.csv | latest.json
//! ```

pub mod csv;
pub mod json;
