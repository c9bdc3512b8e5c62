//! mrzscan: detection and parsing of the Machine-Readable Zone (MRZ) on
//! identity documents, per ICAO Doc 9303.
//!
//! The pipeline locates the MRZ band on a scanned or photographed page with
//! no document template, hands the cropped region to an injected OCR engine,
//! and decodes the text against the five standard layouts (TD1, TD2, TD3,
//! MRV-A, MRV-B) with full check-digit validation and bounded recovery from
//! common OCR confusions.
//!
//! ```no_run
//! let record = mrzscan::read_mrz("passport.jpg").unwrap();
//! if let Some(record) = record {
//!     println!("{} {}", record.given_names, record.surname);
//! }
//! ```

pub mod batch;
pub mod models;
pub mod parsing;
pub mod processing;
pub mod reader;
pub mod utils;
pub mod validation;

pub use models::{MrzFormat, MrzRecord};
pub use reader::{read_mrz, read_mrz_with_options, MrzReader, ReadOptions};
pub use utils::MrzError;
