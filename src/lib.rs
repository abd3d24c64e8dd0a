//! Extraction and aggregation of nanoparticle tracking exports.
//!
//! Reads every `*ExperimentSummary.csv` export of a directory, normalizes its
//! irregular multi-section layout into tables, and aggregates measurements
//! across dilution factors, videos and experiment replicates.
//!
//! # Example
//!
//! ```no_run
//! use nanosight_extract::{extract, ExtractionConfig};
//!
//! let config = ExtractionConfig::new("exports/2024-03-01")
//!     .with_dilution_prefix("dilution")
//!     .with_replicate_prefix("rep");
//! let extraction = extract(&config).unwrap();
//! println!("{} samples", extraction.samples_filenames.len());
//! ```

pub mod color;
pub mod config;
pub mod data;
pub mod error;
pub mod export;

pub use config::ExtractionConfig;
pub use data::aggregate::{extract, extract_directory};
pub use data::model::{Extraction, FileInfo, MetadataValue, SizeDistributions, WideTable};
pub use error::{ExtractError, Result};
