/// Data layer: reading, normalizing and aggregating instrument exports.
///
/// Architecture:
/// ```text
///   directory of *ExperimentSummary.csv
///        │
///        ▼
///   ┌──────────┐
///   │ listing   │  sorted filename keys → paths
///   └──────────┘
///        │              ┌──────────┐
///        ├─────────────▶│ filename  │  dilution factor, sample name
///        ▼              └──────────┘
///   ┌──────────┐
///   │  reader   │  sections → distribution, size summary, metadata
///   └──────────┘
///        │
///        ▼
///   ┌───────────┐
///   │ normalize  │  scale, integrate, Average/Std, pivot to one row
///   └───────────┘
///        │
///        ▼
///   ┌───────────┐      ┌────────────┐
///   │ aggregate  │────▶│ replicates  │  per-sample averages
///   └───────────┘      └────────────┘
///        │
///        ▼
///     Extraction  ──▶  overview
/// ```

pub mod aggregate;
pub mod filename;
pub mod listing;
pub mod model;
pub mod normalize;
pub mod overview;
pub mod reader;
pub mod replicates;
