//! Extraction settings: input directory and the two filename prefixes.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ExtractError, Result};

/// Suffix of the per-experiment summary file written by the instrument.
pub const DEFAULT_EXPORT_SUFFIX: &str = "ExperimentSummary.csv";

/// Settings for one `extract` run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Directory holding the export files.
    pub directory: PathBuf,

    /// Text preceding the dilution factor in filenames (e.g. `"dilution"`).
    pub dilution_prefix: Option<String>,

    /// Text preceding the replicate number in filenames (e.g. `"rep"`).
    pub replicate_prefix: Option<String>,

    /// Only files whose name ends with this suffix are read.
    pub export_suffix: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            dilution_prefix: None,
            replicate_prefix: None,
            export_suffix: DEFAULT_EXPORT_SUFFIX.to_string(),
        }
    }
}

impl ExtractionConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            ..Default::default()
        }
    }

    pub fn with_dilution_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.dilution_prefix = Some(prefix.into());
        self
    }

    pub fn with_replicate_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.replicate_prefix = Some(prefix.into());
        self
    }

    /// Load settings from a JSON file. Missing fields take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ExtractError::io(path, e))?;
        let config: ExtractionConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Dilution prefix, with an empty string treated as unset.
    pub fn dilution_prefix(&self) -> Option<&str> {
        non_empty(self.dilution_prefix.as_deref())
    }

    /// Replicate prefix, with an empty string treated as unset.
    pub fn replicate_prefix(&self) -> Option<&str> {
        non_empty(self.replicate_prefix.as_deref())
    }
}

fn non_empty(prefix: Option<&str>) -> Option<&str> {
    prefix.filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractionConfig::default();
        assert_eq!(config.export_suffix, "ExperimentSummary.csv");
        assert!(config.dilution_prefix().is_none());
        assert!(config.replicate_prefix().is_none());
    }

    #[test]
    fn test_empty_prefixes_are_unset() {
        let config = ExtractionConfig::new("data")
            .with_dilution_prefix("")
            .with_replicate_prefix("rep");
        assert_eq!(config.dilution_prefix(), None);
        assert_eq!(config.replicate_prefix(), Some("rep"));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ExtractionConfig =
            serde_json::from_str(r#"{ "directory": "runs/day1", "dilution_prefix": "dil" }"#)
                .unwrap();
        assert_eq!(config.directory, PathBuf::from("runs/day1"));
        assert_eq!(config.dilution_prefix(), Some("dil"));
        assert_eq!(config.export_suffix, DEFAULT_EXPORT_SUFFIX);
    }
}
