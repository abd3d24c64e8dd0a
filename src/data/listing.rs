use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ExtractError, Result};

/// Export files of `directory` keyed by their filename key, in sorted order.
///
/// Only regular files whose name ends with `export_suffix` are kept. The key
/// is the file name without the suffix and without trailing `_`, `-` or
/// space separators (`S1_rep1_ExperimentSummary.csv` → `S1_rep1`).
pub fn list_export_files(directory: &Path, export_suffix: &str) -> Result<BTreeMap<String, PathBuf>> {
    let entries = std::fs::read_dir(directory).map_err(|e| ExtractError::io(directory, e))?;

    let mut files: BTreeMap<String, PathBuf> = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|e| ExtractError::io(directory, e))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            debug!("skipping non UTF-8 file name {}", path.display());
            continue;
        };
        if !name.ends_with(export_suffix) {
            continue;
        }

        let key = filename_key(name, export_suffix);
        if let Some(first) = files.get(&key) {
            return Err(ExtractError::DuplicateFilename {
                key,
                first: first.clone(),
                second: path,
            });
        }
        files.insert(key, path);
    }

    if files.is_empty() {
        return Err(ExtractError::NoExportFiles {
            directory: directory.to_path_buf(),
            suffix: export_suffix.to_string(),
        });
    }
    Ok(files)
}

fn filename_key(name: &str, export_suffix: &str) -> String {
    let stripped = name
        .strip_suffix(export_suffix)
        .unwrap_or(name)
        .trim_end_matches(['_', '-', ' ']);
    if !stripped.is_empty() {
        return stripped.to_string();
    }
    Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_filename_key() {
        let suffix = "ExperimentSummary.csv";
        assert_eq!(filename_key("S1_rep1_ExperimentSummary.csv", suffix), "S1_rep1");
        assert_eq!(filename_key("S1-ExperimentSummary.csv", suffix), "S1");
        assert_eq!(filename_key("ExperimentSummary.csv", suffix), "ExperimentSummary");
    }

    #[test]
    fn test_lists_only_exports_sorted() {
        let dir = TempDir::new().unwrap();
        for name in [
            "b_ExperimentSummary.csv",
            "a_ExperimentSummary.csv",
            "a_AllTracks.csv",
            "notes.txt",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("c_ExperimentSummary.csv")).unwrap();

        let files = list_export_files(dir.path(), "ExperimentSummary.csv").unwrap();
        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a_ExperimentSummary.csv"), "").unwrap();
        fs::write(dir.path().join("a-ExperimentSummary.csv"), "").unwrap();
        let err = list_export_files(dir.path(), "ExperimentSummary.csv").unwrap_err();
        assert!(matches!(err, ExtractError::DuplicateFilename { .. }));
    }

    #[test]
    fn test_empty_directory() {
        let dir = TempDir::new().unwrap();
        let err = list_export_files(dir.path(), "ExperimentSummary.csv").unwrap_err();
        assert!(matches!(err, ExtractError::NoExportFiles { .. }));
    }
}
