use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

use super::aggregate::{NOISE_DETECTED_COLUMN, PARTICLES_PER_FRAME_COLUMN};
use super::model::{Extraction, MetadataValue};

// ---------------------------------------------------------------------------
// Sample overview – one line per file, grouped by sample
// ---------------------------------------------------------------------------

/// Per-file summary shown after loading a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OverviewRow {
    pub sample_name: String,
    /// Replicate suffix, `None` for a sample without replicates.
    pub replicate: Option<String>,
    pub filename: String,
    /// Dilution factor, or `Not found`.
    pub dilution: String,
    /// Particles per frame of every video, comma separated.
    pub particles_per_frame: String,
    pub noise: String,
}

/// Label of the `Noise detected` flag in tables and exports.
pub fn noise_label(noise_detected: bool) -> &'static str {
    if noise_detected {
        "Noise detected"
    } else {
        ""
    }
}

/// Overview rows in sorted sample order, replicates in sorted suffix order.
pub fn sample_overview(extraction: &Extraction) -> Vec<OverviewRow> {
    let mut rows = Vec::with_capacity(extraction.files_infos.len());
    for (sample, suffixes) in &extraction.samples_filenames {
        let members: Vec<(String, Option<String>)> = if suffixes.is_empty() {
            vec![(sample.clone(), None)]
        } else {
            suffixes
                .iter()
                .map(|s| (format!("{sample}{s}"), Some(s.clone())))
                .collect()
        };

        for (filename, replicate) in members {
            let dilution = match extraction.file_info(&filename) {
                Some(info) if info.dilution_found => info.dilution_factor.to_string(),
                _ => "Not found".to_string(),
            };
            let particles_per_frame = extraction
                .metadata
                .get(&filename, PARTICLES_PER_FRAME_COLUMN)
                .map(MetadataValue::to_string)
                .unwrap_or_default();
            let noise = match extraction.metadata.get(&filename, NOISE_DETECTED_COLUMN) {
                Some(MetadataValue::Bool(flag)) => noise_label(*flag).to_string(),
                _ => String::new(),
            };

            rows.push(OverviewRow {
                sample_name: sample.clone(),
                replicate,
                filename,
                dilution,
                particles_per_frame,
                noise,
            });
        }
    }
    rows
}

/// Render the overview as a terminal table. The replicate column is only
/// shown when some sample has replicates.
pub fn overview_table(rows: &[OverviewRow], show_replicates: bool) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let mut header = vec!["Name"];
    if show_replicates {
        header.push("Replicate name");
    }
    header.extend(["Dilution", "Particles per frame", "Noise detected"]);
    table.set_header(header);

    for row in rows {
        let mut cells = vec![row.sample_name.clone()];
        if show_replicates {
            cells.push(row.replicate.clone().unwrap_or_default());
        }
        cells.extend([
            row.dilution.clone(),
            row.particles_per_frame.clone(),
            row.noise.clone(),
        ]);
        table.add_row(cells);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{FileInfo, SizeDistributions, WideTable};
    use std::collections::BTreeMap;
    use std::path::PathBuf;

    fn extraction() -> Extraction {
        let files_infos = vec![
            FileInfo {
                filename: "A_rep1".into(),
                dilution_factor: 10,
                dilution_found: true,
                sample_name: "A_".into(),
                replicate_found: true,
            },
            FileInfo {
                filename: "A_rep2".into(),
                dilution_factor: 10,
                dilution_found: true,
                sample_name: "A_".into(),
                replicate_found: true,
            },
            FileInfo {
                filename: "B".into(),
                dilution_factor: 1,
                dilution_found: false,
                sample_name: "B".into(),
                replicate_found: false,
            },
        ];
        let mut samples_filenames = BTreeMap::new();
        samples_filenames.insert("A_".to_string(), vec!["rep1".to_string(), "rep2".to_string()]);
        samples_filenames.insert("B".to_string(), Vec::new());

        let mut metadata = WideTable::new();
        for (file, noise) in [("A_rep1", false), ("A_rep2", true), ("B", false)] {
            metadata.push_row(
                file,
                vec![
                    (
                        "Particles per frame".to_string(),
                        Some(MetadataValue::List(vec![
                            MetadataValue::Integer(40),
                            MetadataValue::Integer(42),
                        ])),
                    ),
                    ("Noise detected".to_string(), Some(MetadataValue::Bool(noise))),
                ],
            );
        }

        Extraction {
            directory: PathBuf::from("dir"),
            files_infos,
            samples_filenames,
            size_distributions: SizeDistributions::default(),
            size_concentration_attributes: WideTable::new(),
            metadata,
        }
    }

    #[test]
    fn test_overview_rows() {
        let rows = sample_overview(&extraction());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].filename, "A_rep1");
        assert_eq!(rows[0].replicate.as_deref(), Some("rep1"));
        assert_eq!(rows[0].dilution, "10");
        assert_eq!(rows[0].particles_per_frame, "40, 42");
        assert_eq!(rows[0].noise, "");
        assert_eq!(rows[1].noise, "Noise detected");
        assert_eq!(rows[2].replicate, None);
        assert_eq!(rows[2].dilution, "Not found");
    }

    #[test]
    fn test_overview_table_columns() {
        let rows = sample_overview(&extraction());
        let rendered = overview_table(&rows, true).to_string();
        assert!(rendered.contains("Replicate name"));
        assert!(rendered.contains("rep2"));
        let rendered = overview_table(&rows, false).to_string();
        assert!(!rendered.contains("Replicate name"));
    }
}
