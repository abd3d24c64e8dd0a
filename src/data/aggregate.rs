use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;

use super::filename::{classify_dilution, classify_replicate, replicate_suffix};
use super::listing::list_export_files;
use super::model::{
    Extraction, FileInfo, MetadataValue, SamplesFilenames, SizeDistributions, VideoLabel,
    WideTable,
};
use super::normalize::{normalize_file, NormalizedFile};
use super::reader::{read_export_file, NOISE_LEVEL, PARTICLES_PER_FRAME};
use super::replicates::reconcile_replicates;
use crate::config::ExtractionConfig;
use crate::error::{ExtractError, Result};

/// Metadata value a video reports when no noise was found.
pub const NO_NOISE: &str = "No";
/// Derived metadata column: list of per-video particles per frame.
pub const PARTICLES_PER_FRAME_COLUMN: &str = PARTICLES_PER_FRAME;
/// Derived metadata column: true unless every video reports [`NO_NOISE`].
pub const NOISE_DETECTED_COLUMN: &str = "Noise detected";

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Extract and aggregate every export file of `config.directory`.
///
/// Files are read and normalized in parallel; the join, the bin axis check
/// and the replicate averaging run afterwards in sorted filename order, so
/// the result does not depend on scheduling. Any error aborts the run.
pub fn extract(config: &ExtractionConfig) -> Result<Extraction> {
    let directory = config.directory.as_path();
    let files = list_export_files(directory, &config.export_suffix)?;
    info!("Extracting {} export files from {}", files.len(), directory.display());

    let entries: Vec<(&String, &PathBuf)> = files.iter().collect();
    let normalized = entries
        .par_iter()
        .map(|(filename, path)| process_file(filename, path, config))
        .collect::<Vec<Result<NormalizedFile>>>()
        .into_iter()
        .collect::<Result<Vec<_>>>()?;

    aggregate(directory, normalized)
}

/// Shorthand for [`extract`] with the default export suffix.
pub fn extract_directory(
    directory: impl Into<PathBuf>,
    dilution_prefix: Option<&str>,
    replicate_prefix: Option<&str>,
) -> Result<Extraction> {
    let config = ExtractionConfig {
        directory: directory.into(),
        dilution_prefix: dilution_prefix.map(str::to_string),
        replicate_prefix: replicate_prefix.map(str::to_string),
        ..Default::default()
    };
    extract(&config)
}

// ---------------------------------------------------------------------------
// Per-file step
// ---------------------------------------------------------------------------

/// Classify the filename of one export.
pub fn file_info(filename: &str, config: &ExtractionConfig) -> FileInfo {
    let (dilution_factor, dilution_found) = classify_dilution(filename, config.dilution_prefix());
    if config.dilution_prefix().is_some() && !dilution_found {
        warn!("{filename}: no dilution factor found, using 1");
    }
    let (sample_name, replicate_found) = classify_replicate(filename, config.replicate_prefix());
    FileInfo {
        filename: filename.to_string(),
        dilution_factor,
        dilution_found,
        sample_name,
        replicate_found,
    }
}

fn process_file(filename: &str, path: &Path, config: &ExtractionConfig) -> Result<NormalizedFile> {
    let info = file_info(filename, config);
    info!("Reading {} (dilution {})", path.display(), info.dilution_factor);
    let export = read_export_file(path)?;
    if export.distribution.videos.is_empty() {
        warn!("{filename}: no concentration column in size distribution");
    }
    Ok(normalize_file(info, export))
}

// ---------------------------------------------------------------------------
// Cross-file join
// ---------------------------------------------------------------------------

/// Join normalized files (already in sorted filename order) into one bundle.
pub fn aggregate(directory: &Path, files: Vec<NormalizedFile>) -> Result<Extraction> {
    check_bin_axes(directory, &files)?;

    let bin_centers = files.first().map(|f| f.bin_centers.clone()).unwrap_or_default();
    let mut size_distributions = SizeDistributions::new(bin_centers);
    let mut size_concentration_attributes: WideTable<f64> = WideTable::new();
    let mut metadata: WideTable<MetadataValue> = WideTable::new();
    let mut files_infos = Vec::with_capacity(files.len());
    let mut derived = Vec::with_capacity(files.len());

    for file in files {
        let filename = file.info.filename.clone();
        for column in file.distribution {
            size_distributions.push_column(column.name, column.values);
        }
        size_concentration_attributes.push_row(filename.as_str(), file.size_attributes);
        metadata.push_row(filename.as_str(), file.metadata);
        derived.push((filename, file.videos));
        files_infos.push(file.info);
    }

    // Derived columns go after every per-video column of every file.
    for (filename, videos) in derived {
        let particles: Vec<MetadataValue> = videos
            .labels()
            .map(|label| {
                metadata
                    .get(&filename, &format!("{PARTICLES_PER_FRAME} {label}"))
                    .cloned()
                    .unwrap_or(MetadataValue::Null)
            })
            .collect();
        let noise = noise_detected(&metadata, &filename, videos.labels());
        metadata.set(&filename, PARTICLES_PER_FRAME_COLUMN, Some(MetadataValue::List(particles)));
        metadata.set(&filename, NOISE_DETECTED_COLUMN, Some(MetadataValue::Bool(noise)));
    }

    let samples_filenames = samples_filenames(&files_infos);
    reconcile_replicates(
        &mut size_distributions,
        &mut size_concentration_attributes,
        &samples_filenames,
    );

    Ok(Extraction {
        directory: directory.to_path_buf(),
        files_infos,
        samples_filenames,
        size_distributions,
        size_concentration_attributes,
        metadata,
    })
}

/// True unless every video of the file reports [`NO_NOISE`]. A missing
/// cell counts as a deviation.
fn noise_detected(
    metadata: &WideTable<MetadataValue>,
    filename: &str,
    mut labels: impl Iterator<Item = VideoLabel>,
) -> bool {
    !labels.all(|label| {
        metadata
            .get(filename, &format!("{NOISE_LEVEL} {label}"))
            .and_then(MetadataValue::as_str)
            == Some(NO_NOISE)
    })
}

/// Every file must share the first file's bin-center axis exactly.
fn check_bin_axes(directory: &Path, files: &[NormalizedFile]) -> Result<()> {
    let Some((reference, rest)) = files.split_first() else {
        return Ok(());
    };
    for file in rest {
        if file.bin_centers != reference.bin_centers {
            return Err(ExtractError::InconsistentBinAxis {
                directory: directory.to_path_buf(),
                reference: reference.info.filename.clone(),
                offending: file.info.filename.clone(),
            });
        }
    }
    Ok(())
}

/// Group files by sample name; both keys and replicate suffixes are sorted.
/// A sample made of one file with no replicate suffix maps to an empty list.
pub fn samples_filenames(files_infos: &[FileInfo]) -> SamplesFilenames {
    let mut groups: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for info in files_infos {
        groups
            .entry(info.sample_name.clone())
            .or_default()
            .push(info.filename.as_str());
    }

    groups
        .into_iter()
        .map(|(sample, mut filenames)| {
            filenames.sort_unstable();
            let suffixes = if filenames == [sample.as_str()] {
                Vec::new()
            } else {
                filenames
                    .iter()
                    .map(|f| replicate_suffix(f, &sample).to_string())
                    .collect()
            };
            (sample, suffixes)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::{DistributionColumn, VideoCount};

    fn normalized(filename: &str, bin_centers: Vec<f64>) -> NormalizedFile {
        NormalizedFile {
            info: FileInfo {
                filename: filename.to_string(),
                dilution_factor: 1,
                dilution_found: false,
                sample_name: filename.to_string(),
                replicate_found: false,
            },
            videos: VideoCount::new(2),
            distribution: vec![DistributionColumn {
                name: format!("Average {filename}"),
                values: vec![1.0; bin_centers.len()],
            }],
            bin_centers,
            size_attributes: vec![("Mean size Average".to_string(), Some(100.0))],
            metadata: vec![
                (
                    "Noise level Video 1".to_string(),
                    Some(MetadataValue::String("No".into())),
                ),
                (
                    "Noise level Video 2".to_string(),
                    Some(MetadataValue::String("No".into())),
                ),
                (
                    "Particles per frame Video 1".to_string(),
                    Some(MetadataValue::Integer(30)),
                ),
                (
                    "Particles per frame Video 2".to_string(),
                    Some(MetadataValue::Integer(31)),
                ),
            ],
        }
    }

    fn info(filename: &str, sample_name: &str) -> FileInfo {
        FileInfo {
            filename: filename.to_string(),
            dilution_factor: 1,
            dilution_found: false,
            sample_name: sample_name.to_string(),
            replicate_found: filename != sample_name,
        }
    }

    #[test]
    fn test_identical_axes_accepted() {
        let files = vec![
            normalized("a", vec![0.5, 1.5]),
            normalized("b", vec![0.5, 1.5]),
        ];
        let result = aggregate(Path::new("dir"), files).unwrap();
        assert_eq!(result.size_distributions.bin_centers, vec![0.5, 1.5]);
        let names: Vec<&str> = result.size_distributions.column_names().collect();
        assert_eq!(names, vec!["Average a", "Average b"]);
    }

    #[test]
    fn test_differing_axis_rejected() {
        let files = vec![
            normalized("a", vec![0.5, 1.5]),
            normalized("b", vec![0.5, 1.6]),
        ];
        let err = aggregate(Path::new("dir"), files).unwrap_err();
        match err {
            ExtractError::InconsistentBinAxis {
                directory,
                offending,
                ..
            } => {
                assert_eq!(directory, PathBuf::from("dir"));
                assert_eq!(offending, "b");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_axis_length_mismatch_rejected() {
        let files = vec![normalized("a", vec![0.5, 1.5]), normalized("b", vec![0.5])];
        assert!(aggregate(Path::new("dir"), files).is_err());
    }

    #[test]
    fn test_derived_metadata_columns() {
        let mut noisy = normalized("b", vec![0.5]);
        noisy.metadata[1].1 = Some(MetadataValue::String("High".into()));
        let files = vec![normalized("a", vec![0.5]), noisy];
        let result = aggregate(Path::new("dir"), files).unwrap();

        let columns = &result.metadata.columns;
        assert_eq!(columns[columns.len() - 2], "Particles per frame");
        assert_eq!(columns[columns.len() - 1], "Noise detected");
        assert_eq!(
            result.metadata.get("a", "Noise detected"),
            Some(&MetadataValue::Bool(false))
        );
        assert_eq!(
            result.metadata.get("b", "Noise detected"),
            Some(&MetadataValue::Bool(true))
        );
        assert_eq!(
            result.metadata.get("a", "Particles per frame"),
            Some(&MetadataValue::List(vec![
                MetadataValue::Integer(30),
                MetadataValue::Integer(31)
            ]))
        );
    }

    #[test]
    fn test_samples_filenames_grouping() {
        let infos = vec![
            info("S1_dilution10_rep2", "S1_dilution10_"),
            info("S1_dilution10_rep1", "S1_dilution10_"),
            info("S2_dilution5", "S2_dilution5"),
        ];
        let samples = samples_filenames(&infos);
        let keys: Vec<&str> = samples.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["S1_dilution10_", "S2_dilution5"]);
        assert_eq!(samples["S1_dilution10_"], vec!["rep1", "rep2"]);
        assert!(samples["S2_dilution5"].is_empty());
    }
}
