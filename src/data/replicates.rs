//! Replicate reconciliation: per-sample averages over replicate files.

use log::{debug, warn};

use super::model::{SamplesFilenames, SizeDistributions, WideTable};
use super::normalize::mean_and_std;

/// Column-name fragments whose values are meaningless once averaged over
/// replicates (per-video values, standard deviations).
const NOT_AVERAGEABLE: [&str; 2] = ["Video", "Std"];

/// Append replicate-averaged data for every sample with two or more files.
///
/// * `size_distributions` gains `Average {sample}` (mean of each replicate's
///   `Average {file}` column) and `Std {sample}`.
/// * `attributes` gains a row indexed by the sample name holding the mean of
///   the replicate rows, with per-video and `Std` columns left empty.
///
/// Single-file samples are left untouched. Nothing already in the tables is
/// replaced: a sample whose name is also a filename is skipped with a warning.
pub fn reconcile_replicates(
    size_distributions: &mut SizeDistributions,
    attributes: &mut WideTable<f64>,
    samples: &SamplesFilenames,
) {
    for (sample, suffixes) in samples {
        if suffixes.len() < 2 {
            continue;
        }
        if attributes.row(sample).is_some()
            || size_distributions.column(&format!("Average {sample}")).is_some()
            || size_distributions.column(&format!("Std {sample}")).is_some()
        {
            warn!("Sample name '{sample}' is also a filename, replicate averages not added");
            continue;
        }
        let filenames: Vec<String> = suffixes.iter().map(|s| format!("{sample}{s}")).collect();
        debug!("Averaging {} replicates of '{sample}'", filenames.len());

        average_distributions(size_distributions, sample, &filenames);
        average_attributes(attributes, sample, &filenames);
    }
}

fn average_distributions(distributions: &mut SizeDistributions, sample: &str, filenames: &[String]) {
    let mut replicates = Vec::with_capacity(filenames.len());
    for filename in filenames {
        match distributions.column(&format!("Average {filename}")) {
            Some(values) => replicates.push(values.to_vec()),
            None => {
                warn!("No size distribution for replicate '{filename}', skipping sample '{sample}'");
                return;
            }
        }
    }

    let average: Vec<f64> = (0..distributions.len())
        .map(|i| mean_and_std(replicates.iter().map(|r| r[i])).0)
        .collect();

    // Historical output: this column holds the replicate mean again, not a
    // deviation. Likely a bug upstream; kept so exported tables stay
    // comparable with earlier runs.
    distributions.push_column(format!("Average {sample}"), average.clone());
    distributions.push_column(format!("Std {sample}"), average);
}

fn average_attributes(attributes: &mut WideTable<f64>, sample: &str, filenames: &[String]) {
    let rows: Vec<&[Option<f64>]> = filenames
        .iter()
        .filter_map(|f| attributes.row(f).map(|r| r.values.as_slice()))
        .collect();
    if rows.len() != filenames.len() {
        warn!("Missing summary row for a replicate of '{sample}'");
    }

    let cells: Vec<(String, Option<f64>)> = attributes
        .columns
        .iter()
        .enumerate()
        .map(|(col, name)| {
            if NOT_AVERAGEABLE.iter().any(|frag| name.contains(frag)) {
                return (name.clone(), None);
            }
            let (mean, _) = mean_and_std(rows.iter().filter_map(|r| r[col]));
            (name.clone(), (!mean.is_nan()).then_some(mean))
        })
        .collect();

    attributes.push_row(sample, cells);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn fixture() -> (SizeDistributions, WideTable<f64>) {
        let mut distributions = SizeDistributions::new(vec![1.0, 2.0]);
        distributions.push_column("Average S1_rep1", vec![10.0, 20.0]);
        distributions.push_column("Average S1_rep2", vec![30.0, 40.0]);
        distributions.push_column("Average S2", vec![5.0, 5.0]);

        let mut attributes = WideTable::new();
        for (file, mean, video) in [("S1_rep1", 100.0, 99.0), ("S1_rep2", 120.0, 121.0), ("S2", 7.0, 7.0)] {
            attributes.push_row(
                file,
                vec![
                    ("Mean size Video 1".to_string(), Some(video)),
                    ("Mean size Average".to_string(), Some(mean)),
                    ("Mean size Std".to_string(), Some(1.0)),
                ],
            );
        }
        (distributions, attributes)
    }

    fn samples() -> SamplesFilenames {
        let mut samples = BTreeMap::new();
        samples.insert("S1_".to_string(), vec!["rep1".to_string(), "rep2".to_string()]);
        samples.insert("S2".to_string(), Vec::new());
        samples
    }

    #[test]
    fn test_replicate_distribution_average() {
        let (mut distributions, mut attributes) = fixture();
        reconcile_replicates(&mut distributions, &mut attributes, &samples());

        assert_eq!(distributions.column("Average S1_"), Some(&[20.0, 30.0][..]));
        // same values as the average, see average_distributions
        assert_eq!(distributions.column("Std S1_"), Some(&[20.0, 30.0][..]));
        assert!(distributions.column("Average S2_").is_none());
        assert_eq!(distributions.columns.len(), 5);
    }

    #[test]
    fn test_replicate_attribute_row() {
        let (mut distributions, mut attributes) = fixture();
        reconcile_replicates(&mut distributions, &mut attributes, &samples());

        assert_eq!(attributes.len(), 4);
        assert_eq!(attributes.get("S1_", "Mean size Average"), Some(&110.0));
        assert_eq!(attributes.get("S1_", "Mean size Video 1"), None);
        assert_eq!(attributes.get("S1_", "Mean size Std"), None);
        // replicate rows untouched
        assert_eq!(attributes.get("S1_rep1", "Mean size Std"), Some(&1.0));
    }

    #[test]
    fn test_sample_named_like_a_file_is_skipped() {
        let mut distributions = SizeDistributions::new(vec![1.0, 2.0]);
        distributions.push_column("Average S1", vec![10.0, 20.0]);
        distributions.push_column("Average S1_rep1", vec![30.0, 40.0]);
        let mut attributes = WideTable::new();
        attributes.push_row("S1", vec![("Mean size Video 1".to_string(), Some(99.0))]);
        attributes.push_row("S1_rep1", vec![("Mean size Video 1".to_string(), Some(121.0))]);
        let before = (distributions.clone(), attributes.clone());

        let mut samples = BTreeMap::new();
        samples.insert("S1".to_string(), vec![String::new(), "_rep1".to_string()]);
        reconcile_replicates(&mut distributions, &mut attributes, &samples);

        assert_eq!((distributions, attributes), before);
    }

    #[test]
    fn test_single_file_sample_untouched() {
        let (mut distributions, mut attributes) = fixture();
        let before = (distributions.clone(), attributes.clone());
        let mut only_single = BTreeMap::new();
        only_single.insert("S2".to_string(), Vec::new());
        only_single.insert("S3_".to_string(), vec!["rep1".to_string()]);

        reconcile_replicates(&mut distributions, &mut attributes, &only_single);
        assert_eq!((distributions, attributes), before);
    }
}
