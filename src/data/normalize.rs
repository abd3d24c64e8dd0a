//! Per-file normalization: dilution scaling, total concentration, per-video
//! statistics, and the long-to-wide pivot of the results blocks.

use std::collections::BTreeMap;

use super::model::{DistributionColumn, FileInfo, LongTable, MetadataValue, VideoCount, VideoLabel};
use super::reader::ExportFile;

/// Key of the synthetic first row of the size/concentration summary.
pub const TOTAL_CONCENTRATION: &str = "Total concentration";

/// One export after normalization, ready to be joined with the others.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFile {
    pub info: FileInfo,
    pub videos: VideoCount,
    pub bin_centers: Vec<f64>,
    /// `Concentration Video {k} {file}`, `Average {file}`, `Std {file}`.
    pub distribution: Vec<DistributionColumn>,
    /// `{attribute} {Video k|Average|Std}` cells of the summary row.
    pub size_attributes: Vec<(String, Option<f64>)>,
    /// `{key} Video {k}` cells of the metadata row.
    pub metadata: Vec<(String, Option<MetadataValue>)>,
}

pub fn normalize_file(info: FileInfo, export: ExportFile) -> NormalizedFile {
    let videos = export.distribution.video_count();
    let factor = info.dilution_factor as f64;
    let bin_centers = export.distribution.bin_centers;

    // particles/mL at the undiluted concentration
    let scaled: Vec<Vec<f64>> = export
        .distribution
        .videos
        .into_iter()
        .map(|video| video.into_iter().map(|c| c * factor).collect())
        .collect();

    let mut summary = Pivot::default();
    let totals = summary.attribute(TOTAL_CONCENTRATION);
    for (k, video) in scaled.iter().enumerate() {
        summary.insert(totals, VideoLabel::Video(k + 1), present(trapezoid(&bin_centers, video)));
    }
    summary.add_long_table(&export.size_attributes);
    summary.add_statistics(videos);

    let mut metadata = Pivot::default();
    metadata.add_long_table(&export.metadata);

    let distribution = distribution_columns(&info.filename, &bin_centers, scaled);

    NormalizedFile {
        videos,
        bin_centers,
        distribution,
        size_attributes: summary.into_row(),
        metadata: metadata.into_row(),
        info,
    }
}

fn distribution_columns(
    filename: &str,
    bin_centers: &[f64],
    videos: Vec<Vec<f64>>,
) -> Vec<DistributionColumn> {
    let (average, std): (Vec<f64>, Vec<f64>) = (0..bin_centers.len())
        .map(|i| mean_and_std(videos.iter().map(|v| v[i])))
        .unzip();

    let mut columns: Vec<DistributionColumn> = videos
        .into_iter()
        .enumerate()
        .map(|(k, values)| DistributionColumn {
            name: format!("Concentration Video {} {filename}", k + 1),
            values,
        })
        .collect();
    columns.push(DistributionColumn {
        name: format!("Average {filename}"),
        values: average,
    });
    columns.push(DistributionColumn {
        name: format!("Std {filename}"),
        values: std,
    });
    columns
}

// ---------------------------------------------------------------------------
// Pivot: (attribute, video label) -> value
// ---------------------------------------------------------------------------

/// Explicit long-to-wide pivot. Attributes keep their insertion order; labels
/// within an attribute sort as `Video 1..N`, `Average`, `Std`.
#[derive(Debug, Clone)]
struct Pivot<V> {
    attributes: Vec<String>,
    cells: BTreeMap<(usize, VideoLabel), Option<V>>,
}

impl<V> Default for Pivot<V> {
    fn default() -> Self {
        Self {
            attributes: Vec::new(),
            cells: BTreeMap::new(),
        }
    }
}

impl<V> Pivot<V> {
    fn attribute(&mut self, name: &str) -> usize {
        match self.attributes.iter().position(|a| a == name) {
            Some(pos) => pos,
            None => {
                self.attributes.push(name.to_string());
                self.attributes.len() - 1
            }
        }
    }

    fn insert(&mut self, attribute: usize, label: VideoLabel, value: Option<V>) {
        self.cells.insert((attribute, label), value);
    }

    fn add_long_table(&mut self, table: &LongTable<V>)
    where
        V: Clone,
    {
        for row in &table.rows {
            let attribute = self.attribute(&row.key);
            for (label, value) in table.videos.labels().zip(&row.values) {
                self.insert(attribute, label, value.clone());
            }
        }
    }

    fn into_row(self) -> Vec<(String, Option<V>)> {
        let attributes = self.attributes;
        self.cells
            .into_iter()
            .map(|((attribute, label), value)| (format!("{} {label}", attributes[attribute]), value))
            .collect()
    }
}

impl Pivot<f64> {
    /// Add `Average` and `Std` over the video cells of every attribute.
    fn add_statistics(&mut self, videos: VideoCount) {
        for attribute in 0..self.attributes.len() {
            let values: Vec<f64> = videos
                .labels()
                .filter_map(|label| self.cells.get(&(attribute, label)).copied().flatten())
                .collect();
            let (mean, std) = mean_and_std(values);
            self.insert(attribute, VideoLabel::Average, present(mean));
            self.insert(attribute, VideoLabel::Std, present(std));
        }
    }
}

// ---------------------------------------------------------------------------
// Numerics
// ---------------------------------------------------------------------------

/// NaN marks a missing cell in wide tables as `None`.
fn present(value: f64) -> Option<f64> {
    (!value.is_nan()).then_some(value)
}

/// Integral of `y` over `x` by the trapezoidal rule. Fewer than two points
/// integrate to zero.
pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum()
}

/// Arithmetic mean and population standard deviation, skipping NaN.
/// Both are NaN when no value remains.
pub fn mean_and_std(values: impl IntoIterator<Item = f64>) -> (f64, f64) {
    let values: Vec<f64> = values.into_iter().filter(|v| !v.is_nan()).collect();
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
