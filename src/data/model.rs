use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

// ---------------------------------------------------------------------------
// MetadataValue – a single cell of the metadata block
// ---------------------------------------------------------------------------

/// A dynamically-typed metadata value as written by the instrument.
///
/// Particle counts are numeric, the noise level is text (`"No"` when clean),
/// and the two derived per-file columns are a list and a flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetadataValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    List(Vec<MetadataValue>),
    Null,
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::String(s) => write!(f, "{s}"),
            MetadataValue::Integer(i) => write!(f, "{i}"),
            MetadataValue::Float(v) => write!(f, "{v}"),
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::List(values) => {
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                Ok(())
            }
            MetadataValue::Null => Ok(()),
        }
    }
}

impl MetadataValue {
    /// Interpret a raw text cell: integer, then float, then text.
    pub fn parse(s: &str) -> MetadataValue {
        let s = s.trim();
        if s.is_empty() {
            return MetadataValue::Null;
        }
        if let Ok(i) = s.parse::<i64>() {
            return MetadataValue::Integer(i);
        }
        if let Ok(f) = s.parse::<f64>() {
            return MetadataValue::Float(f);
        }
        MetadataValue::String(s.to_string())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Float(v) => Some(*v),
            MetadataValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// VideoCount / VideoLabel – per-video column addressing
// ---------------------------------------------------------------------------

/// Number of videos recorded in one export file.
///
/// Discovered from the concentration columns of the size-distribution table
/// and passed to the summary/metadata parsers, which carry one result column
/// per video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VideoCount {
    pub n_videos: usize,
}

impl VideoCount {
    pub fn new(n_videos: usize) -> Self {
        Self { n_videos }
    }

    /// `Video 1` … `Video N`.
    pub fn labels(&self) -> impl Iterator<Item = VideoLabel> {
        (1..=self.n_videos).map(VideoLabel::Video)
    }
}

/// Second half of a pivoted column name: `{attribute} {label}`.
///
/// Ordering follows declaration: every video first, then `Average`, `Std`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VideoLabel {
    Video(usize),
    Average,
    Std,
}

impl fmt::Display for VideoLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoLabel::Video(k) => write!(f, "Video {k}"),
            VideoLabel::Average => write!(f, "Average"),
            VideoLabel::Std => write!(f, "Std"),
        }
    }
}

// ---------------------------------------------------------------------------
// LongTable – (key × video) block as read from one export
// ---------------------------------------------------------------------------

/// One `key, video 1, …, video N` row of a results block.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongRow<V> {
    pub key: String,
    /// One entry per video; `None` for an empty cell.
    pub values: Vec<Option<V>>,
}

/// Rows of a results block in encounter order, keyed by a free-form name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LongTable<V> {
    pub videos: VideoCount,
    pub rows: Vec<LongRow<V>>,
}

impl<V> LongTable<V> {
    pub fn new(videos: VideoCount) -> Self {
        Self {
            videos,
            rows: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&LongRow<V>> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// WideTable – one row per file (or sample), named columns
// ---------------------------------------------------------------------------

/// A row of a [`WideTable`]: the index label and one optional cell per column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideRow<V> {
    pub index: String,
    pub values: Vec<Option<V>>,
}

/// Row-indexed table whose column set is the union, in order of first
/// appearance, of the columns of every inserted row. Cells a row did not
/// provide stay `None`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WideTable<V> {
    pub columns: Vec<String>,
    pub rows: Vec<WideRow<V>>,
}

impl<V> Default for WideTable<V> {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
        }
    }
}

impl<V: Clone> WideTable<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column_position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(pos) = self.column_position(name) {
            return pos;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.values.push(None);
        }
        self.columns.len() - 1
    }

    fn row_position(&self, index: &str) -> Option<usize> {
        self.rows.iter().position(|r| r.index == index)
    }

    /// Insert a row, replacing any existing row with the same index.
    pub fn push_row<I>(&mut self, index: impl Into<String>, cells: I)
    where
        I: IntoIterator<Item = (String, Option<V>)>,
    {
        let index = index.into();
        let positioned: Vec<(usize, Option<V>)> = cells
            .into_iter()
            .map(|(name, value)| (self.ensure_column(&name), value))
            .collect();

        let mut values = vec![None; self.columns.len()];
        for (pos, value) in positioned {
            values[pos] = value;
        }

        match self.row_position(&index) {
            Some(existing) => self.rows[existing].values = values,
            None => self.rows.push(WideRow { index, values }),
        }
    }

    /// Set one cell, adding the column (and an empty row) when needed.
    pub fn set(&mut self, index: &str, column: &str, value: Option<V>) {
        let col = self.ensure_column(column);
        let row = match self.row_position(index) {
            Some(r) => r,
            None => {
                self.rows.push(WideRow {
                    index: index.to_string(),
                    values: vec![None; self.columns.len()],
                });
                self.rows.len() - 1
            }
        };
        self.rows[row].values[col] = value;
    }

    pub fn row(&self, index: &str) -> Option<&WideRow<V>> {
        self.rows.iter().find(|r| r.index == index)
    }

    pub fn get(&self, index: &str, column: &str) -> Option<&V> {
        let col = self.column_position(column)?;
        self.row(index)?.values[col].as_ref()
    }

    pub fn index(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|r| r.index.as_str())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ---------------------------------------------------------------------------
// SizeDistributions – concentration curves on a shared bin-center axis
// ---------------------------------------------------------------------------

/// A named concentration series aligned with [`SizeDistributions::bin_centers`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Corpus-wide size distributions indexed by bin center (nm).
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SizeDistributions {
    pub bin_centers: Vec<f64>,
    pub columns: Vec<DistributionColumn>,
}

impl SizeDistributions {
    /// Name of the bin-center column in exported tables.
    pub const BIN_CENTERS: &'static str = "Bin centers";

    pub fn new(bin_centers: Vec<f64>) -> Self {
        Self {
            bin_centers,
            columns: Vec::new(),
        }
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.values.as_slice())
    }

    /// Append a column, replacing one of the same name.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<f64>) {
        let name = name.into();
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.values = values,
            None => self.columns.push(DistributionColumn { name, values }),
        }
    }

    pub fn column_names(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    /// Number of bins.
    pub fn len(&self) -> usize {
        self.bin_centers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bin_centers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// FileInfo / Extraction – the result bundle
// ---------------------------------------------------------------------------

/// What was inferred from one export's filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub filename: String,
    /// Defaults to 1 when no factor could be read.
    pub dilution_factor: u64,
    pub dilution_found: bool,
    /// Equals `filename` when no replicate group was detected.
    pub sample_name: String,
    pub replicate_found: bool,
}

/// Sample name → sorted replicate suffixes. Empty when the sample is a single
/// file with no replicate suffix.
pub type SamplesFilenames = BTreeMap<String, Vec<String>>;

/// Everything extracted from one directory.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    pub directory: PathBuf,
    pub files_infos: Vec<FileInfo>,
    pub samples_filenames: SamplesFilenames,
    pub size_distributions: SizeDistributions,
    pub size_concentration_attributes: WideTable<f64>,
    pub metadata: WideTable<MetadataValue>,
}

impl Extraction {
    pub fn file_info(&self, filename: &str) -> Option<&FileInfo> {
        self.files_infos.iter().find(|f| f.filename == filename)
    }

    /// Sample names in sorted order.
    pub fn sample_names(&self) -> Vec<&str> {
        self.samples_filenames.keys().map(String::as_str).collect()
    }

    /// Whether at least one sample groups two or more replicate files.
    pub fn any_replicates(&self) -> bool {
        self.samples_filenames.values().any(|r| r.len() > 1)
    }

    /// Full filenames of the files making up `sample`.
    pub fn replicate_filenames(&self, sample: &str) -> Vec<String> {
        match self.samples_filenames.get(sample) {
            Some(suffixes) if suffixes.is_empty() => vec![sample.to_string()],
            Some(suffixes) => suffixes.iter().map(|s| format!("{sample}{s}")).collect(),
            None => Vec::new(),
        }
    }
}
