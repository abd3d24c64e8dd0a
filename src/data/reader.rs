use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::{debug, warn};

use super::model::{LongRow, LongTable, MetadataValue, VideoCount};
use crate::error::{ExtractError, Result};

// ---------------------------------------------------------------------------
// Sentinels and allow-lists of the export layout
// ---------------------------------------------------------------------------

/// Marks the start of the results block (substring of any field).
pub const RESULTS_SENTINEL: &str = "[Results]";
/// Marks the start of the size summary inside the results block.
pub const SIZE_DATA_SENTINEL: &str = "[Size Data]";
/// Closes the size summary; also precedes the size-distribution table.
pub const GRAPH_DATA_SENTINEL: &str = "Graph Data";
/// Row label ending the size-distribution table.
pub const PERCENTILE_MARKER: &str = "Percentile";

pub const BIN_CENTRE_HEADER: &str = "Bin centre (nm)";
pub const CONCENTRATION_HEADER: &str = "Concentration (particles / ml)";
const LEGACY_HEADERS: [&str; 2] = ["Concentration average", "Standard Error"];

/// Size summary keys kept from the `[Size Data]` block.
pub const SIZE_KEYS: [&str; 5] = ["Mean", "Mode", "SD", "D50", "D90"];
/// Appended to every retained size summary key.
pub const SIZE_KEY_SUFFIX: &str = " size";

pub const PARTICLES_PER_FRAME: &str = "Particles per frame";
pub const NOISE_LEVEL: &str = "Noise level";
/// Metadata keys kept from the results block.
pub const METADATA_KEYS: [&str; 2] = [PARTICLES_PER_FRAME, NOISE_LEVEL];

// ---------------------------------------------------------------------------
// Parsed export
// ---------------------------------------------------------------------------

/// Size-distribution table of one export, before any scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDistribution {
    pub bin_centers: Vec<f64>,
    /// `videos[k]` is the `Concentration Video {k+1}` column.
    pub videos: Vec<Vec<f64>>,
}

impl RawDistribution {
    pub fn video_count(&self) -> VideoCount {
        VideoCount::new(self.videos.len())
    }
}

/// The three tables read from one export file.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub distribution: RawDistribution,
    /// `Mean size`, `Mode size`, … per video.
    pub size_attributes: LongTable<f64>,
    /// `Particles per frame`, `Noise level` per video.
    pub metadata: LongTable<MetadataValue>,
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Read one instrument export (ISO-8859-1 text) into its three tables.
pub fn read_export_file(path: &Path) -> Result<ExportFile> {
    let bytes = std::fs::read(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => ExtractError::FileNotFound(path.to_path_buf()),
        _ => ExtractError::io(path, e),
    })?;
    parse_export(&decode_latin1(&bytes), path)
}

/// Parse export text. `path` is only used in error messages.
pub fn parse_export(text: &str, path: &Path) -> Result<ExportFile> {
    let records = read_records(text)?;
    let scan = scan_sections(&records, path)?;

    let distribution = parse_distribution(&scan, path)?;
    let videos = distribution.video_count();
    debug!(
        "{}: {} bins, {} videos",
        path.display(),
        distribution.bin_centers.len(),
        videos.n_videos
    );

    let size_attributes = parse_size_attributes(&scan.size_data, videos, path);
    let metadata = parse_metadata(&scan.results, videos);

    Ok(ExportFile {
        distribution,
        size_attributes,
        metadata,
    })
}

/// Every byte of ISO-8859-1 is the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

fn read_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(text.as_bytes());

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(record.iter().map(|f| f.to_string()).collect());
    }
    Ok(records)
}

// ---------------------------------------------------------------------------
// Section scanning
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    BeforeResults,
    Results,
    SizeData,
    /// Inside the size-distribution table; `header_read` is false on the
    /// row right after the sentinel.
    GraphData { header_read: bool },
    Done,
}

/// Rows of one export split by section.
#[derive(Debug, Default)]
struct SectionScan<'a> {
    /// Every row after `[Results]` outside the distribution table.
    results: Vec<&'a [String]>,
    /// Rows between `[Size Data]` and the closing `Graph Data`.
    size_data: Vec<&'a [String]>,
    distribution_header: Option<&'a [String]>,
    distribution_rows: Vec<&'a [String]>,
}

fn first_field(record: &[String]) -> &str {
    record.first().map(String::as_str).unwrap_or("")
}

/// `Graph Data` row directly followed by the distribution header.
fn starts_distribution(records: &[Vec<String>], i: usize) -> bool {
    first_field(&records[i]) == GRAPH_DATA_SENTINEL
        && records
            .get(i + 1)
            .is_some_and(|next| next.iter().any(|f| f == BIN_CENTRE_HEADER))
}

fn scan_sections<'a>(records: &'a [Vec<String>], path: &Path) -> Result<SectionScan<'a>> {
    let mut scan = SectionScan::default();
    let mut section = Section::BeforeResults;
    let mut size_data_seen = false;
    let mut size_data_closed = false;
    let mut bin_column = 0;

    for (i, record) in records.iter().enumerate() {
        let key = first_field(record);
        section = match section {
            Section::BeforeResults => {
                if record.iter().any(|f| f.contains(RESULTS_SENTINEL)) {
                    debug!("{}: results block at row {i}", path.display());
                    Section::Results
                } else {
                    Section::BeforeResults
                }
            }
            Section::Results => {
                if key == SIZE_DATA_SENTINEL && !size_data_seen {
                    size_data_seen = true;
                    Section::SizeData
                } else if starts_distribution(records, i) {
                    Section::GraphData { header_read: false }
                } else {
                    scan.results.push(record);
                    Section::Results
                }
            }
            Section::SizeData => {
                if key == GRAPH_DATA_SENTINEL {
                    size_data_closed = true;
                    if starts_distribution(records, i) {
                        Section::GraphData { header_read: false }
                    } else {
                        Section::Results
                    }
                } else {
                    scan.size_data.push(record);
                    scan.results.push(record);
                    Section::SizeData
                }
            }
            Section::GraphData { header_read: false } => {
                debug!("{}: size distribution header at row {i}", path.display());
                bin_column = record
                    .iter()
                    .position(|f| f == BIN_CENTRE_HEADER)
                    .unwrap_or(0);
                scan.distribution_header = Some(record);
                Section::GraphData { header_read: true }
            }
            Section::GraphData { header_read: true } => {
                if ends_distribution(record, bin_column) {
                    scan.results.push(record);
                    Section::Done
                } else {
                    scan.distribution_rows.push(record);
                    Section::GraphData { header_read: true }
                }
            }
            Section::Done => {
                scan.results.push(record);
                Section::Done
            }
        };
    }

    if section == Section::BeforeResults {
        return Err(ExtractError::malformed(
            path,
            format!("missing '{RESULTS_SENTINEL}' section"),
        ));
    }
    if !size_data_seen {
        return Err(ExtractError::malformed(
            path,
            format!("missing '{SIZE_DATA_SENTINEL}' section"),
        ));
    }
    if !size_data_closed {
        return Err(ExtractError::malformed(
            path,
            format!("'{SIZE_DATA_SENTINEL}' section is not closed by '{GRAPH_DATA_SENTINEL}'"),
        ));
    }
    if scan.distribution_header.is_none() {
        return Err(ExtractError::malformed(
            path,
            format!("missing '{GRAPH_DATA_SENTINEL}' size distribution table"),
        ));
    }
    Ok(scan)
}

/// The table stops at a row whose bin centre is empty, the percentile
/// marker, or anything but a finite number (`NaN` and `inf` included).
fn ends_distribution(record: &[String], bin_column: usize) -> bool {
    let bin = record.get(bin_column).map(String::as_str).unwrap_or("");
    bin.is_empty()
        || bin == PERCENTILE_MARKER
        || !bin.parse::<f64>().is_ok_and(f64::is_finite)
}

// ---------------------------------------------------------------------------
// Size distribution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    BinCentre,
    Concentration,
    Legacy,
    Placeholder,
    Other,
}

fn classify_header(header: &str) -> ColumnKind {
    if header == BIN_CENTRE_HEADER {
        ColumnKind::BinCentre
    } else if header.contains(CONCENTRATION_HEADER) {
        ColumnKind::Concentration
    } else if LEGACY_HEADERS.contains(&header) {
        ColumnKind::Legacy
    } else if header.is_empty() {
        ColumnKind::Placeholder
    } else {
        ColumnKind::Other
    }
}

fn parse_distribution(scan: &SectionScan<'_>, path: &Path) -> Result<RawDistribution> {
    let header = scan.distribution_header.unwrap_or(&[]);

    let mut bin_column = None;
    let mut video_columns = Vec::new();
    for (col, name) in header.iter().enumerate() {
        match classify_header(name) {
            ColumnKind::BinCentre if bin_column.is_none() => bin_column = Some(col),
            ColumnKind::Concentration => video_columns.push(col),
            ColumnKind::Legacy => debug!("{}: dropping legacy column '{name}'", path.display()),
            ColumnKind::Placeholder => {}
            _ => debug!("{}: ignoring column '{name}'", path.display()),
        }
    }
    let bin_column = bin_column.ok_or_else(|| {
        ExtractError::malformed(path, format!("no '{BIN_CENTRE_HEADER}' column"))
    })?;

    let mut bin_centers = Vec::with_capacity(scan.distribution_rows.len());
    let mut videos = vec![Vec::with_capacity(scan.distribution_rows.len()); video_columns.len()];

    for (row_no, record) in scan.distribution_rows.iter().enumerate() {
        bin_centers.push(parse_float(record, bin_column, header, row_no, path)?);
        for (k, &col) in video_columns.iter().enumerate() {
            videos[k].push(parse_float(record, col, header, row_no, path)?);
        }
    }

    Ok(RawDistribution {
        bin_centers,
        videos,
    })
}

/// Empty cells read as NaN; any other non-number is fatal.
fn parse_float(
    record: &[String],
    col: usize,
    header: &[String],
    row_no: usize,
    path: &Path,
) -> Result<f64> {
    let cell = record.get(col).map(String::as_str).unwrap_or("");
    if cell.is_empty() {
        return Ok(f64::NAN);
    }
    cell.parse::<f64>().map_err(|_| {
        ExtractError::malformed(
            path,
            format!(
                "size distribution row {row_no}, column '{}': '{cell}' is not a number",
                header.get(col).map(String::as_str).unwrap_or("")
            ),
        )
    })
}

// ---------------------------------------------------------------------------
// Results block: size summary and metadata
// ---------------------------------------------------------------------------

/// Cells 1..=n_videos of a results row; missing trailing cells are empty.
fn video_cells(record: &[String], videos: VideoCount) -> impl Iterator<Item = &str> {
    (1..=videos.n_videos).map(move |c| record.get(c).map(String::as_str).unwrap_or(""))
}

/// Unparseable summary cells read as missing; only the distribution table
/// must be fully numeric.
fn parse_size_attributes(rows: &[&[String]], videos: VideoCount, path: &Path) -> LongTable<f64> {
    let mut table = LongTable::new(videos);
    for record in rows {
        let key = first_field(record);
        if !SIZE_KEYS.contains(&key) {
            continue;
        }
        let name = format!("{key}{SIZE_KEY_SUFFIX}");
        if table.get(&name).is_some() {
            debug!("{}: duplicate '{key}' row dropped", path.display());
            continue;
        }

        let values = video_cells(record, videos)
            .map(|cell| {
                if cell.is_empty() {
                    return None;
                }
                match cell.parse::<f64>() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!("{}: '{key}' value '{cell}' is not a number, left empty", path.display());
                        None
                    }
                }
            })
            .collect();
        table.rows.push(LongRow { key: name, values });
    }
    table
}

/// First occurrence of each metadata key wins; later duplicates are dropped.
fn parse_metadata(rows: &[&[String]], videos: VideoCount) -> LongTable<MetadataValue> {
    let mut table = LongTable::new(videos);
    for record in rows {
        let key = first_field(record);
        if !METADATA_KEYS.contains(&key) || table.get(key).is_some() {
            continue;
        }
        let values = video_cells(record, videos)
            .map(|cell| match MetadataValue::parse(cell) {
                MetadataValue::Null => None,
                value => Some(value),
            })
            .collect();
        table.rows.push(LongRow {
            key: key.to_string(),
            values,
        });
    }
    table
}
