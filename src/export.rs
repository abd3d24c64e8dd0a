//! Writing an [`Extraction`] to disk: CSV tables (the historical layout),
//! Parquet tables, or one JSON document.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, BooleanArray, Float64Array, StringArray, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use crate::color::SampleColors;
use crate::data::aggregate::NOISE_DETECTED_COLUMN;
use crate::data::model::{Extraction, MetadataValue, SizeDistributions, WideTable};
use crate::data::overview::noise_label;

pub const FILES_INFOS: &str = "files_infos";
pub const SAMPLES_FILENAMES: &str = "samples_filenames";
pub const SIZE_DISTRIBUTIONS: &str = "size_distributions";
pub const SIZE_CONCENTRATION_ATTRIBUTES: &str = "size_concentration_attributes";
pub const METADATA: &str = "metadata";
pub const SAMPLE_COLORS: &str = "sample_colors";

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

/// Write the four tables as CSV plus the sample mapping and colours as JSON.
/// Returns the written paths.
pub fn export_csv(extraction: &Extraction, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating export directory {}", out_dir.display()))?;

    let mut written = vec![
        write_files_infos_csv(extraction, &out_dir.join(format!("{FILES_INFOS}.csv")))?,
        write_distributions_csv(
            &extraction.size_distributions,
            &out_dir.join(format!("{SIZE_DISTRIBUTIONS}.csv")),
        )?,
        write_wide_csv(
            &extraction.size_concentration_attributes,
            &out_dir.join(format!("{SIZE_CONCENTRATION_ATTRIBUTES}.csv")),
            |_, v: &f64| format_float(*v),
        )?,
        write_wide_csv(
            &extraction.metadata,
            &out_dir.join(format!("{METADATA}.csv")),
            format_metadata_cell,
        )?,
    ];
    written.extend(write_sidecars(extraction, out_dir)?);

    info!("Exported {} files to {}", written.len(), out_dir.display());
    Ok(written)
}

fn format_float(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else {
        v.to_string()
    }
}

fn format_metadata_cell(column: &str, value: &MetadataValue) -> String {
    match value {
        MetadataValue::Bool(flag) if column == NOISE_DETECTED_COLUMN => noise_label(*flag).to_string(),
        MetadataValue::Float(v) => format_float(*v),
        other => other.to_string(),
    }
}

fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))
}

fn write_files_infos_csv(extraction: &Extraction, path: &Path) -> Result<PathBuf> {
    let mut writer = csv_writer(path)?;
    writer.write_record(["", "Dilution factor", "Sample name"])?;
    for info in &extraction.files_infos {
        writer.write_record([
            info.filename.as_str(),
            &info.dilution_factor.to_string(),
            info.sample_name.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_distributions_csv(distributions: &SizeDistributions, path: &Path) -> Result<PathBuf> {
    let mut writer = csv_writer(path)?;
    let header = std::iter::once(SizeDistributions::BIN_CENTERS).chain(distributions.column_names());
    writer.write_record(header)?;

    for (i, bin) in distributions.bin_centers.iter().enumerate() {
        let record = std::iter::once(format_float(*bin))
            .chain(distributions.columns.iter().map(|c| format_float(c.values[i])));
        writer.write_record(record)?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_wide_csv<V, F>(table: &WideTable<V>, path: &Path, format_cell: F) -> Result<PathBuf>
where
    V: Clone,
    F: Fn(&str, &V) -> String,
{
    let mut writer = csv_writer(path)?;
    writer.write_record(std::iter::once("").chain(table.columns.iter().map(String::as_str)))?;

    for row in &table.rows {
        let cells = row.values.iter().zip(&table.columns).map(|(value, column)| {
            value
                .as_ref()
                .map(|v| format_cell(column.as_str(), v))
                .unwrap_or_default()
        });
        writer.write_record(std::iter::once(row.index.clone()).chain(cells))?;
    }
    writer.flush()?;
    Ok(path.to_path_buf())
}

fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<PathBuf> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// `samples_filenames.json` and `sample_colors.json`.
fn write_sidecars(extraction: &Extraction, out_dir: &Path) -> Result<Vec<PathBuf>> {
    let colors = SampleColors::new(extraction.sample_names());
    Ok(vec![
        write_json(
            &extraction.samples_filenames,
            &out_dir.join(format!("{SAMPLES_FILENAMES}.json")),
        )?,
        write_json(&colors, &out_dir.join(format!("{SAMPLE_COLORS}.json")))?,
    ])
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Write the whole bundle as one JSON document. Missing values are `null`.
pub fn export_json(extraction: &Extraction, path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating export directory {}", parent.display()))?;
    }
    write_json(extraction, path)
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

/// Write the four tables as Parquet files plus the JSON sidecars.
pub fn export_parquet(extraction: &Extraction, out_dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating export directory {}", out_dir.display()))?;

    let mut written = vec![
        write_parquet(
            &out_dir.join(format!("{FILES_INFOS}.parquet")),
            files_infos_batch(extraction)?,
        )?,
        write_parquet(
            &out_dir.join(format!("{SIZE_DISTRIBUTIONS}.parquet")),
            distributions_batch(&extraction.size_distributions)?,
        )?,
        write_parquet(
            &out_dir.join(format!("{SIZE_CONCENTRATION_ATTRIBUTES}.parquet")),
            attributes_batch(&extraction.size_concentration_attributes)?,
        )?,
        write_parquet(
            &out_dir.join(format!("{METADATA}.parquet")),
            metadata_batch(&extraction.metadata)?,
        )?,
    ];
    written.extend(write_sidecars(extraction, out_dir)?);

    info!("Exported {} files to {}", written.len(), out_dir.display());
    Ok(written)
}

/// Name of the row-label column in Parquet tables.
const INDEX_COLUMN: &str = "Filename";

fn batch(fields: Vec<Field>, columns: Vec<ArrayRef>) -> Result<RecordBatch> {
    let schema = Arc::new(Schema::new(fields));
    RecordBatch::try_new(schema, columns).context("building record batch")
}

fn files_infos_batch(extraction: &Extraction) -> Result<RecordBatch> {
    let infos = &extraction.files_infos;
    batch(
        vec![
            Field::new(INDEX_COLUMN, DataType::Utf8, false),
            Field::new("Dilution factor", DataType::UInt64, false),
            Field::new("Dilution found", DataType::Boolean, false),
            Field::new("Sample name", DataType::Utf8, false),
        ],
        vec![
            Arc::new(StringArray::from(
                infos.iter().map(|i| i.filename.clone()).collect::<Vec<_>>(),
            )) as ArrayRef,
            Arc::new(UInt64Array::from(
                infos.iter().map(|i| i.dilution_factor).collect::<Vec<_>>(),
            )) as ArrayRef,
            Arc::new(BooleanArray::from(
                infos.iter().map(|i| i.dilution_found).collect::<Vec<_>>(),
            )) as ArrayRef,
            Arc::new(StringArray::from(
                infos.iter().map(|i| i.sample_name.clone()).collect::<Vec<_>>(),
            )) as ArrayRef,
        ],
    )
}

fn distributions_batch(distributions: &SizeDistributions) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(SizeDistributions::BIN_CENTERS, DataType::Float64, false)];
    let mut columns: Vec<ArrayRef> =
        vec![Arc::new(Float64Array::from(distributions.bin_centers.clone())) as ArrayRef];
    for column in &distributions.columns {
        fields.push(Field::new(&column.name, DataType::Float64, true));
        columns.push(Arc::new(Float64Array::from(column.values.clone())));
    }
    batch(fields, columns)
}

fn index_array<V: Clone>(table: &WideTable<V>) -> ArrayRef {
    Arc::new(StringArray::from(
        table.index().map(str::to_string).collect::<Vec<_>>(),
    ))
}

fn attributes_batch(table: &WideTable<f64>) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::Utf8, false)];
    let mut columns = vec![index_array(table)];
    for (col, name) in table.columns.iter().enumerate() {
        fields.push(Field::new(name, DataType::Float64, true));
        let values: Vec<Option<f64>> = table.rows.iter().map(|r| r.values[col]).collect();
        columns.push(Arc::new(Float64Array::from(values)));
    }
    batch(fields, columns)
}

/// Metadata cells are heterogeneous; they are stored as text.
fn metadata_batch(table: &WideTable<MetadataValue>) -> Result<RecordBatch> {
    let mut fields = vec![Field::new(INDEX_COLUMN, DataType::Utf8, false)];
    let mut columns = vec![index_array(table)];
    for (col, name) in table.columns.iter().enumerate() {
        fields.push(Field::new(name, DataType::Utf8, true));
        let values: Vec<Option<String>> = table
            .rows
            .iter()
            .map(|r| match &r.values[col] {
                None | Some(MetadataValue::Null) => None,
                Some(value) => Some(format_metadata_cell(name, value)),
            })
            .collect();
        columns.push(Arc::new(StringArray::from(values)));
    }
    batch(fields, columns)
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<PathBuf> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("creating parquet writer for {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing {}", path.display()))?;
    Ok(path.to_path_buf())
}
