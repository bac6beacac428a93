//! CSV persistence for frames and fit-result tables
//!
//! Frames export as one CSV row per image row. Beam-width measurements
//! round-trip through a headered table of `{width_h, width_v, label}` rows.
//! All writes go through a temp file in the destination directory followed by
//! a rename, so a failed write never leaves a truncated file at the target
//! path.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Errors that can occur during CSV import/export
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("failed to move temp file into place: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("destination path has no parent directory")]
    NoParentDir,
}

/// One row of the beam-width measurement table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WidthRecord {
    /// Horizontal beam width (2σ), axis units
    pub width_h: f64,
    /// Vertical beam width (2σ), axis units
    pub width_v: f64,
    /// Free-form annotation for the measurement
    pub label: String,
}

/// Finish a CSV writer backed by an in-memory buffer
fn into_bytes(writer: csv::Writer<Vec<u8>>) -> Result<Vec<u8>, PersistError> {
    writer
        .into_inner()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()).into())
}

/// Serialize then rename into place
fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), PersistError> {
    let dir = match path.parent() {
        // A bare filename has an empty parent; treat it as the current dir
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        Some(_) => Path::new("."),
        None => return Err(PersistError::NoParentDir),
    };
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.flush()?;
    tmp.persist(path)?;
    Ok(())
}

/// Export a frame as comma-separated values, one line per image row
pub fn write_frame_csv<P: AsRef<Path>>(
    path: P,
    frame: ArrayView2<f64>,
) -> Result<(), PersistError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    for row in frame.rows() {
        let record: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writer.write_record(&record)?;
    }

    let bytes = into_bytes(writer)?;
    atomic_write(path.as_ref(), &bytes)
}

/// Export beam-width records with a header row
pub fn write_width_table<P: AsRef<Path>>(
    path: P,
    records: &[WidthRecord],
) -> Result<(), PersistError> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = into_bytes(writer)?;
    atomic_write(path.as_ref(), &bytes)
}

/// Read beam-width records back, preserving file order
///
/// The caller decides where the rows land (the UI appends them below the
/// current selection); this function only parses.
pub fn read_width_table<P: AsRef<Path>>(path: P) -> Result<Vec<WidthRecord>, PersistError> {
    let file = File::open(path.as_ref())?;
    let mut reader = csv::Reader::from_reader(file);
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
