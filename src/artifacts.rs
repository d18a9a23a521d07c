use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::combined::{CombinedRecord, DATE_FORMAT, MissingCount};

const MISSINGNESS_HEADER: &[&str] = &["column", "missing_count"];
const CLEANED_HEADER: &[&str] = &[
    "date",
    "avg_goals",
    "avg_attempts",
    "avg_on_target",
    "datetime",
    "temp",
    "humidity",
    "temp_group",
    "humidity_group",
];
const ADVANCED_EXTRA_HEADER: &[&str] = &[
    "is_outlier",
    "temp_norm",
    "humidity_norm",
    "climate_impact_score",
];

static DATASET: OnceCell<Vec<CombinedRecord>> = OnceCell::new();
static MISSINGNESS: OnceCell<Option<Vec<MissingCount>>> = OnceCell::new();

#[derive(Debug, Serialize)]
struct CleanedRow {
    date: Option<String>,
    avg_goals: Option<f64>,
    avg_attempts: Option<f64>,
    avg_on_target: Option<f64>,
    datetime: Option<String>,
    temp: Option<f64>,
    humidity: Option<f64>,
    temp_group: Option<&'static str>,
    humidity_group: Option<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AdvancedRow {
    date: Option<String>,
    avg_goals: Option<f64>,
    avg_attempts: Option<f64>,
    avg_on_target: Option<f64>,
    datetime: Option<String>,
    temp: Option<f64>,
    humidity: Option<f64>,
    temp_group: Option<String>,
    humidity_group: Option<String>,
    is_outlier: bool,
    temp_norm: Option<f64>,
    humidity_norm: Option<f64>,
    climate_impact_score: Option<f64>,
}

impl From<&CombinedRecord> for CleanedRow {
    fn from(r: &CombinedRecord) -> Self {
        Self {
            date: format_datetime(r.date),
            avg_goals: r.avg_goals,
            avg_attempts: r.avg_attempts,
            avg_on_target: r.avg_on_target,
            datetime: format_datetime(r.datetime),
            temp: r.temp,
            humidity: r.humidity,
            temp_group: r.temp_group.map(|g| g.label()),
            humidity_group: r.humidity_group.map(|g| g.label()),
        }
    }
}

impl From<&CombinedRecord> for AdvancedRow {
    fn from(r: &CombinedRecord) -> Self {
        Self {
            date: format_datetime(r.date),
            avg_goals: r.avg_goals,
            avg_attempts: r.avg_attempts,
            avg_on_target: r.avg_on_target,
            datetime: format_datetime(r.datetime),
            temp: r.temp,
            humidity: r.humidity,
            temp_group: r.temp_group.map(|g| g.label().to_string()),
            humidity_group: r.humidity_group.map(|g| g.label().to_string()),
            is_outlier: r.is_outlier,
            temp_norm: r.temp_norm,
            humidity_norm: r.humidity_norm,
            climate_impact_score: r.climate_impact_score,
        }
    }
}

impl AdvancedRow {
    fn into_record(self) -> CombinedRecord {
        CombinedRecord {
            date: self.date.as_deref().and_then(parse_datetime),
            avg_goals: self.avg_goals,
            avg_attempts: self.avg_attempts,
            avg_on_target: self.avg_on_target,
            datetime: self.datetime.as_deref().and_then(parse_datetime),
            temp: self.temp,
            humidity: self.humidity,
            temp_group: self.temp_group.as_deref().and_then(|g| g.parse().ok()),
            humidity_group: self.humidity_group.as_deref().and_then(|g| g.parse().ok()),
            is_outlier: self.is_outlier,
            temp_norm: self.temp_norm,
            humidity_norm: self.humidity_norm,
            climate_impact_score: self.climate_impact_score,
        }
    }
}

pub fn write_missingness(path: &Path, counts: &[MissingCount]) -> Result<()> {
    write_rows(path, MISSINGNESS_HEADER.iter().copied(), counts.iter())
}

/// Writes the grouped table without the outlier and climate-score columns.
pub fn write_cleaned(path: &Path, rows: &[CombinedRecord]) -> Result<()> {
    write_rows(path, CLEANED_HEADER.iter().copied(), rows.iter().map(CleanedRow::from))
}

pub fn write_advanced(path: &Path, rows: &[CombinedRecord]) -> Result<()> {
    write_rows(path, advanced_header(), rows.iter().map(AdvancedRow::from))
}

pub fn write_advanced_to<W: Write>(writer: W, rows: &[CombinedRecord]) -> Result<()> {
    let mut csv = headed_writer(writer, advanced_header())?;
    for row in rows {
        csv.serialize(AdvancedRow::from(row))?;
    }
    csv.flush()?;
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<Vec<CombinedRecord>> {
    let file = File::open(path).with_context(|| format!("open dataset {}", path.display()))?;
    read_dataset(file).with_context(|| format!("read dataset {}", path.display()))
}

pub fn read_dataset<R: Read>(rdr: R) -> Result<Vec<CombinedRecord>> {
    let mut reader = csv::Reader::from_reader(rdr);
    let mut rows = Vec::new();
    for result in reader.deserialize::<AdvancedRow>() {
        rows.push(result?.into_record());
    }
    Ok(rows)
}

/// Absence of the summary is expected when preprocessing has not been run; any other failure
/// is an error.
pub fn load_missingness(path: &Path) -> Result<Option<Vec<MissingCount>>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err).with_context(|| format!("open missingness {}", path.display()));
        }
    };
    let mut reader = csv::Reader::from_reader(file);
    let rows = reader
        .deserialize::<MissingCount>()
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("read missingness {}", path.display()))?;
    Ok(Some(rows))
}

/// Loads the advanced dataset once per process; later calls return the same rows.
pub fn cached_dataset(path: &Path) -> Result<&'static [CombinedRecord]> {
    DATASET
        .get_or_try_init(|| load_dataset(path))
        .map(Vec::as_slice)
}

pub fn cached_missingness(path: &Path) -> Result<Option<&'static [MissingCount]>> {
    MISSINGNESS
        .get_or_try_init(|| load_missingness(path))
        .map(|rows| rows.as_deref())
}

fn advanced_header() -> impl Iterator<Item = &'static str> {
    CLEANED_HEADER.iter().chain(ADVANCED_EXTRA_HEADER).copied()
}

/// The header goes out before any row so a table with no rows still names its columns.
fn headed_writer<W: Write>(
    writer: W,
    header: impl Iterator<Item = &'static str>,
) -> csv::Result<csv::Writer<W>> {
    let mut csv = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(writer);
    csv.write_record(header)?;
    Ok(csv)
}

fn write_rows<T: Serialize>(
    path: &Path,
    header: impl Iterator<Item = &'static str>,
    rows: impl Iterator<Item = T>,
) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    let mut csv = headed_writer(file, header)
        .with_context(|| format!("write header to {}", path.display()))?;
    for row in rows {
        csv.serialize(row)
            .with_context(|| format!("write row to {}", path.display()))?;
    }
    csv.flush()
        .with_context(|| format!("flush {}", path.display()))?;
    Ok(())
}

fn format_datetime(dt: Option<NaiveDateTime>) -> Option<String> {
    dt.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}
