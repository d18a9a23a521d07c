use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime};
use thiserror::Error;

pub const MATCH_DATE_COLUMN: &str = "date";
pub const GOALS_COLUMNS: [&str; 2] = ["number of goals team1", "number of goals team2"];
pub const ATTEMPTS_COLUMNS: [&str; 2] = ["total attempts team1", "total attempts team2"];
pub const ON_TARGET_COLUMNS: [&str; 2] = ["on target attempts team1", "on target attempts team2"];

pub const WEATHER_DATE_COLUMN: &str = "datetime";
pub const TEMP_COLUMN: &str = "temp";
pub const HUMIDITY_COLUMN: &str = "humidity";

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%d %b %Y", "%m/%d/%Y"];
const NULL_TOKENS: [&str; 7] = ["NA", "N/A", "n/a", "NaN", "nan", "null", "NULL"];

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("missing required column `{column}`")]
    MissingColumn { column: String },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// One match, already reduced to the average of both teams.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub date: Option<NaiveDateTime>,
    pub avg_goals: Option<f64>,
    pub avg_attempts: Option<f64>,
    pub avg_on_target: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherRecord {
    pub datetime: Option<NaiveDateTime>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    /// Null flags for the non-analysed columns, in `Table::extra_columns` order.
    pub extras_missing: Vec<bool>,
}

#[derive(Debug, Clone)]
pub struct Table<T> {
    pub rows: Vec<T>,
    pub columns: usize,
    /// Source columns carried only for the missingness summary.
    pub extra_columns: Vec<String>,
    pub duplicates_dropped: usize,
}

pub fn load_matches(path: &Path) -> Result<Table<MatchRecord>> {
    let file = File::open(path).with_context(|| format!("open match data {}", path.display()))?;
    read_matches(file).with_context(|| format!("read match data {}", path.display()))
}

pub fn load_weather(path: &Path) -> Result<Table<WeatherRecord>> {
    let file = File::open(path).with_context(|| format!("open weather data {}", path.display()))?;
    read_weather(file).with_context(|| format!("read weather data {}", path.display()))
}

pub fn read_matches<R: Read>(rdr: R) -> Result<Table<MatchRecord>, DatasetError> {
    let raw = read_deduplicated(rdr)?;
    let date = raw.column(MATCH_DATE_COLUMN)?;
    let goals = [raw.column(GOALS_COLUMNS[0])?, raw.column(GOALS_COLUMNS[1])?];
    let attempts = [raw.column(ATTEMPTS_COLUMNS[0])?, raw.column(ATTEMPTS_COLUMNS[1])?];
    let on_target = [
        raw.column(ON_TARGET_COLUMNS[0])?,
        raw.column(ON_TARGET_COLUMNS[1])?,
    ];

    let rows = raw
        .records
        .iter()
        .map(|record| MatchRecord {
            date: parse_datetime(cell(record, date)),
            avg_goals: team_average(record, goals),
            avg_attempts: team_average(record, attempts),
            avg_on_target: team_average(record, on_target),
        })
        .collect();

    Ok(Table {
        rows,
        columns: raw.headers.len(),
        extra_columns: Vec::new(),
        duplicates_dropped: raw.duplicates_dropped,
    })
}

pub fn read_weather<R: Read>(rdr: R) -> Result<Table<WeatherRecord>, DatasetError> {
    let raw = read_deduplicated(rdr)?;
    let datetime = raw.column(WEATHER_DATE_COLUMN)?;
    let temp = raw.column(TEMP_COLUMN)?;
    let humidity = raw.column(HUMIDITY_COLUMN)?;
    let extras = (0..raw.headers.len())
        .filter(|idx| ![datetime, temp, humidity].contains(idx))
        .collect::<Vec<_>>();

    let rows = raw
        .records
        .iter()
        .map(|record| WeatherRecord {
            datetime: parse_datetime(cell(record, datetime)),
            temp: parse_number(cell(record, temp)),
            humidity: parse_number(cell(record, humidity)),
            extras_missing: extras.iter().map(|&idx| is_null(cell(record, idx))).collect(),
        })
        .collect();

    Ok(Table {
        rows,
        columns: raw.headers.len(),
        extra_columns: extras.iter().map(|&idx| raw.headers[idx].trim().to_string()).collect(),
        duplicates_dropped: raw.duplicates_dropped,
    })
}

/// Parses a timestamp in any of the accepted layouts. Date-only values land on midnight so
/// they compare equal to a midnight timestamp from the other source.
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, fmt) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

pub fn parse_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

struct RawTable {
    headers: Vec<String>,
    records: Vec<Vec<String>>,
    duplicates_dropped: usize,
}

impl RawTable {
    fn column(&self, name: &str) -> Result<usize, DatasetError> {
        self.headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| DatasetError::MissingColumn {
                column: name.to_string(),
            })
    }
}

fn read_deduplicated<R: Read>(rdr: R) -> Result<RawTable, DatasetError> {
    let mut reader = csv::ReaderBuilder::new().flexible(false).from_reader(rdr);
    let headers = reader
        .headers()?
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let mut records = Vec::new();
    let mut duplicates_dropped = 0usize;
    for result in reader.records() {
        let record = result?;
        let row = record.iter().map(ToString::to_string).collect::<Vec<_>>();
        if seen.insert(row.clone()) {
            records.push(row);
        } else {
            duplicates_dropped += 1;
        }
    }

    Ok(RawTable {
        headers,
        records,
        duplicates_dropped,
    })
}

fn is_null(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NULL_TOKENS.contains(&trimmed)
}

fn cell(record: &[String], idx: usize) -> &str {
    record.get(idx).map(String::as_str).unwrap_or_default()
}

fn team_average(record: &[String], cols: [usize; 2]) -> Option<f64> {
    let values = cols
        .iter()
        .filter_map(|&idx| parse_number(cell(record, idx)))
        .collect::<Vec<_>>();
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
