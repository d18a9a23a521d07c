use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::dataset::{MatchRecord, WeatherRecord};
use crate::impute::ImputationStrategy;
use crate::stats;

pub const HUMIDITY_WEIGHT: f64 = 0.6;
pub const TEMP_WEIGHT: f64 = 0.4;
pub const OUTLIER_Z: f64 = 3.0;

pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    Goals,
    Attempts,
    OnTarget,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Goals, Metric::Attempts, Metric::OnTarget];

    pub fn column(self) -> &'static str {
        match self {
            Metric::Goals => "avg_goals",
            Metric::Attempts => "avg_attempts",
            Metric::OnTarget => "avg_on_target",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Metric::Goals => "Avg Goals",
            Metric::Attempts => "Avg Attempts",
            Metric::OnTarget => "Avg On Target",
        }
    }

    pub fn value(self, row: &CombinedRecord) -> Option<f64> {
        match self {
            Metric::Goals => row.avg_goals,
            Metric::Attempts => row.avg_attempts,
            Metric::OnTarget => row.avg_on_target,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Metric::Goals => Metric::Attempts,
            Metric::Attempts => Metric::OnTarget,
            Metric::OnTarget => Metric::Goals,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TempGroup {
    Hot,
    Mild,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum HumidityGroup {
    Humid,
    Dry,
}

impl TempGroup {
    pub fn label(self) -> &'static str {
        match self {
            TempGroup::Hot => "Hot",
            TempGroup::Mild => "Mild",
        }
    }
}

impl HumidityGroup {
    pub fn label(self) -> &'static str {
        match self {
            HumidityGroup::Humid => "Humid",
            HumidityGroup::Dry => "Dry",
        }
    }
}

impl FromStr for TempGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Hot" => Ok(TempGroup::Hot),
            "Mild" => Ok(TempGroup::Mild),
            other => Err(format!("unknown temp group `{other}`")),
        }
    }
}

impl FromStr for HumidityGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Humid" => Ok(HumidityGroup::Humid),
            "Dry" => Ok(HumidityGroup::Dry),
            other => Err(format!("unknown humidity group `{other}`")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CombinedRecord {
    pub date: Option<NaiveDateTime>,
    pub avg_goals: Option<f64>,
    pub avg_attempts: Option<f64>,
    pub avg_on_target: Option<f64>,
    pub datetime: Option<NaiveDateTime>,
    pub temp: Option<f64>,
    pub humidity: Option<f64>,
    pub temp_group: Option<TempGroup>,
    pub humidity_group: Option<HumidityGroup>,
    pub is_outlier: bool,
    pub temp_norm: Option<f64>,
    pub humidity_norm: Option<f64>,
    pub climate_impact_score: Option<f64>,
}

impl CombinedRecord {
    pub fn has_all_metrics(&self) -> bool {
        Metric::ALL.iter().all(|m| m.value(self).is_some())
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct JoinCoverage {
    pub match_rows: usize,
    pub matched_rows: usize,
    pub unmatched_rows: usize,
    pub unmatched_dates: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingCount {
    pub column: String,
    pub missing_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GroupCutoffs {
    pub temp_median: Option<f64>,
    pub humidity_median: Option<f64>,
}

/// Left-joins weather onto matches by exact timestamp, then orders the result by date with
/// undated rows last. A match whose date has several weather rows appears once per row.
pub fn left_join(
    matches: &[MatchRecord],
    weather: &[WeatherRecord],
) -> (Vec<CombinedRecord>, JoinCoverage) {
    let by_time = index_by_time(weather);
    let mut coverage = JoinCoverage {
        match_rows: matches.len(),
        ..JoinCoverage::default()
    };
    let mut rows = Vec::with_capacity(matches.len());
    for m in matches {
        let base = CombinedRecord {
            date: m.date,
            avg_goals: m.avg_goals,
            avg_attempts: m.avg_attempts,
            avg_on_target: m.avg_on_target,
            ..CombinedRecord::default()
        };
        let hits = m.date.and_then(|d| by_time.get(&d));
        match hits {
            Some(hits) => {
                coverage.matched_rows += 1;
                for w in hits {
                    rows.push(CombinedRecord {
                        datetime: w.datetime,
                        temp: w.temp,
                        humidity: w.humidity,
                        ..base.clone()
                    });
                }
            }
            None => {
                coverage.unmatched_rows += 1;
                coverage.unmatched_dates.push(
                    m.date
                        .map(|d| d.format(DATE_FORMAT).to_string())
                        .unwrap_or_else(|| "<invalid date>".to_string()),
                );
                rows.push(base);
            }
        }
    }

    rows.sort_by(|a, b| match (a.date, b.date) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    (rows, coverage)
}

pub fn missing_counts(rows: &[CombinedRecord]) -> Vec<MissingCount> {
    let columns: [(&str, fn(&CombinedRecord) -> bool); 7] = [
        ("date", |r| r.date.is_none()),
        ("avg_goals", |r| r.avg_goals.is_none()),
        ("avg_attempts", |r| r.avg_attempts.is_none()),
        ("avg_on_target", |r| r.avg_on_target.is_none()),
        ("datetime", |r| r.datetime.is_none()),
        ("temp", |r| r.temp.is_none()),
        ("humidity", |r| r.humidity.is_none()),
    ];
    columns
        .iter()
        .map(|(column, is_missing)| MissingCount {
            column: column.to_string(),
            missing_count: rows.iter().filter(|&r| is_missing(r)).count(),
        })
        .collect()
}

/// Null counts for the weather columns that are joined but never analysed. An unmatched match
/// row counts as missing in every one of them.
pub fn missing_extra_counts(
    matches: &[MatchRecord],
    weather: &[WeatherRecord],
    extra_columns: &[String],
) -> Vec<MissingCount> {
    let by_time = index_by_time(weather);
    let mut counts = vec![0usize; extra_columns.len()];
    for m in matches {
        match m.date.and_then(|d| by_time.get(&d)) {
            Some(hits) => {
                for w in hits {
                    for (count, &missing) in counts.iter_mut().zip(&w.extras_missing) {
                        *count += usize::from(missing);
                    }
                }
            }
            None => counts.iter_mut().for_each(|count| *count += 1),
        }
    }
    extra_columns
        .iter()
        .zip(counts)
        .map(|(column, missing_count)| MissingCount {
            column: column.clone(),
            missing_count,
        })
        .collect()
}

fn index_by_time(weather: &[WeatherRecord]) -> HashMap<NaiveDateTime, Vec<&WeatherRecord>> {
    let mut by_time: HashMap<NaiveDateTime, Vec<&WeatherRecord>> = HashMap::new();
    for w in weather {
        if let Some(ts) = w.datetime {
            by_time.entry(ts).or_default().push(w);
        }
    }
    by_time
}

pub fn temps(rows: &[CombinedRecord]) -> Vec<Option<f64>> {
    rows.iter().map(|r| r.temp).collect()
}

pub fn humidities(rows: &[CombinedRecord]) -> Vec<Option<f64>> {
    rows.iter().map(|r| r.humidity).collect()
}

pub fn metric_values(rows: &[CombinedRecord], metric: Metric) -> Vec<Option<f64>> {
    rows.iter().map(|r| metric.value(r)).collect()
}

pub fn impute_weather(rows: &mut [CombinedRecord], strategy: ImputationStrategy) {
    let temp = strategy.apply(&temps(rows));
    let humidity = strategy.apply(&humidities(rows));
    for ((row, t), h) in rows.iter_mut().zip(temp).zip(humidity) {
        row.temp = t;
        row.humidity = h;
    }
}

pub fn drop_incomplete(rows: Vec<CombinedRecord>) -> Vec<CombinedRecord> {
    rows.into_iter().filter(|r| r.has_all_metrics()).collect()
}

/// Labels rows against the column medians; values equal to the median go to Hot / Humid.
/// A row whose value is still null keeps no label for that column.
pub fn assign_groups(rows: &mut [CombinedRecord]) -> GroupCutoffs {
    let temp_values = temps(rows).into_iter().flatten().collect::<Vec<_>>();
    let humidity_values = humidities(rows).into_iter().flatten().collect::<Vec<_>>();
    let cutoffs = GroupCutoffs {
        temp_median: stats::median(&temp_values),
        humidity_median: stats::median(&humidity_values),
    };

    for row in rows.iter_mut() {
        row.temp_group = match (row.temp, cutoffs.temp_median) {
            (Some(t), Some(cut)) if t >= cut => Some(TempGroup::Hot),
            (Some(_), Some(_)) => Some(TempGroup::Mild),
            _ => None,
        };
        row.humidity_group = match (row.humidity, cutoffs.humidity_median) {
            (Some(h), Some(cut)) if h >= cut => Some(HumidityGroup::Humid),
            (Some(_), Some(_)) => Some(HumidityGroup::Dry),
            _ => None,
        };
    }
    cutoffs
}

/// Flags rows where any metric's |z| strictly exceeds the threshold. Returns the flagged count.
pub fn flag_outliers(rows: &mut [CombinedRecord]) -> usize {
    let z_by_metric = Metric::ALL
        .iter()
        .map(|&m| stats::z_scores(&metric_values(rows, m)))
        .collect::<Vec<_>>();

    let mut flagged = 0usize;
    for (idx, row) in rows.iter_mut().enumerate() {
        row.is_outlier = z_by_metric
            .iter()
            .any(|z| z[idx].is_some_and(|z| z.abs() > OUTLIER_Z));
        if row.is_outlier {
            flagged += 1;
        }
    }
    flagged
}

pub fn assign_climate_scores(rows: &mut [CombinedRecord]) {
    let temp_norm = stats::min_max_normalize(&temps(rows));
    let humidity_norm = stats::min_max_normalize(&humidities(rows));
    for ((row, t), h) in rows.iter_mut().zip(temp_norm).zip(humidity_norm) {
        row.temp_norm = t;
        row.humidity_norm = h;
        row.climate_impact_score = match (t, h) {
            (Some(t), Some(h)) => Some(HUMIDITY_WEIGHT * h + TEMP_WEIGHT * t),
            _ => None,
        };
    }
}
