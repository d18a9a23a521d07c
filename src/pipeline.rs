use std::fs;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::analysis_export;
use crate::artifacts;
use crate::combined::{
    self, CombinedRecord, GroupCutoffs, HumidityGroup, JoinCoverage, Metric, MissingCount,
    TempGroup,
};
use crate::config::PipelineConfig;
use crate::dataset::{self, MatchRecord, Table, WeatherRecord};
use crate::impute::ImputationStrategy;
use crate::stats::{self, Correlation, Describe, LinearFit, StatsError, TTest};

#[derive(Debug, Clone, Serialize)]
pub struct ImputationMeans {
    pub column: &'static str,
    pub original: Option<f64>,
    pub mean: Option<f64>,
    pub forward_fill: Option<f64>,
    pub linear: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupTest {
    pub metric: &'static str,
    pub comparison: &'static str,
    pub result: Option<TTest>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricCorrelation {
    pub metric: &'static str,
    pub factor: &'static str,
    pub result: Option<Correlation>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrendFit {
    pub x: &'static str,
    pub y: &'static str,
    pub fit: Option<LinearFit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnSummary {
    pub column: &'static str,
    pub describe: Option<Describe>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineReport {
    pub match_rows: usize,
    pub match_columns: usize,
    pub match_duplicates: usize,
    pub weather_rows: usize,
    pub weather_columns: usize,
    pub weather_duplicates: usize,
    pub join: JoinCoverage,
    pub missing_before: Vec<MissingCount>,
    pub imputation: Vec<ImputationMeans>,
    pub adopted_strategy: Option<ImputationStrategy>,
    pub rows_dropped: usize,
    pub missing_after: Vec<MissingCount>,
    pub cutoffs: Option<GroupCutoffs>,
    pub ttests: Vec<GroupTest>,
    pub correlations: Vec<MetricCorrelation>,
    pub summary: Vec<ColumnSummary>,
    pub trends: Vec<TrendFit>,
    pub outliers: usize,
    pub rows: usize,
}

/// The combined table plus everything learned about it so far. Stages run in order and mutate
/// the table in place.
#[derive(Debug, Clone)]
pub struct Pipeline {
    rows: Vec<CombinedRecord>,
    report: PipelineReport,
}

impl Pipeline {
    pub fn merge(matches: &Table<MatchRecord>, weather: &Table<WeatherRecord>) -> Self {
        info!(
            rows = matches.rows.len(),
            columns = matches.columns,
            duplicates = matches.duplicates_dropped,
            "match data loaded"
        );
        info!(
            rows = weather.rows.len(),
            columns = weather.columns,
            duplicates = weather.duplicates_dropped,
            "weather data loaded"
        );

        let (rows, join) = combined::left_join(&matches.rows, &weather.rows);
        if join.unmatched_rows > 0 {
            warn!(
                unmatched = join.unmatched_rows,
                of = join.match_rows,
                dates = %join.unmatched_dates.join(", "),
                "match dates without weather observations"
            );
        }

        let mut missing_before = combined::missing_counts(&rows);
        missing_before.extend(combined::missing_extra_counts(
            &matches.rows,
            &weather.rows,
            &weather.extra_columns,
        ));
        log_missing("before imputation", &missing_before, rows.len());

        let report = PipelineReport {
            match_rows: matches.rows.len(),
            match_columns: matches.columns,
            match_duplicates: matches.duplicates_dropped,
            weather_rows: weather.rows.len(),
            weather_columns: weather.columns,
            weather_duplicates: weather.duplicates_dropped,
            join,
            missing_before,
            rows: rows.len(),
            ..PipelineReport::default()
        };
        Self { rows, report }
    }

    /// Runs every stage without touching the filesystem.
    pub fn analyze(
        matches: &Table<MatchRecord>,
        weather: &Table<WeatherRecord>,
        strategy: ImputationStrategy,
    ) -> Self {
        let mut pipeline = Self::merge(matches, weather);
        pipeline.impute(strategy);
        pipeline.group_and_test();
        pipeline.correlate();
        pipeline.advanced_features();
        pipeline
    }

    pub fn rows(&self) -> &[CombinedRecord] {
        &self.rows
    }

    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    pub fn into_parts(self) -> (Vec<CombinedRecord>, PipelineReport) {
        (self.rows, self.report)
    }

    pub fn impute(&mut self, adopted: ImputationStrategy) {
        let temps = combined::temps(&self.rows);
        let humidities = combined::humidities(&self.rows);
        self.report.imputation = vec![
            imputation_means("temp", &temps),
            imputation_means("humidity", &humidities),
        ];
        for means in &self.report.imputation {
            info!(
                column = means.column,
                original = ?means.original,
                mean = ?means.mean,
                ffill = ?means.forward_fill,
                interp = ?means.linear,
                "column mean by imputation method"
            );
        }

        combined::impute_weather(&mut self.rows, adopted);
        let before = self.rows.len();
        self.rows = combined::drop_incomplete(std::mem::take(&mut self.rows));
        self.report.adopted_strategy = Some(adopted);
        self.report.rows_dropped = before - self.rows.len();
        self.report.rows = self.rows.len();
        info!(
            strategy = %adopted,
            dropped = self.report.rows_dropped,
            remaining = self.rows.len(),
            "imputation applied"
        );

        self.report.missing_after = combined::missing_counts(&self.rows);
        log_missing("after imputation", &self.report.missing_after, self.rows.len());
    }

    pub fn group_and_test(&mut self) {
        let cutoffs = combined::assign_groups(&mut self.rows);
        info!(
            temp_median = ?cutoffs.temp_median,
            humidity_median = ?cutoffs.humidity_median,
            "group cutoffs"
        );
        self.report.cutoffs = Some(cutoffs);

        let mut tests = Vec::new();
        for metric in Metric::ALL {
            let hot = self.group_values(metric, |r| r.temp_group == Some(TempGroup::Hot));
            let mild = self.group_values(metric, |r| r.temp_group == Some(TempGroup::Mild));
            tests.push(group_test(metric, "Hot vs Mild", stats::ttest_ind(&hot, &mild)));

            let humid =
                self.group_values(metric, |r| r.humidity_group == Some(HumidityGroup::Humid));
            let dry = self.group_values(metric, |r| r.humidity_group == Some(HumidityGroup::Dry));
            tests.push(group_test(metric, "Humid vs Dry", stats::ttest_ind(&humid, &dry)));
        }
        self.report.ttests = tests;
    }

    pub fn correlate(&mut self) {
        let temps = combined::temps(&self.rows);
        let humidities = combined::humidities(&self.rows);

        let mut correlations = Vec::new();
        for metric in Metric::ALL {
            let values = combined::metric_values(&self.rows, metric);
            for (factor, column) in [("temp", &temps), ("humidity", &humidities)] {
                let result = stats::pearson(column, &values);
                match &result {
                    Ok(c) => info!(
                        metric = metric.column(),
                        factor,
                        r = %format!("{:.3}", c.r),
                        p = %format!("{:.3}", c.p_value),
                        "correlation"
                    ),
                    Err(err) => {
                        warn!(metric = metric.column(), factor, %err, "correlation skipped")
                    }
                }
                correlations.push(MetricCorrelation {
                    metric: metric.column(),
                    factor,
                    error: result.as_ref().err().map(ToString::to_string),
                    result: result.ok(),
                });
            }
        }
        self.report.correlations = correlations;

        let mut summary = Metric::ALL
            .iter()
            .map(|&m| ColumnSummary {
                column: m.column(),
                describe: stats::describe(&flatten(&combined::metric_values(&self.rows, m))),
            })
            .collect::<Vec<_>>();
        summary.push(ColumnSummary {
            column: "temp",
            describe: stats::describe(&flatten(&temps)),
        });
        summary.push(ColumnSummary {
            column: "humidity",
            describe: stats::describe(&flatten(&humidities)),
        });
        for col in &summary {
            if let Some(d) = &col.describe {
                info!(
                    column = col.column,
                    count = d.count,
                    mean = d.mean,
                    std = d.std,
                    min = d.min,
                    median = d.q50,
                    max = d.max,
                    "summary"
                );
            }
        }
        self.report.summary = summary;

        self.report.trends.push(trend(
            "temp",
            &temps,
            Metric::Goals.column(),
            &combined::metric_values(&self.rows, Metric::Goals),
        ));
        self.report.trends.push(trend(
            "humidity",
            &humidities,
            Metric::OnTarget.column(),
            &combined::metric_values(&self.rows, Metric::OnTarget),
        ));
    }

    pub fn advanced_features(&mut self) {
        let outliers = combined::flag_outliers(&mut self.rows);
        info!(outliers, "outlier matches detected");
        self.report.outliers = outliers;

        combined::assign_climate_scores(&mut self.rows);
        let scores = self
            .rows
            .iter()
            .map(|r| r.climate_impact_score)
            .collect::<Vec<_>>();
        self.report.trends.push(trend(
            "climate_impact_score",
            &scores,
            Metric::OnTarget.column(),
            &combined::metric_values(&self.rows, Metric::OnTarget),
        ));
    }

    fn group_values(&self, metric: Metric, member: impl Fn(&CombinedRecord) -> bool) -> Vec<f64> {
        self.rows
            .iter()
            .filter(|&r| member(r))
            .filter_map(|r| metric.value(r))
            .collect()
    }
}

/// Loads both inputs, runs every stage and writes each artifact as soon as the stage that
/// produces it has finished.
pub fn run(config: &PipelineConfig) -> Result<PipelineReport> {
    let matches = dataset::load_matches(&config.matches_path)?;
    let weather = dataset::load_weather(&config.weather_path)?;

    fs::create_dir_all(&config.out_dir)
        .with_context(|| format!("create output dir {}", config.out_dir.display()))?;

    let mut pipeline = Pipeline::merge(&matches, &weather);
    let missingness_path = config.missingness_path();
    artifacts::write_missingness(&missingness_path, &pipeline.report.missing_before)?;
    info!(path = %missingness_path.display(), "missingness summary saved");

    pipeline.impute(config.imputation);
    pipeline.group_and_test();
    pipeline.correlate();

    let cleaned_path = config.cleaned_path();
    artifacts::write_cleaned(&cleaned_path, pipeline.rows())?;
    info!(path = %cleaned_path.display(), "cleaned dataset saved");

    pipeline.advanced_features();
    let advanced_path = config.advanced_path();
    artifacts::write_advanced(&advanced_path, pipeline.rows())?;
    info!(path = %advanced_path.display(), "enhanced dataset saved");

    let report_path = config.report_path();
    let json = serde_json::to_string_pretty(pipeline.report()).context("serialize report")?;
    fs::write(&report_path, json)
        .with_context(|| format!("write report {}", report_path.display()))?;
    info!(path = %report_path.display(), "analysis report saved");

    if let Some(xlsx_path) = &config.xlsx_path {
        let sheets =
            analysis_export::export_workbook(xlsx_path, pipeline.rows(), pipeline.report())?;
        info!(path = %xlsx_path.display(), sheets, "workbook exported");
    }

    let (_, report) = pipeline.into_parts();
    Ok(report)
}

fn imputation_means(column: &'static str, values: &[Option<f64>]) -> ImputationMeans {
    let mean_of =
        |strategy: ImputationStrategy| stats::mean(strategy.apply(values).into_iter().flatten());
    ImputationMeans {
        column,
        original: stats::mean(values.iter().flatten().copied()),
        mean: mean_of(ImputationStrategy::Mean),
        forward_fill: mean_of(ImputationStrategy::ForwardFill),
        linear: mean_of(ImputationStrategy::Linear),
    }
}

fn group_test(
    metric: Metric,
    comparison: &'static str,
    result: Result<TTest, StatsError>,
) -> GroupTest {
    match &result {
        Ok(t) => info!(
            metric = metric.column(),
            comparison,
            statistic = t.statistic,
            p_value = t.p_value,
            "t-test"
        ),
        Err(err) => warn!(metric = metric.column(), comparison, %err, "t-test not computed"),
    }
    GroupTest {
        metric: metric.column(),
        comparison,
        error: result.as_ref().err().map(ToString::to_string),
        result: result.ok(),
    }
}

fn trend(
    x_name: &'static str,
    x: &[Option<f64>],
    y_name: &'static str,
    y: &[Option<f64>],
) -> TrendFit {
    let fit = stats::linear_fit(&stats::complete_pairs(x, y)).ok();
    if let Some(fit) = &fit {
        info!(x = x_name, y = y_name, slope = fit.slope, intercept = fit.intercept, "trend");
    }
    TrendFit {
        x: x_name,
        y: y_name,
        fit,
    }
}

fn flatten(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().flatten().copied().collect()
}

fn log_missing(stage: &str, counts: &[MissingCount], rows: usize) {
    for c in counts.iter().filter(|c| c.missing_count > 0) {
        let pct = if rows == 0 {
            0.0
        } else {
            c.missing_count as f64 * 100.0 / rows as f64
        };
        info!(
            stage,
            column = %c.column,
            missing = c.missing_count,
            percent = %format!("{pct:.1}"),
            "missing values"
        );
    }
}
