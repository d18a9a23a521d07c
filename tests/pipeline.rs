use std::fs;
use std::path::PathBuf;

use wc22_weather::artifacts;
use wc22_weather::combined::{self, CombinedRecord, HumidityGroup, TempGroup};
use wc22_weather::config::{DashboardConfig, PipelineConfig};
use wc22_weather::dataset::{self, MatchRecord, Table, WeatherRecord};
use wc22_weather::impute::ImputationStrategy;
use wc22_weather::pipeline::{self, Pipeline};
use wc22_weather::stats;

fn fixture_path(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("wc22_{name}_{}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

fn config_in(dir: PathBuf) -> PipelineConfig {
    PipelineConfig {
        matches_path: fixture_path("matches.csv"),
        weather_path: fixture_path("weather.csv"),
        out_dir: dir,
        ..PipelineConfig::default()
    }
}

fn fixture_tables() -> (Table<MatchRecord>, Table<WeatherRecord>) {
    let matches = dataset::load_matches(&fixture_path("matches.csv")).expect("matches fixture");
    let weather = dataset::load_weather(&fixture_path("weather.csv")).expect("weather fixture");
    (matches, weather)
}

fn assert_close(actual: Option<f64>, expected: f64) {
    let actual = actual.expect("value should be present");
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[test]
fn run_writes_every_artifact() {
    let dir = scratch_dir("run_all");
    let mut config = config_in(dir.clone());
    config.xlsx_path = Some(dir.join("analysis.xlsx"));

    let report = pipeline::run(&config).expect("pipeline should run");

    assert!(config.missingness_path().exists());
    assert!(config.cleaned_path().exists());
    assert!(config.advanced_path().exists());
    assert!(config.report_path().exists());
    assert!(dir.join("analysis.xlsx").exists());

    assert_eq!(report.match_duplicates, 1);
    assert_eq!(report.weather_duplicates, 1);
    assert_eq!(report.join.match_rows, 9);
    assert_eq!(report.join.matched_rows, 7);
    assert_eq!(report.join.unmatched_rows, 2);
    assert_eq!(report.rows_dropped, 1);
    assert_eq!(report.rows, 8);
    assert_eq!(report.outliers, 0);
    assert_eq!(report.ttests.len(), 6);
    assert_eq!(report.correlations.len(), 6);
    assert_eq!(report.trends.len(), 3);
    for test in &report.ttests {
        let result = test.result.expect("both groups have spread");
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    let json = fs::read_to_string(config.report_path()).expect("report readable");
    let parsed: serde_json::Value = serde_json::from_str(&json).expect("report is json");
    assert_eq!(parsed["adopted_strategy"], "linear");
    assert_eq!(parsed["join"]["unmatched_rows"], 2);
}

#[test]
fn missingness_is_counted_before_imputation() {
    let dir = scratch_dir("missingness");
    let config = config_in(dir);
    pipeline::run(&config).expect("pipeline should run");

    let counts = artifacts::load_missingness(&config.missingness_path())
        .expect("summary readable")
        .expect("summary written");
    let lookup = |column: &str| {
        counts
            .iter()
            .find(|c| c.column == column)
            .map(|c| c.missing_count)
    };
    assert_eq!(lookup("date"), Some(0));
    assert_eq!(lookup("avg_goals"), Some(1));
    assert_eq!(lookup("datetime"), Some(2));
    assert_eq!(lookup("temp"), Some(3));
    assert_eq!(lookup("humidity"), Some(4));
    // Joined weather columns outside the analysis are counted too.
    assert_eq!(lookup("name"), Some(2));
    assert_eq!(lookup("tempmax"), Some(3));
    assert_eq!(lookup("tempmin"), Some(3));
}

#[test]
fn dashboard_reads_what_the_pipeline_wrote() {
    let dir = scratch_dir("dashboard_inputs");
    pipeline::run(&config_in(dir.clone())).expect("pipeline should run");

    let dashboard = DashboardConfig::in_dir(&dir);
    let rows = artifacts::load_dataset(&dashboard.data_path).expect("advanced csv");
    assert_eq!(rows.len(), 8);
    assert!(rows.iter().all(|r| r.temp_group.is_some() && r.humidity_group.is_some()));
    assert!(rows.iter().all(|r| !r.is_outlier));
    let missingness = artifacts::load_missingness(&dashboard.missingness_path)
        .expect("summary readable");
    assert_eq!(missingness.map(|m| m.len()), Some(10));
}

#[test]
fn repeated_runs_write_identical_files() {
    let first = config_in(scratch_dir("determinism_a"));
    let second = config_in(scratch_dir("determinism_b"));
    pipeline::run(&first).expect("first run");
    pipeline::run(&second).expect("second run");

    for (a, b) in [
        (first.missingness_path(), second.missingness_path()),
        (first.cleaned_path(), second.cleaned_path()),
        (first.advanced_path(), second.advanced_path()),
    ] {
        let a = fs::read(&a).expect("first artifact");
        let b = fs::read(&b).expect("second artifact");
        assert_eq!(a, b);
    }
}

#[test]
fn output_columns_and_date_layout() {
    let config = config_in(scratch_dir("layout"));
    pipeline::run(&config).expect("pipeline should run");

    let cleaned = fs::read_to_string(config.cleaned_path()).expect("cleaned csv");
    let mut lines = cleaned.lines();
    assert_eq!(
        lines.next(),
        Some("date,avg_goals,avg_attempts,avg_on_target,datetime,temp,humidity,temp_group,humidity_group")
    );
    assert!(
        lines
            .next()
            .is_some_and(|l| l.starts_with("2022-11-20 00:00:00,"))
    );

    let advanced = fs::read_to_string(config.advanced_path()).expect("advanced csv");
    assert!(advanced.lines().next().is_some_and(|h| h.ends_with(
        "humidity_group,is_outlier,temp_norm,humidity_norm,climate_impact_score"
    )));
}

#[test]
fn linear_imputation_fills_weather_gaps_in_time_order() {
    let (matches, weather) = fixture_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::Linear);
    let rows = pipeline.rows();
    assert_eq!(rows.len(), 8);

    // 21 Nov has no humidity; neighbours are 55 (20 Nov) and 60 (22 Nov).
    assert_close(rows[1].humidity, 55.0 + 5.0 / 3.0);
    assert_close(rows[2].humidity, 55.0 + 10.0 / 3.0);
    // 23 Nov temperature sits between 28.5 and 25.
    assert_close(rows[5].temp, 26.75);
    // 25 Nov has no weather row at all and trails the last observation.
    assert_eq!(rows[7].datetime, None);
    assert_close(rows[7].temp, 25.0);
    assert_close(rows[7].humidity, 70.0);
    assert!(rows.iter().all(|r| r.temp.is_some() && r.humidity.is_some()));
}

#[test]
fn forward_fill_repeats_previous_observation() {
    let (matches, weather) = fixture_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::ForwardFill);
    let rows = pipeline.rows();
    assert_close(rows[1].humidity, 55.0);
    assert_close(rows[5].temp, 28.5);
    assert_eq!(
        pipeline.report().adopted_strategy,
        Some(ImputationStrategy::ForwardFill)
    );
}

#[test]
fn groups_split_at_the_median() {
    let (matches, weather) = fixture_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::Linear);
    let cutoffs = pipeline.report().cutoffs.expect("cutoffs recorded");
    assert_close(cutoffs.temp_median, 26.375);

    for row in pipeline.rows() {
        let temp = row.temp.expect("imputed");
        let expected = if temp >= 26.375 {
            TempGroup::Hot
        } else {
            TempGroup::Mild
        };
        assert_eq!(row.temp_group, Some(expected));
    }
    assert_eq!(pipeline.rows()[6].humidity_group, Some(HumidityGroup::Humid));
    assert_eq!(pipeline.rows()[0].humidity_group, Some(HumidityGroup::Dry));
}

#[test]
fn median_ties_go_hot() {
    let mut rows = [60.0, 70.0, 80.0, 90.0]
        .into_iter()
        .map(|t| CombinedRecord {
            temp: Some(t),
            humidity: Some(50.0),
            ..CombinedRecord::default()
        })
        .collect::<Vec<_>>();
    let cutoffs = combined::assign_groups(&mut rows);
    assert_eq!(cutoffs.temp_median, Some(75.0));
    let groups = rows.iter().map(|r| r.temp_group).collect::<Vec<_>>();
    assert_eq!(
        groups,
        vec![
            Some(TempGroup::Mild),
            Some(TempGroup::Mild),
            Some(TempGroup::Hot),
            Some(TempGroup::Hot),
        ]
    );
    // Every humidity equals the median, so all of them land on the humid side.
    assert!(
        rows.iter()
            .all(|r| r.humidity_group == Some(HumidityGroup::Humid))
    );
}

#[test]
fn climate_scores_stay_in_unit_range() {
    let (matches, weather) = fixture_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::Linear);
    let rows = pipeline.rows();
    for row in rows {
        let score = row.climate_impact_score.expect("complete weather");
        assert!((0.0..=1.0).contains(&score), "score {score} out of range");
    }

    let hottest = rows
        .iter()
        .find(|r| r.temp == Some(28.5))
        .expect("hottest row");
    assert_close(hottest.temp_norm, 1.0);
    let coolest = rows.iter().find(|r| r.temp == Some(25.0)).expect("coolest row");
    assert_close(coolest.temp_norm, 0.0);
    assert_close(coolest.humidity_norm, 1.0);
}

#[test]
fn normalising_spreads_evenly() {
    let values = [Some(20.0), Some(40.0), Some(60.0), Some(80.0)];
    let norm = stats::min_max_normalize(&values);
    let expected = [0.0, 1.0 / 3.0, 2.0 / 3.0, 1.0];
    for (actual, expected) in norm.iter().zip(expected) {
        assert!((actual.expect("normalised") - expected).abs() < 1e-3);
    }
}

#[test]
fn constant_metric_never_flags_outliers() {
    let mut rows = (0..10)
        .map(|i| CombinedRecord {
            avg_goals: Some(1.0),
            avg_attempts: Some(10.0),
            avg_on_target: Some(f64::from(i)),
            ..CombinedRecord::default()
        })
        .collect::<Vec<_>>();
    assert_eq!(combined::flag_outliers(&mut rows), 0);
    assert!(rows.iter().all(|r| !r.is_outlier));
}

#[test]
fn missing_input_is_fatal() {
    let mut config = config_in(scratch_dir("missing_input"));
    config.weather_path = fixture_path("no_such_weather.csv");
    let err = pipeline::run(&config).expect_err("absent weather file should fail");
    assert!(format!("{err:#}").contains("no_such_weather.csv"));
}

#[test]
fn tables_without_rows_still_carry_headers() {
    let mut config = config_in(scratch_dir("no_rows"));
    config.matches_path = fixture_path("matches_no_metrics.csv");
    let report = pipeline::run(&config).expect("pipeline should run");
    assert_eq!(report.rows, 0);

    let cleaned = fs::read_to_string(config.cleaned_path()).expect("cleaned csv");
    assert!(cleaned.starts_with("date,"));
    assert_eq!(cleaned.lines().count(), 1);
    let advanced = fs::read_to_string(config.advanced_path()).expect("advanced csv");
    assert!(advanced.starts_with("date,"));
    assert!(
        advanced
            .lines()
            .next()
            .is_some_and(|h| h.ends_with("climate_impact_score"))
    );

    let rows = artifacts::load_dataset(&config.advanced_path()).expect("header-only csv reads");
    assert!(rows.is_empty());
}

#[test]
fn later_failure_keeps_earlier_artifacts() {
    let dir = scratch_dir("partial");
    let mut config = config_in(dir.clone());
    config.xlsx_path = Some(dir.join("no_such_dir").join("analysis.xlsx"));

    assert!(pipeline::run(&config).is_err());
    assert!(config.missingness_path().exists());
    assert!(config.cleaned_path().exists());
    assert!(config.advanced_path().exists());
    assert!(config.report_path().exists());
}
