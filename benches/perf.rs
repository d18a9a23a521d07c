use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use wc22_weather::artifacts;
use wc22_weather::dataset::{self, MatchRecord, Table, WeatherRecord};
use wc22_weather::impute::ImputationStrategy;
use wc22_weather::pipeline::Pipeline;
use wc22_weather::state::DashboardState;
use wc22_weather::view::DashboardView;

const MATCHES: usize = 64;
const DAYS: u32 = 29;

fn sample_matches_csv() -> String {
    let mut out = String::from(
        "date,number of goals team1,number of goals team2,total attempts team1,total attempts team2,on target attempts team1,on target attempts team2\n",
    );
    for idx in 0..MATCHES {
        let day = 1 + (idx as u32 % DAYS);
        let goals = idx % 5;
        // Every seventh match is missing its attempts.
        let attempts = if idx % 7 == 0 {
            String::from(",")
        } else {
            format!("{},{}", 8 + idx % 9, 5 + idx % 6)
        };
        out.push_str(&format!(
            "{day:02} NOV 2022,{goals},{},{attempts},{},{}\n",
            (idx + 2) % 4,
            goals + 1,
            idx % 3
        ));
    }
    out
}

fn sample_weather_csv() -> String {
    let mut out = String::from("datetime,temp,humidity\n");
    for day in 1..=DAYS {
        let temp = if day % 6 == 0 {
            String::new()
        } else {
            format!("{:.1}", 24.0 + f64::from(day % 8) * 0.7)
        };
        let humidity = if day % 5 == 0 {
            String::new()
        } else {
            format!("{:.1}", 50.0 + f64::from(day % 11) * 2.3)
        };
        out.push_str(&format!("2022-11-{day:02},{temp},{humidity}\n"));
    }
    out
}

fn sample_tables() -> (Table<MatchRecord>, Table<WeatherRecord>) {
    let matches = dataset::read_matches(sample_matches_csv().as_bytes()).unwrap();
    let weather = dataset::read_weather(sample_weather_csv().as_bytes()).unwrap();
    (matches, weather)
}

fn bench_read_inputs(c: &mut Criterion) {
    let matches = sample_matches_csv();
    let weather = sample_weather_csv();
    c.bench_function("read_inputs", |b| {
        b.iter(|| {
            let m = dataset::read_matches(black_box(matches.as_bytes())).unwrap();
            let w = dataset::read_weather(black_box(weather.as_bytes())).unwrap();
            black_box((m.rows.len(), w.rows.len()));
        })
    });
}

fn bench_pipeline_analyze(c: &mut Criterion) {
    let (matches, weather) = sample_tables();
    c.bench_function("pipeline_analyze", |b| {
        b.iter(|| {
            let pipeline = Pipeline::analyze(
                black_box(&matches),
                black_box(&weather),
                ImputationStrategy::Linear,
            );
            black_box(pipeline.report().outliers);
        })
    });
}

fn bench_advanced_write(c: &mut Criterion) {
    let (matches, weather) = sample_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::Linear);
    c.bench_function("advanced_write", |b| {
        b.iter(|| {
            let mut buf = Vec::with_capacity(8 * 1024);
            artifacts::write_advanced_to(&mut buf, black_box(pipeline.rows())).unwrap();
            black_box(buf.len());
        })
    });
}

fn bench_view_recompute(c: &mut Criterion) {
    let (matches, weather) = sample_tables();
    let pipeline = Pipeline::analyze(&matches, &weather, ImputationStrategy::Linear);
    let rows = pipeline.rows();
    let mut state = DashboardState::new(rows);
    state.toggle_table();
    c.bench_function("view_recompute", |b| {
        b.iter(|| {
            let view = DashboardView::compute(black_box(rows), None, black_box(&state));
            black_box(view.count);
        })
    });
}

criterion_group!(
    perf,
    bench_read_inputs,
    bench_pipeline_analyze,
    bench_advanced_write,
    bench_view_recompute
);
criterion_main!(perf);
