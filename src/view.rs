use crate::combined::{CombinedRecord, Metric, MissingCount, TempGroup};
use crate::state::{DashboardState, Range};
use crate::stats::{self, Describe, LinearFit};

pub const COLOR_BUCKETS: usize = 5;
const WHISKER_IQR: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPoint {
    pub temp: f64,
    pub humidity: f64,
    pub value: f64,
    /// 0 is the coldest colour, `COLOR_BUCKETS - 1` the warmest.
    pub bucket: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MissingnessPanel {
    Unavailable,
    NoneMissing,
    Bars(Vec<(String, u64)>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub n: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub whisker_lo: f64,
    pub whisker_hi: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupBox {
    pub group: TempGroup,
    pub stats: Option<BoxStats>,
    pub fliers: Vec<f64>,
}

/// One frame's worth of derived data. Recomputed from scratch whenever a filter changes.
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView {
    pub count: usize,
    pub metric: Metric,
    pub score_points: Vec<(f64, f64)>,
    pub trend: Option<LinearFit>,
    pub trend_line: Vec<(f64, f64)>,
    pub weather_points: Vec<WeatherPoint>,
    pub value_range: Option<Range>,
    pub missingness: MissingnessPanel,
    pub boxes: Vec<GroupBox>,
    pub summary: Option<Vec<(&'static str, Option<Describe>)>>,
}

impl DashboardView {
    pub fn compute(
        rows: &[CombinedRecord],
        missingness: Option<&[MissingCount]>,
        state: &DashboardState,
    ) -> Self {
        let filtered = filter_rows(rows, state.temp_range, state.humidity_range);
        let metric = state.metric;

        let score_points = filtered
            .iter()
            .filter_map(|r| Some((r.climate_impact_score?, metric.value(r)?)))
            .collect::<Vec<_>>();
        let trend = if score_points.len() > 1 {
            stats::linear_fit(&score_points).ok()
        } else {
            None
        };
        let trend_line = trend
            .map(|fit| {
                let xs = Range::spanning(score_points.iter().map(|p| Some(p.0)));
                xs.map(|r| vec![(r.lo, fit.predict(r.lo)), (r.hi, fit.predict(r.hi))])
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let value_range = Range::spanning(filtered.iter().map(|r| metric.value(r)));
        let weather_points = filtered
            .iter()
            .filter_map(|r| {
                let value = metric.value(r)?;
                Some(WeatherPoint {
                    temp: r.temp?,
                    humidity: r.humidity?,
                    value,
                    bucket: color_bucket(value, value_range),
                })
            })
            .collect();

        let boxes = [TempGroup::Hot, TempGroup::Mild]
            .into_iter()
            .map(|group| {
                let values = filtered
                    .iter()
                    .filter(|r| r.temp_group == Some(group))
                    .filter_map(|r| metric.value(r))
                    .collect::<Vec<_>>();
                let (stats, fliers) = box_stats(&values);
                GroupBox {
                    group,
                    stats,
                    fliers,
                }
            })
            .collect();

        let summary = state.show_table.then(|| {
            vec![
                (metric.column(), describe_column(&filtered, |r| metric.value(r))),
                ("temp", describe_column(&filtered, |r| r.temp)),
                ("humidity", describe_column(&filtered, |r| r.humidity)),
                (
                    "climate_impact_score",
                    describe_column(&filtered, |r| r.climate_impact_score),
                ),
            ]
        });

        Self {
            count: filtered.len(),
            metric,
            score_points,
            trend,
            trend_line,
            weather_points,
            value_range,
            missingness: missingness_panel(missingness),
            boxes,
            summary,
        }
    }
}

pub fn filter_rows(rows: &[CombinedRecord], temp: Range, humidity: Range) -> Vec<&CombinedRecord> {
    rows.iter()
        .filter(|r| temp.contains(r.temp) && humidity.contains(r.humidity))
        .collect()
}

fn describe_column(
    rows: &[&CombinedRecord],
    value: impl Fn(&CombinedRecord) -> Option<f64>,
) -> Option<Describe> {
    let values = rows.iter().filter_map(|&r| value(r)).collect::<Vec<_>>();
    stats::describe(&values)
}

pub fn missingness_panel(missingness: Option<&[MissingCount]>) -> MissingnessPanel {
    let Some(counts) = missingness else {
        return MissingnessPanel::Unavailable;
    };
    let bars = counts
        .iter()
        .filter(|c| c.missing_count > 0)
        .map(|c| (c.column.clone(), c.missing_count as u64))
        .collect::<Vec<_>>();
    if bars.is_empty() {
        MissingnessPanel::NoneMissing
    } else {
        MissingnessPanel::Bars(bars)
    }
}

/// Quartiles with whiskers at the furthest points within 1.5 IQR; anything beyond is a flier.
pub fn box_stats(values: &[f64]) -> (Option<BoxStats>, Vec<f64>) {
    let sorted = stats::sorted(values);
    let (Some(q1), Some(median), Some(q3)) = (
        stats::quantile_sorted(&sorted, 0.25),
        stats::quantile_sorted(&sorted, 0.5),
        stats::quantile_sorted(&sorted, 0.75),
    ) else {
        return (None, Vec::new());
    };
    let iqr = q3 - q1;
    let lo_fence = q1 - WHISKER_IQR * iqr;
    let hi_fence = q3 + WHISKER_IQR * iqr;
    let inside = sorted
        .iter()
        .copied()
        .filter(|v| *v >= lo_fence && *v <= hi_fence)
        .collect::<Vec<_>>();
    let fliers = sorted
        .iter()
        .copied()
        .filter(|v| *v < lo_fence || *v > hi_fence)
        .collect();
    let stats = BoxStats {
        n: sorted.len(),
        q1,
        median,
        q3,
        whisker_lo: inside.first().copied().unwrap_or(q1),
        whisker_hi: inside.last().copied().unwrap_or(q3),
    };
    (Some(stats), fliers)
}

pub fn color_bucket(value: f64, range: Option<Range>) -> usize {
    let Some(range) = range else {
        return 0;
    };
    if range.width() <= 0.0 {
        return COLOR_BUCKETS / 2;
    }
    let frac = ((value - range.lo) / range.width()).clamp(0.0, 1.0);
    ((frac * COLOR_BUCKETS as f64) as usize).min(COLOR_BUCKETS - 1)
}

#[cfg(test)]
mod tests {
    use super::{COLOR_BUCKETS, box_stats, color_bucket};
    use crate::state::Range;

    #[test]
    fn box_stats_separates_fliers() {
        let (stats, fliers) = box_stats(&[1.0, 2.0, 3.0, 4.0, 100.0]);
        let stats = stats.unwrap();
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.whisker_hi, 4.0);
        assert_eq!(fliers, vec![100.0]);
        assert_eq!(box_stats(&[]), (None, Vec::new()));
    }

    #[test]
    fn color_buckets_cover_the_range() {
        let range = Some(Range { lo: 0.0, hi: 10.0 });
        assert_eq!(color_bucket(0.0, range), 0);
        assert_eq!(color_bucket(10.0, range), COLOR_BUCKETS - 1);
        assert_eq!(color_bucket(5.0, Some(Range { lo: 5.0, hi: 5.0 })), COLOR_BUCKETS / 2);
    }
}
