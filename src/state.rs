use std::collections::VecDeque;

use crate::combined::{CombinedRecord, Metric};

const RANGE_STEPS: f64 = 20.0;
const MAX_LOGS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub lo: f64,
    pub hi: f64,
}

impl Range {
    /// Min and max of the present values; `None` when nothing is present.
    pub fn spanning(values: impl IntoIterator<Item = Option<f64>>) -> Option<Self> {
        values.into_iter().flatten().fold(None, |acc, v| match acc {
            None => Some(Range { lo: v, hi: v }),
            Some(r) => Some(Range {
                lo: r.lo.min(v),
                hi: r.hi.max(v),
            }),
        })
    }

    /// Inclusive on both ends; a missing value is never inside.
    pub fn contains(&self, value: Option<f64>) -> bool {
        value.is_some_and(|v| v >= self.lo && v <= self.hi)
    }

    pub fn width(&self) -> f64 {
        self.hi - self.lo
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterField {
    TempMin,
    TempMax,
    HumidityMin,
    HumidityMax,
}

impl FilterField {
    pub fn next(self) -> Self {
        match self {
            FilterField::TempMin => FilterField::TempMax,
            FilterField::TempMax => FilterField::HumidityMin,
            FilterField::HumidityMin => FilterField::HumidityMax,
            FilterField::HumidityMax => FilterField::TempMin,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FilterField::TempMin => "Temp min",
            FilterField::TempMax => "Temp max",
            FilterField::HumidityMin => "Humidity min",
            FilterField::HumidityMax => "Humidity max",
        }
    }
}

/// Everything the user can change. The data itself lives elsewhere and is never written.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub temp_bounds: Range,
    pub humidity_bounds: Range,
    pub temp_range: Range,
    pub humidity_range: Range,
    pub metric: Metric,
    pub show_table: bool,
    pub focus: FilterField,
    pub help_overlay: bool,
    pub logs: VecDeque<String>,
}

impl DashboardState {
    /// Sliders start at the full extent of the data.
    pub fn new(rows: &[CombinedRecord]) -> Self {
        let fallback = Range { lo: 0.0, hi: 0.0 };
        let temp_bounds = Range::spanning(rows.iter().map(|r| r.temp)).unwrap_or(fallback);
        let humidity_bounds =
            Range::spanning(rows.iter().map(|r| r.humidity)).unwrap_or(fallback);
        Self {
            temp_bounds,
            humidity_bounds,
            temp_range: temp_bounds,
            humidity_range: humidity_bounds,
            metric: Metric::Goals,
            show_table: false,
            focus: FilterField::TempMin,
            help_overlay: false,
            logs: VecDeque::new(),
        }
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn cycle_metric(&mut self) {
        self.metric = self.metric.next();
    }

    pub fn cycle_focus(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn toggle_table(&mut self) {
        self.show_table = !self.show_table;
    }

    pub fn reset_filters(&mut self) {
        self.temp_range = self.temp_bounds;
        self.humidity_range = self.humidity_bounds;
    }

    /// Moves the focused bound by `steps` twentieths of the data extent. Bounds stay inside the
    /// data extent and never cross each other.
    pub fn nudge(&mut self, steps: i32) {
        let (range, bounds, is_min) = match self.focus {
            FilterField::TempMin => (&mut self.temp_range, self.temp_bounds, true),
            FilterField::TempMax => (&mut self.temp_range, self.temp_bounds, false),
            FilterField::HumidityMin => (&mut self.humidity_range, self.humidity_bounds, true),
            FilterField::HumidityMax => (&mut self.humidity_range, self.humidity_bounds, false),
        };
        let delta = bounds.width() / RANGE_STEPS * f64::from(steps);
        if is_min {
            range.lo = (range.lo + delta).max(bounds.lo).min(range.hi);
        } else {
            range.hi = (range.hi + delta).min(bounds.hi).max(range.lo);
        }
    }

    pub fn set_ranges(&mut self, temp: Range, humidity: Range) {
        self.temp_range = temp;
        self.humidity_range = humidity;
    }
}
