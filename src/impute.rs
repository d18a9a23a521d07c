use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::stats;

/// How gaps in a weather column are filled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputationStrategy {
    Mean,
    ForwardFill,
    Linear,
}

impl ImputationStrategy {
    pub const ALL: [ImputationStrategy; 3] = [
        ImputationStrategy::Mean,
        ImputationStrategy::ForwardFill,
        ImputationStrategy::Linear,
    ];

    pub fn apply(self, values: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            ImputationStrategy::Mean => mean_fill(values),
            ImputationStrategy::ForwardFill => forward_fill(values),
            ImputationStrategy::Linear => linear_interpolate(values),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ImputationStrategy::Mean => "Mean",
            ImputationStrategy::ForwardFill => "F-fill",
            ImputationStrategy::Linear => "Interp",
        }
    }
}

impl fmt::Display for ImputationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImputationStrategy::Mean => "mean",
            ImputationStrategy::ForwardFill => "ffill",
            ImputationStrategy::Linear => "linear",
        };
        f.write_str(name)
    }
}

impl FromStr for ImputationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(ImputationStrategy::Mean),
            "ffill" | "forward-fill" | "forward_fill" => Ok(ImputationStrategy::ForwardFill),
            "linear" | "interp" | "interpolate" => Ok(ImputationStrategy::Linear),
            other => Err(format!("unknown imputation strategy `{other}`")),
        }
    }
}

pub fn mean_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let Some(mean) = stats::mean(values.iter().flatten().copied()) else {
        return values.to_vec();
    };
    values.iter().map(|v| Some(v.unwrap_or(mean))).collect()
}

/// Leading gaps have nothing to carry forward and stay empty.
pub fn forward_fill(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}

/// Interpolates interior gaps by position. Trailing gaps repeat the last known value; leading
/// gaps stay empty.
pub fn linear_interpolate(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let mut prev: Option<(usize, f64)> = None;

    for (idx, value) in values.iter().enumerate() {
        let Some(value) = *value else {
            continue;
        };
        if let Some((start, start_value)) = prev {
            let span = (idx - start) as f64;
            for gap in (start + 1)..idx {
                let offset = (gap - start) as f64;
                out[gap] = Some(start_value + (value - start_value) * offset / span);
            }
        }
        prev = Some((idx, value));
    }

    if let Some((last_idx, last_value)) = prev {
        for slot in out.iter_mut().skip(last_idx + 1) {
            *slot = Some(last_value);
        }
    }
    out
}
