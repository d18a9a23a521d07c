use serde::Serialize;
use statrs::distribution::{ContinuousCDF, StudentsT};
use thiserror::Error;

const VARIANCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },
    #[error("zero variance")]
    ZeroVariance,
    #[error("t distribution: {0}")]
    Distribution(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TTest {
    pub statistic: f64,
    pub p_value: f64,
    pub df: f64,
    pub n_a: usize,
    pub n_b: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Correlation {
    pub r: f64,
    pub p_value: f64,
    pub n: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Count, moments and linearly interpolated quartiles of a column.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Describe {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; NaN for a single observation.
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
    pub max: f64,
}

pub fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    (count > 0).then(|| sum / count as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    let sorted = sorted(values);
    quantile_sorted(&sorted, 0.5)
}

/// Quantile with linear interpolation between closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(f64::total_cmp);
    out
}

/// Variance with `ddof` delta degrees of freedom.
pub fn variance(values: &[f64], ddof: usize) -> Option<f64> {
    if values.len() <= ddof {
        return None;
    }
    let m = mean(values.iter().copied())?;
    let ss = values.iter().map(|v| (v - m).powi(2)).sum::<f64>();
    Some(ss / (values.len() - ddof) as f64)
}

pub fn describe(values: &[f64]) -> Option<Describe> {
    let sorted = sorted(values);
    let (min, max) = (*sorted.first()?, *sorted.last()?);
    Some(Describe {
        count: sorted.len(),
        mean: mean(sorted.iter().copied())?,
        std: variance(&sorted, 1).map(f64::sqrt).unwrap_or(f64::NAN),
        min,
        q25: quantile_sorted(&sorted, 0.25)?,
        q50: quantile_sorted(&sorted, 0.5)?,
        q75: quantile_sorted(&sorted, 0.75)?,
        max,
    })
}

/// Min-max scales present values into [0, 1]. A column with zero range maps to 0.0.
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied();
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    let range = max - min;
    values
        .iter()
        .map(|v| {
            v.map(|v| {
                if range > 0.0 {
                    ((v - min) / range).clamp(0.0, 1.0)
                } else {
                    0.0
                }
            })
        })
        .collect()
}

/// Population z-scores (ddof = 0). Empty or constant columns yield no scores at all.
pub fn z_scores(values: &[Option<f64>]) -> Vec<Option<f64>> {
    let present = values.iter().flatten().copied().collect::<Vec<_>>();
    let stdev = variance(&present, 0).map(f64::sqrt).unwrap_or(0.0);
    let Some(m) = mean(present.iter().copied()) else {
        return vec![None; values.len()];
    };
    if stdev < VARIANCE_EPSILON.sqrt() {
        return vec![None; values.len()];
    }
    values.iter().map(|v| v.map(|v| (v - m) / stdev)).collect()
}

/// Independent two-sample t-test with pooled variance, two-sided.
pub fn ttest_ind(a: &[f64], b: &[f64]) -> Result<TTest, StatsError> {
    for sample in [a, b] {
        if sample.len() < 2 {
            return Err(StatsError::InsufficientData {
                needed: 2,
                got: sample.len(),
            });
        }
    }
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    let var_a = variance(a, 1).ok_or(StatsError::ZeroVariance)?;
    let var_b = variance(b, 1).ok_or(StatsError::ZeroVariance)?;
    let df = n_a + n_b - 2.0;
    let pooled = ((n_a - 1.0) * var_a + (n_b - 1.0) * var_b) / df;
    if pooled < VARIANCE_EPSILON {
        return Err(StatsError::ZeroVariance);
    }

    let mean_a = mean(a.iter().copied()).ok_or(StatsError::ZeroVariance)?;
    let mean_b = mean(b.iter().copied()).ok_or(StatsError::ZeroVariance)?;
    let statistic = (mean_a - mean_b) / (pooled * (1.0 / n_a + 1.0 / n_b)).sqrt();
    Ok(TTest {
        statistic,
        p_value: two_sided_p(statistic, df)?,
        df,
        n_a: a.len(),
        n_b: b.len(),
    })
}

/// Pearson correlation over the pairs where both sides are present.
pub fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> Result<Correlation, StatsError> {
    let pairs = complete_pairs(x, y);
    let n = pairs.len();
    if n < 2 {
        return Err(StatsError::InsufficientData { needed: 2, got: n });
    }
    let mx = mean(pairs.iter().map(|p| p.0)).ok_or(StatsError::ZeroVariance)?;
    let my = mean(pairs.iter().map(|p| p.1)).ok_or(StatsError::ZeroVariance)?;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (px, py) in &pairs {
        sxy += (px - mx) * (py - my);
        sxx += (px - mx).powi(2);
        syy += (py - my).powi(2);
    }
    if sxx < VARIANCE_EPSILON || syy < VARIANCE_EPSILON {
        return Err(StatsError::ZeroVariance);
    }

    let r = (sxy / (sxx * syy).sqrt()).clamp(-1.0, 1.0);
    let df = (n - 2) as f64;
    // df = 0 leaves no evidence either way.
    let p_value = if n == 2 {
        1.0
    } else if (1.0 - r.abs()) < VARIANCE_EPSILON {
        0.0
    } else {
        two_sided_p(r * (df / (1.0 - r * r)).sqrt(), df)?
    };
    Ok(Correlation { r, p_value, n })
}

/// Ordinary least-squares line through `points`.
pub fn linear_fit(points: &[(f64, f64)]) -> Result<LinearFit, StatsError> {
    if points.len() < 2 {
        return Err(StatsError::InsufficientData {
            needed: 2,
            got: points.len(),
        });
    }
    let mx = mean(points.iter().map(|p| p.0)).ok_or(StatsError::ZeroVariance)?;
    let my = mean(points.iter().map(|p| p.1)).ok_or(StatsError::ZeroVariance)?;
    let sxx = points.iter().map(|p| (p.0 - mx).powi(2)).sum::<f64>();
    if sxx < VARIANCE_EPSILON {
        return Err(StatsError::ZeroVariance);
    }
    let sxy = points.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum::<f64>();
    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: my - slope * mx,
    })
}

pub fn complete_pairs(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<(f64, f64)> {
    x.iter()
        .zip(y)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect()
}

fn two_sided_p(statistic: f64, df: f64) -> Result<f64, StatsError> {
    let dist =
        StudentsT::new(0.0, 1.0, df).map_err(|err| StatsError::Distribution(err.to_string()))?;
    Ok((2.0 * dist.sf(statistic.abs())).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::{
        StatsError, describe, linear_fit, median, min_max_normalize, pearson, ttest_ind, z_scores,
    };

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn median_of_even_column_is_midpoint() {
        assert_eq!(median(&[90.0, 60.0, 80.0, 70.0]), Some(75.0));
        assert_eq!(median(&[]), None);
    }

    #[test]
    fn humidity_normalizes_to_unit_range() {
        let values = [Some(20.0), Some(40.0), Some(60.0), Some(80.0), None];
        let norm = min_max_normalize(&values);
        assert_eq!(norm[0], Some(0.0));
        assert_eq!(norm[3], Some(1.0));
        assert!(close(norm[1].unwrap(), 0.333, 1e-3));
        assert!(close(norm[2].unwrap(), 0.667, 1e-3));
        assert_eq!(norm[4], None);
    }

    #[test]
    fn constant_column_normalizes_to_zero_and_has_no_z_scores() {
        let values = [Some(5.0), Some(5.0), Some(5.0)];
        assert_eq!(min_max_normalize(&values), vec![Some(0.0); 3]);
        assert_eq!(z_scores(&values), vec![None; 3]);
    }

    #[test]
    fn z_scores_use_population_std() {
        let z = z_scores(&[Some(1.0), Some(3.0)]);
        assert!(close(z[0].unwrap(), -1.0, 1e-12));
        assert!(close(z[1].unwrap(), 1.0, 1e-12));
    }

    #[test]
    fn ttest_matches_reference_values() {
        // Reference: t = -2.19089, p = 0.07099 for these two samples.
        let t = ttest_ind(&[1.0, 2.0, 3.0, 4.0], &[3.0, 4.0, 5.0, 6.0]).unwrap();
        assert!(close(t.statistic, -2.190_890, 1e-5));
        assert!(close(t.p_value, 0.070_99, 1e-4));
        assert_eq!(t.df, 6.0);
    }

    #[test]
    fn ttest_rejects_tiny_or_flat_groups() {
        assert_eq!(
            ttest_ind(&[1.0], &[2.0, 3.0]),
            Err(StatsError::InsufficientData { needed: 2, got: 1 })
        );
        assert_eq!(
            ttest_ind(&[2.0, 2.0], &[2.0, 2.0]),
            Err(StatsError::ZeroVariance)
        );
    }

    #[test]
    fn pearson_skips_incomplete_pairs() {
        let x = [Some(1.0), Some(2.0), None, Some(3.0), Some(4.0)];
        let y = [Some(2.0), Some(4.0), Some(100.0), Some(6.0), Some(8.0)];
        let c = pearson(&x, &y).unwrap();
        assert_eq!(c.n, 4);
        assert!(close(c.r, 1.0, 1e-12));
        assert_eq!(c.p_value, 0.0);
    }

    #[test]
    fn pearson_two_pairs_are_perfect_but_uninformative() {
        let c = pearson(&[Some(1.0), Some(3.0)], &[Some(5.0), Some(2.0)]).unwrap();
        assert_eq!(c.n, 2);
        assert!(close(c.r, -1.0, 1e-12));
        assert_eq!(c.p_value, 1.0);
        assert!(matches!(
            pearson(&[Some(1.0)], &[Some(2.0)]),
            Err(StatsError::InsufficientData { needed: 2, got: 1 })
        ));
    }

    #[test]
    fn pearson_p_value_matches_reference() {
        // Reference: r = 0.8, p = 0.10408.
        let x = [1.0, 2.0, 3.0, 4.0, 5.0].map(Some);
        let y = [2.0, 1.0, 4.0, 3.0, 5.0].map(Some);
        let c = pearson(&x, &y).unwrap();
        assert!(close(c.r, 0.8, 1e-12));
        assert!(close(c.p_value, 0.104_08, 1e-4));
    }

    #[test]
    fn describe_uses_interpolated_quartiles() {
        let d = describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(d.count, 4);
        assert_eq!(d.q25, 1.75);
        assert_eq!(d.q50, 2.5);
        assert_eq!(d.q75, 3.25);
        assert!(close(d.std, 1.290_994, 1e-6));
        assert!(describe(&[]).is_none());
    }

    #[test]
    fn linear_fit_recovers_line() {
        let fit = linear_fit(&[(0.0, 1.0), (1.0, 3.0), (2.0, 5.0)]).unwrap();
        assert!(close(fit.slope, 2.0, 1e-12));
        assert!(close(fit.intercept, 1.0, 1e-12));
        assert!(linear_fit(&[(1.0, 1.0), (1.0, 2.0)]).is_err());
    }
}
