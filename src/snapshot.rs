use std::fmt::{self, Debug};

use super::*;

/// An immutable, sorted view of the values a reservoir retained at one
/// instant.
#[derive(Clone, Default, PartialEq)]
pub struct Snapshot {
    values: Vec<f64>,
}

impl Debug for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const PS: [f64; 8] = [0., 0.5, 0.75, 0.95, 0.98, 0.99, 0.999, 1.];
        f.write_str("Snapshot[")?;

        for p in &PS {
            let line = format!("({} -> {}) ", p, self.value_at(*p));
            f.write_str(&*line)?;
        }

        f.write_str("]")
    }
}

impl Snapshot {
    /// Create a snapshot, sorting the values once.
    pub fn new(mut values: Vec<f64>) -> Snapshot {
        values.sort_by(|a, b| a.total_cmp(b));
        Snapshot { values }
    }

    /// Number of retained values.
    pub fn size(&self) -> usize {
        self.values.len()
    }

    /// The sorted values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Arithmetic mean, or 0 if empty.
    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.;
        }
        // dividing first keeps the sum within range for large finite values
        let n = self.values.len() as f64;
        self.values.iter().map(|v| v / n).sum::<f64>()
    }

    /// Sample standard deviation, or 0 with fewer than two values.
    pub fn std_dev(&self) -> f64 {
        let n = self.values.len();
        if n <= 1 {
            return 0.;
        }

        // Half-deviations cannot overflow, and scaling them by the largest
        // one keeps their squares in range.
        let half_mean = self.mean() * 0.5;
        let halves: Vec<f64> = self.values.iter().map(|v| v * 0.5 - half_mean).collect();
        let scale = halves.iter().fold(0., |acc: f64, d| acc.max(d.abs()));
        if scale == 0. {
            return 0.;
        }

        let sum_sq = halves
            .iter()
            .map(|d| {
                let scaled = d / scale;
                scaled * scaled
            })
            .sum::<f64>();

        2. * scale * (sum_sq / (n - 1) as f64).sqrt()
    }

    /// Smallest value, or 0 if empty.
    pub fn min(&self) -> f64 {
        self.values.first().copied().unwrap_or(0.)
    }

    /// Largest value, or 0 if empty.
    pub fn max(&self) -> f64 {
        self.values.last().copied().unwrap_or(0.)
    }

    /// Estimate the value at quantile `p`, which must lie in `[0, 1]`.
    ///
    /// Uses the `p * (n + 1)` rank with linear interpolation between the
    /// two neighbouring samples, clamping to min and max at the ends.
    pub fn percentile(&self, p: f64) -> crate::Result<f64> {
        if !(0. ..=1.).contains(&p) {
            return Err(Error::InvalidPercentile(p));
        }
        Ok(self.value_at(p))
    }

    /// Estimate several quantiles at once, preserving input order.
    pub fn percentiles(&self, ps: &[f64]) -> crate::Result<Vec<(f64, f64)>> {
        ps.iter()
            .map(|&p| self.percentile(p).map(|v| (p, v)))
            .collect()
    }

    /// The 50th percentile.
    pub fn median(&self) -> f64 {
        self.value_at(0.5)
    }

    pub fn p75(&self) -> f64 {
        self.value_at(0.75)
    }

    pub fn p95(&self) -> f64 {
        self.value_at(0.95)
    }

    pub fn p98(&self) -> f64 {
        self.value_at(0.98)
    }

    pub fn p99(&self) -> f64 {
        self.value_at(0.99)
    }

    pub fn p999(&self) -> f64 {
        self.value_at(0.999)
    }

    // p must already be within [0, 1]
    fn value_at(&self, p: f64) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.;
        }

        let pos = p * (n + 1) as f64;
        if pos < 1. {
            return self.values[0];
        }
        if pos >= n as f64 {
            return self.values[n - 1];
        }

        let lower = pos.floor() as usize;
        let delta = pos - lower as f64;
        let below = self.values[lower - 1];
        let above = self.values[lower];
        below + delta * (above - below)
    }
}

#[test]
fn five_values() {
    let s = Snapshot::new(vec![50., 10., 40., 20., 30.]);
    assert_eq!(s.values(), &[10., 20., 30., 40., 50.]);
    assert_eq!(s.size(), 5);
    assert_eq!(s.mean(), 30.);
    assert_eq!(s.min(), 10.);
    assert_eq!(s.max(), 50.);
    assert_eq!(s.percentile(0.5), Ok(30.));
    assert_eq!(s.median(), 30.);
    assert!((s.std_dev() - 250f64.sqrt()).abs() < 1e-12);
}

#[test]
fn interpolates_between_neighbours() {
    let s = Snapshot::new(vec![1., 2., 3., 4.]);
    // pos = 0.5 * 5 = 2.5 -> halfway between 2 and 3
    assert_eq!(s.percentile(0.5), Ok(2.5));
    // pos = 0.75 * 5 = 3.75 -> 3 + 0.75
    assert_eq!(s.percentile(0.75), Ok(3.75));
    // pos = 0.1 * 5 = 0.5 < 1 -> min
    assert_eq!(s.percentile(0.1), Ok(1.));
    // pos = 0.9 * 5 = 4.5 >= 4 -> max
    assert_eq!(s.percentile(0.9), Ok(4.));
}

#[test]
fn extremes_match_min_and_max() {
    let s = Snapshot::new(vec![3., -7., 12.5, 0.25, 99., 4.]);
    assert_eq!(s.percentile(0.), Ok(s.min()));
    assert_eq!(s.percentile(1.), Ok(s.max()));
}

#[test]
fn empty() {
    let s = Snapshot::new(vec![]);
    assert_eq!(s.mean(), 0.);
    assert_eq!(s.std_dev(), 0.);
    assert_eq!(s.min(), 0.);
    assert_eq!(s.max(), 0.);
    assert_eq!(s.percentile(0.99), Ok(0.));
}

#[test]
fn huge_values_stay_finite() {
    let s = Snapshot::new(vec![std::f64::MAX, std::f64::MAX]);
    assert_eq!(s.mean(), std::f64::MAX);
    assert_eq!(s.std_dev(), 0.);

    let s = Snapshot::new(vec![std::f64::MAX, std::f64::MAX / 2., 0.]);
    assert!(s.mean().is_finite());
    assert!((s.mean() - std::f64::MAX / 2.).abs() <= std::f64::MAX * 1e-15);
    assert!(s.std_dev().is_finite());
    assert!((s.std_dev() - std::f64::MAX / 2.).abs() <= std::f64::MAX * 1e-15);
}

#[test]
fn single_value() {
    let s = Snapshot::new(vec![42.]);
    assert_eq!(s.std_dev(), 0.);
    assert_eq!(s.percentile(0.5), Ok(42.));
}

#[test]
fn rejects_out_of_range_percentiles() {
    let s = Snapshot::new(vec![1., 2.]);
    assert_eq!(s.percentile(-0.1), Err(Error::InvalidPercentile(-0.1)));
    assert_eq!(s.percentile(1.01), Err(Error::InvalidPercentile(1.01)));
    assert!(s.percentile(std::f64::NAN).is_err());
    assert!(s.percentiles(&[0.5, 2.]).is_err());
}

#[test]
fn percentiles_keep_input_order() {
    let s = Snapshot::new((1..=100).map(f64::from).collect());
    let ps = s.percentiles(&[0.99, 0.5, 0.]).unwrap();
    assert_eq!(ps.len(), 3);
    assert_eq!(ps[0].0, 0.99);
    assert_eq!(ps[1], (0.5, 50.5));
    assert_eq!(ps[2], (0., 1.));
}

#[test]
fn debug_lists_percentiles() {
    let s = Snapshot::new(vec![1., 2., 3.]);
    let printed = format!("{:?}", s);
    assert!(printed.starts_with("Snapshot["));
    assert!(printed.contains("(0.5 -> 2)"));
}
