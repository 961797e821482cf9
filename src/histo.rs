use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::debug;

use super::*;

/// A histogram that samples observations into a pluggable reservoir.
///
/// The count tracks every accepted observation, independent of how many the
/// reservoir retains.
pub struct Histogram {
    reservoir: Box<dyn Reservoir>,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Histogram {
        Histogram::exponentially_decaying()
    }
}

impl Debug for Histogram {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        const PS: [f64; 10] = [0., 0.5, 0.75, 0.9, 0.95, 0.975, 0.99, 0.999, 0.9999, 1.];
        let snapshot = self.snapshot();
        f.write_str("Histogram[")?;

        let line = format!("count: {} ", self.count());
        f.write_str(&*line)?;
        for p in &PS {
            let res = snapshot.percentile(*p).map_err(|_| fmt::Error)?;
            let line = format!("({} -> {}) ", p, res);
            f.write_str(&*line)?;
        }

        f.write_str("]")
    }
}

impl Histogram {
    /// Wrap an arbitrary reservoir.
    pub fn new<R: Reservoir + 'static>(reservoir: R) -> Histogram {
        Histogram {
            reservoir: Box::new(reservoir),
            count: AtomicU64::new(0),
        }
    }

    /// A histogram over a uniform sample of `capacity` values.
    pub fn uniform(capacity: usize) -> Histogram {
        Histogram::new(UniformReservoir::new(capacity))
    }

    /// A histogram biased toward the last few minutes, with default sizing.
    pub fn exponentially_decaying() -> Histogram {
        Histogram::new(ExponentiallyDecayingReservoir::default())
    }

    /// A histogram over the last `capacity` observations.
    pub fn sliding_window(capacity: usize) -> Histogram {
        Histogram::new(SlidingWindowReservoir::new(capacity))
    }

    /// Record a value observed now.
    pub fn update(&self, value: f64) -> crate::Result<()> {
        self.update_at(value, Instant::now())
    }

    /// Record a value observed at `timestamp`. Non-finite values are
    /// rejected and leave the histogram untouched.
    pub fn update_at(&self, value: f64, timestamp: Instant) -> crate::Result<()> {
        if !value.is_finite() {
            debug!(value, "rejecting non-finite observation");
            return Err(Error::InvalidValue(value));
        }

        self.count.fetch_add(1, Ordering::Relaxed);
        self.reservoir.update(value, timestamp);
        Ok(())
    }

    /// Total number of accepted observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Number of values the reservoir currently retains.
    pub fn size(&self) -> usize {
        self.reservoir.size()
    }

    pub fn snapshot(&self) -> Snapshot {
        self.reservoir.snapshot()
    }
}

#[test]
fn it_works() {
    let h = Histogram::uniform(5);
    for v in &[10., 20., 30., 40., 50.] {
        h.update(*v).unwrap();
    }

    assert_eq!(h.count(), 5);
    let snapshot = h.snapshot();
    assert_eq!(snapshot.mean(), 30.);
    assert_eq!(snapshot.min(), 10.);
    assert_eq!(snapshot.max(), 50.);
    assert_eq!(snapshot.percentile(0.5), Ok(30.));
}

#[test]
fn count_outgrows_the_reservoir() {
    let h = Histogram::uniform(10);
    for i in 0..100 {
        h.update(f64::from(i)).unwrap();
    }
    assert_eq!(h.count(), 100);
    assert_eq!(h.size(), 10);
}

#[test]
fn rejects_non_finite_values() {
    let h = Histogram::sliding_window(4);
    h.update(1.).unwrap();

    assert_eq!(
        h.update(std::f64::INFINITY),
        Err(Error::InvalidValue(std::f64::INFINITY))
    );
    assert!(h.update(std::f64::NEG_INFINITY).is_err());
    assert!(h.update(std::f64::NAN).is_err());

    assert_eq!(h.count(), 1);
    assert_eq!(h.snapshot().values(), &[1.]);
}

#[test]
fn repeated_snapshots_agree() {
    let h = Histogram::default();
    for i in 0..500 {
        h.update(f64::from(i % 37)).unwrap();
    }

    let a = h.snapshot();
    let b = h.snapshot();
    assert_eq!(a, b);
    assert_eq!(a.mean(), b.mean());
    assert_eq!(a.std_dev(), b.std_dev());
    assert_eq!(a.p99(), b.p99());
}

#[test]
fn debug_includes_count() {
    let h = Histogram::uniform(4);
    h.update(3.).unwrap();
    let printed = format!("{:?}", h);
    assert!(printed.starts_with("Histogram[count: 1 "));
    assert!(printed.contains("(0.5 -> 3)"));
    assert!(printed.ends_with("]"));
}

#[test]
fn huge_observations_keep_statistics_finite() {
    let h = Histogram::uniform(4);
    h.update(std::f64::MAX).unwrap();
    h.update(std::f64::MAX).unwrap();

    let snapshot = h.snapshot();
    assert_eq!(snapshot.mean(), std::f64::MAX);
    assert_eq!(snapshot.std_dev(), 0.);
}
