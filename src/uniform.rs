use std::fmt::{self, Debug};
use std::time::Instant;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

use super::*;

struct Inner {
    values: Vec<f64>,
    count: u64,
    rng: Box<dyn RngCore + Send>,
}

/// A uniform random sample over the entire stream, using Vitter's
/// Algorithm R.
pub struct UniformReservoir {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for UniformReservoir {
    fn default() -> UniformReservoir {
        UniformReservoir::new(DEFAULT_SIZE)
    }
}

impl Debug for UniformReservoir {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("UniformReservoir")
            .field("capacity", &self.capacity)
            .field("size", &inner.values.len())
            .field("seen", &inner.count)
            .finish()
    }
}

impl UniformReservoir {
    /// Create a reservoir holding at most `capacity` values.
    pub fn new(capacity: usize) -> UniformReservoir {
        UniformReservoir::with_rng(capacity, StdRng::from_entropy())
    }

    /// Create a reservoir that draws from the given random source.
    pub fn with_rng<R: RngCore + Send + 'static>(capacity: usize, rng: R) -> UniformReservoir {
        UniformReservoir {
            capacity,
            inner: Mutex::new(Inner {
                values: Vec::with_capacity(capacity),
                count: 0,
                rng: Box::new(rng),
            }),
        }
    }

    /// Maximum number of retained values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total number of observations offered so far.
    pub fn seen(&self) -> u64 {
        self.inner.lock().count
    }
}

impl Reservoir for UniformReservoir {
    fn update(&self, value: f64, _timestamp: Instant) {
        let mut inner = self.inner.lock();
        let seen = inner.count;

        if seen < self.capacity as u64 {
            inner.values.push(value);
        } else {
            let j = inner.rng.gen_range(0..=seen);
            if j < self.capacity as u64 {
                inner.values[j as usize] = value;
            }
        }

        inner.count = seen + 1;
    }

    fn values(&self) -> Vec<f64> {
        self.inner.lock().values.clone()
    }

    fn size(&self) -> usize {
        self.inner.lock().values.len()
    }
}

#[test]
fn fills_then_stays_at_capacity() {
    let r = UniformReservoir::with_rng(100, StdRng::seed_from_u64(7));
    let now = Instant::now();
    for i in 0..1000 {
        r.update(f64::from(i), now);
        assert_eq!(r.size(), (i as usize + 1).min(100));
    }
    assert_eq!(r.seen(), 1000);

    for v in r.values() {
        assert!(v >= 0. && v < 1000.);
    }
}

#[test]
fn underfilled_keeps_everything_in_order() {
    let r = UniformReservoir::with_rng(10, StdRng::seed_from_u64(1));
    let now = Instant::now();
    for i in 0..5 {
        r.update(f64::from(i), now);
    }
    assert_eq!(r.values(), vec![0., 1., 2., 3., 4.]);
}

#[test]
fn zero_capacity_accepts_updates() {
    let r = UniformReservoir::with_rng(0, StdRng::seed_from_u64(1));
    let now = Instant::now();
    for i in 0..10 {
        r.update(f64::from(i), now);
    }
    assert_eq!(r.size(), 0);
    assert_eq!(r.seen(), 10);
    assert_eq!(r.snapshot().mean(), 0.);
}

#[test]
fn same_seed_same_sample() {
    let a = UniformReservoir::with_rng(5, StdRng::seed_from_u64(42));
    let b = UniformReservoir::with_rng(5, StdRng::seed_from_u64(42));
    let now = Instant::now();
    for i in 0..100 {
        a.update(f64::from(i), now);
        b.update(f64::from(i), now);
    }
    assert_eq!(a.values(), b.values());
}

#[test]
fn each_position_equally_likely() {
    let mut counts = [0usize; 10];
    let iterations = 10_000;
    let mut seeds = StdRng::seed_from_u64(0x853c_49e6_748f_ea9b);
    let now = Instant::now();

    for _ in 0..iterations {
        let r = UniformReservoir::with_rng(1, StdRng::seed_from_u64(seeds.next_u64()));
        for i in 0..10 {
            r.update(f64::from(i), now);
        }
        counts[r.values()[0] as usize] += 1;
    }

    let expected = iterations / 10;
    for (i, &count) in counts.iter().enumerate() {
        let deviation = (count as f64 - expected as f64).abs() / expected as f64;
        assert!(
            deviation < 0.15,
            "value {} kept {} times (expected ~{})",
            i,
            count,
            expected
        );
    }
}
