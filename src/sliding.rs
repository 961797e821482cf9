use std::time::Instant;

use parking_lot::Mutex;

use super::*;

#[derive(Debug)]
struct Inner {
    values: Vec<f64>,
    count: u64,
}

/// Keeps only the most recent `capacity` observations.
#[derive(Debug)]
pub struct SlidingWindowReservoir {
    capacity: usize,
    inner: Mutex<Inner>,
}

impl Default for SlidingWindowReservoir {
    fn default() -> SlidingWindowReservoir {
        SlidingWindowReservoir::new(DEFAULT_SIZE)
    }
}

impl SlidingWindowReservoir {
    pub fn new(capacity: usize) -> SlidingWindowReservoir {
        SlidingWindowReservoir {
            capacity,
            inner: Mutex::new(Inner {
                values: Vec::with_capacity(capacity),
                count: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Reservoir for SlidingWindowReservoir {
    fn update(&self, value: f64, _timestamp: Instant) {
        if self.capacity == 0 {
            return;
        }

        let mut inner = self.inner.lock();
        let slot = (inner.count % self.capacity as u64) as usize;
        if slot < inner.values.len() {
            inner.values[slot] = value;
        } else {
            inner.values.push(value);
        }
        inner.count += 1;
    }

    fn values(&self) -> Vec<f64> {
        self.inner.lock().values.clone()
    }

    fn size(&self) -> usize {
        self.inner.lock().values.len()
    }
}

#[test]
fn keeps_the_newest_values() {
    let r = SlidingWindowReservoir::new(3);
    let now = Instant::now();
    for i in 1..=7 {
        r.update(f64::from(i), now);
    }
    assert_eq!(r.size(), 3);
    assert_eq!(r.snapshot().values(), &[5., 6., 7.]);
}

#[test]
fn underfilled_window() {
    let r = SlidingWindowReservoir::new(10);
    let now = Instant::now();
    r.update(2., now);
    r.update(1., now);
    assert_eq!(r.values(), vec![2., 1.]);
}

#[test]
fn zero_capacity_window() {
    let r = SlidingWindowReservoir::new(0);
    r.update(1., Instant::now());
    assert_eq!(r.size(), 0);
}
