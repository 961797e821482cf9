use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use super::*;

/// A signed count that can be incremented and decremented.
#[derive(Debug, Default)]
pub struct Counter {
    count: AtomicI64,
}

impl Counter {
    pub fn new() -> Counter {
        Counter::default()
    }

    pub fn inc(&self) {
        self.inc_by(1);
    }

    pub fn inc_by(&self, n: i64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.dec_by(1);
    }

    pub fn dec_by(&self, n: i64) {
        self.count.fetch_sub(n, Ordering::Relaxed);
    }

    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Relaxed)
    }
}

/// A registered metric. Clones share the same underlying instance.
#[derive(Debug, Clone)]
pub enum Metric {
    Counter(Arc<Counter>),
    Histogram(Arc<Histogram>),
}

impl Metric {
    /// Human-readable kind, used in type mismatch errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Metric::Counter(_) => "counter",
            Metric::Histogram(_) => "histogram",
        }
    }

    /// Whether both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Metric) -> bool {
        match (self, other) {
            (Metric::Counter(a), Metric::Counter(b)) => Arc::ptr_eq(a, b),
            (Metric::Histogram(a), Metric::Histogram(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn as_counter(&self) -> Option<&Arc<Counter>> {
        match self {
            Metric::Counter(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_histogram(&self) -> Option<&Arc<Histogram>> {
        match self {
            Metric::Histogram(h) => Some(h),
            _ => None,
        }
    }
}

impl From<Counter> for Metric {
    fn from(counter: Counter) -> Metric {
        Metric::Counter(Arc::new(counter))
    }
}

impl From<Histogram> for Metric {
    fn from(histogram: Histogram) -> Metric {
        Metric::Histogram(Arc::new(histogram))
    }
}

impl From<Arc<Counter>> for Metric {
    fn from(counter: Arc<Counter>) -> Metric {
        Metric::Counter(counter)
    }
}

impl From<Arc<Histogram>> for Metric {
    fn from(histogram: Arc<Histogram>) -> Metric {
        Metric::Histogram(histogram)
    }
}

#[test]
fn counter_moves_both_ways() {
    let c = Counter::new();
    c.inc();
    c.inc_by(5);
    c.dec();
    c.dec_by(10);
    assert_eq!(c.count(), -5);
}

#[test]
fn counter_sees_every_thread() {
    let c = Arc::new(Counter::new());
    let threads: Vec<_> = (0..4)
        .map(|_| {
            let c = c.clone();
            std::thread::spawn(move || {
                for _ in 0..1000 {
                    c.inc();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }
    assert_eq!(c.count(), 4000);
}

#[test]
fn identity_is_by_instance() {
    let a = Metric::from(Counter::new());
    let b = a.clone();
    let c = Metric::from(Counter::new());
    let h = Metric::from(Histogram::uniform(1));

    assert!(a.ptr_eq(&b));
    assert!(!a.ptr_eq(&c));
    assert!(!a.ptr_eq(&h));
    assert_eq!(h.kind(), "histogram");
    assert!(h.as_histogram().is_some());
    assert!(h.as_counter().is_none());
}
