//! A lock-free registry of named metrics.
//!
//! The name map is immutable once published. Readers pin an epoch and look
//! names up without locking; writers copy the current map, apply their change
//! and publish it with a single compare-and-swap, retrying if another writer
//! got there first. Replaced maps are reclaimed once no reader can observe
//! them.

use std::collections::{BTreeSet, HashMap};
use std::fmt::{self, Debug};
use std::sync::atomic::Ordering::{AcqRel, Acquire};
use std::sync::Arc;

use crossbeam_epoch::{self as epoch, Atomic, Owned};
use tracing::debug;

use super::*;

type Map = HashMap<String, Metric>;

enum Step<R> {
    Done(R),
    Publish(Map, R),
}

/// Maps metric names to metric instances, at most one instance per name.
pub struct Registry {
    map: Atomic<Map>,
}

/// A registry shared between the parts of an application.
pub type SharedRegistry = Arc<Registry>;

/// Create a new empty registry behind an `Arc`.
pub fn new_shared_registry() -> SharedRegistry {
    Arc::new(Registry::new())
}

impl Default for Registry {
    fn default() -> Registry {
        Registry {
            map: Atomic::new(Map::new()),
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        unsafe {
            let guard = epoch::unprotected();
            let map = self.map.load(Acquire, guard);
            drop(map.into_owned());
        }
    }
}

impl Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Registry")
            .field("names", &self.names())
            .finish()
    }
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Registry {
        Registry::default()
    }

    /// Return the metric bound to `name`, creating it with `factory` if
    /// absent.
    ///
    /// The factory runs at most once per call. When several callers race on
    /// the same new name each may build a candidate, but only one is
    /// published and every caller receives that one.
    pub fn get_or_create<F>(&self, name: &str, factory: F) -> Metric
    where
        F: FnOnce() -> Metric,
    {
        if let Some(existing) = self.get(name) {
            return existing;
        }

        let candidate = factory();
        let metric = self.transact(|map| match map.get(name) {
            Some(existing) => Step::Done(existing.clone()),
            None => {
                let mut next = map.clone();
                next.insert(name.to_owned(), candidate.clone());
                Step::Publish(next, candidate.clone())
            }
        });

        if metric.ptr_eq(&candidate) {
            debug!(name, kind = metric.kind(), "registered metric");
        }
        metric
    }

    /// Bind `metric` to `name`.
    ///
    /// Registering the instance already bound to `name` is a no-op; any
    /// other instance fails with [`Error::AlreadyRegistered`].
    pub fn register(&self, name: &str, metric: Metric) -> crate::Result<Metric> {
        self.transact(|map| match map.get(name) {
            Some(existing) if existing.ptr_eq(&metric) => Step::Done(Ok(existing.clone())),
            Some(_) => Step::Done(Err(Error::AlreadyRegistered(name.to_owned()))),
            None => {
                let mut next = map.clone();
                next.insert(name.to_owned(), metric.clone());
                Step::Publish(next, Ok(metric.clone()))
            }
        })
        .map(|metric| {
            debug!(name, kind = metric.kind(), "registered metric");
            metric
        })
    }

    /// Unbind `name`, returning whether anything was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.transact(|map| {
            if !map.contains_key(name) {
                return Step::Done(false);
            }
            let mut next = map.clone();
            next.remove(name);
            Step::Publish(next, true)
        });

        if removed {
            debug!(name, "removed metric");
        }
        removed
    }

    pub fn get(&self, name: &str) -> Option<Metric> {
        self.read(|map| map.get(name).cloned())
    }

    /// All registered names.
    pub fn names(&self) -> BTreeSet<String> {
        self.read(|map| map.keys().cloned().collect())
    }

    /// Every registered metric, sorted by name.
    pub fn metrics(&self) -> Vec<(String, Metric)> {
        let mut all: Vec<(String, Metric)> =
            self.read(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    pub fn len(&self) -> usize {
        self.read(|map| map.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The histogram bound to `name`, creating an exponentially decaying
    /// one if absent.
    pub fn histogram(&self, name: &str) -> crate::Result<Arc<Histogram>> {
        self.histogram_with(name, Histogram::default)
    }

    /// The histogram bound to `name`, creating it with `factory` if absent.
    pub fn histogram_with<F>(&self, name: &str, factory: F) -> crate::Result<Arc<Histogram>>
    where
        F: FnOnce() -> Histogram,
    {
        let metric = self.get_or_create(name, || Metric::from(factory()));
        metric.as_histogram().cloned().ok_or_else(|| Error::TypeMismatch {
            name: name.to_owned(),
            expected: "histogram",
        })
    }

    /// The counter bound to `name`, creating it if absent.
    pub fn counter(&self, name: &str) -> crate::Result<Arc<Counter>> {
        let metric = self.get_or_create(name, || Metric::from(Counter::new()));
        metric.as_counter().cloned().ok_or_else(|| Error::TypeMismatch {
            name: name.to_owned(),
            expected: "counter",
        })
    }

    fn read<R, F: FnOnce(&Map) -> R>(&self, f: F) -> R {
        let guard = epoch::pin();
        let current = self.map.load(Acquire, &guard);
        // the map pointer is set at construction and only ever swapped
        let map = unsafe { current.deref() };
        f(map)
    }

    fn transact<R, F: FnMut(&Map) -> Step<R>>(&self, mut f: F) -> R {
        let guard = epoch::pin();
        loop {
            let current = self.map.load(Acquire, &guard);
            let map = unsafe { current.deref() };

            let (next, ret) = match f(map) {
                Step::Done(ret) => return ret,
                Step::Publish(next, ret) => (next, ret),
            };

            let cas = self
                .map
                .compare_exchange(current, Owned::new(next), AcqRel, Acquire, &guard);
            if cas.is_ok() {
                // CAS worked, the old map goes once all readers unpin
                unsafe {
                    guard.defer_destroy(current);
                }
                return ret;
            }
            // another writer beat us, retry against its map
        }
    }
}

#[test]
fn get_or_create_reuses_instances() {
    let registry = Registry::new();
    let a = registry.get_or_create("requests", || Metric::from(Counter::new()));
    let b = registry.get_or_create("requests", || panic!("factory must not run twice"));

    assert!(a.ptr_eq(&b));
    assert_eq!(registry.len(), 1);
}

#[test]
fn register_rejects_other_instances() {
    let registry = Registry::new();
    let first = Metric::from(Counter::new());

    assert!(registry.register("x", first.clone()).is_ok());
    assert!(registry.register("x", first.clone()).is_ok());
    assert_eq!(
        registry.register("x", Metric::from(Counter::new())).unwrap_err(),
        Error::AlreadyRegistered("x".to_owned())
    );
    assert!(registry.get("x").unwrap().ptr_eq(&first));
}

#[test]
fn remove_unbinds_names() {
    let registry = Registry::new();
    registry.counter("a").unwrap();
    registry.histogram("b").unwrap();

    assert!(registry.remove("a"));
    assert!(!registry.remove("a"));
    assert!(!registry.remove("missing"));

    let names: Vec<String> = registry.names().into_iter().collect();
    assert_eq!(names, vec!["b".to_owned()]);
    assert!(registry.get("a").is_none());
}

#[test]
fn typed_helpers_check_the_kind() {
    let registry = Registry::new();
    let c = registry.counter("hits").unwrap();
    c.inc();

    assert_eq!(registry.counter("hits").unwrap().count(), 1);
    assert_eq!(
        registry.histogram("hits").unwrap_err(),
        Error::TypeMismatch {
            name: "hits".to_owned(),
            expected: "histogram",
        }
    );
}

#[test]
fn metrics_are_listed_by_name() {
    let registry = Registry::new();
    registry.histogram_with("z", || Histogram::uniform(8)).unwrap();
    registry.counter("a").unwrap();
    registry.counter("m").unwrap();

    let names: Vec<String> = registry.metrics().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["a", "m", "z"]);
    assert!(!registry.is_empty());
}
