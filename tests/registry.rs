//! Concurrent behavior of the metric registry.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use reservoir_metrics::{new_shared_registry, Counter, Error, Histogram, Metric};

#[test]
fn racing_callers_share_one_instance() {
    let registry = new_shared_registry();
    let barrier = Arc::new(Barrier::new(2));

    let spawn = |use_histogram: bool| {
        let registry = registry.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            if use_histogram {
                registry.get_or_create("x", || Metric::from(Histogram::uniform(4)))
            } else {
                registry.get_or_create("x", || Metric::from(Counter::new()))
            }
        })
    };

    let a = spawn(true);
    let b = spawn(false);
    let a = a.join().unwrap();
    let b = b.join().unwrap();

    assert!(a.ptr_eq(&b));
    assert!(registry.get("x").unwrap().ptr_eq(&a));
    let names: Vec<String> = registry.names().into_iter().collect();
    assert_eq!(names, vec!["x".to_owned()]);
}

#[test]
fn racing_registrations_have_one_winner() {
    const THREADS: usize = 8;

    let registry = new_shared_registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let mine = Metric::from(Counter::new());
                barrier.wait();
                (mine.clone(), registry.register("x", mine))
            })
        })
        .collect();

    let outcomes: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&Metric> = outcomes
        .iter()
        .filter(|(_, result)| result.is_ok())
        .map(|(mine, _)| mine)
        .collect();
    assert_eq!(winners.len(), 1);

    for (_, result) in &outcomes {
        if let Err(e) = result {
            assert_eq!(*e, Error::AlreadyRegistered("x".to_owned()));
        }
    }
    assert!(registry.get("x").unwrap().ptr_eq(winners[0]));
    assert_eq!(registry.len(), 1);
}

#[test]
fn many_threads_many_names() {
    const THREADS: usize = 8;
    const NAMES: usize = 64;

    let registry = new_shared_registry();
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let registry = registry.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                (0..NAMES)
                    .map(|i| {
                        let counter = registry.counter(&format!("counter.{}", i)).unwrap();
                        counter.inc();
                        counter
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let results: Vec<Vec<Arc<Counter>>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(registry.len(), NAMES);
    for i in 0..NAMES {
        let published = registry.counter(&format!("counter.{}", i)).unwrap();
        for per_thread in &results {
            assert!(Arc::ptr_eq(&published, &per_thread[i]));
        }
        assert_eq!(published.count(), THREADS as i64);
    }
}

#[test]
fn factories_run_at_most_once_per_caller() {
    let registry = new_shared_registry();
    let runs = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let registry = registry.clone();
            let runs = runs.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..100 {
                    registry.get_or_create("shared", || {
                        runs.fetch_add(1, Ordering::SeqCst);
                        Metric::from(Counter::new())
                    });
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let runs = runs.load(Ordering::SeqCst);
    assert!(runs >= 1 && runs <= 4, "factory ran {} times", runs);
    assert_eq!(registry.len(), 1);
}

#[test]
fn removal_races_with_creation() {
    let registry = new_shared_registry();

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let registry = registry.clone();
            thread::spawn(move || {
                for i in 0..200 {
                    let name = format!("m.{}", i % 10);
                    if (i + t) % 3 == 0 {
                        registry.remove(&name);
                    } else {
                        registry.counter(&name).unwrap();
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let names = registry.names();
    assert!(names.len() <= 10);
    assert_eq!(names.len(), registry.len());
    for name in names {
        assert!(registry.get(&name).is_some());
    }
}
