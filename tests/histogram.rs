//! Statistical and cross-module properties of histograms and reservoirs.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use reservoir_metrics::{
    DecayConfig, ExponentiallyDecayingReservoir, Histogram, Reservoir, UniformReservoir,
};

#[test]
fn five_values_into_a_uniform_reservoir() {
    let h = Histogram::uniform(5);
    for v in &[10., 20., 30., 40., 50.] {
        h.update(*v).unwrap();
    }

    assert_eq!(h.count(), 5);
    assert_eq!(h.snapshot().mean(), 30.);
    assert_eq!(h.snapshot().min(), 10.);
    assert_eq!(h.snapshot().max(), 50.);
    assert_eq!(h.snapshot().percentile(0.5), Ok(30.));
}

#[test]
fn uniform_reservoir_retains_exactly_its_capacity() {
    let mut rng = StdRng::seed_from_u64(3);
    for &(k, n) in &[(1usize, 2u32), (10, 11), (100, 1000), (7, 5000)] {
        let h = Histogram::new(UniformReservoir::with_rng(k, StdRng::seed_from_u64(rng.gen())));
        for _ in 0..n {
            h.update(rng.gen_range(-1e6..1e6)).unwrap();
        }
        assert_eq!(h.size(), k);
        assert_eq!(h.count(), u64::from(n));
    }
}

#[test]
fn uniform_sample_mean_tracks_the_stream() {
    let mut values = StdRng::seed_from_u64(0x5eed);
    let mut means = Vec::new();

    for trial in 0..20u64 {
        let h = Histogram::new(UniformReservoir::with_rng(1000, StdRng::seed_from_u64(trial)));
        for _ in 0..10_000 {
            h.update(values.gen_range(0.0..100.0)).unwrap();
        }

        let mean = h.snapshot().mean();
        assert!((mean - 50.).abs() < 4., "trial {} mean {}", trial, mean);
        means.push(mean);
    }

    let overall = means.iter().sum::<f64>() / means.len() as f64;
    assert!((overall - 50.).abs() < 1.5, "overall mean {}", overall);
}

#[test]
fn percentile_extremes_are_min_and_max() {
    let mut rng = StdRng::seed_from_u64(11);
    for size in 1..50 {
        let h = Histogram::uniform(size);
        for _ in 0..size * 3 {
            h.update(rng.gen_range(-50.0..50.0)).unwrap();
        }
        let s = h.snapshot();
        assert_eq!(s.percentile(0.), Ok(s.min()));
        assert_eq!(s.percentile(1.), Ok(s.max()));
    }
}

#[test]
fn decaying_reservoir_survives_a_rescale() {
    let start = Instant::now();
    let n = 20;
    let config = DecayConfig::default().with_size(n);
    let r = ExponentiallyDecayingReservoir::starting_at(config, StdRng::seed_from_u64(9), start);
    let h = Histogram::new(r);

    for i in 0..(n + 5) as u32 {
        h.update_at(f64::from(i), start + Duration::from_secs(u64::from(i)))
            .unwrap();
    }
    assert_eq!(h.size(), n);

    let later = start + config.rescale_interval + Duration::from_secs(60);
    h.update_at(1e3, later).unwrap();
    assert_eq!(h.size(), n);
    assert_eq!(h.count(), (n + 6) as u64);
}

#[test]
fn concurrent_updates_are_all_counted() {
    let h = Arc::new(Histogram::uniform(64));
    let threads: Vec<_> = (0..8)
        .map(|t| {
            let h = h.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    h.update(f64::from(t * 10_000 + i)).unwrap();
                }
            })
        })
        .collect();

    for t in threads {
        t.join().unwrap();
    }

    assert_eq!(h.count(), 80_000);
    assert_eq!(h.size(), 64);
    let s = h.snapshot();
    assert!(s.min() >= 0. && s.max() < 80_000.);
}

#[test]
fn snapshots_do_not_disturb_the_reservoir() {
    let r = UniformReservoir::with_rng(16, StdRng::seed_from_u64(5));
    let now = Instant::now();
    for i in 0..100 {
        r.update(f64::from(i), now);
    }

    let before = r.values();
    let first = r.snapshot();
    let second = r.snapshot();
    assert_eq!(r.values(), before);
    assert_eq!(first, second);
}
