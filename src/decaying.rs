use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::time::{Duration, Instant};

use ordered_float::OrderedFloat;
use parking_lot::Mutex;
use rand::distributions::Open01;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use tracing::trace;

use super::*;

/// Decay factor used by reservoirs built without an explicit config.
///
/// Heavily biases the sample toward the last five minutes of observations.
pub const DEFAULT_ALPHA: f64 = 0.015;

/// How long priorities may grow before they are rescaled.
pub const DEFAULT_RESCALE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Sizing and decay parameters for an [`ExponentiallyDecayingReservoir`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecayConfig {
    /// Maximum number of retained values.
    pub size: usize,
    /// Exponential decay factor per second. Higher is more biased toward
    /// recent values; zero disables decay.
    pub alpha: f64,
    /// Interval after which priorities are rescaled to a new landmark.
    pub rescale_interval: Duration,
}

impl Default for DecayConfig {
    fn default() -> DecayConfig {
        DecayConfig {
            size: DEFAULT_SIZE,
            alpha: DEFAULT_ALPHA,
            rescale_interval: DEFAULT_RESCALE_INTERVAL,
        }
    }
}

impl DecayConfig {
    #[must_use]
    pub fn with_size(mut self, size: usize) -> DecayConfig {
        self.size = size;
        self
    }

    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> DecayConfig {
        self.alpha = alpha;
        self
    }

    #[must_use]
    pub fn with_rescale_interval(mut self, interval: Duration) -> DecayConfig {
        self.rescale_interval = interval;
        self
    }
}

// Priorities may tie (most visibly after a rescale underflows them all to
// zero), so every entry also carries its insertion sequence.
type Key = (OrderedFloat<f64>, u64);

struct Inner {
    values: BTreeMap<Key, f64>,
    start: Instant,
    // None when the interval runs past what an Instant can represent
    next_rescale: Option<Instant>,
    sequence: u64,
    rng: Box<dyn RngCore + Send>,
}

/// A forward-decaying priority sample, biased toward recent observations.
///
/// Each observation is kept with priority `exp(alpha * (t - t0)) / u` for a
/// uniform `u` in `(0, 1)`, and only the `size` highest priorities survive.
/// See Cormode et al., "Forward Decay: A Practical Time Decay Model for
/// Streaming Systems".
pub struct ExponentiallyDecayingReservoir {
    config: DecayConfig,
    inner: Mutex<Inner>,
}

impl Default for ExponentiallyDecayingReservoir {
    fn default() -> ExponentiallyDecayingReservoir {
        ExponentiallyDecayingReservoir::new(DecayConfig::default())
    }
}

impl Debug for ExponentiallyDecayingReservoir {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("ExponentiallyDecayingReservoir")
            .field("config", &self.config)
            .field("size", &inner.values.len())
            .finish()
    }
}

impl ExponentiallyDecayingReservoir {
    pub fn new(config: DecayConfig) -> ExponentiallyDecayingReservoir {
        ExponentiallyDecayingReservoir::with_rng(config, StdRng::from_entropy())
    }

    /// Create a reservoir that draws from the given random source, with its
    /// landmark at the current instant.
    pub fn with_rng<R: RngCore + Send + 'static>(
        config: DecayConfig,
        rng: R,
    ) -> ExponentiallyDecayingReservoir {
        ExponentiallyDecayingReservoir::starting_at(config, rng, Instant::now())
    }

    /// Create a reservoir whose landmark `t0` is `start`.
    pub fn starting_at<R: RngCore + Send + 'static>(
        config: DecayConfig,
        rng: R,
        start: Instant,
    ) -> ExponentiallyDecayingReservoir {
        ExponentiallyDecayingReservoir {
            config,
            inner: Mutex::new(Inner {
                values: BTreeMap::new(),
                start,
                next_rescale: start.checked_add(config.rescale_interval),
                sequence: 0,
                rng: Box::new(rng),
            }),
        }
    }

    pub fn config(&self) -> DecayConfig {
        self.config
    }

    /// The current landmark all priorities are relative to.
    pub fn landmark(&self) -> Instant {
        self.inner.lock().start
    }

    fn weight(&self, start: Instant, timestamp: Instant) -> f64 {
        (self.config.alpha * signed_secs(start, timestamp)).exp()
    }
}

impl Inner {
    fn rescale(&mut self, now: Instant, alpha: f64, interval: Duration) {
        let old_start = self.start;
        self.start = now;
        self.next_rescale = now.checked_add(interval);

        let factor = (-alpha * signed_secs(old_start, now)).exp();
        let values = std::mem::take(&mut self.values);
        self.values = values
            .into_iter()
            .map(|((priority, seq), value)| ((sanitize(priority.0 * factor), seq), value))
            .collect();

        trace!(
            factor,
            retained = self.values.len(),
            "rescaled decaying reservoir"
        );
    }
}

impl Reservoir for ExponentiallyDecayingReservoir {
    fn update(&self, value: f64, timestamp: Instant) {
        let mut inner = self.inner.lock();

        if inner.next_rescale.map_or(false, |next| timestamp >= next) {
            inner.rescale(timestamp, self.config.alpha, self.config.rescale_interval);
        }

        if self.config.size == 0 {
            return;
        }

        let u: f64 = inner.rng.sample(Open01);
        let priority = sanitize(self.weight(inner.start, timestamp) / u);
        let key = (priority, inner.sequence);
        inner.sequence += 1;

        if inner.values.len() < self.config.size {
            inner.values.insert(key, value);
            return;
        }

        let first = match inner.values.keys().next() {
            Some(first) => *first,
            None => return,
        };
        if first.0 < priority {
            inner.values.remove(&first);
            inner.values.insert(key, value);
        }
    }

    fn values(&self) -> Vec<f64> {
        self.inner.lock().values.values().copied().collect()
    }

    fn size(&self) -> usize {
        self.inner.lock().values.len()
    }
}

// Seconds from `start` to `t`, negative when `t` precedes `start`.
fn signed_secs(start: Instant, t: Instant) -> f64 {
    match t.checked_duration_since(start) {
        Some(elapsed) => elapsed.as_secs_f64(),
        None => -start.duration_since(t).as_secs_f64(),
    }
}

fn sanitize(priority: f64) -> OrderedFloat<f64> {
    if priority.is_nan() {
        OrderedFloat(0.)
    } else {
        OrderedFloat(priority)
    }
}

#[cfg(test)]
fn seeded(config: DecayConfig, start: Instant) -> ExponentiallyDecayingReservoir {
    ExponentiallyDecayingReservoir::starting_at(config, StdRng::seed_from_u64(0xdecaf), start)
}

#[test]
fn a_reservoir_of_100_out_of_1000_elements() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(100).with_alpha(0.99), start);
    for i in 0..1000 {
        r.update(f64::from(i), start);
    }

    assert_eq!(r.size(), 100);
    for v in r.values() {
        assert!(v >= 0. && v < 1000.);
    }
}

#[test]
fn a_reservoir_of_100_out_of_10_elements() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(100).with_alpha(0.99), start);
    for i in 0..10 {
        r.update(f64::from(i), start);
    }

    let snapshot = r.snapshot();
    assert_eq!(snapshot.size(), 10);
    assert_eq!(snapshot.min(), 0.);
    assert_eq!(snapshot.max(), 9.);
}

#[test]
fn stays_bounded_with_increasing_timestamps() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(10), start);
    for i in 0..15u32 {
        r.update(f64::from(i), start + Duration::from_millis(u64::from(i) * 100));
    }
    assert_eq!(r.size(), 10);
}

#[test]
fn long_periods_of_inactivity_keep_the_sample_size() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(10), start);
    let mut now = start;

    let delta = Duration::from_millis(100);
    for i in 0..1000 {
        now += delta;
        r.update(f64::from(1000 + i), now);
    }
    assert_eq!(r.size(), 10);

    // 15 hours later every old priority underflows to zero on rescale
    now += Duration::from_secs(15 * 60 * 60);
    r.update(2000., now);
    assert_eq!(r.landmark(), now);
    assert_eq!(r.size(), 10);
    assert!(r.values().contains(&2000.));

    for i in 0..1000 {
        now += delta;
        r.update(f64::from(3000 + i), now);
    }
    let snapshot = r.snapshot();
    assert_eq!(snapshot.size(), 10);
    assert!(snapshot.min() >= 2000.);
}

#[test]
fn recent_values_dominate_after_a_shift() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(1000), start);
    let mut now = start;

    let interval = Duration::from_secs(6);
    for _ in 0..120 * 10 {
        r.update(177., now);
        now += interval;
    }
    for _ in 0..10 * 10 {
        r.update(9999., now);
        now += interval;
    }

    let recent = r.values().into_iter().filter(|v| *v == 9999.).count();
    assert!(recent >= 90, "only {} recent values retained", recent);
    assert_eq!(r.snapshot().p99(), 9999.);
}

#[test]
fn timestamps_before_the_landmark_are_accepted() {
    let early = Instant::now();
    let start = early + Duration::from_secs(30);
    let r = seeded(DecayConfig::default().with_size(4), start);
    r.update(1., early);
    r.update(2., start);
    assert_eq!(r.size(), 2);

    let later = start + DEFAULT_RESCALE_INTERVAL + Duration::from_secs(1);
    r.update(3., later);
    r.update(4., early);
    assert_eq!(r.size(), 4);
}

#[test]
fn zero_size_is_a_no_op() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(0), start);
    r.update(1., start);
    r.update(2., start + DEFAULT_RESCALE_INTERVAL);
    assert_eq!(r.size(), 0);
}

#[test]
fn zero_alpha_is_still_bounded() {
    let start = Instant::now();
    let r = seeded(DecayConfig::default().with_size(50).with_alpha(0.), start);
    for i in 0..500 {
        r.update(f64::from(i), start + Duration::from_secs(i as u64));
    }
    assert_eq!(r.size(), 50);
}

#[test]
fn unbounded_rescale_interval_never_rescales() {
    let start = Instant::now();
    let config = DecayConfig::default()
        .with_size(4)
        .with_rescale_interval(Duration::MAX);
    let r = seeded(config, start);

    for i in 0..10u32 {
        r.update(f64::from(i), start + Duration::from_secs(u64::from(i) * 3600));
    }
    assert_eq!(r.size(), 4);
    assert_eq!(r.landmark(), start);
}
