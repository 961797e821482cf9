//! Reservoir-sampling histograms and a lock-free registry of named metrics.
//!
//! A [`Histogram`] forwards every accepted observation into a [`Reservoir`]
//! and counts it. A [`Snapshot`] taken from the histogram answers mean,
//! standard deviation, min, max and percentile queries over the values the
//! reservoir retained. The [`Registry`] binds names to metrics, publishing at
//! most one instance per name even when threads race to create it.
//!
//! ```
//! use reservoir_metrics::{Histogram, Registry};
//!
//! let registry = Registry::new();
//! let latency = registry
//!     .histogram_with("latency", || Histogram::uniform(5))
//!     .unwrap();
//!
//! for v in &[10., 20., 30., 40., 50.] {
//!     latency.update(*v).unwrap();
//! }
//!
//! let snapshot = latency.snapshot();
//! assert_eq!(latency.count(), 5);
//! assert_eq!(snapshot.percentile(0.5), Ok(30.));
//! ```

pub use decaying::{
    DecayConfig, ExponentiallyDecayingReservoir, DEFAULT_ALPHA, DEFAULT_RESCALE_INTERVAL,
};
pub use error::{Error, Result};
pub use histo::Histogram;
pub use metric::{Counter, Metric};
pub use registry::{new_shared_registry, Registry, SharedRegistry};
pub use reservoir::{Reservoir, DEFAULT_SIZE};
pub use sliding::SlidingWindowReservoir;
pub use snapshot::Snapshot;
pub use uniform::UniformReservoir;

mod decaying;
mod error;
mod histo;
mod metric;
mod registry;
mod reservoir;
mod sliding;
mod snapshot;
mod uniform;
