use std::time::Instant;

use super::*;

/// Capacity used by reservoirs built without an explicit size.
///
/// Offers a 99.9% confidence level with a 5% margin of error for a normal
/// distribution.
pub const DEFAULT_SIZE: usize = 1028;

/// A bounded-memory sample of a stream of observations.
///
/// Implementations must be safe to update from many threads at once and
/// must never retain more than their capacity.
pub trait Reservoir: Send + Sync {
    /// Offer an observation taken at `timestamp`.
    fn update(&self, value: f64, timestamp: Instant);

    /// Copy out the currently retained values, in no particular order.
    fn values(&self) -> Vec<f64>;

    /// Number of currently retained values.
    fn size(&self) -> usize {
        self.values().len()
    }

    /// Sorted view of the retained values. The copy is taken under the
    /// reservoir's lock, sorting happens after it is released.
    fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.values())
    }
}
