//! In-memory histograms of refresh cycle phase durations.
//! Values stored in milliseconds.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;

/// p50 / p95 / p99 in milliseconds; `None` when nothing was recorded.
pub type Percentiles = (Option<u64>, Option<u64>, Option<u64>);

pub struct CycleTimings {
    collect: Mutex<Histogram<u64>>,
    aggregate: Mutex<Histogram<u64>>,
}

impl CycleTimings {
    /// Tracks 1ms to 24h, 3 significant figures.
    pub fn new() -> Self {
        let histogram = || {
            Histogram::new_with_bounds(1, 86_400_000, 3).expect("valid histogram bounds")
        };
        Self {
            collect: Mutex::new(histogram()),
            aggregate: Mutex::new(histogram()),
        }
    }

    pub fn record_collect(&self, d: Duration) {
        record(&self.collect, d);
    }

    pub fn record_aggregate(&self, d: Duration) {
        record(&self.aggregate, d);
    }

    pub fn collect_percentiles(&self) -> Percentiles {
        percentiles(&self.collect)
    }

    pub fn aggregate_percentiles(&self) -> Percentiles {
        percentiles(&self.aggregate)
    }

    /// Number of recorded cycles.
    pub fn len(&self) -> u64 {
        self.collect.lock().map(|h| h.len()).unwrap_or(0)
    }
}

impl Default for CycleTimings {
    fn default() -> Self {
        Self::new()
    }
}

fn record(h: &Mutex<Histogram<u64>>, d: Duration) {
    // Sub-millisecond phases still count as one sample at the floor.
    let ms = d.as_millis().clamp(1, u128::from(u64::MAX)) as u64;
    if let Ok(mut h) = h.lock() {
        h.saturating_record(ms);
    }
}

fn percentiles(h: &Mutex<Histogram<u64>>) -> Percentiles {
    let Ok(h) = h.lock() else {
        return (None, None, None);
    };
    if h.len() == 0 {
        return (None, None, None);
    }
    (
        Some(h.value_at_quantile(0.5)),
        Some(h.value_at_quantile(0.95)),
        Some(h.value_at_quantile(0.99)),
    )
}
