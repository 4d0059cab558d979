//! Mergeable latency distribution backed by an HDR histogram.
use std::{fmt, time::Duration};

use hdrhistogram::Histogram;

/// Lowest trackable latency, in microseconds.
const LOWEST: u64 = 1;
/// Highest trackable latency, one hour in microseconds. Longer samples are
/// clamped to it.
const HIGHEST: u64 = 3_600_000_000;
const SIGNIFICANT_DIGITS: u8 = 3;

/// Latency samples at microsecond resolution, three significant digits.
///
/// Every instance shares the same bounds, so two histograms always merge.
#[derive(Clone)]
pub struct LatencyHistogram {
    inner: Histogram<u64>,
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyHistogram {
    pub fn new() -> Self {
        Self {
            inner: Histogram::new_with_bounds(LOWEST, HIGHEST, SIGNIFICANT_DIGITS)
                .expect("constant histogram bounds are valid"),
        }
    }

    pub fn record(&mut self, latency: Duration) {
        let micros = u64::try_from(latency.as_micros()).unwrap_or(u64::MAX);
        self.inner.saturating_record(micros.max(LOWEST));
    }

    pub fn merge(&mut self, other: &LatencyHistogram) {
        if let Err(e) = self.inner.add(&other.inner) {
            tracing::warn!("Dropping latency samples that could not be merged: {e:?}");
        }
    }

    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Latency at `quantile` in `[0, 1]`, `Duration::ZERO` when empty.
    pub fn quantile(&self, quantile: f64) -> Duration {
        if self.is_empty() {
            return Duration::ZERO;
        }
        Duration::from_micros(self.inner.value_at_quantile(quantile.clamp(0.0, 1.0)))
    }
}

impl PartialEq for LatencyHistogram {
    fn eq(&self, other: &Self) -> bool {
        let recorded = |h: &Histogram<u64>| {
            h.iter_recorded()
                .map(|v| (v.value_iterated_to(), v.count_at_value()))
                .collect::<Vec<_>>()
        };
        self.len() == other.len() && recorded(&self.inner) == recorded(&other.inner)
    }
}

impl fmt::Debug for LatencyHistogram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LatencyHistogram")
            .field("len", &self.len())
            .field("p50", &self.quantile(0.50))
            .field("p99", &self.quantile(0.99))
            .finish()
    }
}
