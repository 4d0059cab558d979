use std::{collections::BTreeMap, time::Duration};

use serde::Serialize;

use crate::{
    histogram::LatencyHistogram,
    metric::{IterationMetric, Metric, Outcome},
};

/// The `Aggregate` trait defines how raw [`Metric`] values are collected and
/// combined into an intermediate, mergeable representation.
///
/// Aggregates store counts, sums, extremes and histograms. Derived values such
/// as averages and percentiles belong in a [`crate::Report`], which is built
/// from the final aggregate.
///
/// # Implementor notes
/// - `merge` must be **associative** and **commutative**: worker-local
///   aggregates are merged in arbitrary order.
/// - `consume` runs once per iteration on the worker's hot path, keep it cheap.
pub trait Aggregate
where
    Self: Send + Sync + Clone,
{
    /// The metric type this aggregate summarizes.
    type Metric: Metric;

    /// Create a new, empty instance of the aggregate.
    fn new() -> Self;

    /// Calls [`Aggregate::consume`] for each metric.
    fn aggregate(&mut self, metrics: &[Self::Metric]) {
        metrics.iter().for_each(|m| self.consume(m));
    }

    /// Incorporate a single metric into the aggregate.
    fn consume(&mut self, metric: &Self::Metric);

    /// Combine two different aggregates into one.
    fn merge(&mut self, other: Self);
}

/// Per-case totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CaseTally {
    pub iterations: u64,
    pub executions: u64,
    pub failed: u64,
    pub total_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    /// Iteration durations, for percentiles.
    #[serde(skip)]
    pub latency: LatencyHistogram,
}

impl CaseTally {
    fn record(&mut self, metric: &IterationMetric) {
        self.iterations += 1;
        self.executions += metric.executions as u64;
        if metric.outcome == Outcome::Failed {
            self.failed += 1;
        }
        self.total_duration += metric.duration;
        self.min_duration = Some(
            self.min_duration
                .map_or(metric.duration, |d| d.min(metric.duration)),
        );
        self.max_duration = Some(
            self.max_duration
                .map_or(metric.duration, |d| d.max(metric.duration)),
        );
        self.latency.record(metric.duration);
    }

    fn merge(&mut self, other: &CaseTally) {
        self.iterations += other.iterations;
        self.executions += other.executions;
        self.failed += other.failed;
        self.total_duration += other.total_duration;
        self.min_duration = match (self.min_duration, other.min_duration) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.max_duration = match (self.max_duration, other.max_duration) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self.latency.merge(&other.latency);
    }
}

/// Aggregate of [`IterationMetric`]s, grouped by case.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunAggregate {
    pub cases: BTreeMap<&'static str, CaseTally>,
    /// Iterations where no case could be dispatched.
    pub skipped: u64,
}

impl RunAggregate {
    pub fn iterations(&self) -> u64 {
        self.skipped + self.cases.values().map(|t| t.iterations).sum::<u64>()
    }
}

impl Aggregate for RunAggregate {
    type Metric = IterationMetric;

    fn new() -> Self {
        RunAggregate::default()
    }

    fn consume(&mut self, metric: &Self::Metric) {
        match (metric.case, metric.outcome) {
            (Some(case), Outcome::Completed | Outcome::Failed) => {
                self.cases.entry(case).or_default().record(metric)
            }
            _ => self.skipped += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        for (case, tally) in &other.cases {
            self.cases.entry(*case).or_default().merge(tally);
        }
        self.skipped += other.skipped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric(case: &'static str, millis: u64, outcome: Outcome) -> IterationMetric {
        IterationMetric {
            case: Some(case),
            executions: 1,
            duration: Duration::from_millis(millis),
            outcome,
        }
    }

    #[test]
    fn consume_groups_by_case() {
        let mut agg = RunAggregate::new();
        agg.aggregate(&[
            metric("login", 10, Outcome::Completed),
            metric("login", 30, Outcome::Failed),
            metric("logout", 5, Outcome::Completed),
            IterationMetric {
                case: None,
                executions: 0,
                duration: Duration::ZERO,
                outcome: Outcome::Skipped,
            },
        ]);

        let login = &agg.cases["login"];
        assert_eq!(login.iterations, 2);
        assert_eq!(login.failed, 1);
        assert_eq!(login.total_duration, Duration::from_millis(40));
        assert_eq!(login.min_duration, Some(Duration::from_millis(10)));
        assert_eq!(login.max_duration, Some(Duration::from_millis(30)));
        assert_eq!(login.latency.len(), 2);
        assert_eq!(agg.skipped, 1);
        assert_eq!(agg.iterations(), 4);
    }

    #[test]
    fn merge_is_order_independent() {
        let mut a = RunAggregate::new();
        a.consume(&metric("login", 10, Outcome::Completed));
        let mut b = RunAggregate::new();
        b.consume(&metric("login", 2, Outcome::Failed));
        b.consume(&metric("register", 7, Outcome::Completed));

        let mut ab = a.clone();
        ab.merge(b.clone());
        let mut ba = b;
        ba.merge(a);

        assert_eq!(ab, ba);
        assert_eq!(ab.cases["login"].min_duration, Some(Duration::from_millis(2)));
        assert_eq!(ab.iterations(), 3);
        assert_eq!(ab.cases["login"].latency.len(), 2);
    }

    #[test]
    fn merged_percentiles_see_every_worker() {
        let mut fast = RunAggregate::new();
        for _ in 0..99 {
            fast.consume(&metric("login", 10, Outcome::Completed));
        }
        let mut slow = RunAggregate::new();
        for _ in 0..11 {
            slow.consume(&metric("login", 1_500, Outcome::Completed));
        }

        fast.merge(slow);
        let latency = &fast.cases["login"].latency;
        assert_eq!(latency.len(), 110);
        assert_eq!(latency.quantile(0.50).as_millis(), 10);
        // 11 of 110 samples are slow, so p95 and p99 land on them
        assert_eq!(latency.quantile(0.95).as_millis(), 1_500);
        assert_eq!(latency.quantile(0.99).as_millis(), 1_500);
    }
}
