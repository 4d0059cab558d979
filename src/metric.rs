use std::time::Duration;

use serde::Serialize;

/// A `Metric` is a single observation produced by one iteration of a virtual
/// user.
///
/// Metrics are the most granular piece of run data. Each worker folds the
/// metrics it produces into a worker-local [`crate::Aggregate`], and the
/// aggregates are merged once the run is over.
///
/// ## Design principles
/// - **Small:** a metric is produced on every iteration, keep it cheap to build.
/// - **Comparable:** metrics support [`PartialEq`] and [`PartialOrd`] so they
///   can be sorted and compared during analysis.
/// - **Thread-safe and clonable:** metrics must be `Send`, `Sync` and `Clone`.
///
/// ## Example
/// ```rust
/// use tropel::Metric;
/// use std::time::Duration;
///
/// #[derive(Clone, PartialOrd, PartialEq)]
/// struct LatencyMetric {
///     latency: Duration,
/// }
/// impl Metric for LatencyMetric {}
/// ```
pub trait Metric
where
    Self: PartialOrd + PartialEq + Send + Sync + Clone,
{
}

/// How an iteration ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every executed behavior returned `Ok`. Checks may still have failed.
    Completed,
    /// At least one executed behavior returned an error.
    Failed,
    /// No case could be dispatched.
    Skipped,
}

/// The metric produced by [`crate::VirtualUser::run_iteration`].
#[derive(Debug, Clone, PartialEq, PartialOrd, Serialize)]
pub struct IterationMetric {
    /// Name of the dispatched case, `None` when nothing was dispatched.
    pub case: Option<&'static str>,
    /// Number of behaviors executed. Only dispatch by name runs more than one.
    pub executions: usize,
    pub duration: Duration,
    pub outcome: Outcome,
}

impl Metric for IterationMetric {}
