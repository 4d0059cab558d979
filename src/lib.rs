//! Tropel: a small harness for scheduling weighted test cases across virtual
//! users.
//!
//! A suite registers its behaviors as cases in a [`CaseSet`], each with a
//! relative weight and an execution counter. Every iteration of a
//! [`VirtualUser`] dispatches one case from that set, either by weighted
//! random draw, round robin, or by name. Suites that need existing accounts
//! draw them from an [`IdentityPool`], which registration behaviors grow at
//! runtime.
//!
//! # Architecture
//!
//! - [`CaseSet`]: the case registry and its three dispatch policies.
//! - [`VirtualUser`]: one simulated user; a call to `run_iteration` runs one
//!   dispatch and reports an [`IterationMetric`].
//! - [`Scenario`]: the action to loop, with pacing and graceful stop rules.
//! - [`Executor`]: runs a scenario across many virtual users. Built-ins ramp
//!   VUs through [`Stage`]s, hold a constant number of VUs, or share a fixed
//!   iteration budget.
//! - [`Aggregate`]: folds metrics into a compact summary, per worker, merged at
//!   the end of the run.
//! - [`Report`] and [`Reporter`]: turn the final aggregate into output, with
//!   per-case latency percentiles checked against [`Threshold`]s.
//!
//! # Feature flags
//! - `macros` (default): `#[derive(CaseKey)]` for fieldless enums.
//! - `internals`: expose the virtual-user plumbing used by the executors.

/// Metric aggregators
pub mod aggregate;
/// Case registry and dispatch
pub mod case;
pub mod check;
/// Named execution counters
pub mod counter;
pub mod credentials;
pub mod cursor;
pub mod error;
/// Orchestrators that define how things will actually run
pub mod executor;
pub mod histogram;
/// One virtual user iteration
pub mod iteration;
/// Single metrics
pub mod metric;
pub mod pool;
/// Reports and Reporters
pub mod report;
/// Main module of the framework that glues everything together
pub mod scenario;
/// Weighted random selection
pub mod selector;

pub use aggregate::{Aggregate, RunAggregate};
pub use case::{behavior, Behavior, CaseKey, CaseSet, CaseSpec, DispatchPolicy, Executed};
pub use check::Checks;
pub use counter::{CounterRegistry, ExecutionCounter};
pub use credentials::{CredentialSource, RandomCredentials};
pub use error::{BoxError, Error, Result};
pub use executor::{ConstantVusExecutor, Executor, RampingVusExecutor, SharedIterationsExecutor, Stage};
pub use histogram::LatencyHistogram;
pub use iteration::VirtualUser;
pub use metric::{IterationMetric, Metric, Outcome};
pub use pool::{Identity, IdentityPool};
pub use report::{
    JsonReporter, Percentile, Report, Reporter, RunReport, StdoutReporter, Threshold,
    ThresholdOutcome,
};
pub use scenario::Scenario;

#[cfg(feature = "macros")]
pub use tropel_macros::CaseKey;
