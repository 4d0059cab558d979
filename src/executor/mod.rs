//! Executor: orchestration of virtual users over the lifetime of a run
//!
//! The `Executor` trait is the runtime hook that executes a `Scenario`.
//! Every built-in executor spawns a fixed pool of virtual-user tasks up front
//! and then controls how many of them may iterate at any given time:
//!
//! - [`RampingVusExecutor`] walks a list of [`Stage`]s, linearly interpolating
//!   the number of active virtual users between stage targets,
//! - [`ConstantVusExecutor`] keeps a fixed number of virtual users busy for a
//!   fixed duration,
//! - [`SharedIterationsExecutor`] lets a fixed number of virtual users share a
//!   total iteration budget.
//!
//! # Lifecycle of a virtual user
//! 1. Wait until its index is below the number of active virtual users.
//! 2. Claim one unit of the iteration budget, if there is one.
//! 3. Run the scenario's action and fold the metric into a worker-local
//!    `Aggregate`.
//! 4. Pause until `min_iteration_duration` has elapsed since the iteration
//!    started.
//!
//! Shutdown is only observed between iterations. An iteration that already
//! started always runs to completion, unless the scenario's `graceful_stop`
//! window runs out, in which case the straggling task is aborted.
//!
//! Worker-local aggregates are merged in arbitrary order once all workers are
//! done, so `merge` must be associative and commutative. A worker that panics
//! contributes an empty aggregate instead of failing the run.
pub mod constant;
pub mod iterations;
pub mod stage;
mod vu;

pub use constant::ConstantVusExecutor;
pub use iterations::SharedIterationsExecutor;
pub use stage::{RampingVusExecutor, Stage};
#[cfg(feature = "internals")]
pub use vu::*;

use crate::{aggregate::Aggregate, scenario::Scenario};
use std::future::Future;

/// The runtime hook that executes a `Scenario`.
///
/// This trait is generic over the aggregate, action, and future types to remain
/// flexible and composable.
pub trait Executor<A, F, Fut>
where
    Self: Send + Sync + Sized,
    A: Aggregate,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error;
    /// Execute the scenario and return the final aggregate.
    fn exec(
        &self,
        scenario: &Scenario<A, F, Fut>,
    ) -> impl Future<Output = Result<A, Self::Error>> + Send;
}
