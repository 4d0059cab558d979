//! The `RampingVusExecutor`: virtual users shaped over time by stages.
//!
//! Each [`Stage`] defines a target number of concurrent virtual users and a
//! duration over which the governor linearly interpolates from the previous
//! target to the stage's target:
//!
//! ```text
//! t = elapsed / duration
//! vus(t) = round(start + (end - start) * t)
//! ```
//!
//! Every VU the stages will ever need is spawned up front. The governor only
//! moves the number of VUs allowed to iterate; a VU above that number finishes
//! its in-flight iteration and goes idle until the target climbs again.
use std::{future::Future, time::Duration};

use tokio::time::Instant;
use typed_builder::TypedBuilder;

use super::{vu::*, Executor};
use crate::{aggregate::Aggregate, error::Error, scenario::Scenario};

/// A stage defines a target number of virtual users and how long to ramp to
/// that target.
///
/// Use `Stage::new(Duration::from_secs(120), 50)` to ramp to 50 VUs over two
/// minutes. If `duration` is `Duration::ZERO`, the executor jumps to the
/// target instantly; such a stage only changes the starting point of the next
/// one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    /// Concurrent virtual users
    pub target: usize,
}

impl Stage {
    pub fn new(duration: Duration, target: usize) -> Self {
        Self { duration, target }
    }
}

/// Executor that ramps the number of active virtual users through `stages`.
///
/// # Tuning Knobs
///
/// - `tick`: granularity of governor updates. Smaller ticks follow the ramp
///   more closely at the cost of more wakeups.
/// - `start_vus`: number of active VUs before the first stage starts.
#[derive(TypedBuilder)]
pub struct RampingVusExecutor {
    /// The sequence of stages to execute.
    pub stages: Vec<Stage>,
    /// The granularity of the governor's updates.
    #[builder(default = Duration::from_millis(100))]
    pub tick: Duration,
    #[builder(default = 0)]
    pub start_vus: usize,
}

impl RampingVusExecutor {
    /// Largest number of VUs any point of the run will require.
    pub fn max_vus(&self) -> usize {
        self.stages
            .iter()
            .map(|s| s.target)
            .fold(self.start_vus, usize::max)
    }

    /// Total length of all stages.
    pub fn duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}

impl<A, F, Fut> Executor<A, F, Fut> for RampingVusExecutor
where
    Self: Send + Sync + Sized,
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<A, F, Fut>) -> Result<A, Self::Error> {
        if self.stages.is_empty() {
            return Err(Error::InvalidExecutor("ramping executor needs at least one stage"));
        }
        if self.tick.is_zero() {
            return Err(Error::InvalidExecutor("ramping executor tick must be positive"));
        }

        let max_vus = self.max_vus();
        let (ctx, control) = ExecutionContext::new(self.start_vus, None);

        tracing::info!("Spawning {max_vus} virtual users...");
        let handles = spawn_vus(
            ctx,
            max_vus,
            scenario.action.clone(),
            scenario.min_iteration_duration,
        );

        tracing::info!(
            "Running scenario: {} for {:?}!",
            scenario.name,
            self.duration()
        );
        until_interrupted(vu_governor(&control, &self.stages, self.tick)).await;

        tracing::info!("Stages finished, signaling shutdown...");
        control.shutdown();

        tracing::info!("Waiting for in-flight iterations...");
        let final_agg = collect(handles, scenario.graceful_stop).await;

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(final_agg)
    }
}

/// Moves the number of active VUs through `stages`, each ramping from
/// wherever the previous one left `control`.
pub async fn vu_governor(control: &ExecutionControl, stages: &[Stage], tick: Duration) {
    let j = stages.len();

    for (i, stage) in stages.iter().enumerate() {
        tracing::info!("Starting stage: {}/{j} ({} VUs over {:?})", i + 1, stage.target, stage.duration);
        // Instantly jump to the target, handy for spikes or a non-zero start.
        if stage.duration.is_zero() {
            control.set_active(stage.target);
            continue;
        }

        let stage_start = Instant::now();
        let mut next_tick = stage_start;
        let start_vus = control.active();

        loop {
            let elapsed = Instant::now().duration_since(stage_start);
            if elapsed >= stage.duration {
                break;
            }
            control.set_active(calc_target_vus(elapsed, stage.duration, start_vus, stage.target));

            next_tick += tick;
            tokio::time::sleep_until(next_tick.min(stage_start + stage.duration)).await;
        }

        // Land exactly on the target so the next stage starts from it.
        control.set_active(stage.target);
        tracing::info!("Finishing stage: {}/{j}", i + 1);
    }
}

/// Pure function computing how many VUs should be active `elapsed` into a
/// stage ramping from `start` to `end` over `stage_duration`.
pub fn calc_target_vus(elapsed: Duration, stage_duration: Duration, start: usize, end: usize) -> usize {
    if stage_duration.is_zero() {
        return end;
    }
    // Interpolation factor [0.0..1.0]
    let t = (elapsed.as_secs_f64() / stage_duration.as_secs_f64()).min(1.0);
    let vus = start as f64 + (end as f64 - start as f64) * t;
    vus.round().max(0.0) as usize
}
