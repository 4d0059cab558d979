//! The `SharedIterationsExecutor`: virtual users draining a shared iteration
//! budget.
use std::{future::Future, time::Duration};

use typed_builder::TypedBuilder;

use super::{vu::*, Executor};
use crate::{aggregate::Aggregate, error::Error, scenario::Scenario};

/// Lets `vus` virtual users share `iterations` iterations.
///
/// Faster VUs run more of them. The run ends once the budget is drained, or
/// after `max_duration` when set, whichever comes first. `vus` defaults to
/// one VU per CPU.
#[derive(Clone, Debug, TypedBuilder)]
pub struct SharedIterationsExecutor {
    #[builder(default = num_cpus::get())]
    pub vus: usize,
    pub iterations: usize,
    #[builder(default, setter(strip_option))]
    pub max_duration: Option<Duration>,
}

impl<A, F, Fut> Executor<A, F, Fut> for SharedIterationsExecutor
where
    Self: Send + Sync + Sized,
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<A, F, Fut>) -> Result<A, Self::Error> {
        if self.vus == 0 {
            return Err(Error::InvalidExecutor("shared iterations executor needs at least one VU"));
        }
        if self.iterations > MAX_BUDGET {
            tracing::warn!(
                "Iteration budget {} capped at {MAX_BUDGET}",
                self.iterations
            );
        }

        let (ctx, mut control) = ExecutionContext::new(self.vus, Some(self.iterations));

        tracing::info!("Spawning {} virtual users...", self.vus);
        let handles = spawn_vus(
            ctx,
            self.vus,
            scenario.action.clone(),
            scenario.min_iteration_duration,
        );

        tracing::info!(
            "Running scenario: {} for {} iterations!",
            scenario.name,
            self.iterations
        );
        let max_duration = self.max_duration;
        until_interrupted(async {
            match max_duration {
                Some(limit) => {
                    tokio::select! {
                        _ = control.all_exited() => {}
                        _ = tokio::time::sleep(limit) => {
                            tracing::warn!("Maximum duration {limit:?} reached before the budget was drained.");
                        }
                    }
                }
                None => control.all_exited().await,
            }
        })
        .await;

        control.shutdown();
        let final_agg = collect(handles, scenario.graceful_stop).await;

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(final_agg)
    }
}
