//! The `ConstantVusExecutor`: a fixed number of virtual users looping for a
//! fixed duration.
use std::{future::Future, time::Duration};

use typed_builder::TypedBuilder;

use super::{vu::*, Executor};
use crate::{aggregate::Aggregate, error::Error, scenario::Scenario};

/// Keeps `vus` virtual users iterating until `duration` elapses.
#[derive(Clone, Debug, TypedBuilder)]
pub struct ConstantVusExecutor {
    pub vus: usize,
    pub duration: Duration,
}

impl<A, F, Fut> Executor<A, F, Fut> for ConstantVusExecutor
where
    Self: Send + Sync + Sized,
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    type Error = Error;

    async fn exec(&self, scenario: &Scenario<A, F, Fut>) -> Result<A, Self::Error> {
        if self.vus == 0 {
            return Err(Error::InvalidExecutor("constant executor needs at least one VU"));
        }

        let (ctx, control) = ExecutionContext::new(self.vus, None);

        tracing::info!("Spawning {} virtual users...", self.vus);
        let handles = spawn_vus(
            ctx,
            self.vus,
            scenario.action.clone(),
            scenario.min_iteration_duration,
        );

        tracing::info!(
            "Running scenario: {} for {:?}!",
            scenario.name,
            self.duration
        );
        until_interrupted(tokio::time::sleep(self.duration)).await;

        tracing::info!("Duration elapsed, signaling shutdown...");
        control.shutdown();
        let final_agg = collect(handles, scenario.graceful_stop).await;

        tracing::info!("Done running scenario: {}!", scenario.name);
        Ok(final_agg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metric::{IterationMetric, Outcome},
        RunAggregate,
    };

    fn metric() -> IterationMetric {
        IterationMetric {
            case: Some("noop"),
            executions: 1,
            duration: Duration::ZERO,
            outcome: Outcome::Completed,
        }
    }

    #[tokio::test]
    async fn zero_vus_are_rejected() {
        let executor = ConstantVusExecutor::builder()
            .vus(0)
            .duration(Duration::from_secs(1))
            .build();
        let scenario = Scenario::<RunAggregate, _, _>::builder()
            .name("none")
            .action(|| async { metric() })
            .build();
        assert!(matches!(
            executor.exec(&scenario).await,
            Err(Error::InvalidExecutor(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn paced_vus_iterate_for_the_duration() {
        let executor = ConstantVusExecutor::builder()
            .vus(3)
            .duration(Duration::from_millis(4_500))
            .build();
        let scenario = Scenario::<RunAggregate, _, _>::builder()
            .name("constant")
            .action(|| async { metric() })
            .min_iteration_duration(Duration::from_secs(1))
            .build();

        let agg = executor.exec(&scenario).await.unwrap();
        // iterations start at 0s, 1s, 2s, 3s and 4s for each VU
        assert_eq!(agg.iterations(), 15);
    }
}
