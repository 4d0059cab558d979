//! Smoke run of every feature at once.
//!
//! The login and logout suites run side by side, each as its own scenario
//! with a single constant virtual user. Their aggregates are merged into one
//! report.
use std::{sync::Arc, time::Duration};

use rand::{rngs::StdRng, SeedableRng};
use tropel::{
    Aggregate, CaseKey, CaseSet, ConstantVusExecutor, CounterRegistry, DispatchPolicy, Executor,
    RunAggregate, Scenario, VirtualUser,
};

use crate::{behaviors::AuthBehaviors, http::Transport, profile::Profile, suite::Suite};

pub const SUITES: [Suite; 2] = [Suite::Login, Suite::Logout];
pub const VUS: usize = 1;
pub const DURATION: Duration = Duration::from_secs(10);

pub fn executor() -> ConstantVusExecutor {
    ConstantVusExecutor::builder()
        .vus(VUS)
        .duration(DURATION)
        .build()
}

fn virtual_user<K: CaseKey>(cases: CaseSet<K>, seed: Option<u64>) -> VirtualUser<K> {
    let cases = Arc::new(cases);
    match seed {
        Some(seed) => VirtualUser::with_rng(cases, DispatchPolicy::Weighted, StdRng::seed_from_u64(seed)),
        None => VirtualUser::new(cases, DispatchPolicy::Weighted),
    }
}

/// Runs [`SUITES`] concurrently under [`executor`] and merges what they
/// measured.
pub async fn smoke_all<T: Transport>(
    behaviors: &Arc<AuthBehaviors<T>>,
    counters: &CounterRegistry,
    seed: Option<u64>,
) -> tropel::Result<RunAggregate> {
    let [first, second] = SUITES;
    let first_vu = virtual_user(first.case_set(behaviors, counters)?, seed);
    let second_vu = virtual_user(second.case_set(behaviors, counters)?, seed);

    let profile = Profile::Smoke;
    let first_scenario = Scenario::<RunAggregate, _, _>::builder()
        .name(format!("{}-smoke", first.name()))
        .action(move || {
            let vu = first_vu.clone();
            async move { vu.run_iteration().await }
        })
        .min_iteration_duration(profile.min_iteration_duration())
        .graceful_stop(profile.graceful_stop())
        .build();
    let second_scenario = Scenario::<RunAggregate, _, _>::builder()
        .name(format!("{}-smoke", second.name()))
        .action(move || {
            let vu = second_vu.clone();
            async move { vu.run_iteration().await }
        })
        .min_iteration_duration(profile.min_iteration_duration())
        .graceful_stop(profile.graceful_stop())
        .build();

    let executor = executor();
    tracing::info!(
        "Smoke testing {} and {} together for {:?}",
        first.name(),
        second.name(),
        DURATION
    );
    let (mut aggregate, other) = tokio::try_join!(
        executor.exec(&first_scenario),
        executor.exec(&second_scenario)
    )?;
    aggregate.merge(other);
    Ok(aggregate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_vu_for_ten_seconds() {
        let executor = executor();
        assert_eq!(executor.vus, 1);
        assert_eq!(executor.duration, Duration::from_secs(10));
        assert_eq!(Profile::Smoke.graceful_stop(), Duration::from_secs(5));
    }

    #[test]
    fn covers_login_and_logout() {
        assert_eq!(SUITES, [Suite::Login, Suite::Logout]);
    }
}
