use std::sync::Arc;

use parking_lot::Mutex;
use rand::{rngs::StdRng, SeedableRng};
use tokio::time::Instant;

use crate::{
    case::{CaseKey, CaseSet, DispatchPolicy, Executed},
    metric::{IterationMetric, Outcome},
};

/// Entry point driven once per virtual-user tick.
///
/// A `VirtualUser` is cheap to clone: clones share the case set (and with it
/// the round-robin cursor) and the random source, so every worker of an
/// executor can hold its own copy.
///
/// Nothing raised inside an iteration escapes it. Dispatch errors and
/// behavior errors are logged and reflected in the returned metric.
#[derive(Debug)]
pub struct VirtualUser<K: CaseKey> {
    cases: Arc<CaseSet<K>>,
    policy: DispatchPolicy<K>,
    rng: Arc<Mutex<StdRng>>,
}

impl<K: CaseKey> Clone for VirtualUser<K> {
    fn clone(&self) -> Self {
        Self {
            cases: Arc::clone(&self.cases),
            policy: self.policy,
            rng: Arc::clone(&self.rng),
        }
    }
}

impl<K: CaseKey> VirtualUser<K> {
    pub fn new(cases: Arc<CaseSet<K>>, policy: DispatchPolicy<K>) -> Self {
        Self::with_rng(cases, policy, StdRng::from_entropy())
    }

    /// Uses `rng` for weighted draws, which makes the sequence of weighted
    /// picks reproducible.
    pub fn with_rng(cases: Arc<CaseSet<K>>, policy: DispatchPolicy<K>, rng: StdRng) -> Self {
        Self {
            cases,
            policy,
            rng: Arc::new(Mutex::new(rng)),
        }
    }

    pub fn policy(&self) -> DispatchPolicy<K> {
        self.policy
    }

    pub fn cases(&self) -> &CaseSet<K> {
        &self.cases
    }

    /// Runs one iteration under the configured policy.
    pub async fn run_iteration(&self) -> IterationMetric {
        let start = Instant::now();

        let dispatched = match self.policy {
            DispatchPolicy::Weighted => {
                let picked = {
                    let mut rng = self.rng.lock();
                    self.cases.pick_weighted(&mut *rng)
                };
                match picked {
                    Ok(case) => Ok(vec![case.execute().await]),
                    Err(e) => Err(e),
                }
            }
            DispatchPolicy::RoundRobin => self.cases.dispatch_round_robin().await.map(|e| vec![e]),
            DispatchPolicy::ByName(key) => self.cases.dispatch_by_name(key).await,
        };

        let duration = start.elapsed();
        match dispatched {
            Ok(executed) => {
                let outcome = summarize(&executed);
                IterationMetric {
                    case: executed.first().map(|e| e.key.name()),
                    executions: executed.len(),
                    duration,
                    outcome,
                }
            }
            Err(e) => {
                tracing::warn!("Skipping iteration, nothing to dispatch: {e}");
                IterationMetric {
                    case: None,
                    executions: 0,
                    duration,
                    outcome: Outcome::Skipped,
                }
            }
        }
    }
}

fn summarize<K: CaseKey>(executed: &[Executed<K>]) -> Outcome {
    let mut outcome = Outcome::Completed;
    for e in executed {
        if let Err(err) = &e.result {
            tracing::warn!("Case {} failed: {err}", e.key.name());
            outcome = Outcome::Failed;
        }
    }
    outcome
}
