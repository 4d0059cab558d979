//! Case registry and dispatch.
//!
//! A [`CaseSet`] is an ordered list of weighted behaviors, each paired with the
//! [`ExecutionCounter`] that records how many times it ran. Cases are keyed by
//! a [`CaseKey`], a fieldless enum whose variants name every behavior a suite
//! knows about, so dispatching by name can never refer to a case that does
//! not exist in the program.
//!
//! Three dispatch policies are supported:
//!
//! - **weighted**: the case is drawn with probability `weight / total`,
//! - **round robin**: cases run in insertion order, driven by one shared
//!   cursor,
//! - **by name**: every case whose key matches runs once.
//!
//! Counters track attempts. Every dispatch path increments the executed case's
//! counter exactly once after the behavior completes, whatever it returned.

use std::{fmt::Debug, future::Future, hash::Hash, sync::Arc};

use futures::future::{BoxFuture, FutureExt};
use rand::Rng;

use crate::{
    counter::{CounterRegistry, ExecutionCounter},
    cursor::RoundRobinCursor,
    error::{BoxError, Error, Result},
    selector::{self, Weighted},
};

/// Identifies a behavior.
///
/// Usually derived with `#[derive(CaseKey)]`, which names each variant after
/// its snake_case spelling.
pub trait CaseKey: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Every key, in declaration order.
    const ALL: &'static [Self];

    /// Stable name, used for counters and reports.
    fn name(&self) -> &'static str;

    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|key| key.name() == name)
    }
}

/// A unit of test logic. Calling it starts one execution.
pub type Behavior = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Wraps an async closure into a [`Behavior`].
pub fn behavior<F, Fut>(f: F) -> Behavior
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(move || f().boxed())
}

/// A case as handed to [`CaseSet::build`].
pub struct CaseSpec<K: CaseKey> {
    pub key: K,
    pub weight: f64,
    pub behavior: Behavior,
}

impl<K: CaseKey> CaseSpec<K> {
    pub fn new(key: K, weight: f64, behavior: Behavior) -> Self {
        Self {
            key,
            weight,
            behavior,
        }
    }
}

/// A registered case: its behavior, weight and execution counter.
pub struct WeightedCase<K: CaseKey> {
    key: K,
    weight: f64,
    behavior: Behavior,
    counter: ExecutionCounter,
}

impl<K: CaseKey> WeightedCase<K> {
    pub fn key(&self) -> K {
        self.key
    }

    pub fn counter(&self) -> &ExecutionCounter {
        &self.counter
    }

    /// Runs the behavior, then records the attempt.
    pub async fn execute(&self) -> Executed<K> {
        let result = (self.behavior)().await;
        self.counter.increment();
        Executed {
            key: self.key,
            result,
        }
    }
}

impl<K: CaseKey> Weighted for WeightedCase<K> {
    fn weight(&self) -> f64 {
        self.weight
    }
}

impl<K: CaseKey> Debug for WeightedCase<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeightedCase")
            .field("key", &self.key)
            .field("weight", &self.weight)
            .field("counter", &self.counter.name())
            .finish()
    }
}

/// Outcome of running one case.
#[derive(Debug)]
pub struct Executed<K> {
    pub key: K,
    pub result: Result<(), BoxError>,
}

/// How a virtual user picks the next case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPolicy<K> {
    Weighted,
    RoundRobin,
    ByName(K),
}

/// Ordered set of weighted cases.
///
/// The round-robin cursor lives in the set itself, so sharing the set (behind
/// an `Arc`) shares the cursor between every virtual user.
#[derive(Debug)]
pub struct CaseSet<K: CaseKey> {
    cases: Vec<WeightedCase<K>>,
    cursor: RoundRobinCursor,
}

impl<K: CaseKey> Default for CaseSet<K> {
    /// An empty set. Every dispatch on it fails with
    /// [`Error::EmptyOrInvalidCaseSet`].
    fn default() -> Self {
        Self {
            cases: Vec::new(),
            cursor: RoundRobinCursor::new(),
        }
    }
}

impl<K: CaseKey> CaseSet<K> {
    pub fn builder() -> CaseSetBuilder<K> {
        CaseSetBuilder { specs: Vec::new() }
    }

    /// Builds a case set, creating one counter per case in `counters`.
    ///
    /// Fails when `specs` is empty, any weight is not a finite positive
    /// number, or the weights sum to infinity. These are configuration
    /// mistakes and should stop the run before it starts.
    pub fn build(
        counters: &CounterRegistry,
        specs: impl IntoIterator<Item = CaseSpec<K>>,
    ) -> Result<Self> {
        let cases = specs
            .into_iter()
            .map(|spec| {
                if !spec.weight.is_finite() || spec.weight <= 0.0 {
                    return Err(Error::InvalidWeight {
                        case: spec.key.name(),
                        weight: spec.weight,
                    });
                }
                Ok(WeightedCase {
                    key: spec.key,
                    weight: spec.weight,
                    behavior: spec.behavior,
                    counter: counters.case_counter(spec.key.name()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if cases.is_empty() || !selector::total_weight(&cases).is_finite() {
            return Err(Error::EmptyOrInvalidCaseSet);
        }

        Ok(Self {
            cases,
            cursor: RoundRobinCursor::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn cases(&self) -> &[WeightedCase<K>] {
        &self.cases
    }

    pub fn total_weight(&self) -> f64 {
        selector::total_weight(&self.cases)
    }

    /// Case owning `draw` within `[0, total_weight)`.
    pub fn select_weighted(&self, draw: f64) -> Result<&WeightedCase<K>> {
        selector::select_weighted(&self.cases, draw)
    }

    pub fn pick_weighted<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&WeightedCase<K>> {
        selector::pick_weighted(&self.cases, rng)
    }

    /// Claims the next case in insertion order.
    pub fn next_round_robin(&self) -> Result<&WeightedCase<K>> {
        self.cursor
            .next_index(self.cases.len())
            .map(|i| &self.cases[i])
            .ok_or(Error::EmptyOrInvalidCaseSet)
    }

    /// Every case registered under `key`, in insertion order.
    pub fn matching(&self, key: K) -> impl Iterator<Item = &WeightedCase<K>> + '_ {
        self.cases.iter().filter(move |case| case.key == key)
    }

    /// Draws a case by weight and executes it.
    ///
    /// The draw happens before the returned future is created, so `rng` does
    /// not need to outlive this call.
    pub fn dispatch_weighted<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> impl Future<Output = Result<Executed<K>>> + Send + '_ {
        let picked = self.pick_weighted(rng);
        async move { Ok(picked?.execute().await) }
    }

    /// Executes the next case in insertion order.
    pub async fn dispatch_round_robin(&self) -> Result<Executed<K>> {
        let case = self.next_round_robin()?;
        Ok(case.execute().await)
    }

    /// Executes every case registered under `key`, once each, in insertion
    /// order.
    pub async fn dispatch_by_name(&self, key: K) -> Result<Vec<Executed<K>>> {
        let mut executed = Vec::new();
        for case in self.matching(key) {
            executed.push(case.execute().await);
        }
        if executed.is_empty() {
            return Err(Error::CaseNotRegistered(key.name()));
        }
        Ok(executed)
    }
}

/// Fluent construction of a [`CaseSet`].
pub struct CaseSetBuilder<K: CaseKey> {
    specs: Vec<CaseSpec<K>>,
}

impl<K: CaseKey> CaseSetBuilder<K> {
    pub fn case<F, Fut>(mut self, key: K, weight: f64, f: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.specs.push(CaseSpec::new(key, weight, behavior(f)));
        self
    }

    pub fn spec(mut self, spec: CaseSpec<K>) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn build(self, counters: &CounterRegistry) -> Result<CaseSet<K>> {
        CaseSet::build(counters, self.specs)
    }
}
