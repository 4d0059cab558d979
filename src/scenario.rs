use std::{future::Future, marker::PhantomData, time::Duration};

use typed_builder::TypedBuilder;

use crate::aggregate::Aggregate;

/// What a run executes: a named action producing one metric per call, plus the
/// pacing rules every executor honors.
///
/// The action is usually a closure around [`crate::VirtualUser::run_iteration`]:
///
/// ```rust,ignore
/// let scenario = Scenario::builder()
///     .name("identity login")
///     .action(move || {
///         let vu = vu.clone();
///         async move { vu.run_iteration().await }
///     })
///     .min_iteration_duration(Duration::from_secs(10))
///     .build();
/// ```
#[derive(TypedBuilder)]
pub struct Scenario<A, F, Fut>
where
    A: Aggregate,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    #[builder(setter(into))]
    pub name: String,
    pub action: F,
    /// Iterations finishing sooner are padded with a pause up to this length.
    #[builder(default = Duration::ZERO)]
    pub min_iteration_duration: Duration,
    /// How long in-flight iterations may run once the executor stops. `None`
    /// waits for all of them.
    #[builder(default, setter(strip_option))]
    pub graceful_stop: Option<Duration>,
    #[builder(default, setter(skip))]
    marker: PhantomData<fn() -> (A, Fut)>,
}
