//! Virtual-user tasks and the shared state coordinating them.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::{
    sync::{mpsc, watch, Semaphore},
    task::JoinHandle,
    time::Instant,
};

use crate::aggregate::Aggregate;

/// The semaphore implementation reserves 3 bits of usize for flags, larger
/// iteration budgets are capped.
pub const MAX_BUDGET: usize = usize::MAX >> 3;

/// Shared execution state handed to every virtual-user task.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Flips to `true` once the run is over.
    pub shutdown: watch::Receiver<bool>,
    /// Number of virtual users allowed to iterate. A VU iterates while its
    /// index is below this value.
    pub active: watch::Receiver<usize>,
    /// Remaining iterations, when the run is bounded by an iteration count.
    pub budget: Option<Arc<Semaphore>>,
    /// Dropped by each task as it exits. Once every clone is gone the
    /// controller knows all tasks have finished.
    alive: mpsc::Sender<()>,
}

/// Controller side of an [`ExecutionContext`].
pub struct ExecutionControl {
    shutdown: watch::Sender<bool>,
    active: watch::Sender<usize>,
    exited: mpsc::Receiver<()>,
}

impl ExecutionContext {
    pub fn new(active: usize, budget: Option<usize>) -> (Self, ExecutionControl) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (active_tx, active_rx) = watch::channel(active);
        let (alive_tx, alive_rx) = mpsc::channel(1);
        (
            Self {
                shutdown: shutdown_rx,
                active: active_rx,
                budget: budget.map(|n| Arc::new(Semaphore::new(n.min(MAX_BUDGET)))),
                alive: alive_tx,
            },
            ExecutionControl {
                shutdown: shutdown_tx,
                active: active_tx,
                exited: alive_rx,
            },
        )
    }
}

impl ExecutionControl {
    pub fn set_active(&self, vus: usize) {
        let previous = self.active.send_replace(vus);
        if previous != vus {
            tracing::debug!("Active virtual users: {previous} -> {vus}");
        }
    }

    pub fn active(&self) -> usize {
        *self.active.borrow()
    }

    /// Asks every virtual user to stop after its current iteration.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolves once every task spawned from the context has exited.
    ///
    /// The context passed to [`spawn_vus`] must be the last one alive outside
    /// of the tasks, otherwise this never resolves.
    pub async fn all_exited(&mut self) {
        while self.exited.recv().await.is_some() {}
    }
}

/// Spawns `vus` virtual-user tasks, each running `action` in a loop.
pub fn spawn_vus<A, F, Fut>(
    ctx: ExecutionContext,
    vus: usize,
    action: F,
    min_iteration_duration: Duration,
) -> Vec<JoinHandle<A>>
where
    A: Aggregate + 'static,
    F: Fn() -> Fut + Send + Sync + Clone + 'static,
    Fut: Future<Output = A::Metric> + Send + 'static,
{
    (0..vus)
        .map(|i| {
            let mut ctx = ctx.clone();
            let action = action.clone();
            tokio::spawn(async move {
                let mut agg = A::new();
                tracing::debug!("VU {i} spawned.");

                loop {
                    if *ctx.shutdown.borrow() {
                        break;
                    }

                    if *ctx.active.borrow() <= i {
                        tokio::select! {
                            changed = ctx.active.wait_for(|n| *n > i) => {
                                if changed.is_err() {
                                    break;
                                }
                                continue;
                            }
                            _ = ctx.shutdown.wait_for(|b| *b) => break,
                        }
                    }

                    if let Some(budget) = &ctx.budget {
                        match budget.try_acquire() {
                            // Iterations are consumed, never handed back.
                            Ok(permit) => permit.forget(),
                            Err(_) => {
                                tracing::debug!("VU {i} found the iteration budget exhausted.");
                                break;
                            }
                        }
                    }

                    let started = Instant::now();
                    let metric = action().await;
                    agg.consume(&metric);

                    let paced_until = started + min_iteration_duration;
                    if paced_until > Instant::now() {
                        tokio::select! {
                            _ = tokio::time::sleep_until(paced_until) => {}
                            _ = ctx.shutdown.wait_for(|b| *b) => break,
                        }
                    } else {
                        // An action that never suspends must not starve the
                        // rest of the runtime.
                        tokio::task::yield_now().await;
                    }
                }

                tracing::debug!("VU {i} shutting down.");
                drop(ctx);
                agg
            })
        })
        .collect()
}

/// Waits for every virtual user and merges their aggregates.
///
/// With a `graceful_stop` window, tasks still running once it elapses are
/// aborted and their aggregates are lost.
pub async fn collect<A>(handles: Vec<JoinHandle<A>>, graceful_stop: Option<Duration>) -> A
where
    A: Aggregate + 'static,
{
    let deadline = graceful_stop.map(|window| Instant::now() + window);
    let mut final_agg = A::new();

    for (i, mut handle) in handles.into_iter().enumerate() {
        let joined = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    tracing::warn!("VU {i} still running after the graceful stop, aborting it.");
                    handle.abort();
                    continue;
                }
            },
            None => handle.await,
        };

        match joined {
            Ok(agg) => final_agg.merge(agg),
            // instead of crashing, keep the data of every other VU
            Err(e) => tracing::error!("VU {i} panicked with error: {e}"),
        }
    }
    final_agg
}

/// Runs `fut` to completion unless the process receives Ctrl-C first.
///
/// Returns `true` when interrupted.
pub async fn until_interrupted<F: Future>(fut: F) -> bool {
    let interrupted = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // No signal handler available, only `fut` can end the wait.
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = fut => false,
        _ = interrupted => {
            tracing::warn!("Interrupted, stopping gracefully...");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metric::{IterationMetric, Outcome};
    use crate::RunAggregate;

    fn metric() -> IterationMetric {
        IterationMetric {
            case: Some("noop"),
            executions: 1,
            duration: Duration::ZERO,
            outcome: Outcome::Completed,
        }
    }

    #[tokio::test]
    async fn spawn_expected_number_of_workers() {
        let n = 10;
        let (ctx, control) = ExecutionContext::new(0, None);
        let action = || async { metric() };
        let workers: Vec<JoinHandle<RunAggregate>> =
            spawn_vus(ctx, n, action, Duration::ZERO);

        assert_eq!(workers.len(), n);
        control.shutdown();
        let agg = collect(workers, None).await;
        assert_eq!(agg.iterations(), 0);
    }

    #[tokio::test]
    async fn budget_bounds_total_iterations() {
        let (ctx, mut control) = ExecutionContext::new(4, Some(25));
        let workers: Vec<JoinHandle<RunAggregate>> =
            spawn_vus(ctx, 4, || async { metric() }, Duration::ZERO);

        control.all_exited().await;
        let agg = collect(workers, None).await;
        assert_eq!(agg.iterations(), 25);
    }

    #[tokio::test(start_paused = true)]
    async fn inactive_vus_stay_idle() {
        let (ctx, control) = ExecutionContext::new(1, Some(10));
        let workers: Vec<JoinHandle<RunAggregate>> =
            spawn_vus(ctx, 3, || async { metric() }, Duration::from_secs(1));

        // one active VU, one iteration per second
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        control.shutdown();
        let agg = collect(workers, None).await;
        assert_eq!(agg.iterations(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn lowering_active_vus_lets_iterations_finish_then_idles() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let started = Arc::new(AtomicUsize::new(0));
        let running = Arc::new(AtomicUsize::new(0));
        let action = {
            let started = Arc::clone(&started);
            let running = Arc::clone(&running);
            move || {
                let started = Arc::clone(&started);
                let running = Arc::clone(&running);
                async move {
                    started.fetch_add(1, Ordering::SeqCst);
                    running.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    metric()
                }
            }
        };
        let (ctx, control) = ExecutionContext::new(3, None);
        let workers: Vec<JoinHandle<RunAggregate>> = spawn_vus(ctx, 3, action, Duration::ZERO);
        let sleep_ms = |ms| tokio::time::sleep(Duration::from_millis(ms));

        sleep_ms(500).await;
        control.set_active(1);
        assert_eq!(control.active(), 1);
        // already running iterations are not interrupted
        assert_eq!(running.load(Ordering::SeqCst), 3);

        // at 1s all three finish, only VU 0 starts again
        sleep_ms(1_000).await;
        assert_eq!(started.load(Ordering::SeqCst), 4);
        assert_eq!(running.load(Ordering::SeqCst), 1);

        sleep_ms(1_000).await;
        assert_eq!(started.load(Ordering::SeqCst), 5);
        assert_eq!(running.load(Ordering::SeqCst), 1);

        // raising the count wakes the idle VUs right away
        control.set_active(3);
        sleep_ms(100).await;
        assert_eq!(started.load(Ordering::SeqCst), 7);
        assert_eq!(running.load(Ordering::SeqCst), 3);

        control.shutdown();
        let agg = collect(workers, None).await;
        assert_eq!(agg.iterations(), 7);
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn in_flight_iteration_finishes_before_stop() {
        let (ctx, control) = ExecutionContext::new(1, None);
        let action = || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            metric()
        };
        let workers: Vec<JoinHandle<RunAggregate>> =
            spawn_vus(ctx, 1, action, Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(1)).await;
        control.shutdown();
        let agg = collect(workers, None).await;
        assert_eq!(agg.iterations(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn graceful_stop_aborts_stragglers() {
        let (ctx, control) = ExecutionContext::new(1, None);
        let action = || async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            metric()
        };
        let workers: Vec<JoinHandle<RunAggregate>> =
            spawn_vus(ctx, 1, action, Duration::ZERO);

        tokio::time::sleep(Duration::from_secs(1)).await;
        control.shutdown();
        let agg = collect(workers, Some(Duration::from_secs(5))).await;
        assert_eq!(agg.iterations(), 0);
    }
}
