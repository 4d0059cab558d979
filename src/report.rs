use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Debug, Write as _};
use std::future::Future;
use std::time::Duration;

use crate::{
    aggregate::RunAggregate,
    check::{CheckTally, Checks},
    counter::CounterRegistry,
    error::BoxError,
    Aggregate,
};

/// A [`Report`] represents the processed form of an [`Aggregate`].
///
/// Reports turn raw aggregated data into averages, ratios and totals. They are
/// plain data, free of I/O, built from an aggregate through a [`From<A>`]
/// implementation and then handed to a [`Reporter`].
pub trait Report<A>
where
    Self: Send + Sync + Debug + From<A> + Serialize + DeserializeOwned,
    A: Aggregate,
{
}

/// A [`Reporter`] consumes a [`Report`] and performs side effects: printing
/// it, sending it to a service, or persisting it somewhere.
pub trait Reporter<A: Aggregate, R: Report<A>> {
    fn report(&self, report: &R) -> impl Future<Output = Result<(), BoxError>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseSummary {
    pub name: String,
    pub iterations: u64,
    pub executions: u64,
    pub failed: u64,
    pub average_duration: Duration,
    pub min_duration: Option<Duration>,
    pub max_duration: Option<Duration>,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

impl CaseSummary {
    pub fn percentile(&self, percentile: Percentile) -> Duration {
        match percentile {
            Percentile::P50 => self.p50,
            Percentile::P95 => self.p95,
            Percentile::P99 => self.p99,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Percentile {
    P50,
    P95,
    P99,
}

impl Percentile {
    pub fn quantile(self) -> f64 {
        match self {
            Percentile::P50 => 0.50,
            Percentile::P95 => 0.95,
            Percentile::P99 => 0.99,
        }
    }
}

/// A latency bound every case must stay strictly under, e.g. `p99 < 1s`.
///
/// Crossing a threshold never stops a run, it only marks the report as
/// failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub percentile: Percentile,
    pub limit: Duration,
}

impl Threshold {
    pub fn new(percentile: Percentile, limit: Duration) -> Self {
        Self { percentile, limit }
    }
}

/// A threshold evaluated against one case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub case: String,
    pub threshold: Threshold,
    pub observed: Duration,
    pub passed: bool,
}

/// Summary of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub iterations: u64,
    pub skipped: u64,
    pub cases: Vec<CaseSummary>,
    /// Execution counters, by counter name.
    pub counters: BTreeMap<String, u64>,
    /// Check tallies, by check description.
    pub checks: BTreeMap<String, CheckTally>,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunReport {
    pub fn with_counters(mut self, counters: &CounterRegistry) -> Self {
        self.counters = counters.snapshot();
        self
    }

    pub fn with_checks(mut self, checks: &Checks) -> Self {
        self.checks = checks.snapshot();
        self
    }

    /// Evaluates every threshold against every case that ran.
    pub fn with_thresholds(mut self, thresholds: &[Threshold]) -> Self {
        self.thresholds = thresholds
            .iter()
            .flat_map(|threshold| {
                self.cases.iter().map(move |case| {
                    let observed = case.percentile(threshold.percentile);
                    ThresholdOutcome {
                        case: case.name.clone(),
                        threshold: *threshold,
                        observed,
                        passed: observed < threshold.limit,
                    }
                })
            })
            .collect();
        self
    }

    pub fn thresholds_passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    /// Share of passed checks in `[0, 100]`, `None` when nothing was checked.
    pub fn check_pass_ratio(&self) -> Option<f64> {
        let (passes, total) = self
            .checks
            .values()
            .fold((0, 0), |(p, t), tally| (p + tally.passes, t + tally.total()));
        (total > 0).then(|| passes as f64 / total as f64 * 100.0)
    }

    /// Human readable rendering used by [`StdoutReporter`].
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "iterations: {} (skipped: {})", self.iterations, self.skipped);

        for case in &self.cases {
            let _ = writeln!(
                out,
                "  {:<32} iterations={} failed={} avg={:?} min={:?} max={:?} p50={:?} p95={:?} p99={:?}",
                case.name,
                case.iterations,
                case.failed,
                case.average_duration,
                case.min_duration.unwrap_or_default(),
                case.max_duration.unwrap_or_default(),
                case.p50,
                case.p95,
                case.p99,
            );
        }

        if !self.thresholds.is_empty() {
            let _ = writeln!(out, "thresholds:");
            for t in &self.thresholds {
                let mark = if t.passed { '✓' } else { '✗' };
                let _ = writeln!(
                    out,
                    "  {mark} {} {:?} < {:?} (observed {:?})",
                    t.case, t.threshold.percentile, t.threshold.limit, t.observed
                );
            }
        }

        if !self.counters.is_empty() {
            let _ = writeln!(out, "counters:");
            for (name, value) in &self.counters {
                let _ = writeln!(out, "  {name:<40} {value}");
            }
        }

        if !self.checks.is_empty() {
            let ratio = self.check_pass_ratio().unwrap_or_default();
            let _ = writeln!(out, "checks: {ratio:.2}% passed");
            for (description, tally) in &self.checks {
                let mark = if tally.fails == 0 { '✓' } else { '✗' };
                let _ = writeln!(
                    out,
                    "  {mark} {description} ({} passed, {} failed)",
                    tally.passes, tally.fails
                );
            }
        }
        out
    }
}

impl From<RunAggregate> for RunReport {
    fn from(value: RunAggregate) -> Self {
        let cases = value
            .cases
            .iter()
            .map(|(name, tally)| CaseSummary {
                name: name.to_string(),
                iterations: tally.iterations,
                executions: tally.executions,
                failed: tally.failed,
                average_duration: if tally.iterations == 0 {
                    Duration::ZERO
                } else {
                    tally.total_duration.div_f64(tally.iterations as f64)
                },
                min_duration: tally.min_duration,
                max_duration: tally.max_duration,
                p50: tally.latency.quantile(Percentile::P50.quantile()),
                p95: tally.latency.quantile(Percentile::P95.quantile()),
                p99: tally.latency.quantile(Percentile::P99.quantile()),
            })
            .collect();

        Self {
            iterations: value.iterations(),
            skipped: value.skipped,
            cases,
            counters: BTreeMap::new(),
            checks: BTreeMap::new(),
            thresholds: Vec::new(),
        }
    }
}

impl Report<RunAggregate> for RunReport {}

/// Prints [`RunReport::render`] to stdout.
pub struct StdoutReporter;

impl Reporter<RunAggregate, RunReport> for StdoutReporter {
    async fn report(&self, report: &RunReport) -> Result<(), BoxError> {
        print!("{}", report.render());
        Ok(())
    }
}

/// Prints the report as JSON to stdout.
#[derive(Default)]
pub struct JsonReporter {
    pub pretty: bool,
}

impl Reporter<RunAggregate, RunReport> for JsonReporter {
    async fn report(&self, report: &RunReport) -> Result<(), BoxError> {
        let value = if self.pretty {
            serde_json::to_string_pretty(report)?
        } else {
            serde_json::to_string(report)?
        };
        println!("{value}");
        Ok(())
    }
}
