use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use rand::{rngs::StdRng, SeedableRng};
use tracing_subscriber::EnvFilter;
use tropel::{
    CaseKey, Checks, CounterRegistry, CredentialSource, DispatchPolicy, Executor, IdentityPool,
    JsonReporter, RampingVusExecutor, RandomCredentials, Reporter, RunAggregate, RunReport,
    Scenario, SharedIterationsExecutor, StdoutReporter, VirtualUser,
};
use tropel_auth::{
    fixtures, smoke, AuthBehaviors, AuthCase, Config, HttpTransport, Profile, Suite,
};

/// Exit status of a run that crossed a latency threshold.
const THRESHOLDS_CROSSED: u8 = 99;

#[derive(Debug, Parser)]
#[command(
    name = "tropel-auth",
    version,
    about = "Load tests for the identity and authentication endpoints",
    long_about = None
)]
struct Cli {
    /// TOML config file. Defaults apply when omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = Suite::Login)]
    suite: Suite,

    #[arg(long, value_enum, default_value_t = Profile::Smoke)]
    profile: Profile,

    #[arg(long, value_enum, default_value_t = Policy::Weighted)]
    policy: Policy,

    /// Case to run with `--policy by-name`, e.g. `pooled_login`.
    #[arg(long)]
    case: Option<String>,

    /// Run a fixed number of iterations instead of the profile's stages.
    #[arg(long)]
    iterations: Option<usize>,

    /// Overrides the `[target]` section.
    #[arg(long)]
    base_url: Option<String>,

    /// Smoke-test the login and logout suites side by side, ignoring
    /// `--suite`, `--profile` and `--policy`.
    #[arg(long, conflicts_with_all = ["iterations", "case"])]
    smoke_all: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Policy {
    Weighted,
    RoundRobin,
    ByName,
}

fn dispatch_policy(policy: Policy, case: Option<&str>) -> anyhow::Result<DispatchPolicy<AuthCase>> {
    Ok(match policy {
        Policy::Weighted => DispatchPolicy::Weighted,
        Policy::RoundRobin => DispatchPolicy::RoundRobin,
        Policy::ByName => {
            let name = case.context("--policy by-name needs --case")?;
            let key = AuthCase::from_name(name).with_context(|| {
                let known: Vec<_> = AuthCase::ALL.iter().map(|c| c.name()).collect();
                format!("unknown case `{name}`, expected one of: {}", known.join(", "))
            })?;
            DispatchPolicy::ByName(key)
        }
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let policy = dispatch_policy(cli.policy, cli.case.as_deref())?;

    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| config.target.base_url());
    let transport = HttpTransport::new(&config.http, &base_url)?;

    let pool = Arc::new(IdentityPool::seeded(fixtures::seed_identities()));
    let credentials: Arc<dyn CredentialSource> = match config.run.seed {
        Some(seed) => Arc::new(RandomCredentials::seeded(&config.run.email_domain, seed)),
        None => Arc::new(RandomCredentials::new(&config.run.email_domain)),
    };
    let checks = Checks::new();
    let counters = CounterRegistry::new();

    let behaviors = Arc::new(AuthBehaviors::new(
        transport,
        pool,
        credentials,
        checks.clone(),
        config.run.think_time(),
    ));

    tracing::info!("Target {base_url}");
    let aggregate = if cli.smoke_all {
        smoke::smoke_all(&behaviors, &counters, config.run.seed).await?
    } else {
        run_suite(&cli, &config, &behaviors, &counters, policy).await?
    };

    let report = RunReport::from(aggregate)
        .with_counters(&counters)
        .with_checks(&checks)
        .with_thresholds(&config.thresholds.thresholds());
    let reported = if cli.json {
        JsonReporter { pretty: true }.report(&report).await
    } else {
        StdoutReporter.report(&report).await
    };
    reported.map_err(|e| anyhow!(e))?;

    Ok(ExitCode::from(exit_status(&report)))
}

async fn run_suite(
    cli: &Cli,
    config: &Config,
    behaviors: &Arc<AuthBehaviors<HttpTransport>>,
    counters: &CounterRegistry,
    policy: DispatchPolicy<AuthCase>,
) -> anyhow::Result<RunAggregate> {
    let cases = Arc::new(cli.suite.case_set(behaviors, counters)?);
    let vu = match config.run.seed {
        Some(seed) => VirtualUser::with_rng(cases, policy, StdRng::seed_from_u64(seed)),
        None => VirtualUser::new(cases, policy),
    };

    tracing::info!(
        "Suite {}, profile {}",
        cli.suite.name(),
        cli.profile.name()
    );
    let scenario = Scenario::<RunAggregate, _, _>::builder()
        .name(format!("{}-{}", cli.suite.name(), cli.profile.name()))
        .action(move || {
            let vu = vu.clone();
            async move { vu.run_iteration().await }
        })
        .min_iteration_duration(cli.profile.min_iteration_duration())
        .graceful_stop(cli.profile.graceful_stop())
        .build();

    let aggregate = match cli.iterations {
        Some(iterations) => {
            SharedIterationsExecutor::builder()
                .iterations(iterations)
                .build()
                .exec(&scenario)
                .await?
        }
        None => {
            RampingVusExecutor::builder()
                .stages(cli.profile.stages(&config.loads))
                .build()
                .exec(&scenario)
                .await?
        }
    };
    Ok(aggregate)
}

fn exit_status(report: &RunReport) -> u8 {
    if report.thresholds_passed() {
        0
    } else {
        tracing::error!("Some thresholds have been crossed");
        THRESHOLDS_CROSSED
    }
}
