mod config;
mod deadline;
mod fixture;
mod interpreter;
mod runner;
mod scaffold;


use anyhow::Context;
use clap::Parser;
use config::InterpreterConfigManager;
use harness_common::config::{HarnessConfig, ENV_LOG_FORMAT};
use harness_common::report;
use harness_common::suites::SuiteVersion;
use harness_common::types::aggregate_score;
use scaffold::TestScaffold;
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

#[derive(Parser)]
#[command(name = "harness-runner")]
#[command(about = "Score an interpreter implementation against a versioned fixture suite", long_about = None)]
struct Cli {
    /// Suite version to run (1, 2, or 3); also selects the interpreter
    #[arg(value_parser = parse_version)]
    version: SuiteVersion,
}

fn parse_version(value: &str) -> Result<SuiteVersion, String> {
    value.parse()
}

/// `HARNESS_LOG_FORMAT=json` switches to structured JSON lines
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_line_number(true);

    match std::env::var(ENV_LOG_FORMAT).as_deref() {
        Ok("json") => builder.json().init(),
        _ => builder.init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing();

    let config = HarnessConfig::from_env().context("Invalid harness configuration")?;
    let registry = InterpreterConfigManager::load_or_default(&config.interpreter_config)?;
    info!("Loaded interpreter registry for versions: {:?}", registry.list_versions());

    let run_id = uuid::Uuid::new_v4();
    let span = info_span!("run", run_id = %run_id, suite = %cli.version);

    async move {
        let factory = registry.get_config(cli.version).factory();
        let cases = cli.version.cases();

        info!(
            interpreter = %factory.command(),
            cases = cases.len(),
            phase_timeout_secs = config.phase_timeout.as_secs(),
            fixture_root = %config.fixture_root.display(),
            report_mode = ?config.report_mode,
            "Harness configured"
        );

        let scaffold = TestScaffold::new(
            factory,
            config.phase_timeout,
            config.fixture_root.clone(),
        );

        let start = Instant::now();
        let results = runner::run_all_tests(&scaffold, &cases).await?;
        let execution_time = start.elapsed();

        let total_score = aggregate_score(&results).unwrap_or_else(|| {
            warn!("Suite has no test cases; reporting 0%");
            0.0
        });
        println!("Total Score: {:9.2}%", total_score);

        let path = report::write_report(&results, execution_time, config.report_mode)?;
        info!(path = %path.display(), score = total_score, "Report written");

        Ok::<(), anyhow::Error>(())
    }
    .instrument(span)
    .await
}
