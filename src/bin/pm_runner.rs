//! CLI entry point for the Puppetmaster Runner.

use std::process::ExitCode;

use puppetmaster::config::RunConfig;
use puppetmaster::harness;

fn main() -> ExitCode {
    puppetmaster::error::install_fatal_panic_hook();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match RunConfig::parse(std::env::args().skip(1)) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("pm-runner: {err}");
            return ExitCode::from(err.exit_code() as u8);
        }
    };

    match harness::run(&config) {
        Ok(summary) => {
            tracing::info!(
                total = summary.total_txns,
                completed = summary.completed_txns,
                elapsed_s = summary.elapsed.as_secs_f64(),
                "run complete"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("pm-runner: {err}");
            ExitCode::from(err.exit_code() as u8)
        }
    }
}
