use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use caseflow::{discover_case_files, CaseRunner, RunnerConfig, NAME, VERSION};

#[derive(Parser, Debug)]
#[command(name = "caseflow", version, about = "Data-driven HTTP API test runner")]
struct Cli {
    /// Runner configuration file
    #[arg(short, long, default_value = "caseflow.yaml")]
    config: PathBuf,

    /// Case directory, overriding the configured one
    #[arg(short = 'd', long)]
    case_dir: Option<PathBuf>,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    log::info!("{} v{}", NAME, VERSION);

    let config = match RunnerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let case_dir = cli.case_dir.unwrap_or_else(|| config.case_dir.clone());

    let files = match discover_case_files(&case_dir) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Failed to discover case files under {}: {}", case_dir.display(), e);
            return ExitCode::FAILURE;
        }
    };
    if files.is_empty() {
        eprintln!("No case files found under {}", case_dir.display());
        return ExitCode::FAILURE;
    }

    let runner = CaseRunner::new(&config, &cli.config);
    match runner.run_files(&files).await {
        Ok(summary) => {
            println!(
                "{} passed, {} failed, {} skipped",
                summary.passed, summary.failed, summary.skipped
            );
            if summary.is_successful() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Run failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();
}
