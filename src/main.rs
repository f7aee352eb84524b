mod analyzer;
mod batch;
mod cache;
mod cli;
mod combine;
mod config;
mod defense;
mod error;
mod extract;
mod fingerprint;
mod llm;
mod llm_log;
mod questions;
mod run;
mod summary;
mod types;
mod util;
mod workflow;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::RootArgs;
use crate::error::find_run_error;

/// Environment variable holding an `EnvFilter` directive for diagnostics.
const LOG_ENV: &str = "DOCKET_LOG";

fn init_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn install_interrupt_handler() {
    let installed = ctrlc::set_handler(|| {
        eprintln!("\noperation interrupted");
        std::process::exit(1);
    });
    if let Err(err) = installed {
        tracing::warn!(error = %err, "cannot install interrupt handler");
    }
}

fn main() {
    let args = RootArgs::parse();
    init_logging(args.global.verbose);
    install_interrupt_handler();

    let code = match run(args) {
        Ok(()) => 0,
        Err((err, model)) => {
            eprintln!("error: {err:#}");
            if let Some(kind) = find_run_error(&err) {
                eprintln!("hint: {}", kind.remediation(&model));
            }
            1
        }
    };
    std::process::exit(code);
}

/// Load settings, apply overrides, and dispatch. The effective model is
/// returned with any error for the remediation hint.
fn run(args: RootArgs) -> Result<(), (anyhow::Error, String)> {
    let fallback_model = args
        .command
        .model()
        .or(args.global.model.as_deref())
        .unwrap_or(config::DEFAULT_MODEL)
        .to_string();
    let settings_path = config::settings_path().map_err(|err| (err, fallback_model.clone()))?;
    let settings = config::load_settings(&settings_path)
        .map_err(|err| (err, fallback_model.clone()))?
        .with_overrides(
            args.global.model.as_deref(),
            args.global.ollama_host.as_deref(),
            args.global.ollama_port,
        );
    let model = args
        .command
        .model()
        .map(str::to_string)
        .unwrap_or_else(|| settings.model.clone());
    tracing::info!(path = %settings_path.display(), model = %model, "settings loaded");
    workflow::dispatch(args.command, settings, &settings_path).map_err(|err| (err, model))
}
