//! Relayer CLI
//!
//! Relays one L2 message per invocation. Exits non-zero on invalid arguments,
//! on failure and when interrupted.

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, warn};

use relayer::program::{self, RelayerCliArgs};

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let args = RelayerCliArgs::parse();

    let errors = program::validate_args(&args);
    if !errors.is_empty() {
        for message in &errors {
            eprintln!("error: {}", message);
        }
        return ExitCode::FAILURE;
    }

    info!("Starting relay of {}", args.l2_transaction_hash);

    match program::run_until(&args, tokio::signal::ctrl_c()).await {
        Some(Ok(())) => ExitCode::SUCCESS,
        Some(Err(e)) => {
            if e.is_retryable() {
                warn!("Relay can be retried later");
            }
            error!("Relay failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
        None => ExitCode::FAILURE,
    }
}
