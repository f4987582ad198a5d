//! Entry point for the Payroll Engine binary.
//!
//! Running this binary starts an HTTP server exposing the payroll API.
//! Settings come from `PAYROLL_*` environment variables (see
//! `config::EngineConfig`); log verbosity follows `RUST_LOG`.

use payroll_engine::config::EngineConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Invalid configuration: {:#}", err);
            std::process::exit(1);
        }
    };
    if let Err(err) = payroll_engine::api::serve(config).await {
        tracing::error!("Error running server: {:#}", err);
        std::process::exit(1);
    }
}
