//! Glosa Core Server - Entry Point
//!
//! This binary starts the Glosa HTTP server with configuration from files
//! and environment only. The `glosa` CLI offers the same server through
//! `glosa serve` with command-line overrides.

use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use glosa_core::{Glosa, config::Config, server};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glosa_core=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Failed to load configuration");
            std::process::exit(1);
        }
    };

    let address = config.server.address;
    let glosa = match Glosa::from_config(config) {
        Ok(glosa) => glosa,
        Err(e) => {
            error!(error = %e, "Failed to initialize backend");
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(glosa, address).await {
        error!(error = %e, "Server error");
        std::process::exit(1);
    }
}
