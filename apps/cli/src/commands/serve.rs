//! Serve command implementation.

use std::net::SocketAddr;

use colored::Colorize;
use glosa_core::{Config, Glosa};

/// Execute the serve command. Runs until Ctrl+C.
pub async fn execute(config: Config, address: Option<SocketAddr>) -> anyhow::Result<()> {
    let address = address.unwrap_or(config.server.address);
    let glosa = Glosa::from_config(config)?;

    println!("{} http://{}", "Glosa listening on".bold().green(), address);
    glosa_core::server::run(glosa, address).await?;

    Ok(())
}
