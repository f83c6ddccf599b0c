//! # synhomed, the synhome daemon
//!
//! Composition root that wires the device registry and the protocol adapters
//! together and keeps the adapters connected until shutdown.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise structured logging
//! - Build the device registry from the configured devices
//! - Construct every configured protocol adapter and bind status fan-in
//! - Connect and run discovery on all adapters
//! - Disconnect cleanly on SIGINT
//!
//! The interpretation service is an external collaborator; front-ends embed
//! [`synhome_app::services::dispatch::DispatchEngine`] with their own
//! [`synhome_app::ports::Interpreter`] over the registries built here.
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no domain logic belongs here.

mod adapter;
mod config;

use std::sync::Arc;

use anyhow::Context;
use synhome_app::ports::ProtocolAdapter;
use synhome_app::services::adapter_registry::AdapterRegistry;
use synhome_app::services::device_registry::DeviceRegistry;
use tracing_subscriber::EnvFilter;

use crate::adapter::Adapter;
use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load().context("loading configuration")?;

    let filter = EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Devices
    let devices = Arc::new(
        DeviceRegistry::from_configs(config.devices).context("building device registry")?,
    );
    tracing::info!(count = devices.len(), "devices registered");

    // Adapters
    let mut adapters = AdapterRegistry::new(Arc::clone(&devices));
    for adapter_config in config.adapters {
        let adapter = Adapter::from_config(adapter_config);
        tracing::info!(adapter_id = %adapter.id(), kind = adapter.kind(), "adapter configured");
        adapters.insert(adapter);
    }
    adapters.bind_status_callbacks();

    let failed = adapters
        .connect_all()
        .await
        .iter()
        .filter(|(_, result)| result.is_err())
        .count();
    if failed > 0 {
        tracing::warn!(failed, total = adapters.len(), "some adapters are not connected");
    }
    adapters.discover_all().await;

    tracing::info!("synhomed running, press Ctrl-C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;

    tracing::info!("shutting down");
    adapters.disconnect_all().await;
    Ok(())
}
