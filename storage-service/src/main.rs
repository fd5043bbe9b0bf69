// SPDX-License-Identifier: GPL-3.0-only

//! storage-poold - D-Bus daemon managing storage pools and their filesystems
//!
//! The daemon owns one in-memory [`Engine`] backed by the simulator and
//! exports it under the configured object root together with an
//! ObjectManager.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use storage_engine::{Engine, SimBackend};
use zbus::connection::Builder as ConnectionBuilder;

mod config;
mod error;
mod filesystem;
mod logging;
mod manager;
mod objects;
mod pool;
mod service;

use config::{BusKind, CONFIG_ENV, ServiceConfig};
use manager::{MANAGER_INTERFACE, Manager};
use objects::{BusTree, ObjectManager};
use service::PoolService;

#[derive(Debug, Parser)]
#[command(name = "storage-poold", version, about = "Storage pool manager daemon")]
struct Cli {
    /// Configuration file (overrides $STORAGE_POOLD_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Connect to the session bus instead of the system bus
    #[arg(long)]
    session: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "debug")
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

impl Cli {
    fn apply(&self, config: &mut ServiceConfig) {
        if self.session {
            config.dbus.bus = BusKind::Session;
        }
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_path = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let mut config = ServiceConfig::resolve(cli.config.as_deref(), env_path)
        .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate()?;

    let _log_guard = logging::init(&config.logging)?;

    tracing::info!("Starting storage-poold v{}", manager::version());

    let simulator = Arc::new(SimBackend::with_denominator(config.simulator.denominator));
    let engine = Arc::new(Engine::new(&config.dbus.object_root, simulator.clone()));
    let root = config.dbus.object_root.as_str();

    let builder = match config.dbus.bus {
        BusKind::System => ConnectionBuilder::system()?,
        BusKind::Session => ConnectionBuilder::session()?,
    };
    let connection = builder.build().await.context("Failed to connect to D-Bus")?;

    let tree = Arc::new(BusTree::new(connection.clone(), root)?);
    let service = Arc::new(PoolService::new(engine.clone(), simulator, tree));
    let server = connection.object_server();
    server.at(root, ObjectManager::new(service.clone())).await?;
    server.at(root, Manager::new(service)).await?;

    connection
        .request_name(config.dbus.name.as_str())
        .await
        .with_context(|| format!("Failed to register {} on the bus", config.dbus.name))?;

    tracing::info!("Service registered on D-Bus {:?} bus", config.dbus.bus);
    tracing::info!("  - {} at {root}", config.dbus.name);
    tracing::info!("  - {MANAGER_INTERFACE} and ObjectManager at {root}");
    if config.simulator.denominator > 0 {
        tracing::info!(
            "Simulator device-add fault injection enabled (1 in {})",
            config.simulator.denominator
        );
    }

    tracing::info!("Service ready, waiting for requests...");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Received shutdown signal");

    let objects = engine.managed_objects().await;
    for pool in objects.pools() {
        tracing::info!(
            "Pool {} still holds {} filesystem(s)",
            pool.name,
            objects.filesystems_of(&pool.id).count()
        );
    }
    match serde_json::to_string(&objects) {
        Ok(snapshot) => tracing::debug!("Final state: {snapshot}"),
        Err(e) => tracing::warn!("Could not serialize final state: {e}"),
    }

    tracing::info!("storage-poold shutting down");
    Ok(())
}
