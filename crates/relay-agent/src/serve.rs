//! `relayd serve`.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use relay_auth::AuthorizationGate;
use relay_registry::sqlite::PoolConfig;
use relay_registry::{
    ConnectionRegistry, ConnectionStore, MemoryStore, SqliteStore, spawn_expiry_sweeper,
};
use relay_server::{RelayServer, ServerConfig};
use relay_settings::{RegistryBackend, RegistrySettings, RelaySettings};
use tracing::info;

use crate::ServeArgs;

/// Fold command-line overrides into the loaded settings.
fn apply_args(settings: &mut RelaySettings, args: &ServeArgs) {
    if let Some(host) = &args.host {
        settings.server.host.clone_from(host);
    }
    if let Some(port) = args.port {
        settings.server.port = port;
    }
    if let Some(db_path) = &args.db_path {
        settings.registry.backend = RegistryBackend::Sqlite;
        settings.registry.db_path = db_path.to_string_lossy().into_owned();
    }
}

/// Open the configured registry backend.
fn open_store(registry: &RegistrySettings, home: &Path) -> Result<Arc<dyn ConnectionStore>> {
    match registry.backend {
        RegistryBackend::Memory => Ok(Arc::new(MemoryStore::new())),
        RegistryBackend::Sqlite => {
            let path = registry.resolved_db_path(home);
            let store = SqliteStore::open(&path, &PoolConfig::default())
                .with_context(|| format!("Failed to open registry database: {}", path.display()))?;
            info!(path = %path.display(), "sqlite registry opened");
            Ok(Arc::new(store))
        }
    }
}

pub(crate) async fn run(args: ServeArgs) -> Result<()> {
    let settings_path = args
        .settings
        .clone()
        .unwrap_or_else(relay_settings::settings_path);
    let mut settings = relay_settings::load_settings_from_path(&settings_path)
        .with_context(|| format!("Failed to load settings: {}", settings_path.display()))?;
    apply_args(&mut settings, &args);

    relay_core::logging::init_subscriber(&settings.logging.level);
    let metrics = relay_server::metrics::install_recorder()
        .context("Failed to install metrics recorder")?;

    let store = open_store(&settings.registry, &relay_settings::settings_dir())?;
    let registry = Arc::new(ConnectionRegistry::new(store).with_ttl(settings.registry.ttl()));
    let gate = Arc::new(
        AuthorizationGate::from_settings(&settings.auth)
            .context("Failed to build authorization gate")?,
    );

    let server = RelayServer::new(ServerConfig::from(&settings.server), gate, registry.clone())
        .with_metrics(metrics);
    let (addr, handle) = server.listen().await.context("Failed to bind")?;
    let sweeper = spawn_expiry_sweeper(
        registry,
        settings.registry.sweep_interval(),
        server.shutdown().token(),
    );

    info!(
        %addr,
        backend = ?settings.registry.backend,
        version = relay_core::constants::VERSION,
        "relay listening on ws://{addr}/ws"
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    info!("shutting down");
    server.shutdown().drain(vec![handle, sweeper], None).await;
    info!("shutdown complete");
    Ok(())
}
