pub mod error;
pub mod http;
pub mod models;
pub mod state;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use keysweep_config::{KeysweepConfig, StoreKind};
use keysweep_core::{MemoryStore, WalkOptions};
use keysweep_vault_kv::{VaultConfig, VaultKvStore};
use tokio::net::TcpListener;
use tracing::{info, warn};

pub use state::{AppState, SharedStore};
pub use telemetry::CorrelationId;

pub async fn run(config: KeysweepConfig) -> anyhow::Result<()> {
    let state = build_state(&config)?;

    let listener = TcpListener::bind(config.server.bind)
        .await
        .with_context(|| format!("failed to bind http listener on {}", config.server.bind))?;
    let http_addr = listener.local_addr()?;
    info!(
        %http_addr,
        store = %config.store.kind,
        root = %state.root(),
        "http server listening"
    );

    axum::serve(listener, http::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")
}

pub fn build_state(config: &KeysweepConfig) -> anyhow::Result<AppState> {
    let store = build_store(config)?;
    let options = WalkOptions {
        max_depth: config.rotation.max_depth,
        attribution: config.rotation.write_error_attribution,
    };
    Ok(AppState::new(store, &config.store.root, options))
}

pub fn build_store(config: &KeysweepConfig) -> anyhow::Result<SharedStore> {
    match config.store.kind {
        StoreKind::Vault => {
            let vault = &config.vault;
            let Some(address) = vault.address.clone() else {
                bail!("vault store selected but no address configured; set VAULT_ADDR");
            };
            let Some(token) = vault.token.clone().filter(|token| !token.is_empty()) else {
                bail!("vault store selected but no token configured; set VAULT_TOKEN");
            };
            let mut settings = VaultConfig::new(address, token)
                .with_namespace(vault.namespace.clone())
                .with_timeout(Duration::from_secs(vault.timeout_secs))
                .insecure_skip_tls(vault.insecure_skip_tls);
            if let Some(bundle) = &vault.ca_bundle {
                settings = settings.with_ca_bundle_file(bundle)?;
            }
            let store = VaultKvStore::new(settings).context("failed to set up vault client")?;
            info!(address = %store.config().address(), "using vault secret store");
            Ok(Arc::new(store))
        }
        StoreKind::Memory => {
            warn!("using in-memory secret store; data is lost on restart");
            Ok(Arc::new(
                MemoryStore::new().with_versioned_mount(&config.store.root),
            ))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(?err, "failed to install ctrl-c handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => warn!(?err, "failed to install sigterm handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
