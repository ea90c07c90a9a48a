//! Daemon mode – serve the reference host over a Unix socket.

use anyhow::Context;
use bridge::host::{daemon, DeviceStore, Host, MemoryDeviceStore, YamlDeviceStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn build_host(inventory: Option<PathBuf>) -> Host {
    match inventory {
        Some(path) => {
            let store = YamlDeviceStore::new(path);
            if let Err(e) = store.list() {
                // Not fatal: the file is re-read on every call.
                tracing::warn!(path = %store.path().display(), error = %e, "inventory not readable yet");
            }
            Host::with_store(store)
        }
        None => {
            tracing::warn!("no inventory configured; serving an empty device list");
            Host::with_store(MemoryDeviceStore::default())
        }
    }
}

pub async fn run_daemon(socket_path: &Path, inventory: Option<PathBuf>) -> anyhow::Result<()> {
    let host = build_host(inventory);
    let listener = daemon::bind(socket_path)
        .with_context(|| format!("cannot bind socket {}", socket_path.display()))?;

    eprintln!(
        "devctl daemon listening on {} (commands: {})",
        socket_path.display(),
        host.commands().join(", ")
    );

    tokio::select! {
        _ = daemon::serve(listener, Arc::new(host)) => {}
        res = tokio::signal::ctrl_c() => {
            res.context("cannot listen for shutdown signal")?;
            tracing::info!("shutting down");
        }
    }

    let _ = std::fs::remove_file(socket_path);
    Ok(())
}
