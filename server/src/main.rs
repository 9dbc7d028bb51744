//! Lexicon registry server.
//!
//! Loads layered configuration, opens the term store once, and serves the
//! registry over HTTP until interrupted.

mod http;

use std::fs::{self, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use lexicon_config::{LexiconConfig, LoadedConfig, LoggingConfig};
use lexicon_registry::{Lexicon, SqliteTermStore};

#[tokio::main]
async fn main() -> Result<()> {
    let LoadedConfig { config, warnings } =
        LexiconConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging, warnings);

    let store = SqliteTermStore::open(&config.database.path).with_context(|| {
        format!(
            "Failed to open lexicon database {}",
            config.database.path.display()
        )
    })?;
    let lexicon = Arc::new(Lexicon::new(store));

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!(%addr, db = %config.database.path.display(), "Lexicon server listening");

    let app = http::router(Arc::clone(&lexicon));
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    match Arc::try_unwrap(lexicon) {
        Ok(lexicon) => {
            drop(lexicon.into_store());
            tracing::info!("Lexicon store closed");
        }
        Err(_) => tracing::warn!("Lexicon store still referenced at shutdown"),
    }
    Ok(())
}

/// Install the subscriber, then emit warnings collected before it existed.
fn init_tracing(logging: &LoggingConfig, mut init_warnings: Vec<String>) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(&logging.level).unwrap_or_else(|e| {
            init_warnings.push(format!(
                "Invalid log level {:?} ({e}); using info",
                logging.level
            ));
            EnvFilter::new("info")
        })
    });

    let log_file = logging
        .file
        .as_deref()
        .and_then(|path| match open_log_file(path) {
            Ok(file) => Some((path.to_path_buf(), file)),
            Err(e) => {
                init_warnings.push(format!("Failed to open log file {}: {e}", path.display()));
                None
            }
        });
    let (log_path, file_layer) = match log_file {
        Some((path, file)) => (
            Some(path),
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file))),
        ),
        None => (None::<PathBuf>, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    if let Some(path) = log_path {
        tracing::info!(path = %path.display(), "Logging initialized");
    }
    for warning in init_warnings {
        tracing::warn!("{warning}");
    }
}

fn open_log_file(path: &Path) -> std::io::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("Shutdown requested");
}
