use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::{signal, sync::mpsc};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use zeronav::config::{Backend, Cli, Config, default_config_dir, default_config_path};
use zeronav::handler::{AppState, app};
use zeronav::kv::{KvStore, LibsqlKv, MemoryKv};
use zeronav::store::RecordStore;

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    // If --config is provided, its parent directory holds the database.
    // Otherwise use ~/.zeronav/ for both.
    let (config_path, data_dir) = match args.config_path {
        Some(path) => {
            let path = std::path::PathBuf::from(path);
            let dir = path
                .parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| std::path::PathBuf::from("."));
            (path, dir)
        }
        None => (default_config_path(), default_config_dir()),
    };

    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        eprintln!("failed to create data directory {:?}: {}", data_dir, e);
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("zeronav.svc starting");

    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!(error = %e, "no .env file loaded");
    }

    let cfg = Config::new(&config_path.to_string_lossy()).unwrap_or_else(|e| {
        tracing::error!(error = %e, path = ?config_path, "failed to load config file");
        std::process::exit(1);
    });

    let cancellation_token = CancellationToken::new();
    let (shutdown_complete_tx, mut shutdown_complete_rx) = mpsc::channel::<()>(1);

    let kv: Arc<dyn KvStore> = match cfg.app.backend {
        Backend::Memory => {
            tracing::warn!("running with the in-memory store, edits are lost on restart");
            Arc::new(MemoryKv::new())
        }
        Backend::Libsql => {
            let db = Arc::new(LibsqlKv::new(&cfg, &data_dir).await.unwrap_or_else(|e| {
                tracing::error!(error = %e, "failed to setup database");
                std::process::exit(1);
            }));

            // Expired backups are already invisible to reads; this only reclaims space.
            let purge_db = db.clone();
            let purge_token = cancellation_token.clone();
            let purge_done = shutdown_complete_tx.clone();
            let purge_every = Duration::from_secs(cfg.app.purge_interval_seconds.max(1));
            tokio::spawn(async move {
                let _done = purge_done;
                let mut interval = tokio::time::interval(purge_every);
                loop {
                    tokio::select! {
                        _ = interval.tick() => {
                            match purge_db.purge_expired().await {
                                Ok(0) => {}
                                Ok(n) => tracing::info!(removed = n, "purged expired entries"),
                                Err(e) => tracing::warn!("failed to purge expired entries: {}", e),
                            }
                        }
                        _ = purge_token.cancelled() => {
                            tracing::info!("purge task shutting down");
                            break;
                        }
                    }
                }
            });

            db
        }
    };

    let store = RecordStore::new(kv)
        .with_key(cfg.app.get_record_key())
        .with_backup_ttl(cfg.app.backup_ttl())
        .with_defaults(cfg.site.custom_elements());
    let router = app(AppState::new(store, cfg.app.get_admin_token()));

    let address = format!("0.0.0.0:{}", cfg.app.get_port());
    let listener = tokio::net::TcpListener::bind(&address).await.unwrap_or_else(|e| {
        tracing::error!(error = %e, "failed to setup tcp listener");
        std::process::exit(1);
    });

    tracing::info!("zeronav.svc running on {}", &address);
    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
                std::process::exit(1);
            }
        }
        _ = signal::ctrl_c() => {
            tracing::info!("ctrl+c signal received, preparing to shutdown");
            cancellation_token.cancel();
        }
    }

    drop(shutdown_complete_tx);
    shutdown_complete_rx.recv().await;
    tracing::info!("zeronav.svc going off, graceful shutdown complete");
}
