use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use shortcdn::{api, config::Config, object_store as obj, AppState, StorageRoots};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());

    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    match log_format.to_lowercase().as_str() {
        "gcp" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_stackdriver::layer())
                .init();
        }
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(true)
                        .with_span_list(false),
                )
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
        }
    }

    info!(version = env!("CARGO_PKG_VERSION"), "shortcdn starting");

    // Load configuration
    let config = Config::load()?;
    info!("Public base URL: {}", config.public_base());

    // Prepare upload roots
    let roots = StorageRoots::prepare(&config.storage)?;
    info!(
        upload = %roots.upload.display(),
        admin = %roots.admin.display(),
        "Upload roots ready"
    );
    let object_store: Arc<dyn obj::ObjectStore> =
        Arc::new(obj::LocalStore::new(&[&roots.upload, &roots.admin])?);

    // Open and probe the key store; a failed probe leaves the service degraded
    let keys = shortcdn::open_key_store(
        &config.node.data_dir,
        Duration::from_secs(config.node.probe_timeout_seconds),
    )
    .await;
    match keys {
        Some(_) => info!("Key store opened at: {}", config.node.data_dir),
        None => tracing::error!("Key store unusable, key resolution will report unavailable"),
    }

    // Periodic retention pass
    let retention_handle = if config.retention.enabled {
        let policy = config.retention_policy();
        let upload_root = roots.upload.clone();
        let period = Duration::from_secs(config.retention.interval_seconds.max(1));
        info!(
            min_days = config.retention.min_days,
            max_days = config.retention.max_days,
            interval_secs = period.as_secs(),
            "File retention enabled"
        );
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                let policy = policy.clone();
                let root = upload_root.clone();
                let pass = tokio::task::spawn_blocking(move || {
                    policy.reap(&root, chrono::Utc::now())
                })
                .await;
                match pass {
                    Ok(Ok(stats)) => info!(
                        scanned = stats.scanned,
                        deleted = stats.deleted,
                        failed = stats.failed,
                        "Retention pass complete"
                    ),
                    Ok(Err(e)) => tracing::warn!(error = %e, "Retention pass failed"),
                    Err(e) => tracing::warn!(error = %e, "Retention task panicked"),
                }
            }
        }))
    } else {
        None
    };

    // Create shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        roots,
        keys,
        object_store,
    });

    // Build and start the HTTP server
    let app = api::create_router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&config.node.bind_address).await?;
    info!("Listening on: {}", config.node.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Cleanup: abort background tasks
    info!("Shutting down background tasks");
    if let Some(handle) = retention_handle {
        handle.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining connections");
}
