//! One retention pass over the upload root, for running from cron.

use tracing::info;

use shortcdn::config::Config;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config::load()?;
    if !config.retention.enabled {
        info!("File retention disabled, nothing to do");
        return Ok(());
    }

    let root = &config.storage.upload_path;
    let stats = config.retention_policy().reap(root, chrono::Utc::now())?;
    info!(
        root = %root.display(),
        scanned = stats.scanned,
        deleted = stats.deleted,
        failed = stats.failed,
        "Retention pass complete"
    );
    Ok(())
}
