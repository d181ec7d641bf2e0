use anyhow::{Result, bail};
use log::info;
use std::sync::Arc;

use crate::{application::Restorer, runtime::Runtime};

use super::{config::Config, services::Services};

/// Put back the files of every recorded package missing from disk.
///
/// Ctrl-C stops the restore before the next package.
#[tracing::instrument(skip(runtime, config))]
pub async fn restore<R: Runtime + 'static>(runtime: R, config: Config) -> Result<()> {
    let runtime = Arc::new(runtime);
    let services = Services::from_config(runtime.clone(), &config)?;
    let restorer = Restorer::new(
        services.store.clone(),
        services.source.clone(),
        services.installer.clone(),
    );

    let missing = restorer.missing_packages();
    if missing.is_empty() {
        println!("All packages are present.");
        return Ok(());
    }
    if config.dry_run {
        for identity in missing {
            println!("Restore '{}'", identity);
        }
        return Ok(());
    }

    let handle = restorer.restore();
    let summary = tokio::select! {
        summary = handle.clone() => summary,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, stopping restore");
            restorer.cancel();
            handle.await
        }
    };

    for identity in &summary.restored {
        println!("Restored '{}'", identity);
    }
    for warning in &summary.warnings {
        eprintln!("Warning: {}", warning);
    }
    for (identity, error) in &summary.failed {
        eprintln!("Failed: '{}': {}", identity, error);
    }
    if summary.cancelled {
        bail!("Restore was cancelled");
    }
    if !summary.failed.is_empty() {
        bail!("{} package(s) could not be restored", summary.failed.len());
    }
    Ok(())
}
