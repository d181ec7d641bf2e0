use anyhow::Result;
use std::sync::Arc;

use crate::{planner::PlanOptions, runtime::Runtime};

use super::{apply, config::Config, scope, services::Services};

/// Reinstall one package, or every package in scope, at its installed version.
#[tracing::instrument(skip(runtime, config, options))]
pub async fn reinstall<R: Runtime + 'static>(
    runtime: R,
    config: Config,
    id: Option<&str>,
    mut options: PlanOptions,
) -> Result<()> {
    options.framework = config.framework.clone();

    let runtime = Arc::new(runtime);
    let services = Services::from_config(runtime.clone(), &config)?;
    let plan = services
        .planner
        .reinstall(&services.store, &scope(&config, id), &options)?;
    let summary = apply(runtime.as_ref(), &config, &services, &plan).await?;

    if let (Some(consumer), Some(framework)) = (&config.consumer, &config.framework)
        && !config.dry_run
        && !summary.outcomes.is_empty()
    {
        services.store.set_framework(consumer, Some(framework.clone()));
        services.store.save(runtime.as_ref(), &config.store_path())?;
    }
    Ok(())
}
