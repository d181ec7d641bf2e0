use anyhow::{Context, Result};
use std::sync::Arc;

use crate::{
    package::SemanticVersion,
    planner::{OperationTarget, PlanOptions},
    runtime::Runtime,
};

use super::{apply, config::Config, services::Services, target};

/// Install a package (at `version`, or the latest) into the configured consumer.
#[tracing::instrument(skip(runtime, config, options))]
pub async fn install<R: Runtime + 'static>(
    runtime: R,
    config: Config,
    id: &str,
    version: Option<&str>,
    mut options: PlanOptions,
) -> Result<()> {
    let version = version
        .map(|v| v.parse::<SemanticVersion>())
        .transpose()
        .with_context(|| format!("Invalid version for '{}'", id))?;
    options.framework = config.framework.clone();

    let runtime = Arc::new(runtime);
    let services = Services::from_config(runtime.clone(), &config)?;
    let target = target(&config);
    let plan = services
        .planner
        .install(&services.store, &target, id, version.as_ref(), &options)?;

    let summary = apply(runtime.as_ref(), &config, &services, &plan).await?;

    if let (OperationTarget::Consumer(consumer), Some(framework)) = (&target, &config.framework)
        && !config.dry_run
        && !summary.outcomes.is_empty()
    {
        services.store.set_framework(consumer, Some(framework.clone()));
        services.store.save(runtime.as_ref(), &config.store_path())?;
    }
    Ok(())
}
