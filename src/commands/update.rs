use anyhow::Result;
use std::sync::Arc;

use crate::{planner::PlanOptions, runtime::Runtime};

use super::{apply, config::Config, scope, services::Services};

/// Update one package, or every package in scope, to its newest version.
///
/// With `safe`, updates stay within the installed major.minor line.
#[tracing::instrument(skip(runtime, config, options))]
pub async fn update<R: Runtime + 'static>(
    runtime: R,
    config: Config,
    id: Option<&str>,
    safe: bool,
    mut options: PlanOptions,
) -> Result<()> {
    options.framework = config.framework.clone();

    let runtime = Arc::new(runtime);
    let services = Services::from_config(runtime.clone(), &config)?;
    let scope = scope(&config, id);
    let plan = if safe {
        services.planner.safe_update(&services.store, &scope, &options)?
    } else {
        services.planner.update(&services.store, &scope, &options)?
    };
    apply(runtime.as_ref(), &config, &services, &plan).await?;
    Ok(())
}
