use anyhow::Result;
use std::sync::Arc;

use crate::{planner::PlanOptions, runtime::Runtime};

use super::{apply, config::Config, services::Services};

/// Uninstall a package from the configured consumer, or from the shared
/// store when no consumer is given.
#[tracing::instrument(skip(runtime, config, options))]
pub async fn uninstall<R: Runtime + 'static>(
    runtime: R,
    config: Config,
    id: &str,
    options: PlanOptions,
) -> Result<()> {
    let runtime = Arc::new(runtime);
    let services = Services::from_config(runtime.clone(), &config)?;
    let plan = services
        .planner
        .uninstall(&services.store, config.consumer.as_deref(), id, &options)?;
    apply(runtime.as_ref(), &config, &services, &plan).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::commands::install;
    use crate::error::Error;
    use crate::runtime::RealRuntime;
    use crate::store::LocalStore;

    #[tokio::test]
    async fn test_uninstall_with_dependencies() {
        let dir = tempfile::tempdir().unwrap();
        let config = feed_config(dir.path(), &[("a1.json", A_1_0), ("b1.json", B_1_0)]);
        install(RealRuntime, config.clone(), "A", None, PlanOptions::default())
            .await
            .unwrap();

        let options = PlanOptions {
            remove_dependencies: true,
            ..Default::default()
        };
        uninstall(RealRuntime, config.clone(), "A", options)
            .await
            .unwrap();

        let store = LocalStore::load(&RealRuntime, &config.store_path()).unwrap();
        assert!(store.installed().is_empty());
        assert!(!dir.path().join("packages/a.1.0").exists());
        assert!(!dir.path().join("packages/b.1.0").exists());
    }

    #[tokio::test]
    async fn test_uninstall_blocked_by_dependent() {
        let dir = tempfile::tempdir().unwrap();
        let config = feed_config(dir.path(), &[("a1.json", A_1_0), ("b1.json", B_1_0)]);
        install(RealRuntime, config.clone(), "A", None, PlanOptions::default())
            .await
            .unwrap();

        let err = uninstall(RealRuntime, config, "B", PlanOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::PackageHasDependents { .. })
        ));
    }
}
