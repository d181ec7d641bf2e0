//! Service factory for building application dependencies.
//!
//! This module separates the construction of services (source registry,
//! planner, store, installer) from the configuration. Services are built
//! from configuration values but are not part of the configuration itself.

use std::sync::Arc;

use anyhow::{Context, Result};
use log::debug;

use crate::{
    application::{FsPackageInstaller, PackageInstaller},
    planner::Planner,
    repository::{FeedRepositoryFactory, SharedRepository, SourceRegistry},
    resolver::DependencyResolver,
    runtime::Runtime,
    store::LocalStore,
};

use super::config::Config;

/// Build a SourceRegistry with every configured source
pub fn build_source_registry<R: Runtime + 'static>(
    runtime: Arc<R>,
    config: &Config,
) -> SourceRegistry {
    let mut registry = SourceRegistry::new(Arc::new(FeedRepositoryFactory::new(runtime)));
    for entry in &config.sources {
        registry.register(entry.clone());
    }
    registry
}

/// Name of the source package lookups start from.
pub fn active_source<'a>(registry: &'a SourceRegistry, config: &'a Config) -> Result<&'a str> {
    match config.active.as_deref() {
        Some(name) => Ok(name),
        None => registry
            .default_name()
            .context("No package source is registered"),
    }
}

/// Load the persisted store for `config`.
pub fn load_store<R: Runtime>(runtime: &R, config: &Config) -> Result<Arc<LocalStore>> {
    Ok(Arc::new(LocalStore::load(runtime, &config.store_path())?))
}

/// Everything a planning command needs.
pub struct Services {
    pub registry: SourceRegistry,
    /// Root lookups: the active source first, then the others.
    pub source: SharedRepository,
    pub planner: Planner,
    pub store: Arc<LocalStore>,
    pub installer: Arc<dyn PackageInstaller>,
}

impl Services {
    pub fn from_config<R: Runtime + 'static>(runtime: Arc<R>, config: &Config) -> Result<Self> {
        let registry = build_source_registry(runtime.clone(), config);
        let active = active_source(&registry, config)?.to_string();
        debug!("Active source: {}", active);

        let source: SharedRepository = Arc::new(registry.priority_for(&active)?);
        let resolver: Arc<dyn DependencyResolver> = Arc::new(registry.fallback_for(&active)?);
        let planner = Planner::new(source.clone(), resolver);

        let store = load_store(runtime.as_ref(), config)?;
        let installer: Arc<dyn PackageInstaller> =
            Arc::new(FsPackageInstaller::new(runtime, config.root.clone()));

        Ok(Self {
            registry,
            source,
            planner,
            store,
            installer,
        })
    }
}
