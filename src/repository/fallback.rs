//! Fallback repository: dependency-only delegation to other sources.

use std::sync::Arc;

use log::{debug, warn};

use super::{Repository, SharedRepository};
use crate::error::Result;
use crate::package::{Dependency, Package, SemanticVersion};
use crate::resolver::{DependencyResolver, ResolveOptions, resolve_dependency};

/// Uses `primary` for everything, and consults `dependency_resolver` only
/// when a dependency cannot be satisfied by the primary.
///
/// Failures of the delegate are logged and treated as "nothing found", so an
/// unreachable secondary source never aborts resolution.
pub struct FallbackRepository {
    primary: SharedRepository,
    dependency_resolver: Arc<dyn DependencyResolver>,
}

impl FallbackRepository {
    pub fn new(primary: SharedRepository, dependency_resolver: Arc<dyn DependencyResolver>) -> Self {
        Self {
            primary,
            dependency_resolver,
        }
    }

    pub fn primary(&self) -> &SharedRepository {
        &self.primary
    }
}

impl Repository for FallbackRepository {
    fn source(&self) -> String {
        self.primary.source()
    }

    fn supports_prerelease_packages(&self) -> bool {
        self.primary.supports_prerelease_packages()
    }

    fn get_packages(&self) -> Result<Vec<Package>> {
        self.primary.get_packages()
    }

    fn find_packages_by_id(&self, id: &str) -> Result<Vec<Package>> {
        self.primary.find_packages_by_id(id)
    }

    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>> {
        self.primary.find_package(id, version)
    }

    fn exists(&self, id: &str, version: &SemanticVersion) -> Result<bool> {
        self.primary.exists(id, version)
    }
}

impl DependencyResolver for FallbackRepository {
    fn resolve_dependency(
        &self,
        dependency: &Dependency,
        options: &ResolveOptions,
    ) -> Result<Option<Package>> {
        if let Some(package) = resolve_dependency(self.primary.as_ref(), dependency, options)? {
            return Ok(Some(package));
        }

        debug!(
            "'{}' cannot satisfy {}, trying fallback sources",
            self.primary.source(),
            dependency
        );
        match self.dependency_resolver.resolve_dependency(dependency, options) {
            Ok(found) => Ok(found),
            Err(e) => {
                warn!("Fallback resolution of {} failed: {}", dependency, e);
                Ok(None)
            }
        }
    }
}
