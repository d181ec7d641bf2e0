//! Aggregate repository: a fan-out reader over several sources.

use log::warn;

use super::{Repository, SharedRepository, extend_unique};
use crate::error::Result;
use crate::package::{Package, SemanticVersion};

pub const AGGREGATE_SOURCE_NAME: &str = "(Aggregate source)";

/// Unions the results of its members, probing them in order.
///
/// A member that fails is skipped when `ignore_failing_repositories` is set;
/// otherwise its error is returned to the caller.
pub struct AggregateRepository {
    repositories: Vec<SharedRepository>,
    ignore_failing_repositories: bool,
}

impl AggregateRepository {
    /// Strict aggregate: the first member failure is propagated.
    pub fn new(repositories: Vec<SharedRepository>) -> Self {
        Self {
            repositories,
            ignore_failing_repositories: false,
        }
    }

    /// Best-effort aggregate: failing members are treated as empty.
    pub fn tolerant(repositories: Vec<SharedRepository>) -> Self {
        Self {
            repositories,
            ignore_failing_repositories: true,
        }
    }

    pub fn ignore_failing_repositories(&self) -> bool {
        self.ignore_failing_repositories
    }

    pub fn repositories(&self) -> &[SharedRepository] {
        &self.repositories
    }

    /// Run `query` on a member, turning failures into `None` in tolerant mode.
    fn query<T>(
        &self,
        repository: &SharedRepository,
        query: impl FnOnce(&dyn Repository) -> Result<T>,
    ) -> Result<Option<T>> {
        match query(repository.as_ref()) {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.ignore_failing_repositories => {
                warn!("Skipping package source '{}': {}", repository.source(), e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl Repository for AggregateRepository {
    fn source(&self) -> String {
        AGGREGATE_SOURCE_NAME.to_string()
    }

    fn supports_prerelease_packages(&self) -> bool {
        self.repositories
            .iter()
            .any(|r| r.supports_prerelease_packages())
    }

    fn get_packages(&self) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        for repository in &self.repositories {
            if let Some(found) = self.query(repository, |r| r.get_packages())? {
                extend_unique(&mut packages, found);
            }
        }
        Ok(packages)
    }

    fn find_packages_by_id(&self, id: &str) -> Result<Vec<Package>> {
        let mut packages = Vec::new();
        for repository in &self.repositories {
            if let Some(found) = self.query(repository, |r| r.find_packages_by_id(id))? {
                extend_unique(&mut packages, found);
            }
        }
        Ok(packages)
    }

    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>> {
        for repository in &self.repositories {
            if let Some(Some(package)) = self.query(repository, |r| r.find_package(id, version))? {
                return Ok(Some(package));
            }
        }
        Ok(None)
    }

    fn exists(&self, id: &str, version: &SemanticVersion) -> Result<bool> {
        for repository in &self.repositories {
            if let Some(true) = self.query(repository, |r| r.exists(id, version))? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
