//! Priority repository: the primary answers first, the secondary fills in.

use super::{Repository, SharedRepository, extend_unique};
use crate::error::Result;
use crate::package::{Package, SemanticVersion};

/// Layers `secondary` under `primary`.
///
/// Single-package lookups (`find_package`, `exists`) ask the primary first
/// and the secondary only on a miss. `find_packages_by_id` merges both,
/// primary entries first, dropping secondary duplicates of an identity.
/// `get_packages` covers the primary alone.
pub struct PriorityRepository {
    primary: SharedRepository,
    secondary: SharedRepository,
}

impl PriorityRepository {
    pub fn new(primary: SharedRepository, secondary: SharedRepository) -> Self {
        Self { primary, secondary }
    }

    pub fn primary(&self) -> &SharedRepository {
        &self.primary
    }

    pub fn secondary(&self) -> &SharedRepository {
        &self.secondary
    }
}

impl Repository for PriorityRepository {
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
        let mut packages = Vec::new();
        extend_unique(&mut packages, self.primary.find_packages_by_id(id)?);
        extend_unique(&mut packages, self.secondary.find_packages_by_id(id)?);
        Ok(packages)
    }

    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>> {
        match self.primary.find_package(id, version)? {
            Some(package) => Ok(Some(package)),
            None => self.secondary.find_package(id, version),
        }
    }

    fn exists(&self, id: &str, version: &SemanticVersion) -> Result<bool> {
        Ok(self.primary.exists(id, version)? || self.secondary.exists(id, version)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures::*;
    use crate::repository::{InMemoryRepository, MockRepository};
    use std::sync::Arc;

    fn primary() -> SharedRepository {
        Arc::new(InMemoryRepository::new("Source1").with(package("A", "1.0")))
    }

    fn secondary() -> SharedRepository {
        Arc::new(
            InMemoryRepository::new("Source2")
                .with(package("A", "1.2"))
                .with(package("A", "1.0").unlisted())
                .with(package("B", "3.0")),
        )
    }

    #[test]
    fn test_find_packages_by_id_primary_first() {
        let repo = PriorityRepository::new(primary(), secondary());
        let found = repo.find_packages_by_id("A").unwrap();

        let versions: Vec<String> = found.iter().map(|p| p.version().to_string()).collect();
        assert_eq!(versions, vec!["1.0", "1.2"]);
        // The duplicate A@1.0 comes from the primary
        assert!(found[0].listed);
    }

    #[test]
    fn test_find_package_prefers_primary() {
        // Secondary would panic if asked: the primary already has the package.
        let repo = PriorityRepository::new(primary(), Arc::new(MockRepository::new()));
        let found = repo.find_package("A", &version("1.0")).unwrap().unwrap();
        assert_eq!(found.identity, identity("A", "1.0"));
    }

    #[test]
    fn test_find_package_falls_back_to_secondary() {
        let repo = PriorityRepository::new(primary(), secondary());
        assert!(repo.find_package("B", &version("3.0")).unwrap().is_some());
        assert!(repo.exists("A", &version("1.2")).unwrap());
        assert!(!repo.exists("C", &version("1.0")).unwrap());
    }

    #[test]
    fn test_get_packages_only_primary() {
        let repo = PriorityRepository::new(primary(), secondary());
        let packages = repo.get_packages().unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(repo.source(), "Source1");
    }

    #[test]
    fn test_prerelease_flag_mirrors_primary() {
        let no_pre: SharedRepository =
            Arc::new(InMemoryRepository::new("P").without_prerelease_support());
        let repo = PriorityRepository::new(no_pre, secondary());
        assert!(!repo.supports_prerelease_packages());
    }

    #[test]
    fn test_nested_priority() {
        let inner = Arc::new(PriorityRepository::new(primary(), secondary()));
        let extra: SharedRepository =
            Arc::new(InMemoryRepository::new("Source3").with(package("A", "2.0")));
        let outer = PriorityRepository::new(inner, extra);

        let found = outer.find_packages_by_id("a").unwrap();
        assert_eq!(found.len(), 3);
        assert_eq!(found[2].version(), &version("2.0"));
    }
}
