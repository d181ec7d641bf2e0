//! In-memory package source.

use super::Repository;
use crate::error::Result;
use crate::package::{Package, SemanticVersion, id_eq};

/// A fixed list of packages held in memory.
#[derive(Debug, Clone)]
pub struct InMemoryRepository {
    name: String,
    packages: Vec<Package>,
    supports_prerelease: bool,
}

impl InMemoryRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            packages: Vec::new(),
            supports_prerelease: true,
        }
    }

    /// Add a package, replacing an existing one with the same identity.
    pub fn add(&mut self, package: Package) {
        self.packages.retain(|p| p.identity != package.identity);
        self.packages.push(package);
    }

    pub fn with(mut self, package: Package) -> Self {
        self.add(package);
        self
    }

    pub fn without_prerelease_support(mut self) -> Self {
        self.supports_prerelease = false;
        self
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl Repository for InMemoryRepository {
    fn source(&self) -> String {
        self.name.clone()
    }

    fn supports_prerelease_packages(&self) -> bool {
        self.supports_prerelease
    }

    fn get_packages(&self) -> Result<Vec<Package>> {
        Ok(self.packages.clone())
    }

    fn find_packages_by_id(&self, id: &str) -> Result<Vec<Package>> {
        Ok(self
            .packages
            .iter()
            .filter(|p| id_eq(p.id(), id))
            .cloned()
            .collect())
    }

    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>> {
        Ok(self
            .packages
            .iter()
            .find(|p| id_eq(p.id(), id) && p.version() == version)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures::*;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new("local")
            .with(package("A", "1.0"))
            .with(package("A", "1.2"))
            .with(package("B", "2.0"))
    }

    #[test]
    fn test_find_packages_by_id_is_case_insensitive() {
        let found = repo().find_packages_by_id("a").unwrap();
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_find_package_exact() {
        let repo = repo();
        let found = repo.find_package("A", &version("1.2.0")).unwrap();
        assert_eq!(found.unwrap().identity, identity("A", "1.2"));
        assert!(repo.find_package("A", &version("1.1")).unwrap().is_none());
        assert!(repo.exists("b", &version("2.0")).unwrap());
    }

    #[test]
    fn test_add_replaces_same_identity() {
        let mut repo = repo();
        repo.add(package("a", "1.0").unlisted());
        assert_eq!(repo.len(), 3);
        let found = repo.find_package("A", &version("1.0")).unwrap().unwrap();
        assert!(!found.listed);
    }
}
