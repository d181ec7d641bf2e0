//! Directory-backed package feed.
//!
//! A feed is a directory of `*.json` package manifests, one package per file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::warn;

use super::{Repository, RepositoryFactory, SharedRepository};
use crate::error::{Error, Result};
use crate::package::{Package, SemanticVersion, id_eq};
use crate::runtime::Runtime;

pub struct LocalFeedRepository<R: Runtime> {
    runtime: Arc<R>,
    root: PathBuf,
    name: String,
}

impl<R: Runtime> LocalFeedRepository<R> {
    /// The source name is the root path as given.
    pub fn new(runtime: Arc<R>, root: PathBuf) -> Self {
        let name = root.display().to_string();
        Self {
            runtime,
            root,
            name,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Read every manifest in the feed.
    ///
    /// A missing directory makes the whole source unavailable; a single
    /// unreadable manifest is skipped with a warning.
    fn load_all(&self) -> Result<Vec<Package>> {
        if !self.runtime.is_dir(&self.root) {
            return Err(Error::source_unavailable(
                &self.name,
                "feed directory does not exist",
            ));
        }

        let entries = self
            .runtime
            .read_dir(&self.root)
            .map_err(|e| Error::source_unavailable(&self.name, e))?;

        let mut packages = Vec::new();
        for path in entries {
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = self
                .runtime
                .read_to_string(&path)
                .and_then(|content| Ok(serde_json::from_str::<Package>(&content)?));
            match parsed {
                Ok(package) => packages.push(package),
                Err(e) => warn!("Skipping invalid manifest {:?}: {}", path, e),
            }
        }
        Ok(packages)
    }
}

impl<R: Runtime> Repository for LocalFeedRepository<R> {
    fn source(&self) -> String {
        self.name.clone()
    }

    fn supports_prerelease_packages(&self) -> bool {
        true
    }

    fn get_packages(&self) -> Result<Vec<Package>> {
        self.load_all()
    }

    fn find_packages_by_id(&self, id: &str) -> Result<Vec<Package>> {
        Ok(self
            .load_all()?
            .into_iter()
            .filter(|p| id_eq(p.id(), id))
            .collect())
    }

    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>> {
        Ok(self
            .load_all()?
            .into_iter()
            .find(|p| id_eq(p.id(), id) && p.version() == version))
    }
}

/// Creates feed repositories from directory locations.
///
/// Locations are canonicalized, so two aliases of one directory resolve to
/// the same source name.
pub struct FeedRepositoryFactory<R: Runtime> {
    runtime: Arc<R>,
}

impl<R: Runtime> FeedRepositoryFactory<R> {
    pub fn new(runtime: Arc<R>) -> Self {
        Self { runtime }
    }
}

impl<R: Runtime + 'static> RepositoryFactory for FeedRepositoryFactory<R> {
    fn create(&self, location: &str) -> Result<SharedRepository> {
        let root = self
            .runtime
            .canonicalize(Path::new(location))
            .map_err(|e| Error::source_unavailable(location, e))?;
        Ok(Arc::new(LocalFeedRepository::new(self.runtime.clone(), root)))
    }
}
