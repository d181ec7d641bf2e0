//! Repository abstraction for package sources.
//!
//! Every source, leaf or composite, exposes the same capability surface so
//! that composites can nest inside each other and callers never need to know
//! which kind they hold.

mod aggregate;
mod fallback;
mod feed;
mod memory;
mod priority;
mod registry;

use std::sync::Arc;

use crate::error::Result;
use crate::package::{Package, PackageIdentity, SemanticVersion};

pub use aggregate::{AGGREGATE_SOURCE_NAME, AggregateRepository};
pub use fallback::FallbackRepository;
pub use feed::{FeedRepositoryFactory, LocalFeedRepository};
pub use memory::InMemoryRepository;
pub use priority::PriorityRepository;
pub use registry::{RepositoryFactory, SourceEntry, SourceRegistry};

#[cfg(test)]
pub use registry::MockRepositoryFactory;

/// Query contract shared by all package sources.
#[cfg_attr(test, mockall::automock)]
pub trait Repository: Send + Sync {
    /// Descriptive name of the source.
    fn source(&self) -> String;

    fn supports_prerelease_packages(&self) -> bool;

    /// Enumerate every package the source offers.
    fn get_packages(&self) -> Result<Vec<Package>>;

    /// All versions of one id, in no particular order.
    fn find_packages_by_id(&self, id: &str) -> Result<Vec<Package>>;

    /// The package with exactly this id and version.
    fn find_package(&self, id: &str, version: &SemanticVersion) -> Result<Option<Package>>;

    fn exists(&self, id: &str, version: &SemanticVersion) -> Result<bool> {
        Ok(self.find_package(id, version)?.is_some())
    }
}

pub type SharedRepository = Arc<dyn Repository>;

/// Append `packages` to `into`, skipping identities already present.
pub(crate) fn extend_unique(into: &mut Vec<Package>, packages: Vec<Package>) {
    for package in packages {
        if !contains_identity(into, &package.identity) {
            into.push(package);
        }
    }
}

pub(crate) fn contains_identity(packages: &[Package], identity: &PackageIdentity) -> bool {
    packages.iter().any(|p| &p.identity == identity)
}
