//! Source registry for managing multiple named package sources.
//!
//! The registry knows every configured source by name and builds the
//! composite topologies used by the planner: "the active source, plus all
//! other sources" as either a priority chain or a dependency fallback.

use std::sync::Arc;

use log::{debug, warn};

use super::{
    AggregateRepository, FallbackRepository, PriorityRepository, SharedRepository,
};
use crate::error::{Error, Result};
use crate::resolver::RepositoryResolver;

/// Turns a configured location into a live repository.
#[cfg_attr(test, mockall::automock)]
pub trait RepositoryFactory: Send + Sync {
    fn create(&self, location: &str) -> Result<SharedRepository>;
}

/// A named source as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    pub name: String,
    pub location: String,
}

impl SourceEntry {
    pub fn new(name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            location: location.into(),
        }
    }
}

/// Registry of named sources.
///
/// Entries keep their registration order, which is also the probing order
/// of every aggregate the registry builds.
pub struct SourceRegistry {
    entries: Vec<SourceEntry>,
    factory: Arc<dyn RepositoryFactory>,
}

impl SourceRegistry {
    pub fn new(factory: Arc<dyn RepositoryFactory>) -> Self {
        Self {
            entries: Vec::new(),
            factory,
        }
    }

    /// Register a source.
    ///
    /// A source already registered under the same name (case-insensitive)
    /// is replaced in place.
    pub fn register(&mut self, entry: SourceEntry) {
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&entry.name))
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, name: &str) -> Option<&SourceEntry> {
        self.entries
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// The first registered source, used when no active source is chosen.
    pub fn default_name(&self) -> Option<&str> {
        self.entries.first().map(|e| e.name.as_str())
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Create the repository for a registered source.
    pub fn resolve(&self, name: &str) -> Result<SharedRepository> {
        let entry = self
            .get(name)
            .ok_or_else(|| Error::source_unavailable(name, "no such source is registered"))?;
        self.factory.create(&entry.location)
    }

    /// Every reachable source except those resolving to the same name as
    /// `active`. Unreachable sources are skipped with a warning.
    fn others(&self, active: Option<&SharedRepository>) -> Vec<SharedRepository> {
        let mut seen: Vec<String> = active.map(|r| r.source()).into_iter().collect();
        let mut repositories = Vec::new();

        for entry in &self.entries {
            let repository = match self.factory.create(&entry.location) {
                Ok(repository) => repository,
                Err(e) => {
                    warn!("Skipping source '{}': {}", entry.name, e);
                    continue;
                }
            };

            let resolved = repository.source();
            if seen.iter().any(|s| s.eq_ignore_ascii_case(&resolved)) {
                debug!(
                    "Source '{}' resolves to '{}', already included",
                    entry.name, resolved
                );
                continue;
            }
            seen.push(resolved);
            repositories.push(repository);
        }
        repositories
    }

    /// A tolerant aggregate over every reachable source.
    pub fn aggregate_all(&self) -> AggregateRepository {
        AggregateRepository::tolerant(self.others(None))
    }

    /// The active source first, then all other sources.
    pub fn priority_for(&self, active: &str) -> Result<PriorityRepository> {
        let primary = self.resolve(active)?;
        let rest = self.others(Some(&primary));
        Ok(PriorityRepository::new(
            primary,
            Arc::new(AggregateRepository::tolerant(rest)),
        ))
    }

    /// The active source, with dependency lookups falling back to all other
    /// sources.
    pub fn fallback_for(&self, active: &str) -> Result<FallbackRepository> {
        let primary = self.resolve(active)?;
        let rest = self.others(Some(&primary));
        let aggregate: SharedRepository = Arc::new(AggregateRepository::tolerant(rest));
        Ok(FallbackRepository::new(
            primary,
            Arc::new(RepositoryResolver::new(aggregate)),
        ))
    }
}
