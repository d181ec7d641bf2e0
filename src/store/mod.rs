//! Reference-counted local store.
//!
//! The store is the shared record of what is physically installed, plus the
//! per-consumer references that keep each package alive. A package may only
//! leave the store once no consumer references it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::package::{FrameworkName, Package, PackageIdentity, id_eq};
use crate::runtime::{Runtime, write_atomic};

pub type ConsumerId = String;

/// Why a consumer holds a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceKind {
    /// Requested by the user.
    #[default]
    Direct,
    /// Pulled in to satisfy another package.
    Dependency,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageReference {
    pub package: Package,
    #[serde(default)]
    pub kind: ReferenceKind,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework: Option<FrameworkName>,
    #[serde(default)]
    pub references: Vec<PackageReference>,
}

impl ConsumerState {
    pub fn find(&self, id: &str) -> Option<&PackageReference> {
        self.references.iter().find(|r| id_eq(r.package.id(), id))
    }

    pub fn packages(&self) -> Vec<Package> {
        self.references.iter().map(|r| r.package.clone()).collect()
    }
}

/// Persisted form of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreState {
    /// Shared record: every package physically present.
    #[serde(default)]
    pub packages: Vec<Package>,
    #[serde(default)]
    pub consumers: BTreeMap<ConsumerId, ConsumerState>,
}

impl StoreState {
    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.packages.iter().any(|p| &p.identity == identity)
    }

    pub fn is_referenced(&self, identity: &PackageIdentity) -> bool {
        self.consumers
            .values()
            .any(|c| c.references.iter().any(|r| &r.package.identity == identity))
    }

    /// Packages owned by the store itself rather than by any consumer.
    pub fn solution_packages(&self) -> Vec<Package> {
        self.packages
            .iter()
            .filter(|p| p.solution_level && !self.is_referenced(&p.identity))
            .cloned()
            .collect()
    }

    pub fn consumer(&self, consumer: &str) -> Option<&ConsumerState> {
        self.consumers.get(consumer)
    }
}

/// One row of the shared record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    pub identity: PackageIdentity,
    pub consumers: BTreeSet<ConsumerId>,
    pub solution_level: bool,
}

/// Thread-safe store. All mutations go through a single lock.
#[derive(Debug, Default)]
pub struct LocalStore {
    state: Mutex<StoreState>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: StoreState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Load the store from `path`; a missing file is an empty store.
    #[tracing::instrument(skip(runtime))]
    pub fn load<R: Runtime>(runtime: &R, path: &Path) -> anyhow::Result<Self> {
        if !runtime.exists(path) {
            debug!("No store at {:?}, starting empty", path);
            return Ok(Self::new());
        }
        let content = runtime.read_to_string(path)?;
        let state: StoreState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store at {:?}", path))?;
        Ok(Self::from_state(state))
    }

    /// Write the store to `path`, replacing any previous file atomically.
    #[tracing::instrument(skip(self, runtime))]
    pub fn save<R: Runtime>(&self, runtime: &R, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent()
            && !runtime.exists(parent)
        {
            runtime.create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&*self.lock())?;
        write_atomic(runtime, path, content.as_bytes())
            .with_context(|| format!("Failed to save store to {:?}", path))
    }

    pub fn snapshot(&self) -> StoreState {
        self.lock().clone()
    }

    /// Record `package` in the shared record. Idempotent.
    pub fn add_package(&self, package: &Package) {
        let mut state = self.lock();
        if !state.contains(&package.identity) {
            state.packages.push(package.clone());
        }
    }

    /// Record a package owned by the store itself.
    pub fn add_solution_package(&self, package: &Package) {
        let mut package = package.clone();
        package.solution_level = true;
        self.add_package(&package);
    }

    /// Make `consumer` reference `package`, adding it to the shared record
    /// if needed. A direct request upgrades an existing dependency reference.
    pub fn add_reference(&self, consumer: &str, package: &Package, kind: ReferenceKind) {
        let mut state = self.lock();
        if !state.contains(&package.identity) {
            state.packages.push(package.clone());
        }

        let entry = state.consumers.entry(consumer.to_string()).or_default();
        match entry
            .references
            .iter_mut()
            .find(|r| r.package.identity == package.identity)
        {
            Some(existing) => {
                if kind == ReferenceKind::Direct {
                    existing.kind = ReferenceKind::Direct;
                }
            }
            None => entry.references.push(PackageReference {
                package: package.clone(),
                kind,
            }),
        }
    }

    /// Drop the reference `consumer` holds on `identity`.
    ///
    /// Returns `true` when no consumer references the package any more, i.e.
    /// the caller may now remove it physically.
    pub fn remove_reference(&self, consumer: &str, identity: &PackageIdentity) -> Result<bool> {
        let mut state = self.lock();
        let entry = state
            .consumers
            .get_mut(consumer)
            .ok_or_else(|| Error::NotInstalled {
                id: identity.to_string(),
                consumer: consumer.to_string(),
            })?;

        let before = entry.references.len();
        entry.references.retain(|r| &r.package.identity != identity);
        if entry.references.len() == before {
            return Err(Error::NotInstalled {
                id: identity.to_string(),
                consumer: consumer.to_string(),
            });
        }
        if entry.references.is_empty() && entry.framework.is_none() {
            state.consumers.remove(consumer);
        }

        Ok(!state.is_referenced(identity))
    }

    /// Remove a package from the shared record.
    ///
    /// Fails while any consumer references it, unless `force`, in which case
    /// every reference is dropped too.
    pub fn remove_package(&self, identity: &PackageIdentity, force: bool) -> Result<()> {
        let mut state = self.lock();
        if !state.contains(identity) {
            return Err(Error::PackageNotFound {
                id: identity.id.clone(),
                version: Some(identity.version.clone()),
            });
        }
        if state.is_referenced(identity) {
            if !force {
                return Err(Error::StillReferenced {
                    id: identity.id.clone(),
                    version: identity.version.clone(),
                });
            }
            for consumer in state.consumers.values_mut() {
                consumer.references.retain(|r| &r.package.identity != identity);
            }
        }
        state.packages.retain(|p| &p.identity != identity);
        Ok(())
    }

    pub fn contains(&self, identity: &PackageIdentity) -> bool {
        self.lock().contains(identity)
    }

    pub fn is_referenced(&self, identity: &PackageIdentity) -> bool {
        self.lock().is_referenced(identity)
    }

    pub fn set_framework(&self, consumer: &str, framework: Option<FrameworkName>) {
        let mut state = self.lock();
        state
            .consumers
            .entry(consumer.to_string())
            .or_default()
            .framework = framework;
    }

    pub fn framework(&self, consumer: &str) -> Option<FrameworkName> {
        self.lock()
            .consumers
            .get(consumer)
            .and_then(|c| c.framework.clone())
    }

    pub fn packages_for(&self, consumer: &str) -> Vec<PackageReference> {
        self.lock()
            .consumers
            .get(consumer)
            .map(|c| c.references.clone())
            .unwrap_or_default()
    }

    pub fn consumers(&self) -> Vec<ConsumerId> {
        self.lock().consumers.keys().cloned().collect()
    }

    pub fn solution_packages(&self) -> Vec<Package> {
        self.lock().solution_packages()
    }

    /// Every package in the shared record.
    pub fn installed(&self) -> Vec<Package> {
        self.lock().packages.clone()
    }

    /// The shared record with its referencing consumers.
    pub fn records(&self) -> Vec<LocalRecord> {
        let state = self.lock();
        state
            .packages
            .iter()
            .map(|p| LocalRecord {
                identity: p.identity.clone(),
                consumers: state
                    .consumers
                    .iter()
                    .filter(|(_, c)| c.references.iter().any(|r| r.package.identity == p.identity))
                    .map(|(name, _)| name.clone())
                    .collect(),
                solution_level: p.solution_level,
            })
            .collect()
    }
}
