//! Package model
//!
//! Immutable package identities, versions, version ranges and the
//! framework-partitioned dependency declarations a package carries.

mod framework;
mod version;
mod version_spec;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

pub use framework::{DefaultFrameworkCompatibility, FrameworkCompatibility, FrameworkName};
pub use version::SemanticVersion;
pub use version_spec::VersionSpec;

use crate::error::{Error, Result};

/// Case-insensitive id comparison used everywhere ids are matched.
pub fn id_eq(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Normalized form of an id, used as a map key.
pub fn id_key(id: &str) -> String {
    id.to_ascii_lowercase()
}

/// Package id plus exact version. Ids compare case-insensitively.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawIdentity")]
pub struct PackageIdentity {
    pub id: String,
    pub version: SemanticVersion,
}

#[derive(Deserialize)]
struct RawIdentity {
    id: String,
    version: SemanticVersion,
}

impl TryFrom<RawIdentity> for PackageIdentity {
    type Error = Error;

    fn try_from(raw: RawIdentity) -> Result<Self> {
        Self::new(raw.id, raw.version)
    }
}

impl PackageIdentity {
    pub fn new(id: impl Into<String>, version: SemanticVersion) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::EmptyPackageId);
        }
        Ok(Self { id, version })
    }
}

impl PartialEq for PackageIdentity {
    fn eq(&self, other: &Self) -> bool {
        id_eq(&self.id, &other.id) && self.version == other.version
    }
}

impl Eq for PackageIdentity {}

impl Hash for PackageIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        id_key(&self.id).hash(state);
        self.version.hash(state);
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id, self.version)
    }
}

/// A dependency on another package id. No range means any version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: String,
    #[serde(default, rename = "version", skip_serializing_if = "Option::is_none")]
    pub version_spec: Option<VersionSpec>,
}

impl Dependency {
    pub fn new(id: impl Into<String>, version_spec: Option<VersionSpec>) -> Self {
        Self {
            id: id.into(),
            version_spec,
        }
    }

    pub fn satisfied_by(&self, version: &SemanticVersion) -> bool {
        self.version_spec
            .as_ref()
            .is_none_or(|spec| spec.satisfies(version))
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version_spec {
            Some(spec) => write!(f, "{} {}", self.id, spec),
            None => f.write_str(&self.id),
        }
    }
}

/// Dependencies that apply to one target framework (or to all, when unset).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DependencySet {
    #[serde(default, rename = "framework", skip_serializing_if = "Option::is_none")]
    pub target_framework: Option<FrameworkName>,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

fn default_true() -> bool {
    true
}

/// Package metadata as served by a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    #[serde(flatten)]
    pub identity: PackageIdentity,
    #[serde(default, rename = "dependencies")]
    pub dependency_sets: Vec<DependencySet>,
    #[serde(default = "default_true")]
    pub listed: bool,
    #[serde(default)]
    pub is_latest_version: bool,
    /// Tool-only package owned by the shared store rather than a consumer.
    #[serde(default)]
    pub solution_level: bool,
}

impl Package {
    pub fn new(identity: PackageIdentity) -> Self {
        Self {
            identity,
            dependency_sets: Vec::new(),
            listed: true,
            is_latest_version: false,
            solution_level: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.identity.id
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.identity.version
    }

    pub fn is_prerelease(&self) -> bool {
        self.identity.version.is_prerelease()
    }

    /// Add a dependency set (builder style).
    pub fn with_dependencies(
        mut self,
        target_framework: Option<FrameworkName>,
        dependencies: Vec<Dependency>,
    ) -> Self {
        self.dependency_sets.push(DependencySet {
            target_framework,
            dependencies,
        });
        self
    }

    pub fn unlisted(mut self) -> Self {
        self.listed = false;
        self
    }

    pub fn solution_level(mut self) -> Self {
        self.solution_level = true;
        self
    }

    /// Dependencies applicable to `target`, as chosen by `compatibility`.
    pub fn dependencies_for<'a>(
        &'a self,
        compatibility: &dyn FrameworkCompatibility,
        target: Option<&FrameworkName>,
    ) -> &'a [Dependency] {
        compatibility
            .select_dependency_set(&self.dependency_sets, target)
            .map(|set| set.dependencies.as_slice())
            .unwrap_or(&[])
    }
}

impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.identity.fmt(f)
    }
}
