//! Dependency resolution.
//!
//! Single dependencies are resolved against a repository with
//! [`resolve_dependency`]; the closure of a whole package is computed by
//! [`DependencyWalker`].

mod walker;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use log::debug;

use crate::error::{Error, Result};
use crate::package::{Dependency, Package, SemanticVersion, VersionSpec, id_key};
use crate::repository::{Repository, SharedRepository};

pub use walker::{DependencyWalker, Resolution, sort_by_dependencies};

/// Tie-break rule among several versions satisfying a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyVersion {
    /// Smallest qualifying version.
    #[default]
    Lowest,
    /// Largest qualifying version.
    Highest,
    /// Largest version within the lowest qualifying major.
    HighestMinor,
    /// Largest version within the lowest qualifying major.minor.
    HighestPatch,
}

impl DependencyVersion {
    /// Pick one of `candidates` according to the policy.
    pub fn select<'a>(&self, candidates: &'a [Package]) -> Option<&'a Package> {
        let lowest = candidates.iter().min_by(|a, b| a.version().cmp(b.version()))?;
        let base = lowest.version();

        match self {
            DependencyVersion::Lowest => Some(lowest),
            DependencyVersion::Highest => highest(candidates.iter()),
            DependencyVersion::HighestMinor => {
                highest(candidates.iter().filter(|p| p.version().major() == base.major()))
            }
            DependencyVersion::HighestPatch => {
                highest(candidates.iter().filter(|p| p.version().same_minor_line(base)))
            }
        }
    }
}

fn highest<'a>(packages: impl Iterator<Item = &'a Package>) -> Option<&'a Package> {
    packages.max_by(|a, b| a.version().cmp(b.version()))
}

impl FromStr for DependencyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lowest" => Ok(DependencyVersion::Lowest),
            "highest" => Ok(DependencyVersion::Highest),
            "highestminor" => Ok(DependencyVersion::HighestMinor),
            "highestpatch" => Ok(DependencyVersion::HighestPatch),
            _ => Err(Error::InvalidDependencyVersion(s.to_string())),
        }
    }
}

impl fmt::Display for DependencyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DependencyVersion::Lowest => write!(f, "lowest"),
            DependencyVersion::Highest => write!(f, "highest"),
            DependencyVersion::HighestMinor => write!(f, "highestminor"),
            DependencyVersion::HighestPatch => write!(f, "highestpatch"),
        }
    }
}

/// Version pins already in force for a consumer.
///
/// Any candidate outside a pin for its id is excluded from resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionConstraints {
    pins: HashMap<String, VersionSpec>,
}

impl VersionConstraints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(&mut self, id: &str, spec: VersionSpec) {
        self.pins.insert(id_key(id), spec);
    }

    /// Tighten the pin on `id` to what it and `spec` both accept. Returns
    /// `false`, leaving the pin as it was, when the two are disjoint.
    pub fn narrow(&mut self, id: &str, spec: &VersionSpec) -> bool {
        let narrowed = match self.get(id) {
            Some(pin) => pin.intersect(spec),
            None => Some(spec.clone()),
        };
        match narrowed {
            Some(narrowed) => {
                self.pin(id, narrowed);
                true
            }
            None => false,
        }
    }

    pub fn with_pin(mut self, id: &str, spec: VersionSpec) -> Self {
        self.pin(id, spec);
        self
    }

    pub fn get(&self, id: &str) -> Option<&VersionSpec> {
        self.pins.get(&id_key(id))
    }

    pub fn allows(&self, id: &str, version: &SemanticVersion) -> bool {
        self.get(id).is_none_or(|spec| spec.satisfies(version))
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

/// Knobs for resolving a single dependency.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolveOptions {
    pub allow_prerelease: bool,
    pub prefer_listed: bool,
    pub dependency_version: DependencyVersion,
    pub constraints: VersionConstraints,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            allow_prerelease: false,
            prefer_listed: true,
            dependency_version: DependencyVersion::Lowest,
            constraints: VersionConstraints::default(),
        }
    }
}

/// Something that can turn a dependency into a concrete package.
#[cfg_attr(test, mockall::automock)]
pub trait DependencyResolver: Send + Sync {
    /// `Ok(None)` when no version qualifies.
    fn resolve_dependency(
        &self,
        dependency: &Dependency,
        options: &ResolveOptions,
    ) -> Result<Option<Package>>;
}

/// Resolve a dependency directly against one repository.
pub fn resolve_dependency(
    repository: &dyn Repository,
    dependency: &Dependency,
    options: &ResolveOptions,
) -> Result<Option<Package>> {
    let mut candidates: Vec<Package> = repository
        .find_packages_by_id(&dependency.id)?
        .into_iter()
        .filter(|p| options.allow_prerelease || !p.is_prerelease())
        .filter(|p| dependency.satisfied_by(p.version()))
        .filter(|p| options.constraints.allows(&dependency.id, p.version()))
        .collect();

    // Unlisted packages are only considered when nothing listed qualifies.
    if options.prefer_listed && candidates.iter().any(|p| p.listed) {
        candidates.retain(|p| p.listed);
    }

    let chosen = options.dependency_version.select(&candidates).cloned();
    debug!(
        "Resolved {} against '{}' to {:?}",
        dependency,
        repository.source(),
        chosen.as_ref().map(|p| p.version().to_string())
    );
    Ok(chosen)
}

/// Like [`resolve_dependency`] but fails when nothing qualifies.
pub fn resolve_required(
    resolver: &dyn DependencyResolver,
    dependency: &Dependency,
    options: &ResolveOptions,
) -> Result<Package> {
    resolver
        .resolve_dependency(dependency, options)?
        .ok_or_else(|| Error::DependencyUnresolved {
            id: dependency.id.clone(),
            version_spec: dependency.version_spec.clone(),
        })
}

/// Adapts a plain repository to the [`DependencyResolver`] interface.
pub struct RepositoryResolver {
    repository: SharedRepository,
}

impl RepositoryResolver {
    pub fn new(repository: SharedRepository) -> Self {
        Self { repository }
    }
}

impl DependencyResolver for RepositoryResolver {
    fn resolve_dependency(
        &self,
        dependency: &Dependency,
        options: &ResolveOptions,
    ) -> Result<Option<Package>> {
        resolve_dependency(self.repository.as_ref(), dependency, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::fixtures::*;
    use crate::repository::InMemoryRepository;

    fn repo() -> InMemoryRepository {
        InMemoryRepository::new("test")
            .with(package("B", "1.0"))
            .with(package("B", "1.0.5"))
            .with(package("B", "1.1"))
            .with(package("B", "1.1.3"))
            .with(package("B", "2.0"))
            .with(package("B", "2.5"))
            .with(package("B", "3.0-beta"))
    }

    fn dep(spec: &str) -> Dependency {
        dependencies(&[("B", spec)]).remove(0)
    }

    fn resolve(spec: &str, options: &ResolveOptions) -> Option<String> {
        resolve_dependency(&repo(), &dep(spec), options)
            .unwrap()
            .map(|p| p.version().to_string())
    }

    fn with_policy(policy: DependencyVersion) -> ResolveOptions {
        ResolveOptions {
            dependency_version: policy,
            ..Default::default()
        }
    }

    #[test]
    fn test_lowest_is_default() {
        assert_eq!(resolve("1.0.1", &ResolveOptions::default()), Some("1.0.5".into()));
    }

    #[test]
    fn test_highest() {
        let options = with_policy(DependencyVersion::Highest);
        assert_eq!(resolve("1.0", &options), Some("2.5".into()));
        assert_eq!(resolve("[1.0,2.0)", &options), Some("1.1.3".into()));
    }

    #[test]
    fn test_highest_minor() {
        let options = with_policy(DependencyVersion::HighestMinor);
        assert_eq!(resolve("1.0", &options), Some("1.1.3".into()));
        assert_eq!(resolve("1.2", &options), Some("2.5".into()));
    }

    #[test]
    fn test_highest_patch() {
        let options = with_policy(DependencyVersion::HighestPatch);
        assert_eq!(resolve("1.0", &options), Some("1.0.5".into()));
        assert_eq!(resolve("1.1", &options), Some("1.1.3".into()));
    }

    #[test]
    fn test_prerelease_filtered_unless_allowed() {
        let options = with_policy(DependencyVersion::Highest);
        assert_eq!(resolve("2.6", &options), None);

        let options = ResolveOptions {
            allow_prerelease: true,
            ..with_policy(DependencyVersion::Highest)
        };
        assert_eq!(resolve("2.6", &options), Some("3.0-beta".into()));
    }

    #[test]
    fn test_constraints_exclude_versions_outside_pin() {
        let options = ResolveOptions {
            constraints: VersionConstraints::new().with_pin("b", "[1.1,2.0)".parse().unwrap()),
            ..Default::default()
        };
        assert_eq!(resolve("1.0", &options), Some("1.1".into()));
        assert!(options.constraints.allows("other", &version("9.0")));
    }

    #[test]
    fn test_constraints_narrow_keeps_pin_on_disjoint_range() {
        let mut constraints = VersionConstraints::new();
        assert!(constraints.narrow("B", &"1.0".parse().unwrap()));
        assert!(constraints.narrow("b", &"(,2.0)".parse().unwrap()));
        assert_eq!(constraints.get("B"), Some(&"[1.0,2.0)".parse().unwrap()));

        assert!(!constraints.narrow("B", &"[3.0]".parse().unwrap()));
        assert_eq!(constraints.get("B"), Some(&"[1.0,2.0)".parse().unwrap()));
    }

    #[test]
    fn test_prefer_listed() {
        let repo = InMemoryRepository::new("test")
            .with(package("C", "1.0").unlisted())
            .with(package("C", "1.1"));
        let dep = dependencies(&[("C", "1.0")]).remove(0);

        let chosen = resolve_dependency(&repo, &dep, &ResolveOptions::default()).unwrap();
        assert_eq!(chosen.unwrap().version(), &version("1.1"));

        let options = ResolveOptions {
            prefer_listed: false,
            ..Default::default()
        };
        let chosen = resolve_dependency(&repo, &dep, &options).unwrap();
        assert_eq!(chosen.unwrap().version(), &version("1.0"));
    }

    #[test]
    fn test_unlisted_used_when_nothing_listed_qualifies() {
        let repo = InMemoryRepository::new("test").with(package("C", "1.0").unlisted());
        let dep = dependencies(&[("C", "[1.0]")]).remove(0);
        let chosen = resolve_dependency(&repo, &dep, &ResolveOptions::default()).unwrap();
        assert!(chosen.is_some());
    }

    #[test]
    fn test_resolve_required_reports_dependency_id() {
        let resolver = RepositoryResolver::new(std::sync::Arc::new(repo()));
        let err = resolve_required(&resolver, &dep("[9.0]"), &ResolveOptions::default())
            .unwrap_err();
        match err {
            Error::DependencyUnresolved { id, .. } => assert_eq!(id, "B"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_policy_parse_and_display() {
        assert_eq!(
            "HighestMinor".parse::<DependencyVersion>().unwrap(),
            DependencyVersion::HighestMinor
        );
        assert!(matches!(
            "newest".parse::<DependencyVersion>(),
            Err(Error::InvalidDependencyVersion(ref text)) if text == "newest"
        ));
        assert_eq!(DependencyVersion::HighestPatch.to_string(), "highestpatch");
    }
}
