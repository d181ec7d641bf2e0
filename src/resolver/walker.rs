//! Dependency closure computation.

use std::collections::{HashMap, VecDeque};

use log::debug;

use super::{DependencyResolver, ResolveOptions, VersionConstraints, resolve_required};
use crate::error::{Error, Result};
use crate::package::{
    Dependency, FrameworkCompatibility, FrameworkName, Package, PackageIdentity, VersionSpec, id_key,
};

/// The resolved closure of one root package.
#[derive(Debug, Clone)]
pub struct Resolution {
    root: PackageIdentity,
    /// Dependencies before dependents; the root is last.
    packages: Vec<Package>,
}

impl Resolution {
    pub fn root(&self) -> &PackageIdentity {
        &self.root
    }

    /// Install order: every package comes after all of its dependencies.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn into_packages(self) -> Vec<Package> {
        self.packages
    }

    pub fn get(&self, id: &str) -> Option<&Package> {
        let key = id_key(id);
        self.packages.iter().find(|p| id_key(p.id()) == key)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Walks the dependency graph of a root package and picks one version per id.
///
/// Dependencies are visited breadth-first in declaration order. The ranges
/// met for each id are intersected as the walk goes. When an id is reached
/// again with a range its chosen version misses, but some version fits the
/// combined range, the walk starts over with that id pinned to the combined
/// range. Disjoint ranges are a conflict.
///
/// Pins from [`ResolveOptions::constraints`] narrow each range as well,
/// unless they exclude every version the dependency accepts.
pub struct DependencyWalker<'a> {
    resolver: &'a dyn DependencyResolver,
    compatibility: &'a dyn FrameworkCompatibility,
    target: Option<&'a FrameworkName>,
    options: ResolveOptions,
    preferred: HashMap<String, Package>,
    ignore_dependencies: bool,
}

/// Result of a single pass over the graph.
enum Pass {
    Complete(HashMap<String, Package>),
    Narrow { id: String, range: VersionSpec },
}

impl<'a> DependencyWalker<'a> {
    pub fn new(
        resolver: &'a dyn DependencyResolver,
        compatibility: &'a dyn FrameworkCompatibility,
        target: Option<&'a FrameworkName>,
    ) -> Self {
        Self {
            resolver,
            compatibility,
            target,
            options: ResolveOptions::default(),
            preferred: HashMap::new(),
            ignore_dependencies: false,
        }
    }

    pub fn options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// Packages already present in the consumer. One of these is reused
    /// whenever it satisfies the dependency at hand.
    pub fn prefer<I: IntoIterator<Item = Package>>(mut self, packages: I) -> Self {
        for package in packages {
            self.preferred.insert(id_key(package.id()), package);
        }
        self
    }

    pub fn ignore_dependencies(mut self, ignore: bool) -> Self {
        self.ignore_dependencies = ignore;
        self
    }

    pub fn walk(&self, root: Package) -> Result<Resolution> {
        let root_identity = root.identity.clone();

        // Every pass that narrows excludes the version it had chosen, so
        // the loop ends once the candidates run out.
        let mut narrowed = VersionConstraints::new();
        let chosen = loop {
            match self.walk_once(&root, &narrowed)? {
                Pass::Complete(chosen) => break chosen,
                Pass::Narrow { id, range } => {
                    debug!("Walking {} again with {} limited to {}", root, id, range);
                    narrowed.pin(&id, range);
                }
            }
        };

        let mut closure: Vec<Package> = chosen.into_values().collect();
        // Everything is reachable from the root, so starting there fixes the order.
        closure.sort_by(|a, b| id_key(a.id()).cmp(&id_key(b.id())));
        if let Some(pos) = closure.iter().position(|p| p.identity == root_identity) {
            let root = closure.remove(pos);
            closure.insert(0, root);
        }

        let packages = if self.ignore_dependencies {
            closure
        } else {
            sort_by_dependencies(&closure, self.compatibility, self.target)?
        };

        Ok(Resolution {
            root: root_identity,
            packages,
        })
    }

    fn walk_once(&self, root: &Package, narrowed: &VersionConstraints) -> Result<Pass> {
        let mut chosen: HashMap<String, Package> = HashMap::new();
        // Intersection of every range met so far, per id.
        let mut ranges: HashMap<String, VersionSpec> = HashMap::new();
        let mut queue = VecDeque::new();

        chosen.insert(id_key(root.id()), root.clone());
        if !self.ignore_dependencies {
            queue.push_back(root.clone());
        }

        while let Some(package) = queue.pop_front() {
            for dependency in package.dependencies_for(self.compatibility, self.target) {
                let key = id_key(&dependency.id);
                let required = dependency.version_spec.clone().unwrap_or_default();

                if let Some(existing) = chosen.get(&key) {
                    if dependency.satisfied_by(existing.version()) {
                        if let Some(range) = ranges.get_mut(&key)
                            && let Some(tighter) = range.intersect(&required)
                        {
                            *range = tighter;
                        }
                        continue;
                    }

                    // The root has no range entry and is never swapped.
                    let combined = ranges.get(&key).and_then(|range| range.intersect(&required));
                    if let Some(range) = combined
                        && self.resolve_within(dependency, &range)?.is_some()
                    {
                        return Ok(Pass::Narrow {
                            id: dependency.id.clone(),
                            range,
                        });
                    }
                    return Err(Error::DependencyConflict {
                        id: dependency.id.clone(),
                        selected: existing.version().clone(),
                        required,
                        required_by: package.identity.clone(),
                    });
                }

                let range = self.first_range(dependency, required, narrowed)?;
                let next = self.resolve_within(dependency, &range)?.ok_or_else(|| {
                    Error::DependencyUnresolved {
                        id: dependency.id.clone(),
                        version_spec: dependency.version_spec.clone(),
                    }
                })?;

                ranges.insert(key.clone(), range);
                chosen.insert(key, next.clone());
                queue.push_back(next);
            }
        }

        Ok(Pass::Complete(chosen))
    }

    /// The range an id starts with on its first visit: the dependency's own
    /// range cut down by any pin in force.
    fn first_range(
        &self,
        dependency: &Dependency,
        required: VersionSpec,
        narrowed: &VersionConstraints,
    ) -> Result<VersionSpec> {
        let mut range = required;
        if let Some(pin) = self.options.constraints.get(&dependency.id) {
            match range.intersect(pin) {
                Some(tighter) => range = tighter,
                None => debug!("Pin {} on {} excludes {}, ignoring it", pin, dependency.id, range),
            }
        }
        if let Some(pin) = narrowed.get(&dependency.id) {
            range = range.intersect(pin).ok_or_else(|| Error::DependencyUnresolved {
                id: dependency.id.clone(),
                version_spec: Some(pin.clone()),
            })?;
        }
        Ok(range)
    }

    /// An installed package inside `range`, else whatever the resolver
    /// picks there.
    fn resolve_within(&self, dependency: &Dependency, range: &VersionSpec) -> Result<Option<Package>> {
        if let Some(installed) = self
            .preferred
            .get(&id_key(&dependency.id))
            .filter(|p| range.satisfies(p.version()))
        {
            debug!("Reusing installed {} for {}", installed, dependency);
            return Ok(Some(installed.clone()));
        }

        let mut options = self.options.clone();
        options.constraints.pin(&dependency.id, range.clone());
        match resolve_required(self.resolver, dependency, &options) {
            Ok(package) if range.satisfies(package.version()) => Ok(Some(package)),
            Ok(_) | Err(Error::DependencyUnresolved { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Order `packages` so that each one follows the packages it depends on.
///
/// Only edges between members of `packages` are considered. The result is
/// deterministic: a depth-first traversal in input order, visiting
/// dependencies in declaration order. A cycle is an error.
pub fn sort_by_dependencies(
    packages: &[Package],
    compatibility: &dyn FrameworkCompatibility,
    target: Option<&FrameworkName>,
) -> Result<Vec<Package>> {
    let index: HashMap<String, usize> = packages
        .iter()
        .enumerate()
        .map(|(i, p)| (id_key(p.id()), i))
        .collect();

    let mut state = vec![Mark::Unvisited; packages.len()];
    let mut path = Vec::new();
    let mut ordered = Vec::with_capacity(packages.len());

    for start in 0..packages.len() {
        visit(
            start,
            packages,
            &index,
            compatibility,
            target,
            &mut state,
            &mut path,
            &mut ordered,
        )?;
    }

    Ok(ordered.into_iter().map(|i| packages[i].clone()).collect())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InPath,
    Done,
}

#[allow(clippy::too_many_arguments)]
fn visit(
    node: usize,
    packages: &[Package],
    index: &HashMap<String, usize>,
    compatibility: &dyn FrameworkCompatibility,
    target: Option<&FrameworkName>,
    state: &mut [Mark],
    path: &mut Vec<usize>,
    ordered: &mut Vec<usize>,
) -> Result<()> {
    match state[node] {
        Mark::Done => return Ok(()),
        Mark::InPath => {
            let start = path.iter().position(|&i| i == node).unwrap_or(0);
            let cycle: Vec<&str> = path[start..]
                .iter()
                .chain(std::iter::once(&node))
                .map(|&i| packages[i].id())
                .collect();
            return Err(Error::CircularDependency(cycle.join(" -> ")));
        }
        Mark::Unvisited => {}
    }

    state[node] = Mark::InPath;
    path.push(node);
    for dependency in packages[node].dependencies_for(compatibility, target) {
        if let Some(&next) = index.get(&id_key(&dependency.id)) {
            visit(
                next,
                packages,
                index,
                compatibility,
                target,
                state,
                path,
                ordered,
            )?;
        }
    }
    path.pop();
    state[node] = Mark::Done;
    ordered.push(node);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::DefaultFrameworkCompatibility;
    use crate::package::fixtures::*;
    use crate::repository::InMemoryRepository;
    use crate::resolver::{DependencyVersion, MockDependencyResolver, RepositoryResolver};
    use std::sync::Arc;

    fn resolver(packages: Vec<Package>) -> RepositoryResolver {
        let mut repo = InMemoryRepository::new("test");
        for p in packages {
            repo.add(p);
        }
        RepositoryResolver::new(Arc::new(repo))
    }

    fn ids(resolution: &Resolution) -> Vec<String> {
        resolution
            .packages()
            .iter()
            .map(|p| p.identity.to_string())
            .collect()
    }

    fn position(resolution: &Resolution, id: &str) -> usize {
        resolution
            .packages()
            .iter()
            .position(|p| p.id() == id)
            .unwrap()
    }

    #[test]
    fn test_walk_diamond_orders_dependencies_first() {
        let resolver = resolver(vec![
            package_with("B", "1.0", &[("D", "1.0")]),
            package_with("C", "1.0", &[("D", "1.0")]),
            package("D", "1.0"),
            package("D", "2.0"),
        ]);
        let root = package_with("A", "1.0", &[("B", "1.0"), ("C", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .walk(root)
            .unwrap();

        assert_eq!(ids(&resolution), vec!["D 1.0", "B 1.0", "C 1.0", "A 1.0"]);
        assert_eq!(resolution.root(), &identity("A", "1.0"));
        assert!(resolution.get("d").is_some());
    }

    #[test]
    fn test_walk_policy_highest() {
        let resolver = resolver(vec![package("B", "1.0"), package("B", "1.5")]);
        let root = package_with("A", "1.0", &[("B", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .options(ResolveOptions {
                dependency_version: DependencyVersion::Highest,
                ..Default::default()
            })
            .walk(root)
            .unwrap();
        assert_eq!(resolution.get("B").unwrap().version(), &version("1.5"));
    }

    #[test]
    fn test_walk_conflicting_ranges() {
        let resolver = resolver(vec![
            package_with("B", "1.0", &[("D", "[1.0]")]),
            package_with("C", "1.0", &[("D", "[2.0]")]),
            package("D", "1.0"),
            package("D", "2.0"),
        ]);
        let root = package_with("A", "1.0", &[("B", "1.0"), ("C", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let err = DependencyWalker::new(&resolver, &compat, None)
            .walk(root)
            .unwrap_err();
        match err {
            Error::DependencyConflict {
                id, required_by, ..
            } => {
                assert_eq!(id, "D");
                assert_eq!(required_by, identity("C", "1.0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_walk_reselects_version_meeting_both_ranges() {
        let resolver = resolver(vec![
            package_with("B", "1.0", &[("D", "1.0")]),
            package("B", "1.5"),
            package_with("C", "1.0", &[("B", "[1.5,2.0)")]),
            package("D", "1.0"),
        ]);
        let root = package_with("A", "1.0", &[("B", "1.0"), ("C", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .walk(root)
            .unwrap();

        // D only came in through B 1.0 and goes with it.
        assert_eq!(ids(&resolution), vec!["B 1.5", "C 1.0", "A 1.0"]);
    }

    #[test]
    fn test_walk_honours_constraint_pins() {
        let resolver = resolver(vec![package("B", "1.0"), package("B", "1.2"), package("B", "2.0")]);
        let root = package_with("A", "1.0", &[("B", "1.0")]);
        let compat = DefaultFrameworkCompatibility;
        let highest = |pin: &str| ResolveOptions {
            dependency_version: DependencyVersion::Highest,
            constraints: VersionConstraints::new().with_pin("B", pin.parse().unwrap()),
            ..Default::default()
        };

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .options(highest("[1.0,1.5)"))
            .walk(root.clone())
            .unwrap();
        assert_eq!(resolution.get("B").unwrap().version(), &version("1.2"));

        // A pin the dependency can never meet is left out.
        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .options(highest("(,0.5]"))
            .walk(root)
            .unwrap();
        assert_eq!(resolution.get("B").unwrap().version(), &version("2.0"));
    }

    #[test]
    fn test_walk_unresolved_dependency() {
        let resolver = resolver(vec![]);
        let root = package_with("A", "1.0", &[("B", "[1.0,2.0)")]);
        let compat = DefaultFrameworkCompatibility;

        let err = DependencyWalker::new(&resolver, &compat, None)
            .walk(root)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unable to resolve dependency 'B (>= 1.0 && < 2.0)'"
        );
    }

    #[test]
    fn test_walk_cycle_is_reported() {
        let resolver = resolver(vec![package_with("B", "1.0", &[("A", "1.0")])]);
        let root = package_with("A", "1.0", &[("B", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let err = DependencyWalker::new(&resolver, &compat, None)
            .walk(root)
            .unwrap_err();
        assert!(matches!(err, Error::CircularDependency(ref path) if path == "A -> B -> A"));
    }

    #[test]
    fn test_walk_prefers_installed_version() {
        // No expectations: the installed B satisfies the range.
        let resolver = MockDependencyResolver::new();
        let root = package_with("A", "1.0", &[("B", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .prefer(vec![package("B", "1.3")])
            .walk(root)
            .unwrap();
        assert_eq!(resolution.get("B").unwrap().version(), &version("1.3"));
    }

    #[test]
    fn test_walk_ignores_installed_version_outside_range() {
        let resolver = resolver(vec![package("B", "2.0")]);
        let root = package_with("A", "1.0", &[("B", "2.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .prefer(vec![package("B", "1.3")])
            .walk(root)
            .unwrap();
        assert_eq!(resolution.get("B").unwrap().version(), &version("2.0"));
    }

    #[test]
    fn test_walk_ignore_dependencies() {
        let resolver = MockDependencyResolver::new();
        let root = package_with("A", "1.0", &[("B", "1.0")]);
        let compat = DefaultFrameworkCompatibility;

        let resolution = DependencyWalker::new(&resolver, &compat, None)
            .ignore_dependencies(true)
            .walk(root)
            .unwrap();
        assert_eq!(ids(&resolution), vec!["A 1.0"]);
    }

    #[test]
    fn test_walk_uses_framework_specific_set() {
        let resolver = resolver(vec![package("Legacy", "1.0"), package("Modern", "1.0")]);
        let root = package("A", "1.0")
            .with_dependencies(Some("net40".parse().unwrap()), dependencies(&[("Legacy", "")]))
            .with_dependencies(Some("net45".parse().unwrap()), dependencies(&[("Modern", "")]));
        let compat = DefaultFrameworkCompatibility;
        let target: FrameworkName = "net46".parse().unwrap();

        let resolution = DependencyWalker::new(&resolver, &compat, Some(&target))
            .walk(root)
            .unwrap();
        assert!(resolution.get("Modern").is_some());
        assert!(resolution.get("Legacy").is_none());
        assert!(position(&resolution, "Modern") < position(&resolution, "A"));
    }

    #[test]
    fn test_sort_by_dependencies_ignores_outside_edges() {
        let packages = vec![
            package_with("A", "1.0", &[("B", ""), ("X", "")]),
            package_with("B", "1.0", &[("C", "")]),
            package("C", "1.0"),
        ];
        let sorted = sort_by_dependencies(&packages, &DefaultFrameworkCompatibility, None).unwrap();
        let order: Vec<&str> = sorted.iter().map(|p| p.id()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);
    }
}
