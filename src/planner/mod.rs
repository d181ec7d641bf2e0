//! Operation planner.
//!
//! Turns a requested change (install, uninstall, update, safe-update,
//! reinstall) plus a snapshot of the local store into an ordered
//! [`OperationPlan`]. Planning only reads the source and the snapshot; the
//! caller executes the plan.

mod install;
mod plan;
mod reinstall;
mod uninstall;
mod update;

use std::sync::Arc;

use log::debug;

use crate::error::{Error, Result};
use crate::package::{
    DefaultFrameworkCompatibility, FrameworkCompatibility, FrameworkName, Package, id_eq,
};
use crate::repository::{SharedRepository, contains_identity};
use crate::resolver::{DependencyResolver, DependencyVersion, ResolveOptions, VersionConstraints};
use crate::store::{PackageReference, ReferenceKind, StoreState};

pub use plan::{OperationPlan, OperationTarget, PackageAction, PackageOperation, PlanWarning};

/// Knobs shared by all planning workflows.
#[derive(Debug, Clone)]
pub struct PlanOptions {
    pub allow_prerelease: bool,
    /// Plan only the requested package, none of its dependencies.
    pub ignore_dependencies: bool,
    /// Let update and reinstall pull in new dependency versions.
    pub update_dependencies: bool,
    pub dependency_version: DependencyVersion,
    /// Uninstall even when other packages depend on the package.
    pub force: bool,
    /// Uninstall dependencies left unused by the uninstall.
    pub remove_dependencies: bool,
    /// Target framework to plan for; defaults to the consumer's recorded one.
    pub framework: Option<FrameworkName>,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            allow_prerelease: false,
            ignore_dependencies: false,
            update_dependencies: true,
            dependency_version: DependencyVersion::Lowest,
            force: false,
            remove_dependencies: false,
            framework: None,
        }
    }
}

/// Which installed packages a batch workflow covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Package { target: OperationTarget, id: String },
    Target(OperationTarget),
    All,
}

pub struct Planner {
    source: SharedRepository,
    resolver: Arc<dyn DependencyResolver>,
    compatibility: Arc<dyn FrameworkCompatibility>,
}

impl Planner {
    /// `source` answers root lookups; `resolver` resolves dependencies and
    /// may reach further than the source.
    pub fn new(source: SharedRepository, resolver: Arc<dyn DependencyResolver>) -> Self {
        Self {
            source,
            resolver,
            compatibility: Arc::new(DefaultFrameworkCompatibility),
        }
    }

    pub fn with_compatibility(mut self, compatibility: Arc<dyn FrameworkCompatibility>) -> Self {
        self.compatibility = compatibility;
        self
    }

    /// Resolution settings for a walk that has to fit next to `remaining`:
    /// every id is pinned to the ranges those packages declare on it.
    fn resolve_options<'p>(
        &self,
        options: &PlanOptions,
        remaining: impl IntoIterator<Item = &'p Package>,
        framework: Option<&FrameworkName>,
    ) -> ResolveOptions {
        let mut constraints = VersionConstraints::new();
        for package in remaining {
            for dependency in package.dependencies_for(self.compatibility.as_ref(), framework) {
                if let Some(spec) = &dependency.version_spec
                    && !constraints.narrow(&dependency.id, spec)
                {
                    debug!("Installed ranges on {} already disagree", dependency.id);
                }
            }
        }

        ResolveOptions {
            allow_prerelease: options.allow_prerelease,
            dependency_version: options.dependency_version,
            constraints,
            ..Default::default()
        }
    }

    fn depends_on(&self, package: &Package, id: &str, framework: Option<&FrameworkName>) -> bool {
        depends_on(package, id, self.compatibility.as_ref(), framework)
    }

    /// Every edge between a changed id and the end state must still hold.
    fn verify_end_state(
        &self,
        end: &[Package],
        changed: &[Package],
        framework: Option<&FrameworkName>,
    ) -> Result<()> {
        for package in end {
            let package_changed = contains_identity(changed, &package.identity);
            for dependency in package.dependencies_for(self.compatibility.as_ref(), framework) {
                let Some(selected) = end.iter().find(|p| id_eq(p.id(), &dependency.id)) else {
                    continue;
                };
                let edge_changed = package_changed || contains_identity(changed, &selected.identity);
                if edge_changed && !dependency.satisfied_by(selected.version()) {
                    return Err(Error::DependencyConflict {
                        id: dependency.id.clone(),
                        selected: selected.version().clone(),
                        required: dependency.version_spec.clone().unwrap_or_default(),
                        required_by: package.identity.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Move dependency-kind packages that nothing in `end` needs any more
    /// from `end` to `removing`.
    ///
    /// Only packages that something in `removing` depended on qualify, and
    /// the check repeats until no new orphan appears.
    fn collect_orphans(
        &self,
        installed: &[PackageReference],
        end: &mut Vec<Package>,
        removing: &mut Vec<Package>,
        old_framework: Option<&FrameworkName>,
        framework: Option<&FrameworkName>,
    ) {
        loop {
            let orphan = installed.iter().find(|r| {
                let id = r.package.id();
                r.kind == ReferenceKind::Dependency
                    && contains_identity(end, &r.package.identity)
                    && removing
                        .iter()
                        .any(|p| self.depends_on(p, id, old_framework))
                    && !end.iter().any(|p| {
                        p.identity != r.package.identity && self.depends_on(p, id, framework)
                    })
            });
            let Some(orphan) = orphan else { break };

            debug!("'{}' is no longer needed", orphan.package);
            end.retain(|p| p.identity != orphan.package.identity);
            if !contains_identity(removing, &orphan.package.identity) {
                removing.push(orphan.package.clone());
            }
        }
    }
}

/// Whether `package` declares a dependency on `id` for `framework`.
pub(crate) fn depends_on(
    package: &Package,
    id: &str,
    compatibility: &dyn FrameworkCompatibility,
    framework: Option<&FrameworkName>,
) -> bool {
    package
        .dependencies_for(compatibility, framework)
        .iter()
        .any(|d| id_eq(&d.id, id))
}

/// References held by `target`. Solution-level packages count as direct.
fn installed_in(state: &StoreState, target: &OperationTarget) -> Vec<PackageReference> {
    match target {
        OperationTarget::Consumer(name) => state
            .consumer(name)
            .map(|c| c.references.clone())
            .unwrap_or_default(),
        OperationTarget::Solution => state
            .solution_packages()
            .into_iter()
            .map(|package| PackageReference {
                package,
                kind: ReferenceKind::Direct,
            })
            .collect(),
    }
}

fn recorded_framework(state: &StoreState, target: &OperationTarget) -> Option<FrameworkName> {
    target
        .consumer()
        .and_then(|name| state.consumer(name))
        .and_then(|c| c.framework.clone())
}

/// Targets covered by `scope`, each with the single id it is limited to.
fn targets(state: &StoreState, scope: &Scope) -> Vec<(OperationTarget, Option<String>)> {
    match scope {
        Scope::Package { target, id } => vec![(target.clone(), Some(id.clone()))],
        Scope::Target(target) => vec![(target.clone(), None)],
        Scope::All => {
            let mut targets: Vec<_> = state
                .consumers
                .keys()
                .map(|name| (OperationTarget::Consumer(name.clone()), None))
                .collect();
            if !state.solution_packages().is_empty() {
                targets.push((OperationTarget::Solution, None));
            }
            targets
        }
    }
}

/// Put `package` into `end`, replacing any version of the same id.
fn replace(end: &mut Vec<Package>, package: Package) {
    end.retain(|p| !id_eq(p.id(), package.id()));
    end.push(package);
}

/// The reference for `id`, or `NotInstalled`.
fn find_installed<'a>(
    installed: &'a [PackageReference],
    target: &OperationTarget,
    id: &str,
) -> Result<&'a PackageReference> {
    installed
        .iter()
        .find(|r| id_eq(r.package.id(), id))
        .ok_or_else(|| Error::NotInstalled {
            id: id.to_string(),
            consumer: target.to_string(),
        })
}
