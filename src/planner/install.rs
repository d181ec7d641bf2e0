use log::info;

use super::plan::TargetPlan;
use super::{OperationPlan, OperationTarget, PlanOptions, Planner, installed_in, recorded_framework};
use crate::error::{Error, Result};
use crate::package::{Dependency, Package, SemanticVersion, id_eq};
use crate::resolver::{DependencyVersion, DependencyWalker, ResolveOptions, resolve_dependency};
use crate::store::{LocalStore, ReferenceKind};

impl Planner {
    /// Plan installing `id` (at `version`, or the latest one) into `target`.
    ///
    /// Dependencies already installed in the target are reused when their
    /// version fits. An installed package with the same id at another
    /// version is replaced. Solution-level packages always go to the shared
    /// store; any other package needs a consumer.
    #[tracing::instrument(skip(self, store, options))]
    pub fn install(
        &self,
        store: &LocalStore,
        target: &OperationTarget,
        id: &str,
        version: Option<&SemanticVersion>,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        let state = store.snapshot();
        let root = self.find_root(id, version, options)?;
        let target = match target {
            _ if root.solution_level => OperationTarget::Solution,
            OperationTarget::Solution => {
                return Err(Error::NoProjectSpecified { id: id.to_string() });
            }
            OperationTarget::Consumer(_) => target.clone(),
        };

        let installed = installed_in(&state, &target);
        if installed.iter().any(|r| r.package.identity == root.identity) {
            info!("'{}' is already installed in {}", root, target);
            return Ok(OperationPlan::default());
        }

        let framework = options
            .framework
            .clone()
            .or_else(|| recorded_framework(&state, &target));
        let remaining: Vec<Package> = installed
            .iter()
            .filter(|r| !id_eq(r.package.id(), root.id()))
            .map(|r| r.package.clone())
            .collect();
        let resolution = DependencyWalker::new(
            self.resolver.as_ref(),
            self.compatibility.as_ref(),
            framework.as_ref(),
        )
        .options(self.resolve_options(options, &remaining, framework.as_ref()))
        .prefer(remaining.iter().cloned())
        .ignore_dependencies(options.ignore_dependencies)
        .walk(root.clone())?;

        let mut end: Vec<Package> = installed.iter().map(|r| r.package.clone()).collect();
        let mut changed = Vec::new();
        let mut plan = TargetPlan::new(target, framework.clone());

        for package in resolution.packages() {
            let existing = installed.iter().find(|r| id_eq(r.package.id(), package.id()));
            if existing.is_some_and(|r| r.package.identity == package.identity) {
                continue;
            }

            let kind = if package.identity == root.identity {
                ReferenceKind::Direct
            } else {
                existing.map_or(ReferenceKind::Dependency, |r| r.kind)
            };
            if let Some(old) = existing {
                plan.uninstall(old.package.clone());
                end.retain(|p| p.identity != old.package.identity);
            }
            plan.install(package.clone(), kind);
            end.push(package.clone());
            changed.push(package.clone());
        }

        self.verify_end_state(&end, &changed, framework.as_ref())?;
        plan.build(self.compatibility.as_ref())
    }

    /// The exact version when given, otherwise the highest one the source
    /// offers under the prerelease rules.
    pub(crate) fn find_root(
        &self,
        id: &str,
        version: Option<&SemanticVersion>,
        options: &PlanOptions,
    ) -> Result<Package> {
        let not_found = || Error::PackageNotFound {
            id: id.to_string(),
            version: version.cloned(),
        };

        match version {
            Some(version) => self.source.find_package(id, version)?.ok_or_else(not_found),
            None => {
                let latest = ResolveOptions {
                    allow_prerelease: options.allow_prerelease,
                    dependency_version: DependencyVersion::Highest,
                    ..Default::default()
                };
                resolve_dependency(self.source.as_ref(), &Dependency::new(id, None), &latest)?
                    .ok_or_else(not_found)
            }
        }
    }
}
