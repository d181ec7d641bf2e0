use log::debug;

use super::plan::TargetPlan;
use super::{
    OperationPlan, OperationTarget, PlanOptions, Planner, Scope, find_installed, installed_in,
    recorded_framework, replace, targets,
};
use crate::error::Result;
use crate::package::{FrameworkName, Package, id_eq, id_key};
use crate::repository::contains_identity;
use crate::resolver::{DependencyWalker, sort_by_dependencies};
use crate::store::{LocalStore, ReferenceKind, StoreState};

impl Planner {
    /// Plan moving installed packages to the newest version the source
    /// offers.
    #[tracing::instrument(skip(self, store, options))]
    pub fn update(
        &self,
        store: &LocalStore,
        scope: &Scope,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        self.plan_update(store, scope, options, false)
    }

    /// Like [`Planner::update`], but only within the same major.minor line.
    #[tracing::instrument(skip(self, store, options))]
    pub fn safe_update(
        &self,
        store: &LocalStore,
        scope: &Scope,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        self.plan_update(store, scope, options, true)
    }

    fn plan_update(
        &self,
        store: &LocalStore,
        scope: &Scope,
        options: &PlanOptions,
        safe: bool,
    ) -> Result<OperationPlan> {
        let state = store.snapshot();
        let mut plan = OperationPlan::default();
        for (target, id) in targets(&state, scope) {
            plan.append(self.update_target(&state, &target, id.as_deref(), options, safe)?);
        }
        Ok(plan)
    }

    fn update_target(
        &self,
        state: &StoreState,
        target: &OperationTarget,
        only: Option<&str>,
        options: &PlanOptions,
        safe: bool,
    ) -> Result<OperationPlan> {
        let installed = installed_in(state, target);
        if let Some(id) = only {
            find_installed(&installed, target, id)?;
        }
        let framework = recorded_framework(state, target);
        let initial: Vec<Package> = installed.iter().map(|r| r.package.clone()).collect();

        let candidates: Vec<Package> =
            sort_by_dependencies(&initial, self.compatibility.as_ref(), framework.as_ref())?
                .into_iter()
                .filter(|p| only.is_none_or(|id| id_eq(p.id(), id)))
                .collect();

        let mut end = initial.clone();
        for current in candidates {
            // Already replaced while updating something that depends on it.
            if !contains_identity(&end, &current.identity) {
                continue;
            }
            let Some(newer) = self.find_update(&current, &end, framework.as_ref(), options, safe)?
            else {
                debug!("'{}' is up to date", current);
                continue;
            };
            debug!("Updating '{}' to {}", current, newer.version());

            if options.update_dependencies {
                let remaining: Vec<Package> = end
                    .iter()
                    .filter(|p| !id_eq(p.id(), current.id()))
                    .cloned()
                    .collect();
                let resolution = DependencyWalker::new(
                    self.resolver.as_ref(),
                    self.compatibility.as_ref(),
                    framework.as_ref(),
                )
                .options(self.resolve_options(options, &remaining, framework.as_ref()))
                .prefer(remaining)
                .walk(newer)?;
                for package in resolution.into_packages() {
                    replace(&mut end, package);
                }
            } else {
                replace(&mut end, newer);
            }
        }

        let mut removing: Vec<Package> = initial
            .iter()
            .filter(|p| !contains_identity(&end, &p.identity))
            .cloned()
            .collect();
        let added: Vec<Package> = end
            .iter()
            .filter(|p| !contains_identity(&initial, &p.identity))
            .cloned()
            .collect();
        if added.is_empty() {
            return Ok(OperationPlan::default());
        }

        self.verify_end_state(&end, &added, framework.as_ref())?;
        self.collect_orphans(
            &installed,
            &mut end,
            &mut removing,
            framework.as_ref(),
            framework.as_ref(),
        );

        let mut plan = TargetPlan::new(target.clone(), framework);
        for package in removing {
            plan.uninstall(package);
        }
        for package in added {
            let kind = installed
                .iter()
                .find(|r| id_key(r.package.id()) == id_key(package.id()))
                .map_or(ReferenceKind::Dependency, |r| r.kind);
            plan.install(package, kind);
        }
        plan.build(self.compatibility.as_ref())
    }

    /// The newest acceptable replacement for `current`, if any.
    ///
    /// A candidate must keep every other package in `end` satisfied. Without
    /// `update_dependencies` its own dependencies must already be met by
    /// `end` as well.
    fn find_update(
        &self,
        current: &Package,
        end: &[Package],
        framework: Option<&FrameworkName>,
        options: &PlanOptions,
        safe: bool,
    ) -> Result<Option<Package>> {
        let allow_prerelease = options.allow_prerelease || current.is_prerelease();

        let mut candidates: Vec<Package> = self
            .source
            .find_packages_by_id(current.id())?
            .into_iter()
            .filter(|p| p.version() > current.version())
            .filter(|p| allow_prerelease || !p.is_prerelease())
            .filter(|p| !safe || p.version().same_minor_line(current.version()))
            .filter(|p| self.allowed_by_dependents(p, end, framework))
            .filter(|p| options.update_dependencies || self.dependencies_met(p, end, framework))
            .collect();

        if candidates.iter().any(|p| p.listed) {
            candidates.retain(|p| p.listed);
        }
        Ok(candidates
            .into_iter()
            .max_by(|a, b| a.version().cmp(b.version())))
    }

    fn allowed_by_dependents(
        &self,
        candidate: &Package,
        end: &[Package],
        framework: Option<&FrameworkName>,
    ) -> bool {
        end.iter()
            .filter(|p| !id_eq(p.id(), candidate.id()))
            .flat_map(|p| p.dependencies_for(self.compatibility.as_ref(), framework))
            .filter(|d| id_eq(&d.id, candidate.id()))
            .all(|d| d.satisfied_by(candidate.version()))
    }

    fn dependencies_met(
        &self,
        candidate: &Package,
        end: &[Package],
        framework: Option<&FrameworkName>,
    ) -> bool {
        candidate
            .dependencies_for(self.compatibility.as_ref(), framework)
            .iter()
            .all(|d| {
                end.iter()
                    .find(|p| id_eq(p.id(), &d.id))
                    .is_some_and(|p| d.satisfied_by(p.version()))
            })
    }
}
