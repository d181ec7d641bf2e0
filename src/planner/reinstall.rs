use log::warn;

use super::plan::TargetPlan;
use super::{
    OperationPlan, OperationTarget, PlanOptions, PlanWarning, Planner, Scope, find_installed,
    installed_in, recorded_framework, replace, targets,
};
use crate::error::Result;
use crate::package::{Package, id_eq};
use crate::repository::contains_identity;
use crate::resolver::DependencyWalker;
use crate::store::{LocalStore, ReferenceKind, StoreState};

impl Planner {
    /// Plan reinstalling installed packages at their exact versions.
    ///
    /// A package whose version is gone from the source is skipped with a
    /// [`PlanWarning`]; the rest of the batch still goes ahead. When
    /// `update_dependencies` is set and `framework` differs from the one a
    /// consumer was installed for, dependency sets are re-evaluated for the
    /// new framework.
    #[tracing::instrument(skip(self, store, options))]
    pub fn reinstall(
        &self,
        store: &LocalStore,
        scope: &Scope,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        let state = store.snapshot();
        let mut plan = OperationPlan::default();
        for (target, id) in targets(&state, scope) {
            plan.append(self.reinstall_target(&state, &target, id.as_deref(), options)?);
        }
        Ok(plan)
    }

    fn reinstall_target(
        &self,
        state: &StoreState,
        target: &OperationTarget,
        only: Option<&str>,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        let installed = installed_in(state, target);
        if let Some(id) = only {
            find_installed(&installed, target, id)?;
        }

        let recorded = recorded_framework(state, target);
        let framework = match target {
            OperationTarget::Consumer(_) => options.framework.clone().or_else(|| recorded.clone()),
            OperationTarget::Solution => None,
        };
        let retarget = options.update_dependencies && framework != recorded;

        let mut plan =
            TargetPlan::new(target.clone(), framework.clone()).retargeted(recorded.clone());
        let mut removing = Vec::new();
        let mut added: Vec<(Package, ReferenceKind)> = Vec::new();

        for reference in installed
            .iter()
            .filter(|r| only.is_none_or(|id| id_eq(r.package.id(), id)))
        {
            let current = &reference.package;
            match self.source.find_package(current.id(), current.version())? {
                Some(fresh) => {
                    removing.push(current.clone());
                    added.push((fresh, reference.kind));
                }
                None => {
                    let warning = PlanWarning::MissingSourcePackage {
                        package: current.identity.clone(),
                        consumer: target.consumer().map(String::from),
                    };
                    warn!("{}", warning);
                    plan.warn(warning);
                }
            }
        }

        if retarget {
            let initial: Vec<Package> = installed.iter().map(|r| r.package.clone()).collect();
            let mut end = initial.clone();
            for (fresh, _) in &added {
                replace(&mut end, fresh.clone());
            }

            let roots: Vec<Package> = added.iter().map(|(p, _)| p.clone()).collect();
            for root in roots {
                let remaining: Vec<Package> = end
                    .iter()
                    .filter(|p| !id_eq(p.id(), root.id()))
                    .cloned()
                    .collect();
                let resolution = DependencyWalker::new(
                    self.resolver.as_ref(),
                    self.compatibility.as_ref(),
                    framework.as_ref(),
                )
                .options(self.resolve_options(options, &remaining, framework.as_ref()))
                .prefer(remaining)
                .walk(root)?;

                for package in resolution.into_packages() {
                    if contains_identity(&end, &package.identity) {
                        continue;
                    }
                    let previous = end.iter().find(|p| id_eq(p.id(), package.id())).cloned();
                    let kind = match previous {
                        Some(old) => {
                            if contains_identity(&initial, &old.identity)
                                && !contains_identity(&removing, &old.identity)
                            {
                                removing.push(old.clone());
                            }
                            added.retain(|(p, _)| !id_eq(p.id(), old.id()));
                            installed
                                .iter()
                                .find(|r| id_eq(r.package.id(), old.id()))
                                .map_or(ReferenceKind::Dependency, |r| r.kind)
                        }
                        None => ReferenceKind::Dependency,
                    };
                    replace(&mut end, package.clone());
                    added.push((package, kind));
                }
            }

            let changed: Vec<Package> = added.iter().map(|(p, _)| p.clone()).collect();
            self.verify_end_state(&end, &changed, framework.as_ref())?;
            self.collect_orphans(
                &installed,
                &mut end,
                &mut removing,
                recorded.as_ref(),
                framework.as_ref(),
            );
            added.retain(|(p, _)| contains_identity(&end, &p.identity));
        }

        for package in removing {
            plan.uninstall(package);
        }
        for (package, kind) in added {
            plan.install(package, kind);
        }
        plan.build(self.compatibility.as_ref())
    }
}
