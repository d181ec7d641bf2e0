use super::plan::TargetPlan;
use super::{
    OperationPlan, OperationTarget, PlanOptions, Planner, find_installed, installed_in,
    recorded_framework,
};
use crate::error::{Error, Result};
use crate::package::{Package, id_eq};
use crate::store::LocalStore;

impl Planner {
    /// Plan removing `id` from `consumer`.
    ///
    /// Without a consumer only solution-level packages can be uninstalled.
    /// Other installed packages that depend on `id` block the uninstall
    /// unless `force` is set. With `remove_dependencies`, dependencies left
    /// unused are uninstalled as well.
    #[tracing::instrument(skip(self, store, options))]
    pub fn uninstall(
        &self,
        store: &LocalStore,
        consumer: Option<&str>,
        id: &str,
        options: &PlanOptions,
    ) -> Result<OperationPlan> {
        let state = store.snapshot();
        let target = match consumer {
            Some(name) => OperationTarget::Consumer(name.to_string()),
            None if state.solution_packages().iter().any(|p| id_eq(p.id(), id)) => {
                OperationTarget::Solution
            }
            None => return Err(Error::NoProjectSpecified { id: id.to_string() }),
        };

        let installed = installed_in(&state, &target);
        let framework = recorded_framework(&state, &target);
        let package = find_installed(&installed, &target, id)?.package.clone();

        let dependents: Vec<String> = installed
            .iter()
            .filter(|r| r.package.identity != package.identity)
            .filter(|r| self.depends_on(&r.package, id, framework.as_ref()))
            .map(|r| r.package.identity.to_string())
            .collect();
        if !dependents.is_empty() && !options.force {
            return Err(Error::PackageHasDependents {
                package: package.identity.clone(),
                dependents: dependents.join(", "),
            });
        }

        let mut removing = vec![package.clone()];
        if options.remove_dependencies {
            let mut end: Vec<Package> = installed
                .iter()
                .filter(|r| r.package.identity != package.identity)
                .map(|r| r.package.clone())
                .collect();
            self.collect_orphans(
                &installed,
                &mut end,
                &mut removing,
                framework.as_ref(),
                framework.as_ref(),
            );
        }

        let mut plan = TargetPlan::new(target, framework);
        for package in removing {
            plan.uninstall(package);
        }
        plan.build(self.compatibility.as_ref())
    }
}
