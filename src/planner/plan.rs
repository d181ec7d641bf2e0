//! Operation plans.

use std::fmt;

use crate::error::Result;
use crate::package::{FrameworkCompatibility, FrameworkName, Package, PackageIdentity, id_eq};
use crate::resolver::sort_by_dependencies;
use crate::store::{ConsumerId, ReferenceKind};

use super::depends_on;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageAction {
    Install(ReferenceKind),
    Uninstall,
}

/// Where an operation applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OperationTarget {
    Consumer(ConsumerId),
    /// The shared store itself, for solution-level packages.
    Solution,
}

impl OperationTarget {
    pub fn consumer(&self) -> Option<&str> {
        match self {
            OperationTarget::Consumer(name) => Some(name),
            OperationTarget::Solution => None,
        }
    }
}

impl fmt::Display for OperationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationTarget::Consumer(name) => f.write_str(name),
            OperationTarget::Solution => f.write_str("solution"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageOperation {
    pub action: PackageAction,
    pub package: Package,
    pub target: OperationTarget,
}

impl PackageOperation {
    pub fn identity(&self) -> &PackageIdentity {
        &self.package.identity
    }
}

impl fmt::Display for PackageOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            PackageAction::Install(_) => {
                write!(f, "Install '{}' into {}", self.package, self.target)
            }
            PackageAction::Uninstall => {
                write!(f, "Uninstall '{}' from {}", self.package, self.target)
            }
        }
    }
}

/// Non-fatal findings a caller can inspect after planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanWarning {
    /// The exact installed version is gone from the source.
    MissingSourcePackage {
        package: PackageIdentity,
        consumer: Option<ConsumerId>,
    },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::MissingSourcePackage {
                package,
                consumer: Some(consumer),
            } => write!(
                f,
                "Unable to find '{}' in the source; skipping it for '{}'",
                package, consumer
            ),
            PlanWarning::MissingSourcePackage {
                package,
                consumer: None,
            } => write!(f, "Unable to find '{}' in the source; skipping it", package),
        }
    }
}

/// Ordered operations plus, for each one, the earlier operations whose
/// failure must prevent it from running.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationPlan {
    operations: Vec<PackageOperation>,
    prerequisites: Vec<Vec<usize>>,
    warnings: Vec<PlanWarning>,
}

impl OperationPlan {
    pub fn operations(&self) -> &[PackageOperation] {
        &self.operations
    }

    /// Indices of the operations that must succeed before `index` may run.
    pub fn prerequisites(&self, index: usize) -> &[usize] {
        self.prerequisites
            .get(index)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn warnings(&self) -> &[PlanWarning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub(crate) fn push(&mut self, operation: PackageOperation, prerequisites: Vec<usize>) {
        self.operations.push(operation);
        self.prerequisites.push(prerequisites);
    }

    pub(crate) fn warn(&mut self, warning: PlanWarning) {
        self.warnings.push(warning);
    }

    /// Append `other`, which runs after everything already planned.
    pub fn append(&mut self, other: OperationPlan) {
        let offset = self.operations.len();
        self.operations.extend(other.operations);
        self.prerequisites.extend(
            other
                .prerequisites
                .into_iter()
                .map(|deps| deps.into_iter().map(|i| i + offset).collect()),
        );
        self.warnings.extend(other.warnings);
    }
}

/// Collects the changes for one target before ordering them.
pub(crate) struct TargetPlan {
    target: OperationTarget,
    old_framework: Option<FrameworkName>,
    framework: Option<FrameworkName>,
    uninstalls: Vec<Package>,
    installs: Vec<(Package, ReferenceKind)>,
    warnings: Vec<PlanWarning>,
}

impl TargetPlan {
    pub fn new(target: OperationTarget, framework: Option<FrameworkName>) -> Self {
        Self {
            target,
            old_framework: framework.clone(),
            framework,
            uninstalls: Vec::new(),
            installs: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Installs are evaluated against `framework`, uninstalls against the
    /// framework the packages were installed for.
    pub fn retargeted(mut self, old_framework: Option<FrameworkName>) -> Self {
        self.old_framework = old_framework;
        self
    }

    pub fn uninstall(&mut self, package: Package) {
        self.uninstalls.push(package);
    }

    pub fn install(&mut self, package: Package, kind: ReferenceKind) {
        self.installs.push((package, kind));
    }

    pub fn warn(&mut self, warning: PlanWarning) {
        self.warnings.push(warning);
    }

    /// Uninstalls first, dependents before their dependencies; then
    /// installs, dependencies before their dependents.
    pub fn build(self, compatibility: &dyn FrameworkCompatibility) -> Result<OperationPlan> {
        let old_framework = self.old_framework.as_ref();
        let framework = self.framework.as_ref();

        let mut uninstalls = sort_by_dependencies(&self.uninstalls, compatibility, old_framework)?;
        uninstalls.reverse();
        let to_install: Vec<Package> = self.installs.iter().map(|(p, _)| p.clone()).collect();
        let installs = sort_by_dependencies(&to_install, compatibility, framework)?;

        let mut plan = OperationPlan::default();
        for (i, package) in uninstalls.iter().enumerate() {
            let prerequisites = (0..i)
                .filter(|&j| depends_on(&uninstalls[j], package.id(), compatibility, old_framework))
                .collect();
            plan.push(
                PackageOperation {
                    action: PackageAction::Uninstall,
                    package: package.clone(),
                    target: self.target.clone(),
                },
                prerequisites,
            );
        }

        let base = uninstalls.len();
        for (k, package) in installs.iter().enumerate() {
            let mut prerequisites: Vec<usize> = (0..base)
                .filter(|&j| id_eq(uninstalls[j].id(), package.id()))
                .collect();
            prerequisites.extend(
                (0..k)
                    .filter(|&j| depends_on(package, installs[j].id(), compatibility, framework))
                    .map(|j| base + j),
            );

            let kind = self
                .installs
                .iter()
                .find(|(p, _)| p.identity == package.identity)
                .map(|(_, kind)| *kind)
                .unwrap_or_default();
            plan.push(
                PackageOperation {
                    action: PackageAction::Install(kind),
                    package: package.clone(),
                    target: self.target.clone(),
                },
                prerequisites,
            );
        }

        for warning in self.warnings {
            plan.warn(warning);
        }
        Ok(plan)
    }
}
