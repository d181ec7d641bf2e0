use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use log::{debug, info, warn};

use super::installer::PackageInstaller;
use crate::planner::{OperationPlan, OperationTarget, PackageAction, PackageOperation, PlanWarning};
use crate::store::{LocalStore, ReferenceKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    Planned,
    Executing,
    Succeeded,
    Failed,
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationState::Planned => "planned",
            OperationState::Executing => "executing",
            OperationState::Succeeded => "succeeded",
            OperationState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub operation: PackageOperation,
    pub state: OperationState,
    pub error: Option<String>,
}

/// What happened to every operation of an executed plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    pub outcomes: Vec<OperationOutcome>,
    pub warnings: Vec<PlanWarning>,
}

impl ExecutionSummary {
    pub fn succeeded(&self) -> usize {
        self.count(OperationState::Succeeded)
    }

    pub fn failed(&self) -> usize {
        self.count(OperationState::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }

    fn count(&self, state: OperationState) -> usize {
        self.outcomes.iter().filter(|o| o.state == state).count()
    }
}

/// Applies an [`OperationPlan`] to the local store and the disk.
///
/// Operations run in plan order. An operation whose prerequisite failed is
/// marked failed without running; unrelated operations still run.
pub struct PlanExecutor {
    store: Arc<LocalStore>,
    installer: Arc<dyn PackageInstaller>,
}

impl PlanExecutor {
    pub fn new(store: Arc<LocalStore>, installer: Arc<dyn PackageInstaller>) -> Self {
        Self { store, installer }
    }

    #[tracing::instrument(skip(self, plan), fields(operations = plan.len()))]
    pub async fn execute(&self, plan: &OperationPlan) -> ExecutionSummary {
        let mut states = vec![OperationState::Planned; plan.len()];
        let mut outcomes = Vec::with_capacity(plan.len());

        for (index, operation) in plan.operations().iter().enumerate() {
            if plan
                .prerequisites(index)
                .iter()
                .any(|&p| states[p] == OperationState::Failed)
            {
                warn!("Skipping {} because an earlier operation failed", operation);
                states[index] = OperationState::Failed;
                outcomes.push(OperationOutcome {
                    operation: operation.clone(),
                    state: OperationState::Failed,
                    error: Some("a prerequisite operation failed".into()),
                });
                continue;
            }

            states[index] = OperationState::Executing;
            debug!("{}", operation);
            let result = match operation.action {
                PackageAction::Install(kind) => self.install(operation, kind).await,
                PackageAction::Uninstall => self.uninstall(operation).await,
            };

            let (state, error) = match result {
                Ok(()) => {
                    info!("{}", operation);
                    (OperationState::Succeeded, None)
                }
                Err(e) => {
                    warn!("{} failed: {:#}", operation, e);
                    (OperationState::Failed, Some(format!("{:#}", e)))
                }
            };
            states[index] = state;
            outcomes.push(OperationOutcome {
                operation: operation.clone(),
                state,
                error,
            });
        }

        ExecutionSummary {
            outcomes,
            warnings: plan.warnings().to_vec(),
        }
    }

    async fn install(&self, operation: &PackageOperation, kind: ReferenceKind) -> Result<()> {
        let package = &operation.package;
        if !self.installer.is_installed_on_disk(&package.identity) {
            self.installer.install_files(package).await?;
        }
        match &operation.target {
            OperationTarget::Consumer(consumer) => self.store.add_reference(consumer, package, kind),
            OperationTarget::Solution => self.store.add_solution_package(package),
        }
        Ok(())
    }

    async fn uninstall(&self, operation: &PackageOperation) -> Result<()> {
        let identity = operation.identity();
        let unreferenced = match &operation.target {
            OperationTarget::Consumer(consumer) => self.store.remove_reference(consumer, identity)?,
            OperationTarget::Solution => !self.store.is_referenced(identity),
        };
        if !unreferenced {
            debug!("'{}' is still referenced, keeping its files", identity);
            return Ok(());
        }

        self.installer.remove_files(identity).await?;
        self.store.remove_package(identity, false)?;
        Ok(())
    }
}
