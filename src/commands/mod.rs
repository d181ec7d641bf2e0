use anyhow::{Result, bail};
use log::debug;

use crate::{
    application::{ExecutionSummary, OperationState, PlanExecutor},
    planner::{OperationPlan, OperationTarget, Scope},
    runtime::Runtime,
};

pub mod config;
mod install;
mod list;
mod paths;
mod reinstall;
mod restore;
mod services;
mod uninstall;
mod update;

pub use config::{Config, ConfigOverrides};
pub use install::install;
pub use list::list;
pub use reinstall::reinstall;
pub use restore::restore;
pub use uninstall::uninstall;
pub use update::update;

use services::Services;

/// The target named by `--consumer`, or the shared store.
fn target(config: &Config) -> OperationTarget {
    config
        .consumer
        .clone()
        .map_or(OperationTarget::Solution, OperationTarget::Consumer)
}

/// Scope for batch commands: one package, one consumer, or everything.
fn scope(config: &Config, id: Option<&str>) -> Scope {
    match id {
        Some(id) => Scope::Package {
            target: target(config),
            id: id.to_string(),
        },
        None if config.consumer.is_some() => Scope::Target(target(config)),
        None => Scope::All,
    }
}

fn print_plan(plan: &OperationPlan) {
    for warning in plan.warnings() {
        eprintln!("Warning: {}", warning);
    }
    if plan.is_empty() {
        println!("Nothing to do.");
        return;
    }
    for operation in plan.operations() {
        println!("{}", operation);
    }
}

fn print_summary(summary: &ExecutionSummary) {
    for outcome in &summary.outcomes {
        match outcome.state {
            OperationState::Succeeded => println!("{}", outcome.operation),
            _ => eprintln!(
                "Failed: {}: {}",
                outcome.operation,
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Execute `plan`, persist the store, and report what happened.
///
/// With `dry_run` the plan is only printed.
#[tracing::instrument(skip(runtime, config, services, plan))]
async fn apply<R: Runtime>(
    runtime: &R,
    config: &Config,
    services: &Services,
    plan: &OperationPlan,
) -> Result<ExecutionSummary> {
    if config.dry_run || plan.is_empty() {
        print_plan(plan);
        return Ok(ExecutionSummary {
            outcomes: Vec::new(),
            warnings: plan.warnings().to_vec(),
        });
    }

    for warning in plan.warnings() {
        eprintln!("Warning: {}", warning);
    }
    let executor = PlanExecutor::new(services.store.clone(), services.installer.clone());
    let summary = executor.execute(plan).await;
    print_summary(&summary);

    debug!("Saving store to {:?}", config.store_path());
    services.store.save(runtime, &config.store_path())?;

    if !summary.is_success() {
        bail!(
            "{} of {} operation(s) failed",
            summary.failed(),
            summary.outcomes.len()
        );
    }
    Ok(summary)
}
