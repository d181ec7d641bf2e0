use anyhow::Result;
use log::debug;

use crate::{runtime::Runtime, store::ReferenceKind};

use super::{config::Config, services::load_store};

/// List installed packages per consumer, then the solution-level ones.
#[tracing::instrument(skip(runtime, config))]
pub fn list<R: Runtime>(runtime: R, config: Config) -> Result<()> {
    debug!("Listing packages from {:?}", config.store_path());
    let store = load_store(&runtime, &config)?;

    let consumers: Vec<String> = match &config.consumer {
        Some(consumer) => vec![consumer.clone()],
        None => store.consumers(),
    };
    let solution = if config.consumer.is_none() {
        store.solution_packages()
    } else {
        Vec::new()
    };

    let mut printed = false;
    for consumer in consumers {
        let references = store.packages_for(&consumer);
        if references.is_empty() {
            continue;
        }
        match store.framework(&consumer) {
            Some(framework) => println!("{} ({})", consumer, framework),
            None => println!("{}", consumer),
        }
        for reference in references {
            let marker = match reference.kind {
                ReferenceKind::Direct => "",
                ReferenceKind::Dependency => " (dependency)",
            };
            println!("  {}{}", reference.package, marker);
        }
        printed = true;
    }

    if !solution.is_empty() {
        println!("solution");
        for package in solution {
            println!("  {}", package);
        }
        printed = true;
    }

    if !printed {
        println!("No packages installed.");
    }
    Ok(())
}
