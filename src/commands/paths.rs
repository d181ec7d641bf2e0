use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::runtime::Runtime;

/// Get the default install root: `~/.pkgplan`
#[tracing::instrument(skip(runtime))]
pub fn default_install_root<R: Runtime>(runtime: &R) -> Result<PathBuf> {
    let home_dir = runtime
        .home_dir()
        .context("Could not find home directory")?;
    Ok(home_dir.join(".pkgplan"))
}

/// Location of the persisted store under `root`.
pub fn store_path(root: &Path) -> PathBuf {
    root.join("store.json")
}
