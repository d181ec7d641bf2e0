//! `std::fs` calls with the path in every error.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

#[tracing::instrument(skip(contents), fields(len = contents.len()))]
pub(super) fn write(path: &Path, contents: &[u8]) -> Result<()> {
    std::fs::write(path, contents).with_context(|| format!("Cannot write {:?}", path))
}

#[tracing::instrument]
pub(super) fn read_to_string(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Cannot read {:?}", path))
}

#[tracing::instrument]
pub(super) fn rename(from: &Path, to: &Path) -> Result<()> {
    std::fs::rename(from, to).with_context(|| format!("Cannot rename {:?} to {:?}", from, to))
}

#[tracing::instrument]
pub(super) fn create_dir_all(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Cannot create {:?}", path))
}

#[tracing::instrument]
pub(super) fn remove_dir_all(path: &Path) -> Result<()> {
    std::fs::remove_dir_all(path).with_context(|| format!("Cannot remove {:?}", path))
}

#[tracing::instrument]
pub(super) fn read_dir(path: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = std::fs::read_dir(path)
        .with_context(|| format!("Cannot list {:?}", path))?
        .map(|entry| Ok(entry?.path()))
        .collect::<Result<Vec<_>>>()?;
    entries.sort();
    Ok(entries)
}

#[tracing::instrument]
pub(super) fn canonicalize(path: &Path) -> Result<PathBuf> {
    std::fs::canonicalize(path).with_context(|| format!("Cannot resolve {:?}", path))
}
