use std::path::PathBuf;

#[tracing::instrument]
pub(super) fn home_dir() -> Option<PathBuf> {
    dirs::home_dir()
}
