//! Physical install/remove primitive used when executing a plan.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;

use crate::package::{Package, PackageIdentity, id_key};
use crate::runtime::{Runtime, write_atomic};

/// Name of the manifest written into every package directory.
pub const MANIFEST_FILE: &str = "package.json";

/// Puts package content on disk and takes it off again.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install_files(&self, package: &Package) -> Result<()>;

    async fn remove_files(&self, identity: &PackageIdentity) -> Result<()>;

    fn is_installed_on_disk(&self, identity: &PackageIdentity) -> bool;
}

/// Lays packages out as `<root>/packages/<id>.<version>/package.json`.
pub struct FsPackageInstaller<R: Runtime> {
    runtime: Arc<R>,
    root: PathBuf,
}

impl<R: Runtime> FsPackageInstaller<R> {
    pub fn new(runtime: Arc<R>, root: PathBuf) -> Self {
        Self { runtime, root }
    }

    pub fn packages_dir(&self) -> PathBuf {
        self.root.join("packages")
    }

    /// `<root>/packages/<id>.<version>`, with the id lowercased and the
    /// version normalized.
    pub fn package_dir(&self, identity: &PackageIdentity) -> PathBuf {
        self.packages_dir().join(format!(
            "{}.{}",
            id_key(&identity.id),
            identity.version.normalized()
        ))
    }

    fn manifest_path(&self, identity: &PackageIdentity) -> PathBuf {
        self.package_dir(identity).join(MANIFEST_FILE)
    }
}

#[async_trait]
impl<R: Runtime + 'static> PackageInstaller for FsPackageInstaller<R> {
    #[tracing::instrument(skip(self, package), fields(package = %package))]
    async fn install_files(&self, package: &Package) -> Result<()> {
        let dir = self.package_dir(&package.identity);
        self.runtime.create_dir_all(&dir)?;

        let content = serde_json::to_string_pretty(package)?;
        let path = dir.join(MANIFEST_FILE);
        write_atomic(self.runtime.as_ref(), &path, content.as_bytes())
            .with_context(|| format!("Failed to install {:?}", path))?;
        debug!("Installed files for '{}' into {:?}", package, dir);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn remove_files(&self, identity: &PackageIdentity) -> Result<()> {
        let dir = self.package_dir(identity);
        if self.runtime.exists(&dir) {
            self.runtime
                .remove_dir_all(&dir)
                .with_context(|| format!("Failed to remove {:?}", dir))?;
            debug!("Removed files for '{}'", identity);
        }
        Ok(())
    }

    fn is_installed_on_disk(&self, identity: &PackageIdentity) -> bool {
        self.runtime.exists(&self.manifest_path(identity))
    }
}
