use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use log::{debug, info, warn};
use tokio::sync::watch;

use super::installer::PackageInstaller;
use crate::package::PackageIdentity;
use crate::planner::PlanWarning;
use crate::repository::SharedRepository;
use crate::store::LocalStore;

/// Result of one restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: Vec<PackageIdentity>,
    pub failed: Vec<(PackageIdentity, String)>,
    pub warnings: Vec<PlanWarning>,
    pub cancelled: bool,
}

pub type RestoreHandle = Shared<BoxFuture<'static, RestoreSummary>>;

/// Puts back on disk every recorded package whose files are missing.
///
/// Only one restore runs at a time: asking again while one is in flight
/// returns the same handle.
pub struct Restorer {
    store: Arc<LocalStore>,
    source: SharedRepository,
    installer: Arc<dyn PackageInstaller>,
    cancel: watch::Sender<bool>,
    in_flight: Mutex<Option<RestoreHandle>>,
}

impl Restorer {
    pub fn new(
        store: Arc<LocalStore>,
        source: SharedRepository,
        installer: Arc<dyn PackageInstaller>,
    ) -> Self {
        let (cancel, _) = watch::channel(false);
        Self {
            store,
            source,
            installer,
            cancel,
            in_flight: Mutex::new(None),
        }
    }

    /// Recorded packages with no files on disk.
    pub fn missing_packages(&self) -> Vec<PackageIdentity> {
        self.store
            .installed()
            .into_iter()
            .map(|p| p.identity)
            .filter(|identity| !self.installer.is_installed_on_disk(identity))
            .collect()
    }

    /// Start restoring, or join the restore already running.
    ///
    /// When nothing is missing the returned handle resolves immediately.
    #[tracing::instrument(skip(self))]
    pub fn restore(&self) -> RestoreHandle {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = in_flight.as_ref()
            && handle.peek().is_none()
        {
            debug!("Joining the restore already in progress");
            return handle.clone();
        }

        let missing = self.missing_packages();
        if missing.is_empty() {
            debug!("Nothing to restore");
            *in_flight = None;
            return futures_util::future::ready(RestoreSummary::default())
                .boxed()
                .shared();
        }

        self.cancel.send_replace(false);
        let handle = restore_packages(
            missing,
            self.source.clone(),
            self.installer.clone(),
            self.cancel.subscribe(),
        )
        .boxed()
        .shared();
        *in_flight = Some(handle.clone());
        handle
    }

    /// Ask the running restore to stop before its next package.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }
}

async fn restore_packages(
    missing: Vec<PackageIdentity>,
    source: SharedRepository,
    installer: Arc<dyn PackageInstaller>,
    cancel: watch::Receiver<bool>,
) -> RestoreSummary {
    info!("Restoring {} package(s)", missing.len());
    let mut summary = RestoreSummary::default();

    for identity in missing {
        if *cancel.borrow() {
            info!("Restore cancelled");
            summary.cancelled = true;
            break;
        }

        let package = match source.find_package(&identity.id, &identity.version) {
            Ok(Some(package)) => package,
            Ok(None) => {
                let warning = PlanWarning::MissingSourcePackage {
                    package: identity,
                    consumer: None,
                };
                warn!("{}", warning);
                summary.warnings.push(warning);
                continue;
            }
            Err(e) => {
                warn!("Unable to look up '{}': {}", identity, e);
                summary.failed.push((identity, e.to_string()));
                continue;
            }
        };

        match installer.install_files(&package).await {
            Ok(()) => {
                debug!("Restored '{}'", identity);
                summary.restored.push(identity);
            }
            Err(e) => {
                warn!("Failed to restore '{}': {:#}", identity, e);
                summary.failed.push((identity, format!("{:#}", e)));
            }
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::installer::MockPackageInstaller;
    use crate::package::Package;
    use crate::package::fixtures::*;
    use crate::repository::InMemoryRepository;
    use crate::store::ReferenceKind;

    fn source(packages: Vec<Package>) -> SharedRepository {
        let mut repo = InMemoryRepository::new("source");
        for package in packages {
            repo.add(package);
        }
        Arc::new(repo)
    }

    fn store() -> Arc<LocalStore> {
        let store = LocalStore::new();
        store.add_reference("web", &package("A", "1.0"), ReferenceKind::Direct);
        store.add_reference("web", &package("B", "1.0"), ReferenceKind::Direct);
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_restore_missing_and_warn_on_unknown() {
        let mut installer = MockPackageInstaller::new();
        installer
            .expect_is_installed_on_disk()
            .returning(|identity| identity.id != "A" && identity.id != "B");
        installer
            .expect_install_files()
            .withf(|p: &Package| p.id() == "A")
            .times(1)
            .returning(|_| Ok(()));

        let restorer = Restorer::new(
            store(),
            source(vec![package("A", "1.0")]),
            Arc::new(installer),
        );
        let summary = restorer.restore().await;

        assert_eq!(summary.restored, vec![identity("A", "1.0")]);
        assert_eq!(
            summary.warnings,
            vec![PlanWarning::MissingSourcePackage {
                package: identity("B", "1.0"),
                consumer: None,
            }]
        );
        assert!(!summary.cancelled);
    }

    #[tokio::test]
    async fn test_restore_nothing_missing_is_ready() {
        let mut installer = MockPackageInstaller::new();
        installer.expect_is_installed_on_disk().returning(|_| true);

        let restorer = Restorer::new(store(), source(vec![]), Arc::new(installer));
        assert!(restorer.missing_packages().is_empty());
        assert_eq!(restorer.restore().await, RestoreSummary::default());
    }

    #[tokio::test]
    async fn test_concurrent_requests_share_one_restore() {
        let mut installer = MockPackageInstaller::new();
        installer.expect_is_installed_on_disk().returning(|_| false);
        installer
            .expect_install_files()
            .times(2)
            .returning(|_| Ok(()));

        let restorer = Restorer::new(
            store(),
            source(vec![package("A", "1.0"), package("B", "1.0")]),
            Arc::new(installer),
        );
        let first = restorer.restore();
        let second = restorer.restore();
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, b);
        assert_eq!(a.restored.len(), 2);
    }

    #[tokio::test]
    async fn test_cancel_stops_before_next_package() {
        let mut installer = MockPackageInstaller::new();
        installer.expect_is_installed_on_disk().returning(|_| false);
        installer.expect_install_files().never();

        let restorer = Restorer::new(
            store(),
            source(vec![package("A", "1.0"), package("B", "1.0")]),
            Arc::new(installer),
        );
        let handle = restorer.restore();
        restorer.cancel();
        let summary = handle.await;

        assert!(summary.cancelled);
        assert!(summary.restored.is_empty());
    }

    #[tokio::test]
    async fn test_restore_reports_install_failure() {
        let mut installer = MockPackageInstaller::new();
        installer.expect_is_installed_on_disk().returning(|_| false);
        installer
            .expect_install_files()
            .returning(|p| {
                if p.id() == "A" {
                    Err(anyhow::anyhow!("disk full"))
                } else {
                    Ok(())
                }
            });

        let restorer = Restorer::new(
            store(),
            source(vec![package("A", "1.0"), package("B", "1.0")]),
            Arc::new(installer),
        );
        let summary = restorer.restore().await;

        assert_eq!(summary.restored, vec![identity("B", "1.0")]);
        assert_eq!(
            summary.failed,
            vec![(identity("A", "1.0"), "disk full".to_string())]
        );
    }
}
