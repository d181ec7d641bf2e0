//! Error types for resolution, planning and the local store.

use thiserror::Error;

use crate::package::{PackageIdentity, SemanticVersion, VersionSpec};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to resolve dependency '{}'", format_dependency(.id, .version_spec))]
    DependencyUnresolved {
        id: String,
        version_spec: Option<VersionSpec>,
    },

    #[error(
        "Unable to resolve dependency '{id}': {required_by} requires '{required}' but version {selected} was already selected"
    )]
    DependencyConflict {
        id: String,
        selected: SemanticVersion,
        required: VersionSpec,
        required_by: PackageIdentity,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),

    #[error("Unable to find package '{}'", format_package(.id, .version))]
    PackageNotFound {
        id: String,
        version: Option<SemanticVersion>,
    },

    #[error("Unable to remove '{id} {version}' because it is still referenced")]
    StillReferenced { id: String, version: SemanticVersion },

    #[error("Package source '{name}' is unavailable: {reason}")]
    SourceUnavailable { name: String, reason: String },

    #[error("No project was specified for '{id}'")]
    NoProjectSpecified { id: String },

    #[error("Unable to uninstall '{package}' because {dependents} depend(s) on it")]
    PackageHasDependents {
        package: PackageIdentity,
        dependents: String,
    },

    #[error("Package '{id}' is not installed in '{consumer}'")]
    NotInstalled { id: String, consumer: String },

    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    #[error("Invalid version range: '{0}'")]
    InvalidVersionSpec(String),

    #[error("Invalid target framework: '{0}'")]
    InvalidFramework(String),

    #[error(
        "Unknown dependency version policy: '{0}'. Expected lowest, highest, highestminor, or highestpatch"
    )]
    InvalidDependencyVersion(String),

    #[error("Package id must not be empty")]
    EmptyPackageId,
}

impl Error {
    /// Wrap any failure raised while reading a package source.
    pub fn source_unavailable(name: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Error::SourceUnavailable {
            name: name.into(),
            reason: reason.to_string(),
        }
    }
}

fn format_dependency(id: &str, spec: &Option<VersionSpec>) -> String {
    match spec {
        Some(spec) => format!("{} {}", id, spec),
        None => id.to_string(),
    }
}

fn format_package(id: &str, version: &Option<SemanticVersion>) -> String {
    match version {
        Some(version) => format!("{} {}", id, version),
        None => id.to_string(),
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_unresolved_message() {
        let err = Error::DependencyUnresolved {
            id: "B".into(),
            version_spec: Some("[1.0,2.0)".parse().unwrap()),
        };
        assert_eq!(
            err.to_string(),
            "Unable to resolve dependency 'B (>= 1.0 && < 2.0)'"
        );

        let err = Error::DependencyUnresolved {
            id: "B".into(),
            version_spec: None,
        };
        assert_eq!(err.to_string(), "Unable to resolve dependency 'B'");
    }

    #[test]
    fn test_still_referenced_message() {
        let err = Error::StillReferenced {
            id: "B".into(),
            version: "1.0".parse().unwrap(),
        };
        assert!(err.to_string().contains("B 1.0"));
        assert!(err.to_string().contains("still referenced"));
    }

    #[test]
    fn test_source_unavailable_helper() {
        let err = Error::source_unavailable("nightly", "connection refused");
        assert_eq!(
            err.to_string(),
            "Package source 'nightly' is unavailable: connection refused"
        );
    }
}
