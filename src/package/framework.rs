//! Target frameworks and the compatibility oracle used to pick dependency sets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DependencySet, SemanticVersion};
use crate::error::Error;

/// A target framework such as `net45` or `netstandard2.0`.
///
/// The short form is split into a lowercase identifier and a version:
/// `net45` becomes `net` / `4.5`, `netstandard2.0` becomes `netstandard` / `2.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FrameworkName {
    identifier: String,
    version: SemanticVersion,
}

impl FrameworkName {
    pub fn new(identifier: impl Into<String>, version: SemanticVersion) -> Self {
        Self {
            identifier: identifier.into().to_lowercase(),
            version,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn version(&self) -> &SemanticVersion {
        &self.version
    }
}

impl FromStr for FrameworkName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || Error::InvalidFramework(s.to_string());

        let split = text
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (identifier, digits) = text.split_at(split);
        if identifier.is_empty() || !identifier.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid());
        }

        let version = if digits.contains('.') {
            digits.parse().map_err(|_| invalid())?
        } else {
            // `net451` means 4.5.1
            if !digits.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let dotted: Vec<String> = digits.chars().map(String::from).collect();
            dotted.join(".").parse().map_err(|_| invalid())?
        };

        Ok(Self::new(identifier, version))
    }
}

impl TryFrom<String> for FrameworkName {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<FrameworkName> for String {
    fn from(framework: FrameworkName) -> Self {
        framework.to_string()
    }
}

impl fmt::Display for FrameworkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.identifier, self.version)
    }
}

/// Decides which of a package's dependency sets applies to a consumer.
pub trait FrameworkCompatibility: Send + Sync {
    /// Whether content built for `package_framework` can be used by a
    /// consumer targeting `project_framework`.
    fn is_compatible(&self, package_framework: &FrameworkName, project_framework: &FrameworkName)
    -> bool;

    /// Pick the most specific compatible set, falling back to the
    /// framework-less set when no framework-specific set applies.
    fn select_dependency_set<'a>(
        &self,
        sets: &'a [DependencySet],
        target: Option<&FrameworkName>,
    ) -> Option<&'a DependencySet> {
        let specific = target.and_then(|target| {
            sets.iter()
                .filter_map(|set| {
                    set.target_framework
                        .as_ref()
                        .filter(|fw| self.is_compatible(fw, target))
                        .map(|fw| (fw, set))
                })
                // max_by keeps the last of equal elements; reverse so the
                // first declared set wins a tie.
                .rev()
                .max_by(|(a, _), (b, _)| a.version().cmp(b.version()))
                .map(|(_, set)| set)
        });

        specific.or_else(|| sets.iter().find(|set| set.target_framework.is_none()))
    }
}

/// Same identifier, and the package targets an equal or older version.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultFrameworkCompatibility;

impl FrameworkCompatibility for DefaultFrameworkCompatibility {
    fn is_compatible(
        &self,
        package_framework: &FrameworkName,
        project_framework: &FrameworkName,
    ) -> bool {
        package_framework.identifier() == project_framework.identifier()
            && package_framework.version() <= project_framework.version()
    }
}
