//! Semantic versions with an optional fourth (revision) component.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::Error;

/// A `major.minor.patch[.revision][-label]` version.
///
/// Missing numeric components are treated as zero, so `1.0` and `1.0.0.0`
/// compare equal. The pre-release label is compared case-insensitively and a
/// labelled version always sorts before the release with the same numbers.
/// The text the version was parsed from is kept for display.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SemanticVersion {
    parts: [u64; 4],
    label: Option<String>,
    original: String,
}

impl SemanticVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            parts: [major, minor, patch, 0],
            label: None,
            original: format!("{}.{}.{}", major, minor, patch),
        }
    }

    pub fn major(&self) -> u64 {
        self.parts[0]
    }

    pub fn minor(&self) -> u64 {
        self.parts[1]
    }

    pub fn patch(&self) -> u64 {
        self.parts[2]
    }

    pub fn revision(&self) -> u64 {
        self.parts[3]
    }

    /// Pre-release label, without the leading dash.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.label.is_some()
    }

    /// True when both versions share major and minor components.
    pub fn same_minor_line(&self, other: &SemanticVersion) -> bool {
        self.major() == other.major() && self.minor() == other.minor()
    }

    /// Canonical text: trailing zero components dropped down to
    /// `major.minor`, label lowercased. Equal versions share one form.
    pub fn normalized(&self) -> String {
        let len = self.parts.iter().rposition(|&n| n != 0).map_or(2, |i| (i + 1).max(2));
        let mut text = self.parts[..len]
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(".");
        if let Some(label) = &self.label {
            text.push('-');
            text.push_str(&label.to_ascii_lowercase());
        }
        text
    }
}

impl FromStr for SemanticVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let invalid = || Error::InvalidVersion(s.to_string());

        let (numbers, label) = match trimmed.split_once('-') {
            Some((numbers, label)) => (numbers, Some(label)),
            None => (trimmed, None),
        };
        if let Some(label) = label
            && (label.is_empty()
                || !label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-'))
        {
            return Err(invalid());
        }

        let components: Vec<&str> = numbers.split('.').collect();
        if components.is_empty() || components.len() > 4 {
            return Err(invalid());
        }

        let mut parts = [0u64; 4];
        for (slot, component) in parts.iter_mut().zip(&components) {
            if component.is_empty() || !component.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            *slot = component.parse().map_err(|_| invalid())?;
        }

        Ok(Self {
            parts,
            label: label.map(String::from),
            original: trimmed.to_string(),
        })
    }
}

impl TryFrom<String> for SemanticVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SemanticVersion> for String {
    fn from(version: SemanticVersion) -> Self {
        version.original
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts
            .cmp(&other.parts)
            .then_with(|| match (&self.label, &other.label) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.parts.hash(state);
        self.label.as_ref().map(|l| l.to_lowercase()).hash(state);
    }
}
