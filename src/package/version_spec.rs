//! Version ranges in interval notation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SemanticVersion;
use crate::error::Error;

/// A (possibly open) range of versions.
///
/// Parsed from interval notation:
///
/// | Text          | Meaning              |
/// |---------------|----------------------|
/// | `1.0`         | `1.0 <= v`           |
/// | `[1.0]`       | `v == 1.0`           |
/// | `(1.0,)`      | `1.0 < v`            |
/// | `(,2.0]`      | `v <= 2.0`           |
/// | `[1.0,2.0)`   | `1.0 <= v < 2.0`     |
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VersionSpec {
    pub min_version: Option<SemanticVersion>,
    pub is_min_inclusive: bool,
    pub max_version: Option<SemanticVersion>,
    pub is_max_inclusive: bool,
}

impl VersionSpec {
    /// Matches exactly one version.
    pub fn exact(version: SemanticVersion) -> Self {
        Self {
            min_version: Some(version.clone()),
            is_min_inclusive: true,
            max_version: Some(version),
            is_max_inclusive: true,
        }
    }

    /// Matches the given version and anything above it.
    pub fn at_least(version: SemanticVersion) -> Self {
        Self {
            min_version: Some(version),
            is_min_inclusive: true,
            max_version: None,
            is_max_inclusive: false,
        }
    }

    pub fn satisfies(&self, version: &SemanticVersion) -> bool {
        let above_min = match &self.min_version {
            Some(min) if self.is_min_inclusive => version >= min,
            Some(min) => version > min,
            None => true,
        };
        let below_max = match &self.max_version {
            Some(max) if self.is_max_inclusive => version <= max,
            Some(max) => version < max,
            None => true,
        };
        above_min && below_max
    }

    /// The single version this spec pins, if it is an exact match.
    pub fn exact_version(&self) -> Option<&SemanticVersion> {
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) if self.is_min_inclusive && self.is_max_inclusive && min == max => {
                Some(min)
            }
            _ => None,
        }
    }

    /// The range of versions both specs accept, or `None` when they are
    /// disjoint.
    pub fn intersect(&self, other: &VersionSpec) -> Option<VersionSpec> {
        let (min_version, is_min_inclusive) = match (&self.min_version, &other.min_version) {
            (Some(a), Some(b)) if a == b => {
                (Some(a.clone()), self.is_min_inclusive && other.is_min_inclusive)
            }
            (Some(a), Some(b)) if a > b => (Some(a.clone()), self.is_min_inclusive),
            (Some(_), Some(b)) => (Some(b.clone()), other.is_min_inclusive),
            (Some(a), None) => (Some(a.clone()), self.is_min_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.is_min_inclusive),
            (None, None) => (None, false),
        };
        let (max_version, is_max_inclusive) = match (&self.max_version, &other.max_version) {
            (Some(a), Some(b)) if a == b => {
                (Some(a.clone()), self.is_max_inclusive && other.is_max_inclusive)
            }
            (Some(a), Some(b)) if a < b => (Some(a.clone()), self.is_max_inclusive),
            (Some(_), Some(b)) => (Some(b.clone()), other.is_max_inclusive),
            (Some(a), None) => (Some(a.clone()), self.is_max_inclusive),
            (None, Some(b)) => (Some(b.clone()), other.is_max_inclusive),
            (None, None) => (None, false),
        };

        let spec = VersionSpec {
            min_version,
            is_min_inclusive,
            max_version,
            is_max_inclusive,
        };
        (!spec.is_empty()).then_some(spec)
    }

    /// True when no version can satisfy the range.
    pub fn is_empty(&self) -> bool {
        match (&self.min_version, &self.max_version) {
            (Some(min), Some(max)) => {
                min > max || (min == max && !(self.is_min_inclusive && self.is_max_inclusive))
            }
            _ => false,
        }
    }

    /// Interval notation, the form accepted by `FromStr`.
    pub fn to_interval_string(&self) -> String {
        if let Some(exact) = self.exact_version() {
            return format!("[{}]", exact);
        }
        if let (Some(min), None, true) = (&self.min_version, &self.max_version, self.is_min_inclusive) {
            return min.to_string();
        }
        format!(
            "{}{},{}{}",
            if self.is_min_inclusive { '[' } else { '(' },
            self.min_version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            self.max_version.as_ref().map(|v| v.to_string()).unwrap_or_default(),
            if self.is_max_inclusive { ']' } else { ')' },
        )
    }
}

impl FromStr for VersionSpec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let invalid = || Error::InvalidVersionSpec(s.to_string());
        if text.is_empty() {
            return Err(invalid());
        }

        let first = text.chars().next().ok_or_else(invalid)?;
        if first != '[' && first != '(' {
            let version: SemanticVersion = text.parse().map_err(|_| invalid())?;
            return Ok(Self::at_least(version));
        }

        let last = text.chars().last().ok_or_else(invalid)?;
        if text.len() < 3 || (last != ']' && last != ')') {
            return Err(invalid());
        }
        let is_min_inclusive = first == '[';
        let is_max_inclusive = last == ']';
        let inner = &text[1..text.len() - 1];

        let parse_bound = |part: &str| -> Result<Option<SemanticVersion>, Error> {
            let part = part.trim();
            if part.is_empty() {
                Ok(None)
            } else {
                part.parse().map(Some).map_err(|_| invalid())
            }
        };

        let spec = match inner.split_once(',') {
            None => {
                // Only `[x]` is meaningful without a comma.
                if !is_min_inclusive || !is_max_inclusive {
                    return Err(invalid());
                }
                let version = parse_bound(inner)?.ok_or_else(invalid)?;
                Self::exact(version)
            }
            Some((min, max)) => {
                if max.contains(',') {
                    return Err(invalid());
                }
                let min_version = parse_bound(min)?;
                let max_version = parse_bound(max)?;
                if min_version.is_none() && max_version.is_none() {
                    return Err(invalid());
                }
                Self {
                    min_version,
                    is_min_inclusive,
                    max_version,
                    is_max_inclusive,
                }
            }
        };

        if spec.is_empty() {
            return Err(invalid());
        }

        Ok(spec)
    }
}

impl TryFrom<String> for VersionSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VersionSpec> for String {
    fn from(spec: VersionSpec) -> Self {
        spec.to_interval_string()
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(exact) = self.exact_version() {
            return write!(f, "(= {})", exact);
        }
        let min = self.min_version.as_ref().map(|v| {
            let op = if self.is_min_inclusive { ">=" } else { ">" };
            format!("{} {}", op, v)
        });
        let max = self.max_version.as_ref().map(|v| {
            let op = if self.is_max_inclusive { "<=" } else { "<" };
            format!("{} {}", op, v)
        });
        match (min, max) {
            (Some(min), Some(max)) => write!(f, "({} && {})", min, max),
            (Some(bound), None) | (None, Some(bound)) => write!(f, "({})", bound),
            (None, None) => f.write_str("(any)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> SemanticVersion {
        s.parse().unwrap()
    }

    fn spec(s: &str) -> VersionSpec {
        s.parse().unwrap()
    }

    #[test]
    fn test_plain_version_means_at_least() {
        let s = spec("1.0.1");
        assert!(s.satisfies(&v("1.0.1")));
        assert!(s.satisfies(&v("3.0")));
        assert!(!s.satisfies(&v("1.0")));
        assert_eq!(s.max_version, None);
        assert!(s.is_min_inclusive);
    }

    #[test]
    fn test_exact() {
        let s = spec("[1.2]");
        assert_eq!(s.exact_version(), Some(&v("1.2")));
        assert!(s.satisfies(&v("1.2.0")));
        assert!(!s.satisfies(&v("1.2.1")));
        assert!(!s.satisfies(&v("1.2-alpha")));
    }

    #[test]
    fn test_half_open_ranges() {
        let s = spec("[1.0,2.0)");
        assert!(s.satisfies(&v("1.0")));
        assert!(s.satisfies(&v("1.9.9")));
        assert!(!s.satisfies(&v("2.0")));

        let s = spec("(,2.0]");
        assert!(s.satisfies(&v("0.1")));
        assert!(s.satisfies(&v("2.0")));
        assert!(!s.satisfies(&v("2.0.1")));

        let s = spec("(1.0,)");
        assert!(!s.satisfies(&v("1.0")));
        assert!(s.satisfies(&v("1.0.1")));
    }

    #[test]
    fn test_intersect_overlapping_ranges() {
        assert_eq!(spec("1.0").intersect(&spec("[1.5,2.0)")), Some(spec("[1.5,2.0)")));
        assert_eq!(spec("[1.0,2.0]").intersect(&spec("(1.0,3.0)")), Some(spec("(1.0,2.0]")));
        assert_eq!(spec("[1.0,2.0)").intersect(&spec("[2.0,2.0]")), None);
        assert_eq!(spec("[1.0]").intersect(&spec("(,1.0]")), Some(spec("[1.0]")));
        assert_eq!(spec("[1.0]").intersect(&spec("[2.0]")), None);

        // The unbounded default accepts everything.
        let any = VersionSpec::default();
        assert_eq!(any.intersect(&spec("(,2.0)")), Some(spec("(,2.0)")));
        assert!(!any.is_empty());
    }

    #[test]
    fn test_invalid_specs() {
        for text in ["", "[", "[]", "(1.0)", "[,]", "[2.0,1.0]", "(1.0,1.0]", "[1,2,3]", "x"] {
            assert!(text.parse::<VersionSpec>().is_err(), "{} should fail", text);
        }
    }

    #[test]
    fn test_display_pretty() {
        assert_eq!(spec("1.0").to_string(), "(>= 1.0)");
        assert_eq!(spec("[1.0]").to_string(), "(= 1.0)");
        assert_eq!(spec("(1.0,2.0]").to_string(), "(> 1.0 && <= 2.0)");
        assert_eq!(spec("(,2.0)").to_string(), "(< 2.0)");
    }

    #[test]
    fn test_interval_string_parses_back() {
        for text in ["1.0", "[1.0]", "[1.0,2.0)", "(,3.0]", "(1.0,)"] {
            let parsed = spec(text);
            assert_eq!(spec(&parsed.to_interval_string()), parsed);
        }
    }

    #[test]
    fn test_serde_as_interval_string() {
        let json = serde_json::to_string(&spec("[1.0,2.0)")).unwrap();
        assert_eq!(json, "\"[1.0,2.0)\"");
    }
}
