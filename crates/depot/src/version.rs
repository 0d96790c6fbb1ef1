//! Four-part artifact versions: `major.minor.micro.qualifier`.
//!
//! Missing numeric parts default to zero and the qualifier defaults to empty,
//! so `1`, `1.0` and `1.0.0` are the same version. Ordering compares the
//! numeric parts first and then the qualifier lexically.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    major: u32,
    minor: u32,
    micro: u32,
    qualifier: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version string")]
    Empty,

    #[error("invalid numeric component {component:?} in version {input:?}")]
    InvalidNumber { input: String, component: String },

    #[error("invalid qualifier {qualifier:?} in version {input:?}")]
    InvalidQualifier { input: String, qualifier: String },

    #[error("too many components in version {0:?}")]
    TooManyComponents(String),
}

impl Version {
    pub const ZERO: Version = Version {
        major: 0,
        minor: 0,
        micro: 0,
        qualifier: String::new(),
    };

    pub fn new(major: u32, minor: u32, micro: u32) -> Self {
        Self {
            major,
            minor,
            micro,
            qualifier: String::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: impl Into<String>) -> Result<Self, VersionError> {
        let qualifier = qualifier.into();
        if !is_valid_qualifier(&qualifier) {
            return Err(VersionError::InvalidQualifier {
                input: self.to_string(),
                qualifier,
            });
        }
        self.qualifier = qualifier;
        Ok(self)
    }

    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(VersionError::Empty);
        }

        let mut parts = trimmed.splitn(4, '.');
        let mut numbers = [0u32; 3];
        for slot in numbers.iter_mut() {
            match parts.next() {
                Some(component) => {
                    let invalid = || VersionError::InvalidNumber {
                        input: input.to_string(),
                        component: component.to_string(),
                    };
                    // `u32::from_str` also takes a leading `+`.
                    if component.is_empty() || !component.bytes().all(|b| b.is_ascii_digit()) {
                        return Err(invalid());
                    }
                    *slot = component.parse().map_err(|_| invalid())?;
                }
                None => break,
            }
        }

        let qualifier = match parts.next() {
            None => String::new(),
            Some("") => {
                return Err(VersionError::InvalidQualifier {
                    input: input.to_string(),
                    qualifier: String::new(),
                })
            }
            Some(q) => q.to_string(),
        };
        if !is_valid_qualifier(&qualifier) {
            if qualifier.contains('.') {
                return Err(VersionError::TooManyComponents(input.to_string()));
            }
            return Err(VersionError::InvalidQualifier {
                input: input.to_string(),
                qualifier,
            });
        }

        Ok(Self {
            major: numbers[0],
            minor: numbers[1],
            micro: numbers[2],
            qualifier,
        })
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn micro(&self) -> u32 {
        self.micro
    }

    pub fn qualifier(&self) -> &str {
        &self.qualifier
    }
}

fn is_valid_qualifier(qualifier: &str) -> bool {
    qualifier
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

impl Default for Version {
    fn default() -> Self {
        Self::ZERO
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.micro.cmp(&other.micro))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.micro)?;
        if !self.qualifier.is_empty() {
            write!(f, ".{}", self.qualifier)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = VersionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(version: Version) -> Self {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        s.parse().unwrap()
    }

    #[test]
    fn test_missing_parts_default_to_zero() {
        assert_eq!(v("1"), Version::new(1, 0, 0));
        assert_eq!(v("1.2"), Version::new(1, 2, 0));
        assert_eq!(v("1.2.3"), Version::new(1, 2, 3));
    }

    #[test]
    fn test_qualifier_parsed() {
        let version = v("2.6.1.v20240101-rc_1");
        assert_eq!(version.micro(), 1);
        assert_eq!(version.qualifier(), "v20240101-rc_1");
    }

    #[test]
    fn test_display_omits_empty_qualifier() {
        assert_eq!(v("2.6.1").to_string(), "2.6.1");
        assert_eq!(v("2.6").to_string(), "2.6.0");
        assert_eq!(v("1.0.0.SNAPSHOT").to_string(), "1.0.0.SNAPSHOT");
    }

    #[test]
    fn test_numeric_parts_compare_numerically() {
        assert!(v("1.10.0") > v("1.9.0"));
        assert!(v("2.0.0") > v("1.99.99"));
    }

    #[test]
    fn test_qualifier_compares_lexically_after_numbers() {
        assert!(v("1.0.0") < v("1.0.0.a"));
        assert!(v("1.0.0.alpha") < v("1.0.0.beta"));
        assert!(v("1.0.0.zzz") < v("1.0.1"));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(Version::parse("   "), Err(VersionError::Empty));
        assert!(matches!(
            Version::parse("1.x.0"),
            Err(VersionError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Version::parse("1.0.0.bad qualifier"),
            Err(VersionError::InvalidQualifier { .. })
        ));
        assert!(matches!(
            Version::parse("1.0.0.a.b"),
            Err(VersionError::TooManyComponents(_))
        ));
    }

    #[test]
    fn test_rejects_signs_and_empty_components() {
        for input in ["+1.0.0", "1.+2.0", "1..0", "1.", "1.0.0."] {
            assert!(Version::parse(input).is_err(), "{input:?} should not parse");
        }
        assert!(matches!(
            Version::parse("+1"),
            Err(VersionError::InvalidNumber { .. })
        ));
        assert!(matches!(
            Version::parse("1.0.0."),
            Err(VersionError::InvalidQualifier { .. })
        ));
    }

    #[test]
    fn test_with_qualifier() {
        let version = Version::new(1, 2, 3).with_qualifier("final").unwrap();
        assert_eq!(version.to_string(), "1.2.3.final");
        assert!(Version::new(1, 0, 0).with_qualifier("no/slash").is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let version = v("3.1.4.pi");
        let json = serde_json::to_string(&version).unwrap();
        assert_eq!(json, "\"3.1.4.pi\"");
        let restored: Version = serde_json::from_str(&json).unwrap();
        assert_eq!(version, restored);
    }
}
