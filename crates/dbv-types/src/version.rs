//! Semantic versions and change classification.
//!
//! Every schema object carries a [`SemVer`] that is bumped according to the
//! [`Severity`] of each change. The [`ChangeKind`] records what happened.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// How disruptive a change is. Drives the semantic version increment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Patch,
    Minor,
    Major,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Major => "MAJOR",
            Self::Minor => "MINOR",
            Self::Patch => "PATCH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MAJOR" => Ok(Self::Major),
            "MINOR" => Ok(Self::Minor),
            "PATCH" => Ok(Self::Patch),
            _ => Err(TypeError::UnknownVariant {
                field: "severity",
                value: s.to_string(),
            }),
        }
    }
}

/// What happened to an object in one history entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Create,
    Alter,
    Drop,
    Rename,
    Merge,
    ConflictResolved,
    Rollback,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Alter => "ALTER",
            Self::Drop => "DROP",
            Self::Rename => "RENAME",
            Self::Merge => "MERGE",
            Self::ConflictResolved => "CONFLICT_RESOLVED",
            Self::Rollback => "ROLLBACK",
        }
    }

    /// The severity applied when the caller does not supply one.
    pub fn default_severity(&self) -> Severity {
        match self {
            Self::Create | Self::Drop | Self::Rename => Severity::Major,
            Self::Alter | Self::Merge | Self::ConflictResolved | Self::Rollback => Severity::Minor,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(Self::Create),
            "ALTER" => Ok(Self::Alter),
            "DROP" => Ok(Self::Drop),
            "RENAME" => Ok(Self::Rename),
            "MERGE" => Ok(Self::Merge),
            "CONFLICT_RESOLVED" => Ok(Self::ConflictResolved),
            "ROLLBACK" => Ok(Self::Rollback),
            _ => Err(TypeError::UnknownVariant {
                field: "change kind",
                value: s.to_string(),
            }),
        }
    }
}

/// A `major.minor.patch` version triple.
///
/// Serializes as the string `"{major}.{minor}.{patch}"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SemVer {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl SemVer {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// The version every newly created object starts at.
    pub const fn initial() -> Self {
        Self::new(1, 0, 0)
    }

    /// Return the next version for a change of the given severity.
    ///
    /// MAJOR resets minor and patch, MINOR resets patch, PATCH only
    /// increments patch.
    pub fn bump(&self, severity: Severity) -> Self {
        match severity {
            Severity::Major => Self::new(self.major + 1, 0, 0),
            Severity::Minor => Self::new(self.major, self.minor + 1, 0),
            Severity::Patch => Self::new(self.major, self.minor, self.patch + 1),
        }
    }
}

impl Default for SemVer {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for SemVer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for SemVer {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 3 {
            return Err(TypeError::InvalidVersion(s.to_string()));
        }
        let parse = |p: &str| {
            p.parse::<u32>()
                .map_err(|_| TypeError::InvalidVersion(s.to_string()))
        };
        Ok(Self::new(parse(parts[0])?, parse(parts[1])?, parse(parts[2])?))
    }
}

impl Serialize for SemVer {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SemVer {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn initial_is_one_zero_zero() {
        assert_eq!(SemVer::initial().to_string(), "1.0.0");
    }

    #[test]
    fn minor_bump_from_initial() {
        assert_eq!(SemVer::initial().bump(Severity::Minor).to_string(), "1.1.0");
    }

    #[test]
    fn major_bump_resets_lower_parts() {
        assert_eq!(SemVer::new(1, 4, 7).bump(Severity::Major), SemVer::new(2, 0, 0));
    }

    #[test]
    fn parse_roundtrip() {
        let v: SemVer = "3.12.0".parse().unwrap();
        assert_eq!(v, SemVer::new(3, 12, 0));
        assert!("1.2".parse::<SemVer>().is_err());
        assert!("1.x.2".parse::<SemVer>().is_err());
    }

    #[test]
    fn serializes_as_dotted_string() {
        let json = serde_json::to_string(&SemVer::new(2, 1, 3)).unwrap();
        assert_eq!(json, "\"2.1.3\"");
        let back: SemVer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SemVer::new(2, 1, 3));
    }

    #[test]
    fn severity_and_kind_parse() {
        assert_eq!("minor".parse::<Severity>().unwrap(), Severity::Minor);
        assert_eq!(
            "conflict_resolved".parse::<ChangeKind>().unwrap(),
            ChangeKind::ConflictResolved
        );
        assert!("huge".parse::<Severity>().is_err());
    }

    #[test]
    fn severity_ordering() {
        assert!(Severity::Major > Severity::Minor);
        assert!(Severity::Minor > Severity::Patch);
    }

    fn any_severity() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Major),
            Just(Severity::Minor),
            Just(Severity::Patch)
        ]
    }

    proptest! {
        #[test]
        fn bump_rules_hold(major in 0u32..1000, minor in 0u32..1000, patch in 0u32..1000, sev in any_severity()) {
            let v = SemVer::new(major, minor, patch);
            let next = v.bump(sev);
            prop_assert!(next > v);
            match sev {
                Severity::Major => {
                    prop_assert_eq!(next.major, major + 1);
                    prop_assert_eq!(next.minor, 0);
                    prop_assert_eq!(next.patch, 0);
                }
                Severity::Minor => {
                    prop_assert_eq!(next.major, major);
                    prop_assert_eq!(next.minor, minor + 1);
                    prop_assert_eq!(next.patch, 0);
                }
                Severity::Patch => {
                    prop_assert_eq!(next.major, major);
                    prop_assert_eq!(next.minor, minor);
                    prop_assert_eq!(next.patch, patch + 1);
                }
            }
        }

        #[test]
        fn display_parse_roundtrip(major in 0u32..100_000, minor in 0u32..100_000, patch in 0u32..100_000) {
            let v = SemVer::new(major, minor, patch);
            prop_assert_eq!(v.to_string().parse::<SemVer>().unwrap(), v);
        }
    }
}
