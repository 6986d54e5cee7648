use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Arena index of a schema object tracked by the version ledger.
///
/// Object ids are allocated densely from zero and never reused; soft-deleted
/// objects keep their id.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    pub const fn new(index: u64) -> Self {
        Self(index)
    }

    /// The raw arena index.
    pub fn index(&self) -> u64 {
        self.0
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The kind of schema object under version control.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    Schema,
    Table,
    Column,
    View,
    MaterializedView,
    Function,
    Procedure,
    Trigger,
    Index,
    Sequence,
    Constraint,
    Type,
    Extension,
}

impl ObjectType {
    /// Every variant, in declaration order.
    pub const ALL: [ObjectType; 13] = [
        Self::Schema,
        Self::Table,
        Self::Column,
        Self::View,
        Self::MaterializedView,
        Self::Function,
        Self::Procedure,
        Self::Trigger,
        Self::Index,
        Self::Sequence,
        Self::Constraint,
        Self::Type,
        Self::Extension,
    ];

    /// Stable snake_case name, used in tree paths and conflict types.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Schema => "schema",
            Self::Table => "table",
            Self::Column => "column",
            Self::View => "view",
            Self::MaterializedView => "materialized_view",
            Self::Function => "function",
            Self::Procedure => "procedure",
            Self::Trigger => "trigger",
            Self::Index => "index",
            Self::Sequence => "sequence",
            Self::Constraint => "constraint",
            Self::Type => "type",
            Self::Extension => "extension",
        }
    }

    /// Objects that hold data or other objects. Dropping one loses data.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            Self::Schema | Self::Table | Self::MaterializedView | Self::Type
        )
    }

    /// Objects that live inside a container (column under table, etc.).
    pub fn is_member(&self) -> bool {
        matches!(
            self,
            Self::Column | Self::Constraint | Self::Index | Self::Trigger
        )
    }

    /// Objects that enforce integrity rules.
    pub fn is_integrity_rule(&self) -> bool {
        matches!(self, Self::Constraint)
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| TypeError::UnknownObjectType(s.to_string()))
    }
}

/// The identity of a schema object within one branch: `(type, schema, name)`.
///
/// Nested members carry their container in the name (`users.email`). The
/// tree path derived from a key is `"{type}/{schema}.{name}"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    pub object_type: ObjectType,
    pub schema: String,
    pub name: String,
}

impl ObjectKey {
    /// Build a key, rejecting empty or malformed identifiers.
    pub fn new(
        object_type: ObjectType,
        schema: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let schema = schema.into();
        let name = name.into();
        validate_identifier("schema", &schema)?;
        validate_identifier("name", &name)?;
        if schema.contains('.') {
            return Err(TypeError::InvalidIdentifier {
                field: "schema",
                reason: "must not contain '.'".into(),
            });
        }
        Ok(Self {
            object_type,
            schema,
            name,
        })
    }

    /// Tree path for this object, e.g. `table/app.users`.
    pub fn path(&self) -> String {
        format!("{}/{}.{}", self.object_type, self.schema, self.name)
    }

    /// Parse a tree path produced by [`ObjectKey::path`].
    pub fn from_path(path: &str) -> Result<Self, TypeError> {
        let (type_part, rest) = path.split_once('/').ok_or_else(|| {
            TypeError::InvalidIdentifier {
                field: "path",
                reason: format!("missing '/' in {path:?}"),
            }
        })?;
        let (schema, name) = rest.split_once('.').ok_or_else(|| TypeError::InvalidIdentifier {
            field: "path",
            reason: format!("missing '.' in {path:?}"),
        })?;
        Self::new(type_part.parse()?, schema, name)
    }

    /// Qualified name without the type, e.g. `app.users`.
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}.{}", self.object_type, self.schema, self.name)
    }
}

fn validate_identifier(field: &'static str, value: &str) -> Result<(), TypeError> {
    if value.trim().is_empty() {
        return Err(TypeError::InvalidIdentifier {
            field,
            reason: "must not be empty".into(),
        });
    }
    if value.chars().any(|c| c.is_whitespace() || c == '/' || c.is_control()) {
        return Err(TypeError::InvalidIdentifier {
            field,
            reason: format!("{value:?} contains whitespace, '/' or control characters"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_type_parse_roundtrip() {
        for t in ObjectType::ALL {
            assert_eq!(t.as_str().parse::<ObjectType>().unwrap(), t);
        }
    }

    #[test]
    fn object_type_parse_is_lenient_on_case() {
        assert_eq!("TABLE".parse::<ObjectType>().unwrap(), ObjectType::Table);
        assert_eq!(
            "Materialized View".parse::<ObjectType>().unwrap(),
            ObjectType::MaterializedView
        );
        assert!("widget".parse::<ObjectType>().is_err());
    }

    #[test]
    fn container_and_member_are_disjoint() {
        for t in ObjectType::ALL {
            assert!(!(t.is_container() && t.is_member()), "{t}");
        }
    }

    #[test]
    fn key_path_roundtrip() {
        let key = ObjectKey::new(ObjectType::Column, "app", "users.email").unwrap();
        assert_eq!(key.path(), "column/app.users.email");
        assert_eq!(ObjectKey::from_path(&key.path()).unwrap(), key);
    }

    #[test]
    fn key_rejects_empty_parts() {
        assert!(ObjectKey::new(ObjectType::Table, "", "users").is_err());
        assert!(ObjectKey::new(ObjectType::Table, "app", "  ").is_err());
        assert!(ObjectKey::new(ObjectType::Table, "app", "has space").is_err());
        assert!(ObjectKey::new(ObjectType::Table, "a.b", "users").is_err());
    }

    #[test]
    fn key_display() {
        let key = ObjectKey::new(ObjectType::Table, "app", "users").unwrap();
        assert_eq!(key.to_string(), "table app.users");
        assert_eq!(key.qualified_name(), "app.users");
    }

    #[test]
    fn object_type_serializes_snake_case() {
        let json = serde_json::to_string(&ObjectType::MaterializedView).unwrap();
        assert_eq!(json, "\"materialized_view\"");
    }
}
