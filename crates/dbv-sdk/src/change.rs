//! Change intake: what a change-capture collaborator reports.

use dbv_types::{ChangeKind, ContentHash, ObjectId, ObjectKey, ObjectType, SemVer, Severity};
use serde::{Deserialize, Serialize};

use crate::error::{SdkError, SdkResult};

/// One change to one object, already classified.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectChange {
    pub kind: ChangeKind,
    pub object_type: ObjectType,
    pub schema: String,
    pub name: String,
    /// Enclosing object, e.g. the table of a column.
    pub parent: Option<ObjectKey>,
    /// New definition text. Required for create and alter.
    pub definition: Option<String>,
    /// New name, for a rename.
    pub new_name: Option<String>,
    /// Overrides the configured and per-kind default severity.
    pub severity: Option<Severity>,
    /// Reject the change unless the object's change count still matches.
    pub expected_change_count: Option<u64>,
    pub message: Option<String>,
}

impl ObjectChange {
    fn new(kind: ChangeKind, object_type: ObjectType, schema: &str, name: &str) -> Self {
        Self {
            kind,
            object_type,
            schema: schema.to_string(),
            name: name.to_string(),
            parent: None,
            definition: None,
            new_name: None,
            severity: None,
            expected_change_count: None,
            message: None,
        }
    }

    pub fn create(object_type: ObjectType, schema: &str, name: &str, definition: &str) -> Self {
        Self {
            definition: Some(definition.to_string()),
            ..Self::new(ChangeKind::Create, object_type, schema, name)
        }
    }

    pub fn alter(object_type: ObjectType, schema: &str, name: &str, definition: &str) -> Self {
        Self {
            definition: Some(definition.to_string()),
            ..Self::new(ChangeKind::Alter, object_type, schema, name)
        }
    }

    pub fn drop(object_type: ObjectType, schema: &str, name: &str) -> Self {
        Self::new(ChangeKind::Drop, object_type, schema, name)
    }

    pub fn rename(object_type: ObjectType, schema: &str, name: &str, new_name: &str) -> Self {
        Self {
            new_name: Some(new_name.to_string()),
            ..Self::new(ChangeKind::Rename, object_type, schema, name)
        }
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn with_parent(mut self, parent: ObjectKey) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn expecting_change_count(mut self, count: u64) -> Self {
        self.expected_change_count = Some(count);
        self
    }

    pub fn key(&self) -> SdkResult<ObjectKey> {
        Ok(ObjectKey::new(self.object_type, &self.schema, &self.name)?)
    }

    pub(crate) fn require_definition(&self) -> SdkResult<&str> {
        self.definition.as_deref().ok_or_else(|| {
            SdkError::Validation(format!("{} of {} needs a definition", self.kind, self.name))
        })
    }
}

/// What recording a change produced.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeOutcome {
    pub object: ObjectId,
    pub key: ObjectKey,
    pub version: SemVer,
    pub change_count: u64,
    /// The new commit, or `None` when the change was a no-op (the
    /// normalized definition did not change).
    pub commit: Option<ContentHash>,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// A raw change statement with whatever the capturer already knows.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawChange {
    pub statement: String,
    pub object_type: Option<ObjectType>,
    pub schema: Option<String>,
    pub name: Option<String>,
}

/// The identity a classifier assigns to a raw change.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub object_type: ObjectType,
    pub schema: String,
    pub name: String,
}

/// Maps raw change text to the object it affects.
///
/// The repository never parses statements itself; plug in a classifier
/// that understands your dialect.
pub trait ChangeClassifier: Send + Sync {
    fn classify(&self, raw: &RawChange) -> SdkResult<Classification>;
}

/// Accepts only changes whose capturer already filled in type, schema
/// and name.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExplicitClassifier;

impl ChangeClassifier for ExplicitClassifier {
    fn classify(&self, raw: &RawChange) -> SdkResult<Classification> {
        match (raw.object_type, &raw.schema, &raw.name) {
            (Some(object_type), Some(schema), Some(name)) => Ok(Classification {
                object_type,
                schema: schema.clone(),
                name: name.clone(),
            }),
            _ => Err(SdkError::Validation(
                "change is not classified: object type, schema and name are required".into(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_classifier_requires_all_parts() {
        let mut raw = RawChange {
            statement: "CREATE TABLE app.users (id int)".into(),
            object_type: Some(ObjectType::Table),
            schema: Some("app".into()),
            name: None,
        };
        assert!(ExplicitClassifier.classify(&raw).is_err());
        raw.name = Some("users".into());
        let c = ExplicitClassifier.classify(&raw).unwrap();
        assert_eq!(c.name, "users");
    }

    #[test]
    fn builders() {
        let change = ObjectChange::alter(ObjectType::Table, "app", "users", "x")
            .with_severity(Severity::Patch)
            .expecting_change_count(2);
        assert_eq!(change.kind, ChangeKind::Alter);
        assert_eq!(change.expected_change_count, Some(2));
        assert!(ObjectChange::drop(ObjectType::Table, "app", "users")
            .require_definition()
            .is_err());
        assert!(ObjectChange::create(ObjectType::Table, "", "users", "x").key().is_err());
    }
}
