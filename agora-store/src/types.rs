//! Core record and identity types shared across the store contract.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Identifier of a durable record in the synchronized store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct RecordId(pub Uuid);

impl RecordId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Connection-scoped presence identity.
///
/// One per `join_room` call: two tabs of the same user get two peer ids
/// and count separately in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub Uuid);

impl PeerId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The authenticated principal for the current session.
///
/// Created by the auth flow, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: RecordId,
    pub email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            email: email.into(),
        }
    }
}

/// Durable reference to an uploaded blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRef {
    /// Logical path the blob was uploaded under.
    pub path: String,
    /// Stable storage key.
    pub key: Uuid,
}

/// Raw stored shape of one record: scalar fields plus relation links.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub fields: HashMap<String, Value>,
    pub links: HashMap<String, RecordId>,
}

impl Record {
    /// String field accessor; absent or non-string fields read as `None`.
    pub fn str_field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Boolean field accessor; absent or non-bool fields read as `false`.
    pub fn bool_field(&self, name: &str) -> bool {
        self.fields
            .get(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Unsigned integer field accessor.
    pub fn u64_field(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(Value::as_u64)
    }

    /// Merge new field values over the existing ones.
    pub fn merge_fields(&mut self, fields: HashMap<String, Value>) {
        self.fields.extend(fields);
    }
}

/// User-facing display record, linked one-to-one to an [`Identity`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: RecordId,
    pub handle: String,
    pub avatar_ref: Option<StoredRef>,
}

impl Profile {
    /// Decode a profile read model from a raw `profiles` record.
    ///
    /// Lenient: a missing handle reads as empty, a malformed avatar
    /// reference reads as none. The store owns the schema, not this core.
    pub fn from_record(id: RecordId, record: &Record) -> Self {
        let avatar_ref = record
            .fields
            .get("avatarRef")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok());
        Self {
            id,
            handle: record.str_field("handle").unwrap_or_default().to_string(),
            avatar_ref,
        }
    }
}

/// One atomic record operation inside a mutation batch.
///
/// A [`submit`](crate::StoreClient::submit) call applies the whole
/// `Vec<TxOp>` atomically: all operations commit or none do.
#[derive(Debug, Clone, PartialEq)]
pub enum TxOp {
    /// Create the record if absent, then merge the given fields.
    Put {
        collection: String,
        id: RecordId,
        fields: HashMap<String, Value>,
    },
    /// Set a relation link on a record (creating the record if absent).
    Link {
        collection: String,
        id: RecordId,
        field: String,
        target: RecordId,
    },
    /// Remove a record entirely.
    Delete { collection: String, id: RecordId },
}

impl TxOp {
    /// Convenience constructor for a field-merge operation.
    pub fn put<'a>(
        collection: &str,
        id: RecordId,
        fields: impl IntoIterator<Item = (&'a str, Value)>,
    ) -> Self {
        Self::Put {
            collection: collection.to_string(),
            id,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Convenience constructor for a relation link.
    pub fn link(collection: &str, id: RecordId, field: &str, target: RecordId) -> Self {
        Self::Link {
            collection: collection.to_string(),
            id,
            field: field.to_string(),
            target,
        }
    }

    /// Convenience constructor for a delete.
    pub fn delete(collection: &str, id: RecordId) -> Self {
        Self::Delete {
            collection: collection.to_string(),
            id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_field_accessors() {
        let mut record = Record::default();
        record.fields.insert("text".into(), json!("hello"));
        record.fields.insert("done".into(), json!(true));
        record.fields.insert("createdAt".into(), json!(1234u64));

        assert_eq!(record.str_field("text"), Some("hello"));
        assert!(record.bool_field("done"));
        assert_eq!(record.u64_field("createdAt"), Some(1234));

        assert_eq!(record.str_field("missing"), None);
        assert!(!record.bool_field("missing"));
    }

    #[test]
    fn test_record_merge_fields() {
        let mut record = Record::default();
        record.fields.insert("text".into(), json!("old"));
        record.fields.insert("done".into(), json!(false));

        let mut update = HashMap::new();
        update.insert("text".to_string(), json!("new"));
        record.merge_fields(update);

        assert_eq!(record.str_field("text"), Some("new"));
        assert!(!record.bool_field("done")); // untouched
    }

    #[test]
    fn test_profile_from_record() {
        let mut record = Record::default();
        record.fields.insert("handle".into(), json!("BoldOtter1234"));
        let id = RecordId::new();

        let profile = Profile::from_record(id, &record);
        assert_eq!(profile.id, id);
        assert_eq!(profile.handle, "BoldOtter1234");
        assert!(profile.avatar_ref.is_none());
    }

    #[test]
    fn test_profile_from_record_with_avatar() {
        let stored = StoredRef {
            path: "avatars/u1.png".into(),
            key: Uuid::new_v4(),
        };
        let mut record = Record::default();
        record.fields.insert("handle".into(), json!("CalmRaven9999"));
        record
            .fields
            .insert("avatarRef".into(), serde_json::to_value(&stored).unwrap());

        let profile = Profile::from_record(RecordId::new(), &record);
        assert_eq!(profile.avatar_ref, Some(stored));
    }

    #[test]
    fn test_profile_lenient_on_missing_handle() {
        let profile = Profile::from_record(RecordId::new(), &Record::default());
        assert_eq!(profile.handle, "");
    }

    #[test]
    fn test_txop_constructors() {
        let id = RecordId::new();
        let owner = RecordId::new();

        let put = TxOp::put("todos", id, [("text", json!("hi"))]);
        match put {
            TxOp::Put {
                collection, fields, ..
            } => {
                assert_eq!(collection, "todos");
                assert_eq!(fields.get("text"), Some(&json!("hi")));
            }
            _ => panic!("expected Put"),
        }

        let link = TxOp::link("profiles", id, "owner", owner);
        match link {
            TxOp::Link { field, target, .. } => {
                assert_eq!(field, "owner");
                assert_eq!(target, owner);
            }
            _ => panic!("expected Link"),
        }
    }

    #[test]
    fn test_peer_ids_distinct_per_connection() {
        assert_ne!(PeerId::new(), PeerId::new());
    }
}
