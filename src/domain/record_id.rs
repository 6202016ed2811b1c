//! Type-safe record identifier.
//!
//! [`RecordId`] is a newtype wrapper around [`uuid::Uuid`] (v4) providing
//! type safety so that record identifiers cannot be confused with other
//! UUIDs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for a sensor record.
///
/// Wraps a UUID v4. Generated once at record creation time and immutable
/// thereafter. Carried through the batch payload as the correlation key
/// between a sub-call and its reconciled outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
pub struct RecordId(uuid::Uuid);

impl RecordId {
    /// Creates a new random `RecordId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Creates a `RecordId` from an existing [`uuid::Uuid`].
    #[must_use]
    pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner [`uuid::Uuid`].
    #[must_use]
    pub const fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<uuid::Uuid> for RecordId {
    fn from(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecordId> for uuid::Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn new_generates_unique_ids() {
        let a = RecordId::new();
        let b = RecordId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn display_is_uuid_format() {
        let id = RecordId::new();
        let s = format!("{id}");
        assert_eq!(s.len(), 36); // UUID string length
        assert!(s.contains('-'));
    }

    #[test]
    fn serde_round_trip() {
        let id = RecordId::new();
        let json = serde_json::to_string(&id).ok();
        let Some(json) = json else {
            panic!("serialization failed");
        };
        let deserialized: RecordId = serde_json::from_str(&json).ok().unwrap_or_else(|| {
            panic!("deserialization failed");
        });
        assert_eq!(id, deserialized);
    }

    #[test]
    fn from_uuid_round_trip() {
        let uuid = uuid::Uuid::new_v4();
        let id = RecordId::from_uuid(uuid);
        assert_eq!(*id.as_uuid(), uuid);
    }

    #[test]
    fn hash_works_in_hashmap() {
        use std::collections::HashMap;
        let id = RecordId::new();
        let mut map = HashMap::new();
        map.insert(id, "test");
        assert_eq!(map.get(&id), Some(&"test"));
    }
}
