//! Room and creator data model.
//!
//! A [`Room`] is identified solely by its `id`; all other platform fields are
//! carried opaquely so snapshots round-trip whatever the API returned.
//! Diffing never inspects anything but `id`.

use serde::{Deserialize, Serialize};

/// A live audio room on the source platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    /// Opaque platform room identifier. This is the room's identity for
    /// diffing; no other field participates in equality.
    pub id: String,

    /// Remaining platform fields, preserved verbatim through snapshots.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Room {
    /// Creates a room with the given id and no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: serde_json::Map::new(),
        }
    }
}

impl PartialEq for Room {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Room {}

/// The last-known set of rooms for one creator.
///
/// This is the persisted snapshot shape: `{ "data": [ {id, ...}, ... ] }`.
/// A missing snapshot and an empty `data` list are equivalent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomList {
    /// The rooms, in the order the platform returned them.
    #[serde(default)]
    pub data: Vec<Room>,
}

impl RoomList {
    /// Creates an empty room list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room list from the given rooms.
    #[must_use]
    pub fn from_rooms(data: Vec<Room>) -> Self {
        Self { data }
    }

    /// Returns whether the list holds no rooms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns whether a room with the given id is present.
    #[must_use]
    pub fn contains_id(&self, id: &str) -> bool {
        self.data.iter().any(|room| room.id == id)
    }
}

/// A reference to a creator by either identifier form.
///
/// At least one identifier is always present; the engine resolves the other
/// via the room source before processing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreatorRef {
    /// Reference by platform username.
    Username(String),
    /// Reference by platform-internal user id.
    UserId(String),
}

impl std::fmt::Display for CreatorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Username(username) => write!(f, "@{username}"),
            Self::UserId(id) => write!(f, "id:{id}"),
        }
    }
}

/// A creator with both identifier forms resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCreator {
    /// Platform username.
    pub username: String,
    /// Platform-internal user id.
    pub user_id: String,
}

impl ResolvedCreator {
    /// Returns the canonical snapshot key for this creator.
    ///
    /// Both identifier forms of the same creator must reach the same
    /// snapshot entry; the canonical key is the lower-cased username.
    #[must_use]
    pub fn snapshot_key(&self) -> String {
        self.username.to_lowercase()
    }
}

/// Created/removed room sets computed between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoomDelta {
    /// Rooms present in the current snapshot but not the previous one.
    pub created: Vec<Room>,
    /// Rooms present in the previous snapshot but not the current one.
    pub removed: Vec<Room>,
}

impl RoomDelta {
    /// Returns whether the delta contains no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_equality_is_identity_based() {
        let mut extra = serde_json::Map::new();
        extra.insert("title".into(), serde_json::Value::String("chat".into()));
        let a = Room {
            id: "r1".into(),
            extra,
        };
        let b = Room::new("r1");
        assert_eq!(a, b);
    }

    #[test]
    fn room_list_preserves_opaque_fields() {
        let json = r#"{"data":[{"id":"r1","state":"live","title":"morning show"}]}"#;
        let list: RoomList = serde_json::from_str(json).expect("parse");
        assert_eq!(list.data[0].id, "r1");
        assert_eq!(
            list.data[0].extra.get("title"),
            Some(&serde_json::Value::String("morning show".into()))
        );

        let out = serde_json::to_value(&list).expect("serialize");
        assert_eq!(out["data"][0]["state"], "live");
    }

    #[test]
    fn missing_data_field_is_empty() {
        let list: RoomList = serde_json::from_str("{}").expect("parse");
        assert!(list.is_empty());
    }

    #[test]
    fn snapshot_key_is_lowercased_username() {
        let creator = ResolvedCreator {
            username: "Alice".into(),
            user_id: "42".into(),
        };
        assert_eq!(creator.snapshot_key(), "alice");
    }

    #[test]
    fn creator_ref_display() {
        assert_eq!(CreatorRef::Username("alice".into()).to_string(), "@alice");
        assert_eq!(CreatorRef::UserId("42".into()).to_string(), "id:42");
    }
}
