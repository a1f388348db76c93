//! Room source capability.
//!
//! The engine treats the platform API as a capability: something that can
//! resolve a creator reference to both identifier forms and return the
//! creator's current live rooms. [`MemoryRoomSource`] backs tests; the
//! HTTP implementation lives in [`crate::platform`].

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::room::{CreatorRef, ResolvedCreator, RoomList};

/// Capability for fetching live-room state from the source platform.
#[async_trait]
pub trait RoomSource: Send + Sync {
    /// Resolves a creator reference to both identifier forms.
    async fn resolve(&self, creator: &CreatorRef) -> Result<ResolvedCreator>;

    /// Fetches the creator's current live rooms.
    async fn rooms_by_creator(&self, creator: &ResolvedCreator) -> Result<RoomList>;
}

/// Programmable in-memory room source for tests.
///
/// Creators are registered up front; room lists can be swapped between
/// cycles and individual creators can be marked as failing.
#[derive(Debug, Default)]
pub struct MemoryRoomSource {
    inner: RwLock<MemorySourceState>,
}

#[derive(Debug, Default)]
struct MemorySourceState {
    creators: Vec<ResolvedCreator>,
    rooms: HashMap<String, RoomList>,
    failing: HashMap<String, String>,
}

impl MemoryRoomSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a creator with both identifier forms.
    pub fn add_creator(&self, username: &str, user_id: &str) {
        if let Ok(mut state) = self.inner.write() {
            state.creators.push(ResolvedCreator {
                username: username.to_string(),
                user_id: user_id.to_string(),
            });
        }
    }

    /// Sets the current room list for a creator (by username).
    pub fn set_rooms(&self, username: &str, rooms: RoomList) {
        if let Ok(mut state) = self.inner.write() {
            state.rooms.insert(username.to_lowercase(), rooms);
        }
    }

    /// Makes room fetches for a creator fail with the given message.
    pub fn fail_fetch(&self, username: &str, message: &str) {
        if let Ok(mut state) = self.inner.write() {
            state
                .failing
                .insert(username.to_lowercase(), message.to_string());
        }
    }

    /// Clears a previously injected fetch failure.
    pub fn clear_failure(&self, username: &str) {
        if let Ok(mut state) = self.inner.write() {
            state.failing.remove(&username.to_lowercase());
        }
    }
}

#[async_trait]
impl RoomSource for MemoryRoomSource {
    async fn resolve(&self, creator: &CreatorRef) -> Result<ResolvedCreator> {
        let state = self.inner.read().map_err(|_| Error::Configuration(
            "memory source lock poisoned".into(),
        ))?;

        let found = state.creators.iter().find(|c| match creator {
            CreatorRef::Username(username) => c.username.eq_ignore_ascii_case(username),
            CreatorRef::UserId(id) => &c.user_id == id,
        });

        found.cloned().ok_or_else(|| {
            Error::resolution(creator.to_string(), "unknown creator")
        })
    }

    async fn rooms_by_creator(&self, creator: &ResolvedCreator) -> Result<RoomList> {
        let state = self.inner.read().map_err(|_| Error::Configuration(
            "memory source lock poisoned".into(),
        ))?;

        let key = creator.username.to_lowercase();
        if let Some(message) = state.failing.get(&key) {
            return Err(Error::source_fetch(&creator.username, message.clone()));
        }

        Ok(state.rooms.get(&key).cloned().unwrap_or_default())
    }
}

/// Shared handle alias used by the engine.
pub type SharedRoomSource = Arc<dyn RoomSource>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Room;

    #[tokio::test]
    async fn resolves_by_either_identifier() {
        let source = MemoryRoomSource::new();
        source.add_creator("Alice", "42");

        let by_name = source
            .resolve(&CreatorRef::Username("alice".into()))
            .await
            .expect("resolve");
        let by_id = source
            .resolve(&CreatorRef::UserId("42".into()))
            .await
            .expect("resolve");

        assert_eq!(by_name, by_id);
        assert_eq!(by_name.snapshot_key(), "alice");
    }

    #[tokio::test]
    async fn unknown_creator_fails_resolution() {
        let source = MemoryRoomSource::new();
        let err = source
            .resolve(&CreatorRef::Username("ghost".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ResolutionFailed { .. }));
    }

    #[tokio::test]
    async fn fetch_returns_programmed_rooms() {
        let source = MemoryRoomSource::new();
        source.add_creator("alice", "42");
        source.set_rooms("alice", RoomList::from_rooms(vec![Room::new("r1")]));

        let creator = source
            .resolve(&CreatorRef::Username("alice".into()))
            .await
            .expect("resolve");
        let rooms = source.rooms_by_creator(&creator).await.expect("fetch");
        assert!(rooms.contains_id("r1"));
    }

    #[tokio::test]
    async fn injected_failure_surfaces_as_fetch_error() {
        let source = MemoryRoomSource::new();
        source.add_creator("alice", "42");
        source.fail_fetch("alice", "rate limited");

        let creator = ResolvedCreator {
            username: "alice".into(),
            user_id: "42".into(),
        };
        let err = source.rooms_by_creator(&creator).await.unwrap_err();
        assert!(matches!(err, Error::SourceFetchFailed { .. }));

        source.clear_failure("alice");
        assert!(source.rooms_by_creator(&creator).await.is_ok());
    }
}
