//! Snapshot diffing.
//!
//! Pure identifier-based set difference between the previous and current
//! room lists. No suspension happens here; the engine calls this between the
//! snapshot read and the snapshot write for one creator.

use crate::room::{RoomDelta, RoomList};

/// Computes the created/removed delta between two snapshots.
///
/// A room is *removed* iff its id appears in `previous` but not `current`;
/// *created* iff its id appears in `current` but not `previous`. Output
/// order follows input order, so the delta is deterministic for a given
/// pair of snapshots.
#[must_use]
pub fn diff_rooms(previous: &RoomList, current: &RoomList) -> RoomDelta {
    let removed = previous
        .data
        .iter()
        .filter(|prev| !current.contains_id(&prev.id))
        .cloned()
        .collect();

    let created = current
        .data
        .iter()
        .filter(|curr| !previous.contains_id(&curr.id))
        .cloned()
        .collect();

    RoomDelta { created, removed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::Room;

    fn list(ids: &[&str]) -> RoomList {
        RoomList::from_rooms(ids.iter().map(|id| Room::new(*id)).collect())
    }

    fn ids(rooms: &[Room]) -> Vec<&str> {
        rooms.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn both_empty_yields_empty_delta() {
        let delta = diff_rooms(&list(&[]), &list(&[]));
        assert!(delta.is_empty());
    }

    #[test]
    fn new_room_is_created() {
        let delta = diff_rooms(&list(&["a"]), &list(&["a", "b"]));
        assert_eq!(ids(&delta.created), vec!["b"]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn all_rooms_gone_are_removed() {
        let delta = diff_rooms(&list(&["a", "b"]), &list(&[]));
        assert!(delta.created.is_empty());
        assert_eq!(ids(&delta.removed), vec!["a", "b"]);
    }

    #[test]
    fn unchanged_rooms_are_in_neither_set() {
        let delta = diff_rooms(&list(&["a", "b"]), &list(&["b", "c"]));
        assert_eq!(ids(&delta.created), vec!["c"]);
        assert_eq!(ids(&delta.removed), vec!["a"]);
        // "b" is in both snapshots, so it is neither created nor removed.
        assert!(!delta.created.iter().any(|r| r.id == "b"));
        assert!(!delta.removed.iter().any(|r| r.id == "b"));
    }

    #[test]
    fn created_and_removed_are_disjoint() {
        let previous = list(&["a", "b", "c"]);
        let current = list(&["c", "d", "e"]);
        let delta = diff_rooms(&previous, &current);

        for room in &delta.created {
            assert!(!previous.contains_id(&room.id));
            assert!(!delta.removed.iter().any(|r| r.id == room.id));
        }
        for room in &delta.removed {
            assert!(!current.contains_id(&room.id));
        }
    }

    #[test]
    fn empty_previous_makes_everything_created() {
        let delta = diff_rooms(&RoomList::new(), &list(&["a", "b"]));
        assert_eq!(ids(&delta.created), vec!["a", "b"]);
        assert!(delta.removed.is_empty());
    }

    #[test]
    fn diff_is_deterministic() {
        let previous = list(&["a", "b"]);
        let current = list(&["b", "c", "d"]);
        let first = diff_rooms(&previous, &current);
        let second = diff_rooms(&previous, &current);
        assert_eq!(first, second);
    }
}
