//! Room state: a capacity-bounded member set plus an attribute dictionary.

use std::collections::BTreeSet;

use crate::protocol::{Attributes, ClientId, ErrorKind, RoomId, RoomInfo, Value};

/// A capacity-bounded group of clients with shared attributes.
///
/// Rooms hold membership and attribute state only; who is allowed to join
/// is decided by the registry. All operations are synchronous and never
/// touch the network. `member_count() <= capacity()` holds at all times.
#[derive(Debug, Clone)]
pub struct Room {
    id: RoomId,
    capacity: usize,
    members: BTreeSet<ClientId>,
    attributes: Attributes,
}

impl Room {
    /// Create an empty room.
    pub fn new(id: RoomId, capacity: usize) -> Self {
        Self {
            id,
            capacity,
            members: BTreeSet::new(),
            attributes: Attributes::new(),
        }
    }

    /// Room identity.
    #[must_use]
    pub fn id(&self) -> RoomId {
        self.id
    }

    /// Maximum member count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current member count.
    #[must_use]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Whether the room is at capacity.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.members.len() == self.capacity
    }

    /// Whether `client_id` is a member.
    #[must_use]
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    /// Member ids in ascending order.
    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }

    /// Add a member.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RoomFull`] if the room is at capacity; membership
    /// is unchanged in that case.
    pub fn add_member(&mut self, client_id: ClientId) -> Result<(), ErrorKind> {
        if self.is_full() {
            return Err(ErrorKind::RoomFull);
        }
        self.members.insert(client_id);
        Ok(())
    }

    /// Remove a member. No-op if `client_id` is not a member.
    pub fn remove_member(&mut self, client_id: ClientId) {
        self.members.remove(&client_id);
    }

    /// Replace the attribute dictionary wholesale.
    pub fn set_attributes(&mut self, attributes: Attributes) {
        self.attributes = attributes;
    }

    /// Upsert a single attribute, last write wins.
    pub fn put_attribute(&mut self, key: String, value: Value) {
        self.attributes.insert(key, value);
    }

    /// Attribute dictionary.
    #[must_use]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Detached snapshot of the room's public state.
    #[must_use]
    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_id: self.id,
            capacity: self.capacity,
            size: self.members.len(),
            attributes: self.attributes.clone(),
            client_ids: self.members().collect(),
        }
    }
}
