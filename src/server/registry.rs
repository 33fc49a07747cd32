//! Authoritative session state: clients, rooms, membership, attributes.
//!
//! The registry is owned by the dispatch loop and mutated only between
//! ticks, one event at a time. Nothing in here is shared or locked; the
//! sequential loop is the concurrency control.

// Rust guideline compliant 2026-02

use std::collections::{BTreeMap, HashMap};

use crate::protocol::{Attributes, ClientId, ErrorKind, RoomId, RoomInfo, Value};

use super::conn::ClientConn;
use super::room::Room;

/// All server-side session state plus the connection handles to reach it.
///
/// Room ids are allocated from a counter that only moves forward, so an id
/// is never reused even though rooms persist after emptying out. A client
/// is a member of at most one room at a time; `client_rooms` is the single
/// source of truth for that mapping.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Connected clients by identity.
    clients: HashMap<ClientId, ClientConn>,
    /// Which room each client currently occupies, if any.
    client_rooms: HashMap<ClientId, RoomId>,
    /// All rooms ever created, in id order. Rooms are never deleted.
    rooms: BTreeMap<RoomId, Room>,
    /// Server-wide attribute dictionary.
    server_attributes: Attributes,
    /// Next room id to hand out.
    next_room_id: RoomId,
}

impl SessionRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // === Clients ===

    /// Record a newly accepted connection.
    pub fn add_client(&mut self, conn: ClientConn) {
        self.clients.insert(conn.client_id(), conn);
    }

    /// Remove a client and its room membership, returning the connection
    /// handle for teardown.
    ///
    /// Both maps are cleared unconditionally: an id whose connection is
    /// already gone still has its membership removed. Explicit disconnect
    /// requests and transport closes both funnel through here, in either
    /// order, and a repeat call finds nothing left to remove.
    pub fn remove_client(&mut self, client_id: ClientId) -> Option<ClientConn> {
        let conn = self.clients.remove(&client_id);
        self.leave_room(client_id);
        conn
    }

    /// Connection handle for a client, if connected.
    #[must_use]
    pub fn client(&self, client_id: ClientId) -> Option<&ClientConn> {
        self.clients.get(&client_id)
    }

    /// Number of connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Remove and return every connection handle (server shutdown).
    pub fn drain_clients(&mut self) -> Vec<ClientConn> {
        self.client_rooms.clear();
        self.clients.drain().map(|(_, conn)| conn).collect()
    }

    // === Rooms ===

    /// Create an empty room of the given capacity and return its id.
    pub fn create_room(&mut self, capacity: usize) -> RoomId {
        let room_id = self.next_room_id;
        self.next_room_id += 1;
        self.rooms.insert(room_id, Room::new(room_id, capacity));
        room_id
    }

    /// Room by id.
    #[must_use]
    pub fn room(&self, room_id: RoomId) -> Option<&Room> {
        self.rooms.get(&room_id)
    }

    /// Number of rooms ever created.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Which room a client occupies, if any.
    #[must_use]
    pub fn room_of(&self, client_id: ClientId) -> Option<RoomId> {
        self.client_rooms.get(&client_id).copied()
    }

    /// Snapshot of one room.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RoomNotFound`] for an unknown id.
    pub fn room_info(&self, room_id: RoomId) -> Result<RoomInfo, ErrorKind> {
        self.rooms
            .get(&room_id)
            .map(Room::info)
            .ok_or(ErrorKind::RoomNotFound)
    }

    /// Snapshots of every room, in id order.
    #[must_use]
    pub fn rooms_info(&self) -> Vec<RoomInfo> {
        self.rooms.values().map(Room::info).collect()
    }

    // === Membership ===

    /// Put a client into a specific room.
    ///
    /// # Errors
    ///
    /// Checked in this order: [`ErrorKind::AlreadyInRoom`] if the client
    /// occupies any room (including the target), [`ErrorKind::RoomNotFound`]
    /// for an unknown id, [`ErrorKind::RoomFull`] when at capacity. No state
    /// changes on error.
    pub fn join_room(&mut self, client_id: ClientId, room_id: RoomId) -> Result<RoomInfo, ErrorKind> {
        if self.client_rooms.contains_key(&client_id) {
            return Err(ErrorKind::AlreadyInRoom);
        }
        let room = self.rooms.get_mut(&room_id).ok_or(ErrorKind::RoomNotFound)?;
        room.add_member(client_id)?;
        self.client_rooms.insert(client_id, room_id);
        Ok(room.info())
    }

    /// Take a client out of its current room.
    ///
    /// Returns the room left, or `None` if the client was not in one.
    /// Idempotent; never fails.
    pub fn leave_room(&mut self, client_id: ClientId) -> Option<RoomId> {
        let room_id = self.client_rooms.remove(&client_id)?;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.remove_member(client_id);
        }
        Some(room_id)
    }

    /// Put a client into the first room with free capacity, creating a room
    /// of `capacity` when every existing one is full.
    ///
    /// "First" means id order, which is creation order here. A just-created
    /// room that the client still cannot enter (capacity 0) is left in
    /// place, since rooms are never deleted.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::AlreadyInRoom`] if the client occupies a room;
    /// [`ErrorKind::RoomFull`] when the fallback room is created with zero
    /// capacity.
    pub fn autojoin_room(&mut self, client_id: ClientId, capacity: usize) -> Result<RoomInfo, ErrorKind> {
        if self.client_rooms.contains_key(&client_id) {
            return Err(ErrorKind::AlreadyInRoom);
        }
        let open = self.rooms.values().find(|room| !room.is_full()).map(Room::id);
        let room_id = match open {
            Some(room_id) => room_id,
            None => self.create_room(capacity),
        };
        let room = self.rooms.get_mut(&room_id).ok_or(ErrorKind::RoomNotFound)?;
        room.add_member(client_id)?;
        self.client_rooms.insert(client_id, room_id);
        Ok(room.info())
    }

    // === Attributes ===

    /// Replace a room's attribute dictionary.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RoomNotFound`] for an unknown id.
    pub fn set_room_attributes(&mut self, room_id: RoomId, attributes: Attributes) -> Result<(), ErrorKind> {
        let room = self.rooms.get_mut(&room_id).ok_or(ErrorKind::RoomNotFound)?;
        room.set_attributes(attributes);
        Ok(())
    }

    /// Upsert a single room attribute.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::RoomNotFound`] for an unknown id.
    pub fn put_room_attribute(&mut self, room_id: RoomId, key: String, value: Value) -> Result<(), ErrorKind> {
        let room = self.rooms.get_mut(&room_id).ok_or(ErrorKind::RoomNotFound)?;
        room.put_attribute(key, value);
        Ok(())
    }

    /// Replace the server-wide attribute dictionary.
    pub fn set_server_attributes(&mut self, attributes: Attributes) {
        self.server_attributes = attributes;
    }

    /// Upsert a single server-wide attribute, last write wins.
    pub fn put_server_attribute(&mut self, key: String, value: Value) {
        self.server_attributes.insert(key, value);
    }

    /// Server-wide attribute dictionary.
    #[must_use]
    pub fn server_attributes(&self) -> &Attributes {
        &self.server_attributes
    }
}
