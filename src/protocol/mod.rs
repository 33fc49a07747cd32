//! Wire protocol for the session server.
//!
//! Every message on the wire is one **envelope**: a flat JSON object tagged
//! with an `action` code, serialized as UTF-8 text and framed by
//! [`framing`]. Client→server envelopes decode into the closed [`Request`]
//! enum; server→client envelopes are the flat [`Reply`] struct carrying
//! `status`, an optional [`ErrorKind`], and whichever payload fields the
//! action defines. Absent fields are omitted from the wire entirely.
//!
//! ```text
//! client → server   {"action":"JOIN_ROOM","clientId":0,"roomId":1}
//! server → client   {"action":"JOIN_ROOM","status":"success","roomId":1,
//!                    "capacity":2,"size":1,"attributes":{},"clientIds":[0]}
//! server → client   {"action":"JOIN_ROOM","status":"error","error":"ROOM_FULL"}
//! ```
//!
//! Decoding is best-effort: a record that is not valid JSON, names an
//! unknown action, or is missing a required field yields an error that the
//! caller logs and discards. Malformed records never terminate a connection.

// Rust guideline compliant 2026-02

pub mod framing;

use std::fmt;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, EnumIter, EnumString};

/// Server-assigned client identity. Monotonic, never reused.
pub type ClientId = u64;

/// Server-assigned room identity. Monotonic, never reused.
pub type RoomId = u64;

/// Attribute value as stored by the server: an uninterpreted JSON value.
pub type Value = serde_json::Value;

/// A string-keyed attribute dictionary (server-wide or per-room).
pub type Attributes = serde_json::Map<String, Value>;

/// Closed set of action codes an envelope can be tagged with.
///
/// The wire spelling is the SCREAMING_SNAKE_CASE form. This enum is also the
/// key the client correlator queues replies under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, EnumIter, EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Server → client: identity assignment on accept.
    RegisterClient,
    /// Client → server: leave the server entirely.
    Disconnect,
    /// Create a new room.
    RegisterRoom,
    /// Join a specific room.
    JoinRoom,
    /// Leave the current room.
    LeaveRoom,
    /// Join the first open room, creating one if necessary.
    AutojoinRoom,
    /// Snapshot of one room.
    GetRoomInfo,
    /// Snapshots of every room.
    GetRoomsInfo,
    /// Replace a room's attribute dictionary.
    SetRoomAttributes,
    /// Upsert one room attribute.
    PutRoomAttribute,
    /// Replace the server attribute dictionary.
    SetServerAttributes,
    /// Upsert one server attribute.
    PutServerAttribute,
    /// Fetch the server attribute dictionary.
    GetServerAttributes,
    /// Relay a message to specific clients.
    SendMessage,
    /// Relay a message to the sender's room.
    BroadcastMessage,
    /// Server → client: a relayed message.
    GetMessage,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Outcome tag on every reply envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The request was applied.
    Success,
    /// The request was rejected; `error` names the reason.
    Error,
}

/// Closed set of protocol-level error kinds.
///
/// These are the only errors the server reports to a requester; everything
/// else (malformed records, unknown actions) is dropped silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// The named room does not exist.
    RoomNotFound,
    /// The room is at capacity.
    RoomFull,
    /// The client is already a member of a room.
    AlreadyInRoom,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// A client→server request envelope.
///
/// Internally tagged on `action`; each variant carries the envelope's
/// camelCase payload fields. `client_id` is the sender's self-reported
/// identity; the server keys state changes on it, matching the trust model
/// of the wire protocol (there is no authentication).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Request {
    /// Leave the server; the connection closes with no response.
    #[serde(rename_all = "camelCase")]
    Disconnect {
        /// Sender identity.
        client_id: ClientId,
    },
    /// Create a new empty room with the given capacity.
    #[serde(rename_all = "camelCase")]
    RegisterRoom {
        /// Sender identity.
        client_id: ClientId,
        /// Maximum member count for the new room.
        capacity: usize,
    },
    /// Join a specific room.
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        /// Sender identity.
        client_id: ClientId,
        /// Room to join.
        room_id: RoomId,
    },
    /// Leave the current room, if any.
    #[serde(rename_all = "camelCase")]
    LeaveRoom {
        /// Sender identity.
        client_id: ClientId,
    },
    /// Join the first open room, creating one of `capacity` if none exists.
    #[serde(rename_all = "camelCase")]
    AutojoinRoom {
        /// Sender identity.
        client_id: ClientId,
        /// Capacity for the room created when no open room exists.
        capacity: usize,
    },
    /// Fetch one room snapshot.
    #[serde(rename_all = "camelCase")]
    GetRoomInfo {
        /// Sender identity.
        client_id: ClientId,
        /// Room to describe.
        room_id: RoomId,
    },
    /// Fetch snapshots of every room.
    #[serde(rename_all = "camelCase")]
    GetRoomsInfo {
        /// Sender identity.
        client_id: ClientId,
    },
    /// Replace a room's attribute dictionary.
    #[serde(rename_all = "camelCase")]
    SetRoomAttributes {
        /// Sender identity.
        client_id: ClientId,
        /// Room to mutate.
        room_id: RoomId,
        /// Replacement dictionary.
        attributes: Attributes,
    },
    /// Upsert a single room attribute.
    #[serde(rename_all = "camelCase")]
    PutRoomAttribute {
        /// Sender identity.
        client_id: ClientId,
        /// Room to mutate.
        room_id: RoomId,
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: Value,
    },
    /// Replace the server attribute dictionary.
    #[serde(rename_all = "camelCase")]
    SetServerAttributes {
        /// Sender identity.
        client_id: ClientId,
        /// Replacement dictionary.
        attributes: Attributes,
    },
    /// Upsert a single server attribute.
    #[serde(rename_all = "camelCase")]
    PutServerAttribute {
        /// Sender identity.
        client_id: ClientId,
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: Value,
    },
    /// Fetch the server attribute dictionary.
    #[serde(rename_all = "camelCase")]
    GetServerAttributes {
        /// Sender identity.
        client_id: ClientId,
    },
    /// Relay `message` to each named recipient.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        /// Sender identity, forwarded to recipients.
        client_id: ClientId,
        /// Target client ids; unknown ids are skipped silently.
        recipients: Vec<ClientId>,
        /// Message text.
        message: String,
    },
    /// Relay `message` to every member of the sender's room.
    #[serde(rename_all = "camelCase")]
    BroadcastMessage {
        /// Sender identity, forwarded to recipients.
        client_id: ClientId,
        /// Message text.
        message: String,
    },
}

impl Request {
    /// The action code this request is tagged with.
    pub fn action(&self) -> Action {
        match self {
            Request::Disconnect { .. } => Action::Disconnect,
            Request::RegisterRoom { .. } => Action::RegisterRoom,
            Request::JoinRoom { .. } => Action::JoinRoom,
            Request::LeaveRoom { .. } => Action::LeaveRoom,
            Request::AutojoinRoom { .. } => Action::AutojoinRoom,
            Request::GetRoomInfo { .. } => Action::GetRoomInfo,
            Request::GetRoomsInfo { .. } => Action::GetRoomsInfo,
            Request::SetRoomAttributes { .. } => Action::SetRoomAttributes,
            Request::PutRoomAttribute { .. } => Action::PutRoomAttribute,
            Request::SetServerAttributes { .. } => Action::SetServerAttributes,
            Request::PutServerAttribute { .. } => Action::PutServerAttribute,
            Request::GetServerAttributes { .. } => Action::GetServerAttributes,
            Request::SendMessage { .. } => Action::SendMessage,
            Request::BroadcastMessage { .. } => Action::BroadcastMessage,
        }
    }

    /// The sender identity the envelope names.
    pub fn client_id(&self) -> ClientId {
        match self {
            Request::Disconnect { client_id }
            | Request::RegisterRoom { client_id, .. }
            | Request::JoinRoom { client_id, .. }
            | Request::LeaveRoom { client_id }
            | Request::AutojoinRoom { client_id, .. }
            | Request::GetRoomInfo { client_id, .. }
            | Request::GetRoomsInfo { client_id }
            | Request::SetRoomAttributes { client_id, .. }
            | Request::PutRoomAttribute { client_id, .. }
            | Request::SetServerAttributes { client_id, .. }
            | Request::PutServerAttribute { client_id, .. }
            | Request::GetServerAttributes { client_id }
            | Request::SendMessage { client_id, .. }
            | Request::BroadcastMessage { client_id, .. } => *client_id,
        }
    }
}

/// Point-in-time copy of a room's public state.
///
/// Captured at response-construction time, not a live view. Fields are
/// inlined flat into single-room replies and nested as objects in the
/// GET_ROOMS_INFO array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomInfo {
    /// Room identity.
    pub room_id: RoomId,
    /// Maximum member count.
    pub capacity: usize,
    /// Current member count.
    pub size: usize,
    /// Attribute dictionary at capture time.
    pub attributes: Attributes,
    /// Member ids at capture time.
    pub client_ids: Vec<ClientId>,
}

impl fmt::Display for RoomInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "room {} ({}/{} members, {} attributes)",
            self.room_id,
            self.size,
            self.capacity,
            self.attributes.len()
        )
    }
}

/// A server→client reply envelope.
///
/// One flat struct rather than a tagged enum: the wire format inlines a
/// room snapshot's fields at the top level of the object, and which fields
/// are present depends on the action and outcome. Absent fields are omitted
/// from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reply {
    /// Action code this reply answers (or GET_MESSAGE for relays).
    pub action: Action,
    /// Outcome of the request.
    pub status: Status,
    /// Rejection reason when `status` is [`Status::Error`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    /// Assigned identity (REGISTER_CLIENT).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<ClientId>,
    /// Room identity (REGISTER_ROOM and snapshot-bearing replies).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    /// Snapshot field: maximum member count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    /// Snapshot field: current member count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    /// Snapshot or server attribute dictionary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Attributes>,
    /// Snapshot field: member ids.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ids: Option<Vec<ClientId>>,
    /// All room snapshots (GET_ROOMS_INFO).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rooms_info: Option<Vec<RoomInfo>>,
    /// Originating client of a relayed message (GET_MESSAGE).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<ClientId>,
    /// Relayed message text (GET_MESSAGE).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Reply {
    /// A success reply for `action` with no payload fields.
    pub fn success(action: Action) -> Self {
        Self {
            action,
            status: Status::Success,
            error: None,
            client_id: None,
            room_id: None,
            capacity: None,
            size: None,
            attributes: None,
            client_ids: None,
            rooms_info: None,
            sender_id: None,
            message: None,
        }
    }

    /// An error reply for `action` carrying the rejection reason.
    pub fn error(action: Action, kind: ErrorKind) -> Self {
        let mut reply = Self::success(action);
        reply.status = Status::Error;
        reply.error = Some(kind);
        reply
    }

    /// Attach an assigned client identity.
    pub fn with_client_id(mut self, client_id: ClientId) -> Self {
        self.client_id = Some(client_id);
        self
    }

    /// Attach a room identity without a full snapshot.
    pub fn with_room_id(mut self, room_id: RoomId) -> Self {
        self.room_id = Some(room_id);
        self
    }

    /// Inline a room snapshot's fields at the top level of the envelope.
    pub fn with_room_info(mut self, info: RoomInfo) -> Self {
        self.room_id = Some(info.room_id);
        self.capacity = Some(info.capacity);
        self.size = Some(info.size);
        self.attributes = Some(info.attributes);
        self.client_ids = Some(info.client_ids);
        self
    }

    /// Attach an attribute dictionary (GET_SERVER_ATTRIBUTES).
    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = Some(attributes);
        self
    }

    /// Attach the all-rooms snapshot array (GET_ROOMS_INFO).
    pub fn with_rooms_info(mut self, rooms_info: Vec<RoomInfo>) -> Self {
        self.rooms_info = Some(rooms_info);
        self
    }

    /// Attach relayed-message fields (GET_MESSAGE).
    pub fn with_message(mut self, sender_id: ClientId, message: String) -> Self {
        self.sender_id = Some(sender_id);
        self.message = Some(message);
        self
    }

    /// Reassemble the room snapshot inlined in this envelope.
    ///
    /// Returns `None` unless every snapshot field is present.
    pub fn room_info(&self) -> Option<RoomInfo> {
        Some(RoomInfo {
            room_id: self.room_id?,
            capacity: self.capacity?,
            size: self.size?,
            attributes: self.attributes.clone()?,
            client_ids: self.client_ids.clone()?,
        })
    }

    /// Whether this reply reports success.
    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }
}

/// Serialize a request and frame it as a wire record.
pub fn encode_request(request: &Request) -> Vec<u8> {
    let payload = serde_json::to_vec(request).expect("JSON serialization cannot fail");
    framing::encode_record(&payload)
}

/// Serialize a reply and frame it as a wire record.
pub fn encode_reply(reply: &Reply) -> Vec<u8> {
    let payload = serde_json::to_vec(reply).expect("JSON serialization cannot fail");
    framing::encode_record(&payload)
}

/// Decode one record into a request envelope.
///
/// # Errors
///
/// Returns an error for records that are not valid JSON, name an unknown or
/// server-initiated action, or are missing a required field. Callers drop
/// such records silently (logged at debug level).
pub fn decode_request(record: &[u8]) -> Result<Request, serde_json::Error> {
    serde_json::from_slice(record)
}

/// Decode one record into a reply envelope.
///
/// # Errors
///
/// Returns an error for records that are not valid JSON or lack the
/// `action`/`status` tags. Callers drop such records silently.
pub fn decode_reply(record: &[u8]) -> Result<Reply, serde_json::Error> {
    serde_json::from_slice(record)
}
