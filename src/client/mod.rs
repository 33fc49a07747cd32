//! Synchronous session client.
//!
//! [`Client::connect`] opens the TCP stream, waits for the server's
//! `REGISTER_CLIENT` envelope, then hands the stream to a background reader
//! thread that files every further reply into a per-action inbox. Request
//! methods block: each one writes a record and polls the inbox for the
//! oldest reply carrying the same action code.
//!
//! Correlation is by action code only. Two in-flight requests with the same
//! action would race for each other's replies, which is why every request
//! method takes `&mut self`.

// Rust guideline compliant 2026-02

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::constants::{READ_POLL_TIMEOUT, RESPONSE_TIMEOUT};
use crate::protocol::framing::RecordDecoder;
use crate::protocol::{
    self, Action, Attributes, ClientId, ErrorKind, Reply, Request, RoomId, RoomInfo, Value,
};

mod inbox;

use inbox::Inbox;

/// Everything a [`Client`] call can fail with.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The server answered with an error envelope.
    #[error("server rejected request: {0}")]
    Protocol(ErrorKind),

    /// No reply arrived before the response deadline.
    #[error("timed out waiting for a reply")]
    Timeout,

    /// The connection is gone and no queued reply can answer the call.
    #[error("connection closed")]
    Disconnected,

    /// The server never produced a usable `REGISTER_CLIENT` envelope.
    #[error("server did not complete registration")]
    Registration,

    /// A success envelope arrived without a field the call needs.
    #[error("reply missing `{0}`")]
    MissingField(&'static str),

    /// Socket-level failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A relayed message delivered through `GET_MESSAGE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Client that sent or broadcast the message.
    pub sender_id: ClientId,
    /// Opaque message body, passed through verbatim.
    pub body: String,
}

impl Message {
    fn from_reply(reply: Reply) -> Option<Self> {
        Some(Self {
            sender_id: reply.sender_id?,
            body: reply.message?,
        })
    }
}

/// Blocking handle to one registered session.
///
/// The stream operates in blocking mode with a short read timeout. A
/// background reader thread owns the receive side and files replies into
/// the inbox; request methods write on the caller's thread and wait for
/// the matching action to surface.
///
/// Dropping the handle (or calling [`Client::disconnect`]) sends a
/// best-effort `DISCONNECT` record, closes the socket, and joins the
/// reader thread.
#[derive(Debug)]
pub struct Client {
    client_id: ClientId,
    stream: TcpStream,
    inbox: Arc<Inbox>,
    reader: Option<JoinHandle<()>>,
    response_timeout: Duration,
}

impl Client {
    /// Connect to a session server and complete registration.
    ///
    /// Uses the default one-second response deadline for the handshake and
    /// for every subsequent request.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connect fails, the handshake times out,
    /// or the first reply is not a successful `REGISTER_CLIENT` envelope.
    pub fn connect(addr: impl ToSocketAddrs) -> Result<Self, ClientError> {
        Self::connect_with_timeout(addr, RESPONSE_TIMEOUT)
    }

    /// Connect with an explicit response deadline.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connect fails, the handshake times out,
    /// or the first reply is not a successful `REGISTER_CLIENT` envelope.
    pub fn connect_with_timeout(
        addr: impl ToSocketAddrs,
        response_timeout: Duration,
    ) -> Result<Self, ClientError> {
        let mut stream = TcpStream::connect(addr)?;
        stream.set_read_timeout(Some(READ_POLL_TIMEOUT))?;

        let inbox = Arc::new(Inbox::new());
        let mut decoder = RecordDecoder::new();
        let deadline = Instant::now() + response_timeout;
        let registration = await_registration(&mut stream, &mut decoder, &inbox, deadline)?;
        if registration.action != Action::RegisterClient || !registration.is_success() {
            return Err(ClientError::Registration);
        }
        let client_id = registration.client_id.ok_or(ClientError::Registration)?;

        let reader_stream = stream.try_clone()?;
        let reader_inbox = Arc::clone(&inbox);
        let reader = std::thread::Builder::new()
            .name(format!("gameroom-client-{client_id}"))
            .spawn(move || read_loop(reader_stream, decoder, reader_inbox))?;

        log::info!("[Client] registered as client {client_id}");
        Ok(Self {
            client_id,
            stream,
            inbox,
            reader: Some(reader),
            response_timeout,
        })
    }

    /// The identifier the server assigned at registration.
    #[must_use]
    pub fn id(&self) -> ClientId {
        self.client_id
    }

    // === Rooms ===

    /// Create a room with the given capacity. The creator does not join.
    ///
    /// # Errors
    ///
    /// Fails on timeout, disconnect, or a reply without a room id.
    pub fn create_room(&mut self, capacity: usize) -> Result<RoomId, ClientError> {
        let reply = self.call(&Request::RegisterRoom {
            client_id: self.client_id,
            capacity,
        })?;
        reply.room_id.ok_or(ClientError::MissingField("roomId"))
    }

    /// Join an existing room and return its snapshot.
    ///
    /// # Errors
    ///
    /// [`ClientError::Protocol`] carries `ROOM_NOT_FOUND`, `ROOM_FULL`, or
    /// `ALREADY_IN_ROOM` when the server refuses.
    pub fn join_room(&mut self, room_id: RoomId) -> Result<RoomInfo, ClientError> {
        let reply = self.call(&Request::JoinRoom {
            client_id: self.client_id,
            room_id,
        })?;
        reply.room_info().ok_or(ClientError::MissingField("room snapshot"))
    }

    /// Join the first room with free space, creating one when all are full.
    ///
    /// `capacity` is only used when the server has to create the fallback
    /// room.
    ///
    /// # Errors
    ///
    /// Fails with `ALREADY_IN_ROOM` when this client is in a room, or
    /// `ROOM_FULL` when the freshly created room cannot admit anyone
    /// (capacity zero).
    pub fn autojoin_room(&mut self, capacity: usize) -> Result<RoomInfo, ClientError> {
        let reply = self.call(&Request::AutojoinRoom {
            client_id: self.client_id,
            capacity,
        })?;
        reply.room_info().ok_or(ClientError::MissingField("room snapshot"))
    }

    /// Leave the current room. Succeeds even when not in one.
    ///
    /// # Errors
    ///
    /// Fails only on timeout or disconnect.
    pub fn leave_room(&mut self) -> Result<(), ClientError> {
        self.call(&Request::LeaveRoom {
            client_id: self.client_id,
        })
        .map(|_| ())
    }

    /// Fetch the snapshot of one room.
    ///
    /// # Errors
    ///
    /// `ROOM_NOT_FOUND` when no room has that id.
    pub fn room_info(&mut self, room_id: RoomId) -> Result<RoomInfo, ClientError> {
        let reply = self.call(&Request::GetRoomInfo {
            client_id: self.client_id,
            room_id,
        })?;
        reply.room_info().ok_or(ClientError::MissingField("room snapshot"))
    }

    /// Fetch snapshots of every room on the server.
    ///
    /// # Errors
    ///
    /// Fails only on timeout or disconnect.
    pub fn rooms_info(&mut self) -> Result<Vec<RoomInfo>, ClientError> {
        let reply = self.call(&Request::GetRoomsInfo {
            client_id: self.client_id,
        })?;
        reply.rooms_info.ok_or(ClientError::MissingField("roomsInfo"))
    }

    // === Attributes ===

    /// Replace a room's attribute dictionary wholesale.
    ///
    /// # Errors
    ///
    /// `ROOM_NOT_FOUND` when no room has that id.
    pub fn set_room_attributes(
        &mut self,
        room_id: RoomId,
        attributes: Attributes,
    ) -> Result<(), ClientError> {
        self.call(&Request::SetRoomAttributes {
            client_id: self.client_id,
            room_id,
            attributes,
        })
        .map(|_| ())
    }

    /// Insert or overwrite a single room attribute.
    ///
    /// # Errors
    ///
    /// `ROOM_NOT_FOUND` when no room has that id.
    pub fn put_room_attribute(
        &mut self,
        room_id: RoomId,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), ClientError> {
        self.call(&Request::PutRoomAttribute {
            client_id: self.client_id,
            room_id,
            key: key.into(),
            value,
        })
        .map(|_| ())
    }

    /// Replace the server-wide attribute dictionary wholesale.
    ///
    /// # Errors
    ///
    /// Fails only on timeout or disconnect.
    pub fn set_server_attributes(&mut self, attributes: Attributes) -> Result<(), ClientError> {
        self.call(&Request::SetServerAttributes {
            client_id: self.client_id,
            attributes,
        })
        .map(|_| ())
    }

    /// Insert or overwrite a single server-wide attribute.
    ///
    /// # Errors
    ///
    /// Fails only on timeout or disconnect.
    pub fn put_server_attribute(
        &mut self,
        key: impl Into<String>,
        value: Value,
    ) -> Result<(), ClientError> {
        self.call(&Request::PutServerAttribute {
            client_id: self.client_id,
            key: key.into(),
            value,
        })
        .map(|_| ())
    }

    /// Fetch the server-wide attribute dictionary.
    ///
    /// # Errors
    ///
    /// Fails only on timeout or disconnect.
    pub fn server_attributes(&mut self) -> Result<Attributes, ClientError> {
        let reply = self.call(&Request::GetServerAttributes {
            client_id: self.client_id,
        })?;
        reply.attributes.ok_or(ClientError::MissingField("attributes"))
    }

    // === Messaging ===

    /// Send a message to specific clients. Fire and forget: the server
    /// never confirms delivery and unknown recipients are skipped.
    ///
    /// # Errors
    ///
    /// Fails only when the record cannot be written to the socket.
    pub fn send_message(
        &mut self,
        recipients: &[ClientId],
        message: impl Into<String>,
    ) -> Result<(), ClientError> {
        self.send_request(&Request::SendMessage {
            client_id: self.client_id,
            recipients: recipients.to_vec(),
            message: message.into(),
        })
    }

    /// Send a message to every member of the current room, including this
    /// client. A silent no-op on the server when not in a room.
    ///
    /// # Errors
    ///
    /// Fails only when the record cannot be written to the socket.
    pub fn broadcast_message(&mut self, message: impl Into<String>) -> Result<(), ClientError> {
        self.send_request(&Request::BroadcastMessage {
            client_id: self.client_id,
            message: message.into(),
        })
    }

    /// Drain every relayed message received so far, oldest first.
    pub fn poll_messages(&mut self) -> Vec<Message> {
        self.inbox
            .drain_messages()
            .into_iter()
            .filter_map(Message::from_reply)
            .collect()
    }

    /// Take the oldest relayed message, if one has arrived. Never blocks.
    pub fn next_message(&mut self) -> Option<Message> {
        while let Some(reply) = self.inbox.pop_message() {
            if let Some(message) = Message::from_reply(reply) {
                return Some(message);
            }
        }
        None
    }

    // === Lifecycle ===

    /// Notify the server and tear the connection down. Dropping the handle
    /// does the same.
    pub fn disconnect(mut self) {
        self.shutdown_inner();
    }

    fn shutdown_inner(&mut self) {
        let Some(reader) = self.reader.take() else {
            return;
        };
        let goodbye = Request::Disconnect {
            client_id: self.client_id,
        };
        if let Err(e) = self.stream.write_all(&protocol::encode_request(&goodbye)) {
            log::debug!("[Client] disconnect notice failed: {e}");
        }
        self.inbox.mark_disconnected();
        if let Err(e) = self.stream.shutdown(Shutdown::Both) {
            log::debug!("[Client] socket shutdown failed: {e}");
        }
        if reader.join().is_err() {
            log::warn!("[Client] reader thread panicked");
        }
        log::info!("[Client] client {} disconnected", self.client_id);
    }

    fn call(&mut self, request: &Request) -> Result<Reply, ClientError> {
        self.send_request(request)?;
        let reply = self.inbox.wait_for(request.action(), self.response_timeout)?;
        if reply.is_success() {
            Ok(reply)
        } else {
            let kind = reply.error.ok_or(ClientError::MissingField("error"))?;
            Err(ClientError::Protocol(kind))
        }
    }

    fn send_request(&mut self, request: &Request) -> Result<(), ClientError> {
        if self.inbox.is_disconnected() {
            return Err(ClientError::Disconnected);
        }
        self.stream.write_all(&protocol::encode_request(request))?;
        Ok(())
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown_inner();
    }
}

/// Read until the first decodable reply arrives; it is the registration
/// envelope. Later records from the same batch go straight to the inbox so
/// nothing is lost between handshake and reader-thread start.
fn await_registration(
    stream: &mut TcpStream,
    decoder: &mut RecordDecoder,
    inbox: &Inbox,
    deadline: Instant,
) -> Result<Reply, ClientError> {
    let mut buf = [0u8; 4096];
    loop {
        if Instant::now() >= deadline {
            return Err(ClientError::Timeout);
        }
        let n = match stream.read(&mut buf) {
            Ok(0) => return Err(ClientError::Disconnected),
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let records = decoder.feed(&buf[..n]).map_err(|_| ClientError::Registration)?;
        let mut registration = None;
        for record in records {
            if record.is_empty() {
                continue;
            }
            match protocol::decode_reply(&record) {
                Ok(reply) if registration.is_none() => registration = Some(reply),
                Ok(reply) => inbox.push(reply),
                Err(e) => log::debug!("[Client] dropping malformed record: {e}"),
            }
        }
        if let Some(reply) = registration {
            return Ok(reply);
        }
    }
}

/// Reader-thread body: decode records off the socket and file replies into
/// the inbox until the stream closes or the handle is dropped.
fn read_loop(mut stream: TcpStream, mut decoder: RecordDecoder, inbox: Arc<Inbox>) {
    let mut buf = [0u8; 8192];
    loop {
        // The short read timeout stays on so a local disconnect is noticed
        // even while the socket is idle.
        if inbox.is_disconnected() {
            break;
        }
        let n = match stream.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                continue;
            }
            Err(e) => {
                log::debug!("[Client] socket read failed: {e}");
                break;
            }
        };
        let records = match decoder.feed(&buf[..n]) {
            Ok(records) => records,
            Err(e) => {
                log::warn!("[Client] record decode error: {e}");
                break;
            }
        };
        for record in records {
            if record.is_empty() {
                continue;
            }
            match protocol::decode_reply(&record) {
                Ok(reply) => inbox.push(reply),
                Err(e) => log::debug!("[Client] dropping malformed record: {e}"),
            }
        }
    }
    inbox.mark_disconnected();
    log::debug!("[Client] reader thread exiting");
}
