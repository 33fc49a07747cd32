//! The authoritative state machine: one handler per inbound event.
//!
//! Handlers mutate the registry and queue replies on connection channels;
//! they never block and never perform io themselves. Replies go to the
//! connection the request arrived on, while state changes key on the
//! client id the envelope names; with well-behaved clients the two are
//! the same. An envelope naming a client the registry does not know is
//! dropped before it can touch state, so membership only ever refers to
//! connected clients.

use crate::protocol::{Action, ClientId, ErrorKind, Reply, Request, RoomInfo};

use super::conn::ClientConn;
use super::registry::SessionRegistry;

/// Admit an accepted connection and hand it its identity.
pub(crate) fn handle_connected(registry: &mut SessionRegistry, conn: ClientConn) {
    let client_id = conn.client_id();
    let reply = Reply::success(Action::RegisterClient).with_client_id(client_id);
    if !conn.send(&reply) {
        log::warn!("[Dispatch] client {client_id} went away before registration");
    }
    registry.add_client(conn);
    log::info!("[Dispatch] registered client {client_id}");
}

/// Clean up after a transport-level close.
///
/// Safe to call more than once for the same client; only the first call
/// finds anything to remove.
pub(crate) fn handle_disconnected(registry: &mut SessionRegistry, client_id: ClientId) {
    match registry.remove_client(client_id) {
        Some(conn) => {
            conn.disconnect();
            log::info!("[Dispatch] cleaned up client {client_id}");
        }
        None => log::debug!("[Dispatch] client {client_id} already cleaned up"),
    }
}

/// Apply one request to the registry and queue whatever it produces.
///
/// `conn_id` is the identity of the connection the record arrived on and is
/// where the direct reply (if the action has one) is sent. A request whose
/// envelope names a client the registry no longer knows (already
/// disconnected, or never registered) is dropped with no reply.
pub(crate) fn handle_request(registry: &mut SessionRegistry, conn_id: ClientId, request: Request) {
    let client_id = request.client_id();
    if registry.client(client_id).is_none() {
        log::debug!("[Dispatch] dropping {} naming unknown client {client_id}", request.action());
        return;
    }
    log::debug!("[Dispatch] client {conn_id}: {}", request.action());

    match request {
        Request::Disconnect { client_id } => {
            log::info!("[Dispatch] client {client_id} requested disconnect");
            if let Some(conn) = registry.remove_client(client_id) {
                conn.disconnect();
            }
        }
        Request::RegisterRoom { capacity, .. } => {
            let room_id = registry.create_room(capacity);
            log::info!("[Dispatch] created room {room_id} (capacity {capacity})");
            reply_to(registry, conn_id, Reply::success(Action::RegisterRoom).with_room_id(room_id));
        }
        Request::JoinRoom { client_id, room_id } => {
            let result = registry.join_room(client_id, room_id);
            reply_to(registry, conn_id, snapshot_reply(Action::JoinRoom, result));
        }
        Request::LeaveRoom { client_id } => {
            registry.leave_room(client_id);
            reply_to(registry, conn_id, Reply::success(Action::LeaveRoom));
        }
        Request::AutojoinRoom { client_id, capacity } => {
            let result = registry.autojoin_room(client_id, capacity);
            reply_to(registry, conn_id, snapshot_reply(Action::AutojoinRoom, result));
        }
        Request::GetRoomInfo { room_id, .. } => {
            let result = registry.room_info(room_id);
            reply_to(registry, conn_id, snapshot_reply(Action::GetRoomInfo, result));
        }
        Request::GetRoomsInfo { .. } => {
            let reply = Reply::success(Action::GetRoomsInfo).with_rooms_info(registry.rooms_info());
            reply_to(registry, conn_id, reply);
        }
        Request::SetRoomAttributes { room_id, attributes, .. } => {
            let result = registry.set_room_attributes(room_id, attributes);
            reply_to(registry, conn_id, ack_reply(Action::SetRoomAttributes, result));
        }
        Request::PutRoomAttribute { room_id, key, value, .. } => {
            let result = registry.put_room_attribute(room_id, key, value);
            reply_to(registry, conn_id, ack_reply(Action::PutRoomAttribute, result));
        }
        Request::SetServerAttributes { attributes, .. } => {
            registry.set_server_attributes(attributes);
            reply_to(registry, conn_id, Reply::success(Action::SetServerAttributes));
        }
        Request::PutServerAttribute { key, value, .. } => {
            registry.put_server_attribute(key, value);
            reply_to(registry, conn_id, Reply::success(Action::PutServerAttribute));
        }
        Request::GetServerAttributes { .. } => {
            let reply = Reply::success(Action::GetServerAttributes)
                .with_attributes(registry.server_attributes().clone());
            reply_to(registry, conn_id, reply);
        }
        Request::SendMessage { client_id, recipients, message } => {
            relay(registry, client_id, &recipients, &message);
        }
        Request::BroadcastMessage { client_id, message } => {
            let Some(room_id) = registry.room_of(client_id) else {
                log::debug!("[Dispatch] client {client_id} broadcast while not in a room");
                return;
            };
            let members: Vec<ClientId> = registry
                .room(room_id)
                .map(|room| room.members().collect())
                .unwrap_or_default();
            relay(registry, client_id, &members, &message);
        }
    }
}

/// Relay `message` to each recipient as a GET_MESSAGE envelope.
///
/// Unknown or unreachable recipients are skipped silently; the sender gets
/// no confirmation either way.
fn relay(registry: &SessionRegistry, sender_id: ClientId, recipients: &[ClientId], message: &str) {
    for &recipient in recipients {
        match registry.client(recipient) {
            Some(conn) => {
                let reply =
                    Reply::success(Action::GetMessage).with_message(sender_id, message.to_string());
                if !conn.send(&reply) {
                    log::debug!("[Dispatch] recipient {recipient} unreachable, dropping relay");
                }
            }
            None => log::debug!("[Dispatch] skipping unknown recipient {recipient}"),
        }
    }
}

/// Queue a reply on the requester's connection, if it is still around.
fn reply_to(registry: &SessionRegistry, client_id: ClientId, reply: Reply) {
    match registry.client(client_id) {
        Some(conn) => {
            if !conn.send(&reply) {
                log::debug!("[Dispatch] client {client_id} unreachable, dropping {} reply", reply.action);
            }
        }
        None => {
            log::debug!("[Dispatch] no connection for client {client_id}, dropping {} reply", reply.action);
        }
    }
}

/// Success-with-snapshot or error envelope for snapshot-bearing actions.
fn snapshot_reply(action: Action, result: Result<RoomInfo, ErrorKind>) -> Reply {
    match result {
        Ok(info) => Reply::success(action).with_room_info(info),
        Err(kind) => Reply::error(action, kind),
    }
}

/// Bare success or error envelope for acknowledge-only actions.
fn ack_reply(action: Action, result: Result<(), ErrorKind>) -> Reply {
    match result {
        Ok(()) => Reply::success(action),
        Err(kind) => Reply::error(action, kind),
    }
}
