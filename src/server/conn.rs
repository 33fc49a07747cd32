//! Per-connection io tasks on the server side.
//!
//! Each accepted TCP connection gets a [`ClientConn`] that owns a read task
//! and a write task. The read task decodes inbound records into
//! [`ServerEvent`]s; the write task drains a channel of pre-encoded records
//! onto the socket. Session state is never touched from these tasks.

// Rust guideline compliant 2026-02

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::protocol::{self, ClientId, Reply};

use super::events::ServerEvent;

/// Server-side handle for a single client connection.
///
/// Owns the io tasks bridging the socket and the dispatch loop. Dropping the
/// handle does not close the connection; call [`ClientConn::disconnect`].
pub struct ClientConn {
    /// Identity assigned at accept time.
    client_id: ClientId,
    /// Sender for encoded outbound records.
    frame_tx: UnboundedSender<Vec<u8>>,
    /// Handle to the read task (for cleanup).
    read_handle: Option<JoinHandle<()>>,
    /// Handle to the write task (for cleanup).
    write_handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ClientConn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConn")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl ClientConn {
    /// Take ownership of an accepted socket and spawn its io tasks.
    ///
    /// Must be called from within the server runtime.
    pub(crate) fn spawn(
        client_id: ClientId,
        stream: TcpStream,
        event_tx: UnboundedSender<ServerEvent>,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let read_handle = tokio::spawn(Self::read_loop(client_id, read_half, event_tx));
        let write_handle = tokio::spawn(Self::write_loop(client_id, write_half, frame_rx));

        Self {
            client_id,
            frame_tx,
            read_handle: Some(read_handle),
            write_handle: Some(write_handle),
        }
    }

    /// Connection handle without io tasks, plus the receiving end of its
    /// outbound channel. Lets dispatch tests observe exactly what a client
    /// would be sent.
    #[cfg(test)]
    pub(crate) fn test_pair(client_id: ClientId) -> (Self, UnboundedReceiver<Vec<u8>>) {
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<Vec<u8>>();
        let conn = Self {
            client_id,
            frame_tx,
            read_handle: None,
            write_handle: None,
        };
        (conn, frame_rx)
    }

    /// Identity assigned to this connection.
    #[must_use]
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    /// Encode a reply and queue it for the write task.
    ///
    /// Returns `false` if the write task is gone (client disconnected).
    pub fn send(&self, reply: &Reply) -> bool {
        self.frame_tx.send(protocol::encode_reply(reply)).is_ok()
    }

    /// Tear the connection down, aborting both io tasks.
    pub fn disconnect(self) {
        if let Some(handle) = self.read_handle {
            handle.abort();
        }
        if let Some(handle) = self.write_handle {
            handle.abort();
        }
    }

    /// Read task: decode inbound records and forward them as events.
    ///
    /// Malformed records are logged and dropped without disturbing the
    /// connection. EOF, transport errors, and an over-limit record buffer
    /// all end the task after announcing the disconnect.
    async fn read_loop(
        client_id: ClientId,
        mut reader: tokio::net::tcp::OwnedReadHalf,
        event_tx: UnboundedSender<ServerEvent>,
    ) {
        let mut decoder = protocol::framing::RecordDecoder::new();
        let mut buf = [0u8; 64 * 1024];

        loop {
            match reader.read(&mut buf).await {
                Ok(0) => {
                    log::info!("[Server] client {client_id} disconnected");
                    let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                    break;
                }
                Ok(n) => {
                    let records = match decoder.feed(&buf[..n]) {
                        Ok(records) => records,
                        Err(e) => {
                            log::error!("[Server] unreadable stream from client {client_id}: {e}");
                            let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                            break;
                        }
                    };
                    for record in records {
                        if record.is_empty() {
                            continue;
                        }
                        match protocol::decode_request(&record) {
                            Ok(request) => {
                                if event_tx
                                    .send(ServerEvent::Request { client_id, request })
                                    .is_err()
                                {
                                    return; // dispatch loop is gone
                                }
                            }
                            Err(e) => {
                                log::debug!(
                                    "[Server] dropping malformed record from client {client_id}: {e}"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    log::error!("[Server] read error for client {client_id}: {e}");
                    let _ = event_tx.send(ServerEvent::Disconnected { client_id });
                    break;
                }
            }
        }
    }

    /// Write task: drain encoded records onto the socket.
    async fn write_loop(
        client_id: ClientId,
        mut writer: tokio::net::tcp::OwnedWriteHalf,
        mut frame_rx: UnboundedReceiver<Vec<u8>>,
    ) {
        while let Some(data) = frame_rx.recv().await {
            if let Err(e) = writer.write_all(&data).await {
                log::error!("[Server] write error for client {client_id}: {e}");
                break;
            }
        }
    }
}

/// Accept connections forever, assigning each a fresh identity.
///
/// Ids come from a counter shared with the owning server so they stay
/// monotonic across the whole process lifetime and are never reused.
pub(crate) async fn accept_loop(
    listener: TcpListener,
    event_tx: UnboundedSender<ServerEvent>,
    next_client_id: Arc<AtomicU64>,
) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let client_id = next_client_id.fetch_add(1, Ordering::Relaxed);
                log::info!("[Server] client {client_id} connected from {addr}");

                let conn = ClientConn::spawn(client_id, stream, event_tx.clone());
                if event_tx.send(ServerEvent::Connected(conn)).is_err() {
                    log::warn!("[Server] event channel closed, stopping accept loop");
                    break;
                }
            }
            Err(e) => {
                log::error!("[Server] accept error: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}
