//! Server side: socket plumbing, session state, and the dispatch loop.
//!
//! The server is split the same way the protocol is: async io tasks feed a
//! single synchronous state machine.
//!
//! ```text
//!   accept loop ──┐
//!   read tasks ───┼──> event channel ──> tick() ──> SessionRegistry
//!                 │                        │
//!   write tasks <─┴────────────────────────┘  (replies / relays)
//! ```
//!
//! All session state lives in [`SessionRegistry`] and is mutated only from
//! [`Server::tick`], which drains the event channel and applies events
//! sequentially. Connection tasks on the runtime never touch state, so no
//! locks guard the registry.

// Rust guideline compliant 2026-02

pub mod conn;
pub mod dispatch;
pub mod events;
pub mod registry;
pub mod room;

pub use conn::ClientConn;
pub use events::ServerEvent;
pub use registry::SessionRegistry;
pub use room::Room;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::task::JoinHandle;

use crate::constants::TICK_INTERVAL;

/// A running session server.
///
/// Owns the async runtime its io tasks live on, but is driven from plain
/// blocking code: the host calls [`Server::tick`] periodically (or hands
/// control to [`Server::run`]) and all state changes happen inside those
/// calls, on the caller's thread.
pub struct Server {
    /// Runtime hosting the accept loop and the per-connection io tasks.
    runtime: tokio::runtime::Runtime,
    /// Authoritative session state.
    registry: SessionRegistry,
    /// Events funneled in from connection tasks.
    event_rx: UnboundedReceiver<ServerEvent>,
    /// Address the listener actually bound (resolves port 0).
    local_addr: SocketAddr,
    /// Handle to the accept loop task.
    accept_handle: JoinHandle<()>,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("local_addr", &self.local_addr)
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind a listener and start accepting connections.
    ///
    /// Binding through the blocking api first means address errors surface
    /// here rather than inside a spawned task, and an ephemeral port (`:0`)
    /// can be read back via [`Server::local_addr`].
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot be created or the address
    /// cannot be bound.
    pub fn bind(addr: impl std::net::ToSocketAddrs + std::fmt::Debug) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Runtime::new()?;

        let listener = std::net::TcpListener::bind(&addr)
            .with_context(|| format!("failed to bind {addr:?}"))?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let next_client_id = Arc::new(AtomicU64::new(0));

        let accept_handle = {
            let _guard = runtime.enter();
            let listener = TcpListener::from_std(listener)?;
            tokio::spawn(conn::accept_loop(listener, event_tx, next_client_id))
        };

        log::info!("[Server] listening on {local_addr}");

        Ok(Self {
            runtime,
            registry: SessionRegistry::new(),
            event_rx,
            local_addr,
            accept_handle,
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Number of currently connected clients.
    #[must_use]
    pub fn client_count(&self) -> usize {
        self.registry.client_count()
    }

    /// Number of rooms created so far.
    #[must_use]
    pub fn room_count(&self) -> usize {
        self.registry.room_count()
    }

    /// Drain and apply every event that has arrived since the last call.
    ///
    /// Non-blocking and idempotent when the queue is empty. This is the only
    /// place session state changes.
    pub fn tick(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            match event {
                ServerEvent::Connected(conn) => dispatch::handle_connected(&mut self.registry, conn),
                ServerEvent::Request { client_id, request } => {
                    dispatch::handle_request(&mut self.registry, client_id, request);
                }
                ServerEvent::Disconnected { client_id } => {
                    dispatch::handle_disconnected(&mut self.registry, client_id);
                }
            }
        }
    }

    /// Tick until `shutdown` is raised.
    ///
    /// Intended for hosts without their own scheduler; embedders that
    /// already have a loop call [`Server::tick`] themselves instead.
    pub fn run(&mut self, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.tick();
            std::thread::sleep(TICK_INTERVAL);
        }
        log::info!("[Server] shutdown requested");
    }

    /// Stop accepting, close every connection, and tear down the runtime.
    pub fn shutdown(mut self) {
        self.accept_handle.abort();
        for conn in self.registry.drain_clients() {
            conn.disconnect();
        }
        log::info!("[Server] stopped");
        // Dropping the runtime reaps the aborted tasks.
    }
}
