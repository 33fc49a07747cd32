//! Gameroom - room-based multiplayer session server.
//!
//! This crate provides the core functionality for the gameroom binary plus
//! a blocking client handle for talking to a running server.
//!
//! # Architecture
//!
//! All session state lives behind one sequential dispatch loop:
//!
//! - **Server** - Owns the registry, drains connection events, dispatches requests
//! - **SessionRegistry** - Clients, rooms, membership, and attribute dictionaries
//! - **ClientConn** - Per-connection read/write tasks feeding the event channel
//! - **Client** - Blocking caller-side handle with a per-action reply inbox
//!
//! # Modules
//!
//! - [`server`] - Accept loop, dispatch, and session state
//! - [`client`] - Blocking client API
//! - [`protocol`] - Wire envelopes and record framing
//! - [`config`] - Configuration loading/saving

// Library modules
pub mod client;
pub mod config;
pub mod constants;
pub mod protocol;
pub mod server;

// Re-export commonly used types
pub use client::{Client, ClientError, Message};
pub use config::Config;
pub use protocol::{
    Action, Attributes, ClientId, ErrorKind, Reply, Request, RoomId, RoomInfo, Status, Value,
};

// Re-export Server
pub use server::Server;
