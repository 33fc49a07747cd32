//! Events funneled from connection tasks into the dispatch loop.

use crate::protocol::{ClientId, Request};

use super::conn::ClientConn;

/// One unit of work for [`Server::tick`](crate::Server::tick).
///
/// Connection tasks run on the async runtime and never touch session state
/// directly; everything they observe is sent over a single channel and
/// applied sequentially by the dispatch loop.
#[derive(Debug)]
pub enum ServerEvent {
    /// A connection was accepted and its io tasks are running.
    Connected(ClientConn),
    /// A well-formed request arrived on `client_id`'s connection.
    Request {
        /// Identity assigned to the connection the record arrived on.
        client_id: ClientId,
        /// Decoded request envelope.
        request: Request,
    },
    /// A connection hit EOF or a transport error.
    ///
    /// May be observed more than once for the same client (read and write
    /// tasks can both fail); cleanup is idempotent.
    Disconnected {
        /// Identity assigned to the closed connection.
        client_id: ClientId,
    },
}
