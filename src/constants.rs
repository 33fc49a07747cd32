//! Application-wide constants for gameroom.
//!
//! This module centralizes the protocol and timing constants shared by the
//! server and client halves. Constants are grouped by domain with
//! documentation explaining their purpose.
//!
//! # Categories
//!
//! - **Wire protocol**: record delimiter and size limits
//! - **Timing**: poll cadences and the response deadline
//! - **Network defaults**: bind address and port

use std::time::Duration;

// ============================================================================
// Wire protocol
// ============================================================================

/// Record delimiter byte (ASCII BEL).
///
/// Every serialized envelope on the wire is terminated by this single byte.
/// It is not printable and never appears inside the JSON text of a record,
/// so it fully determines record boundaries.
pub const RECORD_DELIMITER: u8 = 0x07;

/// Maximum size of a single buffered record (64 KB).
///
/// Envelopes are small JSON objects; a peer that streams this many bytes
/// without a delimiter is misbehaving and gets disconnected rather than
/// growing the reassembly buffer without bound.
pub const MAX_RECORD_SIZE: usize = 64 * 1024;

// ============================================================================
// Timing
// ============================================================================

/// Default response deadline in milliseconds, as stored in the config file.
pub const RESPONSE_TIMEOUT_MS: u64 = 1000;

/// Default deadline for a client call awaiting its response envelope.
///
/// `wait_for` gives up and reports a timeout once this much time has passed
/// without a matching envelope arriving.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_millis(RESPONSE_TIMEOUT_MS);

/// Interval at which `wait_for` re-checks its action queue.
///
/// Short enough that responses are picked up promptly, long enough to avoid
/// spinning a core while blocked.
pub const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Read timeout for the client's background poller thread.
///
/// The poller blocks on the socket for at most this long per attempt, which
/// doubles as its shutdown-check cadence.
pub const READ_POLL_TIMEOUT: Duration = Duration::from_millis(10);

/// Cadence of the server dispatch loop in [`crate::Server::run`].
///
/// Each tick drains every inbound event that has accumulated since the last
/// one, so this bounds added latency, not throughput.
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Network defaults
// ============================================================================

/// Default bind address for the server.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// Default TCP port for the server.
pub const DEFAULT_PORT: u16 = 7777;
