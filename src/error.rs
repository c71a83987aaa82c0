//! Error types shared by the connection, pool and executor layers.

use crate::protocol::CodecError;
use std::time::Duration;
use thiserror::Error;

/// Errors returned to callers of the RCON client.
///
/// Connection-level failures only affect requests pending on that one
/// connection. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum RconError {
    /// No TCP connection (or no auth reply) within the connect timeout
    #[error("timed out connecting to {server} after {timeout:?}")]
    ConnectTimeout { server: String, timeout: Duration },

    /// The server replied to the login with the failure sentinel id
    #[error("authentication failed for {server}")]
    AuthenticationFailed { server: String },

    /// No correlated response within the command timeout
    #[error("command timed out after {0:?}")]
    CommandTimeout(Duration),

    /// The socket closed or errored while the request was pending
    #[error("connection to {server} closed")]
    ConnectionClosed { server: String },

    /// No free connection and the per-server maximum was reached
    #[error("no free connection to {server} within {timeout:?}")]
    PoolExhausted { server: String, timeout: Duration },

    /// The pool was shut down while the caller was waiting
    #[error("connection pool is shut down")]
    PoolShutdown,

    /// Command body is longer than the server accepts
    #[error("command is {len} bytes, maximum is {max}")]
    CommandTooLong { len: usize, max: usize },

    /// Malformed frame received from the server
    #[error("protocol error: {0}")]
    Codec(#[from] CodecError),

    /// I/O error (connection refused, reset, ...)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RconError {
    /// Returns true for errors caused by the network rather than the caller.
    ///
    /// Callers use this to decide whether a retry is worth it.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RconError::ConnectTimeout { .. }
                | RconError::CommandTimeout(_)
                | RconError::ConnectionClosed { .. }
                | RconError::PoolExhausted { .. }
                | RconError::Io(_)
        )
    }
}

/// Result type for RCON operations.
pub type RconResult<T> = Result<T, RconError>;
