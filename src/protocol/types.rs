//! RCON Packet Types
//!
//! This module defines the packet envelope used by the Source RCON protocol,
//! which Minecraft servers expose for remote console access.
//!
//! ## Packet Format
//!
//! Every packet is a little-endian, length-prefixed frame:
//!
//! ```text
//! ┌──────────┬────────────┬──────────┬──────────────────┬──────┬──────┐
//! │ i32 size │ i32 req id │ i32 type │ body (UTF-8)     │ 0x00 │ 0x00 │
//! └──────────┴────────────┴──────────┴──────────────────┴──────┴──────┘
//!              └──────────────── covered by `size` ──────────────────┘
//! ```
//!
//! ## Type Codes
//!
//! - `3` Auth request (body is the password)
//! - `2` Execute command request, and also the auth response
//! - `0` Response value (command output)
//!
//! The execute-command and auth-response codes are the same number. A client
//! cannot tell them apart from the frame alone and has to know which phase
//! of the handshake it is in.

use std::fmt;

/// Bytes in the frame after the size field, excluding the body:
/// request id (4) + type (4) + two null terminators (2).
pub const FRAME_OVERHEAD: usize = 10;

/// Size of the leading length field.
pub const SIZE_FIELD_LEN: usize = 4;

/// Largest frame we accept from a server (1 MiB).
///
/// Vanilla servers fragment at 4096 bytes, but modded servers are known to
/// send much larger single frames for `data get` output.
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// Longest command body a vanilla server will accept.
pub const MAX_COMMAND_LENGTH: usize = 1446;

/// Request id the server uses to signal a rejected password.
pub const AUTH_FAILURE_ID: i32 = -1;

/// RCON packet type codes.
pub mod packet_type {
    /// Client -> server login, body is the password.
    pub const AUTH: i32 = 3;
    /// Client -> server command.
    pub const EXEC_COMMAND: i32 = 2;
    /// Server -> client login result. Same code as [`EXEC_COMMAND`].
    pub const AUTH_RESPONSE: i32 = 2;
    /// Server -> client command output.
    pub const RESPONSE_VALUE: i32 = 0;
}

/// A single decoded RCON packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Correlation id chosen by the client and echoed by the server
    pub request_id: i32,
    /// Raw type code (see [`packet_type`])
    pub packet_type: i32,
    /// Packet body
    pub body: String,
}

impl Packet {
    /// Creates a packet from its parts.
    pub fn new(request_id: i32, packet_type: i32, body: impl Into<String>) -> Self {
        Self {
            request_id,
            packet_type,
            body: body.into(),
        }
    }

    /// Creates a login packet carrying the password.
    pub fn auth(request_id: i32, password: &str) -> Self {
        Self::new(request_id, packet_type::AUTH, password)
    }

    /// Creates a command packet.
    pub fn command(request_id: i32, command: &str) -> Self {
        Self::new(request_id, packet_type::EXEC_COMMAND, command)
    }

    /// Value of the size field for this packet.
    pub fn frame_size(&self) -> usize {
        FRAME_OVERHEAD + self.body.len()
    }

    /// Returns true if this is the server's "wrong password" reply.
    ///
    /// Only meaningful while the connection is authenticating.
    pub fn is_auth_failure(&self) -> bool {
        self.packet_type == packet_type::AUTH_RESPONSE && self.request_id == AUTH_FAILURE_ID
    }

    /// Serializes the packet to its wire format.
    pub fn encode(&self) -> bytes::Bytes {
        crate::protocol::codec::encode(self.request_id, self.packet_type, &self.body)
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "packet(id={}, type={}, {} bytes)",
            self.request_id,
            self.packet_type,
            self.body.len()
        )
    }
}
