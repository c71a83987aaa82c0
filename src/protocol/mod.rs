//! RCON Protocol Implementation
//!
//! This module provides the packet framing for the Source RCON protocol.
//!
//! ## Overview
//!
//! RCON is a small binary protocol: every message is a length-prefixed frame
//! carrying a request id, a type code and a text body. The client logs in
//! with a password and then sends console commands; the server echoes the
//! request id on each reply so responses can be matched to requests.
//!
//! ## Modules
//!
//! - `types`: Defines the `Packet` struct and protocol constants
//! - `codec`: Encoder and incremental decoder for stream data
//!
//! ## Example
//!
//! ```
//! use rconpool::protocol::{decode, encode, packet_type};
//!
//! let bytes = encode(1, packet_type::EXEC_COMMAND, "list");
//! let (packet, consumed) = decode(&bytes).unwrap().unwrap();
//! assert_eq!(packet.body, "list");
//! assert_eq!(consumed, bytes.len());
//! ```

pub mod codec;
pub mod types;

// Re-export commonly used types for convenience
pub use codec::{decode, encode, CodecError, CodecResult, PacketDecoder};
pub use types::{packet_type, Packet, AUTH_FAILURE_ID, MAX_COMMAND_LENGTH, MAX_PACKET_SIZE};
