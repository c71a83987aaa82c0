//! Connection Module
//!
//! This module manages a single RCON session to a Minecraft server.
//! Each session has a background reader task that reassembles frames from
//! the TCP stream and hands responses to the request that is waiting for them.
//!
//! ## Architecture
//!
//! ```text
//!              execute("list")
//!                    │
//!                    ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RconConnection                          │
//! │                                                             │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐      │
//! │  │ Allocate id │───>│  Register   │───>│ Write frame │      │
//! │  └─────────────┘    │  oneshot    │    └─────────────┘      │
//! │                     └──────▲──────┘                         │
//! │                            │ complete by request id         │
//! │                     ┌──────┴──────┐    ┌─────────────┐      │
//! │                     │  Dispatch   │<───│ Reader task │<─ TCP│
//! │                     └─────────────┘    └─────────────┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Handshake State Machine**: Connecting, Authenticating, Ready, Closed/Errored
//! - **Buffer Management**: BytesMut accumulation for partial frames
//! - **Correlation**: Out-of-order responses are matched by request id
//! - **Statistics**: Tracks sessions, commands and traffic

pub mod handler;

// Re-export commonly used types
pub use handler::{ConnectionState, ConnectionStats, RconConnection};
