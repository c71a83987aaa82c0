//! Connection Pool Module
//!
//! This module keeps authenticated RCON sessions alive between commands so
//! that every console command doesn't pay for a TCP connect and a login.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     ConnectionPool                          │
//! │                                                             │
//! │  "10.0.0.5:25575"  ┌────────┐ ┌────────┐  waiters: [..]     │
//! │                    │ conn 1 │ │ conn 2 │                    │
//! │                    │ in use │ │  free  │                    │
//! │                    └────────┘ └────────┘                    │
//! │  "10.0.0.9:25575"  ┌────────┐                               │
//! │                    │ conn 3 │                               │
//! │                    └────────┘                               │
//! └─────────────────────────────────────────────────────────────┘
//!                            ▲
//!                            │
//!              ┌─────────────┴─────────────┐
//!              │       PoolSweeper         │
//!              │  (Background Tokio Task)  │
//!              └───────────────────────────┘
//! ```
//!
//! ## Features
//!
//! - **Bounded**: At most 2 connections per server by default
//! - **Exclusive Leases**: One command per connection at a time
//! - **FIFO Waiters**: Released connections go to the longest waiting caller
//! - **Sweep**: Idle and dead connections are closed in the background

pub mod manager;
pub mod sweeper;

// Re-export commonly used types
pub use manager::{server_key, ConnectionPool, PooledLease, SweepReport};
pub use sweeper::PoolSweeper;
