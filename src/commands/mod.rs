//! Command Module
//!
//! This module is the public face of the crate: it runs console commands
//! against Minecraft servers through the connection pool.
//!
//! ## Architecture
//!
//! ```text
//! Caller
//!       │
//!       ▼
//! ┌─────────────────┐
//! │ CommandExecutor │  (this module)
//! │                 │
//! │  - Acquire      │
//! │  - Execute      │
//! │  - Release      │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ ConnectionPool  │  (pool module)
//! └─────────────────┘
//! ```
//!
//! ## Typed Commands
//!
//! - `list` through [`CommandExecutor::list_players`]
//! - `data get entity <name>` through [`CommandExecutor::player_data`]

pub mod executor;

// Re-export the main command executor
pub use executor::CommandExecutor;
