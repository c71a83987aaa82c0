//! # rconpool - Pooled RCON Client for Minecraft Servers
//!
//! rconpool runs console commands on Minecraft servers over the Source RCON
//! protocol. It keeps authenticated sessions open between commands and
//! decodes the two responses most callers care about: the online player list
//! and a player's entity data.
//!
//! ## Features
//!
//! - **Pooled**: Up to 2 authenticated connections per server, reused across calls
//! - **Multiplexed Reads**: Responses are matched to requests by id, out of order
//! - **Bounded Waits**: Connect, acquire and command timeouts on every call
//! - **Tolerant Decoders**: Unreadable output degrades to defaults, never errors
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                              rconpool                                   │
//! │                                                                         │
//! │  ┌─────────────┐    ┌─────────────┐    ┌─────────────┐                  │
//! │  │  Command    │───>│ Connection  │───>│    RCON     │───> TCP          │
//! │  │  Executor   │    │    Pool     │    │ Connection  │                  │
//! │  └──────┬──────┘    └──────┬──────┘    └──────┬──────┘                  │
//! │         │                  │                  │                         │
//! │         ▼                  ▲                  ▼                         │
//! │  ┌─────────────┐           │           ┌─────────────┐                  │
//! │  │  Response   │           │           │   Packet    │                  │
//! │  │  Decoders   │           │           │   Codec     │                  │
//! │  └─────────────┘           │           └─────────────┘                  │
//! │                     ┌──────┴──────────────────────────────────────────┐ │
//! │                     │           PoolSweeper                           │ │
//! │                     │      (Background Tokio Task)                    │ │
//! │                     └─────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```no_run
//! use rconpool::{CommandExecutor, ConnectionPool, PoolConfig, PoolSweeper};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), rconpool::RconError> {
//!     let pool = ConnectionPool::new(PoolConfig::default());
//!     let _sweeper = PoolSweeper::start(Arc::clone(&pool));
//!     let executor = CommandExecutor::new(pool);
//!
//!     let reply = executor
//!         .execute_command("127.0.0.1", 25575, "secret", "time query daytime")
//!         .await?;
//!     println!("{}", reply);
//!
//!     let online = executor.list_players("127.0.0.1", 25575, "secret").await?;
//!     println!("{} of {} online", online.online, online.max);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`protocol`]: RCON packet framing
//! - [`connection`]: a single authenticated session
//! - [`pool`]: per-server connection pooling and the background sweeper
//! - [`commands`]: the command executor
//! - [`parsing`]: `list` and `data get entity` decoders

pub mod commands;
pub mod config;
pub mod connection;
pub mod error;
pub mod parsing;
pub mod pool;
pub mod protocol;

#[cfg(test)]
mod testing;

// Re-export main types for convenience
pub use commands::CommandExecutor;
pub use config::PoolConfig;
pub use connection::{ConnectionState, ConnectionStats, RconConnection};
pub use error::{RconError, RconResult};
pub use parsing::{parse_player_data, parse_player_list, MinecraftItem, PlayerData, PlayerList};
pub use pool::{ConnectionPool, PoolSweeper, PooledLease};
pub use protocol::{CodecError, Packet};

/// Default RCON port of a vanilla server
pub const DEFAULT_RCON_PORT: u16 = 25575;

/// Default host for the command-line tool
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Version of rconpool
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
