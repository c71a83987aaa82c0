//! Command Executor
//!
//! The entry point other services use to run console commands. Each call
//! borrows a pooled connection, runs exactly one command on it and hands
//! the connection back, whatever the outcome.
//!
//! ```text
//! execute_command("10.0.0.5", 25575, pw, "list")
//!       │
//!       ▼
//! ┌─────────────────┐   acquire    ┌─────────────────┐
//! │ CommandExecutor │────────────> │ ConnectionPool  │
//! └────────┬────────┘              └─────────────────┘
//!          │ execute                        ▲
//!          ▼                                │ release (lease dropped)
//! ┌─────────────────┐                       │
//! │  RconConnection │───────────────────────┘
//! └─────────────────┘
//! ```
//!
//! No retries happen here. Callers that want them can check
//! [`RconError::is_transient`](crate::error::RconError::is_transient).

use crate::error::RconResult;
use crate::parsing::{parse_player_data, parse_player_list, PlayerData, PlayerList};
use crate::pool::ConnectionPool;
use std::sync::Arc;
use tracing::{debug, warn};

/// Runs single commands against pooled connections.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    pool: Arc<ConnectionPool>,
}

impl CommandExecutor {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Runs `command` on `host:port` and returns the response body.
    ///
    /// The connection goes back to the pool on every path, including
    /// command timeouts and cancellation of the returned future.
    pub async fn execute_command(
        &self,
        host: &str,
        port: u16,
        password: &str,
        command: &str,
    ) -> RconResult<String> {
        let lease = self.pool.acquire(host, port, password).await?;
        debug!(
            server = %lease.server(),
            connection = lease.id(),
            command,
            "Executing command"
        );

        let result = lease.execute(command).await;
        if let Err(ref e) = result {
            warn!(server = %lease.server(), command, error = %e, "Command failed");
        }
        result
    }

    /// Runs `list` and decodes who is online.
    pub async fn list_players(
        &self,
        host: &str,
        port: u16,
        password: &str,
    ) -> RconResult<PlayerList> {
        let raw = self.execute_command(host, port, password, "list").await?;
        Ok(parse_player_list(&raw))
    }

    /// Runs `data get entity <name>` and decodes the result.
    ///
    /// `Ok(None)` means the server answered but the player is offline or the
    /// output couldn't be read.
    pub async fn player_data(
        &self,
        host: &str,
        port: u16,
        password: &str,
        name: &str,
    ) -> RconResult<Option<PlayerData>> {
        let command = format!("data get entity {}", name);
        let raw = self.execute_command(host, port, password, &command).await?;
        Ok(parse_player_data(name, &raw))
    }
}
