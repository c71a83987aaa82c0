//! Pool Configuration
//!
//! Tunables for connection setup, command execution and the background
//! sweep. The defaults match what the hosting platform runs in production.

use std::time::Duration;

/// Configuration for the connection pool and its connections.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum pooled connections per `host:port` (default: 2)
    pub max_connections_per_host: usize,

    /// Bound on TCP connect plus login (default: 10s)
    pub connect_timeout: Duration,

    /// How long `acquire` waits for a free connection (default: 10s)
    pub acquire_timeout: Duration,

    /// How long a command waits for its response (default: 30s)
    pub command_timeout: Duration,

    /// Released connections idle longer than this are swept (default: 180s)
    pub idle_timeout: Duration,

    /// Interval between background sweeps (default: 60s)
    pub sweep_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections_per_host: 2,
            connect_timeout: Duration::from_secs(10),
            acquire_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(180),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

impl PoolConfig {
    /// Sets the per-server connection limit. Values below 1 are raised to 1.
    pub fn with_max_connections_per_host(mut self, max: usize) -> Self {
        self.max_connections_per_host = max.max(1);
        self
    }

    /// Sets the bound on TCP connect plus login.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets how long `acquire` waits for a free connection.
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Sets how long a command may take, from writing it to its response.
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// Sets how long a released connection may sit idle before the sweep closes it.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the time between background sweeps.
    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}
