//! Background Pool Sweeper
//!
//! This module implements a background task that periodically walks the
//! connection pool and closes connections nobody is using.
//!
//! ## Why Do We Need This?
//!
//! A game server may be stopped, restarted or deleted while the pool still
//! holds sessions to it. Idle sessions also pin a socket on the server side.
//! Without a sweep those connections would linger until the process exits.
//!
//! ## Design
//!
//! The sweeper runs as a Tokio task and:
//! 1. Sleeps for the configured interval (default: 60s)
//! 2. Removes released connections idle past the threshold (default: 180s)
//! 3. Removes released connections that are no longer authenticated
//! 4. Logs what it evicted
//!
//! Connections that are lent out are never evicted, however long they've
//! been held.

use crate::pool::ConnectionPool;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// A handle to the running pool sweeper.
///
/// When this handle is dropped, the sweeper task will be stopped.
#[derive(Debug)]
pub struct PoolSweeper {
    /// Sender to signal shutdown
    shutdown_tx: watch::Sender<bool>,
}

impl PoolSweeper {
    /// Starts the sweeper as a background task.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use rconpool::{ConnectionPool, PoolConfig, PoolSweeper};
    /// use std::sync::Arc;
    ///
    /// let pool = ConnectionPool::new(PoolConfig::default());
    /// let sweeper = PoolSweeper::start(Arc::clone(&pool));
    ///
    /// // Sweeper runs in the background...
    ///
    /// // Dropping the sweeper will stop it
    /// drop(sweeper);
    /// ```
    pub fn start(pool: Arc<ConnectionPool>) -> Self {
        let interval = pool.config().sweep_interval;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweeper_loop(pool, interval, shutdown_rx));

        info!(interval_secs = interval.as_secs(), "Pool sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper.
    ///
    /// This is called automatically when the handle is dropped.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        debug!("Pool sweeper stopped");
    }
}

impl Drop for PoolSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

/// The main sweeper loop.
async fn sweeper_loop(
    pool: Arc<ConnectionPool>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("Pool sweeper received shutdown signal");
                    return;
                }
            }
        }

        let report = pool.sweep();
        if report.total() > 0 {
            info!(
                idle = report.idle,
                dead = report.dead,
                servers = pool.server_count(),
                "Closed unused RCON connections"
            );
        }
    }
}
