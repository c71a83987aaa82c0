//! Connection Pool
//!
//! This module keeps a small set of authenticated connections per server
//! (`host:port`) and lends them out one caller at a time.
//!
//! ## Design Decisions
//!
//! 1. **One command per connection**: A lent connection is marked in use until
//!    the lease is dropped. RCON servers don't promise to answer pipelined
//!    requests in order, so concurrency comes from holding several
//!    connections per server instead.
//! 2. **Bounded per server**: At most `max_connections_per_host` connections
//!    exist (or are being opened) for one key.
//! 3. **FIFO hand-off**: Callers that find the pool full queue up. A released
//!    connection goes straight to the oldest waiter, so a newcomer can't
//!    grab it first.
//! 4. **No I/O under the lock**: Connects happen outside the critical section
//!    against a reserved slot.
//!
//! ## Acquire Flow
//!
//! ```text
//! acquire(host, port, password)
//!    │
//!    ├─ free & ready entry? ─────────────> lease it
//!    │
//!    ├─ below max? ── reserve slot ──────> connect + login ──> lease it
//!    │
//!    └─ queue waiter ──> handed a lease ─> done
//!                    ├─> slot freed ─────> start over
//!                    └─> deadline ───────> PoolExhausted
//! ```

use crate::config::PoolConfig;
use crate::connection::{ConnectionStats, RconConnection};
use crate::error::{RconError, RconResult};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::time::timeout_at;
use tracing::{debug, info, trace, warn};

/// Builds the pool key for a server.
pub fn server_key(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

/// What a queued waiter is woken with.
enum Handoff {
    /// A released connection, already marked in use for the waiter
    Lease(PooledLease),
    /// A slot opened up; the waiter should try again
    SlotFreed,
}

/// A pooled connection and its bookkeeping.
struct PooledConnection {
    connection: Arc<RconConnection>,
    in_use: bool,
    last_used_at: Instant,
}

/// All connections for one `host:port`.
#[derive(Default)]
struct HostPool {
    entries: Vec<PooledConnection>,
    /// Slots reserved by connects in progress
    opening: usize,
    waiters: VecDeque<oneshot::Sender<Handoff>>,
}

impl HostPool {
    /// Tells the oldest live waiter that a slot is free.
    fn wake_one(&mut self) {
        while let Some(tx) = self.waiters.pop_front() {
            if tx.send(Handoff::SlotFreed).is_ok() {
                return;
            }
        }
    }

    /// Removes idle entries whose session is no longer usable.
    fn take_dead(&mut self) -> Vec<Arc<RconConnection>> {
        let mut dead = Vec::new();
        self.entries.retain(|entry| {
            if !entry.in_use && !entry.connection.is_authenticated() {
                dead.push(Arc::clone(&entry.connection));
                false
            } else {
                true
            }
        });
        dead
    }

    fn is_unused(&self) -> bool {
        self.entries.is_empty() && self.opening == 0 && self.waiters.is_empty()
    }
}

/// Result of one synchronous pass over a host pool.
enum Step {
    Leased(Arc<RconConnection>),
    Open,
    Wait(oneshot::Receiver<Handoff>),
}

/// Counts from one sweep pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    /// Released connections idle past the threshold
    pub idle: usize,
    /// Released connections that were no longer authenticated or writable
    pub dead: usize,
}

impl SweepReport {
    pub fn total(&self) -> usize {
        self.idle + self.dead
    }
}

/// Bounded per-server pool of RCON connections.
///
/// # Example
///
/// ```ignore
/// use rconpool::{ConnectionPool, PoolConfig};
///
/// let pool = ConnectionPool::new(PoolConfig::default());
/// let lease = pool.acquire("10.0.0.5", 25575, "secret").await?;
/// let output = lease.execute("list").await?;
/// drop(lease); // back in the pool
/// ```
pub struct ConnectionPool {
    config: PoolConfig,
    hosts: Mutex<HashMap<String, HostPool>>,
    next_connection_id: AtomicU64,
    stats: Arc<ConnectionStats>,
    shut_down: AtomicBool,
}

impl ConnectionPool {
    /// Creates an empty pool.
    pub fn new(config: PoolConfig) -> Arc<Self> {
        Arc::new(Self {
            config,
            hosts: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
            stats: Arc::new(ConnectionStats::new()),
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Traffic counters for every connection this pool opened.
    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    /// Lends out an authenticated connection to `host:port`.
    ///
    /// Reuses a free connection, opens a new one if the server is below its
    /// limit, or waits in line for one to be released. Fails with
    /// `PoolExhausted` if nothing frees up within the acquire timeout.
    pub async fn acquire(
        self: &Arc<Self>,
        host: &str,
        port: u16,
        password: &str,
    ) -> RconResult<PooledLease> {
        let key = server_key(host, port);
        let deadline = tokio::time::Instant::now() + self.config.acquire_timeout;

        loop {
            match self.try_acquire(&key)? {
                Step::Leased(connection) => {
                    trace!(server = %key, connection = connection.id(), "Reusing pooled connection");
                    return Ok(PooledLease::new(Arc::clone(self), connection));
                }
                Step::Open => {
                    let reservation = Reservation {
                        pool: self,
                        key: &key,
                        active: true,
                    };
                    return self.open(reservation, host, port, password).await;
                }
                Step::Wait(mut rx) => {
                    trace!(server = %key, "Pool full, waiting for a connection");
                    match timeout_at(deadline, &mut rx).await {
                        Ok(Ok(Handoff::Lease(lease))) => return Ok(lease),
                        Ok(Ok(Handoff::SlotFreed)) => continue,
                        Ok(Err(_)) => return Err(RconError::PoolShutdown),
                        Err(_) => {
                            // A release may have raced the deadline
                            rx.close();
                            match rx.try_recv() {
                                Ok(Handoff::Lease(lease)) => return Ok(lease),
                                Ok(Handoff::SlotFreed) => self.wake_one(&key),
                                Err(_) => {}
                            }
                            warn!(server = %key, "Timed out waiting for a pooled connection");
                            return Err(RconError::PoolExhausted {
                                server: key,
                                timeout: self.config.acquire_timeout,
                            });
                        }
                    }
                }
            }
        }
    }

    /// One critical section of `acquire`.
    fn try_acquire(&self, key: &str) -> RconResult<Step> {
        if self.shut_down.load(Ordering::Acquire) {
            return Err(RconError::PoolShutdown);
        }

        let mut hosts = self.hosts.lock();
        let pool = hosts.entry(key.to_string()).or_default();

        let dead = pool.take_dead();
        if !dead.is_empty() {
            debug!(server = %key, count = dead.len(), "Pruned dead connections");
        }

        if let Some(entry) = pool
            .entries
            .iter_mut()
            .find(|e| !e.in_use && e.connection.is_authenticated())
        {
            entry.in_use = true;
            entry.last_used_at = Instant::now();
            return Ok(Step::Leased(Arc::clone(&entry.connection)));
        }

        if pool.entries.len() + pool.opening < self.config.max_connections_per_host {
            pool.opening += 1;
            return Ok(Step::Open);
        }

        let (tx, rx) = oneshot::channel();
        pool.waiters.push_back(tx);
        Ok(Step::Wait(rx))
    }

    /// Opens a connection into a reserved slot.
    async fn open(
        self: &Arc<Self>,
        mut reservation: Reservation<'_>,
        host: &str,
        port: u16,
        password: &str,
    ) -> RconResult<PooledLease> {
        let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let connection = RconConnection::connect(
            id,
            host,
            port,
            password,
            &self.config,
            Arc::clone(&self.stats),
        )
        .await;

        let connection = match connection {
            Ok(connection) => Arc::new(connection),
            Err(e) => {
                warn!(server = %reservation.key, error = %e, "Failed to open RCON connection");
                // Dropping the reservation frees the slot
                return Err(e);
            }
        };

        let mut hosts = self.hosts.lock();
        if self.shut_down.load(Ordering::Acquire) {
            drop(hosts);
            reservation.active = false;
            connection.close();
            return Err(RconError::PoolShutdown);
        }

        let pool = hosts.entry(reservation.key.to_string()).or_default();
        pool.opening = pool.opening.saturating_sub(1);
        reservation.active = false;
        pool.entries.push(PooledConnection {
            connection: Arc::clone(&connection),
            in_use: true,
            last_used_at: Instant::now(),
        });
        debug!(
            server = %reservation.key,
            connection = id,
            pooled = pool.entries.len(),
            "Added connection to pool"
        );
        drop(hosts);

        Ok(PooledLease::new(Arc::clone(self), connection))
    }

    /// Returns a connection to the pool.
    ///
    /// If someone is waiting and the connection is still usable it goes
    /// straight to them. Never closes the socket; dead connections are
    /// removed by the sweep or the next `acquire`.
    pub fn release(self: &Arc<Self>, connection: &Arc<RconConnection>) {
        let key = connection.server();

        loop {
            let mut hosts = self.hosts.lock();
            let Some(pool) = hosts.get_mut(&key) else {
                debug!(server = %key, connection = connection.id(), "Released connection is no longer pooled");
                return;
            };
            let Some(index) = pool
                .entries
                .iter()
                .position(|e| e.connection.id() == connection.id())
            else {
                debug!(server = %key, connection = connection.id(), "Released connection is no longer pooled");
                return;
            };

            let usable = connection.is_authenticated();
            let entry = &mut pool.entries[index];
            entry.last_used_at = Instant::now();

            if usable {
                if let Some(tx) = pool.waiters.pop_front() {
                    // Entry stays in use and passes to the waiter
                    drop(hosts);
                    let lease = PooledLease::new(Arc::clone(self), Arc::clone(connection));
                    match tx.send(Handoff::Lease(lease)) {
                        Ok(()) => {
                            trace!(server = %key, connection = connection.id(), "Handed connection to waiter");
                            return;
                        }
                        Err(Handoff::Lease(lease)) => {
                            // Waiter gave up; try the next one
                            lease.disarm();
                            continue;
                        }
                        Err(Handoff::SlotFreed) => return,
                    }
                }
            }

            entry.in_use = false;
            if !usable {
                debug!(server = %key, connection = connection.id(), "Released a dead connection");
                pool.wake_one();
            }
            return;
        }
    }

    fn wake_one(&self, key: &str) {
        if let Some(pool) = self.hosts.lock().get_mut(key) {
            pool.wake_one();
        }
    }

    /// Closes released connections that are idle too long or dead.
    ///
    /// Connections in use are never touched.
    pub fn sweep(&self) -> SweepReport {
        let idle_timeout = self.config.idle_timeout;
        let now = Instant::now();
        let mut report = SweepReport::default();
        let mut evicted = Vec::new();

        {
            let mut hosts = self.hosts.lock();
            hosts.retain(|key, pool| {
                let before = pool.entries.len();
                pool.entries.retain(|entry| {
                    if entry.in_use {
                        return true;
                    }
                    if !entry.connection.is_authenticated() {
                        report.dead += 1;
                    } else if now.duration_since(entry.last_used_at) > idle_timeout {
                        report.idle += 1;
                    } else {
                        return true;
                    }
                    evicted.push(Arc::clone(&entry.connection));
                    false
                });

                pool.waiters.retain(|tx| !tx.is_closed());
                for _ in pool.entries.len()..before {
                    pool.wake_one();
                }

                if pool.is_unused() {
                    trace!(server = %key, "Dropping empty host pool");
                    false
                } else {
                    true
                }
            });
        }

        for connection in &evicted {
            connection.close();
        }

        if report.total() > 0 {
            debug!(idle = report.idle, dead = report.dead, "Swept pooled connections");
        }
        report
    }

    /// Closes every pooled connection and fails all waiters.
    pub fn shutdown(&self) {
        self.shut_down.store(true, Ordering::Release);
        let hosts = std::mem::take(&mut *self.hosts.lock());

        let mut closed = 0;
        for (_, pool) in hosts {
            for entry in pool.entries {
                entry.connection.close();
                closed += 1;
            }
            // Dropping the senders wakes waiters with PoolShutdown
        }
        info!(closed, "Connection pool shut down");
    }

    /// Number of pooled connections for a server.
    pub fn connection_count(&self, host: &str, port: u16) -> usize {
        self.hosts
            .lock()
            .get(&server_key(host, port))
            .map(|pool| pool.entries.len())
            .unwrap_or(0)
    }

    /// Number of connections currently lent out for a server.
    pub fn in_use_count(&self, host: &str, port: u16) -> usize {
        self.hosts
            .lock()
            .get(&server_key(host, port))
            .map(|pool| pool.entries.iter().filter(|e| e.in_use).count())
            .unwrap_or(0)
    }

    /// Number of servers with pool state.
    pub fn server_count(&self) -> usize {
        self.hosts.lock().len()
    }
}

impl fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.config)
            .field("servers", &self.server_count())
            .finish()
    }
}

/// A slot reserved for a connect in progress.
///
/// Frees the slot on drop unless the connect succeeded, so a failed or
/// cancelled connect never leaks capacity.
struct Reservation<'a> {
    pool: &'a ConnectionPool,
    key: &'a str,
    active: bool,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        let mut hosts = self.pool.hosts.lock();
        if let Some(pool) = hosts.get_mut(self.key) {
            pool.opening = pool.opening.saturating_sub(1);
            pool.wake_one();
        }
    }
}

/// A connection borrowed from the pool.
///
/// Dereferences to [`RconConnection`]. Dropping the lease releases the
/// connection, on success and failure paths alike.
pub struct PooledLease {
    pool: Arc<ConnectionPool>,
    connection: Arc<RconConnection>,
    armed: bool,
}

impl PooledLease {
    fn new(pool: Arc<ConnectionPool>, connection: Arc<RconConnection>) -> Self {
        Self {
            pool,
            connection,
            armed: true,
        }
    }

    /// Forgets the lease without releasing.
    fn disarm(mut self) {
        self.armed = false;
    }

    pub fn connection(&self) -> &Arc<RconConnection> {
        &self.connection
    }
}

impl Deref for PooledLease {
    type Target = RconConnection;

    fn deref(&self) -> &RconConnection {
        &self.connection
    }
}

impl Drop for PooledLease {
    fn drop(&mut self) {
        if self.armed {
            self.pool.release(&self.connection);
        }
    }
}

impl fmt::Debug for PooledLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledLease")
            .field("connection", &self.connection)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockServer, TEST_PASSWORD};
    use std::time::Duration;

    fn test_pool() -> Arc<ConnectionPool> {
        ConnectionPool::new(
            PoolConfig::default()
                .with_connect_timeout(Duration::from_secs(2))
                .with_acquire_timeout(Duration::from_secs(2))
                .with_command_timeout(Duration::from_secs(2)),
        )
    }

    #[tokio::test]
    async fn test_acquire_opens_and_reuses() {
        let server = MockServer::start().await;
        let pool = test_pool();

        let first_id = {
            let lease = pool
                .acquire(server.host(), server.port(), TEST_PASSWORD)
                .await
                .unwrap();
            assert!(lease.is_authenticated());
            assert_eq!(pool.in_use_count(server.host(), server.port()), 1);
            lease.id()
        };
        assert_eq!(pool.in_use_count(server.host(), server.port()), 0);

        let lease = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        assert_eq!(lease.id(), first_id);
        assert_eq!(server.accepted(), 1);
        assert_eq!(pool.connection_count(server.host(), server.port()), 1);
    }

    #[tokio::test]
    async fn test_second_acquire_gets_distinct_connection() {
        let server = MockServer::start().await;
        let pool = test_pool();

        let a = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        let b = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();

        assert_ne!(a.id(), b.id());
        assert_eq!(pool.connection_count(server.host(), server.port()), 2);
        assert_eq!(pool.in_use_count(server.host(), server.port()), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_not_pooled() {
        let server = MockServer::start().await;
        let pool = test_pool();

        let result = pool.acquire(server.host(), server.port(), "wrong").await;
        assert!(matches!(result, Err(RconError::AuthenticationFailed { .. })));
        assert_eq!(pool.connection_count(server.host(), server.port()), 0);
        assert_eq!(pool.stats().auth_failures.load(Ordering::Relaxed), 1);

        // The reserved slot was given back
        let lease = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        assert!(lease.is_authenticated());
    }

    #[tokio::test]
    async fn test_pool_exhausted() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(
            PoolConfig::default()
                .with_max_connections_per_host(1)
                .with_acquire_timeout(Duration::from_millis(100)),
        );

        let _held = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        let result = pool.acquire(server.host(), server.port(), TEST_PASSWORD).await;

        assert!(matches!(result, Err(RconError::PoolExhausted { .. })));
        assert_eq!(server.accepted(), 1);
    }

    #[tokio::test]
    async fn test_waiter_receives_released_connection() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(PoolConfig::default().with_max_connections_per_host(1));

        let held = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        let held_id = held.id();

        let waiter_pool = Arc::clone(&pool);
        let port = server.port();
        let waiter = tokio::spawn(async move {
            let lease = waiter_pool
                .acquire("127.0.0.1", port, TEST_PASSWORD)
                .await
                .unwrap();
            lease.id()
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        assert_eq!(waiter.await.unwrap(), held_id);
        assert_eq!(pool.in_use_count(server.host(), server.port()), 0);
    }

    #[tokio::test]
    async fn test_waiters_served_in_order() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(PoolConfig::default().with_max_connections_per_host(1));
        let held = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();

        let order = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = Vec::new();
        for i in 0..3 {
            let pool = Arc::clone(&pool);
            let order = Arc::clone(&order);
            let port = server.port();
            tasks.push(tokio::spawn(async move {
                let lease = pool.acquire("127.0.0.1", port, TEST_PASSWORD).await.unwrap();
                order.lock().push(i);
                tokio::time::sleep(Duration::from_millis(10)).await;
                drop(lease);
            }));
            // Make sure each waiter is queued before the next one
            tokio::time::sleep(Duration::from_millis(20)).await;
        }

        drop(held);
        for task in tasks {
            task.await.unwrap();
        }
        assert_eq!(*order.lock(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_respects_max() {
        let server = MockServer::start().await;
        let pool = test_pool();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = Arc::clone(&pool);
            let port = server.port();
            tasks.push(tokio::spawn(async move {
                let lease = pool.acquire("127.0.0.1", port, TEST_PASSWORD).await?;
                assert!(pool.connection_count("127.0.0.1", port) <= 2);
                lease.execute("sleep 20").await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), "slept");
        }
        assert!(server.accepted() <= 2);
        assert!(pool.connection_count(server.host(), server.port()) <= 2);
        assert_eq!(pool.in_use_count(server.host(), server.port()), 0);
    }

    #[tokio::test]
    async fn test_sweep_evicts_idle_connections() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(
            PoolConfig::default().with_idle_timeout(Duration::from_millis(50)),
        );

        drop(
            pool.acquire(server.host(), server.port(), TEST_PASSWORD)
                .await
                .unwrap(),
        );
        assert_eq!(pool.sweep(), SweepReport::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let report = pool.sweep();

        assert_eq!(report.idle, 1);
        assert_eq!(pool.connection_count(server.host(), server.port()), 0);
        assert_eq!(pool.server_count(), 0);
    }

    #[tokio::test]
    async fn test_sweep_never_evicts_in_use() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(
            PoolConfig::default().with_idle_timeout(Duration::from_millis(10)),
        );

        let lease = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(pool.sweep().total(), 0);
        assert_eq!(pool.connection_count(server.host(), server.port()), 1);
        assert_eq!(lease.execute("ping").await.unwrap(), "echo: ping");
    }

    #[tokio::test]
    async fn test_dead_connection_replaced() {
        let server = MockServer::start().await;
        let pool = test_pool();

        {
            let lease = pool
                .acquire(server.host(), server.port(), TEST_PASSWORD)
                .await
                .unwrap();
            assert!(lease.execute("close").await.is_err());
        }

        let lease = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();
        assert_eq!(lease.execute("ping").await.unwrap(), "echo: ping");
        assert_eq!(server.accepted(), 2);
        assert_eq!(pool.connection_count(server.host(), server.port()), 1);
    }

    #[tokio::test]
    async fn test_sweep_removes_dead_connection() {
        let server = MockServer::start().await;
        let pool = test_pool();

        {
            let lease = pool
                .acquire(server.host(), server.port(), TEST_PASSWORD)
                .await
                .unwrap();
            let _ = lease.execute("close").await;
        }

        let report = pool.sweep();
        assert_eq!(report.dead, 1);
        assert_eq!(pool.connection_count(server.host(), server.port()), 0);
    }

    #[tokio::test]
    async fn test_shutdown_fails_waiters() {
        let server = MockServer::start().await;
        let pool = ConnectionPool::new(PoolConfig::default().with_max_connections_per_host(1));
        let held = pool
            .acquire(server.host(), server.port(), TEST_PASSWORD)
            .await
            .unwrap();

        let waiter_pool = Arc::clone(&pool);
        let port = server.port();
        let waiter = tokio::spawn(async move {
            waiter_pool.acquire("127.0.0.1", port, TEST_PASSWORD).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        pool.shutdown();
        assert!(matches!(
            waiter.await.unwrap(),
            Err(RconError::PoolShutdown)
        ));
        assert!(!held.is_authenticated());
        assert!(matches!(
            pool.acquire(server.host(), server.port(), TEST_PASSWORD).await,
            Err(RconError::PoolShutdown)
        ));
    }
}
