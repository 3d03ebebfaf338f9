//! Bounded pool of reusable backend handles.
//!
//! ## Member lifecycle
//!
//! ```text
//! reserve → (factory) → InUse ⇄ Idle → Reaped
//! ```
//!
//! A slot is reserved inside the critical section before the factory runs,
//! so concurrent callers can never push the pool past `max_pool_size`. While
//! a member is checked out its handle lives in the caller's
//! [`PooledConnection`], which makes exclusivity a matter of ownership.
//! Dropping the guard checks the handle back in.
//!
//! Saturated callers park on a [`Notify`] and are woken by the next release,
//! bounded by `max_wait_time`.

use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, Result};
use crate::factory::ConnectionFactory;
use crate::metrics;

struct Member<H> {
    id: u64,
    /// `None` while checked out or while the factory is still running.
    handle: Option<H>,
    in_use: bool,
    last_used_at: Instant,
    created_at: Instant,
}

struct Members<H> {
    list: Vec<Member<H>>,
    next_id: u64,
    closed: bool,
}

enum Claim<H> {
    Idle { id: u64, handle: H },
    Reserved { id: u64 },
    Saturated,
}

/// State shared between the pool, its checked-out guards and the reaper.
pub(crate) struct Shared<H> {
    config: PoolConfig,
    members: Mutex<Members<H>>,
    available: Notify,
}

impl<H> Shared<H> {
    fn try_claim(&self) -> Result<Claim<H>> {
        let mut members = self.members.lock();
        if members.closed {
            return Err(PoolError::Closed);
        }

        let now = Instant::now();
        if let Some(member) = members
            .list
            .iter_mut()
            .find(|m| !m.in_use && m.handle.is_some())
            && let Some(handle) = member.handle.take()
        {
            member.in_use = true;
            member.last_used_at = now;
            return Ok(Claim::Idle {
                id: member.id,
                handle,
            });
        }

        if members.list.len() < self.config.max_pool_size {
            let id = members.next_id;
            members.next_id += 1;
            members.list.push(Member {
                id,
                handle: None,
                in_use: true,
                last_used_at: now,
                created_at: now,
            });
            return Ok(Claim::Reserved { id });
        }

        Ok(Claim::Saturated)
    }

    fn check_in(&self, id: u64, handle: H) {
        let orphan = {
            let mut members = self.members.lock();
            match members.list.iter_mut().find(|m| m.id == id) {
                Some(member) => {
                    member.handle = Some(handle);
                    member.in_use = false;
                    member.last_used_at = Instant::now();
                    None
                }
                None => Some(handle),
            }
        };

        match orphan {
            None => self.available.notify_one(),
            Some(handle) => {
                debug!(member_id = id, "Released handle is no longer tracked by the pool");
                drop(handle);
            }
        }
    }

    /// Drops a reservation whose factory call failed or was cancelled.
    fn forget(&self, id: u64) {
        self.members.lock().list.retain(|m| m.id != id);
        self.available.notify_one();
    }

    pub(crate) fn reap(&self) -> usize {
        let now = Instant::now();
        let max_idle_time = self.config.max_idle_time;
        let max_lifetime = self.config.max_lifetime;

        let (reaped, remaining) = {
            let mut members = self.members.lock();
            let mut reaped = Vec::new();
            members.list.retain_mut(|m| {
                if m.in_use {
                    return true;
                }
                let idle_expired = now.duration_since(m.last_used_at) > max_idle_time;
                let too_old = now.duration_since(m.created_at) > max_lifetime;
                if idle_expired || too_old {
                    reaped.extend(m.handle.take());
                    false
                } else {
                    true
                }
            });
            (reaped, members.list.len())
        };

        let count = reaped.len();
        drop(reaped);

        if count > 0 {
            info!(reaped = count, remaining, "Cleaned idle pooled connections");
            metrics::record_reaped(count);
        }
        count
    }

    pub(crate) fn stats(&self) -> PoolStats {
        let members = self.members.lock();
        let active = members.list.iter().filter(|m| m.in_use).count();
        let total = members.list.len();
        PoolStats {
            total,
            active,
            idle: total - active,
            max_pool_size: self.config.max_pool_size,
            utilization_rate: active as f64 / self.config.max_pool_size as f64,
        }
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.members.lock().closed
    }
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub active: usize,
    pub idle: usize,
    pub max_pool_size: usize,
    /// `active / max_pool_size`, in `[0, 1]`.
    pub utilization_rate: f64,
}

/// A bounded pool of handles produced by a [`ConnectionFactory`].
///
/// Cloning is cheap and yields another reference to the same pool.
pub struct ResourcePool<F: ConnectionFactory> {
    pub(crate) shared: Arc<Shared<F::Handle>>,
    factory: Arc<F>,
}

impl<F: ConnectionFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            factory: Arc::clone(&self.factory),
        }
    }
}

impl<F: ConnectionFactory> fmt::Debug for ResourcePool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourcePool")
            .field("config", &self.shared.config)
            .field("stats", &self.stats())
            .finish()
    }
}

impl<F: ConnectionFactory> ResourcePool<F> {
    /// Creates an empty pool. Members are created lazily on acquire.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;
        info!(
            max_pool_size = config.max_pool_size,
            max_idle_time_ms = config.max_idle_time.as_millis() as u64,
            max_lifetime_ms = config.max_lifetime.as_millis() as u64,
            max_wait_time_ms = config.max_wait_time.as_millis() as u64,
            "Creating connection pool"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                members: Mutex::new(Members {
                    list: Vec::new(),
                    next_id: 0,
                    closed: false,
                }),
                available: Notify::new(),
            }),
            factory: Arc::new(factory),
        })
    }

    pub fn config(&self) -> &PoolConfig {
        &self.shared.config
    }

    /// Checks out a handle.
    ///
    /// Reuses an idle member if there is one, otherwise creates a new member
    /// when below capacity. On a saturated pool the caller waits for a
    /// release and fails with [`PoolError::ResourceTimeout`] once
    /// `max_wait_time` elapses.
    pub async fn acquire(&self) -> Result<PooledConnection<F::Handle>> {
        let started = Instant::now();
        let deadline = started + self.shared.config.max_wait_time;

        loop {
            let notified = self.shared.available.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a release in between is not lost.
            notified.as_mut().enable();

            match self.shared.try_claim()? {
                Claim::Idle { id, handle } => {
                    metrics::record_acquire_duration(started.elapsed());
                    return Ok(PooledConnection::new(Arc::clone(&self.shared), id, handle));
                }
                Claim::Reserved { id } => {
                    let conn = self.create_member(id).await?;
                    metrics::record_acquire_duration(started.elapsed());
                    return Ok(conn);
                }
                Claim::Saturated => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        let waited = started.elapsed();
                        metrics::record_acquire_timeout();
                        warn!(
                            waited_ms = waited.as_millis() as u64,
                            max_pool_size = self.shared.config.max_pool_size,
                            "Timed out waiting for a pooled connection"
                        );
                        return Err(PoolError::ResourceTimeout {
                            waited,
                            max_pool_size: self.shared.config.max_pool_size,
                        });
                    }
                }
            }
        }
    }

    async fn create_member(&self, id: u64) -> Result<PooledConnection<F::Handle>> {
        let reservation = Reservation {
            shared: &self.shared,
            id,
            armed: true,
        };

        match self.factory.connect().await {
            Ok(handle) => {
                if self.shared.is_closed() {
                    // The armed reservation releases the slot.
                    drop(handle);
                    debug!(member_id = id, "Pool closed while connecting");
                    return Err(PoolError::Closed);
                }
                reservation.disarm();
                debug!(member_id = id, "Created pooled connection");
                Ok(PooledConnection::new(Arc::clone(&self.shared), id, handle))
            }
            Err(source) => {
                drop(reservation);
                metrics::record_factory_failure();
                warn!(member_id = id, error = %source, "Connection factory failed");
                Err(PoolError::FactoryFailure { source })
            }
        }
    }

    /// Returns a handle to the pool.
    ///
    /// Equivalent to dropping the guard; provided for call sites that want
    /// the check-in to be explicit.
    pub fn release(&self, conn: PooledConnection<F::Handle>) {
        drop(conn);
    }

    /// Removes idle members past `max_idle_time` or `max_lifetime`.
    ///
    /// Checked-out members are never touched. Returns the number removed.
    pub fn cleanup_idle_connections(&self) -> usize {
        self.shared.reap()
    }

    pub fn stats(&self) -> PoolStats {
        self.shared.stats()
    }

    /// Closes the pool.
    ///
    /// Idle handles are dropped immediately, waiters fail with
    /// [`PoolError::Closed`] and handles still checked out are dropped when
    /// their guards are released.
    pub fn close(&self) {
        let drained = {
            let mut members = self.shared.members.lock();
            members.closed = true;
            std::mem::take(&mut members.list)
        };
        info!(members = drained.len(), "Closing all pooled connections");
        drop(drained);
        self.shared.available.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Removes a reserved slot unless the factory call completed.
struct Reservation<'a, H> {
    shared: &'a Shared<H>,
    id: u64,
    armed: bool,
}

impl<H> Reservation<'_, H> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<H> Drop for Reservation<'_, H> {
    fn drop(&mut self) {
        if self.armed {
            self.shared.forget(self.id);
        }
    }
}

/// A checked-out handle. Returns itself to the pool when dropped.
pub struct PooledConnection<H> {
    shared: Arc<Shared<H>>,
    id: u64,
    /// Taken exactly once, in `Drop`.
    handle: ManuallyDrop<H>,
}

impl<H> PooledConnection<H> {
    fn new(shared: Arc<Shared<H>>, id: u64, handle: H) -> Self {
        Self {
            shared,
            id,
            handle: ManuallyDrop::new(handle),
        }
    }

    /// Identifier of the pool member this handle belongs to.
    pub fn member_id(&self) -> u64 {
        self.id
    }
}

impl<H> Deref for PooledConnection<H> {
    type Target = H;

    fn deref(&self) -> &H {
        &self.handle
    }
}

impl<H> DerefMut for PooledConnection<H> {
    fn deref_mut(&mut self) -> &mut H {
        &mut self.handle
    }
}

impl<H> Drop for PooledConnection<H> {
    fn drop(&mut self) {
        // SAFETY: `handle` is never touched again after this point.
        let handle = unsafe { ManuallyDrop::take(&mut self.handle) };
        self.shared.check_in(self.id, handle);
    }
}

impl<H> fmt::Debug for PooledConnection<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("member_id", &self.id)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::factory::{FnFactory, factory_fn};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct TestConn {
        serial: usize,
    }

    fn counting_factory(
        created: Arc<AtomicUsize>,
    ) -> FnFactory<impl Fn() -> std::future::Ready<std::result::Result<TestConn, BoxError>> + Send + Sync + 'static>
    {
        factory_fn(move || {
            let serial = created.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok(TestConn { serial }))
        })
    }

    fn pool_with(
        config: PoolConfig,
    ) -> (
        ResourcePool<impl ConnectionFactory<Handle = TestConn>>,
        Arc<AtomicUsize>,
    ) {
        let created = Arc::new(AtomicUsize::new(0));
        let pool = ResourcePool::new(counting_factory(created.clone()), config).unwrap();
        (pool, created)
    }

    fn failing_factory() -> FnFactory<
        impl Fn() -> std::future::Ready<std::result::Result<TestConn, BoxError>> + Send + Sync + 'static,
    > {
        factory_fn(|| std::future::ready(Err::<TestConn, BoxError>("connection refused".into())))
    }

    #[tokio::test]
    async fn test_acquire_creates_then_reuses() {
        let (pool, created) = pool_with(PoolConfig::default());

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.serial, 0);
        let first_id = conn.member_id();
        pool.release(conn);

        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.member_id(), first_id);
        assert_eq!(conn.serial, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stats_reflect_checkouts() {
        let (pool, _) = pool_with(PoolConfig::default().with_max_pool_size(4));

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        drop(b);

        let stats = pool.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.idle, 1);
        assert_eq!(stats.max_pool_size, 4);
        assert!((stats.utilization_rate - 0.25).abs() < f64::EPSILON);

        drop(a);
        assert_eq!(pool.stats().active, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_pool_times_out() {
        let (pool, _) = pool_with(
            PoolConfig::default()
                .with_max_pool_size(1)
                .with_max_wait_time(Duration::from_millis(100)),
        );

        let _held = pool.acquire().await.unwrap();
        let started = Instant::now();
        let err = pool.acquire().await.unwrap_err();

        assert!(err.is_timeout());
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(100));
        assert!(waited < Duration::from_millis(150));
        assert_eq!(pool.stats().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_waiter_is_woken_by_release() {
        let (pool, created) = pool_with(
            PoolConfig::default()
                .with_max_pool_size(1)
                .with_max_wait_time(Duration::from_secs(5)),
        );

        let held = pool.acquire().await.unwrap();
        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.serial) })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        drop(held);

        let serial = waiter.await.unwrap().unwrap();
        assert_eq!(serial, 0);
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_factory_failure_does_not_grow_pool() {
        let pool = ResourcePool::new(failing_factory(), PoolConfig::default()).unwrap();

        let err = pool.acquire().await.unwrap_err();
        assert!(err.is_factory_failure());
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_reaps_idle_members() {
        let (pool, _) = pool_with(
            PoolConfig::default().with_max_idle_time(Duration::from_millis(50)),
        );

        let conn = pool.acquire().await.unwrap();
        drop(conn);
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(pool.cleanup_idle_connections(), 1);
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_keeps_checked_out_members() {
        let (pool, _) = pool_with(
            PoolConfig::default()
                .with_max_idle_time(Duration::from_millis(50))
                .with_max_lifetime(Duration::from_millis(60)),
        );

        let _conn = pool.acquire().await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;

        assert_eq!(pool.cleanup_idle_connections(), 0);
        assert_eq!(pool.stats().total, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_reaps_members_past_lifetime() {
        let (pool, created) = pool_with(
            PoolConfig::default()
                .with_max_idle_time(Duration::from_secs(60))
                .with_max_lifetime(Duration::from_secs(1)),
        );

        // Keep the member busy so its idle time stays short.
        for _ in 0..3 {
            let conn = pool.acquire().await.unwrap();
            tokio::time::sleep(Duration::from_millis(400)).await;
            drop(conn);
        }

        assert_eq!(pool.cleanup_idle_connections(), 1);
        let conn = pool.acquire().await.unwrap();
        assert_eq!(conn.serial, 1);
        assert_eq!(created.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_closed_pool_rejects_acquire() {
        let (pool, _) = pool_with(PoolConfig::default());
        let checked_out = pool.acquire().await.unwrap();
        let idle = pool.acquire().await.unwrap();
        drop(idle);

        pool.close();
        assert!(pool.is_closed());
        assert!(matches!(pool.acquire().await, Err(PoolError::Closed)));

        // Release after close is a no-op.
        drop(checked_out);
        assert_eq!(pool.stats().total, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_wakes_waiters() {
        let (pool, _) = pool_with(PoolConfig::default().with_max_pool_size(1));
        let _held = pool.acquire().await.unwrap();

        let waiter = {
            let pool = pool.clone();
            tokio::spawn(async move { pool.acquire().await.map(|c| c.member_id()) })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        pool.close();

        assert!(matches!(waiter.await.unwrap(), Err(PoolError::Closed)));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let created = Arc::new(AtomicUsize::new(0));
        let result = ResourcePool::new(
            counting_factory(created),
            PoolConfig::default().with_max_pool_size(0),
        );
        assert!(matches!(result, Err(PoolError::InvalidConfig { .. })));
    }
}
