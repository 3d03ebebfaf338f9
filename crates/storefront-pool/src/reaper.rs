//! Periodic idle/lifetime sweep.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::factory::ConnectionFactory;
use crate::metrics;
use crate::pool::ResourcePool;

impl<F: ConnectionFactory> ResourcePool<F> {
    /// Spawns a background task running
    /// [`cleanup_idle_connections`](ResourcePool::cleanup_idle_connections)
    /// every `every`.
    ///
    /// The task only holds a weak reference: it stops once the pool is closed
    /// or every clone of it has been dropped. Sweeps never overlap because
    /// they run sequentially on one task.
    pub fn spawn_reaper(&self, every: Duration) -> JoinHandle<()> {
        let shared = Arc::downgrade(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(shared) = shared.upgrade() else {
                    break;
                };
                if shared.is_closed() {
                    break;
                }
                shared.reap();
                metrics::record_pool_stats(&shared.stats());
            }
            debug!("Pool reaper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::config::PoolConfig;
    use crate::error::BoxError;
    use crate::factory::factory_fn;
    use crate::pool::ResourcePool;
    use std::time::Duration;

    fn pool(max_idle: Duration) -> ResourcePool<impl crate::ConnectionFactory<Handle = u32>> {
        ResourcePool::new(
            factory_fn(|| std::future::ready(Ok::<u32, BoxError>(7))),
            PoolConfig::default().with_max_idle_time(max_idle),
        )
        .unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_sweeps_on_interval() {
        let pool = pool(Duration::from_secs(1));
        let reaper = pool.spawn_reaper(Duration::from_secs(5));

        drop(pool.acquire().await.unwrap());
        assert_eq!(pool.stats().total, 1);

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(pool.stats().total, 0);
        assert!(!reaper.is_finished());
        reaper.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_when_pool_dropped() {
        let pool = pool(Duration::from_secs(1));
        let reaper = pool.spawn_reaper(Duration::from_secs(1));
        drop(pool);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(reaper.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_when_pool_closed() {
        let pool = pool(Duration::from_secs(1));
        let reaper = pool.spawn_reaper(Duration::from_secs(1));
        pool.close();

        tokio::time::timeout(Duration::from_secs(3), reaper)
            .await
            .expect("reaper should stop")
            .unwrap();
    }
}
