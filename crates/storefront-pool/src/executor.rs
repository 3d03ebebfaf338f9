//! Scoped query execution against pooled handles.

use futures_util::future::try_join_all;
use tracing::instrument;

use crate::error::PoolError;
use crate::factory::ConnectionFactory;
use crate::pool::{PoolStats, ResourcePool};

/// Runs units of work against handles checked out of a [`ResourcePool`].
///
/// Every method releases its handle on all exit paths: normal return, error,
/// panic, or cancellation of the returned future. No retries are performed;
/// the error from `work` (or from the pool) goes straight back to the caller.
pub struct QueryExecutor<F: ConnectionFactory> {
    pool: ResourcePool<F>,
}

impl<F: ConnectionFactory> Clone for QueryExecutor<F> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
        }
    }
}

impl<F: ConnectionFactory> QueryExecutor<F> {
    pub fn new(pool: ResourcePool<F>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &ResourcePool<F> {
        &self.pool
    }

    /// Acquires a handle, runs `work` with it and releases it.
    #[instrument(skip_all, level = "debug")]
    pub async fn execute_query<T, E>(
        &self,
        work: impl AsyncFnOnce(&F::Handle) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<PoolError>,
    {
        let conn = self.pool.acquire().await?;
        let result = work(&*conn).await;
        self.pool.release(conn);
        result
    }

    /// Runs every unit of work concurrently against a single checkout.
    ///
    /// One handle is shared by all units, trading parallelism for fewer pool
    /// checkouts. Results come back in input order; the first failure wins
    /// and the remaining units are dropped.
    #[instrument(skip_all, fields(works = works.len()), level = "debug")]
    pub async fn execute_queries<T, E, W>(&self, works: Vec<W>) -> Result<Vec<T>, E>
    where
        W: AsyncFn(&F::Handle) -> Result<T, E>,
        E: From<PoolError>,
    {
        let conn = self.pool.acquire().await?;
        let handle: &F::Handle = &conn;
        let result = try_join_all(works.iter().map(|work| async move { work(handle).await })).await;
        self.pool.release(conn);
        result
    }

    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn cleanup_idle_connections(&self) -> usize {
        self.pool.cleanup_idle_connections()
    }

    pub fn close_all(&self) {
        self.pool.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PoolConfig;
    use crate::error::BoxError;
    use crate::factory::factory_fn;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Debug)]
    struct FakeClient {
        calls: AtomicUsize,
    }

    #[derive(Debug, thiserror::Error)]
    enum QueryError {
        #[error(transparent)]
        Pool(#[from] PoolError),
        #[error("query failed: {0}")]
        Query(String),
    }

    fn executor(max_pool_size: usize) -> QueryExecutor<impl ConnectionFactory<Handle = FakeClient>> {
        let pool = ResourcePool::new(
            factory_fn(|| async {
                Ok::<_, BoxError>(FakeClient {
                    calls: AtomicUsize::new(0),
                })
            }),
            PoolConfig::default()
                .with_max_pool_size(max_pool_size)
                .with_max_wait_time(Duration::from_millis(100)),
        )
        .unwrap();
        QueryExecutor::new(pool)
    }

    #[tokio::test]
    async fn test_execute_query_releases_on_success() {
        let exec = executor(1);

        let value = exec
            .execute_query(async |client: &FakeClient| {
                client.calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, QueryError>(42)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(exec.stats().active, 0);
        assert_eq!(exec.stats().idle, 1);
    }

    #[tokio::test]
    async fn test_execute_query_releases_on_error() {
        let exec = executor(1);

        let err = exec
            .execute_query(async |_client: &FakeClient| {
                Err::<u32, _>(QueryError::Query("relation does not exist".into()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Query(_)));
        assert_eq!(exec.stats().active, 0);

        // The single slot is free again.
        let value = exec
            .execute_query(async |_client: &FakeClient| Ok::<_, QueryError>("ok"))
            .await
            .unwrap();
        assert_eq!(value, "ok");
    }

    #[tokio::test]
    async fn test_execute_query_surfaces_pool_timeout() {
        let exec = executor(1);
        let _held = exec.pool().acquire().await.unwrap();

        let err = exec
            .execute_query(async |_client: &FakeClient| Ok::<_, QueryError>(()))
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Pool(PoolError::ResourceTimeout { .. })));
    }

    #[tokio::test]
    async fn test_execute_queries_shares_one_checkout() {
        let exec = executor(4);

        let works: Vec<_> = (1..=5u32)
            .map(|n| async move |client: &FakeClient| {
                client.calls.fetch_add(1, Ordering::SeqCst);
                tokio::task::yield_now().await;
                Ok::<_, QueryError>(n * 10)
            })
            .collect();

        let results = exec.execute_queries(works).await.unwrap();
        assert_eq!(results, vec![10, 20, 30, 40, 50]);

        let stats = exec.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.active, 0);

        let calls = exec
            .execute_query(async |client: &FakeClient| {
                Ok::<_, QueryError>(client.calls.load(Ordering::SeqCst))
            })
            .await
            .unwrap();
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_execute_queries_returns_first_failure() {
        let exec = executor(2);

        let works: Vec<_> = (0..3u32)
            .map(|n| async move |_client: &FakeClient| {
                if n == 1 {
                    Err(QueryError::Query(format!("work {n} failed")))
                } else {
                    Ok(n)
                }
            })
            .collect();

        let err = exec.execute_queries(works).await.unwrap_err();
        assert_eq!(err.to_string(), "query failed: work 1 failed");
        assert_eq!(exec.stats().active, 0);
    }
}
