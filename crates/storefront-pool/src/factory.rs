//! Connection factories supplied at pool construction.

use std::future::Future;

use async_trait::async_trait;

use crate::error::BoxError;

/// Produces one backend handle per call.
///
/// The pool calls [`connect`](ConnectionFactory::connect) only when it is
/// below capacity and has no idle member to hand out. A failure is surfaced
/// to the acquiring caller as [`PoolError::FactoryFailure`](crate::PoolError).
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// The handle type this factory produces.
    type Handle: Send + 'static;

    /// Creates a new handle.
    async fn connect(&self) -> Result<Self::Handle, BoxError>;
}

/// Factory backed by an async closure. See [`factory_fn`].
pub struct FnFactory<F> {
    f: F,
}

/// Wraps a closure returning a future as a [`ConnectionFactory`].
///
/// ```ignore
/// let pool = ResourcePool::new(factory_fn(|| async { Ok(MyConn::open().await?) }), config)?;
/// ```
pub fn factory_fn<F, Fut, H>(f: F) -> FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<H, BoxError>> + Send,
    H: Send + 'static,
{
    FnFactory { f }
}

#[async_trait]
impl<F, Fut, H> ConnectionFactory for FnFactory<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<H, BoxError>> + Send,
    H: Send + 'static,
{
    type Handle = H;

    async fn connect(&self) -> Result<H, BoxError> {
        (self.f)().await
    }
}
