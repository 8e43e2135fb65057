use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Duration;

use futures_core::future::BoxFuture;

use crate::error::Error;
use crate::options::PgConnectOptions;
use crate::pool::PgPool;
use crate::PgConnection;

pub(crate) type AfterConnectFn =
    dyn for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<(), Error>> + Send + Sync;

/// Configuration for a [`PgPool`].
#[derive(Clone)]
pub struct PoolOptions {
    pub(crate) min_connections: u32,
    pub(crate) max_connections: u32,
    pub(crate) acquire_timeout: Duration,
    pub(crate) idle_timeout: Option<Duration>,
    pub(crate) max_lifetime: Option<Duration>,
    pub(crate) test_before_acquire: bool,
    pub(crate) after_connect: Option<Arc<AfterConnectFn>>,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl PoolOptions {
    pub fn new() -> Self {
        PoolOptions {
            min_connections: 0,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            idle_timeout: Some(Duration::from_secs(10 * 60)),
            max_lifetime: Some(Duration::from_secs(30 * 60)),
            test_before_acquire: false,
            after_connect: None,
        }
    }

    /// Connections the pool keeps open even when idle.
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// The hard upper bound on open connections, counting connections being
    /// established.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    /// How long [`acquire`][PgPool::acquire] waits before failing with
    /// [`Error::PoolTimedOut`].
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Idle connections older than this are closed instead of reused.
    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Connections older than this are closed at the next opportunity.
    pub fn max_lifetime(mut self, lifetime: Option<Duration>) -> Self {
        self.max_lifetime = lifetime;
        self
    }

    /// Probe liveness with a protocol round-trip before handing a pooled
    /// connection out.
    pub fn test_before_acquire(mut self, test: bool) -> Self {
        self.test_before_acquire = test;
        self
    }

    /// Run a hook on every newly established connection before it is used,
    /// e.g. to set a `search_path` or register codecs.
    pub fn after_connect<F>(mut self, hook: F) -> Self
    where
        F: for<'c> Fn(&'c mut PgConnection) -> BoxFuture<'c, Result<(), Error>>
            + Send
            + Sync
            + 'static,
    {
        self.after_connect = Some(Arc::new(hook));
        self
    }

    /// Build the pool and open `min_connections` eagerly.
    pub async fn connect(self, url: &str) -> Result<PgPool, Error> {
        self.connect_with(url.parse()?).await
    }

    /// Build the pool with explicit connection options.
    pub async fn connect_with(self, options: PgConnectOptions) -> Result<PgPool, Error> {
        PgPool::new_with(options, self).await
    }
}

impl Debug for PoolOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("min_connections", &self.min_connections)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("idle_timeout", &self.idle_timeout)
            .field("max_lifetime", &self.max_lifetime)
            .field("test_before_acquire", &self.test_before_acquire)
            .field("after_connect", &self.after_connect.as_ref().map(|_| "<hook>"))
            .finish()
    }
}
