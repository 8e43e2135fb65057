use std::fmt::{self, Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use crate::error::Error;
use crate::options::PgConnectOptions;
use crate::row::PgRow;
use crate::types::PgValue;
use crate::PgConnection;

mod inner;
mod options;

pub use options::PoolOptions;

use inner::{Live, PoolInner};

/// A bounded pool of PostgreSQL connections.
///
/// Cloning is cheap and shares the same pool. At any instant a connection is
/// held by at most one caller; [`acquire`][PgPool::acquire] blocks once
/// `max_connections` are out, waking waiters in arrival order.
#[derive(Clone)]
pub struct PgPool(Arc<PoolInner>);

impl PgPool {
    /// Create a pool with default options for the given connection string.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        PoolOptions::new().connect(url).await
    }

    /// Create a pool with default pool options and explicit connection
    /// options.
    pub async fn connect_with(options: PgConnectOptions) -> Result<Self, Error> {
        PoolOptions::new().connect_with(options).await
    }

    pub(crate) async fn new_with(
        connect_options: PgConnectOptions,
        pool_options: PoolOptions,
    ) -> Result<Self, Error> {
        let inner = PoolInner::new(connect_options, pool_options);

        inner.fill_to_min().await?;

        Ok(PgPool(inner))
    }

    /// Borrow a connection, opening a new one when under capacity, waiting
    /// otherwise.
    pub async fn acquire(&self) -> Result<PoolConnection, Error> {
        self.0.acquire().await.map(|live| PoolConnection {
            live: Some(live),
            pool: Arc::clone(&self.0),
        })
    }

    /// Borrow a connection only if one is idle right now.
    pub fn try_acquire(&self) -> Option<PoolConnection> {
        self.0.try_acquire().map(|live| PoolConnection {
            live: Some(live),
            pool: Arc::clone(&self.0),
        })
    }

    /// Close the pool: fail waiters, close idle connections, and close
    /// borrowed connections as they come back.
    pub async fn close(&self) {
        self.0.close().await;
    }

    pub fn is_closed(&self) -> bool {
        self.0.is_closed()
    }

    /// Connections currently open or being opened.
    pub fn size(&self) -> u32 {
        self.0.size()
    }

    /// Connections currently idle in the pool.
    pub fn num_idle(&self) -> usize {
        self.0.num_idle()
    }

    /// Acquire a connection and run a single statement on it.
    pub async fn execute(
        &self,
        sql: &str,
        args: &[PgValue],
    ) -> Result<crate::PgQueryResult, Error> {
        self.acquire().await?.execute(sql, args).await
    }

    /// Acquire a connection and buffer a query's rows through it.
    pub async fn fetch(&self, sql: &str, args: &[PgValue]) -> Result<Vec<PgRow>, Error> {
        self.acquire().await?.fetch(sql, args).await
    }

    /// Acquire a connection and return the query's first row.
    pub async fn fetch_row(&self, sql: &str, args: &[PgValue]) -> Result<Option<PgRow>, Error> {
        self.acquire().await?.fetch_row(sql, args).await
    }

    /// Acquire a connection and return the first column of the first row.
    pub async fn fetch_val(&self, sql: &str, args: &[PgValue]) -> Result<PgValue, Error> {
        self.acquire().await?.fetch_val(sql, args).await
    }
}

impl Debug for PgPool {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgPool")
            .field("size", &self.size())
            .field("num_idle", &self.num_idle())
            .field("is_closed", &self.is_closed())
            .finish()
    }
}

/// A connection borrowed from a [`PgPool`].
///
/// Dereferences to [`PgConnection`]; returns to the pool on drop, after the
/// pool verified it is safe to reuse (no open transaction, no unread
/// responses).
pub struct PoolConnection {
    live: Option<Live>,
    pool: Arc<PoolInner>,
}

impl PoolConnection {
    /// Take the connection out of the pool permanently; the pool regains
    /// the slot.
    pub fn detach(mut self) -> PgConnection {
        let live = self.live.take().expect("connection already detached");
        self.pool.detach_permit();

        live.conn
    }
}

impl Deref for PoolConnection {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        &self.live.as_ref().expect("connection already detached").conn
    }
}

impl DerefMut for PoolConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.live.as_mut().expect("connection already detached").conn
    }
}

impl Drop for PoolConnection {
    fn drop(&mut self) {
        if let Some(live) = self.live.take() {
            self.pool.release(live);
        }
    }
}

impl Debug for PoolConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolConnection").finish_non_exhaustive()
    }
}
