use std::cmp;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Poll, Waker};
use std::time::{Duration, Instant};

use crossbeam_queue::SegQueue;
use futures_util::future;

use crate::error::Error;
use crate::pool::options::PoolOptions;
use crate::options::PgConnectOptions;
use crate::types::SharedTypeCache;
use crate::PgConnection;

pub(super) struct PoolInner {
    pub(super) connect_options: PgConnectOptions,
    pub(super) options: PoolOptions,

    /// Idle connections, most recently released last. Reuse pops from the
    /// back: the warmest connection has the warmest caches.
    idle: Mutex<Vec<Idle>>,

    /// Tasks waiting for a connection, woken in arrival order.
    waiters: SegQueue<Waker>,

    /// Open plus in-flight connection count; never exceeds
    /// `options.max_connections`.
    size: AtomicU32,

    is_closed: AtomicBool,

    /// Introspected type information shared by all connections of this pool.
    pub(super) shared_types: Arc<SharedTypeCache>,
}

pub(super) struct Live {
    pub(super) conn: PgConnection,
    pub(super) created: Instant,
}

struct Idle {
    live: Live,
    since: Instant,
}

impl PoolInner {
    pub(super) fn new(connect_options: PgConnectOptions, options: PoolOptions) -> Arc<Self> {
        let pool = Arc::new(PoolInner {
            connect_options,
            options,
            idle: Mutex::new(Vec::new()),
            waiters: SegQueue::new(),
            size: AtomicU32::new(0),
            is_closed: AtomicBool::new(false),
            shared_types: Arc::new(SharedTypeCache::default()),
        });

        spawn_reaper(&pool);

        pool
    }

    pub(super) fn size(&self) -> u32 {
        self.size.load(Ordering::Acquire)
    }

    pub(super) fn num_idle(&self) -> usize {
        self.idle.lock().expect("pool lock poisoned").len()
    }

    pub(super) fn is_closed(&self) -> bool {
        self.is_closed.load(Ordering::Acquire)
    }

    fn wake_one(&self) {
        if let Some(waker) = self.waiters.pop() {
            waker.wake();
        }
    }

    /// Pop the most recently used idle connection.
    fn pop_idle(&self) -> Option<Idle> {
        self.idle.lock().expect("pool lock poisoned").pop()
    }

    fn push_idle(&self, live: Live) {
        self.idle.lock().expect("pool lock poisoned").push(Idle {
            live,
            since: Instant::now(),
        });

        self.wake_one();
    }

    /// Release the size slot of a connection detached from the pool.
    pub(super) fn detach_permit(&self) {
        self.decrement_size();
    }

    /// Account for a connection leaving the pool entirely.
    fn decrement_size(&self) {
        self.size.fetch_sub(1, Ordering::AcqRel);
        self.wake_one();
    }

    /// Reserve a size slot for a new connection, unless at capacity.
    fn try_increment_size(&self) -> bool {
        let mut size = self.size();

        while size < self.options.max_connections {
            match self.size.compare_exchange(
                size,
                size + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(new_size) => size = new_size,
            }
        }

        false
    }

    pub(super) async fn acquire(self: &Arc<Self>) -> Result<Live, Error> {
        let deadline = Instant::now() + self.options.acquire_timeout;

        while !self.is_closed() {
            // fast path: reuse an idle connection
            while let Some(idle) = self.pop_idle() {
                match self.check_idle(idle).await {
                    Some(live) => return Ok(live),
                    // expired or dead; its slot was released, keep looking
                    None => continue,
                }
            }

            // no idle connection; open a new one if a slot is free
            if self.try_increment_size() {
                match self.connect(deadline).await {
                    Ok(live) => return Ok(live),
                    Err(error) => {
                        self.decrement_size();
                        return Err(error);
                    }
                }
            }

            // the pool is at capacity; wait for a release or a free slot
            self.wait_for_conn(deadline).await?;
        }

        Err(Error::PoolClosed)
    }

    pub(super) fn try_acquire(self: &Arc<Self>) -> Option<Live> {
        if self.is_closed() {
            return None;
        }

        // no liveness or expiry checks without an async context; the
        // reaper covers expiry in the background
        self.pop_idle().map(|idle| idle.live)
    }

    async fn check_idle(&self, idle: Idle) -> Option<Live> {
        if self.is_beyond_lifetime(&idle.live) || self.is_beyond_idle(&idle) {
            self.close_connection(idle.live).await;
            return None;
        }

        let mut live = idle.live;

        if self.options.test_before_acquire {
            if let Err(error) = live.conn.ping().await {
                log::info!(
                    target: "pglane::pool",
                    "ping of idle connection failed, discarding: {error}"
                );

                self.decrement_size();
                return None;
            }
        }

        Some(live)
    }

    fn is_beyond_lifetime(&self, live: &Live) -> bool {
        self.options
            .max_lifetime
            .is_some_and(|max| live.created.elapsed() > max)
    }

    fn is_beyond_idle(&self, idle: &Idle) -> bool {
        let idle_timeout = match (
            self.options.idle_timeout,
            self.connect_options.max_inactive_connection_lifetime,
        ) {
            (Some(a), Some(b)) => Some(cmp::min(a, b)),
            (a, b) => a.or(b),
        };

        idle_timeout.is_some_and(|max| idle.since.elapsed() > max)
    }

    async fn connect(self: &Arc<Self>, deadline: Instant) -> Result<Live, Error> {
        let timeout = deadline
            .checked_duration_since(Instant::now())
            .ok_or(Error::PoolTimedOut)?;

        let mut conn = tokio::time::timeout(
            timeout,
            PgConnection::connect_with(&self.connect_options),
        )
        .await
        .map_err(|_| Error::PoolTimedOut)??;

        conn.shared_types = Some(Arc::clone(&self.shared_types));

        if let Some(hook) = &self.options.after_connect {
            if let Err(error) = hook(&mut conn).await {
                let _ = conn.close_in_place().await;
                return Err(error);
            }
        }

        Ok(Live {
            conn,
            created: Instant::now(),
        })
    }

    /// Park until an idle connection is pushed or a size slot frees up.
    async fn wait_for_conn(&self, deadline: Instant) -> Result<(), Error> {
        let timeout = deadline
            .checked_duration_since(Instant::now())
            .ok_or(Error::PoolTimedOut)?;

        let mut pushed = false;

        tokio::time::timeout(
            timeout,
            future::poll_fn(|cx| {
                if pushed {
                    Poll::Ready(())
                } else {
                    self.waiters.push(cx.waker().clone());
                    pushed = true;
                    Poll::Pending
                }
            }),
        )
        .await
        .map_err(|_| Error::PoolTimedOut)
    }

    /// Return a connection to the pool, verifying it is safe to reuse.
    pub(super) fn release(self: &Arc<Self>, mut live: Live) {
        // notification routing belongs to the previous holder
        live.conn.stream.notifications = None;

        if self.is_closed() {
            let pool = Arc::clone(self);
            spawn_or_drop(move || async move { pool.close_connection(live).await });
            return;
        }

        let clean = !live.conn.is_in_transaction()
            && live.conn.transaction_depth == 0
            && live.conn.pending_ready_for_query == 0
            && live.conn.check_open().is_ok();

        if clean {
            self.push_idle(live);
            return;
        }

        // the connection needs asynchronous repair (rollback, drain) before
        // it can be reused; do it off to the side
        let pool = Arc::clone(self);

        spawn_or_drop(move || async move {
            match pool.repair(live).await {
                Some(live) => pool.push_idle(live),
                None => {}
            }
        });
    }

    async fn repair(self: &Arc<Self>, mut live: Live) -> Option<Live> {
        if live.conn.check_open().is_err() {
            self.decrement_size();
            return None;
        }

        // unwind any transaction the holder left open
        if live.conn.is_in_transaction() || live.conn.transaction_depth > 0 {
            live.conn.transaction_depth = 0;

            if let Err(error) = live.conn.execute("ROLLBACK", &[]).await {
                log::warn!(
                    target: "pglane::pool",
                    "rolling back returned connection failed, discarding: {error}"
                );

                self.close_connection(live).await;
                return None;
            }
        }

        if live.conn.wait_until_ready().await.is_err() {
            self.decrement_size();
            return None;
        }

        Some(live)
    }

    async fn close_connection(&self, live: Live) {
        let _ = live.conn.close().await;
        self.decrement_size();
    }

    pub(super) async fn close(self: &Arc<Self>) {
        self.is_closed.store(true, Ordering::Release);

        // fail everyone currently waiting
        while let Some(waker) = self.waiters.pop() {
            waker.wake();
        }

        loop {
            let idle = { self.idle.lock().expect("pool lock poisoned").pop() };

            match idle {
                Some(idle) => self.close_connection(idle.live).await,
                None => break,
            }
        }
    }

    pub(super) async fn fill_to_min(self: &Arc<Self>) -> Result<(), Error> {
        for _ in 0..self.options.min_connections {
            if !self.try_increment_size() {
                break;
            }

            let deadline = Instant::now() + self.options.acquire_timeout;

            match self.connect(deadline).await {
                Ok(live) => self.push_idle(live),
                Err(error) => {
                    self.decrement_size();
                    return Err(error);
                }
            }
        }

        Ok(())
    }
}

/// Spawn the task if a runtime is available; connections released while the
/// runtime is shutting down are simply dropped.
fn spawn_or_drop<F, Fut>(f: F)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(f());
    }
}

/// Periodically sweep expired idle connections, keeping `min_connections`
/// around.
fn spawn_reaper(pool: &Arc<PoolInner>) {
    let period = match (pool.options.max_lifetime, pool.options.idle_timeout) {
        (Some(a), Some(b)) => cmp::min(a, b),
        (Some(period), None) | (None, Some(period)) => period,
        (None, None) => return,
    };

    let period = cmp::max(period / 2, Duration::from_secs(1));
    let pool = Arc::clone(pool);

    tokio::spawn(async move {
        while !pool.is_closed() {
            let max_reaped = pool
                .size()
                .saturating_sub(pool.options.min_connections);

            let mut keep = Vec::new();
            let mut reap = Vec::new();

            {
                let mut idle = pool.idle.lock().expect("pool lock poisoned");

                while let Some(candidate) = idle.pop() {
                    if reap.len() < max_reaped as usize
                        && (pool.is_beyond_lifetime(&candidate.live)
                            || pool.is_beyond_idle(&candidate))
                    {
                        reap.push(candidate);
                    } else {
                        keep.push(candidate);
                    }
                }

                // preserve LIFO order for the survivors
                keep.reverse();
                idle.append(&mut keep);
            }

            for idle in reap {
                pool.close_connection(idle.live).await;
            }

            tokio::time::sleep(period).await;
        }
    });
}
