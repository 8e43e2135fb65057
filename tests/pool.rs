//! Pool capacity, reuse, fairness, and timeouts.

mod support;

use std::time::{Duration, Instant};

use pglane::{Error, PoolOptions};
use support::*;

/// Accept connections forever, serving each with generic replies.
fn spawn_server(server: MockServer) {
    tokio::spawn(async move {
        loop {
            let mut stream = server.accept().await;

            tokio::spawn(async move {
                handshake(&mut stream).await;
                serve_generic(stream).await;
            });
        }
    });
}

#[tokio::test]
async fn capacity_is_bounded_and_all_acquirers_succeed() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .unwrap();

    let start = Instant::now();
    let mut tasks = Vec::new();

    for _ in 0..3 {
        let pool = pool.clone();

        tasks.push(tokio::spawn(async move {
            let conn = pool.acquire().await?;
            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(conn);

            Ok::<_, Error>(())
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    // two can hold concurrently; the third had to wait for a release
    assert!(start.elapsed() >= Duration::from_millis(200));
    assert!(pool.size() <= 2);
}

#[tokio::test]
async fn idle_connections_are_reused_most_recent_first() {
    let server = MockServer::bind().await;
    let url = server.url();

    // number each backend so connections are distinguishable
    tokio::spawn(async move {
        let mut next_pid = 100;

        loop {
            let mut stream = server.accept().await;
            let pid = next_pid;
            next_pid += 1;

            tokio::spawn(async move {
                handshake_with_pid(&mut stream, pid).await;
                serve_generic(stream).await;
            });
        }
    });

    let pool = PoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap();

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();

    let pid_a = a.server_process_id();
    let pid_b = b.server_process_id();
    assert_ne!(pid_a, pid_b);

    // release `a` first, `b` second; LIFO reuse hands `b` back first
    drop(a);
    drop(b);

    let next = pool.acquire().await.unwrap();
    assert_eq!(next.server_process_id(), pid_b);

    let then = pool.acquire().await.unwrap();
    assert_eq!(then.server_process_id(), pid_a);

    assert_eq!(pool.size(), 2);
}

#[tokio::test]
async fn acquire_times_out_when_pool_is_exhausted() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_millis(100))
        .connect(&url)
        .await
        .unwrap();

    let held = pool.acquire().await.unwrap();

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, Error::PoolTimedOut));

    drop(held);
}

#[tokio::test]
async fn closed_pool_rejects_acquire() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new().connect(&url).await.unwrap();

    pool.close().await;

    assert!(pool.is_closed());
    assert!(matches!(pool.acquire().await.unwrap_err(), Error::PoolClosed));
}

#[tokio::test]
async fn released_transaction_is_rolled_back_before_reuse() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();

    {
        let mut conn = pool.acquire().await.unwrap();

        // leave a transaction open and return the connection
        conn.execute("BEGIN", &[]).await.unwrap();
        conn.transaction_depth();
    }

    // the pool repairs the connection off to the side; the next holder
    // must see a connection outside any transaction
    let conn = pool.acquire().await.unwrap();
    assert!(!conn.is_in_transaction());
}

#[tokio::test]
async fn min_connections_open_eagerly() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new()
        .min_connections(3)
        .max_connections(5)
        .connect(&url)
        .await
        .unwrap();

    assert_eq!(pool.size(), 3);
    assert_eq!(pool.num_idle(), 3);
}

#[tokio::test]
async fn after_connect_hook_runs_per_connection() {
    let server = MockServer::bind().await;
    let url = server.url();
    spawn_server(server);

    let pool = PoolOptions::new()
        .max_connections(2)
        .after_connect(|conn| {
            Box::pin(async move {
                conn.execute("SET search_path TO audit", &[]).await?;
                Ok(())
            })
        })
        .connect(&url)
        .await
        .unwrap();

    // the hook ran before the connection was handed out
    let conn = pool.acquire().await.unwrap();
    assert!(!conn.is_in_transaction());
}
