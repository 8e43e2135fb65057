//! Transactions, savepoints, and portal-based cursors.

mod support;

use pglane::{PgConnectOptions, PgConnection, PgValue};
use support::*;
use tokio::io::AsyncWriteExt;

async fn connect(server: &MockServer) -> PgConnection {
    let options: PgConnectOptions = server.url().parse().unwrap();
    PgConnection::connect_with(&options).await.unwrap()
}

async fn reply_command(stream: &mut tokio::net::TcpStream, tag: &str, status: u8) {
    let mut reply = command_complete(tag);
    reply.extend_from_slice(&ready_for_query(status));
    stream.write_all(&reply).await.unwrap();
}

#[tokio::test]
async fn cursor_requires_a_transaction() {
    let server = MockServer::bind().await;

    let client = async {
        let mut conn = connect(&server).await;

        let err = conn.cursor("SELECT 1", &[], 10).await.unwrap_err();
        assert!(matches!(err, pglane::Error::InvalidArgument(_)));
    };

    let (_, _stream) = tokio::join!(client, server.accept_and_handshake());
}

#[tokio::test]
async fn cursor_fetches_in_prefetch_batches() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // BEGIN
        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"BEGIN\0");
        reply_command(&mut stream, "BEGIN", b'T').await;

        // prepare the cursor's statement
        read_until(&mut stream, b'S').await;
        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[]));
        reply.extend_from_slice(&row_description(&[("n", 23)]));
        reply.extend_from_slice(&ready_for_query(b'T'));
        stream.write_all(&reply).await.unwrap();

        // bind to a named portal
        let bind = read_until(&mut stream, b'B').await;
        assert!(bind.starts_with(b"pglane_p_1\0pglane_s_1\0"));
        read_until(&mut stream, b'S').await;

        let mut reply = bind_complete();
        reply.extend_from_slice(&ready_for_query(b'T'));
        stream.write_all(&reply).await.unwrap();

        // first batch: two rows, portal suspended
        let execute = read_until(&mut stream, b'E').await;
        assert!(execute.starts_with(b"pglane_p_1\0"));
        assert_eq!(&execute[execute.len() - 4..], &2_u32.to_be_bytes());
        read_until(&mut stream, b'S').await;

        let mut reply = data_row_raw(&[Some(&1_i32.to_be_bytes())]);
        reply.extend_from_slice(&data_row_raw(&[Some(&2_i32.to_be_bytes())]));
        reply.extend_from_slice(&portal_suspended());
        reply.extend_from_slice(&ready_for_query(b'T'));
        stream.write_all(&reply).await.unwrap();

        // second batch: final row, portal exhausted
        read_until(&mut stream, b'E').await;
        read_until(&mut stream, b'S').await;

        let mut reply = data_row_raw(&[Some(&3_i32.to_be_bytes())]);
        reply.extend_from_slice(&command_complete("SELECT 3"));
        reply.extend_from_slice(&ready_for_query(b'T'));
        stream.write_all(&reply).await.unwrap();

        // COMMIT
        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"COMMIT\0");
        reply_command(&mut stream, "COMMIT", b'I').await;

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let mut tx = conn.begin().await.unwrap();

        {
            let mut cursor = tx.cursor("SELECT n FROM series", &[], 2).await.unwrap();

            let mut seen = Vec::new();
            while let Some(row) = cursor.next().await.unwrap() {
                seen.push(row.try_get(0).unwrap());
            }

            assert_eq!(
                seen,
                [PgValue::Int4(1), PgValue::Int4(2), PgValue::Int4(3)]
            );
        }

        tx.commit().await.unwrap();
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn dropped_transaction_queues_a_rollback() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"BEGIN\0");
        reply_command(&mut stream, "BEGIN", b'T').await;

        // dropping the transaction queues ROLLBACK; the ping flushes it
        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"ROLLBACK\0");
        reply_command(&mut stream, "ROLLBACK", b'I').await;

        read_until(&mut stream, b'S').await;
        stream
            .write_all(&ready_for_query(b'I'))
            .await
            .unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        {
            let tx = conn.begin().await.unwrap();
            drop(tx);
        }

        assert_eq!(conn.transaction_depth(), 0);

        conn.ping().await.unwrap();
        assert!(!conn.is_in_transaction());
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn nested_transactions_use_savepoints() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        for (expected, tag, status) in [
            (&b"BEGIN\0"[..], "BEGIN", b'T'),
            (&b"SAVEPOINT _pglane_savepoint_1\0"[..], "SAVEPOINT", b'T'),
            (
                &b"ROLLBACK TO SAVEPOINT _pglane_savepoint_1\0"[..],
                "ROLLBACK",
                b'T',
            ),
            (&b"COMMIT\0"[..], "COMMIT", b'I'),
        ] {
            let body = read_until(&mut stream, b'Q').await;
            assert_eq!(body, expected);
            reply_command(&mut stream, tag, status).await;
        }

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let mut outer = conn.begin().await.unwrap();

        let inner = outer.begin().await.unwrap();
        inner.rollback().await.unwrap();

        outer.commit().await.unwrap();
    };

    tokio::join!(client, backend);
}
