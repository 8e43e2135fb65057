//! End-to-end protocol flows against a scripted backend.

mod support;

use pglane::{PgConnectOptions, PgConnection, PgValue};
use support::*;
use tokio::io::AsyncWriteExt;

async fn connect(server: &MockServer) -> PgConnection {
    let options: PgConnectOptions = server.url().parse().unwrap();
    PgConnection::connect_with(&options).await.unwrap()
}

#[tokio::test]
async fn establishes_a_session() {
    let server = MockServer::bind().await;

    let client = async {
        let conn = connect(&server).await;

        assert_eq!(conn.server_process_id(), 4242);
        assert_eq!(conn.server_version_num(), Some(160002));
        assert_eq!(conn.server_parameter("client_encoding"), Some("UTF8"));
        assert!(!conn.is_in_transaction());

        conn
    };

    let (conn, _stream) = tokio::join!(client, server.accept_and_handshake());

    drop(conn);
}

#[tokio::test]
async fn simple_query_streams_text_rows() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"SELECT generate_series(1,3) AS i\0");

        let mut reply = row_description(&[("i", 23)]);
        reply.extend_from_slice(&data_row_text(&[Some("1")]));
        reply.extend_from_slice(&data_row_text(&[Some("2")]));
        reply.extend_from_slice(&data_row_text(&[Some("3")]));
        reply.extend_from_slice(&command_complete("SELECT 3"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let rows = conn
            .fetch("SELECT generate_series(1,3) AS i", &[])
            .await
            .unwrap();

        assert_eq!(rows.len(), 3);

        for (index, row) in rows.iter().enumerate() {
            assert_eq!(row.columns()[0].name(), "i");
            assert_eq!(
                row.try_get_by_name("i").unwrap(),
                PgValue::Int4(index as i32 + 1)
            );
        }
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn extended_query_binds_and_decodes_binary() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // Parse names the statement and carries the SQL
        let parse = read_until(&mut stream, b'P').await;
        assert!(parse.starts_with(b"pglane_s_1\0SELECT $1::int4 + $2::int4\0"));

        // Describe + Sync follow in the same pipeline
        read_until(&mut stream, b'S').await;

        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[23, 23]));
        reply.extend_from_slice(&row_description(&[("?column?", 23)]));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // Bind carries both arguments in binary format
        let bind = read_until(&mut stream, b'B').await;
        let expected_args: &[u8] = &[
            0, 2, // parameter format count
            0, 1, 0, 1, // binary, binary
            0, 2, // parameter count
            0, 0, 0, 4, 0, 0, 0, 40, // $1 = 40
            0, 0, 0, 4, 0, 0, 0, 2, // $2 = 2
            0, 1, // result format count
            0, 1, // binary
        ];
        assert!(
            bind.windows(expected_args.len())
                .any(|window| window == expected_args),
            "unexpected Bind body: {bind:?}"
        );

        read_until(&mut stream, b'S').await;

        let mut reply = bind_complete();
        reply.extend_from_slice(&data_row_raw(&[Some(&42_i32.to_be_bytes())]));
        reply.extend_from_slice(&command_complete("SELECT 1"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let value = conn
            .fetch_val(
                "SELECT $1::int4 + $2::int4",
                &[PgValue::Int4(40), PgValue::Int4(2)],
            )
            .await
            .unwrap();

        assert_eq!(value.as_i32(), Some(42));
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn wrong_arity_fails_before_anything_is_sent() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'S').await;

        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[23, 23]));
        reply.extend_from_slice(&row_description(&[("?column?", 23)]));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let err = conn
            .fetch("SELECT $1::int4 + $2::int4", &[PgValue::Int4(40)])
            .await
            .unwrap_err();

        assert!(matches!(err, pglane::Error::InvalidArgument(_)));
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn server_error_surfaces_and_connection_recovers() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'Q').await;

        let mut reply = error_response("42601", "syntax error at or near \"boom\"");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // the very next query must work
        read_until(&mut stream, b'Q').await;

        let mut reply = row_description(&[("x", 23)]);
        reply.extend_from_slice(&data_row_text(&[Some("1")]));
        reply.extend_from_slice(&command_complete("SELECT 1"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let err = conn.execute("boom", &[]).await.unwrap_err();

        let db = err.as_database_error().expect("database error");
        assert_eq!(db.code(), "42601");
        assert_eq!(db.severity(), pglane::PgSeverity::Error);

        let value = conn.fetch_val("SELECT 1", &[]).await.unwrap();
        assert_eq!(value.as_i32(), Some(1));
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn multi_statement_execute_sums_affected_rows() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'Q').await;

        let mut reply = command_complete("INSERT 0 2");
        reply.extend_from_slice(&command_complete("DELETE 3"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let result = conn
            .execute("INSERT INTO t VALUES (1), (2); DELETE FROM u", &[])
            .await
            .unwrap();

        assert_eq!(result.rows_affected(), 5);
        assert_eq!(result.command(), "DELETE 3");
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn evicted_statements_are_closed_on_the_server() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // first prepare
        read_until(&mut stream, b'S').await;
        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[]));
        reply.extend_from_slice(&no_data());
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // second prepare evicts the first (capacity 1)
        read_until(&mut stream, b'S').await;
        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[]));
        reply.extend_from_slice(&no_data());
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // the next round trip flushes Close for the evicted statement,
        // its Sync, and the ping's own Sync
        let close = read_until(&mut stream, b'C').await;
        assert_eq!(close[0], b'S');
        assert!(close[1..].starts_with(b"pglane_s_1\0"));

        read_until(&mut stream, b'S').await;
        read_until(&mut stream, b'S').await;

        let mut reply = close_complete();
        reply.extend_from_slice(&ready_for_query(b'I'));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let options: PgConnectOptions = server.url().parse().unwrap();
        let options = options.statement_cache_capacity(1);
        let mut conn = PgConnection::connect_with(&options).await.unwrap();

        conn.prepare("INSERT INTO t VALUES ($0)").await.unwrap();
        conn.prepare("INSERT INTO u VALUES ($0)").await.unwrap();

        // the Close goes out with the next operation
        conn.ping().await.unwrap();
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn execute_many_pipelines_into_one_round_trip() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // prepare
        read_until(&mut stream, b'S').await;
        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[23]));
        reply.extend_from_slice(&no_data());
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // three Bind/Execute pairs arrive before the single Sync
        let mut binds = 0;
        loop {
            let (tag, _) = read_frame(&mut stream).await;

            match tag {
                b'B' => binds += 1,
                b'S' => break,
                _ => {}
            }
        }
        assert_eq!(binds, 3);

        let mut reply = Vec::new();
        for _ in 0..3 {
            reply.extend_from_slice(&bind_complete());
            reply.extend_from_slice(&command_complete("INSERT 0 1"));
        }
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let result = conn
            .execute_many(
                "INSERT INTO t VALUES ($1)",
                &[
                    vec![PgValue::Int4(1)],
                    vec![PgValue::Int4(2)],
                    vec![PgValue::Int4(3)],
                ],
            )
            .await
            .unwrap();

        assert_eq!(result.rows_affected(), 3);
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn responses_return_in_submission_order() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        for i in 1..=3 {
            read_until(&mut stream, b'Q').await;

            let mut reply = row_description(&[("n", 23)]);
            reply.extend_from_slice(&data_row_text(&[Some(&i.to_string())]));
            reply.extend_from_slice(&command_complete("SELECT 1"));
            reply.extend_from_slice(&ready_for_query(b'I'));
            stream.write_all(&reply).await.unwrap();
        }

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        for i in 1..=3 {
            let value = conn.fetch_val("SELECT n", &[]).await.unwrap();
            assert_eq!(value.as_i32(), Some(i));
        }
    };

    tokio::join!(client, backend);
}
