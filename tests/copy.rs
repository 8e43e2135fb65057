//! COPY IN and COPY OUT streaming.

mod support;

use pglane::{PgConnectOptions, PgConnection};
use support::*;
use tokio::io::AsyncWriteExt;

async fn connect(server: &MockServer) -> PgConnection {
    let options: PgConnectOptions = server.url().parse().unwrap();
    PgConnection::connect_with(&options).await.unwrap()
}

#[tokio::test]
async fn copy_in_streams_data_to_the_server() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"COPY \"t\"(\"x\") FROM STDIN\0");
        stream.write_all(&copy_in_response()).await.unwrap();

        let chunk = read_until(&mut stream, b'd').await;
        assert_eq!(chunk, b"1\n2\n3\n");

        read_until(&mut stream, b'c').await;

        let mut reply = command_complete("COPY 3");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let rows = conn.copy_to_table("t", &["x"], "1\n2\n3\n").await.unwrap();
        assert_eq!(rows, 3);
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn copy_in_abort_discards_and_recovers() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'Q').await;
        stream.write_all(&copy_in_response()).await.unwrap();

        // CopyFail arrives instead of CopyDone
        let fail = read_until(&mut stream, b'f').await;
        assert_eq!(fail, b"changed my mind\0");

        let mut reply = error_response("57014", "COPY from stdin failed");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // connection remains usable
        read_until(&mut stream, b'S').await;
        stream.write_all(&ready_for_query(b'I')).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let copy = conn.copy_in_raw("COPY t FROM STDIN").await.unwrap();
        copy.abort("changed my mind").await.unwrap();

        conn.ping().await.unwrap();
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn copy_out_streams_data_from_the_server() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"COPY \"t\" TO STDOUT\0");

        let mut reply = copy_out_response();
        reply.extend_from_slice(&copy_data(b"a\n"));
        reply.extend_from_slice(&copy_data(b"b\n"));
        reply.extend_from_slice(&copy_done());
        reply.extend_from_slice(&command_complete("COPY 2"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let data = conn.copy_from_table("t", &[]).await.unwrap();
        assert_eq!(data, b"a\nb\n");
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn copy_rejected_for_plain_queries() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'Q').await;
        stream.write_all(&copy_in_response()).await.unwrap();

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let err = conn.execute("COPY t FROM STDIN", &[]).await.unwrap_err();
        assert!(matches!(err, pglane::Error::Protocol(_)));
    };

    tokio::join!(client, backend);
}
