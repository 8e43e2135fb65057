//! Command deadlines and out-of-band cancellation.

mod support;

use std::time::Duration;

use pglane::{Error, PgConnectOptions, PgConnection};
use support::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

#[tokio::test]
async fn elapsed_command_timeout_cancels_and_recovers() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // the query arrives but no response is sent: it "hangs"
        read_until(&mut stream, b'Q').await;

        // the driver opens a second connection bearing only a CancelRequest
        let mut cancel_conn = server.accept().await;

        let len = cancel_conn.read_u32().await.unwrap();
        assert_eq!(len, 16);

        let code = cancel_conn.read_u32().await.unwrap();
        assert_eq!(code, 80_877_102);

        let process_id = cancel_conn.read_u32().await.unwrap();
        let secret_key = cancel_conn.read_u32().await.unwrap();
        assert_eq!(process_id, 4242);
        assert_eq!(secret_key, 1337);

        drop(cancel_conn);

        // the cancelled query errors out, then the session is ready again
        let mut reply = error_response("57014", "canceling statement due to user request");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // a subsequent ping proves the connection survived
        read_until(&mut stream, b'S').await;
        stream.write_all(&ready_for_query(b'I')).await.unwrap();

        stream
    };

    let client = async {
        let options: PgConnectOptions = server.url().parse().unwrap();
        let options = options.command_timeout(Duration::from_millis(100));
        let mut conn = PgConnection::connect_with(&options).await.unwrap();

        let err = conn.execute("SELECT pg_sleep(3600)", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Timeout));

        conn.ping().await.unwrap();
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn cancel_token_reaches_the_server_out_of_band() {
    let server = MockServer::bind().await;

    let backend = async {
        let _stream = server.accept_and_handshake().await;

        let mut cancel_conn = server.accept().await;

        let len = cancel_conn.read_u32().await.unwrap();
        assert_eq!(len, 16);
        assert_eq!(cancel_conn.read_u32().await.unwrap(), 80_877_102);
        assert_eq!(cancel_conn.read_u32().await.unwrap(), 4242);
        assert_eq!(cancel_conn.read_u32().await.unwrap(), 1337);

        _stream
    };

    let client = async {
        let options: PgConnectOptions = server.url().parse().unwrap();
        let conn = PgConnection::connect_with(&options).await.unwrap();

        let token = conn.cancel_token();
        assert_eq!(token.process_id(), 4242);

        token.cancel().await.unwrap();

        conn
    };

    let (conn, _stream) = tokio::join!(client, backend);
    drop(conn);
}
