//! LISTEN/NOTIFY delivery.

mod support;

use pglane::PgListener;
use support::*;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn delivers_notifications_to_the_listener() {
    let server = MockServer::bind().await;
    let url = server.url();

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        let body = read_until(&mut stream, b'Q').await;
        assert_eq!(body, b"LISTEN \"events\"\0");

        let mut reply = command_complete("LISTEN");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // notifications arrive asynchronously, outside any request
        stream
            .write_all(&notification(9001, "events", "hello"))
            .await
            .unwrap();

        stream
            .write_all(&notification(9001, "events", "world"))
            .await
            .unwrap();

        stream
    };

    let client = async {
        let mut listener = PgListener::connect(&url).await.unwrap();
        listener.listen("events").await.unwrap();

        let first = listener.recv().await.unwrap();
        assert_eq!(first.channel(), "events");
        assert_eq!(first.payload(), "hello");
        assert_eq!(first.process_id(), 9001);

        let second = listener.recv().await.unwrap();
        assert_eq!(second.payload(), "world");
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn notifications_buffered_during_queries_are_not_lost() {
    let server = MockServer::bind().await;
    let url = server.url();

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        read_until(&mut stream, b'Q').await;
        let mut reply = command_complete("LISTEN");
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // a notification interleaves with the next command's response
        // stream; it must route to the buffer, not disturb the command
        read_until(&mut stream, b'Q').await;

        let mut reply = notification(7, "events", "interleaved");
        reply.extend_from_slice(&command_complete("LISTEN"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let mut listener = PgListener::connect(&url).await.unwrap();
        listener.listen("events").await.unwrap();
        listener.listen("more").await.unwrap();

        let buffered = listener.recv().await.unwrap();
        assert_eq!(buffered.payload(), "interleaved");
    };

    tokio::join!(client, backend);
}
