//! Runtime catalog introspection of user-defined types.

mod support;

use pglane::{PgConnectOptions, PgConnection, PgTypeKind, PgValue};
use support::*;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

const MOOD_OID: u32 = 70_000;

async fn connect(server: &MockServer) -> PgConnection {
    let options: PgConnectOptions = server.url().parse().unwrap();
    PgConnection::connect_with(&options).await.unwrap()
}

/// Serve one Parse/Describe/Sync cycle.
async fn serve_prepare(stream: &mut TcpStream, param_oids: &[u32], columns: &[(&str, u32)]) {
    read_until(stream, b'S').await;

    let mut reply = parse_complete();
    reply.extend_from_slice(&parameter_description(param_oids));

    if columns.is_empty() {
        reply.extend_from_slice(&no_data());
    } else {
        reply.extend_from_slice(&row_description(columns));
    }

    reply.extend_from_slice(&ready_for_query(b'I'));
    stream.write_all(&reply).await.unwrap();
}

/// Serve one Bind/Execute/Sync cycle with the given raw rows.
async fn serve_execute(stream: &mut TcpStream, rows: &[Vec<Option<Vec<u8>>>], tag: &str) {
    read_until(stream, b'S').await;

    let mut reply = bind_complete();

    for row in rows {
        let values: Vec<Option<&[u8]>> = row.iter().map(|v| v.as_deref()).collect();
        reply.extend_from_slice(&data_row_raw(&values));
    }

    reply.extend_from_slice(&command_complete(tag));
    reply.extend_from_slice(&ready_for_query(b'I'));
    stream.write_all(&reply).await.unwrap();
}

fn i64_bytes(v: i64) -> Option<Vec<u8>> {
    Some(v.to_be_bytes().to_vec())
}

fn text_bytes(v: &str) -> Option<Vec<u8>> {
    Some(v.as_bytes().to_vec())
}

#[tokio::test]
async fn unknown_enum_is_discovered_from_the_catalogs() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // the user statement mentions an unknown type OID
        serve_prepare(&mut stream, &[], &[("mood", MOOD_OID)]).await;

        // the driver introspects pg_type...
        serve_prepare(
            &mut stream,
            &[26],
            &[
                ("typname", 25),
                ("typtype", 25),
                ("typcategory", 25),
                ("typrelid", 20),
                ("typelem", 20),
                ("typbasetype", 20),
            ],
        )
        .await;

        serve_execute(
            &mut stream,
            &[vec![
                text_bytes("mood"),
                text_bytes("e"),
                text_bytes("E"),
                i64_bytes(0),
                i64_bytes(0),
                i64_bytes(0),
            ]],
            "SELECT 1",
        )
        .await;

        // ...and pg_enum for the labels
        serve_prepare(&mut stream, &[26], &[("enumlabel", 25)]).await;

        serve_execute(
            &mut stream,
            &[
                vec![text_bytes("sad")],
                vec![text_bytes("ok")],
                vec![text_bytes("happy")],
            ],
            "SELECT 3",
        )
        .await;

        // back to the user statement; enum values travel as text
        serve_execute(&mut stream, &[vec![text_bytes("happy")]], "SELECT 1").await;

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        let rows = conn.fetch("SELECT current_mood FROM person", &[]).await;
        let rows = rows.unwrap();

        assert_eq!(rows.len(), 1);

        let column = &rows[0].columns()[0];
        assert_eq!(column.type_info().name(), "mood");
        assert!(matches!(column.type_info().kind(), PgTypeKind::Enum(_)));

        assert_eq!(
            rows[0].try_get(0).unwrap(),
            PgValue::Text("happy".to_owned())
        );
    };

    tokio::join!(client, backend);
}

#[tokio::test]
async fn introspection_result_is_cached_per_connection() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        serve_prepare(&mut stream, &[], &[("mood", MOOD_OID)]).await;

        serve_prepare(
            &mut stream,
            &[26],
            &[
                ("typname", 25),
                ("typtype", 25),
                ("typcategory", 25),
                ("typrelid", 20),
                ("typelem", 20),
                ("typbasetype", 20),
            ],
        )
        .await;

        serve_execute(
            &mut stream,
            &[vec![
                text_bytes("mood"),
                text_bytes("e"),
                text_bytes("E"),
                i64_bytes(0),
                i64_bytes(0),
                i64_bytes(0),
            ]],
            "SELECT 1",
        )
        .await;

        serve_prepare(&mut stream, &[26], &[("enumlabel", 25)]).await;
        serve_execute(&mut stream, &[vec![text_bytes("ok")]], "SELECT 1").await;

        serve_execute(&mut stream, &[vec![text_bytes("ok")]], "SELECT 1").await;

        // the second statement names the same OID; no further catalog
        // queries may arrive, only prepare + execute of the user SQL
        serve_prepare(&mut stream, &[], &[("mood", MOOD_OID)]).await;
        serve_execute(&mut stream, &[vec![text_bytes("sad")]], "SELECT 1").await;

        stream
    };

    let client = async {
        let mut conn = connect(&server).await;

        conn.fetch("SELECT current_mood FROM person", &[])
            .await
            .unwrap();

        // same type again; resolution must come from the local cache
        let rows = conn
            .fetch("SELECT past_mood FROM person", &[])
            .await
            .unwrap();

        assert_eq!(
            rows[0].try_get(0).unwrap(),
            PgValue::Text("sad".to_owned())
        );
    };

    tokio::join!(client, backend);
}
