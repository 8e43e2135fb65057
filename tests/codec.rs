//! Custom codec registration.

mod support;

use pglane::{IsNull, Oid, PgConnectOptions, PgConnection, PgValue, PgValueFormat};
use serde_json::json;
use support::*;
use tokio::io::AsyncWriteExt;

#[tokio::test]
async fn registered_json_codec_round_trips() {
    let server = MockServer::bind().await;

    let backend = async {
        let mut stream = server.accept_and_handshake().await;

        // prepare SELECT $1::json
        read_until(&mut stream, b'S').await;
        let mut reply = parse_complete();
        reply.extend_from_slice(&parameter_description(&[114]));
        reply.extend_from_slice(&row_description(&[("json", 114)]));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        // the custom codec asked for text format; echo the value back
        let bind = read_until(&mut stream, b'B').await;
        let payload = b"{\"a\":1}";
        assert!(
            bind.windows(payload.len()).any(|w| w == payload),
            "parameter not encoded through the custom codec: {bind:?}"
        );

        // parameter format code must be text (0)
        assert!(bind.windows(4).any(|w| w == [0, 1, 0, 0]));

        read_until(&mut stream, b'S').await;

        let mut reply = bind_complete();
        reply.extend_from_slice(&data_row_raw(&[Some(payload)]));
        reply.extend_from_slice(&command_complete("SELECT 1"));
        reply.extend_from_slice(&ready_for_query(b'I'));
        stream.write_all(&reply).await.unwrap();

        stream
    };

    let client = async {
        let options: PgConnectOptions = server.url().parse().unwrap();
        let mut conn = PgConnection::connect_with(&options).await.unwrap();

        conn.register_codec(
            Oid(114),
            PgValueFormat::Text,
            |value, buf| match value {
                PgValue::Json(v) => {
                    serde_json::to_writer(&mut *buf, v)
                        .map_err(|e| pglane::Error::Encode(e.into()))?;
                    Ok(IsNull::No)
                }
                other => Err(pglane::Error::Encode(
                    format!("expected a JSON value, got {other:?}").into(),
                )),
            },
            |value| {
                Ok(PgValue::Json(
                    serde_json::from_slice(value.as_bytes()?)
                        .map_err(|e| pglane::Error::Decode(e.into()))?,
                ))
            },
        );

        let value = conn
            .fetch_val("SELECT $1::json", &[PgValue::Json(json!({"a": 1}))])
            .await
            .unwrap();

        assert_eq!(value.as_json(), Some(&json!({"a": 1})));
    };

    tokio::join!(client, backend);
}
