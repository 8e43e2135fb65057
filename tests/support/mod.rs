//! A scripted PostgreSQL backend for driving the client against known
//! message sequences, over a real local socket.
#![allow(dead_code)]

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub struct MockServer {
    listener: TcpListener,
    port: u16,
}

impl MockServer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        MockServer { listener, port }
    }

    pub fn url(&self) -> String {
        format!("postgres://test@127.0.0.1:{}/testdb", self.port)
    }

    pub async fn accept(&self) -> TcpStream {
        let (stream, _) = self.listener.accept().await.unwrap();
        stream
    }

    /// Accept a connection and walk it through a password-less handshake.
    pub async fn accept_and_handshake(&self) -> TcpStream {
        let mut stream = self.accept().await;
        handshake(&mut stream).await;
        stream
    }
}

/// Read the startup packet (no tag byte) and answer with a successful,
/// parameterized session start.
pub async fn handshake(stream: &mut TcpStream) {
    handshake_with_pid(stream, 4242).await;
}

/// [`handshake`], reporting the given backend process ID.
pub async fn handshake_with_pid(stream: &mut TcpStream, process_id: u32) {
    let len = stream.read_u32().await.unwrap() as usize;
    let mut body = vec![0u8; len - 4];
    stream.read_exact(&mut body).await.unwrap();

    // protocol version 3.0
    assert_eq!(&body[..4], &196_608_u32.to_be_bytes());

    let mut reply = Vec::new();
    reply.extend_from_slice(&auth_ok());
    reply.extend_from_slice(&parameter_status("server_version", "16.2"));
    reply.extend_from_slice(&parameter_status("client_encoding", "UTF8"));
    reply.extend_from_slice(&backend_key_data(process_id, 1337));
    reply.extend_from_slice(&ready_for_query(b'I'));

    stream.write_all(&reply).await.unwrap();
}

/// Read one frontend message, returning its tag and body.
pub async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
    let tag = stream.read_u8().await.unwrap();
    let len = stream.read_u32().await.unwrap() as usize;

    let mut body = vec![0u8; len - 4];
    stream.read_exact(&mut body).await.unwrap();

    (tag, body)
}

/// Read frontend messages until one with the given tag arrives.
pub async fn read_until(stream: &mut TcpStream, tag: u8) -> Vec<u8> {
    loop {
        let (got, body) = read_frame(stream).await;

        if got == tag {
            return body;
        }
    }
}

pub fn frame(tag: u8, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + 5);
    out.push(tag);
    out.extend_from_slice(&((body.len() + 4) as u32).to_be_bytes());
    out.extend_from_slice(body);
    out
}

pub fn auth_ok() -> Vec<u8> {
    frame(b'R', &0_u32.to_be_bytes())
}

pub fn parameter_status(name: &str, value: &str) -> Vec<u8> {
    let mut body = Vec::new();
    push_cstr(&mut body, name);
    push_cstr(&mut body, value);
    frame(b'S', &body)
}

pub fn backend_key_data(process_id: u32, secret_key: u32) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&process_id.to_be_bytes());
    body.extend_from_slice(&secret_key.to_be_bytes());
    frame(b'K', &body)
}

pub fn ready_for_query(status: u8) -> Vec<u8> {
    frame(b'Z', &[status])
}

pub fn parse_complete() -> Vec<u8> {
    frame(b'1', &[])
}

pub fn bind_complete() -> Vec<u8> {
    frame(b'2', &[])
}

pub fn close_complete() -> Vec<u8> {
    frame(b'3', &[])
}

pub fn no_data() -> Vec<u8> {
    frame(b'n', &[])
}

pub fn portal_suspended() -> Vec<u8> {
    frame(b's', &[])
}

pub fn parameter_description(oids: &[u32]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(oids.len() as u16).to_be_bytes());
    for oid in oids {
        body.extend_from_slice(&oid.to_be_bytes());
    }
    frame(b't', &body)
}

/// A row description of `(name, type oid)` columns, all in text format with
/// generic size information.
pub fn row_description(fields: &[(&str, u32)]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(fields.len() as u16).to_be_bytes());

    for (name, oid) in fields {
        push_cstr(&mut body, name);
        body.extend_from_slice(&0_u32.to_be_bytes()); // relation oid
        body.extend_from_slice(&0_i16.to_be_bytes()); // attribute no
        body.extend_from_slice(&oid.to_be_bytes());
        body.extend_from_slice(&(-1_i16).to_be_bytes()); // type size
        body.extend_from_slice(&(-1_i32).to_be_bytes()); // type modifier
        body.extend_from_slice(&0_i16.to_be_bytes()); // format
    }

    frame(b'T', &body)
}

/// A data row of text-format values; `None` is NULL.
pub fn data_row_text(values: &[Option<&str>]) -> Vec<u8> {
    data_row_raw(
        &values
            .iter()
            .map(|v| v.map(str::as_bytes))
            .collect::<Vec<_>>(),
    )
}

/// A data row of raw (e.g. binary-format) values.
pub fn data_row_raw(values: &[Option<&[u8]>]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&(values.len() as u16).to_be_bytes());

    for value in values {
        match value {
            Some(value) => {
                body.extend_from_slice(&(value.len() as i32).to_be_bytes());
                body.extend_from_slice(value);
            }
            None => body.extend_from_slice(&(-1_i32).to_be_bytes()),
        }
    }

    frame(b'D', &body)
}

pub fn command_complete(tag: &str) -> Vec<u8> {
    let mut body = Vec::new();
    push_cstr(&mut body, tag);
    frame(b'C', &body)
}

pub fn empty_query_response() -> Vec<u8> {
    frame(b'I', &[])
}

pub fn error_response(code: &str, message: &str) -> Vec<u8> {
    let mut body = Vec::new();

    body.push(b'S');
    push_cstr(&mut body, "ERROR");
    body.push(b'V');
    push_cstr(&mut body, "ERROR");
    body.push(b'C');
    push_cstr(&mut body, code);
    body.push(b'M');
    push_cstr(&mut body, message);
    body.push(0);

    frame(b'E', &body)
}

pub fn notification(process_id: u32, channel: &str, payload: &str) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(&process_id.to_be_bytes());
    push_cstr(&mut body, channel);
    push_cstr(&mut body, payload);
    frame(b'A', &body)
}

pub fn copy_in_response() -> Vec<u8> {
    frame(b'G', &[0, 0, 0])
}

pub fn copy_out_response() -> Vec<u8> {
    frame(b'H', &[0, 0, 0])
}

pub fn copy_data(data: &[u8]) -> Vec<u8> {
    frame(b'd', data)
}

pub fn copy_done() -> Vec<u8> {
    frame(b'c', &[])
}

fn push_cstr(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(s.as_bytes());
    buf.push(0);
}

/// Serve connections generically: answer queries with an empty result,
/// pings with readiness, and stop at Terminate. Useful for pool tests where
/// the traffic itself is uninteresting.
pub async fn serve_generic(mut stream: TcpStream) {
    loop {
        let mut tag = [0u8; 1];

        if stream.read_exact(&mut tag).await.is_err() {
            return;
        }

        let len = match stream.read_u32().await {
            Ok(len) => len as usize,
            Err(_) => return,
        };

        let mut body = vec![0u8; len - 4];
        if stream.read_exact(&mut body).await.is_err() {
            return;
        }

        match tag[0] {
            b'X' => return,

            b'Q' if body.starts_with(b"BEGIN") => {
                let mut reply = command_complete("BEGIN");
                reply.extend_from_slice(&ready_for_query(b'T'));
                let _ = stream.write_all(&reply).await;
            }

            b'Q' if body.starts_with(b"ROLLBACK") => {
                let mut reply = command_complete("ROLLBACK");
                reply.extend_from_slice(&ready_for_query(b'I'));
                let _ = stream.write_all(&reply).await;
            }

            b'Q' => {
                let mut reply = command_complete("SELECT 0");
                reply.extend_from_slice(&ready_for_query(b'I'));
                let _ = stream.write_all(&reply).await;
            }

            b'S' => {
                let _ = stream.write_all(&ready_for_query(b'I')).await;
            }

            _ => {}
        }
    }
}
