use std::io;
use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

/// The byte stream underneath a connection.
///
/// Everything the driver sends and receives goes through one of these; the
/// trait is the seam where a TLS transform (or an in-memory stream in tests)
/// is injected.
pub trait Socket: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<S: AsyncRead + AsyncWrite + Send + Unpin + 'static> Socket for S {}

pub(crate) async fn connect_tcp(host: &str, port: u16) -> io::Result<Box<dyn Socket>> {
    let stream = TcpStream::connect((host, port)).await?;

    // Nagle hurts the short request/response frames of this protocol.
    stream.set_nodelay(true)?;

    Ok(Box::new(stream))
}

#[cfg(unix)]
pub(crate) async fn connect_socket(path: &Path) -> io::Result<Box<dyn Socket>> {
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(path).await?;

    Ok(Box::new(stream))
}

#[cfg(not(unix))]
pub(crate) async fn connect_socket(_path: &Path) -> io::Result<Box<dyn Socket>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Unix domain sockets are not supported on this platform",
    ))
}
