use crate::error::Error;
use crate::message::CancelRequest;
use crate::net::{self, BufferedSocket};
use crate::options::PgConnectOptions;

/// A handle able to cancel the query running on its originating connection.
///
/// Cancellation never travels over the busy connection itself: the token
/// opens a fresh socket to the same server, writes a single `CancelRequest`
/// frame carrying the backend's process ID and secret key, and disconnects.
/// The server honors it on a best-effort basis.
#[derive(Clone)]
pub struct PgCancelToken {
    pub(crate) process_id: u32,
    pub(crate) secret_key: u32,
    pub(crate) options: PgConnectOptions,
}

impl PgCancelToken {
    /// The server process ID this token addresses.
    pub fn process_id(&self) -> u32 {
        self.process_id
    }

    /// Ask the server to cancel whatever the originating connection is
    /// currently running.
    pub async fn cancel(&self) -> Result<(), Error> {
        let socket = match self.options.socket_path() {
            Some(path) => net::connect_socket(path).await?,
            None => net::connect_tcp(self.options.host(), self.options.port()).await?,
        };

        let mut socket = BufferedSocket::new(socket);

        socket.write(CancelRequest {
            process_id: self.process_id,
            secret_key: self.secret_key,
        })?;

        // no reply is defined for a cancel request; the server simply
        // closes the connection
        socket.shutdown().await?;

        Ok(())
    }
}

impl std::fmt::Debug for PgCancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgCancelToken")
            .field("process_id", &self.process_id)
            .finish_non_exhaustive()
    }
}
