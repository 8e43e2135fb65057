use futures_core::future::BoxFuture;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{BoxDynError, Error};
use crate::net::Socket;
use crate::options::{PgConnectOptions, PgSslMode};

/// The result of a successful TLS upgrade.
pub struct TlsUpgraded {
    /// The encrypted stream.
    pub socket: Box<dyn Socket>,
    /// The `tls-server-end-point` channel binding data for
    /// SCRAM-SHA-256-PLUS, if the implementation can produce it.
    pub tls_server_end_point: Option<Vec<u8>>,
}

/// An injectable TLS transform.
///
/// The driver negotiates the `SSLRequest` prelude itself and then hands the
/// raw socket to this trait to wrap it in an encrypted stream. The crate does
/// not link a TLS implementation; applications provide one through
/// [`PgConnectOptions::tls_upgrade`][crate::PgConnectOptions::tls_upgrade].
pub trait TlsUpgrade: Send + Sync + 'static {
    /// Wrap `socket` in TLS, verifying the server according to the
    /// implementation's policy for `host`.
    fn upgrade(
        &self,
        socket: Box<dyn Socket>,
        host: &str,
        options: &PgConnectOptions,
    ) -> BoxFuture<'static, Result<TlsUpgraded, BoxDynError>>;
}

/// Drive the `SSLRequest` prelude and upgrade the socket per `sslmode`.
///
/// Returns the (possibly encrypted) socket and channel binding data.
pub(crate) async fn maybe_upgrade(
    mut socket: Box<dyn Socket>,
    options: &PgConnectOptions,
) -> Result<(Box<dyn Socket>, Option<Vec<u8>>), Error> {
    // TLS over a Unix domain socket is not a thing
    if options.socket_path().is_some() {
        return Ok((socket, None));
    }

    match options.ssl_mode() {
        PgSslMode::Disable => return Ok((socket, None)),

        PgSslMode::Allow | PgSslMode::Prefer => {
            if options.tls_upgrader().is_none() {
                // nothing to upgrade with; stay in cleartext
                return Ok((socket, None));
            }
        }

        PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull => {
            if options.tls_upgrader().is_none() {
                return Err(Error::tls(format!(
                    "sslmode {:?} requires a TLS upgrade implementation, none was configured",
                    options.ssl_mode()
                )));
            }
        }
    }

    // https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-SSL
    socket.write_all(&crate::message::SslRequest::BODY).await?;
    socket.flush().await?;

    let mut response = [0u8; 1];
    socket.read_exact(&mut response).await?;

    match response[0] {
        b'S' => {
            let upgrader = options.tls_upgrader().expect("checked above");

            let upgraded = upgrader
                .upgrade(socket, options.host(), options)
                .await
                .map_err(Error::Tls)?;

            Ok((upgraded.socket, upgraded.tls_server_end_point))
        }

        b'N' => {
            if matches!(
                options.ssl_mode(),
                PgSslMode::Require | PgSslMode::VerifyCa | PgSslMode::VerifyFull
            ) {
                return Err(Error::tls(
                    "server does not support TLS, but sslmode requires it",
                ));
            }

            Ok((socket, None))
        }

        // A pre-v12 server may answer an SSLRequest with an ErrorResponse;
        // either way we cannot continue on this stream.
        other => Err(err_protocol!(
            "unexpected response to SSLRequest: 0x{other:02x}"
        )),
    }
}
