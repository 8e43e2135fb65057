use std::collections::BTreeMap;
use std::ops::ControlFlow;
use std::str::FromStr;

use bytes::Buf;
use futures_channel::mpsc::UnboundedSender;

use crate::error::Error;
use crate::message::{
    BackendMessage, BackendMessageFormat, EncodeMessage, FrontendMessage, Notification,
    ParameterStatus, PgNotice, ReceivedMessage,
};
use crate::net::{self, BufferedSocket};
use crate::options::PgConnectOptions;
use crate::PgDatabaseError;

// The stream is separate from the connection so that establishing a session
// can work on a bare message pump before a valid `PgConnection` exists.

// Run-time parameters whose change invalidates decoder assumptions; the
// driver pins the ones it can at startup and complains about the rest.
const DERIVED_PARAMETERS: &[&str] = &[
    "client_encoding",
    "DateStyle",
    "IntervalStyle",
    "TimeZone",
    "server_version",
    "integer_datetimes",
    "standard_conforming_strings",
];

pub(crate) struct PgStream {
    inner: BufferedSocket,

    /// Delivery point for `NOTIFY` messages; installed by a listener.
    /// Without one, notifications received between queries are logged and
    /// dropped.
    pub(crate) notifications: Option<UnboundedSender<Notification>>,

    pub(crate) parameter_statuses: BTreeMap<String, String>,

    pub(crate) server_version_num: Option<u32>,

    /// `tls-server-end-point` data captured during the TLS upgrade, for
    /// SCRAM channel binding.
    pub(crate) channel_binding: Option<Vec<u8>>,
}

impl PgStream {
    pub(super) async fn connect(options: &PgConnectOptions) -> Result<Self, Error> {
        let socket = match options.socket_path() {
            Some(path) => net::connect_socket(path).await?,
            None => net::connect_tcp(options.host(), options.port()).await?,
        };

        let (socket, channel_binding) = net::maybe_upgrade(socket, options).await?;

        Ok(Self {
            inner: BufferedSocket::new(socket),
            notifications: None,
            parameter_statuses: BTreeMap::default(),
            server_version_num: None,
            channel_binding,
        })
    }

    #[inline]
    pub(crate) fn write_msg(&mut self, message: impl FrontendMessage) -> Result<(), Error> {
        self.inner.write(EncodeMessage(message))
    }

    #[inline]
    pub(crate) fn write_raw(&mut self, value: impl crate::io::ProtocolEncode) -> Result<(), Error> {
        self.inner.write(value)
    }

    pub(crate) async fn send(&mut self, message: impl FrontendMessage) -> Result<(), Error> {
        self.write_msg(message)?;
        self.flush().await?;
        Ok(())
    }

    pub(crate) async fn flush(&mut self) -> Result<(), Error> {
        self.inner.flush().await
    }

    pub(crate) fn pending_write_len(&self) -> usize {
        self.inner.pending_write_len()
    }

    pub(crate) async fn shutdown(&mut self) -> Result<(), Error> {
        self.inner.shutdown().await
    }

    /// Expect the next message to decode as `B`.
    pub(crate) async fn recv_expect<B: BackendMessage>(&mut self) -> Result<B, Error> {
        self.recv().await?.decode()
    }

    /// Receive one framed message, without interpreting it.
    ///
    /// Cancel-safe: the buffer is only consumed once a whole message is
    /// available.
    pub(crate) async fn recv_unchecked(&mut self) -> Result<ReceivedMessage, Error> {
        self.inner
            .try_read(|buf| {
                // every backend message starts with a 5-byte header carrying
                // the format tag and the length of the remainder
                let Some(mut header) = buf.get(..5) else {
                    return Ok(ControlFlow::Continue(5));
                };

                let format = BackendMessageFormat::try_from_u8(header.get_u8())?;
                let message_len = header.get_u32() as usize;

                let expected_len = message_len
                    .checked_add(1)
                    .ok_or_else(|| err_protocol!("message length overflows: {message_len}"))?;

                if buf.len() < expected_len {
                    return Ok(ControlFlow::Continue(expected_len));
                }

                // `buf` MUST NOT be modified before this point

                buf.advance(1);

                let mut contents = buf.split_to(message_len).freeze();
                contents.advance(4);

                Ok(ControlFlow::Break(ReceivedMessage { format, contents }))
            })
            .await
    }

    /// Receive the next message addressed to the current operation.
    ///
    /// Asynchronous messages (notices, notifications, parameter changes) are
    /// handled inline and never returned; an `ErrorResponse` is decoded and
    /// returned as the error itself.
    pub(crate) async fn recv(&mut self) -> Result<ReceivedMessage, Error> {
        loop {
            let message = self.recv_unchecked().await?;

            match message.format {
                BackendMessageFormat::ErrorResponse => {
                    return Err(message.decode::<PgDatabaseError>()?.into());
                }

                BackendMessageFormat::NotificationResponse => {
                    let notification: Notification = message.decode()?;

                    match &mut self.notifications {
                        Some(sender) => {
                            // a dropped receiver just means nobody is
                            // listening any more
                            let _ = sender.unbounded_send(notification);
                        }

                        None => {
                            log::debug!(
                                target: "pglane::notifications",
                                "dropping notification on {:?}: no listener installed",
                                notification.channel
                            );
                        }
                    }

                    continue;
                }

                BackendMessageFormat::ParameterStatus => {
                    let ParameterStatus { name, value } = message.decode()?;

                    self.handle_parameter_status(name, value);

                    continue;
                }

                BackendMessageFormat::NoticeResponse => {
                    let notice: PgNotice = message.decode()?;

                    log::log!(
                        target: "pglane::notice",
                        notice.severity().to_log_level(),
                        "{} ({})",
                        notice.message(),
                        notice.code(),
                    );

                    continue;
                }

                _ => {}
            }

            return Ok(message);
        }
    }

    fn handle_parameter_status(&mut self, name: String, value: String) {
        if name == "server_version" {
            self.server_version_num = parse_server_version(&value);
        }

        if DERIVED_PARAMETERS.contains(&name.as_str()) {
            let changed = self
                .parameter_statuses
                .get(&name)
                .is_some_and(|old| *old != value);

            if changed {
                // decoders assume the values negotiated at startup
                log::warn!(
                    target: "pglane::parameters",
                    "server changed {name} to {value:?} mid-session; \
                     cached decoder state reset"
                );
            }
        }

        self.parameter_statuses.insert(name, value);
    }
}

// reference:
// https://github.com/postgres/postgres/blob/master/src/interfaces/libpq/fe-exec.c
// (PQserverVersion accepts both the old 3-part and new 2-part forms)
pub(crate) fn parse_server_version(s: &str) -> Option<u32> {
    let mut parts = Vec::<u32>::with_capacity(3);

    let mut from = 0;
    let mut chs = s.char_indices().peekable();

    while let Some((i, ch)) = chs.next() {
        match ch {
            '.' => {
                if let Ok(num) = u32::from_str(&s[from..i]) {
                    parts.push(num);
                    from = i + 1;
                } else {
                    break;
                }
            }
            _ if ch.is_ascii_digit() => {
                if chs.peek().is_none() {
                    if let Ok(num) = u32::from_str(&s[from..]) {
                        parts.push(num);
                    }
                    break;
                }
            }
            _ => {
                if let Ok(num) = u32::from_str(&s[from..i]) {
                    parts.push(num);
                }
                break;
            }
        }
    }

    let version_num = match parts.as_slice() {
        [major, minor, rev] => (100 * major + minor) * 100 + rev,
        [major, minor] if *major >= 10 => 100 * 100 * major + minor,
        [major, minor] => (100 * major + minor) * 100,
        [major] => 100 * 100 * major,
        _ => return None,
    };

    Some(version_num)
}

#[cfg(test)]
mod tests {
    use super::parse_server_version;

    #[test]
    fn parses_server_version_num() {
        // old style
        assert_eq!(parse_server_version("9.6.1"), Some(90601));
        // new style
        assert_eq!(parse_server_version("10.1"), Some(100001));
        // development builds
        assert_eq!(parse_server_version("9.6devel"), Some(90600));
        assert_eq!(parse_server_version("16devel87"), Some(160000));
        // unknown
        assert_eq!(parse_server_version("unknown"), None);
    }
}
