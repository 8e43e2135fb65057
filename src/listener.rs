use futures_channel::mpsc;
use futures_util::StreamExt;

use crate::error::Error;
use crate::message::Notification;
use crate::pool::{PgPool, PoolConnection};

/// A stream of asynchronous notifications from `LISTEN`/`NOTIFY`.
///
/// The listener holds one pool connection. If that connection dies, the
/// listener transparently acquires a new one and re-subscribes to every
/// channel; notifications sent while disconnected are lost (PostgreSQL does
/// not queue them for absent listeners).
pub struct PgListener {
    pool: PgPool,
    connection: Option<PoolConnection>,
    buffer_rx: mpsc::UnboundedReceiver<Notification>,
    buffer_tx: mpsc::UnboundedSender<Notification>,
    channels: Vec<String>,
}

/// A single notification delivered to a [`PgListener`].
#[derive(Debug, Clone)]
pub struct PgNotification(Notification);

impl PgNotification {
    /// The server process ID of the notifying backend.
    pub fn process_id(&self) -> u32 {
        self.0.process_id
    }

    /// The channel the notification was sent on.
    pub fn channel(&self) -> &str {
        &self.0.channel
    }

    /// The payload, or an empty string if none was given.
    pub fn payload(&self) -> &str {
        &self.0.payload
    }
}

impl PgListener {
    /// Connect a listener through a dedicated single-connection pool.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let pool = crate::pool::PoolOptions::new()
            .max_connections(1)
            .min_connections(0)
            .max_lifetime(None)
            .idle_timeout(None)
            .connect(url)
            .await?;

        Self::connect_with(&pool).await
    }

    /// Connect a listener backed by an existing pool.
    pub async fn connect_with(pool: &PgPool) -> Result<Self, Error> {
        let mut connection = pool.acquire().await?;

        let (buffer_tx, buffer_rx) = mpsc::unbounded();
        connection.set_notification_sender(buffer_tx.clone());

        Ok(Self {
            pool: pool.clone(),
            connection: Some(connection),
            buffer_rx,
            buffer_tx,
            channels: Vec::new(),
        })
    }

    /// Start listening on a channel. The name is quoted, so it is
    /// case-sensitive.
    pub async fn listen(&mut self, channel: &str) -> Result<(), Error> {
        self.connection()
            .await?
            .execute(&format!(r#"LISTEN "{}""#, ident(channel)), &[])
            .await?;

        if !self.channels.iter().any(|c| c == channel) {
            self.channels.push(channel.to_owned());
        }

        Ok(())
    }

    /// Start listening on several channels at once.
    pub async fn listen_all(
        &mut self,
        channels: impl IntoIterator<Item = &str>,
    ) -> Result<(), Error> {
        for channel in channels {
            self.listen(channel).await?;
        }

        Ok(())
    }

    /// Stop listening on a channel.
    pub async fn unlisten(&mut self, channel: &str) -> Result<(), Error> {
        self.connection()
            .await?
            .execute(&format!(r#"UNLISTEN "{}""#, ident(channel)), &[])
            .await?;

        self.channels.retain(|c| c != channel);

        Ok(())
    }

    /// Stop listening on every channel.
    pub async fn unlisten_all(&mut self) -> Result<(), Error> {
        self.connection().await?.execute("UNLISTEN *", &[]).await?;
        self.channels.clear();

        Ok(())
    }

    /// Receive the next notification, reconnecting if the connection has
    /// died.
    pub async fn recv(&mut self) -> Result<PgNotification, Error> {
        loop {
            match self.try_recv().await? {
                Some(notification) => return Ok(notification),
                None => continue,
            }
        }
    }

    /// Receive the next notification; `Ok(None)` indicates the connection
    /// was lost (and re-established), so notifications may have been
    /// missed.
    pub async fn try_recv(&mut self) -> Result<Option<PgNotification>, Error> {
        // buffered from a previous wait?
        if let Ok(Some(notification)) = self.buffer_rx.try_next() {
            return Ok(Some(PgNotification(notification)));
        }

        self.ensure_connected().await?;

        let connection = self
            .connection
            .as_mut()
            .expect("ensure_connected always installs a connection");

        // `stream.recv()` routes notifications into the buffer and keeps
        // waiting, so the buffer is polled concurrently; both operations
        // are cancel-safe
        let lost = tokio::select! {
            notification = self.buffer_rx.next() => {
                match notification {
                    Some(notification) => return Ok(Some(PgNotification(notification))),
                    // the sender lives in `self`, so this cannot happen
                    None => return Err(Error::ConnectionClosed),
                }
            }

            result = async { connection.stream.recv().await } => {
                match result {
                    // no message other than a notification is expected
                    // while the listener is idle
                    Ok(message) => {
                        return Err(err_protocol!(
                            "listener: unexpected {:?}",
                            message.format
                        ));
                    }

                    Err(Error::Database(error)) => return Err(Error::Database(error)),

                    // connection-level failure: drop it and report the gap
                    Err(_) => true,
                }
            }
        };

        if lost {
            // the pool must not reuse a connection that failed mid-read
            if let Some(mut connection) = self.connection.take() {
                connection.mark_closed();
            }
        }

        Ok(None)
    }

    async fn connection(&mut self) -> Result<&mut PoolConnection, Error> {
        self.ensure_connected().await?;

        Ok(self
            .connection
            .as_mut()
            .expect("ensure_connected always installs a connection"))
    }

    async fn ensure_connected(&mut self) -> Result<(), Error> {
        if self.connection.is_some() {
            return Ok(());
        }

        let mut connection = self.pool.acquire().await?;
        connection.set_notification_sender(self.buffer_tx.clone());

        for channel in &self.channels {
            connection
                .execute(&format!(r#"LISTEN "{}""#, ident(channel)), &[])
                .await?;
        }

        self.connection = Some(connection);

        Ok(())
    }

}

fn ident(name: &str) -> String {
    name.replace('"', "\"\"")
}

#[cfg(test)]
mod tests {
    use super::ident;

    #[test]
    fn quotes_embedded_quotes() {
        assert_eq!(ident("plain"), "plain");
        assert_eq!(ident("we\"ird"), "we\"\"ird");
    }
}
