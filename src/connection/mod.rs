use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use futures_channel::mpsc::UnboundedSender;

use crate::error::Error;
use crate::message::{Close, Notification, ReadyForQuery, Terminate, TransactionStatus};
use crate::options::PgConnectOptions;
use crate::statement::{PortalId, StatementCache, StatementId};
use crate::types::{PgTypeRegistry, SharedTypeCache};

mod cancel;
mod describe;
mod establish;
mod executor;
mod sasl;
pub(crate) mod stream;

pub use cancel::PgCancelToken;
pub use executor::PgQueryResult;

use stream::PgStream;

/// A single connection to a PostgreSQL server.
///
/// A connection runs exactly one operation against the backend at a time;
/// exclusive access is what `&mut self` on every operation enforces. Pools
/// hand out connections to one holder at a time for the same reason.
pub struct PgConnection {
    pub(crate) stream: PgStream,

    // process id and secret key of this backend, for out-of-band cancellation
    process_id: u32,
    secret_key: u32,

    next_statement_id: StatementId,
    next_portal_id: PortalId,

    pub(crate) cache_statement: StatementCache,

    /// This connection's view of the type system; seeded from the global
    /// registry, extended by introspection and local codec registration.
    pub(crate) registry: PgTypeRegistry,

    /// Introspection results shared with sibling connections of a pool.
    pub(crate) shared_types: Option<Arc<SharedTypeCache>>,

    /// OIDs being introspected right now; a type graph can be cyclic
    /// (a composite reaching itself through a domain), and a cycle member
    /// resolves to a lazy by-OID handle instead of recursing forever.
    pub(crate) types_in_resolution: Vec<crate::type_info::Oid>,

    pub(crate) transaction_depth: usize,
    pub(crate) transaction_status: TransactionStatus,

    /// Number of `ReadyForQuery` messages the server still owes us.
    pub(crate) pending_ready_for_query: usize,

    pub(crate) options: PgConnectOptions,

    closed: bool,
}

impl PgConnection {
    /// Open a new connection using the given connection string.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        Self::connect_with(&url.parse()?).await
    }

    /// Open a new connection with explicit options.
    pub async fn connect_with(options: &PgConnectOptions) -> Result<Self, Error> {
        match options.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, Self::establish(options))
                .await
                .map_err(|_| Error::Timeout)?,

            None => Self::establish(options).await,
        }
    }

    /// The server process ID backing this connection.
    pub fn server_process_id(&self) -> u32 {
        self.process_id
    }

    /// The server version as one number, e.g. `160002` for 16.2.
    pub fn server_version_num(&self) -> Option<u32> {
        self.stream.server_version_num
    }

    /// The current value of a run-time parameter reported by the server.
    pub fn server_parameter(&self, name: &str) -> Option<&str> {
        self.stream.parameter_statuses.get(name).map(String::as_str)
    }

    /// How deeply transactions are nested: 0 outside a transaction, 1 in a
    /// plain transaction, more under savepoints.
    pub fn transaction_depth(&self) -> usize {
        self.transaction_depth
    }

    /// Whether the connection sits inside an explicit transaction block,
    /// possibly a failed one.
    pub fn is_in_transaction(&self) -> bool {
        matches!(
            self.transaction_status,
            TransactionStatus::Transaction | TransactionStatus::Error
        )
    }

    /// A token able to cancel whatever this connection is currently running,
    /// from another task, over a fresh socket.
    pub fn cancel_token(&self) -> PgCancelToken {
        PgCancelToken {
            process_id: self.process_id,
            secret_key: self.secret_key,
            options: self.options.clone(),
        }
    }

    /// Register a codec override for one type on this connection only.
    pub fn register_codec(
        &mut self,
        oid: crate::type_info::Oid,
        format: crate::value::PgValueFormat,
        encode: impl Fn(&crate::types::PgValue, &mut Vec<u8>) -> Result<crate::types::IsNull, Error>
            + Send
            + Sync
            + 'static,
        decode: impl Fn(&crate::value::PgValueRef<'_>) -> Result<crate::types::PgValue, Error>
            + Send
            + Sync
            + 'static,
    ) {
        self.registry.insert_codec(oid, format, encode, decode);
    }

    /// Register a codec override by type name, resolving the OID through the
    /// catalogs.
    pub async fn register_codec_by_name(
        &mut self,
        type_name: &str,
        format: crate::value::PgValueFormat,
        encode: impl Fn(&crate::types::PgValue, &mut Vec<u8>) -> Result<crate::types::IsNull, Error>
            + Send
            + Sync
            + 'static,
        decode: impl Fn(&crate::value::PgValueRef<'_>) -> Result<crate::types::PgValue, Error>
            + Send
            + Sync
            + 'static,
    ) -> Result<(), Error> {
        let oid = self.fetch_oid_by_name(type_name).await?;
        self.registry.insert_codec(oid, format, encode, decode);

        Ok(())
    }

    pub(crate) fn set_notification_sender(&mut self, sender: UnboundedSender<Notification>) {
        self.stream.notifications = Some(sender);
    }

    pub(crate) fn next_statement_id(&mut self) -> StatementId {
        let id = self.next_statement_id;
        self.next_statement_id = id.next();
        id
    }

    pub(crate) fn next_portal_id(&mut self) -> PortalId {
        let id = self.next_portal_id;
        self.next_portal_id = id.next();
        id
    }

    pub(crate) fn check_open(&self) -> Result<(), Error> {
        if self.closed {
            Err(Error::ConnectionClosed)
        } else {
            Ok(())
        }
    }

    pub(crate) fn mark_closed(&mut self) {
        self.closed = true;
    }

    /// Queue `Close` messages for statements that fell out of the cache.
    ///
    /// Flushed together with the next operation; nothing is awaited here.
    pub(crate) fn queue_evicted_statements(&mut self) -> Result<(), Error> {
        let evicted = self.cache_statement.take_evicted();

        if evicted.is_empty() {
            return Ok(());
        }

        for statement in evicted {
            if statement.id.is_named() {
                self.stream.write_msg(Close::Statement(statement.id))?;
            }
        }

        self.stream.write_msg(crate::message::Sync)?;
        self.pending_ready_for_query += 1;

        Ok(())
    }

    /// Consume every `ReadyForQuery` the server still owes us, bringing the
    /// connection back to a state where a new operation may start.
    ///
    /// Server errors encountered while draining are logged, not returned;
    /// the owed `ReadyForQuery` still arrives after each one.
    pub(crate) async fn wait_until_ready(&mut self) -> Result<(), Error> {
        self.check_open()?;

        self.stream.flush().await?;

        while self.pending_ready_for_query > 0 {
            match self.stream.recv().await {
                Ok(message) => {
                    if message.format == crate::message::BackendMessageFormat::ReadyForQuery {
                        let ready: ReadyForQuery = message.decode()?;
                        self.handle_ready_for_query(ready);
                    }
                }

                Err(Error::Database(error)) => {
                    log::debug!(
                        target: "pglane::connection",
                        "discarding server error while resynchronizing: {error}"
                    );
                }

                Err(other) => {
                    self.mark_closed();
                    return Err(other);
                }
            }
        }

        Ok(())
    }

    pub(crate) fn handle_ready_for_query(&mut self, ready: ReadyForQuery) {
        self.pending_ready_for_query = self.pending_ready_for_query.saturating_sub(1);
        self.transaction_status = ready.transaction_status;
    }

    /// A protocol-level liveness probe: a bare `Sync` round-trip.
    pub async fn ping(&mut self) -> Result<(), Error> {
        self.check_open()?;

        self.stream.write_msg(crate::message::Sync)?;
        self.pending_ready_for_query += 1;

        self.wait_until_ready().await
    }

    /// Gracefully close the connection, sending `Terminate`.
    pub async fn close(mut self) -> Result<(), Error> {
        self.close_in_place().await
    }

    pub(crate) async fn close_in_place(&mut self) -> Result<(), Error> {
        if self.closed {
            return Ok(());
        }

        self.mark_closed();

        self.stream.write_msg(Terminate)?;
        self.stream.shutdown().await?;

        Ok(())
    }

    /// Abruptly terminate: drop the socket without the protocol goodbye.
    pub fn terminate(mut self) {
        self.mark_closed();
    }

    /// Recover after a command deadline elapsed: issue an out-of-band cancel
    /// and read until the server is ready again.
    pub(crate) async fn recover_after_timeout(&mut self) {
        // a partially-written request cannot be resynchronized
        if self.stream.pending_write_len() > 0 {
            self.mark_closed();
            return;
        }

        let token = self.cancel_token();

        if let Err(error) = token.cancel().await {
            log::warn!(
                target: "pglane::connection",
                "best-effort cancel request failed: {error}"
            );
        }

        if self.wait_until_ready().await.is_err() {
            self.mark_closed();
        }
    }
}

impl Debug for PgConnection {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConnection")
            .field("process_id", &self.process_id)
            .field("transaction_status", &self.transaction_status)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

macro_rules! with_command_timeout {
    ($self:ident, $fut:expr) => {{
        if let Some(timeout) = $self.options.command_timeout {
            let result = tokio::time::timeout(timeout, $fut).await;

            match result {
                Ok(result) => result,
                Err(_elapsed) => {
                    $self.recover_after_timeout().await;
                    Err($crate::error::Error::Timeout)
                }
            }
        } else {
            $fut.await
        }
    }};
}

pub(crate) use with_command_timeout;
