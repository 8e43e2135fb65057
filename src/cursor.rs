use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::error::Error;
use crate::message::{BackendMessageFormat, Bind, Close, DataRow, Execute, Sync};
use crate::row::PgRow;
use crate::statement::PortalId;
use crate::types::PgValue;
use crate::PgConnection;

/// A server-side cursor over a query's result set.
///
/// Rows are pulled in prefetch-sized batches by executing a bound portal
/// repeatedly; `PortalSuspended` keeps the portal open between batches.
/// Because `Sync` destroys unnamed state outside transaction blocks, a
/// cursor can only exist inside an open transaction.
pub struct PgCursor<'c> {
    conn: &'c mut PgConnection,
    portal: PortalId,
    metadata: Arc<crate::statement::PgStatementMetadata>,
    buffer: VecDeque<PgRow>,
    prefetch: u32,
    exhausted: bool,
}

impl Debug for PgCursor<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgCursor")
            .field("portal", &self.portal)
            .field("prefetch", &self.prefetch)
            .field("exhausted", &self.exhausted)
            .finish_non_exhaustive()
    }
}

impl PgConnection {
    /// Open a cursor over `sql`, fetching `prefetch` rows at a time.
    ///
    /// Errors unless a transaction is open.
    pub async fn cursor(
        &mut self,
        sql: &str,
        args: &[PgValue],
        prefetch: u32,
    ) -> Result<PgCursor<'_>, Error> {
        if self.transaction_depth == 0 {
            return Err(Error::InvalidArgument(
                "cursors require an open transaction".into(),
            ));
        }

        let prefetch = prefetch.max(1);

        self.wait_until_ready().await?;

        let statement = self.get_or_prepare(sql).await?;
        let (formats, params) = self.encode_arguments(&statement, args)?;

        let result_formats: Vec<i16> = statement
            .metadata
            .columns
            .iter()
            .map(|c| c.format as i16)
            .collect();

        let portal = self.next_portal_id();

        self.stream.write_msg(Bind {
            portal,
            statement: statement.id,
            param_formats: &formats,
            params: &params,
            result_formats: &result_formats,
        })?;

        self.stream.write_msg(Sync)?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        self.stream
            .recv_expect::<crate::message::BindComplete>()
            .await?;

        self.wait_until_ready().await?;

        Ok(PgCursor {
            metadata: Arc::clone(&statement.metadata),
            conn: self,
            portal,
            buffer: VecDeque::new(),
            prefetch,
            exhausted: false,
        })
    }
}

impl PgCursor<'_> {
    /// The next row, or `None` once the result set is exhausted.
    pub async fn next(&mut self) -> Result<Option<PgRow>, Error> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_batch().await?;
        }

        Ok(self.buffer.pop_front())
    }

    /// Fetch up to `n` rows, ending early at exhaustion.
    pub async fn fetch_many(&mut self, n: usize) -> Result<Vec<PgRow>, Error> {
        let mut rows = Vec::with_capacity(n);

        while rows.len() < n {
            match self.next().await? {
                Some(row) => rows.push(row),
                None => break,
            }
        }

        Ok(rows)
    }

    async fn fetch_batch(&mut self) -> Result<(), Error> {
        self.conn.wait_until_ready().await?;

        self.conn.stream.write_msg(Execute {
            portal: self.portal,
            limit: self.prefetch,
        })?;

        self.conn.stream.write_msg(Sync)?;
        self.conn.pending_ready_for_query += 1;
        self.conn.stream.flush().await?;

        loop {
            let message = self.conn.stream.recv().await?;

            match message.format {
                BackendMessageFormat::DataRow => {
                    self.buffer.push_back(PgRow {
                        data: message.decode::<DataRow>()?,
                        metadata: Arc::clone(&self.metadata),
                        registry: self.conn.registry.clone(),
                    });
                }

                // the portal has more rows; it stays open for the next batch
                BackendMessageFormat::PortalSuspended => {}

                BackendMessageFormat::CommandComplete
                | BackendMessageFormat::EmptyQueryResponse => {
                    self.exhausted = true;
                }

                BackendMessageFormat::ReadyForQuery => {
                    self.conn.handle_ready_for_query(message.decode()?);
                    break;
                }

                format => {
                    return Err(err_protocol!("cursor fetch: unexpected {format:?}"));
                }
            }
        }

        Ok(())
    }

    /// Close the cursor, releasing its portal on the server.
    pub async fn close(self) -> Result<(), Error> {
        let conn = self.conn;

        conn.stream.write_msg(Close::Portal(self.portal))?;
        conn.stream.write_msg(Sync)?;
        conn.pending_ready_for_query += 1;

        conn.wait_until_ready().await
    }
}

// Dropping a cursor without closing it is fine: the portal dies with the
// transaction that the cursor required in the first place.
