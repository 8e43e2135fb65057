use bytes::Bytes;

use crate::error::Error;
use crate::message::{
    BackendMessageFormat, CommandComplete, CopyData, CopyDone, CopyFail, CopyResponse, Query,
};
use crate::PgConnection;

impl PgConnection {
    /// Issue a `COPY ... FROM STDIN` statement and switch the connection to
    /// streaming data *to* the server.
    ///
    /// [`PgCopyIn::finish`] or [`PgCopyIn::abort`] must be called before
    /// the connection is used again; a dropped guard queues an abort.
    pub async fn copy_in_raw(&mut self, statement: &str) -> Result<PgCopyIn<'_>, Error> {
        self.wait_until_ready().await?;

        self.stream.write_msg(Query(statement))?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        let message = self.stream.recv().await?;

        match message.format {
            BackendMessageFormat::CopyInResponse => {
                let _ = CopyResponse::decode_as(message)?;
            }

            format => {
                return Err(err_protocol!(
                    "expected CopyInResponse, got {format:?} (is this a COPY FROM STDIN?)"
                ));
            }
        }

        Ok(PgCopyIn {
            conn: self,
            finished: false,
        })
    }

    /// Copy rows into a table from a data source, e.g.
    /// `copy_to_table("t", &["a", "b"], data)` with `data` in the server's
    /// default text format.
    pub async fn copy_to_table(
        &mut self,
        table: &str,
        columns: &[&str],
        data: impl AsRef<[u8]>,
    ) -> Result<u64, Error> {
        let statement = copy_statement(table, columns, "FROM STDIN");

        let mut copy = self.copy_in_raw(&statement).await?;
        copy.send(data.as_ref()).await?;

        copy.finish().await
    }

    /// Issue a `COPY ... TO STDOUT` statement and switch the connection to
    /// streaming data *from* the server.
    pub async fn copy_out_raw(&mut self, statement: &str) -> Result<PgCopyOut<'_>, Error> {
        self.wait_until_ready().await?;

        self.stream.write_msg(Query(statement))?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        let message = self.stream.recv().await?;

        match message.format {
            BackendMessageFormat::CopyOutResponse => {
                let _ = CopyResponse::decode_as(message)?;
            }

            format => {
                return Err(err_protocol!(
                    "expected CopyOutResponse, got {format:?} (is this a COPY TO STDOUT?)"
                ));
            }
        }

        Ok(PgCopyOut {
            conn: self,
            done: false,
            rows_affected: 0,
        })
    }

    /// Copy a table (or a column subset of it) out, returning the raw data.
    pub async fn copy_from_table(
        &mut self,
        table: &str,
        columns: &[&str],
    ) -> Result<Vec<u8>, Error> {
        let statement = copy_statement(table, columns, "TO STDOUT");

        let mut copy = self.copy_out_raw(&statement).await?;
        let mut out = Vec::new();

        while let Some(chunk) = copy.next_chunk().await? {
            out.extend_from_slice(&chunk);
        }

        Ok(out)
    }
}

fn copy_statement(table: &str, columns: &[&str], direction: &str) -> String {
    let mut sql = format!("COPY {}", quote_ident(table));

    if !columns.is_empty() {
        sql.push('(');
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push_str(&quote_ident(column));
        }
        sql.push(')');
    }

    sql.push(' ');
    sql.push_str(direction);
    sql
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Streams `COPY FROM STDIN` data to the server.
pub struct PgCopyIn<'c> {
    conn: &'c mut PgConnection,
    finished: bool,
}

impl PgCopyIn<'_> {
    /// Send a chunk of copy data. Chunking is free-form; the server
    /// reassembles rows across chunk boundaries.
    pub async fn send(&mut self, data: impl AsRef<[u8]>) -> Result<(), Error> {
        self.conn.stream.write_msg(CopyData(data.as_ref()))?;
        self.conn.stream.flush().await?;

        Ok(())
    }

    /// Complete the copy and return the number of rows written.
    pub async fn finish(mut self) -> Result<u64, Error> {
        self.finished = true;

        self.conn.stream.write_msg(CopyDone)?;
        self.conn.stream.flush().await?;

        let mut rows = 0;

        loop {
            let message = self.conn.stream.recv().await?;

            match message.format {
                BackendMessageFormat::CommandComplete => {
                    rows = message.decode::<CommandComplete>()?.rows_affected();
                }

                BackendMessageFormat::ReadyForQuery => {
                    self.conn.handle_ready_for_query(message.decode()?);
                    break;
                }

                format => {
                    return Err(err_protocol!("copy in: unexpected {format:?}"));
                }
            }
        }

        Ok(rows)
    }

    /// Abort the copy; the server discards everything sent so far and
    /// reports an error that this method swallows.
    pub async fn abort(mut self, reason: &str) -> Result<(), Error> {
        self.finished = true;

        self.conn.stream.write_msg(CopyFail { message: reason })?;
        self.conn.stream.flush().await?;

        // the server answers CopyFail with an ErrorResponse, then becomes
        // ready again; both are consumed here
        match self.conn.wait_until_ready().await {
            Ok(()) => Ok(()),
            Err(error) => Err(error),
        }
    }
}

impl Drop for PgCopyIn<'_> {
    fn drop(&mut self) {
        if !self.finished {
            // queue the abort; the next operation's resynchronization will
            // flush it and absorb the resulting error
            let _ = self
                .conn
                .stream
                .write_msg(CopyFail {
                    message: "copy aborted by driver",
                });
        }
    }
}

/// Streams `COPY TO STDOUT` data from the server.
pub struct PgCopyOut<'c> {
    conn: &'c mut PgConnection,
    done: bool,
    rows_affected: u64,
}

impl PgCopyOut<'_> {
    /// The next chunk of copy data, or `None` when the copy is complete.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, Error> {
        if self.done {
            return Ok(None);
        }

        loop {
            let message = self.conn.stream.recv().await?;

            match message.format {
                BackendMessageFormat::CopyData => {
                    return Ok(Some(message.decode::<CopyData<Bytes>>()?.0));
                }

                BackendMessageFormat::CopyDone => {}

                BackendMessageFormat::CommandComplete => {
                    self.rows_affected =
                        message.decode::<CommandComplete>()?.rows_affected();
                }

                BackendMessageFormat::ReadyForQuery => {
                    self.conn.handle_ready_for_query(message.decode()?);
                    self.done = true;

                    return Ok(None);
                }

                format => {
                    return Err(err_protocol!("copy out: unexpected {format:?}"));
                }
            }
        }
    }

    /// Rows copied, available once the stream has ended.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }
}

// Dropping PgCopyOut mid-stream is safe: the connection's next operation
// drains the remaining CopyData frames while resynchronizing.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_quoted_copy_statements() {
        assert_eq!(
            copy_statement("events", &["id", "payload"], "FROM STDIN"),
            "COPY \"events\"(\"id\", \"payload\") FROM STDIN"
        );

        assert_eq!(
            copy_statement("weird\"name", &[], "TO STDOUT"),
            "COPY \"weird\"\"name\" TO STDOUT"
        );
    }
}
