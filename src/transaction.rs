use std::fmt::Write;
use std::ops::{Deref, DerefMut};

use crate::error::Error;
use crate::message::Query;
use crate::PgConnection;

/// Transaction isolation levels accepted by `BEGIN`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    fn as_sql(self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for [`PgConnection::begin_with`].
#[derive(Debug, Clone, Default)]
pub struct TransactionOptions {
    pub isolation: Option<IsolationLevel>,
    pub read_only: bool,
    pub deferrable: bool,
}

impl TransactionOptions {
    fn is_default(&self) -> bool {
        self.isolation.is_none() && !self.read_only && !self.deferrable
    }

    fn begin_sql(&self) -> String {
        let mut sql = String::from("BEGIN");

        if let Some(isolation) = self.isolation {
            let _ = write!(sql, " ISOLATION LEVEL {}", isolation.as_sql());
        }

        if self.read_only {
            sql.push_str(" READ ONLY");
        }

        if self.deferrable {
            sql.push_str(" DEFERRABLE");
        }

        sql
    }
}

/// An in-progress transaction (or savepoint, when nested).
///
/// Commit and rollback consume the transaction, so a finished transaction
/// cannot be used again by construction. Dropping it without calling either
/// queues a rollback that is sent before the connection's next operation.
pub struct PgTransaction<'c> {
    conn: &'c mut PgConnection,
    open: bool,
}

impl PgConnection {
    /// Begin a transaction, or a savepoint when one is already open.
    pub async fn begin(&mut self) -> Result<PgTransaction<'_>, Error> {
        self.begin_with(TransactionOptions::default()).await
    }

    /// Begin a transaction with explicit characteristics.
    pub async fn begin_with(
        &mut self,
        options: TransactionOptions,
    ) -> Result<PgTransaction<'_>, Error> {
        let depth = self.transaction_depth;

        let sql = if depth == 0 {
            options.begin_sql()
        } else {
            if !options.is_default() {
                return Err(Error::InvalidArgument(
                    "isolation options apply to the outermost transaction only".into(),
                ));
            }

            format!("SAVEPOINT _pglane_savepoint_{depth}")
        };

        self.execute(&sql, &[]).await?;
        self.transaction_depth += 1;

        Ok(PgTransaction {
            conn: self,
            open: true,
        })
    }
}

impl PgTransaction<'_> {
    /// Commit this transaction or release its savepoint.
    pub async fn commit(mut self) -> Result<(), Error> {
        let sql = commit_sql(self.conn.transaction_depth);

        self.conn.execute(&sql, &[]).await?;
        self.conn.transaction_depth -= 1;
        self.open = false;

        Ok(())
    }

    /// Roll this transaction back, or roll back to its savepoint.
    pub async fn rollback(mut self) -> Result<(), Error> {
        let sql = rollback_sql(self.conn.transaction_depth);

        self.conn.execute(&sql, &[]).await?;
        self.conn.transaction_depth -= 1;
        self.open = false;

        Ok(())
    }
}

impl Drop for PgTransaction<'_> {
    fn drop(&mut self) {
        if self.open {
            // no await point exists here; the rollback is queued into the
            // write buffer and flushed by the connection's next operation
            let depth = self.conn.transaction_depth;
            let sql = rollback_sql(depth);

            if self.conn.stream.write_msg(Query(&sql)).is_ok() {
                self.conn.pending_ready_for_query += 1;
                self.conn.transaction_depth = depth - 1;
            } else {
                self.conn.mark_closed();
            }
        }
    }
}

impl Deref for PgTransaction<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &Self::Target {
        self.conn
    }
}

impl DerefMut for PgTransaction<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn
    }
}

fn commit_sql(depth: usize) -> String {
    if depth <= 1 {
        "COMMIT".to_owned()
    } else {
        format!("RELEASE SAVEPOINT _pglane_savepoint_{}", depth - 1)
    }
}

fn rollback_sql(depth: usize) -> String {
    if depth <= 1 {
        "ROLLBACK".to_owned()
    } else {
        format!("ROLLBACK TO SAVEPOINT _pglane_savepoint_{}", depth - 1)
    }
}
