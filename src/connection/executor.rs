use std::collections::HashMap;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

use crate::column::PgColumn;
use crate::connection::with_command_timeout;
use crate::error::Error;
use crate::message::{
    BackendMessageFormat, Bind, CommandComplete, DataRow, Describe, Execute, Parse,
    ParameterDescription, Query, RowDescription, Sync,
};
use crate::row::PgRow;
use crate::statement::{PgStatement, PgStatementMetadata, PortalId, StatementId};
use crate::types::{encode_with, preferred_format, PgValue};
use crate::value::PgValueFormat;
use crate::PgConnection;

/// The outcome of a completed command.
#[derive(Clone, Default)]
pub struct PgQueryResult {
    command: String,
    rows_affected: u64,
}

impl PgQueryResult {
    /// The command tag, e.g. `INSERT 0 1`.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Rows inserted, updated, deleted, retrieved, or copied.
    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    fn absorb(&mut self, complete: &CommandComplete) {
        self.command = complete.tag().to_owned();
        self.rows_affected += complete.rows_affected();
    }
}

impl Debug for PgQueryResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgQueryResult")
            .field("command", &self.command)
            .field("rows_affected", &self.rows_affected)
            .finish()
    }
}

impl PgConnection {
    /// Execute a statement, returning its command tag and affected-row
    /// count.
    ///
    /// Without arguments the SQL goes over the simple-query protocol and
    /// may contain multiple statements; affected rows then sum across them.
    /// With arguments the extended protocol is used and `sql` must be a
    /// single statement with `$N` placeholders.
    pub async fn execute(&mut self, sql: &str, args: &[PgValue]) -> Result<PgQueryResult, Error> {
        with_command_timeout!(self, self.execute_inner(sql, args))
    }

    /// Run a statement and buffer every result row.
    pub async fn fetch(&mut self, sql: &str, args: &[PgValue]) -> Result<Vec<PgRow>, Error> {
        with_command_timeout!(self, self.fetch_inner(sql, args))
    }

    /// Run a statement and return its first row, if any.
    pub async fn fetch_row(&mut self, sql: &str, args: &[PgValue]) -> Result<Option<PgRow>, Error> {
        let rows = self.fetch(sql, args).await?;

        Ok(rows.into_iter().next())
    }

    /// Run a statement and return the first column of its first row.
    ///
    /// Errors with [`Error::RowNotFound`] when the query produces no rows.
    pub async fn fetch_val(&mut self, sql: &str, args: &[PgValue]) -> Result<PgValue, Error> {
        self.fetch_val_at(sql, args, 0).await
    }

    /// Run a statement and return one column of its first row.
    pub async fn fetch_val_at(
        &mut self,
        sql: &str,
        args: &[PgValue],
        column: usize,
    ) -> Result<PgValue, Error> {
        self.fetch_row(sql, args)
            .await?
            .ok_or(Error::RowNotFound)?
            .try_get(column)
    }

    /// Execute one statement repeatedly, once per argument set, pipelined
    /// into a single round trip.
    pub async fn execute_many(
        &mut self,
        sql: &str,
        args: &[Vec<PgValue>],
    ) -> Result<PgQueryResult, Error> {
        with_command_timeout!(self, self.execute_many_inner(sql, args))
    }

    /// Prepare a statement, returning its typed metadata.
    ///
    /// The statement lands in the connection's cache; subsequent executions
    /// of the same SQL skip the parse.
    pub async fn prepare(&mut self, sql: &str) -> Result<PgStatement, Error> {
        self.wait_until_ready().await?;

        let statement = self.get_or_prepare(sql).await?;

        Ok(PgStatement {
            id: statement.id,
            sql: statement.sql.clone(),
            metadata: Arc::clone(&statement.metadata),
        })
    }

    async fn execute_inner(&mut self, sql: &str, args: &[PgValue]) -> Result<PgQueryResult, Error> {
        if args.is_empty() {
            return self.simple_query(sql).await.map(|(result, _)| result);
        }

        let (result, _) = self.extended_query(sql, args).await?;

        Ok(result)
    }

    async fn fetch_inner(&mut self, sql: &str, args: &[PgValue]) -> Result<Vec<PgRow>, Error> {
        if args.is_empty() {
            let (_, rows) = self.simple_query(sql).await?;
            return Ok(rows);
        }

        let (_, rows) = self.extended_query(sql, args).await?;

        Ok(rows)
    }

    async fn execute_many_inner(
        &mut self,
        sql: &str,
        args: &[Vec<PgValue>],
    ) -> Result<PgQueryResult, Error> {
        self.wait_until_ready().await?;

        let statement = self.get_or_prepare(sql).await?;

        // every Bind/Execute pair queues before the single Sync; the server
        // answers them back-to-back in one round trip
        for arg_set in args {
            let (formats, params) = self.encode_arguments(&statement, arg_set)?;

            self.stream.write_msg(Bind {
                portal: PortalId::UNNAMED,
                statement: statement.id,
                param_formats: &formats,
                params: &params,
                result_formats: &[],
            })?;

            self.stream.write_msg(Execute {
                portal: PortalId::UNNAMED,
                limit: 0,
            })?;
        }

        self.stream.write_msg(Sync)?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        let mut result = PgQueryResult::default();

        loop {
            let message = self.stream.recv().await?;

            match message.format {
                BackendMessageFormat::BindComplete
                | BackendMessageFormat::DataRow
                | BackendMessageFormat::EmptyQueryResponse => {}

                BackendMessageFormat::CommandComplete => {
                    result.absorb(&message.decode()?);
                }

                BackendMessageFormat::ReadyForQuery => {
                    self.handle_ready_for_query(message.decode()?);
                    break;
                }

                format => {
                    return Err(err_protocol!("execute_many: unexpected {format:?}"));
                }
            }
        }

        Ok(result)
    }

    /// One round of the simple-query protocol: multiple statements, results
    /// in text format, one RowDescription per result group.
    pub(crate) async fn simple_query(
        &mut self,
        sql: &str,
    ) -> Result<(PgQueryResult, Vec<PgRow>), Error> {
        self.wait_until_ready().await?;

        self.stream.write_msg(Query(sql))?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        let mut result = PgQueryResult::default();
        let mut rows = Vec::new();
        let mut metadata = Arc::new(PgStatementMetadata::default());

        loop {
            let message = self.stream.recv().await?;

            match message.format {
                BackendMessageFormat::RowDescription => {
                    let desc: RowDescription = message.decode()?;
                    metadata = Arc::new(self.metadata_from_description(desc, true));
                }

                BackendMessageFormat::DataRow => {
                    rows.push(PgRow {
                        data: message.decode::<DataRow>()?,
                        metadata: Arc::clone(&metadata),
                        registry: self.registry.clone(),
                    });
                }

                BackendMessageFormat::CommandComplete => {
                    result.absorb(&message.decode()?);
                }

                BackendMessageFormat::EmptyQueryResponse => {}

                // COPY responses only appear when the caller ran COPY
                // through `execute`; the dedicated entry points intercept
                // them before this loop
                BackendMessageFormat::CopyInResponse
                | BackendMessageFormat::CopyOutResponse
                | BackendMessageFormat::CopyBothResponse => {
                    return Err(err_protocol!(
                        "COPY statements must use copy_in / copy_out"
                    ));
                }

                BackendMessageFormat::ReadyForQuery => {
                    self.handle_ready_for_query(message.decode()?);
                    break;
                }

                format => {
                    return Err(err_protocol!("simple query: unexpected {format:?}"));
                }
            }
        }

        Ok((result, rows))
    }

    async fn extended_query(
        &mut self,
        sql: &str,
        args: &[PgValue],
    ) -> Result<(PgQueryResult, Vec<PgRow>), Error> {
        self.wait_until_ready().await?;

        let statement = self.get_or_prepare(sql).await?;

        // Encoding happens before Bind is written: an encoding failure
        // leaves nothing on the wire and the connection fully usable.
        let (formats, params) = self.encode_arguments(&statement, args)?;

        let result_formats: Vec<i16> = statement
            .metadata
            .columns
            .iter()
            .map(|c| c.format as i16)
            .collect();

        self.stream.write_msg(Bind {
            portal: PortalId::UNNAMED,
            statement: statement.id,
            param_formats: &formats,
            params: &params,
            result_formats: &result_formats,
        })?;

        self.stream.write_msg(Execute {
            portal: PortalId::UNNAMED,
            // zero fetches every row without suspending the portal
            limit: 0,
        })?;

        self.stream.write_msg(Sync)?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        let mut result = PgQueryResult::default();
        let mut rows = Vec::new();

        loop {
            let message = self.stream.recv().await?;

            match message.format {
                BackendMessageFormat::BindComplete => {}

                BackendMessageFormat::DataRow => {
                    rows.push(PgRow {
                        data: message.decode::<DataRow>()?,
                        metadata: Arc::clone(&statement.metadata),
                        registry: self.registry.clone(),
                    });
                }

                BackendMessageFormat::CommandComplete => {
                    result.absorb(&message.decode()?);
                }

                BackendMessageFormat::EmptyQueryResponse
                | BackendMessageFormat::PortalSuspended => {}

                BackendMessageFormat::ReadyForQuery => {
                    self.handle_ready_for_query(message.decode()?);
                    break;
                }

                format => {
                    return Err(err_protocol!("extended query: unexpected {format:?}"));
                }
            }
        }

        Ok((result, rows))
    }

    /// Fetch the statement from the cache, or run the
    /// Parse/Describe/Sync pipeline and cache the result.
    pub(crate) async fn get_or_prepare(&mut self, sql: &str) -> Result<Arc<PgStatement>, Error> {
        let sql = sql.trim();

        if let Some(statement) = self.cache_statement.get(sql) {
            return Ok(statement);
        }

        // an expired entry may have been parked for closing just now
        self.queue_evicted_statements()?;

        let id = if self.cache_statement.is_enabled() {
            self.next_statement_id()
        } else {
            StatementId::UNNAMED
        };

        self.stream.write_msg(Parse {
            statement: id,
            query: sql,
            param_types: &[],
        })?;

        self.stream.write_msg(Describe::Statement(id))?;
        self.stream.write_msg(Sync)?;
        self.pending_ready_for_query += 1;
        self.stream.flush().await?;

        self.stream
            .recv_expect::<crate::message::ParseComplete>()
            .await?;

        let parameter_description: ParameterDescription = self.stream.recv_expect().await?;

        // NoData replaces RowDescription for statements without output
        let message = self.stream.recv().await?;

        let row_description = match message.format {
            BackendMessageFormat::RowDescription => Some(message.decode::<RowDescription>()?),
            BackendMessageFormat::NoData => None,

            format => {
                return Err(err_protocol!(
                    "expected RowDescription or NoData, got {format:?}"
                ));
            }
        };

        self.wait_until_ready().await?;

        // the stream is idle again; unresolved parameter or column types
        // may now be introspected with nested queries
        let mut parameters = Vec::with_capacity(parameter_description.types.len());

        for oid in parameter_description.types {
            parameters.push(self.resolve_type_info(oid).await?);
        }

        let metadata = match row_description {
            Some(desc) => {
                let mut metadata = self.metadata_from_description(desc, false);
                metadata.parameters = parameters;

                for column in &mut metadata.columns {
                    if column.type_info.is_declared_only() {
                        if let Some(oid) = column.type_info.oid() {
                            column.type_info = self.resolve_type_info(oid).await?;
                        }
                    }

                    column.format = preferred_format(&self.registry, &column.type_info);
                }

                metadata
            }

            None => PgStatementMetadata {
                parameters,
                ..PgStatementMetadata::default()
            },
        };

        let statement = Arc::new(PgStatement {
            id,
            sql: sql.to_owned(),
            metadata: Arc::new(metadata),
        });

        self.cache_statement.insert(sql, Arc::clone(&statement));
        self.queue_evicted_statements()?;

        Ok(statement)
    }

    /// Build column metadata from a row description.
    ///
    /// In the simple protocol every value arrives in text format; in the
    /// extended protocol the formats are assigned later, per column.
    pub(crate) fn metadata_from_description(
        &self,
        desc: RowDescription,
        text_format: bool,
    ) -> PgStatementMetadata {
        let mut columns = Vec::with_capacity(desc.fields.len());
        let mut column_names = HashMap::with_capacity(desc.fields.len());

        for (index, field) in desc.fields.into_iter().enumerate() {
            let type_info = self
                .registry
                .resolve_oid(field.data_type_id)
                .unwrap_or(crate::type_info::PgTypeInfo(
                    crate::type_info::PgType::DeclareWithOid(field.data_type_id),
                ));

            column_names.entry(field.name.clone()).or_insert(index);

            columns.push(PgColumn {
                name: field.name,
                type_info,
                relation_id: field.relation_id,
                relation_attribute_no: field.relation_attribute_no,
                format: if text_format {
                    PgValueFormat::Text
                } else {
                    PgValueFormat::Binary
                },
            });
        }

        PgStatementMetadata {
            parameters: Vec::new(),
            columns,
            column_names,
        }
    }

    /// Encode `args` for the statement's parameters, yielding per-parameter
    /// format codes and encoded values.
    pub(crate) fn encode_arguments(
        &self,
        statement: &PgStatement,
        args: &[PgValue],
    ) -> Result<(Vec<i16>, Vec<Option<Vec<u8>>>), Error> {
        let expected = &statement.metadata.parameters;

        if expected.len() != args.len() {
            return Err(Error::InvalidArgument(format!(
                "statement expects {} arguments, {} were provided",
                expected.len(),
                args.len()
            )));
        }

        let mut formats = Vec::with_capacity(args.len());
        let mut params = Vec::with_capacity(args.len());

        for (value, type_info) in args.iter().zip(expected) {
            let format = preferred_format(&self.registry, type_info);
            formats.push(format as i16);

            if value.is_null() {
                params.push(None);
                continue;
            }

            let mut buf = Vec::new();
            encode_with(&self.registry, type_info, format, value, &mut buf)?;
            params.push(Some(buf));
        }

        Ok((formats, params))
    }
}
