use crate::connection::sasl;
use crate::connection::stream::PgStream;
use crate::error::Error;
use crate::message::{
    Authentication, BackendKeyData, BackendMessageFormat, Password, Startup, TransactionStatus,
};
use crate::options::PgConnectOptions;
use crate::statement::{PortalId, StatementCache, StatementId};
use crate::types::PgTypeRegistry;
use crate::PgConnection;

// https://www.postgresql.org/docs/current/protocol-flow.html#PROTOCOL-FLOW-START-UP

impl PgConnection {
    pub(crate) async fn establish(options: &PgConnectOptions) -> Result<Self, Error> {
        let mut stream = PgStream::connect(options).await?;

        // A session begins with a startup message carrying the user,
        // database, and any run-time parameters we want pinned.

        let mut params = vec![
            // Pin the formats the decoders are written against.
            ("client_encoding", "UTF8"),
            ("DateStyle", "ISO"),
            ("IntervalStyle", "postgres"),
            ("TimeZone", "UTC"),
        ];

        if let Some(ref application_name) = options.application_name {
            params.push(("application_name", application_name));
        }

        if let Some(ref extra_float_digits) = options.extra_float_digits {
            params.push(("extra_float_digits", extra_float_digits));
        }

        for (name, value) in &options.server_settings {
            params.push((name, value));
        }

        stream.write_raw(Startup {
            username: Some(&options.username),
            database: options.database.as_deref(),
            params: &params,
        })?;

        stream.flush().await?;

        // The server now decides what authentication it requires, walks us
        // through it, and reports session state until ReadyForQuery.

        let mut process_id = 0;
        let mut secret_key = 0;
        let transaction_status;

        loop {
            let message = stream.recv().await?;

            match message.format {
                BackendMessageFormat::Authentication => match message.decode()? {
                    Authentication::Ok => {
                        // nothing more is required of us
                    }

                    Authentication::CleartextPassword => {
                        stream
                            .send(Password::Cleartext(
                                options.password.as_deref().unwrap_or_default(),
                            ))
                            .await?;
                    }

                    Authentication::Md5Password(body) => {
                        stream
                            .send(Password::Md5 {
                                username: &options.username,
                                password: options.password.as_deref().unwrap_or_default(),
                                salt: body.salt,
                            })
                            .await?;
                    }

                    Authentication::Sasl(body) => {
                        sasl::authenticate(&mut stream, options, body).await?;
                    }

                    method => {
                        return Err(Error::Authentication(format!(
                            "unsupported authentication method: {method:?}"
                        )));
                    }
                },

                BackendMessageFormat::BackendKeyData => {
                    // must be kept to issue CancelRequest later
                    let data: BackendKeyData = message.decode()?;

                    process_id = data.process_id;
                    secret_key = data.secret_key;
                }

                BackendMessageFormat::ReadyForQuery => {
                    let ready: crate::message::ReadyForQuery = message.decode()?;
                    transaction_status = ready.transaction_status;
                    break;
                }

                _ => {
                    return Err(err_protocol!(
                        "establish: unexpected message {:?}",
                        message.format
                    ));
                }
            }
        }

        debug_assert_eq!(transaction_status, TransactionStatus::Idle);

        Ok(PgConnection {
            stream,
            process_id,
            secret_key,
            next_statement_id: StatementId::NAMED_START,
            next_portal_id: PortalId::NAMED_START,
            cache_statement: StatementCache::new(
                options.statement_cache_capacity,
                options.max_cached_statement_lifetime,
            ),
            registry: PgTypeRegistry::global_snapshot(),
            shared_types: None,
            types_in_resolution: Vec::new(),
            transaction_depth: 0,
            transaction_status,
            pending_ready_for_query: 0,
            options: options.clone(),
            closed: false,
        })
    }
}
