use bytes::Bytes;

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};

/// The transaction state reported with every `ReadyForQuery`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum TransactionStatus {
    /// Not in a transaction block.
    Idle,

    /// In a transaction block.
    Transaction,

    /// In a *failed* transaction block; statements are rejected until
    /// `ROLLBACK`.
    Error,
}

/// The server finished processing the current request cycle and will accept
/// a new one.
#[derive(Debug)]
pub(crate) struct ReadyForQuery {
    pub transaction_status: TransactionStatus,
}

impl BackendMessage for ReadyForQuery {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::ReadyForQuery;

    fn decode_body(buf: Bytes) -> Result<Self, Error> {
        let transaction_status = match buf.first() {
            Some(b'I') => TransactionStatus::Idle,
            Some(b'T') => TransactionStatus::Transaction,
            Some(b'E') => TransactionStatus::Error,

            other => {
                return Err(err_protocol!(
                    "unknown transaction status in ReadyForQuery: {other:?}"
                ));
            }
        };

        Ok(ReadyForQuery { transaction_status })
    }
}

#[test]
fn decodes_ready_for_query() {
    let ready = ReadyForQuery::decode_body(Bytes::from_static(b"E")).unwrap();

    assert_eq!(ready.transaction_status, TransactionStatus::Error);
}
