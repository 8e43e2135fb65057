use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::io;
use std::ops::Range;
use std::str::from_utf8;

use bytes::Bytes;
use memchr::memchr;

use crate::message::{BackendMessage, BackendMessageFormat, PgSeverity};

/// A specialized `Result` type for this crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A boxed error for the variants that wrap an arbitrary failure.
pub type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// Represents all the ways a method can fail within the driver.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Error occurred while parsing a connection string or applying options.
    #[error("error with configuration: {0}")]
    Configuration(#[source] BoxDynError),

    /// Error returned from the database server.
    #[error("error returned from database: {0}")]
    Database(#[source] Box<PgDatabaseError>),

    /// Error communicating with the database server.
    #[error("error communicating with database: {0}")]
    Io(#[from] io::Error),

    /// Error occurred while attempting to establish a TLS connection.
    #[error("error occurred while attempting to establish a TLS connection: {0}")]
    Tls(#[source] BoxDynError),

    /// Unexpected or invalid data encountered while communicating with the
    /// server. The connection is unusable afterwards.
    #[error("encountered unexpected or invalid data: {0}")]
    Protocol(String),

    /// The server rejected our credentials or requested an authentication
    /// mechanism we do not speak.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// No row was returned by a query expected to return at least one row.
    #[error("no rows returned by a query that expected to return at least one row")]
    RowNotFound,

    /// Type with the given name was not found in the registry or catalog.
    #[error("type named {type_name} not found")]
    TypeNotFound { type_name: String },

    /// Column index was out of bounds.
    #[error("column index out of bounds: the len is {len}, but the index is {index}")]
    ColumnIndexOutOfBounds { index: usize, len: usize },

    /// No column found with the given name.
    #[error("no column found for name: {0}")]
    ColumnNotFound(String),

    /// Error occurred while decoding a value from its wire representation.
    #[error("error occurred while decoding: {0}")]
    Decode(#[source] BoxDynError),

    /// Error occurred while encoding an argument.
    #[error("error occurred while encoding a value: {0}")]
    Encode(#[source] BoxDynError),

    /// A caller misused the API, e.g. bound the wrong number of arguments or
    /// requested a cursor outside a transaction.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The in-flight operation was cancelled out-of-band.
    #[error("operation was cancelled")]
    Cancelled,

    /// `command_timeout` elapsed before the server completed the operation.
    #[error("operation timed out")]
    Timeout,

    /// A pool [`acquire`][crate::PgPool::acquire] timed out.
    #[error("pool timed out while waiting for an open connection")]
    PoolTimedOut,

    /// [`PgPool::close`][crate::PgPool::close] was called while the
    /// connection was being acquired or used.
    #[error("attempted to acquire a connection on a closed pool")]
    PoolClosed,

    /// The connection has been closed and cannot be used further.
    #[error("connection closed")]
    ConnectionClosed,
}

impl Error {
    #[inline]
    pub(crate) fn protocol(err: impl Display) -> Self {
        Error::Protocol(err.to_string())
    }

    #[inline]
    pub(crate) fn config(err: impl Into<BoxDynError>) -> Self {
        Error::Configuration(err.into())
    }

    #[inline]
    pub(crate) fn decode(err: impl Into<BoxDynError>) -> Self {
        Error::Decode(err.into())
    }

    #[inline]
    pub(crate) fn encode(err: impl Into<BoxDynError>) -> Self {
        Error::Encode(err.into())
    }

    #[inline]
    pub(crate) fn tls(err: impl Into<BoxDynError>) -> Self {
        Error::Tls(err.into())
    }

    /// Return the server error, if this is [`Error::Database`].
    pub fn as_database_error(&self) -> Option<&PgDatabaseError> {
        match self {
            Error::Database(error) => Some(error),
            _ => None,
        }
    }
}

impl From<PgDatabaseError> for Error {
    fn from(error: PgDatabaseError) -> Self {
        Error::Database(Box::new(error))
    }
}

macro_rules! err_protocol {
    ($($args:tt)*) => {
        $crate::error::Error::Protocol(format!($($args)*))
    };
}

/// An error returned from the PostgreSQL server, decoded from an
/// `ErrorResponse` message.
///
/// The individual fields are described in the
/// [error and notice message fields](https://www.postgresql.org/docs/current/protocol-error-fields.html)
/// section of the protocol documentation.
pub struct PgDatabaseError {
    storage: Bytes,
    severity: PgSeverity,
    fields: Vec<(u8, Range<usize>)>,
}

impl PgDatabaseError {
    /// The severity of the error.
    pub fn severity(&self) -> PgSeverity {
        self.severity
    }

    /// The SQLSTATE code for the error; always present, five characters.
    pub fn code(&self) -> &str {
        self.get(b'C').unwrap_or_default()
    }

    /// The primary human-readable error message.
    pub fn message(&self) -> &str {
        self.get(b'M').unwrap_or_default()
    }

    /// An optional secondary message with more detail.
    pub fn detail(&self) -> Option<&str> {
        self.get(b'D')
    }

    /// An optional suggestion on what to do about the problem.
    pub fn hint(&self) -> Option<&str> {
        self.get(b'H')
    }

    /// A 1-based character offset into the query string where the error
    /// occurred.
    pub fn position(&self) -> Option<usize> {
        self.get(b'P').and_then(|s| s.parse().ok())
    }

    /// Schema name, if the error was associated with a specific database
    /// object.
    pub fn schema(&self) -> Option<&str> {
        self.get(b's')
    }

    /// Table name, if the error was associated with a specific table.
    pub fn table(&self) -> Option<&str> {
        self.get(b't')
    }

    /// Column name, if the error was associated with a specific table column.
    pub fn column(&self) -> Option<&str> {
        self.get(b'c')
    }

    /// Data type name, if the error was associated with a specific data type.
    pub fn data_type(&self) -> Option<&str> {
        self.get(b'd')
    }

    /// Constraint name, if the error was associated with a specific
    /// constraint.
    pub fn constraint(&self) -> Option<&str> {
        self.get(b'n')
    }

    /// Source-code routine reporting the error, per the server.
    pub fn routine(&self) -> Option<&str> {
        self.get(b'R')
    }

    /// Get any field from the response by its tag byte.
    pub fn get(&self, tag: u8) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == tag)
            .and_then(|(_, range)| from_utf8(&self.storage[range.clone()]).ok())
    }
}

pub(crate) fn parse_notice_fields(storage: &[u8]) -> Vec<(u8, Range<usize>)> {
    // The body is a sequence of [tag: u8][value: cstr] pairs terminated by a
    // single NUL byte in place of a tag.
    let mut fields = Vec::new();
    let mut offset = 0;

    while let Some(&tag) = storage.get(offset) {
        if tag == 0 {
            break;
        }

        offset += 1;
        let start = offset;

        let Some(len) = memchr(b'\0', &storage[start..]) else {
            break;
        };

        fields.push((tag, start..start + len));
        offset = start + len + 1;
    }

    fields
}

impl PgDatabaseError {
    pub(crate) fn parse(storage: Bytes) -> Result<Self, Error> {
        let fields = parse_notice_fields(&storage);

        // prefer the non-localized V field (9.6+); fall back to S
        let severity = fields
            .iter()
            .filter(|(tag, _)| *tag == b'V' || *tag == b'S')
            .filter_map(|(_, range)| from_utf8(&storage[range.clone()]).ok())
            .find_map(|s| PgSeverity::try_from_str(s).ok())
            .unwrap_or(PgSeverity::Error);

        Ok(PgDatabaseError {
            storage,
            severity,
            fields,
        })
    }
}

impl BackendMessage for PgDatabaseError {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::ErrorResponse;

    fn decode_body(buf: Bytes) -> Result<Self, Error> {
        Self::parse(buf)
    }
}

impl Debug for PgDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgDatabaseError")
            .field("severity", &self.severity)
            .field("code", &self.code())
            .field("message", &self.message())
            .field("detail", &self.detail())
            .field("hint", &self.hint())
            .field("position", &self.position())
            .field("constraint", &self.constraint())
            .finish()
    }
}

impl Display for PgDatabaseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl StdError for PgDatabaseError {}

#[cfg(test)]
mod tests {
    use super::*;

    const DATA: &[u8] = b"SERROR\0VERROR\0C42P01\0Mrelation \"t\" does not exist\0P15\0Fparse_relation.c\0L1180\0RparserOpenTable\0\0";

    #[test]
    fn parses_error_response_fields() {
        let err = PgDatabaseError::parse(Bytes::from_static(DATA)).unwrap();

        assert_eq!(err.severity(), PgSeverity::Error);
        assert_eq!(err.code(), "42P01");
        assert_eq!(err.message(), "relation \"t\" does not exist");
        assert_eq!(err.position(), Some(15));
        assert_eq!(err.routine(), Some("parserOpenTable"));
        assert_eq!(err.detail(), None);
    }

    #[test]
    fn falls_back_to_localized_severity() {
        let err =
            PgDatabaseError::parse(Bytes::from_static(b"SFATAL\0C28P01\0Mnope\0\0")).unwrap();

        assert_eq!(err.severity(), PgSeverity::Fatal);
        assert_eq!(err.code(), "28P01");
    }
}
