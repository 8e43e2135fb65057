//! An asynchronous [PostgreSQL] driver written natively against the
//! frontend/backend wire protocol (version 3.0).
//!
//! The crate exposes a connection type ([`PgConnection`]) speaking both the
//! simple and extended query sub-protocols, a dynamic value model decoded
//! through a per-connection type registry ([`PgValue`], [`PgTypeRegistry`]),
//! runtime catalog introspection for user-defined types, server-side cursors,
//! `COPY` streaming, `LISTEN`/`NOTIFY`, and a bounded connection pool
//! ([`PgPool`]).
//!
//! [PostgreSQL]: https://www.postgresql.org
#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(future_incompatible)]
#![allow(clippy::doc_markdown)]

#[macro_use]
mod error;

mod column;
mod connection;
mod copy;
mod cursor;
mod io;
mod listener;
mod message;
mod net;
mod options;
mod pool;
mod row;
mod statement;
mod transaction;
mod type_info;
mod types;
mod value;

pub use column::PgColumn;
pub use connection::{PgCancelToken, PgConnection};
pub use copy::{PgCopyIn, PgCopyOut};
pub use cursor::PgCursor;
pub use error::{Error, PgDatabaseError, Result};
pub use listener::{PgListener, PgNotification};
pub use message::{PgSeverity, TransactionStatus};
pub use net::{Socket, TlsUpgrade, TlsUpgraded};
pub use options::{PgConnectOptions, PgSslMode};
pub use pool::{PgPool, PoolConnection, PoolOptions};
pub use row::PgRow;
pub use statement::PgStatement;
pub use transaction::{IsolationLevel, PgTransaction, TransactionOptions};
pub use type_info::{Oid, PgTypeInfo, PgTypeKind};
pub use types::{
    IsNull, PgArray, PgArrayDimension, PgBitString, PgBox, PgCircle, PgComposite, PgInet,
    PgInterval, PgLine, PgLseg, PgNumeric, PgPath, PgPoint, PgPolygon, PgRange, PgRangeBound,
    PgTimeTz, PgTypeRegistry,
};
pub use value::{PgValue, PgValueFormat, PgValueRef};

/// The result of a completed command, parsed from `CommandComplete`.
pub use connection::PgQueryResult;
