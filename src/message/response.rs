use std::fmt::{self, Debug, Display, Formatter};
use std::ops::Range;
use std::str::from_utf8;

use bytes::Bytes;

use crate::error::{parse_notice_fields, Error};
use crate::message::{BackendMessage, BackendMessageFormat};

/// Severity level of an `ErrorResponse` or `NoticeResponse`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PgSeverity {
    Panic,
    Fatal,
    Error,
    Warning,
    Notice,
    Debug,
    Info,
    Log,
}

impl PgSeverity {
    #[inline]
    pub fn is_error(self) -> bool {
        matches!(self, Self::Panic | Self::Fatal | Self::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PgSeverity::Panic => "PANIC",
            PgSeverity::Fatal => "FATAL",
            PgSeverity::Error => "ERROR",
            PgSeverity::Warning => "WARNING",
            PgSeverity::Notice => "NOTICE",
            PgSeverity::Debug => "DEBUG",
            PgSeverity::Info => "INFO",
            PgSeverity::Log => "LOG",
        }
    }

    pub(crate) fn try_from_str(s: &str) -> Result<Self, Error> {
        Ok(match s {
            "PANIC" => PgSeverity::Panic,
            "FATAL" => PgSeverity::Fatal,
            "ERROR" => PgSeverity::Error,
            "WARNING" => PgSeverity::Warning,
            "NOTICE" => PgSeverity::Notice,
            "DEBUG" => PgSeverity::Debug,
            "INFO" => PgSeverity::Info,
            "LOG" => PgSeverity::Log,

            severity => {
                return Err(err_protocol!("unknown severity: {severity:?}"));
            }
        })
    }

    pub(crate) fn to_log_level(self) -> log::Level {
        match self {
            PgSeverity::Fatal | PgSeverity::Panic | PgSeverity::Error => log::Level::Error,
            PgSeverity::Warning => log::Level::Warn,
            PgSeverity::Notice => log::Level::Info,
            PgSeverity::Debug => log::Level::Debug,
            PgSeverity::Info | PgSeverity::Log => log::Level::Trace,
        }
    }
}

impl Display for PgSeverity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// A decoded `NoticeResponse`; structurally identical to an error response
/// but informational.
pub(crate) struct PgNotice {
    storage: Bytes,
    severity: PgSeverity,
    fields: Vec<(u8, Range<usize>)>,
}

impl PgNotice {
    #[inline]
    pub fn severity(&self) -> PgSeverity {
        self.severity
    }

    pub fn code(&self) -> &str {
        self.get(b'C').unwrap_or_default()
    }

    pub fn message(&self) -> &str {
        self.get(b'M').unwrap_or_default()
    }

    pub fn get(&self, tag: u8) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| *field == tag)
            .and_then(|(_, range)| from_utf8(&self.storage[range.clone()]).ok())
    }
}

impl Debug for PgNotice {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgNotice")
            .field("severity", &self.severity)
            .field("code", &self.code())
            .field("message", &self.message())
            .finish()
    }
}

impl BackendMessage for PgNotice {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::NoticeResponse;

    fn decode_body(buf: Bytes) -> Result<Self, Error> {
        let fields = parse_notice_fields(&buf);

        let severity = fields
            .iter()
            .filter(|(tag, _)| *tag == b'V' || *tag == b'S')
            .filter_map(|(_, range)| from_utf8(&buf[range.clone()]).ok())
            .find_map(|s| PgSeverity::try_from_str(s).ok())
            .unwrap_or(PgSeverity::Log);

        Ok(PgNotice {
            storage: buf,
            severity,
            fields,
        })
    }
}

#[test]
fn decodes_notice_response() {
    const DATA: &[u8] =
        b"SNOTICE\0VNOTICE\0C42710\0Mextension \"uuid-ossp\" already exists, skipping\0\0";

    let notice = PgNotice::decode_body(Bytes::from_static(DATA)).unwrap();

    assert_eq!(notice.severity(), PgSeverity::Notice);
    assert_eq!(notice.code(), "42710");
    assert_eq!(
        notice.message(),
        "extension \"uuid-ossp\" already exists, skipping"
    );
}
