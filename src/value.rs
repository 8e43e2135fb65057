use std::str::from_utf8;

use crate::error::Error;
use crate::type_info::PgTypeInfo;

pub use crate::types::PgValue;

/// The wire format of a raw SQL value.
///
/// Simple-query results always arrive in [`Text`]; extended-query results
/// arrive in whatever format the driver requested per column at `Bind`
/// time, which is [`Binary`] whenever a binary codec exists.
///
/// [`Text`]: PgValueFormat::Text
/// [`Binary`]: PgValueFormat::Binary
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(i16)]
pub enum PgValueFormat {
    Text = 0,
    Binary = 1,
}

impl PgValueFormat {
    pub(crate) fn from_i16(value: i16) -> Result<Self, Error> {
        match value {
            0 => Ok(Self::Text),
            1 => Ok(Self::Binary),

            _ => Err(err_protocol!("unknown value format code: {value}")),
        }
    }
}

/// A raw, not-yet-decoded SQL value borrowed from a row.
#[derive(Debug, Clone)]
pub struct PgValueRef<'r> {
    pub(crate) value: Option<&'r [u8]>,
    pub(crate) format: PgValueFormat,
    pub(crate) type_info: PgTypeInfo,
}

impl<'r> PgValueRef<'r> {
    pub(crate) fn new(
        value: Option<&'r [u8]>,
        format: PgValueFormat,
        type_info: PgTypeInfo,
    ) -> Self {
        Self {
            value,
            format,
            type_info,
        }
    }

    /// Whether this value is SQL `NULL`.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// The format this value arrived in.
    pub fn format(&self) -> PgValueFormat {
        self.format
    }

    /// The type of this value as reported by the server.
    pub fn type_info(&self) -> &PgTypeInfo {
        &self.type_info
    }

    /// The raw bytes of this value; errors on `NULL`.
    pub fn as_bytes(&self) -> Result<&'r [u8], Error> {
        self.value
            .ok_or_else(|| Error::Decode("unexpected null; try decoding as an Option".into()))
    }

    /// The raw bytes as UTF-8.
    pub fn as_str(&self) -> Result<&'r str, Error> {
        from_utf8(self.as_bytes()?).map_err(Error::decode)
    }
}
