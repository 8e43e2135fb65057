use bytes::Bytes;

use crate::error::Error;
use crate::message::{
    BackendMessage, BackendMessageFormat, FrontendMessage, FrontendMessageFormat,
};
use crate::statement::{PortalId, StatementId};

/// Acknowledges a successful `Bind`; carries no payload.
pub(crate) struct BindComplete;

impl BackendMessage for BindComplete {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::BindComplete;

    fn decode_body(_buf: Bytes) -> Result<Self, Error> {
        Ok(BindComplete)
    }
}

/// Bind a prepared statement to a portal, supplying argument values.
///
/// The argument values were already encoded by the type registry; this
/// message only frames them.
pub(crate) struct Bind<'a> {
    pub portal: PortalId,

    pub statement: StatementId,

    /// Per-parameter format codes (0 = text, 1 = binary); one per value.
    pub param_formats: &'a [i16],

    /// Encoded argument values; `None` is SQL `NULL` (length −1 on the wire).
    pub params: &'a [Option<Vec<u8>>],

    /// Format codes requested for the result columns. A single code applies
    /// to all columns.
    pub result_formats: &'a [i16],
}

impl FrontendMessage for Bind<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Bind;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        self.portal.put_name(buf);
        self.statement.put_name(buf);

        write_i16_count(buf, self.param_formats.len(), "parameter formats")?;
        for format in self.param_formats {
            buf.extend_from_slice(&format.to_be_bytes());
        }

        write_i16_count(buf, self.params.len(), "parameters")?;
        for param in self.params {
            match param {
                Some(value) => {
                    let len = i32::try_from(value.len()).map_err(|_| {
                        err_protocol!("encoded parameter too large: {} bytes", value.len())
                    })?;

                    buf.extend_from_slice(&len.to_be_bytes());
                    buf.extend_from_slice(value);
                }

                None => {
                    buf.extend_from_slice(&(-1_i32).to_be_bytes());
                }
            }
        }

        write_i16_count(buf, self.result_formats.len(), "result formats")?;
        for format in self.result_formats {
            buf.extend_from_slice(&format.to_be_bytes());
        }

        Ok(())
    }
}

fn write_i16_count(buf: &mut Vec<u8>, len: usize, what: &str) -> Result<(), Error> {
    let count = i16::try_from(len).map_err(|_| err_protocol!("too many {what}: {len}"))?;

    buf.extend_from_slice(&count.to_be_bytes());

    Ok(())
}
