use bytes::Bytes;

use crate::error::Error;
use crate::io::BufMutExt;
use crate::message::{
    BackendMessage, BackendMessageFormat, FrontendMessage, FrontendMessageFormat,
};
use crate::statement::StatementId;
use crate::type_info::Oid;

/// Acknowledges a successful `Parse`; carries no payload.
pub(crate) struct ParseComplete;

impl BackendMessage for ParseComplete {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::ParseComplete;

    fn decode_body(_buf: Bytes) -> Result<Self, Error> {
        Ok(ParseComplete)
    }
}

pub(crate) struct Parse<'a> {
    /// The name of the destination prepared statement.
    pub statement: StatementId,

    /// The query string to be parsed.
    pub query: &'a str,

    /// The object IDs of parameter data types, in placeholder order. Zero
    /// leaves a type unspecified for the server to infer.
    pub param_types: &'a [Oid],
}

impl FrontendMessage for Parse<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Parse;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        self.statement.put_name(buf);

        buf.put_str_nul(self.query);

        let count = i16::try_from(self.param_types.len()).map_err(|_| {
            err_protocol!("too many parameter types: {}", self.param_types.len())
        })?;

        buf.extend_from_slice(&count.to_be_bytes());

        for ty in self.param_types {
            buf.extend_from_slice(&ty.0.to_be_bytes());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ProtocolEncode;
    use crate::message::EncodeMessage;

    #[test]
    fn encodes_parse_with_unnamed_statement() {
        let mut buf = Vec::new();

        EncodeMessage(Parse {
            statement: StatementId::UNNAMED,
            query: "SELECT $1",
            param_types: &[Oid(25)],
        })
        .encode(&mut buf)
        .unwrap();

        assert_eq!(
            buf,
            b"P\x00\x00\x00\x15\0SELECT $1\0\x00\x01\x00\x00\x00\x19"
        );
    }
}
