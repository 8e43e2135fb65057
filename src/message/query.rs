use crate::error::Error;
use crate::io::BufMutExt;
use crate::message::{FrontendMessage, FrontendMessageFormat};

/// A simple-query request: the whole SQL string in one message, results
/// always in text format.
pub(crate) struct Query<'a>(pub &'a str);

impl FrontendMessage for Query<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Query;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.put_str_nul(self.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ProtocolEncode;
    use crate::message::EncodeMessage;

    #[test]
    fn encodes_query() {
        let mut buf = Vec::new();
        EncodeMessage(Query("SELECT 1")).encode(&mut buf).unwrap();

        assert_eq!(buf, b"Q\x00\x00\x00\x0dSELECT 1\0");
    }
}
