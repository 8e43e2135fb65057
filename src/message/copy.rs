use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufMutExt;
use crate::message::{
    BackendMessage, BackendMessageFormat, FrontendMessage, FrontendMessageFormat,
};

/// A chunk of `COPY` payload, in either direction.
pub(crate) struct CopyData<B>(pub B);

impl<B: AsRef<[u8]>> FrontendMessage for CopyData<B> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::CopyData;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(self.0.as_ref());
        Ok(())
    }
}

impl BackendMessage for CopyData<Bytes> {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::CopyData;

    fn decode_body(buf: Bytes) -> Result<Self, Error> {
        Ok(CopyData(buf))
    }
}

pub(crate) struct CopyDone;

impl FrontendMessage for CopyDone {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::CopyDone;

    #[inline]
    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }
}

impl BackendMessage for CopyDone {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::CopyDone;

    fn decode_body(_buf: Bytes) -> Result<Self, Error> {
        Ok(CopyDone)
    }
}

/// Client-initiated failure of a `COPY FROM STDIN`; the server responds with
/// an `ErrorResponse` carrying this message.
pub(crate) struct CopyFail<'a> {
    pub message: &'a str,
}

impl FrontendMessage for CopyFail<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::CopyFail;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.put_str_nul(self.message);
        Ok(())
    }
}

/// Body shared by `CopyInResponse`, `CopyOutResponse` and
/// `CopyBothResponse`: overall format plus per-column format codes.
#[derive(Debug)]
pub(crate) struct CopyResponse {
    /// 0 for textual, 1 for binary.
    pub format: i8,
    pub column_formats: Vec<i16>,
}

impl CopyResponse {
    fn decode(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 3 {
            return Err(err_protocol!("copy response too short"));
        }

        let format = buf.get_i8();
        let columns = buf.get_i16();

        let column_formats = (0..columns)
            .map(|_| {
                if buf.remaining() < 2 {
                    Err(err_protocol!("copy response truncated column formats"))
                } else {
                    Ok(buf.get_i16())
                }
            })
            .collect::<Result<Vec<i16>, Error>>()?;

        Ok(CopyResponse {
            format,
            column_formats,
        })
    }

    pub fn decode_as(message: crate::message::ReceivedMessage) -> Result<Self, Error> {
        Self::decode(message.contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_copy_in_response() {
        let buf = Bytes::from_static(b"\x00\x00\x02\x00\x00\x00\x00");

        let response = CopyResponse::decode(buf).unwrap();

        assert_eq!(response.format, 0);
        assert_eq!(response.column_formats, [0, 0]);
    }
}
