use bytes::Bytes;

use crate::error::Error;
use crate::io::BufExt;
use crate::message::{BackendMessage, BackendMessageFormat};

/// Reports the current value of a run-time parameter the server considers
/// interesting to clients. Sent during startup and again whenever one of
/// them changes.
#[derive(Debug)]
pub(crate) struct ParameterStatus {
    pub name: String,
    pub value: String,
}

impl BackendMessage for ParameterStatus {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::ParameterStatus;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        let name = buf.get_str_nul()?;
        let value = buf.get_str_nul()?;

        Ok(ParameterStatus { name, value })
    }
}

#[test]
fn decodes_parameter_status() {
    let buf = Bytes::from_static(b"client_encoding\0UTF8\0");

    let status = ParameterStatus::decode_body(buf).unwrap();

    assert_eq!(status.name, "client_encoding");
    assert_eq!(status.value, "UTF8");
}
