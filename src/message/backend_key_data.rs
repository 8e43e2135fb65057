use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};

/// Cancellation-key data; the frontend must keep this to be able to issue
/// `CancelRequest` later.
#[derive(Debug)]
pub(crate) struct BackendKeyData {
    /// The process ID of this backend.
    pub process_id: u32,

    /// The secret key of this backend.
    pub secret_key: u32,
}

impl BackendMessage for BackendKeyData {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::BackendKeyData;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 8 {
            return Err(err_protocol!(
                "BackendKeyData is {} bytes, expected 8",
                buf.remaining()
            ));
        }

        Ok(BackendKeyData {
            process_id: buf.get_u32(),
            secret_key: buf.get_u32(),
        })
    }
}

#[test]
fn decodes_backend_key_data() {
    let buf = Bytes::from_static(b"\x00\x00\x27\x0f\x00\x00\x00\x7b");

    let data = BackendKeyData::decode_body(buf).unwrap();

    assert_eq!(data.process_id, 9999);
    assert_eq!(data.secret_key, 123);
}
