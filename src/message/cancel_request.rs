use crate::error::Error;
use crate::io::{BufMutExt, ProtocolEncode};

/// Out-of-band request to cancel the query in flight on another connection.
///
/// Sent as the *first and only* message on a fresh connection, in place of a
/// startup packet; the magic code distinguishes it.
pub(crate) struct CancelRequest {
    pub process_id: u32,
    pub secret_key: u32,
}

impl ProtocolEncode for CancelRequest {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.put_length_prefixed(|buf| {
            buf.extend_from_slice(&80877102_i32.to_be_bytes());
            buf.extend_from_slice(&self.process_id.to_be_bytes());
            buf.extend_from_slice(&self.secret_key.to_be_bytes());

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_cancel_request_frame() {
        let mut buf = Vec::new();

        CancelRequest {
            process_id: 1,
            secret_key: 2,
        }
        .encode(&mut buf)
        .unwrap();

        assert_eq!(
            buf,
            b"\x00\x00\x00\x10\x04\xd2\x16\x2e\x00\x00\x00\x01\x00\x00\x00\x02"
        );
    }
}
