use crate::error::Error;
use crate::io::ProtocolEncode;

// Like the startup packet, these preludes carry no tag byte; a magic
// protocol-version code identifies them instead.

/// Asks the server whether it is willing to switch this connection to TLS.
/// The answer is a single raw byte: `S`, `N`, or (from very old servers) an
/// `ErrorResponse`.
pub(crate) struct SslRequest;

impl SslRequest {
    pub const BODY: [u8; 8] = [0, 0, 0, 8, 0x04, 0xd2, 0x16, 0x2f];
}

impl ProtocolEncode for SslRequest {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(&Self::BODY);
        Ok(())
    }
}

/// Asks the server to switch this connection to GSSAPI encryption.
///
/// The driver recognizes the frame but delegates the mechanism itself;
/// GSSAPI negotiation is not built in.
#[allow(dead_code)]
pub(crate) struct GssEncRequest;

impl ProtocolEncode for GssEncRequest {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(&[0, 0, 0, 8, 0x04, 0xd2, 0x16, 0x30]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_codes_differ_from_startup() {
        let mut ssl = Vec::new();
        SslRequest.encode(&mut ssl).unwrap();

        let mut gss = Vec::new();
        GssEncRequest.encode(&mut gss).unwrap();

        // 80877103 and 80877104, in a version-number shape no real
        // protocol version will ever use
        assert_eq!(&ssl[4..], &80877103_u32.to_be_bytes());
        assert_eq!(&gss[4..], &80877104_u32.to_be_bytes());
    }
}
