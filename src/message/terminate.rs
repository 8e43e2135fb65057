use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};

/// Graceful goodbye; the server closes the connection on receipt.
pub(crate) struct Terminate;

impl FrontendMessage for Terminate {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Terminate;

    #[inline]
    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }
}
