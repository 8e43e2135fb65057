use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};

/// Ask the server to deliver any pending output without ending the
/// extended-query sequence the way [`Sync`][super::Sync] would.
#[allow(dead_code)]
pub(crate) struct Flush;

impl FrontendMessage for Flush {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Flush;

    #[inline]
    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }
}
