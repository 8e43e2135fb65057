use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};

/// Marks the end of an extended-query sequence.
///
/// The server closes the implicit transaction (if any), discards queued
/// messages after an error, and answers with `ReadyForQuery`.
pub(crate) struct Sync;

impl FrontendMessage for Sync {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Sync;

    #[inline]
    fn encode_body(&self, _buf: &mut Vec<u8>) -> Result<(), Error> {
        Ok(())
    }
}
