mod buf;
mod buf_mut;

pub(crate) use buf::BufExt;
pub(crate) use buf_mut::BufMutExt;

use crate::error::Error;

/// The maximum length the driver will accept for a single backend message.
///
/// Message lengths on the wire are a signed 32-bit count that includes the
/// length field itself; anything larger is treated as a framing error.
pub(crate) const MAX_MESSAGE_LEN: usize = i32::MAX as usize;

/// A value that can be encoded into an outgoing byte buffer.
pub(crate) trait ProtocolEncode {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error>;
}
