use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};
use crate::statement::PortalId;

pub(crate) struct Execute {
    pub portal: PortalId,

    /// Maximum number of rows to return before suspending the portal;
    /// zero fetches all rows.
    pub limit: u32,
}

impl FrontendMessage for Execute {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Execute;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        self.portal.put_name(buf);
        buf.extend_from_slice(&self.limit.to_be_bytes());

        Ok(())
    }
}
