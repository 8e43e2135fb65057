use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};
use crate::statement::{PortalId, StatementId};

const CLOSE_PORTAL: u8 = b'P';
const CLOSE_STATEMENT: u8 = b'S';

/// Release a prepared statement or portal on the server.
#[derive(Debug)]
pub(crate) enum Close {
    Statement(StatementId),
    Portal(PortalId),
}

impl FrontendMessage for Close {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Close;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Close::Statement(id) => {
                buf.push(CLOSE_STATEMENT);
                id.put_name(buf);
            }

            Close::Portal(id) => {
                buf.push(CLOSE_PORTAL);
                id.put_name(buf);
            }
        }

        Ok(())
    }
}
