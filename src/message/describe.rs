use crate::error::Error;
use crate::message::{FrontendMessage, FrontendMessageFormat};
use crate::statement::{PortalId, StatementId};

const DESCRIBE_PORTAL: u8 = b'P';
const DESCRIBE_STATEMENT: u8 = b'S';

/// Ask the server to describe a prepared statement (parameter types and row
/// shape) or a portal (row shape only).
#[derive(Debug)]
#[allow(dead_code)]
pub(crate) enum Describe {
    Statement(StatementId),
    Portal(PortalId),
}

impl FrontendMessage for Describe {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::Describe;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Describe::Statement(id) => {
                buf.push(DESCRIBE_STATEMENT);
                id.put_name(buf);
            }

            Describe::Portal(id) => {
                buf.push(DESCRIBE_PORTAL);
                id.put_name(buf);
            }
        }

        Ok(())
    }
}
