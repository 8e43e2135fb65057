use crate::error::Error;
use crate::io::{BufMutExt, ProtocolEncode};

/// The first message sent on a connection, negotiating protocol version 3.0
/// and carrying the initial run-time parameters.
///
/// Startup has no format tag; the frame is just a length and a body.
pub(crate) struct Startup<'a> {
    pub username: Option<&'a str>,
    pub database: Option<&'a str>,
    pub params: &'a [(&'a str, &'a str)],
}

impl ProtocolEncode for Startup<'_> {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.reserve(120);

        buf.put_length_prefixed(|buf| {
            // protocol version: major 3, minor 0
            buf.extend_from_slice(&196_608_i32.to_be_bytes());

            if let Some(username) = self.username {
                encode_startup_param(buf, "user", username);
            }

            if let Some(database) = self.database {
                encode_startup_param(buf, "database", database);
            }

            for (name, value) in self.params {
                encode_startup_param(buf, name, value);
            }

            // a zero byte terminates the parameter list
            buf.push(0);

            Ok(())
        })
    }
}

fn encode_startup_param(buf: &mut Vec<u8>, name: &str, value: &str) {
    buf.put_str_nul(name);
    buf.put_str_nul(value);
}
