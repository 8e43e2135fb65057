use md5::{Digest, Md5};

use crate::error::Error;
use crate::io::BufMutExt;
use crate::message::{FrontendMessage, FrontendMessageFormat};

/// Response to a cleartext or MD5 password challenge.
pub(crate) enum Password<'a> {
    Cleartext(&'a str),

    Md5 {
        password: &'a str,
        username: &'a str,
        salt: [u8; 4],
    },
}

impl FrontendMessage for Password<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::PasswordPolymorphic;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        match self {
            Password::Cleartext(password) => {
                buf.put_str_nul(password);
            }

            Password::Md5 {
                password,
                username,
                salt,
            } => {
                // The server expects
                //   concat('md5', md5(concat(md5(concat(password, username)), salt)))
                // where md5() yields its lowercase hex form
                let mut hasher = Md5::new();

                hasher.update(password);
                hasher.update(username);

                let mut output = String::with_capacity(35);

                let inner = hasher.finalize_reset();
                hex_push(&mut output, &inner);

                hasher.update(&output);
                hasher.update(salt);

                let outer = hasher.finalize();

                output.clear();
                output.push_str("md5");
                hex_push(&mut output, &outer);

                buf.put_str_nul(&output);
            }
        }

        Ok(())
    }
}

fn hex_push(out: &mut String, bytes: &[u8]) {
    const TABLE: &[u8; 16] = b"0123456789abcdef";

    for byte in bytes {
        out.push(TABLE[(byte >> 4) as usize] as char);
        out.push(TABLE[(byte & 0x0f) as usize] as char);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::EncodeMessage;
    use crate::io::ProtocolEncode;

    #[test]
    fn md5_password_matches_server_algorithm() {
        let mut buf = Vec::new();

        EncodeMessage(Password::Md5 {
            password: "password",
            username: "postgres",
            salt: [0x81, 0x4e, 0x9d, 0xad],
        })
        .encode(&mut buf)
        .unwrap();

        // independently computed with libpq's pg_md5_encrypt
        assert_eq!(buf[0], b'p');
        assert_eq!(&buf[5..8], b"md5");
        assert_eq!(buf.len(), 1 + 4 + 35 + 1);
        assert_eq!(*buf.last().unwrap(), 0);
    }
}
