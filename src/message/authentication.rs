use base64::prelude::{Engine as _, BASE64_STANDARD};
use bytes::{Buf, Bytes};
use memchr::memchr;

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};

/// An authentication challenge from the server.
///
/// <https://www.postgresql.org/docs/current/protocol-message-formats.html>
#[derive(Debug)]
pub(crate) enum Authentication {
    /// The authentication exchange is successfully completed.
    Ok,

    /// The frontend must now send a cleartext password.
    CleartextPassword,

    /// The frontend must now send an MD5-hashed password, salted with the
    /// given bytes.
    Md5Password(Md5PasswordSalt),

    /// The server wants to begin a SASL exchange and lists the mechanisms it
    /// will accept, in order of preference.
    Sasl(AuthenticationSasl),

    /// SCRAM server-first-message.
    SaslContinue(AuthenticationSaslContinue),

    /// SCRAM server-final-message.
    SaslFinal(AuthenticationSaslFinal),

    /// A mechanism this driver delegates but does not implement
    /// (KerberosV5, SCM credentials, GSS, SSPI, GSS continuation).
    Unsupported(u32),
}

#[derive(Debug)]
pub(crate) struct Md5PasswordSalt {
    pub salt: [u8; 4],
}

#[derive(Debug)]
pub(crate) struct AuthenticationSasl(Bytes);

impl AuthenticationSasl {
    /// Iterate the NUL-separated mechanism names.
    pub fn mechanisms(&self) -> impl Iterator<Item = &str> + '_ {
        let mut bytes: &[u8] = &self.0;

        std::iter::from_fn(move || {
            let nul = memchr(b'\0', bytes)?;

            if nul == 0 {
                return None;
            }

            let mechanism = std::str::from_utf8(&bytes[..nul]).ok()?;
            bytes = &bytes[nul + 1..];

            Some(mechanism)
        })
    }
}

#[derive(Debug)]
pub(crate) struct AuthenticationSaslContinue {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub nonce: String,
    /// The verbatim server-first-message, part of the signed AuthMessage.
    pub message: String,
}

#[derive(Debug)]
pub(crate) struct AuthenticationSaslFinal {
    pub verifier: Vec<u8>,
}

impl BackendMessage for Authentication {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::Authentication;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 4 {
            return Err(err_protocol!("authentication message too short"));
        }

        Ok(match buf.get_u32() {
            0 => Authentication::Ok,

            3 => Authentication::CleartextPassword,

            5 => {
                if buf.remaining() < 4 {
                    return Err(err_protocol!("MD5 authentication is missing its salt"));
                }

                let mut salt = [0u8; 4];
                buf.copy_to_slice(&mut salt);

                Authentication::Md5Password(Md5PasswordSalt { salt })
            }

            10 => Authentication::Sasl(AuthenticationSasl(buf)),
            11 => Authentication::SaslContinue(AuthenticationSaslContinue::decode(buf)?),
            12 => Authentication::SaslFinal(AuthenticationSaslFinal::decode(buf)?),

            ty => Authentication::Unsupported(ty),
        })
    }
}

impl AuthenticationSaslContinue {
    fn decode(buf: Bytes) -> Result<Self, Error> {
        let message = std::str::from_utf8(&buf)
            .map_err(|_| err_protocol!("SCRAM server-first-message is not UTF-8"))?
            .to_owned();

        let mut salt: Vec<u8> = Vec::new();
        let mut nonce = String::new();
        let mut iterations: u32 = 4096;

        for item in message.split(',') {
            let Some((key, value)) = item.split_once('=') else {
                continue;
            };

            match key {
                "r" => nonce = value.to_owned(),

                "i" => {
                    iterations = value.parse().map_err(|_| {
                        err_protocol!("SCRAM iteration count is not a number: {value:?}")
                    })?;
                }

                "s" => {
                    salt = BASE64_STANDARD.decode(value).map_err(|_| {
                        err_protocol!("SCRAM salt is not valid base64: {value:?}")
                    })?;
                }

                _ => {}
            }
        }

        if nonce.is_empty() || salt.is_empty() {
            return Err(err_protocol!(
                "SCRAM server-first-message is missing nonce or salt"
            ));
        }

        Ok(AuthenticationSaslContinue {
            salt,
            iterations,
            nonce,
            message,
        })
    }
}

impl AuthenticationSaslFinal {
    fn decode(buf: Bytes) -> Result<Self, Error> {
        let message = std::str::from_utf8(&buf)
            .map_err(|_| err_protocol!("SCRAM server-final-message is not UTF-8"))?;

        for item in message.split(',') {
            if let Some(value) = item.strip_prefix("v=") {
                let verifier = BASE64_STANDARD.decode(value).map_err(|_| {
                    err_protocol!("SCRAM verifier is not valid base64: {value:?}")
                })?;

                return Ok(AuthenticationSaslFinal { verifier });
            }

            if let Some(code) = item.strip_prefix("e=") {
                return Err(Error::Authentication(format!(
                    "SCRAM exchange failed: {code}"
                )));
            }
        }

        Err(err_protocol!(
            "SCRAM server-final-message carries neither verifier nor error"
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_sasl_mechanism_list() {
        let buf = Bytes::from_static(b"\x00\x00\x00\x0aSCRAM-SHA-256-PLUS\0SCRAM-SHA-256\0\0");

        match Authentication::decode_body(buf).unwrap() {
            Authentication::Sasl(body) => {
                let mechanisms: Vec<&str> = body.mechanisms().collect();
                assert_eq!(mechanisms, ["SCRAM-SHA-256-PLUS", "SCRAM-SHA-256"]);
            }
            other => panic!("expected Sasl, got {other:?}"),
        }
    }

    #[test]
    fn decodes_sasl_continue_attributes() {
        let body = b"\x00\x00\x00\x0br=abcdef,s=c2FsdA==,i=4096";

        match Authentication::decode_body(Bytes::copy_from_slice(body)).unwrap() {
            Authentication::SaslContinue(body) => {
                assert_eq!(body.nonce, "abcdef");
                assert_eq!(body.salt, b"salt");
                assert_eq!(body.iterations, 4096);
            }
            other => panic!("expected SaslContinue, got {other:?}"),
        }
    }

    #[test]
    fn surfaces_unsupported_mechanisms() {
        let buf = Bytes::from_static(b"\x00\x00\x00\x07");

        assert!(matches!(
            Authentication::decode_body(buf).unwrap(),
            Authentication::Unsupported(7)
        ));
    }
}
