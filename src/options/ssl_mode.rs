use std::str::FromStr;

use crate::error::Error;

/// Options for controlling the desired security state of a connection.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PgSslMode {
    /// Only try a non-SSL connection.
    Disable,

    /// First try a non-SSL connection; if that fails, try an SSL connection.
    Allow,

    /// First try an SSL connection; if that fails, try a non-SSL connection.
    #[default]
    Prefer,

    /// Only try an SSL connection.
    Require,

    /// Only try an SSL connection, and verify that the server certificate
    /// is issued by a trusted certificate authority (CA).
    VerifyCa,

    /// Only try an SSL connection; verify the CA and that the server host
    /// name matches the certificate.
    VerifyFull,
}

impl FromStr for PgSslMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        Ok(match &*s.to_ascii_lowercase() {
            "disable" => PgSslMode::Disable,
            "allow" => PgSslMode::Allow,
            "prefer" => PgSslMode::Prefer,
            "require" => PgSslMode::Require,
            "verify-ca" => PgSslMode::VerifyCa,
            "verify-full" => PgSslMode::VerifyFull,

            _ => {
                return Err(Error::config(format!("unknown sslmode value: {s:?}")));
            }
        })
    }
}
