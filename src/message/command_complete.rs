use bytes::Bytes;
use memchr::memrchr;

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};

/// Completion of a single SQL command; the tag names the command and, for
/// most commands, ends with the affected-row count.
#[derive(Debug)]
pub(crate) struct CommandComplete {
    tag: Bytes,
}

impl CommandComplete {
    /// The full command tag, e.g. `INSERT 0 1` or `SELECT 3`.
    pub fn tag(&self) -> &str {
        // the tag is NUL-terminated ASCII by construction
        std::str::from_utf8(&self.tag)
            .unwrap_or_default()
            .trim_end_matches('\0')
    }

    /// The number of rows affected, parsed from the trailing token of the
    /// tag; commands without a count (e.g. `BEGIN`) report zero.
    pub fn rows_affected(&self) -> u64 {
        let tag = self.tag();

        match memrchr(b' ', tag.as_bytes()) {
            Some(offset) => tag[offset + 1..].parse().unwrap_or(0),
            None => 0,
        }
    }
}

impl BackendMessage for CommandComplete {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::CommandComplete;

    fn decode_body(buf: Bytes) -> Result<Self, Error> {
        Ok(CommandComplete { tag: buf })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete(tag: &'static [u8]) -> CommandComplete {
        CommandComplete::decode_body(Bytes::from_static(tag)).unwrap()
    }

    #[test]
    fn parses_rows_affected() {
        assert_eq!(complete(b"INSERT 0 42\0").rows_affected(), 42);
        assert_eq!(complete(b"UPDATE 7\0").rows_affected(), 7);
        assert_eq!(complete(b"SELECT 3\0").rows_affected(), 3);
        assert_eq!(complete(b"COPY 9000\0").rows_affected(), 9000);
    }

    #[test]
    fn commands_without_count_report_zero() {
        assert_eq!(complete(b"BEGIN\0").rows_affected(), 0);
        assert_eq!(complete(b"CREATE TABLE\0").rows_affected(), 0);
    }

    #[test]
    fn exposes_trimmed_tag() {
        assert_eq!(complete(b"CREATE TABLE\0").tag(), "CREATE TABLE");
    }
}
