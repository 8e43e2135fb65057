use bytes::{Buf, Bytes};
use memchr::memchr;

use crate::error::Error;

pub(crate) trait BufExt: Buf {
    /// Read a NUL-terminated string; the NUL is consumed but not returned.
    fn get_str_nul(&mut self) -> Result<String, Error>;

    /// Read a 4-byte signed length followed by that many bytes.
    ///
    /// A length of `-1` is the wire representation of SQL `NULL` and
    /// yields `None`.
    fn get_bytes_len_prefixed(&mut self) -> Result<Option<Bytes>, Error>;
}

impl BufExt for Bytes {
    fn get_str_nul(&mut self) -> Result<String, Error> {
        let nul = memchr(b'\0', self)
            .ok_or_else(|| err_protocol!("expected NUL terminator in message"))?;

        let s = std::str::from_utf8(&self[..nul])
            .map_err(|err| err_protocol!("{err} while decoding string"))?
            .to_owned();

        self.advance(nul + 1);

        Ok(s)
    }

    fn get_bytes_len_prefixed(&mut self) -> Result<Option<Bytes>, Error> {
        if self.remaining() < 4 {
            return Err(err_protocol!(
                "expected 4-byte length prefix, found {} bytes",
                self.remaining()
            ));
        }

        let len = self.get_i32();

        if len == -1 {
            return Ok(None);
        }

        let len = usize::try_from(len)
            .map_err(|_| err_protocol!("negative length prefix: {len}"))?;

        if self.remaining() < len {
            return Err(err_protocol!(
                "expected {len} bytes for value, found {}",
                self.remaining()
            ));
        }

        Ok(Some(self.split_to(len)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_nul_terminated_strings() {
        let mut buf = Bytes::from_static(b"hello\0world\0");

        assert_eq!(buf.get_str_nul().unwrap(), "hello");
        assert_eq!(buf.get_str_nul().unwrap(), "world");
        assert!(buf.get_str_nul().is_err());
    }

    #[test]
    fn reads_length_prefixed_bytes() {
        let mut buf = Bytes::from_static(b"\x00\x00\x00\x02hi\xff\xff\xff\xff");

        assert_eq!(
            buf.get_bytes_len_prefixed().unwrap().as_deref(),
            Some(&b"hi"[..])
        );

        // -1 encodes NULL
        assert_eq!(buf.get_bytes_len_prefixed().unwrap(), None);
    }

    #[test]
    fn rejects_truncated_values() {
        let mut buf = Bytes::from_static(b"\x00\x00\x00\x09hi");

        assert!(matches!(
            buf.get_bytes_len_prefixed(),
            Err(Error::Protocol(_))
        ));
    }
}
