use crate::error::Error;

pub(crate) trait BufMutExt {
    /// Write a length-prefixed section.
    ///
    /// Nearly every message carries its own length up front, but bodies are
    /// assembled in order without knowing their final size; 4 bytes are
    /// reserved and back-patched once the closure returns. If the closure
    /// fails the buffer is restored to its previous length.
    fn put_length_prefixed<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), Error>;

    /// Write a string followed by a NUL terminator.
    fn put_str_nul(&mut self, s: &str);
}

impl BufMutExt for Vec<u8> {
    fn put_length_prefixed<F>(&mut self, f: F) -> Result<(), Error>
    where
        F: FnOnce(&mut Vec<u8>) -> Result<(), Error>,
    {
        let offset = self.len();
        self.extend_from_slice(&[0; 4]);

        if let Err(e) = f(self) {
            self.truncate(offset);
            return Err(e);
        }

        let size = (self.len() - offset) as i32;
        self[offset..offset + 4].copy_from_slice(&size.to_be_bytes());

        Ok(())
    }

    fn put_str_nul(&mut self, s: &str) {
        self.extend_from_slice(s.as_bytes());
        self.push(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patches_length_over_reserved_bytes() {
        let mut buf = Vec::new();
        buf.push(b'X');

        buf.put_length_prefixed(|buf| {
            buf.extend_from_slice(b"abcd");
            Ok(())
        })
        .unwrap();

        // length includes the 4-byte prefix itself
        assert_eq!(buf, b"X\x00\x00\x00\x08abcd");
    }

    #[test]
    fn nested_length_prefixes() {
        let mut buf = Vec::new();

        buf.put_length_prefixed(|buf| {
            buf.put_length_prefixed(|buf| {
                buf.push(7);
                Ok(())
            })
        })
        .unwrap();

        assert_eq!(buf, b"\x00\x00\x00\x09\x00\x00\x00\x05\x07");
    }

    #[test]
    fn rolls_back_on_error() {
        let mut buf = b"keep".to_vec();

        let result = buf.put_length_prefixed(|buf| {
            buf.extend_from_slice(b"discarded");
            Err(Error::Protocol("boom".into()))
        });

        assert!(result.is_err());
        assert_eq!(buf, b"keep");
    }
}
