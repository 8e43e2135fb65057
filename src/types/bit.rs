use std::fmt::{self, Display, Formatter};

use bytes::Buf;

use crate::error::Error;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

/// A `bit` or `varbit` value: a string of bits, most significant first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PgBitString {
    /// Number of significant bits.
    pub len: usize,

    /// Packed bits; the final byte is zero-padded on the right.
    pub bytes: Vec<u8>,
}

impl PgBitString {
    /// The bit at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }

        let byte = self.bytes[index / 8];

        Some(byte & (0x80 >> (index % 8)) != 0)
    }
}

impl Display for PgBitString {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for i in 0..self.len {
            f.write_str(if self.get(i) == Some(true) { "1" } else { "0" })?;
        }

        Ok(())
    }
}

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let v = match value.format {
        PgValueFormat::Binary => {
            let mut buf = value.as_bytes()?;

            if buf.len() < 4 {
                return Err(Error::Decode("bit string is too short".into()));
            }

            let len = buf.get_i32();
            let len = usize::try_from(len)
                .map_err(|_| Error::Decode("negative bit string length".into()))?;

            if buf.len() != len.div_ceil(8) {
                return Err(Error::Decode("bit string length mismatch".into()));
            }

            PgBitString {
                len,
                bytes: buf.to_vec(),
            }
        }

        PgValueFormat::Text => {
            let s = value.as_str()?;
            let mut bytes = vec![0u8; s.len().div_ceil(8)];

            for (i, c) in s.bytes().enumerate() {
                match c {
                    b'1' => bytes[i / 8] |= 0x80 >> (i % 8),
                    b'0' => {}

                    other => {
                        return Err(Error::Decode(
                            format!("unexpected character {:?} in bit string", other as char)
                                .into(),
                        ));
                    }
                }
            }

            PgBitString { len: s.len(), bytes }
        }
    };

    Ok(PgValue::Bit(v))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Bit(v) => {
            let len = i32::try_from(v.len)
                .map_err(|_| Error::Encode("bit string too long".into()))?;

            buf.extend_from_slice(&len.to_be_bytes());
            buf.extend_from_slice(&v.bytes);
        }

        other => {
            return Err(type_mismatch(
                &crate::type_info::PgTypeInfo(crate::type_info::PgType::Varbit),
                other,
            ));
        }
    }

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::{PgType, PgTypeInfo};

    #[test]
    fn text_and_binary_agree() {
        let text = PgValueRef::new(
            Some(b"101100101"),
            PgValueFormat::Text,
            PgTypeInfo(PgType::Varbit),
        );

        let decoded = decode(&text).unwrap();

        let mut buf = Vec::new();
        encode(&decoded, &mut buf).unwrap();

        let binary = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo(PgType::Varbit));
        assert_eq!(decode(&binary).unwrap(), decoded);

        match decoded {
            PgValue::Bit(bits) => assert_eq!(bits.to_string(), "101100101"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
