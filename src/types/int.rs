use bytes::Buf;

use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo};
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => {
            let mut buf = value.as_bytes()?;

            Ok(match (&value.type_info.0, buf.len()) {
                (PgType::Int2, 2) => PgValue::Int2(buf.get_i16()),
                (PgType::Int4, 4) => PgValue::Int4(buf.get_i32()),
                (PgType::Int8, 8) => PgValue::Int8(buf.get_i64()),
                (PgType::Oid, 4) => PgValue::Int8(i64::from(buf.get_u32())),

                (ty, n) => {
                    return Err(Error::Decode(
                        format!("invalid length {n} for {}", ty.name()).into(),
                    ));
                }
            })
        }

        PgValueFormat::Text => {
            let s = value.as_str()?;

            Ok(match value.type_info.0 {
                PgType::Int2 => PgValue::Int2(s.parse().map_err(Error::decode)?),
                PgType::Int4 => PgValue::Int4(s.parse().map_err(Error::decode)?),
                _ => PgValue::Int8(s.parse().map_err(Error::decode)?),
            })
        }
    }
}

pub(crate) fn encode(expected: &PgType, value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    // integer arguments widen implicitly but never truncate
    let v = value
        .as_i64()
        .ok_or_else(|| type_mismatch(&PgTypeInfo(expected.clone()), value))?;

    match expected {
        PgType::Int2 => {
            let v = i16::try_from(v).map_err(|_| {
                Error::Encode(format!("value {v} out of range for int2").into())
            })?;
            buf.extend_from_slice(&v.to_be_bytes());
        }

        PgType::Int4 => {
            let v = i32::try_from(v).map_err(|_| {
                Error::Encode(format!("value {v} out of range for int4").into())
            })?;
            buf.extend_from_slice(&v.to_be_bytes());
        }

        PgType::Oid => {
            let v = u32::try_from(v).map_err(|_| {
                Error::Encode(format!("value {v} out of range for oid").into())
            })?;
            buf.extend_from_slice(&v.to_be_bytes());
        }

        _ => buf.extend_from_slice(&v.to_be_bytes()),
    }

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let mut buf = Vec::new();
        encode(&PgType::Int4, &PgValue::Int4(42), &mut buf).unwrap();
        assert_eq!(buf, 42_i32.to_be_bytes());

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo::INT4);
        assert_eq!(decode(&value).unwrap(), PgValue::Int4(42));
    }

    #[test]
    fn widens_but_does_not_truncate() {
        let mut buf = Vec::new();

        // int2 value into an int8 parameter widens
        encode(&PgType::Int8, &PgValue::Int2(7), &mut buf).unwrap();
        assert_eq!(buf, 7_i64.to_be_bytes());

        // int8 value into an int2 parameter fails loudly
        buf.clear();
        assert!(encode(&PgType::Int2, &PgValue::Int8(1 << 40), &mut buf).is_err());
    }

    #[test]
    fn decodes_text_format() {
        let value = PgValueRef::new(Some(b"-123"), PgValueFormat::Text, PgTypeInfo::INT4);
        assert_eq!(decode(&value).unwrap(), PgValue::Int4(-123));
    }
}
