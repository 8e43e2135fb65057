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
                (PgType::Float4, 4) => PgValue::Float4(buf.get_f32()),
                (PgType::Float8, 8) => PgValue::Float8(buf.get_f64()),

                (ty, n) => {
                    return Err(Error::Decode(
                        format!("invalid length {n} for {}", ty.name()).into(),
                    ));
                }
            })
        }

        PgValueFormat::Text => {
            let v = parse_text(value.as_str()?)?;

            Ok(match value.type_info.0 {
                PgType::Float4 => PgValue::Float4(v as f32),
                _ => PgValue::Float8(v),
            })
        }
    }
}

fn parse_text(s: &str) -> Result<f64, Error> {
    Ok(match s {
        "NaN" => f64::NAN,
        "Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        other => other.parse().map_err(Error::decode)?,
    })
}

pub(crate) fn encode(expected: &PgType, value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match (expected, value) {
        (PgType::Float4, PgValue::Float4(v)) => buf.extend_from_slice(&v.to_be_bytes()),
        (PgType::Float8, PgValue::Float8(v)) => buf.extend_from_slice(&v.to_be_bytes()),

        // float4 arguments widen into float8 parameters
        (PgType::Float8, PgValue::Float4(v)) => {
            buf.extend_from_slice(&f64::from(*v).to_be_bytes());
        }

        // integers are accepted where the server asked for a float
        (PgType::Float8, v) if v.as_i64().is_some() => {
            buf.extend_from_slice(&(v.as_i64().unwrap() as f64).to_be_bytes());
        }

        (expected, value) => return Err(type_mismatch(&PgTypeInfo(expected.clone()), value)),
    }

    Ok(IsNull::No)
}

/// Text-format rendering matching the server's spellings of the specials.
pub(crate) fn to_text(v: f64) -> String {
    if v.is_nan() {
        "NaN".to_owned()
    } else if v == f64::INFINITY {
        "Infinity".to_owned()
    } else if v == f64::NEG_INFINITY {
        "-Infinity".to_owned()
    } else {
        v.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let mut buf = Vec::new();
        encode(&PgType::Float8, &PgValue::Float8(1.5), &mut buf).unwrap();

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo::FLOAT8);
        assert_eq!(decode(&value).unwrap(), PgValue::Float8(1.5));
    }

    #[test]
    fn decodes_text_specials() {
        for (text, check) in [
            ("NaN", f64::is_nan as fn(f64) -> bool),
            ("Infinity", |v| v == f64::INFINITY),
            ("-Infinity", |v| v == f64::NEG_INFINITY),
        ] {
            let value = PgValueRef::new(
                Some(text.as_bytes()),
                PgValueFormat::Text,
                PgTypeInfo::FLOAT8,
            );

            match decode(&value).unwrap() {
                PgValue::Float8(v) => assert!(check(v), "{text}"),
                other => panic!("unexpected {other:?}"),
            }
        }
    }
}
