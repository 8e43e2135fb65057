use crate::error::Error;
use crate::type_info::PgTypeInfo;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => Ok(PgValue::Bytea(value.as_bytes()?.to_vec())),

        PgValueFormat::Text => {
            // bytea_output = hex (the default since 9.0): `\x` then hex digits
            let s = value.as_str()?;

            let Some(hex) = s.strip_prefix("\\x") else {
                return Err(Error::Decode(
                    "unsupported bytea text encoding (expected hex format)".into(),
                ));
            };

            if hex.len() % 2 != 0 {
                return Err(Error::Decode("odd number of digits in hex bytea".into()));
            }

            let bytes = (0..hex.len())
                .step_by(2)
                .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).map_err(Error::decode))
                .collect::<Result<Vec<u8>, Error>>()?;

            Ok(PgValue::Bytea(bytes))
        }
    }
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Bytea(v) => buf.extend_from_slice(v),
        PgValue::Text(v) => buf.extend_from_slice(v.as_bytes()),
        other => return Err(type_mismatch(&PgTypeInfo(crate::type_info::PgType::Bytea), other)),
    }

    Ok(IsNull::No)
}

pub(crate) fn to_text(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");

    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_hex_text_format() {
        let value = PgValueRef::new(
            Some(b"\\xdeadbeef"),
            PgValueFormat::Text,
            PgTypeInfo(crate::type_info::PgType::Bytea),
        );

        assert_eq!(
            decode(&value).unwrap(),
            PgValue::Bytea(vec![0xde, 0xad, 0xbe, 0xef])
        );
    }

    #[test]
    fn text_round_trip() {
        assert_eq!(to_text(&[0xde, 0xad]), "\\xdead");
    }
}
