use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo};
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let mut buf = value.as_bytes()?;

    // In binary format, `jsonb` is versioned: one leading byte (currently 1)
    // before the JSON text. `json` and all text-format values are the text
    // as-is.
    if matches!(value.type_info.0, PgType::Jsonb) && value.format == PgValueFormat::Binary {
        match buf.first() {
            Some(1) => buf = &buf[1..],

            version => {
                return Err(Error::Decode(
                    format!("unsupported jsonb format version {version:?}").into(),
                ));
            }
        }
    }

    Ok(PgValue::Json(
        serde_json::from_slice(buf).map_err(Error::decode)?,
    ))
}

pub(crate) fn encode(expected: &PgType, value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    if matches!(expected, PgType::Jsonb) {
        buf.push(1);
    }

    match value {
        PgValue::Json(v) => {
            serde_json::to_writer(&mut *buf, v).map_err(Error::encode)?;
        }

        // a string is taken as already-serialized JSON
        PgValue::Text(v) => buf.extend_from_slice(v.as_bytes()),

        other => return Err(type_mismatch(&PgTypeInfo(expected.clone()), other)),
    }

    Ok(IsNull::No)
}
