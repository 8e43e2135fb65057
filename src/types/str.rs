use crate::error::Error;
use crate::type_info::PgTypeInfo;
use crate::types::{scalar_literal, type_mismatch, IsNull, PgValue};
use crate::value::PgValueRef;

// The text family shares one wire representation in both formats: the bytes
// of the string itself. This also covers enum labels, `money`, `xml`, and
// values of types the driver cannot interpret structurally.

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    Ok(PgValue::Text(value.as_str()?.to_owned()))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Text(v) => buf.extend_from_slice(v.as_bytes()),

        // any scalar can be sent where the server expects text
        other => {
            let literal = scalar_literal(other)
                .ok_or_else(|| type_mismatch(&PgTypeInfo::TEXT, other))?;

            buf.extend_from_slice(literal.as_bytes());
        }
    }

    Ok(IsNull::No)
}
