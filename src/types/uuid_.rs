use uuid::Uuid;

use crate::error::Error;
use crate::type_info::PgTypeInfo;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let v = match value.format {
        PgValueFormat::Binary => Uuid::from_slice(value.as_bytes()?).map_err(Error::decode)?,
        PgValueFormat::Text => value.as_str()?.parse().map_err(Error::decode)?,
    };

    Ok(PgValue::Uuid(v))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Uuid(v) => buf.extend_from_slice(v.as_bytes()),

        // accept the canonical string form as well
        PgValue::Text(v) => {
            let parsed: Uuid = v.parse().map_err(Error::encode)?;
            buf.extend_from_slice(parsed.as_bytes());
        }

        other => return Err(type_mismatch(&PgTypeInfo::UUID, other)),
    }

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_round_trip() {
        let id = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);

        let mut buf = Vec::new();
        encode(&PgValue::Uuid(id), &mut buf).unwrap();
        assert_eq!(buf.len(), 16);

        let value = PgValueRef::new(Some(&buf), PgValueFormat::Binary, PgTypeInfo::UUID);
        assert_eq!(decode(&value).unwrap(), PgValue::Uuid(id));
    }
}
