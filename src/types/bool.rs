use crate::error::Error;
use crate::types::{type_mismatch, IsNull, PgValue};
use crate::value::{PgValueFormat, PgValueRef};

pub(crate) fn decode(value: &PgValueRef<'_>) -> Result<PgValue, Error> {
    let v = match value.format {
        PgValueFormat::Binary => value.as_bytes()?[0] != 0,

        PgValueFormat::Text => match value.as_str()? {
            "t" => true,
            "f" => false,

            s => {
                return Err(Error::Decode(
                    format!("unexpected value {s:?} for boolean").into(),
                ));
            }
        },
    };

    Ok(PgValue::Bool(v))
}

pub(crate) fn encode(value: &PgValue, buf: &mut Vec<u8>) -> Result<IsNull, Error> {
    match value {
        PgValue::Bool(v) => buf.push(*v as u8),
        other => return Err(type_mismatch(&crate::type_info::PgTypeInfo::BOOL, other)),
    }

    Ok(IsNull::No)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_info::PgTypeInfo;

    #[test]
    fn decodes_both_formats() {
        let binary = PgValueRef::new(Some(&[1]), PgValueFormat::Binary, PgTypeInfo::BOOL);
        assert_eq!(decode(&binary).unwrap(), PgValue::Bool(true));

        let text = PgValueRef::new(Some(b"f"), PgValueFormat::Text, PgTypeInfo::BOOL);
        assert_eq!(decode(&text).unwrap(), PgValue::Bool(false));
    }
}
