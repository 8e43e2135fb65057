use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufExt;
use crate::type_info::{Oid, PgTypeInfo};
use crate::types::{
    decode_with, encode_with, preferred_format, text_literal, IsNull, PgTypeRegistry, PgValue,
};
use crate::value::{PgValueFormat, PgValueRef};

/// A decoded composite (row) value.
#[derive(Debug, Clone, PartialEq)]
pub struct PgComposite {
    pub(crate) fields: Vec<(String, PgValue)>,
}

impl PgComposite {
    pub fn fields(&self) -> &[(String, PgValue)] {
        &self.fields
    }

    /// The value of the field with the given name.
    pub fn get(&self, name: &str) -> Option<&PgValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn from_fields(fields: Vec<(String, PgValue)>) -> Self {
        PgComposite { fields }
    }
}

/// Decode a composite whose field layout is known from introspection.
pub(crate) fn decode_composite(
    registry: &PgTypeRegistry,
    value: &PgValueRef<'_>,
    fields: &[(String, PgTypeInfo)],
) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => {
            decode_binary(registry, value.as_bytes()?, Some(fields))
        }
        PgValueFormat::Text => decode_text(registry, value.as_str()?, Some(fields)),
    }
}

/// Decode an anonymous `record`; field types come from the wire itself.
pub(crate) fn decode_anonymous(
    registry: &PgTypeRegistry,
    value: &PgValueRef<'_>,
) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => decode_binary(registry, value.as_bytes()?, None),
        PgValueFormat::Text => decode_text(registry, value.as_str()?, None),
    }
}

fn decode_binary(
    registry: &PgTypeRegistry,
    buf: &[u8],
    fields: Option<&[(String, PgTypeInfo)]>,
) -> Result<PgValue, Error> {
    let mut buf = Bytes::copy_from_slice(buf);

    if buf.remaining() < 4 {
        return Err(Error::Decode("composite header truncated".into()));
    }

    let count = buf.get_i32();
    let count = usize::try_from(count)
        .map_err(|_| Error::Decode("composite has negative field count".into()))?;

    if let Some(fields) = fields {
        if fields.len() != count {
            return Err(Error::Decode(
                format!(
                    "composite has {count} fields on the wire but {} in the catalog",
                    fields.len()
                )
                .into(),
            ));
        }
    }

    let mut decoded = Vec::with_capacity(count);

    for index in 0..count {
        if buf.remaining() < 4 {
            return Err(Error::Decode("composite field truncated".into()));
        }

        let oid = Oid(buf.get_u32());

        let (name, type_info) = match fields {
            Some(fields) => {
                let (name, declared) = &fields[index];
                (name.clone(), declared.clone())
            }

            // anonymous records name fields positionally, like the server
            None => (
                format!("f{}", index + 1),
                registry
                    .resolve_oid(oid)
                    .unwrap_or_else(|| PgTypeInfo::with_oid(oid)),
            ),
        };

        let value = match buf.get_bytes_len_prefixed()? {
            None => PgValue::Null,

            Some(raw) => decode_with(
                registry,
                PgValueRef::new(Some(&raw), PgValueFormat::Binary, type_info),
            )?,
        };

        decoded.push((name, value));
    }

    Ok(PgValue::Composite(PgComposite { fields: decoded }))
}

pub(crate) fn encode(
    registry: &PgTypeRegistry,
    fields: &[(String, PgTypeInfo)],
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    let composite = match value {
        PgValue::Composite(v) => v,
        other => {
            return Err(Error::Encode(
                format!("value {other:?} cannot be encoded as a composite").into(),
            ));
        }
    };

    if composite.fields.len() != fields.len() {
        return Err(Error::Encode(
            format!(
                "composite value has {} fields, type has {}",
                composite.fields.len(),
                fields.len()
            )
            .into(),
        ));
    }

    buf.extend_from_slice(&(fields.len() as i32).to_be_bytes());

    for ((_, field_type), (_, field_value)) in fields.iter().zip(&composite.fields) {
        let oid = field_type.oid().unwrap_or_default();
        buf.extend_from_slice(&oid.0.to_be_bytes());

        if field_value.is_null() {
            buf.extend_from_slice(&(-1_i32).to_be_bytes());
            continue;
        }

        let offset = buf.len();
        buf.extend_from_slice(&[0; 4]);

        let format = preferred_format(registry, field_type);
        encode_with(registry, field_type, format, field_value, buf)?;

        let len = (buf.len() - offset - 4) as i32;
        buf[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    }

    Ok(IsNull::No)
}

/// Render a composite as its `(...)` literal.
pub(crate) fn to_text(registry: &PgTypeRegistry, value: &PgComposite) -> Result<String, Error> {
    let mut out = String::from("(");

    for (i, (_, field)) in value.fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }

        match field {
            // NULL renders as nothing between the commas
            PgValue::Null => {}

            field => {
                let literal = text_literal(registry, &PgTypeInfo::TEXT, field)?;
                out.push_str(&quote_field(&literal));
            }
        }
    }

    out.push(')');

    Ok(out)
}

fn quote_field(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.bytes()
            .any(|b| matches!(b, b',' | b'(' | b')' | b'"' | b'\\' | b' '));

    if !needs_quotes {
        return s.to_owned();
    }

    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');

    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }

    out.push('"');
    out
}

fn decode_text(
    registry: &PgTypeRegistry,
    s: &str,
    fields: Option<&[(String, PgTypeInfo)]>,
) -> Result<PgValue, Error> {
    let inner = s
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| Error::Decode(format!("malformed composite literal: {s:?}").into()))?;

    let mut decoded = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut index = 0;
    let mut chars = inner.chars().peekable();

    let mut push_field = |text: String,
                          quoted: bool,
                          index: usize,
                          decoded: &mut Vec<(String, PgValue)>|
     -> Result<(), Error> {
        let (name, type_info) = match fields {
            Some(fields) => match fields.get(index) {
                Some((name, ty)) => (name.clone(), ty.clone()),
                None => {
                    return Err(Error::Decode(
                        "composite literal has more fields than its type".into(),
                    ));
                }
            },
            None => (format!("f{}", index + 1), PgTypeInfo::TEXT),
        };

        let value = if text.is_empty() && !quoted {
            PgValue::Null
        } else {
            decode_with(
                registry,
                PgValueRef::new(Some(text.as_bytes()), PgValueFormat::Text, type_info),
            )?
        };

        decoded.push((name, value));

        Ok(())
    };

    loop {
        match chars.next() {
            Some('"') if !quoted => {
                // doubled quotes inside a quoted field are literal quotes
                quoted = true;
                was_quoted = true;
            }

            Some('"') if chars.peek() == Some(&'"') => {
                chars.next();
                current.push('"');
            }

            Some('"') => quoted = false,

            Some('\\') if quoted => {
                current.push(chars.next().ok_or_else(|| {
                    Error::Decode("composite literal ends inside an escape".into())
                })?);
            }

            Some(',') if !quoted => {
                push_field(
                    std::mem::take(&mut current),
                    std::mem::take(&mut was_quoted),
                    index,
                    &mut decoded,
                )?;
                index += 1;
            }

            Some(c) => current.push(c),

            None => {
                if !inner.is_empty() || index > 0 {
                    push_field(
                        std::mem::take(&mut current),
                        std::mem::take(&mut was_quoted),
                        index,
                        &mut decoded,
                    )?;
                }
                break;
            }
        }
    }

    Ok(PgValue::Composite(PgComposite { fields: decoded }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PgTypeRegistry {
        PgTypeRegistry::new()
    }

    fn fields() -> Vec<(String, PgTypeInfo)> {
        vec![
            ("id".to_owned(), PgTypeInfo::INT4),
            ("label".to_owned(), PgTypeInfo::TEXT),
        ]
    }

    #[test]
    fn binary_round_trip() {
        let composite = PgValue::Composite(PgComposite::from_fields(vec![
            ("id".to_owned(), PgValue::Int4(7)),
            ("label".to_owned(), PgValue::Text("seven".to_owned())),
        ]));

        let mut buf = Vec::new();
        encode(&registry(), &fields(), &composite, &mut buf).unwrap();

        let decoded = decode_binary(&registry(), &buf, Some(&fields())).unwrap();
        assert_eq!(decoded, composite);
    }

    #[test]
    fn field_count_mismatch_is_an_error() {
        let short = PgValue::Composite(PgComposite::from_fields(vec![(
            "id".to_owned(),
            PgValue::Int4(7),
        )]));

        let mut buf = Vec::new();
        assert!(encode(&registry(), &fields(), &short, &mut buf).is_err());
    }

    #[test]
    fn parses_text_literal_with_null() {
        let decoded = decode_text(&registry(), r#"(7,)"#, Some(&fields())).unwrap();

        match decoded {
            PgValue::Composite(c) => {
                assert_eq!(c.get("id"), Some(&PgValue::Int4(7)));
                assert_eq!(c.get("label"), Some(&PgValue::Null));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn quoted_fields_keep_commas() {
        let decoded = decode_text(&registry(), r#"(1,"a,b")"#, Some(&fields())).unwrap();

        match decoded {
            PgValue::Composite(c) => {
                assert_eq!(c.get("label"), Some(&PgValue::Text("a,b".to_owned())));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
