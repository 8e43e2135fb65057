use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufExt;
use crate::type_info::PgTypeInfo;
use crate::types::{
    decode_with, encode_with, preferred_format, text_literal, IsNull, PgTypeRegistry, PgValue,
};
use crate::value::{PgValueFormat, PgValueRef};

// flag bits, per rangetypes.h
const RANGE_EMPTY: u8 = 0x01;
const RANGE_LB_INC: u8 = 0x02;
const RANGE_UB_INC: u8 = 0x04;
const RANGE_LB_INF: u8 = 0x08;
const RANGE_UB_INF: u8 = 0x10;

/// One bound of a range value.
#[derive(Debug, Clone, PartialEq)]
pub enum PgRangeBound {
    /// The range extends without limit on this side.
    Unbounded,
    Inclusive(PgValue),
    Exclusive(PgValue),
}

/// A decoded range value.
#[derive(Debug, Clone, PartialEq)]
pub struct PgRange {
    pub lower: PgRangeBound,
    pub upper: PgRangeBound,

    /// An empty range contains no points; its bounds are meaningless.
    pub is_empty: bool,
}

impl PgRange {
    pub fn empty() -> Self {
        PgRange {
            lower: PgRangeBound::Unbounded,
            upper: PgRangeBound::Unbounded,
            is_empty: true,
        }
    }
}

pub(crate) fn decode(
    registry: &PgTypeRegistry,
    value: &PgValueRef<'_>,
    element_type: &PgTypeInfo,
) -> Result<PgValue, Error> {
    match value.format {
        PgValueFormat::Binary => decode_binary(registry, value.as_bytes()?, element_type),
        PgValueFormat::Text => decode_text(registry, value.as_str()?, element_type),
    }
}

fn decode_binary(
    registry: &PgTypeRegistry,
    buf: &[u8],
    element_type: &PgTypeInfo,
) -> Result<PgValue, Error> {
    let mut buf = Bytes::copy_from_slice(buf);

    if buf.remaining() < 1 {
        return Err(Error::Decode("range value is empty".into()));
    }

    let flags = buf.get_u8();

    if flags & RANGE_EMPTY != 0 {
        return Ok(PgValue::Range(Box::new(PgRange::empty())));
    }

    let mut read_bound = |present: bool, inclusive: bool| -> Result<PgRangeBound, Error> {
        if !present {
            return Ok(PgRangeBound::Unbounded);
        }

        let value = match buf.get_bytes_len_prefixed()? {
            None => PgValue::Null,

            Some(raw) => decode_with(
                registry,
                PgValueRef::new(Some(&raw), PgValueFormat::Binary, element_type.clone()),
            )?,
        };

        Ok(if inclusive {
            PgRangeBound::Inclusive(value)
        } else {
            PgRangeBound::Exclusive(value)
        })
    };

    let lower = read_bound(flags & RANGE_LB_INF == 0, flags & RANGE_LB_INC != 0)?;
    let upper = read_bound(flags & RANGE_UB_INF == 0, flags & RANGE_UB_INC != 0)?;

    Ok(PgValue::Range(Box::new(PgRange {
        lower,
        upper,
        is_empty: false,
    })))
}

pub(crate) fn encode(
    registry: &PgTypeRegistry,
    element_type: &PgTypeInfo,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    let range = match value {
        PgValue::Range(v) => v,
        other => return Err(crate::types::type_mismatch(element_type, other)),
    };

    if range.is_empty {
        buf.push(RANGE_EMPTY);
        return Ok(IsNull::No);
    }

    let mut flags = 0u8;

    match &range.lower {
        PgRangeBound::Unbounded => flags |= RANGE_LB_INF,
        PgRangeBound::Inclusive(_) => flags |= RANGE_LB_INC,
        PgRangeBound::Exclusive(_) => {}
    }

    match &range.upper {
        PgRangeBound::Unbounded => flags |= RANGE_UB_INF,
        PgRangeBound::Inclusive(_) => flags |= RANGE_UB_INC,
        PgRangeBound::Exclusive(_) => {}
    }

    buf.push(flags);

    let format = preferred_format(registry, element_type);

    for bound in [&range.lower, &range.upper] {
        let value = match bound {
            PgRangeBound::Unbounded => continue,
            PgRangeBound::Inclusive(v) | PgRangeBound::Exclusive(v) => v,
        };

        let offset = buf.len();
        buf.extend_from_slice(&[0; 4]);

        encode_with(registry, element_type, format, value, buf)?;

        let len = (buf.len() - offset - 4) as i32;
        buf[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    }

    Ok(IsNull::No)
}

/// Render a range as its text literal, e.g. `[1,10)`.
pub(crate) fn to_text(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
    range: &PgRange,
) -> Result<String, Error> {
    if range.is_empty {
        return Ok("empty".to_owned());
    }

    let element_type = match type_info.kind() {
        crate::type_info::PgTypeKind::Range(elem) => elem,
        _ => PgTypeInfo::TEXT,
    };

    let mut out = String::new();

    match &range.lower {
        PgRangeBound::Unbounded => out.push('('),
        PgRangeBound::Inclusive(v) => {
            out.push('[');
            out.push_str(&text_literal(registry, &element_type, v)?);
        }
        PgRangeBound::Exclusive(v) => {
            out.push('(');
            out.push_str(&text_literal(registry, &element_type, v)?);
        }
    }

    out.push(',');

    match &range.upper {
        PgRangeBound::Unbounded => out.push(')'),
        PgRangeBound::Inclusive(v) => {
            out.push_str(&text_literal(registry, &element_type, v)?);
            out.push(']');
        }
        PgRangeBound::Exclusive(v) => {
            out.push_str(&text_literal(registry, &element_type, v)?);
            out.push(')');
        }
    }

    Ok(out)
}

fn decode_text(
    registry: &PgTypeRegistry,
    s: &str,
    element_type: &PgTypeInfo,
) -> Result<PgValue, Error> {
    if s == "empty" {
        return Ok(PgValue::Range(Box::new(PgRange::empty())));
    }

    let malformed = || Error::Decode(format!("malformed range literal: {s:?}").into());

    let lower_inclusive = match s.as_bytes().first() {
        Some(b'[') => true,
        Some(b'(') => false,
        _ => return Err(malformed()),
    };

    let upper_inclusive = match s.as_bytes().last() {
        Some(b']') => true,
        Some(b')') => false,
        _ => return Err(malformed()),
    };

    let inner = &s[1..s.len() - 1];

    // bounds containing commas arrive quoted; this driver renders and
    // accepts the unquoted common cases (numbers, timestamps, dates)
    let (lower_text, upper_text) = inner.split_once(',').ok_or_else(malformed)?;

    let mut parse_bound = |text: &str, inclusive: bool| -> Result<PgRangeBound, Error> {
        let text = text.trim().trim_matches('"');

        if text.is_empty() {
            return Ok(PgRangeBound::Unbounded);
        }

        let value = decode_with(
            registry,
            PgValueRef::new(
                Some(text.as_bytes()),
                PgValueFormat::Text,
                element_type.clone(),
            ),
        )?;

        Ok(if inclusive {
            PgRangeBound::Inclusive(value)
        } else {
            PgRangeBound::Exclusive(value)
        })
    };

    Ok(PgValue::Range(Box::new(PgRange {
        lower: parse_bound(lower_text, lower_inclusive)?,
        upper: parse_bound(upper_text, upper_inclusive)?,
        is_empty: false,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PgTypeRegistry {
        PgTypeRegistry::new()
    }

    #[test]
    fn binary_round_trip() {
        let range = PgValue::Range(Box::new(PgRange {
            lower: PgRangeBound::Inclusive(PgValue::Int4(1)),
            upper: PgRangeBound::Exclusive(PgValue::Int4(10)),
            is_empty: false,
        }));

        let mut buf = Vec::new();
        encode(&registry(), &PgTypeInfo::INT4, &range, &mut buf).unwrap();
        assert_eq!(buf[0], RANGE_LB_INC);

        let decoded = decode_binary(&registry(), &buf, &PgTypeInfo::INT4).unwrap();
        assert_eq!(decoded, range);
    }

    #[test]
    fn empty_range_is_one_flag_byte() {
        let mut buf = Vec::new();
        encode(
            &registry(),
            &PgTypeInfo::INT4,
            &PgValue::Range(Box::new(PgRange::empty())),
            &mut buf,
        )
        .unwrap();

        assert_eq!(buf, [RANGE_EMPTY]);
    }

    #[test]
    fn parses_text_literal() {
        let decoded = decode_text(&registry(), "[1,10)", &PgTypeInfo::INT4).unwrap();

        match decoded {
            PgValue::Range(range) => {
                assert_eq!(range.lower, PgRangeBound::Inclusive(PgValue::Int4(1)));
                assert_eq!(range.upper, PgRangeBound::Exclusive(PgValue::Int4(10)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unbounded_sides_parse() {
        let decoded = decode_text(&registry(), "(,5]", &PgTypeInfo::INT4).unwrap();

        match decoded {
            PgValue::Range(range) => {
                assert_eq!(range.lower, PgRangeBound::Unbounded);
                assert_eq!(range.upper, PgRangeBound::Inclusive(PgValue::Int4(5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
