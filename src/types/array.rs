use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufExt;
use crate::type_info::PgTypeInfo;
use crate::types::{
    decode_with, encode_with, preferred_format, text_literal, IsNull, PgTypeRegistry, PgValue,
};
use crate::value::{PgValueFormat, PgValueRef};

/// A decoded PostgreSQL array.
///
/// Multi-dimensional arrays are rectangular; elements are stored flattened
/// in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct PgArray {
    pub(crate) element_type: PgTypeInfo,
    pub(crate) dimensions: Vec<PgArrayDimension>,
    pub(crate) elements: Vec<PgValue>,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PgArrayDimension {
    pub len: i32,

    /// The index of the first element in this dimension; PostgreSQL arrays
    /// start at 1 by default.
    pub lower_bound: i32,
}

impl PgArray {
    /// A one-dimensional array with default lower bound.
    pub fn from_values(element_type: PgTypeInfo, elements: Vec<PgValue>) -> Self {
        PgArray {
            element_type,
            dimensions: vec![PgArrayDimension {
                len: elements.len() as i32,
                lower_bound: 1,
            }],
            elements,
        }
    }

    pub fn element_type(&self) -> &PgTypeInfo {
        &self.element_type
    }

    pub fn dimensions(&self) -> &[PgArrayDimension] {
        &self.dimensions
    }

    pub fn elements(&self) -> &[PgValue] {
        &self.elements
    }

    fn expected_len(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(1usize, |acc, dim| {
                acc.checked_mul(usize::try_from(dim.len).ok()?)
            })
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

    if buf.remaining() < 12 {
        return Err(Error::Decode("array header truncated".into()));
    }

    let ndim = buf.get_i32();

    // has_nulls; the per-element lengths carry the same information
    let _ = buf.get_i32();

    let elem_oid = buf.get_u32();

    // when the server's element OID is more specific than what we were told
    // (e.g. a just-introspected enum), prefer the registry's view of it
    let element_type = registry
        .resolve_oid(crate::type_info::Oid(elem_oid))
        .unwrap_or_else(|| element_type.clone());

    if !(0..=6).contains(&ndim) {
        return Err(Error::Decode(
            format!("array has implausible dimension count {ndim}").into(),
        ));
    }

    let mut dimensions = Vec::with_capacity(ndim as usize);
    let mut total = 1usize;

    for _ in 0..ndim {
        if buf.remaining() < 8 {
            return Err(Error::Decode("array dimensions truncated".into()));
        }

        let len = buf.get_i32();
        let lower_bound = buf.get_i32();

        total = total
            .checked_mul(usize::try_from(len).map_err(|_| {
                Error::Decode("array dimension has negative length".into())
            })?)
            .ok_or_else(|| Error::Decode("array is implausibly large".into()))?;

        dimensions.push(PgArrayDimension { len, lower_bound });
    }

    if ndim == 0 {
        total = 0;
    }

    let mut elements = Vec::with_capacity(total.min(4096));

    for _ in 0..total {
        let element = match buf.get_bytes_len_prefixed()? {
            None => PgValue::Null,

            Some(raw) => decode_with(
                registry,
                PgValueRef::new(Some(&raw), PgValueFormat::Binary, element_type.clone()),
            )?,
        };

        elements.push(element);
    }

    Ok(PgValue::Array(PgArray {
        element_type,
        dimensions,
        elements,
    }))
}

pub(crate) fn encode(
    registry: &PgTypeRegistry,
    element_type: &PgTypeInfo,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    let array = match value {
        PgValue::Array(array) => array,
        other => {
            return Err(crate::types::type_mismatch(element_type, other));
        }
    };

    if array.expected_len() != Some(array.elements.len()) {
        return Err(Error::Encode(
            "invalid array: dimensions do not match the element count (ragged input?)".into(),
        ));
    }

    let elem_oid = element_type
        .oid()
        .or_else(|| array.element_type.oid())
        .ok_or_else(|| {
            Error::Encode("cannot encode an array whose element type has no known OID".into())
        })?;

    let has_nulls = array.elements.iter().any(PgValue::is_null);

    buf.extend_from_slice(&(array.dimensions.len() as i32).to_be_bytes());
    buf.extend_from_slice(&(has_nulls as i32).to_be_bytes());
    buf.extend_from_slice(&elem_oid.0.to_be_bytes());

    for dim in &array.dimensions {
        buf.extend_from_slice(&dim.len.to_be_bytes());
        buf.extend_from_slice(&dim.lower_bound.to_be_bytes());
    }

    let elem_format = preferred_format(registry, element_type);

    for element in &array.elements {
        if element.is_null() {
            buf.extend_from_slice(&(-1_i32).to_be_bytes());
            continue;
        }

        let offset = buf.len();
        buf.extend_from_slice(&[0; 4]);

        encode_with(registry, element_type, elem_format, element, buf)?;

        let len = (buf.len() - offset - 4) as i32;
        buf[offset..offset + 4].copy_from_slice(&len.to_be_bytes());
    }

    Ok(IsNull::No)
}

/// Render an array as its `{...}` literal.
pub(crate) fn to_text(
    registry: &PgTypeRegistry,
    _type_info: &PgTypeInfo,
    array: &PgArray,
) -> Result<String, Error> {
    let mut out = String::from("{");

    for (i, element) in array.elements.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }

        match element {
            PgValue::Null => out.push_str("NULL"),

            element => {
                let literal = text_literal(registry, &array.element_type, element)?;
                out.push_str(&quote_element(&literal));
            }
        }
    }

    out.push('}');

    Ok(out)
}

fn quote_element(s: &str) -> String {
    let needs_quotes = s.is_empty()
        || s.eq_ignore_ascii_case("null")
        || s.bytes()
            .any(|b| matches!(b, b',' | b'{' | b'}' | b'"' | b'\\' | b' '));

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
    element_type: &PgTypeInfo,
) -> Result<PgValue, Error> {
    // skip an explicit lower-bound prefix like `[0:2]=`
    let s = match s.find('=') {
        Some(idx) if s.starts_with('[') => &s[idx + 1..],
        _ => s,
    };

    let inner = s
        .strip_prefix('{')
        .and_then(|s| s.strip_suffix('}'))
        .ok_or_else(|| Error::Decode(format!("malformed array literal: {s:?}").into()))?;

    let mut elements = Vec::new();

    for item in split_array_items(inner)? {
        let element = match item {
            ArrayItem::Null => PgValue::Null,

            ArrayItem::Value(text) => decode_with(
                registry,
                PgValueRef::new(
                    Some(text.as_bytes()),
                    PgValueFormat::Text,
                    element_type.clone(),
                ),
            )?,
        };

        elements.push(element);
    }

    Ok(PgValue::Array(PgArray::from_values(
        element_type.clone(),
        elements,
    )))
}

enum ArrayItem {
    Null,
    Value(String),
}

/// Split the inside of a one-dimensional array literal on unquoted commas.
fn split_array_items(s: &str) -> Result<Vec<ArrayItem>, Error> {
    let mut items = Vec::new();

    if s.is_empty() {
        return Ok(items);
    }

    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = s.chars();

    loop {
        match chars.next() {
            Some('"') if !quoted => {
                quoted = true;
                was_quoted = true;
            }

            Some('"') => quoted = false,

            Some('\\') if quoted => {
                current.push(chars.next().ok_or_else(|| {
                    Error::Decode("array literal ends inside an escape".into())
                })?);
            }

            Some(',') if !quoted => {
                items.push(finish_item(&mut current, &mut was_quoted));
            }

            Some(c) => current.push(c),

            None => {
                items.push(finish_item(&mut current, &mut was_quoted));
                break;
            }
        }
    }

    Ok(items)
}

fn finish_item(current: &mut String, was_quoted: &mut bool) -> ArrayItem {
    let text = std::mem::take(current);
    let quoted = std::mem::take(was_quoted);

    if !quoted && text.eq_ignore_ascii_case("null") {
        ArrayItem::Null
    } else {
        ArrayItem::Value(text)
    }
}
