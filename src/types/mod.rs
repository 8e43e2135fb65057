use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::type_info::{PgType, PgTypeInfo, PgTypeKind};
use crate::value::{PgValueFormat, PgValueRef};

mod array;
mod bit;
mod bool;
mod bytes;
mod datetime;
mod float;
mod geometry;
mod int;
mod interval;
mod json;
mod net;
mod numeric;
mod range;
mod record;
mod registry;
mod str;
mod uuid_;

pub use array::{PgArray, PgArrayDimension};
pub use bit::PgBitString;
pub use geometry::{PgBox, PgCircle, PgLine, PgLseg, PgPath, PgPoint, PgPolygon};
pub use interval::PgInterval;
pub use net::PgInet;
pub use numeric::PgNumeric;
pub use range::{PgRange, PgRangeBound};
pub use record::PgComposite;
pub use registry::PgTypeRegistry;
pub(crate) use registry::SharedTypeCache;
pub use datetime::PgTimeTz;

/// Whether an encoded argument is SQL `NULL`.
///
/// Returned by codecs so the driver can frame the value as length −1
/// instead of a payload.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum IsNull {
    Yes,
    No,
}

/// A single decoded PostgreSQL value.
///
/// The driver decodes every result column into this dynamic representation
/// through the connection's [`PgTypeRegistry`]; arguments are encoded from
/// it, coerced to the parameter type the server expects.
#[derive(Debug, Clone, PartialEq)]
pub enum PgValue {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    Numeric(PgNumeric),
    Text(String),
    Bytea(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    TimeTz(PgTimeTz),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Interval(PgInterval),
    Json(serde_json::Value),
    Inet(PgInet),
    Macaddr([u8; 6]),
    Bit(PgBitString),
    Point(PgPoint),
    Line(PgLine),
    Lseg(PgLseg),
    Box(PgBox),
    Path(PgPath),
    Polygon(PgPolygon),
    Circle(PgCircle),
    Array(PgArray),
    Composite(PgComposite),
    Range(Box<PgRange>),
}

impl PgValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PgValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PgValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i16(&self) -> Option<i16> {
        match self {
            PgValue::Int2(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            PgValue::Int2(v) => Some(i32::from(*v)),
            PgValue::Int4(v) => Some(*v),
            _ => None,
        }
    }

    /// Any integer value, widened.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PgValue::Int2(v) => Some(i64::from(*v)),
            PgValue::Int4(v) => Some(i64::from(*v)),
            PgValue::Int8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            PgValue::Float4(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PgValue::Float4(v) => Some(f64::from(*v)),
            PgValue::Float8(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PgValue::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PgValue::Bytea(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_uuid(&self) -> Option<Uuid> {
        match self {
            PgValue::Uuid(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            PgValue::Json(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PgArray> {
        match self {
            PgValue::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_composite(&self) -> Option<&PgComposite> {
        match self {
            PgValue::Composite(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_range(&self) -> Option<&PgRange> {
        match self {
            PgValue::Range(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! impl_value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PgValue {
                fn from(value: $ty) -> Self {
                    PgValue::$variant(value.into())
                }
            }
        )*
    };
}

impl_value_from! {
    bool => Bool,
    i16 => Int2,
    i32 => Int4,
    i64 => Int8,
    f32 => Float4,
    f64 => Float8,
    &str => Text,
    String => Text,
    Vec<u8> => Bytea,
    &[u8] => Bytea,
    Uuid => Uuid,
    NaiveDate => Date,
    NaiveTime => Time,
    NaiveDateTime => Timestamp,
    DateTime<Utc> => TimestampTz,
    serde_json::Value => Json,
    PgNumeric => Numeric,
    PgInterval => Interval,
    PgInet => Inet,
    PgArray => Array,
    PgComposite => Composite,
}

impl<T: Into<PgValue>> From<Option<T>> for PgValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(PgValue::Null)
    }
}

impl From<PgRange> for PgValue {
    fn from(value: PgRange) -> Self {
        PgValue::Range(Box::new(value))
    }
}

/// Decode a raw value into [`PgValue`] through the registry.
pub(crate) fn decode_with(
    registry: &PgTypeRegistry,
    value: PgValueRef<'_>,
) -> Result<PgValue, Error> {
    if value.is_null() {
        return Ok(PgValue::Null);
    }

    if let Some(oid) = value.type_info.oid() {
        if let Some(codec) = registry.custom_codec(oid) {
            return (codec.decode)(&value);
        }
    }

    match &value.type_info.0 {
        PgType::Bool => bool::decode(&value),
        PgType::Int2 | PgType::Int4 | PgType::Int8 | PgType::Oid => int::decode(&value),
        PgType::Float4 | PgType::Float8 => float::decode(&value),
        PgType::Numeric => numeric::decode(&value),
        PgType::Text
        | PgType::Varchar
        | PgType::Bpchar
        | PgType::Name
        | PgType::Char
        | PgType::Xml
        | PgType::Money
        | PgType::Unknown
        | PgType::Void => str::decode(&value),
        PgType::Bytea => bytes::decode(&value),
        PgType::Uuid => uuid_::decode(&value),
        PgType::Date
        | PgType::Time
        | PgType::Timetz
        | PgType::Timestamp
        | PgType::Timestamptz => datetime::decode(&value),
        PgType::Interval => interval::decode(&value),
        PgType::Json | PgType::Jsonb => json::decode(&value),
        PgType::Inet | PgType::Cidr | PgType::Macaddr => net::decode(&value),
        PgType::Bit | PgType::Varbit => bit::decode(&value),
        PgType::Point
        | PgType::Line
        | PgType::Lseg
        | PgType::Box
        | PgType::Path
        | PgType::Polygon
        | PgType::Circle => geometry::decode(&value),
        PgType::Record => record::decode_anonymous(registry, &value),

        PgType::DeclareWithOid(oid) => {
            // a lazy reference resolves through the registry once the type
            // it is part of has been introspected
            match registry.resolve_oid(*oid) {
                Some(resolved) if !resolved.is_declared_only() => decode_with(
                    registry,
                    PgValueRef::new(value.value, value.format, resolved),
                ),

                // structure unknown; surface what we can without guessing
                _ => match value.format {
                    PgValueFormat::Text => str::decode(&value),
                    PgValueFormat::Binary => Ok(PgValue::Bytea(value.as_bytes()?.to_vec())),
                },
            }
        }

        PgType::DeclareWithName(_) => match value.format {
            PgValueFormat::Text => str::decode(&value),
            PgValueFormat::Binary => Ok(PgValue::Bytea(value.as_bytes()?.to_vec())),
        },

        PgType::Custom(custom) => match &custom.kind {
            PgTypeKind::Simple => match value.format {
                PgValueFormat::Text => str::decode(&value),
                PgValueFormat::Binary => Ok(PgValue::Bytea(value.as_bytes()?.to_vec())),
            },

            PgTypeKind::Enum(_) => str::decode(&value),

            PgTypeKind::Domain(base) => decode_with(
                registry,
                PgValueRef::new(value.value, value.format, base.clone()),
            ),

            PgTypeKind::Composite(fields) => record::decode_composite(registry, &value, fields),

            PgTypeKind::Array(elem) => array::decode(registry, &value, elem),

            PgTypeKind::Range(elem) => range::decode(registry, &value, elem),
        },

        // builtin containers
        _ => match value.type_info.kind() {
            PgTypeKind::Array(elem) => array::decode(registry, &value, &elem),
            PgTypeKind::Range(elem) => range::decode(registry, &value, &elem),
            _ => Err(Error::Decode(
                format!("no decoder for type {}", value.type_info.name()).into(),
            )),
        },
    }
}

/// Encode `value` as the parameter type the server expects.
///
/// `format` must be the format this parameter was declared with in `Bind`,
/// as returned by [`preferred_format`].
pub(crate) fn encode_with(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
    format: PgValueFormat,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    if let PgValue::Null = value {
        return Ok(IsNull::Yes);
    }

    if let Some(oid) = type_info.oid() {
        if let Some(codec) = registry.custom_codec(oid) {
            return (codec.encode)(value, buf);
        }
    }

    match format {
        PgValueFormat::Binary => encode_binary(registry, type_info, value, buf),
        PgValueFormat::Text => encode_text(registry, type_info, value, buf),
    }
}

fn encode_binary(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    match &type_info.0 {
        PgType::Bool => bool::encode(value, buf),
        PgType::Int2 | PgType::Int4 | PgType::Int8 | PgType::Oid => {
            int::encode(&type_info.0, value, buf)
        }
        PgType::Float4 | PgType::Float8 => float::encode(&type_info.0, value, buf),
        PgType::Numeric => numeric::encode(value, buf),
        PgType::Text | PgType::Varchar | PgType::Bpchar | PgType::Name | PgType::Char
        | PgType::Xml | PgType::Unknown => str::encode(value, buf),
        PgType::Bytea => bytes::encode(value, buf),
        PgType::Uuid => uuid_::encode(value, buf),
        PgType::Date | PgType::Time | PgType::Timetz | PgType::Timestamp
        | PgType::Timestamptz => datetime::encode(&type_info.0, value, buf),
        PgType::Interval => interval::encode(value, buf),
        PgType::Json | PgType::Jsonb => json::encode(&type_info.0, value, buf),
        PgType::Inet | PgType::Cidr | PgType::Macaddr => net::encode(&type_info.0, value, buf),
        PgType::Bit | PgType::Varbit => bit::encode(value, buf),
        PgType::Point | PgType::Line | PgType::Lseg | PgType::Box | PgType::Path
        | PgType::Polygon | PgType::Circle => geometry::encode(&type_info.0, value, buf),

        PgType::Custom(custom) => match &custom.kind {
            PgTypeKind::Enum(_) => str::encode(value, buf),
            PgTypeKind::Domain(base) => encode_binary(registry, base, value, buf),
            PgTypeKind::Composite(fields) => record::encode(registry, fields, value, buf),
            PgTypeKind::Array(elem) => array::encode(registry, elem, value, buf),
            PgTypeKind::Range(elem) => range::encode(registry, elem, value, buf),
            PgTypeKind::Simple => str::encode(value, buf),
        },

        _ => match type_info.kind() {
            PgTypeKind::Array(elem) => array::encode(registry, &elem, value, buf),
            PgTypeKind::Range(elem) => range::encode(registry, &elem, value, buf),
            _ => Err(type_mismatch(type_info, value)),
        },
    }
}

fn encode_text(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
    value: &PgValue,
    buf: &mut Vec<u8>,
) -> Result<IsNull, Error> {
    let text = text_literal(registry, type_info, value)?;
    buf.extend_from_slice(text.as_bytes());

    Ok(IsNull::No)
}

/// Render a value as its PostgreSQL text-format literal.
pub(crate) fn text_literal(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
    value: &PgValue,
) -> Result<String, Error> {
    match value {
        PgValue::Array(v) => return array::to_text(registry, type_info, v),
        PgValue::Composite(v) => return record::to_text(registry, v),
        PgValue::Range(v) => return range::to_text(registry, type_info, v),
        _ => {}
    }

    scalar_literal(value).ok_or_else(|| type_mismatch(type_info, value))
}

/// Text literal for a scalar value; `None` for `NULL` and containers.
pub(crate) fn scalar_literal(value: &PgValue) -> Option<String> {
    Some(match value {
        PgValue::Null
        | PgValue::Array(_)
        | PgValue::Composite(_)
        | PgValue::Range(_) => return None,
        PgValue::Bool(v) => if *v { "t" } else { "f" }.to_owned(),
        PgValue::Int2(v) => v.to_string(),
        PgValue::Int4(v) => v.to_string(),
        PgValue::Int8(v) => v.to_string(),
        PgValue::Float4(v) => float::to_text(f64::from(*v)),
        PgValue::Float8(v) => float::to_text(*v),
        PgValue::Numeric(v) => v.to_string(),
        PgValue::Text(v) => v.clone(),
        PgValue::Bytea(v) => bytes::to_text(v),
        PgValue::Uuid(v) => v.to_string(),
        PgValue::Date(v) => datetime::date_to_text(*v),
        PgValue::Time(v) => v.format("%H:%M:%S%.f").to_string(),
        PgValue::TimeTz(v) => v.to_string(),
        PgValue::Timestamp(v) => datetime::timestamp_to_text(*v),
        PgValue::TimestampTz(v) => datetime::timestamptz_to_text(*v),
        PgValue::Interval(v) => v.to_string(),
        PgValue::Json(v) => v.to_string(),
        PgValue::Inet(v) => v.to_string(),
        PgValue::Macaddr(v) => net::macaddr_to_text(v),
        PgValue::Bit(v) => v.to_string(),
        PgValue::Point(v) => v.to_string(),
        PgValue::Line(v) => v.to_string(),
        PgValue::Lseg(v) => v.to_string(),
        PgValue::Box(v) => v.to_string(),
        PgValue::Path(v) => v.to_string(),
        PgValue::Polygon(v) => v.to_string(),
        PgValue::Circle(v) => v.to_string(),
    })
}

/// Pick the wire format for a parameter or result column of `type_info`.
///
/// Binary is preferred wherever a binary codec exists; `money` and types we
/// cannot interpret stay in text. Containers inherit the weakest format of
/// anything nested inside them.
pub(crate) fn preferred_format(
    registry: &PgTypeRegistry,
    type_info: &PgTypeInfo,
) -> PgValueFormat {
    if let Some(oid) = type_info.oid() {
        if let Some(codec) = registry.custom_codec(oid) {
            return codec.format;
        }
    }

    match &type_info.0 {
        PgType::Money | PgType::Unknown | PgType::MoneyArray => PgValueFormat::Text,

        PgType::DeclareWithOid(_) | PgType::DeclareWithName(_) => PgValueFormat::Text,

        PgType::Custom(custom) => match &custom.kind {
            PgTypeKind::Simple => PgValueFormat::Text,
            PgTypeKind::Enum(_) => PgValueFormat::Text,
            PgTypeKind::Domain(base) => preferred_format(registry, base),
            PgTypeKind::Array(elem) | PgTypeKind::Range(elem) => preferred_format(registry, elem),
            PgTypeKind::Composite(fields) => fields
                .iter()
                .map(|(_, ty)| preferred_format(registry, ty))
                .find(|f| *f == PgValueFormat::Text)
                .unwrap_or(PgValueFormat::Binary),
        },

        _ => PgValueFormat::Binary,
    }
}

pub(crate) fn type_mismatch(type_info: &PgTypeInfo, value: &PgValue) -> Error {
    Error::Encode(
        format!(
            "value {value:?} cannot be encoded as PostgreSQL type {}",
            type_info.name()
        )
        .into(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_encodes_as_is_null() {
        let registry = PgTypeRegistry::new();
        let mut buf = Vec::new();

        let is_null = encode_with(
            &registry,
            &PgTypeInfo::INT4,
            PgValueFormat::Binary,
            &PgValue::Null,
            &mut buf,
        )
        .unwrap();

        assert_eq!(is_null, IsNull::Yes);
        assert!(buf.is_empty());
    }

    #[test]
    fn money_prefers_text() {
        let registry = PgTypeRegistry::new();

        assert_eq!(
            preferred_format(&registry, &PgTypeInfo(PgType::Money)),
            PgValueFormat::Text
        );
        assert_eq!(
            preferred_format(&registry, &PgTypeInfo::INT4),
            PgValueFormat::Binary
        );
    }

    #[test]
    fn option_converts_to_null() {
        assert_eq!(PgValue::from(None::<i32>), PgValue::Null);
        assert_eq!(PgValue::from(Some(7_i32)), PgValue::Int4(7));
    }
}
