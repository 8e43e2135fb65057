use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

/// A PostgreSQL object identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Oid(pub u32);

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Type information for a PostgreSQL value.
#[derive(Debug, Clone, PartialEq)]
pub struct PgTypeInfo(pub(crate) PgType);

/// The structure of a type: how its values relate to other types.
#[derive(Debug, Clone, PartialEq)]
pub enum PgTypeKind {
    /// A self-contained scalar.
    Simple,

    /// A wrapper over a base type with extra constraints.
    Domain(PgTypeInfo),

    /// A row type; each field has a name and a type.
    Composite(Arc<[(String, PgTypeInfo)]>),

    /// An array with the given element type.
    Array(PgTypeInfo),

    /// A set of string labels.
    Enum(Arc<[String]>),

    /// A range over the given element type.
    Range(PgTypeInfo),
}

/// A user-defined (or otherwise non-builtin) type, resolved from the system
/// catalogs at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct PgCustomType {
    pub(crate) oid: Oid,
    pub(crate) name: String,
    pub(crate) kind: PgTypeKind,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgType {
    Bool,
    Bytea,
    Char,
    Name,
    Int8,
    Int2,
    Int4,
    Text,
    Oid,
    Json,
    Jsonb,
    Xml,
    Point,
    Lseg,
    Path,
    Box,
    Polygon,
    Line,
    Circle,
    Cidr,
    Inet,
    Macaddr,
    Float4,
    Float8,
    Money,
    Bpchar,
    Varchar,
    Date,
    Time,
    Timestamp,
    Timestamptz,
    Interval,
    Timetz,
    Bit,
    Varbit,
    Numeric,
    Uuid,
    Record,
    Void,
    Unknown,

    BoolArray,
    ByteaArray,
    CharArray,
    NameArray,
    Int8Array,
    Int2Array,
    Int4Array,
    TextArray,
    OidArray,
    JsonArray,
    JsonbArray,
    XmlArray,
    PointArray,
    LsegArray,
    PathArray,
    BoxArray,
    PolygonArray,
    LineArray,
    CircleArray,
    CidrArray,
    InetArray,
    MacaddrArray,
    Float4Array,
    Float8Array,
    MoneyArray,
    BpcharArray,
    VarcharArray,
    DateArray,
    TimeArray,
    TimestampArray,
    TimestamptzArray,
    IntervalArray,
    TimetzArray,
    BitArray,
    VarbitArray,
    NumericArray,
    UuidArray,
    RecordArray,

    Int4Range,
    NumRange,
    TsRange,
    TstzRange,
    DateRange,
    Int8Range,
    Int4RangeArray,
    NumRangeArray,
    TsRangeArray,
    TstzRangeArray,
    DateRangeArray,
    Int8RangeArray,

    /// A type resolved from the catalogs.
    Custom(Arc<PgCustomType>),

    /// A reference to a type by OID only; used while its structure has not
    /// been fetched yet (or could not be, mid-operation).
    DeclareWithOid(Oid),

    /// A reference to a type by name only; resolved through the catalogs on
    /// first use.
    DeclareWithName(String),
}

impl PgTypeInfo {
    pub const BOOL: Self = Self(PgType::Bool);
    pub const BYTEA: Self = Self(PgType::Bytea);
    pub const CHAR: Self = Self(PgType::Char);
    pub const NAME: Self = Self(PgType::Name);
    pub const INT2: Self = Self(PgType::Int2);
    pub const INT4: Self = Self(PgType::Int4);
    pub const INT8: Self = Self(PgType::Int8);
    pub const TEXT: Self = Self(PgType::Text);
    pub const OID: Self = Self(PgType::Oid);
    pub const JSON: Self = Self(PgType::Json);
    pub const JSONB: Self = Self(PgType::Jsonb);
    pub const FLOAT4: Self = Self(PgType::Float4);
    pub const FLOAT8: Self = Self(PgType::Float8);
    pub const NUMERIC: Self = Self(PgType::Numeric);
    pub const DATE: Self = Self(PgType::Date);
    pub const TIME: Self = Self(PgType::Time);
    pub const TIMETZ: Self = Self(PgType::Timetz);
    pub const TIMESTAMP: Self = Self(PgType::Timestamp);
    pub const TIMESTAMPTZ: Self = Self(PgType::Timestamptz);
    pub const INTERVAL: Self = Self(PgType::Interval);
    pub const UUID: Self = Self(PgType::Uuid);
    pub const VARCHAR: Self = Self(PgType::Varchar);
    pub const UNKNOWN: Self = Self(PgType::Unknown);
    pub const VOID: Self = Self(PgType::Void);
    pub const RECORD: Self = Self(PgType::Record);

    /// Construct a reference to a type by OID; the structure is resolved
    /// through the catalogs when first needed.
    pub fn with_oid(oid: Oid) -> Self {
        Self(PgType::try_from_oid(oid).unwrap_or(PgType::DeclareWithOid(oid)))
    }

    /// Construct a reference to a type by its catalog name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self(PgType::DeclareWithName(name.into()))
    }

    /// The object ID of this type, if known.
    pub fn oid(&self) -> Option<Oid> {
        self.0.oid()
    }

    /// The canonical name of this type.
    pub fn name(&self) -> &str {
        self.0.name()
    }

    /// How values of this type are structured.
    pub fn kind(&self) -> PgTypeKind {
        self.0.kind()
    }

    /// Whether this is only a reference that still needs catalog resolution.
    pub fn is_declared_only(&self) -> bool {
        matches!(
            self.0,
            PgType::DeclareWithOid(_) | PgType::DeclareWithName(_)
        )
    }

    /// The element type, if this is an array type.
    pub fn element_type(&self) -> Option<PgTypeInfo> {
        match self.kind() {
            PgTypeKind::Array(elem) => Some(elem),
            _ => None,
        }
    }
}

impl Display for PgTypeInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl From<PgCustomType> for PgTypeInfo {
    fn from(ty: PgCustomType) -> Self {
        PgTypeInfo(PgType::Custom(Arc::new(ty)))
    }
}

impl PgType {
    pub(crate) fn oid(&self) -> Option<Oid> {
        let oid = match self {
            PgType::Bool => 16,
            PgType::Bytea => 17,
            PgType::Char => 18,
            PgType::Name => 19,
            PgType::Int8 => 20,
            PgType::Int2 => 21,
            PgType::Int4 => 23,
            PgType::Text => 25,
            PgType::Oid => 26,
            PgType::Json => 114,
            PgType::Xml => 142,
            PgType::Point => 600,
            PgType::Lseg => 601,
            PgType::Path => 602,
            PgType::Box => 603,
            PgType::Polygon => 604,
            PgType::Line => 628,
            PgType::Cidr => 650,
            PgType::Float4 => 700,
            PgType::Float8 => 701,
            PgType::Unknown => 705,
            PgType::Circle => 718,
            PgType::Money => 790,
            PgType::Macaddr => 829,
            PgType::Inet => 869,
            PgType::Bpchar => 1042,
            PgType::Varchar => 1043,
            PgType::Date => 1082,
            PgType::Time => 1083,
            PgType::Timestamp => 1114,
            PgType::Timestamptz => 1184,
            PgType::Interval => 1186,
            PgType::Timetz => 1266,
            PgType::Bit => 1560,
            PgType::Varbit => 1562,
            PgType::Numeric => 1700,
            PgType::Record => 2249,
            PgType::Void => 2278,
            PgType::Uuid => 2950,
            PgType::Jsonb => 3802,

            PgType::BoolArray => 1000,
            PgType::ByteaArray => 1001,
            PgType::CharArray => 1002,
            PgType::NameArray => 1003,
            PgType::Int2Array => 1005,
            PgType::Int4Array => 1007,
            PgType::TextArray => 1009,
            PgType::BpcharArray => 1014,
            PgType::VarcharArray => 1015,
            PgType::Int8Array => 1016,
            PgType::PointArray => 1017,
            PgType::LsegArray => 1018,
            PgType::PathArray => 1019,
            PgType::BoxArray => 1020,
            PgType::Float4Array => 1021,
            PgType::Float8Array => 1022,
            PgType::PolygonArray => 1027,
            PgType::OidArray => 1028,
            PgType::MacaddrArray => 1040,
            PgType::InetArray => 1041,
            PgType::TimestampArray => 1115,
            PgType::DateArray => 1182,
            PgType::TimeArray => 1183,
            PgType::TimestamptzArray => 1185,
            PgType::IntervalArray => 1187,
            PgType::NumericArray => 1231,
            PgType::TimetzArray => 1270,
            PgType::BitArray => 1561,
            PgType::VarbitArray => 1563,
            PgType::JsonArray => 199,
            PgType::XmlArray => 143,
            PgType::LineArray => 629,
            PgType::CidrArray => 651,
            PgType::CircleArray => 719,
            PgType::MoneyArray => 791,
            PgType::RecordArray => 2287,
            PgType::UuidArray => 2951,
            PgType::JsonbArray => 3807,

            PgType::Int4Range => 3904,
            PgType::Int4RangeArray => 3905,
            PgType::NumRange => 3906,
            PgType::NumRangeArray => 3907,
            PgType::TsRange => 3908,
            PgType::TsRangeArray => 3909,
            PgType::TstzRange => 3910,
            PgType::TstzRangeArray => 3911,
            PgType::DateRange => 3912,
            PgType::DateRangeArray => 3913,
            PgType::Int8Range => 3926,
            PgType::Int8RangeArray => 3927,

            PgType::Custom(ty) => return Some(ty.oid),
            PgType::DeclareWithOid(oid) => return Some(*oid),
            PgType::DeclareWithName(_) => return None,
        };

        Some(Oid(oid))
    }

    pub(crate) fn try_from_oid(oid: Oid) -> Option<PgType> {
        Some(match oid.0 {
            16 => PgType::Bool,
            17 => PgType::Bytea,
            18 => PgType::Char,
            19 => PgType::Name,
            20 => PgType::Int8,
            21 => PgType::Int2,
            23 => PgType::Int4,
            25 => PgType::Text,
            26 => PgType::Oid,
            114 => PgType::Json,
            142 => PgType::Xml,
            600 => PgType::Point,
            601 => PgType::Lseg,
            602 => PgType::Path,
            603 => PgType::Box,
            604 => PgType::Polygon,
            628 => PgType::Line,
            650 => PgType::Cidr,
            700 => PgType::Float4,
            701 => PgType::Float8,
            705 => PgType::Unknown,
            718 => PgType::Circle,
            790 => PgType::Money,
            829 => PgType::Macaddr,
            869 => PgType::Inet,
            1042 => PgType::Bpchar,
            1043 => PgType::Varchar,
            1082 => PgType::Date,
            1083 => PgType::Time,
            1114 => PgType::Timestamp,
            1184 => PgType::Timestamptz,
            1186 => PgType::Interval,
            1266 => PgType::Timetz,
            1560 => PgType::Bit,
            1562 => PgType::Varbit,
            1700 => PgType::Numeric,
            2249 => PgType::Record,
            2278 => PgType::Void,
            2950 => PgType::Uuid,
            3802 => PgType::Jsonb,

            1000 => PgType::BoolArray,
            1001 => PgType::ByteaArray,
            1002 => PgType::CharArray,
            1003 => PgType::NameArray,
            1005 => PgType::Int2Array,
            1007 => PgType::Int4Array,
            1009 => PgType::TextArray,
            1014 => PgType::BpcharArray,
            1015 => PgType::VarcharArray,
            1016 => PgType::Int8Array,
            1017 => PgType::PointArray,
            1018 => PgType::LsegArray,
            1019 => PgType::PathArray,
            1020 => PgType::BoxArray,
            1021 => PgType::Float4Array,
            1022 => PgType::Float8Array,
            1027 => PgType::PolygonArray,
            1028 => PgType::OidArray,
            1040 => PgType::MacaddrArray,
            1041 => PgType::InetArray,
            1115 => PgType::TimestampArray,
            1182 => PgType::DateArray,
            1183 => PgType::TimeArray,
            1185 => PgType::TimestamptzArray,
            1187 => PgType::IntervalArray,
            1231 => PgType::NumericArray,
            1270 => PgType::TimetzArray,
            1561 => PgType::BitArray,
            1563 => PgType::VarbitArray,
            199 => PgType::JsonArray,
            143 => PgType::XmlArray,
            629 => PgType::LineArray,
            651 => PgType::CidrArray,
            719 => PgType::CircleArray,
            791 => PgType::MoneyArray,
            2287 => PgType::RecordArray,
            2951 => PgType::UuidArray,
            3807 => PgType::JsonbArray,

            3904 => PgType::Int4Range,
            3905 => PgType::Int4RangeArray,
            3906 => PgType::NumRange,
            3907 => PgType::NumRangeArray,
            3908 => PgType::TsRange,
            3909 => PgType::TsRangeArray,
            3910 => PgType::TstzRange,
            3911 => PgType::TstzRangeArray,
            3912 => PgType::DateRange,
            3913 => PgType::DateRangeArray,
            3926 => PgType::Int8Range,
            3927 => PgType::Int8RangeArray,

            _ => return None,
        })
    }

    pub(crate) fn name(&self) -> &str {
        match self {
            PgType::Bool => "bool",
            PgType::Bytea => "bytea",
            PgType::Char => "char",
            PgType::Name => "name",
            PgType::Int8 => "int8",
            PgType::Int2 => "int2",
            PgType::Int4 => "int4",
            PgType::Text => "text",
            PgType::Oid => "oid",
            PgType::Json => "json",
            PgType::Jsonb => "jsonb",
            PgType::Xml => "xml",
            PgType::Point => "point",
            PgType::Lseg => "lseg",
            PgType::Path => "path",
            PgType::Box => "box",
            PgType::Polygon => "polygon",
            PgType::Line => "line",
            PgType::Circle => "circle",
            PgType::Cidr => "cidr",
            PgType::Inet => "inet",
            PgType::Macaddr => "macaddr",
            PgType::Float4 => "float4",
            PgType::Float8 => "float8",
            PgType::Money => "money",
            PgType::Bpchar => "bpchar",
            PgType::Varchar => "varchar",
            PgType::Date => "date",
            PgType::Time => "time",
            PgType::Timestamp => "timestamp",
            PgType::Timestamptz => "timestamptz",
            PgType::Interval => "interval",
            PgType::Timetz => "timetz",
            PgType::Bit => "bit",
            PgType::Varbit => "varbit",
            PgType::Numeric => "numeric",
            PgType::Record => "record",
            PgType::Void => "void",
            PgType::Unknown => "unknown",
            PgType::Uuid => "uuid",

            PgType::BoolArray => "bool[]",
            PgType::ByteaArray => "bytea[]",
            PgType::CharArray => "char[]",
            PgType::NameArray => "name[]",
            PgType::Int8Array => "int8[]",
            PgType::Int2Array => "int2[]",
            PgType::Int4Array => "int4[]",
            PgType::TextArray => "text[]",
            PgType::OidArray => "oid[]",
            PgType::JsonArray => "json[]",
            PgType::JsonbArray => "jsonb[]",
            PgType::XmlArray => "xml[]",
            PgType::PointArray => "point[]",
            PgType::LsegArray => "lseg[]",
            PgType::PathArray => "path[]",
            PgType::BoxArray => "box[]",
            PgType::PolygonArray => "polygon[]",
            PgType::LineArray => "line[]",
            PgType::CircleArray => "circle[]",
            PgType::CidrArray => "cidr[]",
            PgType::InetArray => "inet[]",
            PgType::MacaddrArray => "macaddr[]",
            PgType::Float4Array => "float4[]",
            PgType::Float8Array => "float8[]",
            PgType::MoneyArray => "money[]",
            PgType::BpcharArray => "bpchar[]",
            PgType::VarcharArray => "varchar[]",
            PgType::DateArray => "date[]",
            PgType::TimeArray => "time[]",
            PgType::TimestampArray => "timestamp[]",
            PgType::TimestamptzArray => "timestamptz[]",
            PgType::IntervalArray => "interval[]",
            PgType::TimetzArray => "timetz[]",
            PgType::BitArray => "bit[]",
            PgType::VarbitArray => "varbit[]",
            PgType::NumericArray => "numeric[]",
            PgType::UuidArray => "uuid[]",
            PgType::RecordArray => "record[]",

            PgType::Int4Range => "int4range",
            PgType::NumRange => "numrange",
            PgType::TsRange => "tsrange",
            PgType::TstzRange => "tstzrange",
            PgType::DateRange => "daterange",
            PgType::Int8Range => "int8range",
            PgType::Int4RangeArray => "int4range[]",
            PgType::NumRangeArray => "numrange[]",
            PgType::TsRangeArray => "tsrange[]",
            PgType::TstzRangeArray => "tstzrange[]",
            PgType::DateRangeArray => "daterange[]",
            PgType::Int8RangeArray => "int8range[]",

            PgType::Custom(ty) => &ty.name,
            PgType::DeclareWithOid(_) => "?",
            PgType::DeclareWithName(name) => name,
        }
    }

    pub(crate) fn kind(&self) -> PgTypeKind {
        match self {
            PgType::BoolArray => PgTypeKind::Array(PgTypeInfo(PgType::Bool)),
            PgType::ByteaArray => PgTypeKind::Array(PgTypeInfo(PgType::Bytea)),
            PgType::CharArray => PgTypeKind::Array(PgTypeInfo(PgType::Char)),
            PgType::NameArray => PgTypeKind::Array(PgTypeInfo(PgType::Name)),
            PgType::Int8Array => PgTypeKind::Array(PgTypeInfo(PgType::Int8)),
            PgType::Int2Array => PgTypeKind::Array(PgTypeInfo(PgType::Int2)),
            PgType::Int4Array => PgTypeKind::Array(PgTypeInfo(PgType::Int4)),
            PgType::TextArray => PgTypeKind::Array(PgTypeInfo(PgType::Text)),
            PgType::OidArray => PgTypeKind::Array(PgTypeInfo(PgType::Oid)),
            PgType::JsonArray => PgTypeKind::Array(PgTypeInfo(PgType::Json)),
            PgType::JsonbArray => PgTypeKind::Array(PgTypeInfo(PgType::Jsonb)),
            PgType::XmlArray => PgTypeKind::Array(PgTypeInfo(PgType::Xml)),
            PgType::PointArray => PgTypeKind::Array(PgTypeInfo(PgType::Point)),
            PgType::LsegArray => PgTypeKind::Array(PgTypeInfo(PgType::Lseg)),
            PgType::PathArray => PgTypeKind::Array(PgTypeInfo(PgType::Path)),
            PgType::BoxArray => PgTypeKind::Array(PgTypeInfo(PgType::Box)),
            PgType::PolygonArray => PgTypeKind::Array(PgTypeInfo(PgType::Polygon)),
            PgType::LineArray => PgTypeKind::Array(PgTypeInfo(PgType::Line)),
            PgType::CircleArray => PgTypeKind::Array(PgTypeInfo(PgType::Circle)),
            PgType::CidrArray => PgTypeKind::Array(PgTypeInfo(PgType::Cidr)),
            PgType::InetArray => PgTypeKind::Array(PgTypeInfo(PgType::Inet)),
            PgType::MacaddrArray => PgTypeKind::Array(PgTypeInfo(PgType::Macaddr)),
            PgType::Float4Array => PgTypeKind::Array(PgTypeInfo(PgType::Float4)),
            PgType::Float8Array => PgTypeKind::Array(PgTypeInfo(PgType::Float8)),
            PgType::MoneyArray => PgTypeKind::Array(PgTypeInfo(PgType::Money)),
            PgType::BpcharArray => PgTypeKind::Array(PgTypeInfo(PgType::Bpchar)),
            PgType::VarcharArray => PgTypeKind::Array(PgTypeInfo(PgType::Varchar)),
            PgType::DateArray => PgTypeKind::Array(PgTypeInfo(PgType::Date)),
            PgType::TimeArray => PgTypeKind::Array(PgTypeInfo(PgType::Time)),
            PgType::TimestampArray => PgTypeKind::Array(PgTypeInfo(PgType::Timestamp)),
            PgType::TimestamptzArray => PgTypeKind::Array(PgTypeInfo(PgType::Timestamptz)),
            PgType::IntervalArray => PgTypeKind::Array(PgTypeInfo(PgType::Interval)),
            PgType::TimetzArray => PgTypeKind::Array(PgTypeInfo(PgType::Timetz)),
            PgType::BitArray => PgTypeKind::Array(PgTypeInfo(PgType::Bit)),
            PgType::VarbitArray => PgTypeKind::Array(PgTypeInfo(PgType::Varbit)),
            PgType::NumericArray => PgTypeKind::Array(PgTypeInfo(PgType::Numeric)),
            PgType::UuidArray => PgTypeKind::Array(PgTypeInfo(PgType::Uuid)),
            PgType::RecordArray => PgTypeKind::Array(PgTypeInfo(PgType::Record)),

            PgType::Int4Range => PgTypeKind::Range(PgTypeInfo::INT4),
            PgType::NumRange => PgTypeKind::Range(PgTypeInfo::NUMERIC),
            PgType::TsRange => PgTypeKind::Range(PgTypeInfo::TIMESTAMP),
            PgType::TstzRange => PgTypeKind::Range(PgTypeInfo::TIMESTAMPTZ),
            PgType::DateRange => PgTypeKind::Range(PgTypeInfo::DATE),
            PgType::Int8Range => PgTypeKind::Range(PgTypeInfo::INT8),
            PgType::Int4RangeArray => PgTypeKind::Array(PgTypeInfo(PgType::Int4Range)),
            PgType::NumRangeArray => PgTypeKind::Array(PgTypeInfo(PgType::NumRange)),
            PgType::TsRangeArray => PgTypeKind::Array(PgTypeInfo(PgType::TsRange)),
            PgType::TstzRangeArray => PgTypeKind::Array(PgTypeInfo(PgType::TstzRange)),
            PgType::DateRangeArray => PgTypeKind::Array(PgTypeInfo(PgType::DateRange)),
            PgType::Int8RangeArray => PgTypeKind::Array(PgTypeInfo(PgType::Int8Range)),

            PgType::Custom(ty) => ty.kind.clone(),

            _ => PgTypeKind::Simple,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_oids_round_trip() {
        for oid in [16u32, 17, 20, 21, 23, 25, 114, 700, 701, 1043, 1082, 1114, 1184, 1186,
            1700, 2950, 3802, 1007, 3904]
        {
            let ty = PgType::try_from_oid(Oid(oid)).expect("builtin");
            assert_eq!(ty.oid(), Some(Oid(oid)));
        }
    }

    #[test]
    fn arrays_know_their_element() {
        let array = PgTypeInfo(PgType::Int4Array);

        assert_eq!(array.element_type(), Some(PgTypeInfo::INT4));
        assert_eq!(array.name(), "int4[]");
    }

    #[test]
    fn unknown_oid_becomes_declaration() {
        let ty = PgTypeInfo::with_oid(Oid(999_999));

        assert!(ty.is_declared_only());
        assert_eq!(ty.oid(), Some(Oid(999_999)));
    }

    #[test]
    fn ranges_know_their_element() {
        assert_eq!(
            PgTypeInfo(PgType::TstzRange).kind(),
            PgTypeKind::Range(PgTypeInfo::TIMESTAMPTZ)
        );
    }
}
