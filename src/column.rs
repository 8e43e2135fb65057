use crate::type_info::PgTypeInfo;
use crate::value::PgValueFormat;

/// One column of a result set.
#[derive(Debug, Clone)]
pub struct PgColumn {
    pub(crate) name: String,
    pub(crate) type_info: PgTypeInfo,

    /// Table OID this column originates from; zero when it is computed.
    pub(crate) relation_id: u32,

    /// Attribute number within the table; zero when it is computed.
    pub(crate) relation_attribute_no: i16,

    /// The format values of this column arrive in.
    pub(crate) format: PgValueFormat,
}

impl PgColumn {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_info(&self) -> &PgTypeInfo {
        &self.type_info
    }

    /// The OID of the table this column belongs to, if any.
    pub fn relation_id(&self) -> Option<u32> {
        (self.relation_id != 0).then_some(self.relation_id)
    }

    /// The 1-based attribute number within its table, if any.
    pub fn relation_attribute_no(&self) -> Option<i16> {
        (self.relation_attribute_no != 0).then_some(self.relation_attribute_no)
    }
}
