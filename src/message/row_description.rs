use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufExt;
use crate::message::{BackendMessage, BackendMessageFormat};
use crate::type_info::Oid;

/// The shape of the rows a statement will produce.
#[derive(Debug)]
pub(crate) struct RowDescription {
    pub fields: Vec<PgField>,
}

/// One output column as described by the server.
#[derive(Debug)]
pub(crate) struct PgField {
    /// The field name.
    pub name: String,

    /// The table OID this column comes from, or zero if it is not a simple
    /// table column.
    pub relation_id: u32,

    /// The attribute number within the table, or zero.
    pub relation_attribute_no: i16,

    /// The OID of the field's data type.
    pub data_type_id: Oid,

    /// Negative values denote variable-width types.
    pub data_type_size: i16,

    /// Type-specific modifier, e.g. the length of a `varchar(n)`.
    pub type_modifier: i32,

    /// Format code (0 = text, 1 = binary). Always zero when the description
    /// comes from `Describe` on a statement.
    pub format: i16,
}

impl BackendMessage for RowDescription {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::RowDescription;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("RowDescription missing field count"));
        }

        let count = buf.get_u16() as usize;
        let mut fields = Vec::with_capacity(count);

        for _ in 0..count {
            let name = buf.get_str_nul()?;

            if buf.remaining() < 18 {
                return Err(err_protocol!("RowDescription field truncated"));
            }

            fields.push(PgField {
                name,
                relation_id: buf.get_u32(),
                relation_attribute_no: buf.get_i16(),
                data_type_id: Oid(buf.get_u32()),
                data_type_size: buf.get_i16(),
                type_modifier: buf.get_i32(),
                format: buf.get_i16(),
            });
        }

        Ok(RowDescription { fields })
    }
}

#[test]
fn decodes_row_description() {
    // one int4 column named `id` from no particular table
    let buf = Bytes::from_static(
        b"\x00\x01id\0\x00\x00\x00\x00\x00\x00\x00\x00\x00\x17\x00\x04\xff\xff\xff\xff\x00\x00",
    );

    let desc = RowDescription::decode_body(buf).unwrap();

    assert_eq!(desc.fields.len(), 1);
    assert_eq!(desc.fields[0].name, "id");
    assert_eq!(desc.fields[0].data_type_id, Oid(23));
    assert_eq!(desc.fields[0].data_type_size, 4);
    assert_eq!(desc.fields[0].format, 0);
}
