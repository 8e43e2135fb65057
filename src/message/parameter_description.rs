use bytes::{Buf, Bytes};
use smallvec::SmallVec;

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};
use crate::type_info::Oid;

/// The parameter types a prepared statement expects, from `Describe`.
#[derive(Debug)]
pub(crate) struct ParameterDescription {
    pub types: SmallVec<[Oid; 6]>,
}

impl BackendMessage for ParameterDescription {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::ParameterDescription;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("ParameterDescription missing count"));
        }

        let count = buf.get_u16() as usize;

        if buf.remaining() < count * 4 {
            return Err(err_protocol!(
                "ParameterDescription claims {count} parameters but carries {} bytes",
                buf.remaining()
            ));
        }

        let mut types = SmallVec::with_capacity(count);

        for _ in 0..count {
            types.push(Oid(buf.get_u32()));
        }

        Ok(ParameterDescription { types })
    }
}

#[test]
fn decodes_parameter_description() {
    let buf = Bytes::from_static(b"\x00\x02\x00\x00\x00\x17\x00\x00\x00\x19");

    let desc = ParameterDescription::decode_body(buf).unwrap();

    assert_eq!(desc.types.as_slice(), [Oid(23), Oid(25)]);
}
