use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::message::{BackendMessage, BackendMessageFormat};

/// One result row. Values stay in the shared receive buffer; each column is
/// a cheap slice of it, `None` for SQL `NULL`.
#[derive(Debug, Clone)]
pub(crate) struct DataRow {
    pub(crate) values: Vec<Option<Bytes>>,
}

impl DataRow {
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.values[index].as_deref()
    }
}

impl BackendMessage for DataRow {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::DataRow;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 2 {
            return Err(err_protocol!("DataRow missing column count"));
        }

        let count = buf.get_u16() as usize;
        let mut values = Vec::with_capacity(count);

        for _ in 0..count {
            if buf.remaining() < 4 {
                return Err(err_protocol!("DataRow truncated before value length"));
            }

            let len = buf.get_i32();

            if len == -1 {
                values.push(None);
            } else {
                let len = usize::try_from(len)
                    .map_err(|_| err_protocol!("DataRow value length is negative: {len}"))?;

                if buf.remaining() < len {
                    return Err(err_protocol!(
                        "DataRow value is {len} bytes, only {} remain",
                        buf.remaining()
                    ));
                }

                values.push(Some(buf.split_to(len)));
            }
        }

        Ok(DataRow { values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_row_with_null() {
        let buf = Bytes::from_static(
            b"\x00\x03\x00\x00\x00\x011\xff\xff\xff\xff\x00\x00\x00\x0212",
        );

        let row = DataRow::decode_body(buf).unwrap();

        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&b"1"[..]));
        assert_eq!(row.get(1), None);
        assert_eq!(row.get(2), Some(&b"12"[..]));
    }

    #[test]
    fn rejects_truncated_row() {
        let buf = Bytes::from_static(b"\x00\x01\x00\x00\x00\x09shor");

        assert!(DataRow::decode_body(buf).is_err());
    }
}
