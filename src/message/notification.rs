use bytes::{Buf, Bytes};

use crate::error::Error;
use crate::io::BufExt;
use crate::message::{BackendMessage, BackendMessageFormat};

/// An asynchronous notification produced by `NOTIFY`.
#[derive(Debug, Clone)]
pub(crate) struct Notification {
    /// Server process ID of the notifying backend.
    pub process_id: u32,
    pub channel: String,
    pub payload: String,
}

impl BackendMessage for Notification {
    const FORMAT: BackendMessageFormat = BackendMessageFormat::NotificationResponse;

    fn decode_body(mut buf: Bytes) -> Result<Self, Error> {
        if buf.remaining() < 4 {
            return Err(err_protocol!("NotificationResponse missing process ID"));
        }

        let process_id = buf.get_u32();
        let channel = buf.get_str_nul()?;
        let payload = buf.get_str_nul()?;

        Ok(Notification {
            process_id,
            channel,
            payload,
        })
    }
}

#[test]
fn decodes_notification() {
    let buf = Bytes::from_static(b"\x00\x00\x04\xd2events\0hello\0");

    let notification = Notification::decode_body(buf).unwrap();

    assert_eq!(notification.process_id, 1234);
    assert_eq!(notification.channel, "events");
    assert_eq!(notification.payload, "hello");
}
