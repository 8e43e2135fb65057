use bytes::Bytes;

use crate::error::Error;
use crate::io::BufMutExt;

mod authentication;
mod backend_key_data;
mod bind;
mod cancel_request;
mod close;
mod command_complete;
mod copy;
mod data_row;
mod describe;
mod execute;
mod flush;
mod notification;
mod parameter_description;
mod parameter_status;
mod parse;
mod password;
mod query;
mod ready_for_query;
mod response;
mod row_description;
mod sasl;
mod ssl_request;
mod startup;
mod sync;
mod terminate;

pub(crate) use authentication::{
    Authentication, AuthenticationSasl, AuthenticationSaslContinue, AuthenticationSaslFinal,
};
pub(crate) use backend_key_data::BackendKeyData;
pub(crate) use bind::{Bind, BindComplete};
pub(crate) use cancel_request::CancelRequest;
pub(crate) use close::Close;
pub(crate) use command_complete::CommandComplete;
pub(crate) use copy::{CopyData, CopyDone, CopyFail, CopyResponse};
pub(crate) use data_row::DataRow;
pub(crate) use describe::Describe;
pub(crate) use execute::Execute;
#[allow(unused_imports)]
pub(crate) use flush::Flush;
pub(crate) use notification::Notification;
pub(crate) use parameter_description::ParameterDescription;
pub(crate) use parameter_status::ParameterStatus;
pub(crate) use parse::{Parse, ParseComplete};
pub(crate) use password::Password;
pub(crate) use query::Query;
pub(crate) use ready_for_query::ReadyForQuery;
pub use ready_for_query::TransactionStatus;
pub(crate) use response::PgNotice;
pub use response::PgSeverity;
pub(crate) use row_description::RowDescription;
pub(crate) use sasl::{SaslInitialResponse, SaslResponse};
pub(crate) use ssl_request::SslRequest;
pub(crate) use startup::Startup;
pub(crate) use sync::Sync;
pub(crate) use terminate::Terminate;

// Frontend and backend tags cannot share one enum: several format codes are
// used on both sides with different meanings (e.g. `C` is frontend Close and
// backend CommandComplete).
// <https://www.postgresql.org/docs/current/protocol-message-formats.html>
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum FrontendMessageFormat {
    Bind = b'B',
    Close = b'C',
    CopyData = b'd',
    CopyDone = b'c',
    CopyFail = b'f',
    Describe = b'D',
    Execute = b'E',
    Flush = b'H',
    Parse = b'P',
    /// Used for cleartext and MD5 password responses as well as SASL and
    /// GSSAPI continuation data.
    PasswordPolymorphic = b'p',
    Query = b'Q',
    Sync = b'S',
    Terminate = b'X',
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BackendMessageFormat {
    Authentication,
    BackendKeyData,
    BindComplete,
    CloseComplete,
    CommandComplete,
    CopyBothResponse,
    CopyData,
    CopyDone,
    CopyInResponse,
    CopyOutResponse,
    DataRow,
    EmptyQueryResponse,
    ErrorResponse,
    NoData,
    NoticeResponse,
    NotificationResponse,
    ParameterDescription,
    ParameterStatus,
    ParseComplete,
    PortalSuspended,
    ReadyForQuery,
    RowDescription,
}

impl BackendMessageFormat {
    pub fn try_from_u8(v: u8) -> Result<Self, Error> {
        Ok(match v {
            b'1' => BackendMessageFormat::ParseComplete,
            b'2' => BackendMessageFormat::BindComplete,
            b'3' => BackendMessageFormat::CloseComplete,
            b'A' => BackendMessageFormat::NotificationResponse,
            b'C' => BackendMessageFormat::CommandComplete,
            b'D' => BackendMessageFormat::DataRow,
            b'E' => BackendMessageFormat::ErrorResponse,
            b'G' => BackendMessageFormat::CopyInResponse,
            b'H' => BackendMessageFormat::CopyOutResponse,
            b'I' => BackendMessageFormat::EmptyQueryResponse,
            b'K' => BackendMessageFormat::BackendKeyData,
            b'N' => BackendMessageFormat::NoticeResponse,
            b'R' => BackendMessageFormat::Authentication,
            b'S' => BackendMessageFormat::ParameterStatus,
            b'T' => BackendMessageFormat::RowDescription,
            b'W' => BackendMessageFormat::CopyBothResponse,
            b'Z' => BackendMessageFormat::ReadyForQuery,
            b'c' => BackendMessageFormat::CopyDone,
            b'd' => BackendMessageFormat::CopyData,
            b'n' => BackendMessageFormat::NoData,
            b's' => BackendMessageFormat::PortalSuspended,
            b't' => BackendMessageFormat::ParameterDescription,

            _ => return Err(err_protocol!("unknown message type: {:?}", v as char)),
        })
    }
}

/// A frontend message: a 1-byte tag followed by a length-prefixed body.
pub(crate) trait FrontendMessage {
    /// The format tag of this message.
    const FORMAT: FrontendMessageFormat;

    /// Encode the message body, *excluding* the tag and length prefix.
    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error>;
}

/// A backend message body, decoded after the tag and length prefix have been
/// consumed.
pub(crate) trait BackendMessage: Sized {
    const FORMAT: BackendMessageFormat;

    fn decode_body(buf: Bytes) -> Result<Self, Error>;
}

/// A framed message received from the server, not yet decoded.
#[derive(Debug)]
pub(crate) struct ReceivedMessage {
    pub format: BackendMessageFormat,
    pub contents: Bytes,
}

impl ReceivedMessage {
    #[inline]
    pub fn decode<T: BackendMessage>(self) -> Result<T, Error> {
        if T::FORMAT != self.format {
            return Err(err_protocol!(
                "expected {:?}, got {:?}",
                T::FORMAT,
                self.format
            ));
        }

        T::decode_body(self.contents).map_err(|e| match e {
            Error::Protocol(s) => err_protocol!("while reading {:?}: {s}", self.format),
            other => other,
        })
    }
}

/// Adapter writing a [`FrontendMessage`] with its tag and patched length.
pub(crate) struct EncodeMessage<F>(pub F);

impl<F: FrontendMessage> crate::io::ProtocolEncode for EncodeMessage<F> {
    fn encode(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.push(F::FORMAT as u8);

        if let Err(e) = buf.put_length_prefixed(|buf| self.0.encode_body(buf)) {
            // don't leave a dangling tag byte in the buffer
            buf.pop();
            return Err(e);
        }

        Ok(())
    }
}
