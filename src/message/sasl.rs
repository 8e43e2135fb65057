use crate::error::Error;
use crate::io::BufMutExt;
use crate::message::{FrontendMessage, FrontendMessageFormat};

pub(crate) struct SaslInitialResponse<'a> {
    pub response: &'a str,
    pub plus: bool,
}

impl SaslInitialResponse<'_> {
    #[inline]
    fn selected_mechanism(&self) -> &'static str {
        if self.plus {
            "SCRAM-SHA-256-PLUS"
        } else {
            "SCRAM-SHA-256"
        }
    }
}

impl FrontendMessage for SaslInitialResponse<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::PasswordPolymorphic;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        // name of the SASL authentication mechanism that the client selected
        buf.put_str_nul(self.selected_mechanism());

        let response_len = i32::try_from(self.response.len()).map_err(|_| {
            err_protocol!(
                "SASL initial response too long for protocol: {}",
                self.response.len()
            )
        })?;

        buf.extend_from_slice(&response_len.to_be_bytes());
        buf.extend_from_slice(self.response.as_bytes());

        Ok(())
    }
}

pub(crate) struct SaslResponse<'a>(pub &'a str);

impl FrontendMessage for SaslResponse<'_> {
    const FORMAT: FrontendMessageFormat = FrontendMessageFormat::PasswordPolymorphic;

    fn encode_body(&self, buf: &mut Vec<u8>) -> Result<(), Error> {
        buf.extend_from_slice(self.0.as_bytes());
        Ok(())
    }
}
