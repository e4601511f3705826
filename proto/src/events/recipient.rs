use std::borrow::Cow;

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError};

use super::mail::{rest_as_args, split_esmtp_args};

/// One envelope recipient of the message.
///
/// Sent once per RCPT TO; a message with several recipients produces several
/// of these events.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Recipient {
    address: BytesMut,
    esmtp_args: Option<BytesMut>,
}

impl Recipient {
    /// The RCPT TO address.
    #[must_use]
    pub fn address(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.address)
    }

    /// ESMTP arguments to RCPT TO, empty when none were given.
    #[must_use]
    pub fn esmtp_args(&self) -> Vec<Cow<str>> {
        split_esmtp_args(self.esmtp_args.as_ref())
    }
}

impl Decode for Recipient {
    const CODE: u8 = b'R';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(address) = buffer.take_nul_str() else {
            return Err(Malformed::new("Recipient", "address not NUL-terminated", buffer).into());
        };

        Ok(Self {
            address,
            esmtp_args: rest_as_args(buffer),
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decode_recipient() {
        let rcpt = Recipient::decode(BytesMut::from("<rcpt@example.org>\0NOTIFY=NEVER"))
            .expect("decoding recipient failed");

        assert_eq!("<rcpt@example.org>", rcpt.address());
        assert_eq!(vec!["NOTIFY=NEVER"], rcpt.esmtp_args());
    }

    #[test]
    fn test_decode_recipient_unterminated() {
        let res = Recipient::decode(BytesMut::from("rcpt without nul"));

        assert_matches!(res, Err(ProtocolError::Malformed(_)));
    }
}
