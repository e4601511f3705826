use std::borrow::Cow;

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError};

/// The envelope sender of the message about to be processed.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Mail {
    sender: BytesMut,
    esmtp_args: Option<BytesMut>,
}

impl Mail {
    /// The MAIL FROM address.
    #[must_use]
    pub fn sender(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.sender)
    }

    /// ESMTP arguments to MAIL FROM, empty when none were given.
    #[must_use]
    pub fn esmtp_args(&self) -> Vec<Cow<str>> {
        split_esmtp_args(self.esmtp_args.as_ref())
    }
}

impl Decode for Mail {
    const CODE: u8 = b'M';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(sender) = buffer.take_nul_str() else {
            return Err(Malformed::new("Mail", "sender not NUL-terminated", buffer).into());
        };

        Ok(Self {
            sender,
            esmtp_args: rest_as_args(buffer),
        })
    }
}

/// The SMTP DATA command was issued; headers and body follow.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Data;

impl Decode for Data {
    const CODE: u8 = b'T';

    fn decode(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

pub(super) fn rest_as_args(buffer: BytesMut) -> Option<BytesMut> {
    if buffer.is_empty() {
        None
    } else {
        Some(buffer)
    }
}

pub(super) fn split_esmtp_args(args: Option<&BytesMut>) -> Vec<Cow<str>> {
    let Some(args) = args else {
        return Vec::new();
    };

    args[..]
        .split(|&b| b == 0)
        .filter(|chunk| !chunk.is_empty())
        .map(String::from_utf8_lossy)
        .collect()
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decode_mail_with_args() {
        let mail =
            Mail::decode(BytesMut::from("<sender@example.org>\0SIZE=1024\0BODY=8BITMIME\0"))
                .expect("decoding mail failed");

        assert_eq!("<sender@example.org>", mail.sender());
        assert_eq!(vec!["SIZE=1024", "BODY=8BITMIME"], mail.esmtp_args());
    }

    #[test]
    fn test_decode_mail_without_args() {
        let mail = Mail::decode(BytesMut::from("<>\0")).expect("decoding mail failed");

        assert_eq!("<>", mail.sender());
        assert!(mail.esmtp_args().is_empty());
    }

    #[test]
    fn test_decode_mail_unterminated() {
        let res = Mail::decode(BytesMut::from("no terminator"));

        assert_matches!(res, Err(ProtocolError::Malformed(_)));
    }
}
