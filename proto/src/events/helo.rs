use std::borrow::Cow;

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError};

/// The greeting the SMTP client announced itself with.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Helo {
    greeting: BytesMut,
}

impl Helo {
    /// The HELO/EHLO argument as sent by the SMTP client.
    #[must_use]
    pub fn greeting(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.greeting)
    }
}

impl Decode for Helo {
    const CODE: u8 = b'H';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(greeting) = buffer.take_nul_str() else {
            return Err(Malformed::new("Helo", "greeting not NUL-terminated", buffer).into());
        };

        Ok(Self { greeting })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(BytesMut::from("client.example\0"), "client.example")]
    #[case(BytesMut::from("\0"), "")]
    fn test_decode_ok(#[case] input: BytesMut, #[case] expected: &str) {
        let helo = Helo::decode(input).expect("decoding helo failed");

        assert_eq!(expected, helo.greeting());
    }

    #[rstest]
    #[case(BytesMut::new())]
    #[case(BytesMut::from("no terminator"))]
    fn test_decode_unterminated(#[case] input: BytesMut) {
        assert_matches!(Helo::decode(input), Err(ProtocolError::Malformed(_)));
    }
}
