use std::borrow::Cow;

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::ProtocolError;

/// An SMTP command the MTA did not recognize.
///
/// Reported verbatim so a milter can police protocol extensions.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Unknown {
    command: BytesMut,
}

impl Unknown {
    /// The raw SMTP command line.
    #[must_use]
    pub fn command(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.command)
    }

    /// The raw SMTP command bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.command
    }
}

impl Decode for Unknown {
    const CODE: u8 = b'U';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        // Tolerate a missing terminator; the payload is free-form anyway.
        let command = match buffer.take_nul_str() {
            Some(command) => command,
            None => buffer,
        };

        Ok(Self { command })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_decode_unknown() {
        let unknown =
            Unknown::decode(BytesMut::from("TURN please\0")).expect("decoding unknown failed");

        assert_eq!("TURN please", unknown.command());
    }

    #[test]
    fn test_decode_unknown_unterminated() {
        let unknown = Unknown::decode(BytesMut::from("XCLIENT")).expect("decoding unknown failed");

        assert_eq!(b"XCLIENT", unknown.as_bytes());
    }
}
