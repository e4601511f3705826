use std::borrow::Cow;

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError};

/// A single message header.
///
/// Header names are not unique; the same name may arrive several times.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Header {
    name: BytesMut,
    value: BytesMut,
}

impl Header {
    /// The header name.
    #[must_use]
    pub fn name(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.name)
    }

    /// The header value.
    #[must_use]
    pub fn value(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.value)
    }
}

impl Decode for Header {
    const CODE: u8 = b'L';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(name) = buffer.take_nul_str() else {
            return Err(Malformed::new("Header", "name not NUL-terminated", buffer).into());
        };

        let Some(value) = buffer.take_nul_str() else {
            return Err(Malformed::new("Header", "value not NUL-terminated", buffer).into());
        };

        Ok(Self { name, value })
    }
}

/// All headers have been delivered.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct EndOfHeaders;

impl Decode for EndOfHeaders {
    const CODE: u8 = b'N';

    fn decode(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_decode_header() {
        let header =
            Header::decode(BytesMut::from("Subject\0hello there\0")).expect("decoding failed");

        assert_eq!("Subject", header.name());
        assert_eq!("hello there", header.value());
    }

    #[rstest]
    #[case(BytesMut::from("Subject\0no value terminator"))]
    #[case(BytesMut::from("no name terminator"))]
    fn test_decode_header_unterminated(#[case] input: BytesMut) {
        assert_matches!(Header::decode(input), Err(ProtocolError::Malformed(_)));
    }
}
