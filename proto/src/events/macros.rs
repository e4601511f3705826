use bytes::BytesMut;

use crate::buf::BufExt;
use crate::decoding::Decode;
use crate::{Malformed, ProtocolError, ShortRead};

/// Macro definitions for one protocol stage.
///
/// The MTA sends these ahead of the event they annotate; a definition for a
/// stage replaces whatever was previously defined for that stage.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct DefineMacro {
    stage: u8,
    pairs: Vec<(BytesMut, BytesMut)>,
}

impl DefineMacro {
    /// The command byte of the stage these macros belong to (`C`, `H`, ...).
    #[must_use]
    pub fn stage(&self) -> u8 {
        self.stage
    }

    /// Iterate the received definitions as (name, value).
    pub fn pairs(&self) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.pairs.iter().map(|(name, value)| (&name[..], &value[..]))
    }

    /// Consume this event, keeping the definitions.
    #[must_use]
    pub fn into_pairs(self) -> Vec<(BytesMut, BytesMut)> {
        self.pairs
    }
}

impl Decode for DefineMacro {
    const CODE: u8 = b'D';

    fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(stage) = buffer.take_u8() else {
            return Err(ShortRead::new("DefineMacro", "stage byte missing", 1, 0).into());
        };

        let field_count = bytecount::count(&buffer, 0);
        let mut pairs = Vec::with_capacity(field_count / 2);
        while !buffer.is_empty() {
            let Some(name) = buffer.take_nul_str() else {
                return Err(
                    Malformed::new("DefineMacro", "name not NUL-terminated", buffer).into(),
                );
            };
            let Some(value) = buffer.take_nul_str() else {
                return Err(
                    Malformed::new("DefineMacro", "value not NUL-terminated", buffer).into(),
                );
            };

            pairs.push((name, value));
        }

        Ok(Self { stage, pairs })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("C", b'C', vec![])]
    #[case("Cj\0mx.example.org\0", b'C', vec![("j", "mx.example.org")])]
    #[case(
        "M{mail_host}\0h1\0{mail_mailer}\0esmtp\0",
        b'M',
        vec![("{mail_host}", "h1"), ("{mail_mailer}", "esmtp")]
    )]
    fn test_decode_ok(#[case] input: &str, #[case] stage: u8, #[case] expected: Vec<(&str, &str)>) {
        let defs = DefineMacro::decode(BytesMut::from(input)).expect("decoding macro failed");

        assert_eq!(stage, defs.stage());
        let got: Vec<(&[u8], &[u8])> = defs.pairs().collect();
        let expected: Vec<(&[u8], &[u8])> = expected
            .iter()
            .map(|(name, value)| (name.as_bytes(), value.as_bytes()))
            .collect();
        assert_eq!(expected, got);
    }

    #[test]
    fn test_decode_dangling_name() {
        let res = DefineMacro::decode(BytesMut::from("C{client_addr}\0"));

        assert_matches!(res, Err(ProtocolError::Malformed(_)));
    }

    #[test]
    fn test_decode_empty() {
        let res = DefineMacro::decode(BytesMut::new());

        assert_matches!(res, Err(ProtocolError::ShortRead(_)));
    }
}
