use bytes::BytesMut;

use crate::decoding::Decode;
use crate::ProtocolError;

/// One chunk of the message body.
///
/// Bodies arrive split into chunks of at most 65535 bytes; this event
/// repeats until [`EndOfMessage`].
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Body {
    chunk: BytesMut,
}

impl Body {
    /// The raw chunk bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.chunk
    }

    /// Consume this event, keeping the chunk.
    #[must_use]
    pub fn into_bytes(self) -> BytesMut {
        self.chunk
    }
}

impl Decode for Body {
    const CODE: u8 = b'B';

    fn decode(buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self { chunk: buffer })
    }
}

/// The message is complete.
///
/// This is the only event during which modification actions may be sent.
/// Some MTAs attach the final body chunk to it instead of sending a
/// separate [`Body`] frame.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct EndOfMessage {
    trailing: BytesMut,
}

impl EndOfMessage {
    /// Body bytes delivered with the end-of-message frame itself, if any.
    #[must_use]
    pub fn trailing(&self) -> &[u8] {
        &self.trailing
    }
}

impl Decode for EndOfMessage {
    const CODE: u8 = b'E';

    fn decode(buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self { trailing: buffer })
    }
}
