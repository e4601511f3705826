use bytes::BytesMut;

use crate::decoding::Decode;
use crate::ProtocolError;

/// The MTA abandoned the current message.
///
/// The connection stays open; the next message may start with a new MAIL
/// FROM. Message-scope macros are gone after this.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Abort;

impl Decode for Abort {
    const CODE: u8 = b'A';

    fn decode(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

/// The MTA is closing this connection for good.
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Quit;

impl Decode for Quit {
    const CODE: u8 = b'Q';

    fn decode(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}

/// The MTA released this connection to be reused by another SMTP client.
///
/// Everything connection-scoped resets; the next event is a fresh
/// [`Connect`](super::Connect) or a final [`Quit`].
#[derive(Clone, PartialEq, Debug, Default)]
pub struct Disconnect;

impl Decode for Disconnect {
    const CODE: u8 = b'K';

    fn decode(_buffer: BytesMut) -> Result<Self, ProtocolError> {
        Ok(Self)
    }
}
