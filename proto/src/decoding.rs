//! Parsing inbound frame payloads into typed events.

use bytes::BytesMut;

use crate::buf::BufExt;
use crate::events::{
    Abort, Body, Connect, Data, DefineMacro, Disconnect, EndOfHeaders, EndOfMessage, EventKind,
    Header, Helo, Mail, Quit, Recipient, Unknown,
};
use crate::optneg::Options;
use crate::{ProtocolError, ShortRead};

/// Decode the payload of a single command.
pub trait Decode: Sized {
    /// The command byte introducing this payload on the wire.
    const CODE: u8;

    /// Decode `Self` from a frame payload (length prefix and command byte
    /// already stripped).
    ///
    /// # Errors
    /// Returns a [`ProtocolError`] when the payload violates the command
    /// grammar.
    fn decode(buffer: BytesMut) -> Result<Self, ProtocolError>;
}

/// Any frame the MTA sends to the milter.
#[allow(missing_docs)]
#[derive(Debug, Clone)]
pub enum MtaEvent {
    Options(Options),
    DefineMacro(DefineMacro),
    Connect(Connect),
    Helo(Helo),
    Mail(Mail),
    Recipient(Recipient),
    Data(Data),
    Header(Header),
    EndOfHeaders(EndOfHeaders),
    Body(Body),
    EndOfMessage(EndOfMessage),
    Abort(Abort),
    Quit(Quit),
    Disconnect(Disconnect),
    Unknown(Unknown),
}

impl MtaEvent {
    /// Decode one frame payload, dispatching on the leading command byte.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownCommand`] for a command byte outside the
    /// table, or whatever the payload decoder reports.
    pub fn decode(mut buffer: BytesMut) -> Result<Self, ProtocolError> {
        let Some(code) = buffer.take_u8() else {
            return Err(ShortRead::new("frame", "command byte missing", 1, 0).into());
        };

        match code {
            Options::CODE => Ok(Self::Options(Options::decode(buffer)?)),
            DefineMacro::CODE => Ok(Self::DefineMacro(DefineMacro::decode(buffer)?)),
            Connect::CODE => Ok(Self::Connect(Connect::decode(buffer)?)),
            Helo::CODE => Ok(Self::Helo(Helo::decode(buffer)?)),
            Mail::CODE => Ok(Self::Mail(Mail::decode(buffer)?)),
            Recipient::CODE => Ok(Self::Recipient(Recipient::decode(buffer)?)),
            Data::CODE => Ok(Self::Data(Data::decode(buffer)?)),
            Header::CODE => Ok(Self::Header(Header::decode(buffer)?)),
            EndOfHeaders::CODE => Ok(Self::EndOfHeaders(EndOfHeaders::decode(buffer)?)),
            Body::CODE => Ok(Self::Body(Body::decode(buffer)?)),
            EndOfMessage::CODE => Ok(Self::EndOfMessage(EndOfMessage::decode(buffer)?)),
            Abort::CODE => Ok(Self::Abort(Abort::decode(buffer)?)),
            Quit::CODE => Ok(Self::Quit(Quit::decode(buffer)?)),
            Disconnect::CODE => Ok(Self::Disconnect(Disconnect::decode(buffer)?)),
            Unknown::CODE => Ok(Self::Unknown(Unknown::decode(buffer)?)),
            other => Err(ProtocolError::UnknownCommand(other)),
        }
    }

    /// The fieldless tag of this event.
    #[must_use]
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Options(_) => EventKind::Options,
            Self::DefineMacro(_) => EventKind::DefineMacro,
            Self::Connect(_) => EventKind::Connect,
            Self::Helo(_) => EventKind::Helo,
            Self::Mail(_) => EventKind::Mail,
            Self::Recipient(_) => EventKind::Recipient,
            Self::Data(_) => EventKind::Data,
            Self::Header(_) => EventKind::Header,
            Self::EndOfHeaders(_) => EventKind::EndOfHeaders,
            Self::Body(_) => EventKind::Body,
            Self::EndOfMessage(_) => EventKind::EndOfMessage,
            Self::Abort(_) => EventKind::Abort,
            Self::Quit(_) => EventKind::Quit,
            Self::Disconnect(_) => EventKind::Disconnect,
            Self::Unknown(_) => EventKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn test_decode_abort() {
        let event = MtaEvent::decode(BytesMut::from_iter([b'A'])).expect("decoding abort failed");

        assert_matches!(event, MtaEvent::Abort(_));
        assert_eq!(EventKind::Abort, event.kind());
    }

    #[test]
    fn test_decode_options() {
        let raw = [b'O', 0, 0, 0, 6, 0, 0, 1, 0xff, 0, 0, 0, 0];

        let event =
            MtaEvent::decode(BytesMut::from_iter(raw)).expect("decoding options failed");

        assert_matches!(event, MtaEvent::Options(options) if options.version == 6);
    }

    #[test]
    fn test_decode_unknown_command_byte() {
        let res = MtaEvent::decode(BytesMut::from_iter([b'z', 1, 2, 3]));

        assert_matches!(res, Err(ProtocolError::UnknownCommand(b'z')));
    }

    #[test]
    fn test_decode_empty_frame() {
        let res = MtaEvent::decode(BytesMut::new());

        assert_matches!(res, Err(ProtocolError::ShortRead(_)));
    }
}
