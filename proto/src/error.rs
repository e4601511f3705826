use std::io;

use bytes::BytesMut;
use thiserror::Error;

/// Framing and payload grammar failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A frame declared a length above the configured ceiling.
    #[error("frame of {0} bytes exceeds the frame size limit")]
    FrameTooLarge(usize),

    /// A command byte outside the protocol table.
    #[error("unknown command byte {0:#04x}")]
    UnknownCommand(u8),

    /// A payload that ended before a required field.
    #[error(transparent)]
    ShortRead(#[from] ShortRead),

    /// A payload whose bytes violate the command grammar.
    #[error(transparent)]
    Malformed(#[from] Malformed),

    /// Transport failure reported by the underlying codec.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A payload that ran out of bytes mid-field.
#[derive(Debug, Error)]
#[error("{command}: {reason} (needed {needed} bytes, had {got})")]
pub struct ShortRead {
    /// The command whose payload was being decoded.
    pub command: &'static str,
    /// Which field was cut short.
    pub reason: &'static str,
    /// How many bytes the field needed.
    pub needed: usize,
    /// How many bytes were left.
    pub got: usize,
}

impl ShortRead {
    /// Create a new `ShortRead` error.
    #[must_use]
    pub fn new(command: &'static str, reason: &'static str, needed: usize, got: usize) -> Self {
        Self {
            command,
            reason,
            needed,
            got,
        }
    }
}

/// A payload whose bytes do not match the command grammar.
#[derive(Debug, Error)]
#[error("{command}: {reason}")]
pub struct Malformed {
    /// The command whose payload was being decoded.
    pub command: &'static str,
    /// What about the payload was wrong.
    pub reason: &'static str,
    /// The bytes that failed to decode.
    pub bytes: BytesMut,
}

impl Malformed {
    /// Create a new `Malformed` error.
    #[must_use]
    pub fn new(command: &'static str, reason: &'static str, bytes: BytesMut) -> Self {
        Self {
            command,
            reason,
            bytes,
        }
    }
}
