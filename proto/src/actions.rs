//! Reply actions: how a milter answers a single event.
//!
//! Exactly one of these goes back per event, except [`Progress`], which may
//! precede the real reply any number of times to keep the MTA waiting.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};
use enum_dispatch::enum_dispatch;
use itertools::Itertools;

use crate::encoding::Encode;

/// Proceed with the next event.
#[derive(Debug, Clone, Default)]
pub struct Continue;

impl Continue {
    const CODE: u8 = b'c';
}

impl Encode for Continue {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Accept the message unconditionally; no further events for it.
#[derive(Debug, Clone, Default)]
pub struct Accept;

impl Accept {
    const CODE: u8 = b'a';
}

impl Encode for Accept {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Reject the message (or connection/recipient, depending on the event)
/// with a permanent failure.
#[derive(Debug, Clone, Default)]
pub struct Reject;

impl Reject {
    const CODE: u8 = b'r';
}

impl Encode for Reject {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Silently swallow the message without informing the SMTP client.
#[derive(Debug, Clone, Default)]
pub struct Discard;

impl Discard {
    const CODE: u8 = b'd';
}

impl Encode for Discard {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Answer with a temporary failure; the SMTP client should retry later.
#[derive(Debug, Clone, Default)]
pub struct Tempfail;

impl Tempfail {
    const CODE: u8 = b't';
}

impl Encode for Tempfail {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Stop delivering further events of the current kind.
///
/// Only valid as the reply to a body chunk, and only after the `SKIP`
/// protocol flag was agreed during negotiation.
#[derive(Debug, Clone, Default)]
pub struct Skip;

impl Skip {
    const CODE: u8 = b's';
}

impl Encode for Skip {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Keepalive while a handler is still working.
///
/// Does not count as the reply; the real action must still follow.
#[derive(Debug, Clone, Default)]
pub struct Progress;

impl Progress {
    const CODE: u8 = b'p';
}

impl Encode for Progress {
    fn encode(&self, _buffer: &mut BytesMut) {}

    fn encoded_len(&self) -> usize {
        0
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Answer with an explicit SMTP status line.
///
/// Carries the three-digit SMTP code, an optional enhanced status code and
/// the response text. Codes are not validated; the MTA rejects replies whose
/// class contradicts the event.
#[derive(Debug, Clone)]
pub struct ReplyCode {
    code: BytesMut,
    enhanced: Option<EnhancedCode>,
    text: BytesMut,
}

impl ReplyCode {
    const CODE: u8 = b'y';

    /// An SMTP reply without an enhanced status code.
    #[must_use]
    pub fn new(code: u16, text: &str) -> Self {
        Self {
            code: BytesMut::from(code.to_string().as_bytes()),
            enhanced: None,
            text: BytesMut::from(text.as_bytes()),
        }
    }

    /// Attach an enhanced status code (RFC 3463 class.subject.detail).
    #[must_use]
    pub fn with_enhanced(mut self, enhanced: [u16; 3]) -> Self {
        self.enhanced = Some(EnhancedCode::new(enhanced));
        self
    }

    /// The SMTP status digits.
    #[must_use]
    pub fn status(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.code)
    }

    /// The enhanced status code, if set.
    #[must_use]
    pub fn enhanced(&self) -> Option<[u16; 3]> {
        self.enhanced.as_ref().map(|e| e.parts)
    }

    /// The response text.
    #[must_use]
    pub fn text(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.text)
    }
}

impl Encode for ReplyCode {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.code);
        buffer.put_u8(0);
        if let Some(enhanced) = &self.enhanced {
            buffer.extend_from_slice(&enhanced.bytes);
        }
        buffer.put_u8(0);
        buffer.extend_from_slice(&self.text);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        self.code.len()
            + 1
            + self.enhanced.as_ref().map_or(0, |e| e.bytes.len())
            + 1
            + self.text.len()
            + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// A dotted class.subject.detail status, pre-rendered for the wire.
#[derive(Debug, Clone)]
struct EnhancedCode {
    parts: [u16; 3],
    bytes: BytesMut,
}

impl EnhancedCode {
    fn new(parts: [u16; 3]) -> Self {
        Self {
            parts,
            bytes: BytesMut::from(parts.iter().join(".").as_bytes()),
        }
    }
}

/// All reply actions combined.
///
/// See the contained variants for more.
#[allow(missing_docs)]
#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum Action {
    Continue,
    Accept,
    Reject,
    Discard,
    Tempfail,
    Skip,
    Progress,
    ReplyCode,
}
