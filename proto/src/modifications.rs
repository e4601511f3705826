//! Modification actions: changes to the message a milter may request.
//!
//! These are only valid between the end-of-message event and its final
//! reply, and each one must have been granted by its [`Capability`] bit
//! during option negotiation.

use std::borrow::Cow;

use bytes::{BufMut, BytesMut};
use enum_dispatch::enum_dispatch;

use crate::encoding::Encode;
use crate::optneg::Capability;

/// Append a header to the message.
#[derive(Debug, Clone)]
pub struct AddHeader {
    name: BytesMut,
    value: BytesMut,
}

impl AddHeader {
    const CODE: u8 = b'h';

    /// Add a header with the given name and value.
    #[must_use]
    pub fn new(name: &[u8], value: &[u8]) -> Self {
        Self {
            name: BytesMut::from(name),
            value: BytesMut::from(value),
        }
    }

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

impl Encode for AddHeader {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.name);
        buffer.put_u8(0);
        buffer.extend_from_slice(&self.value);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        self.name.len() + 1 + self.value.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Insert a header at a position in the header list.
#[derive(Debug, Clone)]
pub struct InsertHeader {
    index: u32,
    name: BytesMut,
    value: BytesMut,
}

impl InsertHeader {
    const CODE: u8 = b'i';

    /// Insert a header so it ends up at list position `index`.
    #[must_use]
    pub fn new(index: u32, name: &[u8], value: &[u8]) -> Self {
        Self {
            index,
            name: BytesMut::from(name),
            value: BytesMut::from(value),
        }
    }

    /// The list position to insert at.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Encode for InsertHeader {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u32(self.index);
        buffer.extend_from_slice(&self.name);
        buffer.put_u8(0);
        buffer.extend_from_slice(&self.value);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        4 + self.name.len() + 1 + self.value.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Replace one occurrence of a header.
///
/// The index counts occurrences of the same name, starting at 1; an empty
/// value deletes that occurrence.
#[derive(Debug, Clone)]
pub struct ChangeHeader {
    index: u32,
    name: BytesMut,
    value: BytesMut,
}

impl ChangeHeader {
    const CODE: u8 = b'm';

    /// Change the `index`th header named `name` to `value`.
    #[must_use]
    pub fn new(index: u32, name: &[u8], value: &[u8]) -> Self {
        Self {
            index,
            name: BytesMut::from(name),
            value: BytesMut::from(value),
        }
    }

    /// Delete the `index`th header named `name`.
    #[must_use]
    pub fn delete(index: u32, name: &[u8]) -> Self {
        Self::new(index, name, b"")
    }

    /// The per-name occurrence index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }
}

impl Encode for ChangeHeader {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.put_u32(self.index);
        buffer.extend_from_slice(&self.name);
        buffer.put_u8(0);
        buffer.extend_from_slice(&self.value);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        4 + self.name.len() + 1 + self.value.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Add an envelope recipient.
///
/// Does not touch the To header. With ESMTP arguments attached this uses
/// the argument-carrying wire form, which needs the separate
/// [`Capability::ADDRCPT_PAR`] grant.
#[derive(Debug, Clone)]
pub struct AddRecipient {
    address: BytesMut,
    esmtp_args: Option<BytesMut>,
}

impl AddRecipient {
    const CODE: u8 = b'+';
    const CODE_WITH_ARGS: u8 = b'2';

    /// Add the given recipient address.
    #[must_use]
    pub fn new(address: &[u8]) -> Self {
        Self {
            address: BytesMut::from(address),
            esmtp_args: None,
        }
    }

    /// Attach ESMTP arguments to the generated RCPT TO.
    #[must_use]
    pub fn with_esmtp_args(mut self, args: &[u8]) -> Self {
        self.esmtp_args = Some(BytesMut::from(args));
        self
    }

    /// The recipient address to add.
    #[must_use]
    pub fn address(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.address)
    }

    /// Whether ESMTP arguments are attached.
    #[must_use]
    pub fn has_esmtp_args(&self) -> bool {
        self.esmtp_args.is_some()
    }
}

impl Encode for AddRecipient {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.address);
        buffer.put_u8(0);
        if let Some(args) = &self.esmtp_args {
            buffer.extend_from_slice(args);
            buffer.put_u8(0);
        }
    }

    fn encoded_len(&self) -> usize {
        self.address.len() + 1 + self.esmtp_args.as_ref().map_or(0, |args| args.len() + 1)
    }

    fn code(&self) -> u8 {
        if self.esmtp_args.is_some() {
            Self::CODE_WITH_ARGS
        } else {
            Self::CODE
        }
    }
}

/// Remove an envelope recipient.
///
/// The address must match what was given in RCPT TO exactly. Does not touch
/// the To header.
#[derive(Debug, Clone)]
pub struct DeleteRecipient {
    address: BytesMut,
}

impl DeleteRecipient {
    const CODE: u8 = b'-';

    /// Delete the given recipient address.
    #[must_use]
    pub fn new(address: &[u8]) -> Self {
        Self {
            address: BytesMut::from(address),
        }
    }

    /// The recipient address to delete.
    #[must_use]
    pub fn address(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.address)
    }
}

impl Encode for DeleteRecipient {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.address);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        self.address.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Replace the message body.
///
/// The whole replacement body has to be sent; it may be split across
/// several of these actions, chunked like inbound bodies.
#[derive(Debug, Clone)]
pub struct ReplaceBody {
    chunk: BytesMut,
}

impl ReplaceBody {
    const CODE: u8 = b'b';

    /// One chunk of the replacement body.
    #[must_use]
    pub fn new(chunk: &[u8]) -> Self {
        Self {
            chunk: BytesMut::from(chunk),
        }
    }

    /// The chunk bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.chunk
    }
}

impl Encode for ReplaceBody {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.chunk);
    }

    fn encoded_len(&self) -> usize {
        self.chunk.len()
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Move the message into the MTA's quarantine hold.
#[derive(Debug, Clone)]
pub struct Quarantine {
    reason: BytesMut,
}

impl Quarantine {
    const CODE: u8 = b'q';

    /// Quarantine with the given reason.
    #[must_use]
    pub fn new(reason: &[u8]) -> Self {
        Self {
            reason: BytesMut::from(reason),
        }
    }

    /// The reason recorded with the held message.
    #[must_use]
    pub fn reason(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.reason)
    }
}

impl Encode for Quarantine {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.reason);
        buffer.put_u8(0);
    }

    fn encoded_len(&self) -> usize {
        self.reason.len() + 1
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// Replace the envelope sender.
#[derive(Debug, Clone)]
pub struct ChangeSender {
    address: BytesMut,
    esmtp_args: Option<BytesMut>,
}

impl ChangeSender {
    const CODE: u8 = b'e';

    /// Set the envelope sender to the given address.
    #[must_use]
    pub fn new(address: &[u8]) -> Self {
        Self {
            address: BytesMut::from(address),
            esmtp_args: None,
        }
    }

    /// Attach ESMTP arguments to the rewritten MAIL FROM.
    #[must_use]
    pub fn with_esmtp_args(mut self, args: &[u8]) -> Self {
        self.esmtp_args = Some(BytesMut::from(args));
        self
    }

    /// The new envelope sender address.
    #[must_use]
    pub fn address(&self) -> Cow<str> {
        String::from_utf8_lossy(&self.address)
    }
}

impl Encode for ChangeSender {
    fn encode(&self, buffer: &mut BytesMut) {
        buffer.extend_from_slice(&self.address);
        buffer.put_u8(0);
        if let Some(args) = &self.esmtp_args {
            buffer.extend_from_slice(args);
            buffer.put_u8(0);
        }
    }

    fn encoded_len(&self) -> usize {
        self.address.len() + 1 + self.esmtp_args.as_ref().map_or(0, |args| args.len() + 1)
    }

    fn code(&self) -> u8 {
        Self::CODE
    }
}

/// All modification actions combined.
///
/// See the contained variants for more.
#[allow(missing_docs)]
#[enum_dispatch]
#[derive(Debug, Clone)]
pub enum Modification {
    AddHeader,
    InsertHeader,
    ChangeHeader,
    AddRecipient,
    DeleteRecipient,
    ReplaceBody,
    Quarantine,
    ChangeSender,
}

impl Modification {
    /// The capability bit that licenses sending this modification.
    #[must_use]
    pub fn required_capability(&self) -> Capability {
        match self {
            Self::AddHeader(_) => Capability::ADDHDR,
            Self::InsertHeader(_) | Self::ChangeHeader(_) => Capability::CHGHDR,
            Self::AddRecipient(rcpt) => {
                if rcpt.has_esmtp_args() {
                    Capability::ADDRCPT_PAR
                } else {
                    Capability::ADDRCPT
                }
            }
            Self::DeleteRecipient(_) => Capability::DELRCPT,
            Self::ReplaceBody(_) => Capability::CHGBODY,
            Self::Quarantine(_) => Capability::QUARANTINE,
            Self::ChangeSender(_) => Capability::CHGFROM,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_encode_add_header() {
        let mut buffer = BytesMut::new();
        let add = AddHeader::new(b"X-Filter", b"ok");
        add.encode(&mut buffer);

        assert_eq!(BytesMut::from("X-Filter\0ok\0"), buffer);
        assert_eq!(add.encoded_len(), buffer.len());
        assert_eq!(b'h', Encode::code(&add));
    }

    #[rstest]
    #[case(ChangeHeader::new(1, b"Subject", b"redacted"), "\0\0\0\x01Subject\0redacted\0")]
    #[case(ChangeHeader::delete(2, b"X-Spam"), "\0\0\0\x02X-Spam\0\0")]
    fn test_encode_change_header(#[case] change: ChangeHeader, #[case] expected: &str) {
        let mut buffer = BytesMut::new();
        change.encode(&mut buffer);

        assert_eq!(BytesMut::from(expected), buffer);
        assert_eq!(change.encoded_len(), buffer.len());
    }

    #[test]
    fn test_encode_insert_header() {
        let mut buffer = BytesMut::new();
        let insert = InsertHeader::new(1, b"X-First", b"yes");
        insert.encode(&mut buffer);

        assert_eq!(BytesMut::from("\0\0\0\x01X-First\0yes\0"), buffer);
        assert_eq!(b'i', Encode::code(&insert));
    }

    #[test]
    fn test_add_recipient_switches_wire_form() {
        let plain = AddRecipient::new(b"<new@example.org>");
        assert_eq!(b'+', Encode::code(&plain));
        assert_eq!(
            Capability::ADDRCPT,
            Modification::from(plain.clone()).required_capability()
        );

        let with_args = plain.with_esmtp_args(b"NOTIFY=NEVER");
        assert_eq!(b'2', Encode::code(&with_args));
        assert_eq!(
            Capability::ADDRCPT_PAR,
            Modification::from(with_args.clone()).required_capability()
        );

        let mut buffer = BytesMut::new();
        with_args.encode(&mut buffer);
        assert_eq!(BytesMut::from("<new@example.org>\0NOTIFY=NEVER\0"), buffer);
        assert_eq!(with_args.encoded_len(), buffer.len());
    }

    #[test]
    fn test_encode_change_sender() {
        let mut buffer = BytesMut::new();
        let change = ChangeSender::new(b"<rewritten@example.org>");
        change.encode(&mut buffer);

        assert_eq!(BytesMut::from("<rewritten@example.org>\0"), buffer);
        assert_eq!(b'e', Encode::code(&change));
    }

    #[test]
    fn test_encode_quarantine() {
        let mut buffer = BytesMut::new();
        let quarantine = Quarantine::new(b"looks like malware");
        quarantine.encode(&mut buffer);

        assert_eq!(BytesMut::from("looks like malware\0"), buffer);
        assert_eq!(quarantine.encoded_len(), buffer.len());
    }

    #[test]
    fn test_encode_replace_body_is_raw() {
        let mut buffer = BytesMut::new();
        let replace = ReplaceBody::new(b"new body\r\n");
        replace.encode(&mut buffer);

        assert_eq!(BytesMut::from("new body\r\n"), buffer);
        assert_eq!(b'b', Encode::code(&replace));
    }
}
