//! Serializing outbound frame payloads.

use bytes::BytesMut;
use enum_dispatch::enum_dispatch;

use crate::actions::{
    Accept, Action, Continue, Discard, Progress, Reject, ReplyCode, Skip, Tempfail,
};
use crate::modifications::{
    AddHeader, AddRecipient, ChangeHeader, ChangeSender, DeleteRecipient, InsertHeader,
    Modification, Quarantine, ReplaceBody,
};
use crate::optneg::Options;

/// Serialize the payload of a single command.
#[enum_dispatch(MilterReply)]
#[enum_dispatch(Action)]
#[enum_dispatch(Modification)]
pub trait Encode {
    /// Append the payload bytes to `buffer`.
    fn encode(&self, buffer: &mut BytesMut);

    /// The number of bytes [`Self::encode`] appends.
    fn encoded_len(&self) -> usize;

    /// The command byte introducing this payload on the wire.
    fn code(&self) -> u8;
}

/// Any frame the milter sends to the MTA.
#[allow(missing_docs)]
#[enum_dispatch]
#[derive(Debug)]
pub enum MilterReply {
    /// The milter's half of the options handshake.
    Options(Options),
    /// A reply action answering an event.
    Action,
    /// A modification requested during the end-of-message window.
    Modification,
}
