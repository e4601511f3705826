//! Events the MTA reports across the lifecycle of an SMTP transaction.
//!
//! Each event corresponds to one inbound frame. The engine decodes them via
//! [`MtaEvent`](crate::decoding::MtaEvent) and hands them to the matching
//! handler method.

mod body;
mod connect;
mod control;
mod header;
mod helo;
mod macros;
mod mail;
mod recipient;
mod unknown;

pub use self::body::{Body, EndOfMessage};
pub use self::connect::{Connect, Family};
pub use self::control::{Abort, Disconnect, Quit};
pub use self::header::{EndOfHeaders, Header};
pub use self::helo::Helo;
pub use self::macros::DefineMacro;
pub use self::mail::{Data, Mail};
pub use self::recipient::Recipient;
pub use self::unknown::Unknown;

/// The fieldless tag of an event, used by negotiation and the phase tables.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Options,
    DefineMacro,
    Connect,
    Helo,
    Mail,
    Recipient,
    Data,
    Header,
    EndOfHeaders,
    Body,
    EndOfMessage,
    Abort,
    Quit,
    Disconnect,
    Unknown,
}
