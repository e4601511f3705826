use std::io;

use async_trait::async_trait;
use thiserror::Error;

use ironmilter_proto::actions::{Action, Continue};
use ironmilter_proto::events::{
    Body, Connect, EndOfMessage, EventKind, Header, Helo, Mail, Recipient, Unknown,
};
use ironmilter_proto::optneg::{MilterOptions, NegotiationError};
use ironmilter_proto::ProtocolError;

use crate::context::{ActionError, Context};
use crate::phase::Phase;

/// Implement a milter: one method per MTA event.
///
/// Every handler defaults to answering [`Continue`], so a filter only
/// overrides the events it cares about. Filter state lives in the
/// implementor (`&mut self` is yours); protocol state arrives through the
/// [`Context`]. See the crate docs for a complete example.
#[async_trait]
pub trait Milter: Send {
    /// The error type surfaced by this implementation.
    ///
    /// A returned error tears the connection down and is handed back to
    /// whoever drives the session.
    type Error: Send;

    /// Capability requirements and event preferences for the handshake.
    ///
    /// Called once per connection when the MTA's options offer arrives.
    /// The default declares no handled events, which asks the MTA to
    /// suppress everything suppressible; override this and set
    /// [`MilterOptions::events`] to the events your handlers cover.
    #[doc(alias = "xxfi_negotiate")]
    fn options(&self) -> MilterOptions {
        MilterOptions::default()
    }

    /// Connection information about the SMTP client.
    #[doc(alias = "xxfi_connect")]
    async fn connect(&mut self, _ctx: &mut Context, _connect: Connect) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// The HELO/EHLO greeting.
    #[doc(alias = "xxfi_helo")]
    async fn helo(&mut self, _ctx: &mut Context, _helo: Helo) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// The envelope sender of the next message.
    #[doc(alias = "xxfi_envfrom")]
    async fn mail(&mut self, _ctx: &mut Context, _mail: Mail) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// One envelope recipient; repeats per RCPT TO.
    #[doc(alias = "xxfi_envrcpt")]
    async fn rcpt(&mut self, _ctx: &mut Context, _rcpt: Recipient) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// The SMTP DATA command was issued.
    #[doc(alias = "xxfi_data")]
    async fn data(&mut self, _ctx: &mut Context) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// One message header; repeats per header.
    #[doc(alias = "xxfi_header")]
    async fn header(&mut self, _ctx: &mut Context, _header: Header) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// All headers have been delivered.
    #[doc(alias = "xxfi_eoh")]
    async fn end_of_headers(&mut self, _ctx: &mut Context) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// One chunk of the message body; repeats until end-of-message.
    ///
    /// Answering [`Skip`](ironmilter_proto::actions::Skip) stops further
    /// chunks, provided the `SKIP` flag was negotiated.
    #[doc(alias = "xxfi_body")]
    async fn body(&mut self, _ctx: &mut Context, _body: Body) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// The message is complete.
    ///
    /// The only handler that may request modifications, via
    /// [`Context::modify`]; they are flushed ahead of the returned action.
    #[doc(alias = "xxfi_eom")]
    async fn end_of_message(
        &mut self,
        _ctx: &mut Context,
        _eom: EndOfMessage,
    ) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// An SMTP command the MTA did not recognize.
    #[doc(alias = "xxfi_unknown")]
    async fn unknown(&mut self, _ctx: &mut Context, _unknown: Unknown) -> Result<Action, Self::Error> {
        Ok(Continue.into())
    }

    /// The MTA abandoned the current message.
    ///
    /// Transaction state should be dropped here; the connection lives on
    /// and the next message may follow immediately. No reply is sent.
    #[doc(alias = "xxfi_abort")]
    async fn abort(&mut self, _ctx: &mut Context) -> Result<(), Self::Error> {
        Ok(())
    }

    /// The MTA is closing this connection.
    #[doc(alias = "xxfi_close")]
    async fn quit(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    /// The MTA released this connection for reuse by another SMTP client.
    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Everything that can end a connection or surface from a handler.
#[derive(Debug, Error)]
pub enum Error<ImplError> {
    /// Transport failure; check the socket.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// Framing or payload grammar violation by the MTA.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The options handshake failed; the connection was closed before any
    /// mail processing.
    #[error(transparent)]
    Unsupported(#[from] NegotiationError),

    /// An event arrived that is illegal in the current phase.
    #[error("event {event:?} is not legal in phase {phase:?}")]
    UnexpectedEvent {
        /// Where the session stood.
        phase: Phase,
        /// What arrived instead of something legal.
        event: EventKind,
    },

    /// A reply violated the negotiated contract (e.g. `Skip` without the
    /// `SKIP` flag).
    #[error(transparent)]
    Action(#[from] ActionError),

    /// The milter implementation returned an error; it is handed through
    /// to the call site.
    #[error("milter implementation error")]
    Handler(ImplError),

    /// The milter implementation panicked. The MTA got a tempfail if a
    /// reply was still owed.
    #[error("milter implementation panicked: {0}")]
    HandlerPanic(String),
}
