use std::io;
use std::time::Duration;

use asynchronous_codec::FramedWrite;
use futures::io::AsyncWrite;
use futures::SinkExt;
use thiserror::Error;

use ironmilter_proto::actions::{Action, Progress};
use ironmilter_proto::encoding::MilterReply;
use ironmilter_proto::events::DefineMacro;
use ironmilter_proto::modifications::Modification;
use ironmilter_proto::optneg::{Capability, Negotiated};
use ironmilter_proto::ProtocolError;

use crate::codec::FrameCodec;
use crate::macros::MacroStore;
use crate::phase::Phase;

pub(crate) type FramedWriter = FramedWrite<Box<dyn AsyncWrite + Send + Unpin>, FrameCodec>;

/// Errors from the action-sending surface of [`Context`].
#[derive(Debug, Error)]
pub enum ActionError {
    /// The action needs a capability the MTA did not grant during option
    /// negotiation. Nothing was buffered or written.
    #[error("action requires {missing:?}, which the MTA did not grant")]
    NotNegotiated {
        /// The capability bits that are missing.
        missing: Capability,
    },

    /// The action is not valid at this point of the conversation.
    #[error("{0}")]
    Misuse(&'static str),

    /// Writing to the MTA failed; the connection is beyond saving.
    #[error(transparent)]
    Send(#[from] ProtocolError),
}

/// Per-connection protocol state, threaded through every handler.
///
/// Owns the write half of the socket; handlers never touch the transport
/// directly. Replies travel back as handler return values — the context
/// only sends [`Progress`] keepalives and, during end-of-message handling,
/// buffers modification actions via [`Context::modify`].
pub struct Context {
    writer: FramedWriter,
    negotiated: Negotiated,
    macros: MacroStore,
    phase: Phase,
    eom_window: bool,
    pending: Vec<Modification>,
    write_timeout: Duration,
}

impl Context {
    pub(crate) fn new(
        writer: FramedWriter,
        negotiated: Negotiated,
        macros: MacroStore,
        write_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            negotiated,
            macros,
            phase: Phase::Options,
            eom_window: false,
            pending: Vec::new(),
            write_timeout,
        }
    }

    /// The sets agreed during option negotiation.
    #[must_use]
    pub fn negotiated(&self) -> &Negotiated {
        &self.negotiated
    }

    /// The current place on the conversation automaton.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Look up an MTA macro by name, e.g. `b"j"` or `b"{mail_host}"`.
    ///
    /// Definitions are scoped: what arrived for the connect and helo stages
    /// stays visible for the whole connection, everything later only until
    /// the message ends or is aborted.
    #[must_use]
    pub fn get_macro(&self, name: &[u8]) -> Option<&[u8]> {
        self.macros.get(name)
    }

    /// Send a keepalive so the MTA keeps waiting for the real reply.
    ///
    /// May be called any number of times; it does not count as the reply.
    ///
    /// # Errors
    /// [`ActionError::Send`] when the write fails.
    pub async fn progress(&mut self) -> Result<(), ActionError> {
        self.write(&Action::from(Progress).into()).await?;
        Ok(())
    }

    /// Request a message modification.
    ///
    /// Only valid while handling end-of-message. The action is checked
    /// against the negotiated capability set, buffered, and flushed to the
    /// MTA ahead of the final reply.
    ///
    /// # Errors
    /// [`ActionError::Misuse`] outside the end-of-message window,
    /// [`ActionError::NotNegotiated`] when the capability is missing. In
    /// both cases no bytes go out.
    pub fn modify(&mut self, action: impl Into<Modification>) -> Result<(), ActionError> {
        let action = action.into();

        if !self.eom_window {
            return Err(ActionError::Misuse(
                "modification actions are only valid while handling end-of-message",
            ));
        }

        let needed = action.required_capability();
        if !self.negotiated.actions.contains(needed) {
            return Err(ActionError::NotNegotiated {
                missing: needed - self.negotiated.actions,
            });
        }

        self.pending.push(action);
        Ok(())
    }

    pub(crate) fn define_macros(&mut self, frame: DefineMacro) {
        self.macros.define(frame);
    }

    pub(crate) fn reset_message_macros(&mut self) {
        self.macros.reset_message();
    }

    pub(crate) fn reset_connection_macros(&mut self) {
        self.macros.reset_connection();
    }

    pub(crate) fn advance_phase(&mut self, kind: ironmilter_proto::events::EventKind) {
        self.phase = self.phase.advance(kind);
    }

    pub(crate) fn open_eom_window(&mut self) {
        self.eom_window = true;
    }

    pub(crate) fn close_eom_window(&mut self) -> Vec<Modification> {
        self.eom_window = false;
        std::mem::take(&mut self.pending)
    }

    pub(crate) async fn write(&mut self, reply: &MilterReply) -> Result<(), ProtocolError> {
        write_frame(&mut self.writer, self.write_timeout, reply).await
    }
}

pub(crate) async fn write_frame(
    writer: &mut FramedWriter,
    write_timeout: Duration,
    reply: &MilterReply,
) -> Result<(), ProtocolError> {
    match tokio::time::timeout(write_timeout, writer.send(reply)).await {
        Ok(result) => result,
        Err(_elapsed) => Err(ProtocolError::Io(io::Error::new(
            io::ErrorKind::TimedOut,
            "write to MTA timed out",
        ))),
    }
}
