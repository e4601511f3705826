use std::any::Any;
use std::io;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use asynchronous_codec::{FramedRead, FramedWrite};
use futures::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use futures::{FutureExt, StreamExt};
use tracing::{debug, warn};

use ironmilter_proto::actions::{Action, Tempfail};
use ironmilter_proto::decoding::MtaEvent;
use ironmilter_proto::events::EventKind;
use ironmilter_proto::optneg::Protocol;

use crate::codec::{FrameCodec, DEFAULT_MAX_FRAME};
use crate::context::{write_frame, ActionError, Context, FramedWriter};
use crate::macros::MacroStore;
use crate::milter::{Error, Milter};
use crate::phase::Phase;

/// Default read timeout, matching the MTA side's data timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(7210);
/// Default write timeout.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(600);

/// Drives one milter conversation over a duplex stream.
///
/// Handles the options handshake, absorbs macro definitions, validates
/// each event against the conversation automaton, dispatches to the
/// [`Milter`] implementation and sends its reply. Runs until the MTA
/// quits, the stream ends, or something goes wrong.
pub struct Session<M: Milter> {
    milter: M,
    read_timeout: Duration,
    write_timeout: Duration,
    max_frame: usize,
}

impl<M: Milter> Session<M> {
    /// A session around `milter` with default limits.
    pub fn new(milter: M) -> Self {
        Self {
            milter,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Close the connection when the MTA stays silent this long.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Close the connection when a write stalls this long.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Refuse frames larger than `max_frame` bytes.
    #[must_use]
    pub fn max_frame_size(mut self, max_frame: usize) -> Self {
        self.max_frame = max_frame;
        self
    }

    /// The wrapped milter implementation.
    pub fn milter(&self) -> &M {
        &self.milter
    }

    /// Unwrap the milter implementation.
    pub fn into_milter(self) -> M {
        self.milter
    }

    /// Handle a single milter connection until quit, stream end or error.
    ///
    /// # Errors
    /// See [`enum@Error`]; any error means the connection is (being)
    /// closed. The MTA owns retries, so none are attempted here.
    pub async fn run<RW>(&mut self, stream: RW) -> Result<(), Error<M::Error>>
    where
        RW: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = stream.split();
        let mut reader = FramedRead::new(read_half, FrameCodec::new(self.max_frame));
        let mut writer: FramedWriter = FramedWrite::new(
            Box::new(write_half) as Box<dyn AsyncWrite + Send + Unpin>,
            FrameCodec::new(self.max_frame),
        );

        // Handshake: nothing but macro definitions may precede the offer.
        let mut macros = MacroStore::default();
        let negotiated = loop {
            let Some(event) = self.read_event(&mut reader).await? else {
                debug!("MTA went away before negotiating");
                return Ok(());
            };

            match event {
                MtaEvent::DefineMacro(defs) => macros.define(defs),
                MtaEvent::Options(offer) => {
                    debug!(version = offer.version, "received options offer");
                    let (reply, negotiated) = self.milter.options().negotiate(&offer)?;
                    write_frame(&mut writer, self.write_timeout, &reply.into()).await?;
                    break negotiated;
                }
                other => {
                    return Err(Error::UnexpectedEvent {
                        phase: Phase::Negotiate,
                        event: other.kind(),
                    });
                }
            }
        };

        let mut ctx = Context::new(writer, negotiated, macros, self.write_timeout);

        loop {
            let event = match self.read_event(&mut reader).await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("MTA closed the connection");
                    return Ok(());
                }
                Err(err) => {
                    // A final tempfail so the MTA requeues instead of hanging.
                    if matches!(err, Error::Protocol(_)) {
                        let _ = ctx.write(&Action::from(Tempfail).into()).await;
                    }
                    return Err(err);
                }
            };

            let kind = event.kind();
            if let MtaEvent::DefineMacro(defs) = event {
                ctx.define_macros(defs);
                continue;
            }

            if !ctx.phase().permits(kind, ctx.negotiated().protocol) {
                warn!(?kind, phase = ?ctx.phase(), "event illegal in this phase");
                return Err(Error::UnexpectedEvent {
                    phase: ctx.phase(),
                    event: kind,
                });
            }

            match event {
                MtaEvent::Connect(connect) => {
                    let result =
                        AssertUnwindSafe(self.milter.connect(&mut ctx, connect))
                            .catch_unwind()
                            .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Helo(helo) => {
                    let result = AssertUnwindSafe(self.milter.helo(&mut ctx, helo))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Mail(mail) => {
                    let result = AssertUnwindSafe(self.milter.mail(&mut ctx, mail))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Recipient(rcpt) => {
                    let result = AssertUnwindSafe(self.milter.rcpt(&mut ctx, rcpt))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Data(_) => {
                    let result = AssertUnwindSafe(self.milter.data(&mut ctx))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Header(header) => {
                    let result = AssertUnwindSafe(self.milter.header(&mut ctx, header))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::EndOfHeaders(_) => {
                    let result = AssertUnwindSafe(self.milter.end_of_headers(&mut ctx))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Body(body) => {
                    let result = AssertUnwindSafe(self.milter.body(&mut ctx, body))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::Unknown(unknown) => {
                    let result = AssertUnwindSafe(self.milter.unknown(&mut ctx, unknown))
                        .catch_unwind()
                        .await;
                    finish_event(&mut ctx, kind, result).await?;
                }
                MtaEvent::EndOfMessage(eom) => {
                    // Modifications may only be buffered while this handler runs.
                    ctx.open_eom_window();
                    let result =
                        AssertUnwindSafe(self.milter.end_of_message(&mut ctx, eom))
                            .catch_unwind()
                            .await;
                    let modifications = ctx.close_eom_window();

                    let action = match result {
                        Err(panic) => {
                            let _ = ctx.write(&Action::from(Tempfail).into()).await;
                            return Err(Error::HandlerPanic(panic_message(panic)));
                        }
                        Ok(Err(err)) => return Err(Error::Handler(err)),
                        Ok(Ok(action)) => action,
                    };

                    for modification in modifications {
                        ctx.write(&modification.into()).await?;
                    }
                    send_reply(&mut ctx, kind, action).await?;
                    ctx.reset_message_macros();
                }
                MtaEvent::Abort(_) => {
                    let result = AssertUnwindSafe(self.milter.abort(&mut ctx))
                        .catch_unwind()
                        .await;
                    match result {
                        Err(panic) => return Err(Error::HandlerPanic(panic_message(panic))),
                        Ok(Err(err)) => return Err(Error::Handler(err)),
                        // No reply to an abort; the MTA does not read one.
                        Ok(Ok(())) => {}
                    }
                    ctx.reset_message_macros();
                }
                MtaEvent::Quit(_) => {
                    debug!("MTA quit");
                    self.milter.quit().await.map_err(Error::Handler)?;
                    return Ok(());
                }
                MtaEvent::Disconnect(_) => {
                    debug!("MTA released the connection for reuse");
                    self.milter.disconnect().await.map_err(Error::Handler)?;
                    ctx.reset_connection_macros();
                }
                MtaEvent::Options(_) | MtaEvent::DefineMacro(_) => {
                    unreachable!("filtered before dispatch")
                }
            }

            ctx.advance_phase(kind);
        }
    }

    async fn read_event<R>(
        &self,
        reader: &mut FramedRead<R, FrameCodec>,
    ) -> Result<Option<MtaEvent>, Error<M::Error>>
    where
        R: AsyncRead + Unpin,
    {
        match tokio::time::timeout(self.read_timeout, reader.next()).await {
            Err(_elapsed) => Err(Error::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "read from MTA timed out",
            ))),
            Ok(None) => Ok(None),
            Ok(Some(Ok(event))) => Ok(Some(event)),
            Ok(Some(Err(err))) => Err(Error::Protocol(err)),
        }
    }
}

// Turn a guarded handler outcome into the wire reply.
async fn finish_event<E>(
    ctx: &mut Context,
    kind: EventKind,
    result: Result<Result<Action, E>, Box<dyn Any + Send>>,
) -> Result<(), Error<E>> {
    match result {
        Err(panic) => {
            if !ctx.negotiated().protocol.waives_reply(kind) {
                let _ = ctx.write(&Action::from(Tempfail).into()).await;
            }
            Err(Error::HandlerPanic(panic_message(panic)))
        }
        Ok(Err(err)) => Err(Error::Handler(err)),
        Ok(Ok(action)) => send_reply(ctx, kind, action).await,
    }
}

async fn send_reply<E>(ctx: &mut Context, kind: EventKind, action: Action) -> Result<(), Error<E>> {
    if matches!(action, Action::Skip(_)) {
        if kind != EventKind::Body {
            return Err(ActionError::Misuse("skip is only a valid reply to body chunks").into());
        }
        if !ctx.negotiated().protocol.contains(Protocol::SKIP) {
            return Err(ActionError::Misuse("skip reply was not negotiated with the MTA").into());
        }
    }

    if ctx.negotiated().protocol.waives_reply(kind) {
        if !matches!(action, Action::Continue(_)) {
            warn!(?kind, "dropping non-continue reply to a no-reply event");
        }
        return Ok(());
    }

    ctx.write(&action.into()).await?;
    Ok(())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
