#![doc = include_str!("../Readme.md")]
#![warn(missing_docs)]

mod codec;
mod context;
mod macros;
mod milter;
mod phase;
mod session;

pub use codec::DEFAULT_MAX_FRAME;
pub use context::{ActionError, Context};
pub use milter::{Error, Milter};
pub use phase::Phase;
pub use session::{Session, DEFAULT_READ_TIMEOUT, DEFAULT_WRITE_TIMEOUT};

use std::fmt::Debug;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinSet;
use tokio_util::compat::TokioAsyncReadCompatExt;
use tracing::{debug, info, warn, Instrument};

/// A bound listening endpoint: TCP port or unix domain socket.
#[derive(Debug)]
pub enum Listener {
    /// A TCP listening socket.
    Tcp(TcpListener),
    /// A unix domain listening socket.
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Bind a TCP listening socket.
    ///
    /// # Errors
    /// Whatever [`TcpListener::bind`] reports.
    pub async fn bind_tcp(addr: impl ToSocketAddrs) -> io::Result<Self> {
        Ok(Self::Tcp(TcpListener::bind(addr).await?))
    }

    /// Bind a unix domain socket at `path`.
    ///
    /// # Errors
    /// Whatever [`UnixListener::bind`] reports; a stale socket file counts.
    #[cfg(unix)]
    pub fn bind_unix(path: impl AsRef<std::path::Path>) -> io::Result<Self> {
        Ok(Self::Unix(UnixListener::bind(path)?))
    }

    /// The bound local address, for TCP listeners.
    ///
    /// # Errors
    /// [`io::ErrorKind::InvalidInput`] for unix sockets.
    pub fn local_addr(&self) -> io::Result<std::net::SocketAddr> {
        match self {
            Self::Tcp(listener) => listener.local_addr(),
            #[cfg(unix)]
            Self::Unix(_) => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "unix socket listeners have no TCP address",
            )),
        }
    }

    async fn accept(&self) -> io::Result<Accepted> {
        match self {
            Self::Tcp(listener) => {
                let (stream, peer) = listener.accept().await?;
                Ok(Accepted::Tcp(stream, peer.to_string()))
            }
            #[cfg(unix)]
            Self::Unix(listener) => {
                let (stream, _addr) = listener.accept().await?;
                Ok(Accepted::Unix(stream))
            }
        }
    }
}

enum Accepted {
    Tcp(TcpStream, String),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Accepted {
    fn peer(&self) -> String {
        match self {
            Self::Tcp(_, peer) => peer.clone(),
            #[cfg(unix)]
            Self::Unix(_) => "unix".to_string(),
        }
    }
}

/// Hosts many simultaneous MTA conversations, one task per connection.
///
/// The factory is called once per accepted connection to produce a fresh
/// [`Milter`] value; its [`options`](Milter::options) drive the handshake.
/// Connections are independent — a failing one is logged and dropped
/// without affecting the rest.
pub struct MilterServer<F> {
    factory: F,
    read_timeout: Duration,
    write_timeout: Duration,
    max_frame: usize,
}

impl<F, M> MilterServer<F>
where
    F: FnMut() -> M,
    M: Milter + Send + Sync + 'static,
    M::Error: Debug + Send + 'static,
{
    /// A server producing per-connection milters from `factory`.
    pub fn new(factory: F) -> Self {
        Self {
            factory,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    /// Close connections whose MTA stays silent this long.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Close connections whose writes stall this long.
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

    /// Accept and serve until the listener itself fails.
    ///
    /// # Errors
    /// Only unrecoverable listener failures (fd exhaustion and friends);
    /// per-connection failures are logged and swallowed.
    pub async fn serve(&mut self, listener: Listener) -> io::Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Like [`serve`](Self::serve), stopping cleanly when `shutdown`
    /// resolves: the listener closes and in-flight connection tasks are
    /// dropped.
    ///
    /// # Errors
    /// Same as [`serve`](Self::serve).
    pub async fn serve_with_shutdown(
        &mut self,
        listener: Listener,
        shutdown: impl Future<Output = ()>,
    ) -> io::Result<()> {
        if let Ok(addr) = listener.local_addr() {
            info!(%addr, "listening");
        }

        tokio::pin!(shutdown);
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("shutdown requested, dropping in-flight connections");
                    workers.abort_all();
                    return Ok(());
                }
                accepted = listener.accept() => {
                    let accepted = match accepted {
                        Ok(accepted) => accepted,
                        Err(err) => {
                            warn!(error = %err, "listener failed");
                            workers.abort_all();
                            return Err(err);
                        }
                    };

                    // Reap whatever already finished.
                    while workers.try_join_next().is_some() {}

                    let peer = accepted.peer();
                    debug!(%peer, "accepted connection");

                    let mut session = Session::new((self.factory)())
                        .read_timeout(self.read_timeout)
                        .write_timeout(self.write_timeout)
                        .max_frame_size(self.max_frame);
                    let span = tracing::info_span!("milter_connection", %peer);

                    workers.spawn(
                        async move {
                            let result = match accepted {
                                Accepted::Tcp(stream, _) => session.run(stream.compat()).await,
                                #[cfg(unix)]
                                Accepted::Unix(stream) => session.run(stream.compat()).await,
                            };
                            match result {
                                Ok(()) => debug!("connection finished"),
                                Err(err) => warn!(error = ?err, "connection failed"),
                            }
                        }
                        .instrument(span),
                    );
                }
            }
        }
    }
}
