use core::fmt;
use std::sync::Arc;

use tokio::{
    io::{AsyncRead, AsyncWrite},
    sync::broadcast::{self, error::RecvError},
};

use crate::{
    controller::Signal,
    error::SessionError,
    incoming, internal,
    logging::escape,
    notify::Notifier,
    outgoing,
    storage::Storage,
    traits::Interpreter,
};

use super::{
    connection::{Connection, Deadlines},
    hooks::SessionHooks,
    protocol::Protocol,
    reply::Reply,
};

/// Why a session ended.
#[derive(Debug)]
pub enum Termination {
    /// The peer closed its side of the connection.
    PeerClosed,
    /// A terminal reply was sent.
    Quit,
    /// The listener asked every session to finish.
    Shutdown,
    /// The transport failed or timed out.
    Failed(SessionError),
}

#[derive(Debug)]
pub struct SessionConfig {
    pub hostname: String,
    pub deadlines: Deadlines,
    pub shutdown: Option<broadcast::Receiver<Signal>>,
}

impl SessionConfig {
    /// Create a new `SessionConfig` builder
    #[must_use]
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::default()
    }
}

/// Builder for `SessionConfig`
#[derive(Debug, Default)]
pub struct SessionConfigBuilder {
    hostname: String,
    deadlines: Deadlines,
    shutdown: Option<broadcast::Receiver<Signal>>,
}

impl SessionConfigBuilder {
    /// Set the hostname used in the greeting and when stamping messages
    #[must_use]
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the read and write deadlines
    #[must_use]
    pub const fn with_deadlines(mut self, deadlines: Deadlines) -> Self {
        self.deadlines = deadlines;
        self
    }

    /// Subscribe the session to a shutdown broadcast
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: broadcast::Receiver<Signal>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Build the final `SessionConfig`
    #[must_use]
    pub fn build(self) -> SessionConfig {
        SessionConfig {
            hostname: if self.hostname.is_empty() {
                std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".to_string())
            } else {
                self.hostname
            },
            deadlines: self.deadlines,
            shutdown: self.shutdown,
        }
    }
}

/// Serve one accepted connection until it ends.
///
/// Builds the reference interpreter with this session's hooks, writes the
/// greeting and runs the read loop. The connection is closed exactly once
/// before this returns, whichever way the session ended.
pub async fn accept<Stream>(
    remote_address: impl Into<String>,
    stream: Stream,
    storage: Arc<dyn Storage>,
    notifier: Notifier,
    hostname: &str,
) -> Termination
where
    Stream: AsyncRead + AsyncWrite + Unpin + Send,
{
    let config = SessionConfig::builder().with_hostname(hostname).build();

    Session::create(remote_address, stream, storage, notifier, config)
        .run()
        .await
}

pub struct Session<Stream: AsyncRead + AsyncWrite + Unpin + Send, Interp: Interpreter> {
    peer: String,
    hostname: String,
    is_tls: bool,
    connection: Connection<Stream>,
    interpreter: Interp,
    /// Bytes read but not yet consumed by the interpreter
    pending: Vec<u8>,
    /// Length of the prefix of `pending` already known to hold no line
    scanned: usize,
    shutdown: Option<broadcast::Receiver<Signal>>,
}

/// RFC 5321 limit on a command or text line, CRLF included.
pub const MAX_LINE_LENGTH: usize = 1000;

fn contains_line(buffer: &[u8]) -> bool {
    buffer.windows(2).any(|window| window == b"\r\n")
}

/// Resolves when a shutdown is broadcast. Never resolves without a receiver,
/// or once every sender is gone.
async fn shutdown_requested(shutdown: &mut Option<broadcast::Receiver<Signal>>) {
    if let Some(receiver) = shutdown {
        loop {
            match receiver.recv().await {
                Ok(Signal::Shutdown) => return,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            }
        }
    }

    std::future::pending::<()>().await;
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send> Session<Stream, Protocol> {
    pub fn create(
        peer: impl Into<String>,
        stream: Stream,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
        config: SessionConfig,
    ) -> Self {
        let peer = peer.into();
        let hooks = SessionHooks::new(peer.clone(), config.hostname.clone(), storage, notifier);
        let interpreter = Protocol::new(config.hostname.clone(), Box::new(hooks));

        Self::with_interpreter(peer, stream, interpreter, config)
    }
}

impl<Stream: AsyncRead + AsyncWrite + Unpin + Send, Interp: Interpreter> Session<Stream, Interp> {
    pub fn with_interpreter(
        peer: impl Into<String>,
        stream: Stream,
        interpreter: Interp,
        config: SessionConfig,
    ) -> Self {
        Self {
            peer: peer.into(),
            hostname: config.hostname,
            is_tls: false,
            connection: Connection::new(stream, config.deadlines),
            interpreter,
            pending: Vec::default(),
            scanned: 0,
            shutdown: config.shutdown,
        }
    }

    #[inline]
    pub const fn is_tls(&self) -> bool {
        self.is_tls
    }

    pub async fn run(mut self) -> Termination {
        self.log(format_args!("Session started"));

        let termination = self.serve().await;
        self.connection.close().await;

        match &termination {
            Termination::Failed(err) => {
                internal!(level = WARN, "[SMTP {}] Session failed: {err}", self.peer);
            }
            termination => self.log(format_args!("Session ended: {termination:?}")),
        }

        termination
    }

    async fn serve(&mut self) -> Termination {
        let greeting = self.interpreter.start();
        if let Err(err) = self.write(&greeting).await {
            return Termination::Failed(err);
        }

        loop {
            let received = tokio::select! {
                biased;

                () = shutdown_requested(&mut self.shutdown) => {
                    self.log(format_args!("Shutdown requested"));
                    let reply = Reply::shutting_down(&self.hostname);
                    return match self.write(&reply).await {
                        Ok(()) => Termination::Shutdown,
                        Err(err) => Termination::Failed(err),
                    };
                }

                received = self.connection.receive() => received,
            };

            let chunk = match received {
                Ok(chunk) if chunk.is_empty() => {
                    self.log(format_args!("Connection closed by peer"));
                    return Termination::PeerClosed;
                }
                Ok(chunk) => chunk,
                Err(err) => {
                    self.log(format_args!("{err}"));
                    return Termination::Failed(err);
                }
            };

            incoming!(
                "[SMTP {}] Received {} bytes: '{}'",
                self.peer,
                chunk.len(),
                escape(&String::from_utf8_lossy(&chunk))
            );
            self.pending.extend_from_slice(&chunk);

            loop {
                // A CRLF may straddle the previous read
                let from = self.scanned.saturating_sub(1);
                if !contains_line(&self.pending[from..]) {
                    self.scanned = self.pending.len();
                    break;
                }

                let (consumed, reply) = {
                    let buffered = self.pending.len();
                    let (remainder, reply) = self.interpreter.parse(&self.pending).await;
                    let consumed = buffered
                        .checked_sub(remainder.len())
                        .filter(|_| self.pending.ends_with(remainder));

                    match consumed {
                        Some(consumed) => (consumed, reply),
                        None => {
                            return Termination::Failed(SessionError::InvalidRemainder {
                                remainder: remainder.len(),
                                buffered,
                            });
                        }
                    }
                };
                self.pending.drain(..consumed);
                self.scanned = 0;

                match reply {
                    Some(reply) => {
                        if let Err(err) = self.write(&reply).await {
                            return Termination::Failed(err);
                        }

                        if reply.is_terminal() {
                            if !self.pending.is_empty() {
                                self.log(format_args!(
                                    "Discarding {} unprocessed bytes",
                                    self.pending.len()
                                ));
                            }
                            self.pending.clear();
                            return Termination::Quit;
                        }
                    }
                    None if consumed == 0 => break,
                    None => {}
                }
            }

            if self.scanned > MAX_LINE_LENGTH {
                self.log(format_args!(
                    "Closing after {} bytes without a line break",
                    self.scanned
                ));
                self.pending.clear();
                return match self.write(&Reply::line_too_long()).await {
                    Ok(()) => Termination::Failed(SessionError::LineTooLong(MAX_LINE_LENGTH)),
                    Err(err) => Termination::Failed(err),
                };
            }
        }
    }

    /// Send each line of `reply`, in order, as soon as it is produced
    async fn write(&mut self, reply: &Reply) -> Result<(), SessionError> {
        for line in reply.lines() {
            let sent = self.connection.send(&line).await?;
            outgoing!("[SMTP {}] Sent {sent} bytes: '{}'", self.peer, escape(&line));
        }

        Ok(())
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        internal!(level = DEBUG, "[SMTP {}] {message}", self.peer);
    }
}
