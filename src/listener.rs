use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::{
    net::TcpListener,
    sync::broadcast::{self, error::RecvError},
};

use crate::{
    config::{SmtpConfig, Timeouts},
    controller::Signal,
    error::ListenerError,
    internal,
    notify::Notifier,
    smtp::session::{Session, SessionConfig, Termination},
    storage::Storage,
};

const ACCEPT_BACKOFF_BASE: Duration = Duration::from_millis(10);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// Pause before accepting again after `failures` consecutive accept errors
fn accept_backoff(failures: u32) -> Duration {
    ACCEPT_BACKOFF_BASE
        .saturating_mul(2_u32.saturating_pow(failures.saturating_sub(1)))
        .min(ACCEPT_BACKOFF_MAX)
}

#[derive(Debug, Clone)]
pub struct Listener {
    socket: SocketAddr,
    hostname: String,
    timeouts: Timeouts,
}

impl Listener {
    pub fn new(socket: SocketAddr, hostname: impl Into<String>, timeouts: Timeouts) -> Self {
        Self {
            socket,
            hostname: hostname.into(),
            timeouts,
        }
    }

    /// Bind the configured socket and serve it until shutdown
    ///
    /// # Errors
    /// If the socket cannot be bound
    pub async fn serve(
        &self,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
        shutdown: &broadcast::Sender<Signal>,
    ) -> Result<(), ListenerError> {
        let listener =
            TcpListener::bind(self.socket)
                .await
                .map_err(|source| ListenerError::BindFailed {
                    address: self.socket.to_string(),
                    source,
                })?;

        self.serve_on(listener, storage, notifier, shutdown).await
    }

    /// Accept connections from an already bound listener, one task per
    /// connection, until [`Signal::Shutdown`] is broadcast.
    ///
    /// Each session is subscribed to the same broadcast. On shutdown no new
    /// connections are accepted, outstanding sessions are awaited, and
    /// [`Signal::Finalised`] is broadcast.
    ///
    /// # Errors
    /// Currently infallible once bound; accept failures are logged and skipped
    pub async fn serve_on(
        &self,
        listener: TcpListener,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
        shutdown: &broadcast::Sender<Signal>,
    ) -> Result<(), ListenerError> {
        let address = listener
            .local_addr()
            .map_or_else(|_| self.socket.to_string(), |address| address.to_string());
        internal!(level = INFO, "SMTP Listener serving on {address}");

        let mut receiver = shutdown.subscribe();
        let mut sessions = Vec::default();
        let mut failures = 0_u32;

        loop {
            tokio::select! {
                sig = receiver.recv() => {
                    match sig {
                        Ok(Signal::Shutdown) | Err(RecvError::Closed) => {
                            internal!(level = INFO, "SMTP Listener {address} received shutdown signal, finishing {} sessions ...", sessions.len());

                            for result in join_all(sessions).await {
                                match result {
                                    Ok(Termination::Failed(err)) => tracing::debug!("Session failed during shutdown: {err}"),
                                    Ok(_) => {}
                                    Err(err) => internal!(level = ERROR, "Session task failed: {err}"),
                                }
                            }

                            let _ = shutdown.send(Signal::Finalised);
                            break;
                        }
                        Ok(Signal::Finalised) | Err(RecvError::Lagged(_)) => {}
                    }
                }

                connection = listener.accept() => {
                    match connection {
                        Ok((stream, peer)) => {
                            failures = 0;
                            tracing::debug!("Connection received from {peer}");
                            sessions.retain(|session: &tokio::task::JoinHandle<Termination>| !session.is_finished());

                            let config = SessionConfig::builder()
                                .with_hostname(self.hostname.clone())
                                .with_deadlines(self.timeouts.deadlines())
                                .with_shutdown(shutdown.subscribe())
                                .build();
                            let session = Session::create(
                                peer.to_string(),
                                stream,
                                Arc::clone(&storage),
                                notifier.clone(),
                                config,
                            );

                            sessions.push(tokio::spawn(session.run()));
                        }
                        Err(err) => {
                            failures = failures.saturating_add(1);
                            let backoff = accept_backoff(failures);
                            internal!(
                                level = WARN,
                                "{}, retrying in {backoff:?}",
                                ListenerError::AcceptFailed(err)
                            );
                            tokio::time::sleep(backoff).await;
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl From<&SmtpConfig> for Listener {
    fn from(config: &SmtpConfig) -> Self {
        Self::new(config.bind_addr, config.hostname.clone(), config.timeouts)
    }
}
