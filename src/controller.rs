use std::{sync::Arc, time::Duration};

use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

use crate::{
    config::Config,
    internal,
    listener::Listener,
    logging,
    message::Message,
    notify,
    storage::{MemoryStorage, Storage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Shutdown,
    Finalised,
}

pub struct Controller {
    config: Config,
    shutdown: broadcast::Sender<Signal>,
}

/// Log every finalized message until all senders are gone
async fn consume(mut receiver: mpsc::Receiver<Message>) {
    while let Some(message) = receiver.recv().await {
        internal!(
            level = INFO,
            "Received message {} from <{}> to [{}] ({} bytes)",
            message.id,
            message.from,
            message
                .to
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", "),
            message.content.size
        );
    }
}

async fn shutdown(sender: &broadcast::Sender<Signal>) -> anyhow::Result<()> {
    tokio::signal::ctrl_c().await?;
    internal!(level = INFO, "CTRL+C entered -- Enter it again to force shutdown");

    let mut receiver = sender.subscribe();
    sender.send(Signal::Shutdown)?;

    loop {
        tokio::select! {
            sig = receiver.recv() => {
                match sig {
                    Ok(Signal::Finalised) | Err(RecvError::Closed) => break,
                    Ok(s) => tracing::debug!("Received {s:?}"),
                    Err(e) => tracing::debug!("Received: {e:?}"),
                }
            }

            _ = tokio::signal::ctrl_c() => {
                internal!(level = WARN, "Forcing shutdown");
                break;
            }
        }
    }

    Ok(())
}

impl Controller {
    pub fn new(config: Config) -> Self {
        let (shutdown, _) = broadcast::channel(64);
        Self { config, shutdown }
    }

    /// The broadcast this controller shuts down with. Sending
    /// [`Signal::Shutdown`] on it has the same effect as Ctrl-C.
    pub fn shutdown_handle(&self) -> broadcast::Sender<Signal> {
        self.shutdown.clone()
    }

    /// Run this controller, and everything it controls
    ///
    /// # Errors
    ///
    /// This function will return an error if the listener cannot bind its
    /// socket or the Ctrl-C handler cannot be installed.
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();

        internal!("Controller running");

        let storage: Arc<dyn Storage> = match self.config.storage.capacity {
            Some(capacity) => Arc::new(MemoryStorage::with_capacity(capacity)),
            None => Arc::new(MemoryStorage::new()),
        };

        let (notifier, receiver) =
            notify::channel(self.config.notify.capacity, self.config.notify.backpressure);
        let consumer = tokio::spawn(consume(receiver));

        let listener = Listener::from(&self.config.smtp);

        tokio::select! {
            result = listener.serve(storage, notifier, &self.shutdown) => result?,
            result = shutdown(&self.shutdown) => result?,
        };

        internal!("Shutting down...");

        if tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .is_err()
        {
            tracing::debug!("Notification consumer still running, abandoning it");
        }

        Ok(())
    }
}
