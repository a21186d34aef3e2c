//! Fan-out of finalized messages to consumers outside the session.
//!
//! The conduit is a bounded channel. What a session does when it is full is
//! decided by [`Backpressure`]: wait for the consumer, or drop the message and
//! count it. Either way memory use stays bounded.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::{internal, message::Message};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Backpressure {
    /// Wait for the consumer to make room, stalling the sending session.
    #[default]
    Block,
    /// Discard the message when the channel is full.
    DropNewest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyOutcome {
    Delivered,
    Dropped,
    Closed,
}

/// The sending half, cloned into every session.
#[derive(Debug, Clone)]
pub struct Notifier {
    sender: mpsc::Sender<Message>,
    policy: Backpressure,
    dropped: Arc<AtomicU64>,
}

/// Create a conduit holding at most `capacity` undelivered messages.
#[must_use]
pub fn channel(capacity: usize, policy: Backpressure) -> (Notifier, mpsc::Receiver<Message>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));

    (
        Notifier {
            sender,
            policy,
            dropped: Arc::default(),
        },
        receiver,
    )
}

impl Notifier {
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> Backpressure {
        self.policy
    }

    /// Messages discarded so far because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Hand `message` to the consumer.
    ///
    /// Never fails: a full or closed channel is reported, logged and
    /// otherwise ignored.
    pub async fn send(&self, message: Message) -> NotifyOutcome {
        let id = message.id.clone();

        match self.policy {
            Backpressure::Block => match self.sender.send(message).await {
                Ok(()) => NotifyOutcome::Delivered,
                Err(_) => {
                    internal!(level = WARN, "Notification channel closed, {id} not delivered");
                    NotifyOutcome::Closed
                }
            },
            Backpressure::DropNewest => match self.sender.try_send(message) {
                Ok(()) => NotifyOutcome::Delivered,
                Err(TrySendError::Full(_)) => {
                    let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    internal!(
                        level = WARN,
                        "Notification channel full, dropped {id} ({dropped} dropped so far)"
                    );
                    NotifyOutcome::Dropped
                }
                Err(TrySendError::Closed(_)) => {
                    internal!(level = WARN, "Notification channel closed, {id} not delivered");
                    NotifyOutcome::Closed
                }
            },
        }
    }
}
