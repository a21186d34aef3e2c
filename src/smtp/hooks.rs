use core::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    error::StorageError,
    internal,
    message::SmtpMessage,
    notify::Notifier,
    storage::Storage,
    traits::Hooks,
};

use super::reply::Reply;

/// Hooks a session hands to its interpreter.
///
/// Every sender, recipient and credential is accepted. Completed messages are
/// parsed, stored, then published on the notification channel.
pub struct SessionHooks {
    peer: String,
    hostname: String,
    storage: Arc<dyn Storage>,
    notifier: Notifier,
}

impl SessionHooks {
    pub fn new(
        peer: impl Into<String>,
        hostname: impl Into<String>,
        storage: Arc<dyn Storage>,
        notifier: Notifier,
    ) -> Self {
        Self {
            peer: peer.into(),
            hostname: hostname.into(),
            storage,
            notifier,
        }
    }
}

#[async_trait]
impl Hooks for SessionHooks {
    fn validate_sender(&self, from: &str) -> bool {
        self.log(format_args!("Sender: {from}"));
        true
    }

    fn validate_recipient(&self, to: &str) -> bool {
        self.log(format_args!("Recipient: {to}"));
        true
    }

    fn validate_authentication(&self, mechanism: &str, _credentials: &[String]) -> Result<(), Reply> {
        self.log(format_args!("Authentication: {mechanism}"));
        Ok(())
    }

    async fn on_message_accepted(&self, message: SmtpMessage) -> Result<String, StorageError> {
        let message = message.parse(&self.hostname);

        self.log(format_args!("Storing message {}", message.id));
        let stored = self.storage.store(&message).await;
        if let Err(err) = &stored {
            self.log(format_args!("Error storing message {}: {err}", message.id));
        }

        // Published even when storing failed.
        self.notifier.send(message).await;

        stored
    }

    fn supported_mechanisms(&self) -> Vec<String> {
        vec!["PLAIN".to_string()]
    }

    fn log(&self, message: fmt::Arguments<'_>) {
        internal!(level = DEBUG, "[SMTP {}] {message}", self.peer);
    }
}
