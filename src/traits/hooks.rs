use core::fmt;

use async_trait::async_trait;

use crate::{error::StorageError, message::SmtpMessage, smtp::reply::Reply};

/// The capabilities an interpreter calls back into while processing commands.
///
/// Validation hooks gate protocol replies, so implementations must answer
/// promptly and must not block on I/O. Only [`Hooks::on_message_accepted`]
/// may suspend.
#[async_trait]
pub trait Hooks: Send + Sync {
    /// Decide whether `from` may open a transaction.
    fn validate_sender(&self, from: &str) -> bool;

    /// Decide whether `to` may be added to the current transaction.
    fn validate_recipient(&self, to: &str) -> bool;

    ///
    /// Check the decoded credentials for `mechanism`
    ///
    /// # Errors
    /// A rejection is returned as the exact reply the peer should see.
    ///
    fn validate_authentication(&self, mechanism: &str, credentials: &[String]) -> Result<(), Reply>;

    ///
    /// Take ownership of a completed transaction
    ///
    /// Called exactly once per transaction, after the terminating `.` line.
    ///
    /// # Errors
    /// If the message could not be stored, which the interpreter reports to the peer
    ///
    async fn on_message_accepted(&self, message: SmtpMessage) -> Result<String, StorageError>;

    /// Mechanisms advertised in the `EHLO` reply and accepted by `AUTH`.
    fn supported_mechanisms(&self) -> Vec<String>;

    /// Log sink attributing interpreter events to this connection.
    fn log(&self, message: fmt::Arguments<'_>);
}
