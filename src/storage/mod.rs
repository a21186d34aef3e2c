//! Persistence for finalized messages.

mod memory;

use std::fmt::Debug;

use async_trait::async_trait;

pub use memory::MemoryStorage;

use crate::{error::StorageError, message::Message};

pub type Result<T> = std::result::Result<T, StorageError>;

/// A store shared by every session.
///
/// Implementations must tolerate concurrent calls from many sessions.
#[async_trait]
pub trait Storage: Send + Sync + Debug {
    /// Persist a message, returning the identifier it is stored under
    ///
    /// # Errors
    /// If the backend refuses or fails to record the message
    async fn store(&self, message: &Message) -> Result<String>;

    /// Number of stored messages
    ///
    /// # Errors
    /// If the backend cannot be read
    async fn count(&self) -> Result<usize>;

    /// Up to `limit` messages in storage order, skipping the first `start`
    ///
    /// # Errors
    /// If the backend cannot be read
    async fn list(&self, start: usize, limit: usize) -> Result<Vec<Message>>;

    /// # Errors
    /// [`StorageError::NotFound`] if no message has this id
    async fn load(&self, id: &str) -> Result<Message>;

    /// # Errors
    /// [`StorageError::NotFound`] if no message has this id
    async fn delete_one(&self, id: &str) -> Result<()>;

    /// # Errors
    /// If the backend cannot be written
    async fn delete_all(&self) -> Result<()>;
}
