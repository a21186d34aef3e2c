//! Error types for mailsink.
//!
//! Session errors never escape a session; they are folded into its
//! [`Termination`](crate::smtp::session::Termination) reason.

use std::io;

use thiserror::Error;

/// Transport failures that end a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Reading from the peer failed.
    #[error("Error reading from socket: {0}")]
    Read(#[source] io::Error),

    /// Writing a reply to the peer failed.
    #[error("Error writing to socket: {0}")]
    Write(#[source] io::Error),

    /// The peer was silent, or not accepting data, for too long.
    #[error("Session timed out after {0} seconds")]
    Timeout(u64),

    /// The peer sent more than the permitted bytes without a line break.
    #[error("Line exceeds {0} bytes")]
    LineTooLong(usize),

    /// The interpreter handed back bytes that were not the tail of its input.
    #[error("Interpreter returned {remainder} bytes unconsumed from a {buffered} byte buffer")]
    InvalidRemainder { remainder: usize, buffered: usize },
}

impl SessionError {
    /// Returns `true` if the error was caused by a deadline expiring.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors raised by a [`Storage`](crate::storage::Storage) backend.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No message with the given id is stored.
    #[error("Message not found: {0}")]
    NotFound(String),

    /// The backend refuses to hold more messages.
    #[error("Storage capacity exceeded: {count}/{capacity} messages")]
    CapacityExceeded { count: usize, capacity: usize },

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl<T> From<std::sync::PoisonError<T>> for StorageError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

/// Errors raised while accepting connections.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to the socket address.
    #[error("Failed to bind to {address}: {source}")]
    BindFailed {
        address: String,
        #[source]
        source: io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("Failed to accept connection: {0}")]
    AcceptFailed(#[from] io::Error),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config from {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
