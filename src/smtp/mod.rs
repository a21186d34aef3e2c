//! The SMTP session engine and the pieces it drives.

pub mod command;
pub mod connection;
pub mod hooks;
pub mod protocol;
pub mod reply;
pub mod session;
pub mod status;

pub use session::{accept, Session, SessionConfig, Termination};
