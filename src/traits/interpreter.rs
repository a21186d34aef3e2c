use async_trait::async_trait;

use crate::smtp::reply::Reply;

/// A stateful command interpreter driven by a session.
#[async_trait]
pub trait Interpreter: Send {
    /// The greeting written as soon as the connection is accepted.
    fn start(&mut self) -> Reply;

    /// Consume zero or more complete lines from the front of `buffer`.
    ///
    /// Returns the unconsumed suffix of `buffer` and, if a command completed,
    /// the reply to send.
    async fn parse<'a>(&mut self, buffer: &'a [u8]) -> (&'a [u8], Option<Reply>);
}
