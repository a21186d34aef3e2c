use core::mem;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};

use crate::{
    message::SmtpMessage,
    traits::{Hooks, Interpreter},
};

use super::{command::Command, reply::Reply, status::Status};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum State {
    #[default]
    Establish,
    Mail,
    Rcpt,
    Data,
    AuthPlain,
    Done,
}

/// Reference command interpreter.
///
/// Consumes at most one line per call to [`Interpreter::parse`], so a session
/// sees one reply per command and pipelined commands are answered in order.
pub struct Protocol {
    state: State,
    hostname: String,
    message: SmtpMessage,
    hooks: Box<dyn Hooks>,
}

fn line_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\r\n")
}

impl Protocol {
    pub fn new(hostname: impl Into<String>, hooks: Box<dyn Hooks>) -> Self {
        Self {
            state: State::default(),
            hostname: hostname.into(),
            message: SmtpMessage::default(),
            hooks,
        }
    }

    #[inline]
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Clear the current transaction, keeping the client's identity
    fn reset(&mut self) {
        self.message = SmtpMessage {
            helo: mem::take(&mut self.message.helo),
            ..SmtpMessage::default()
        };
    }

    fn transition(&mut self, state: State) {
        if self.state != state {
            self.hooks
                .log(format_args!("Moving from {:?} to {state:?}", self.state));
            self.state = state;
        }
    }

    async fn process(&mut self, line: &[u8]) -> Option<Reply> {
        match self.state {
            State::Data => self.data(line).await,
            State::AuthPlain => {
                let reply = self.authenticate(&String::from_utf8_lossy(line));
                self.transition(State::Mail);
                Some(reply)
            }
            State::Done => {
                self.hooks
                    .log(format_args!("Ignoring input after QUIT"));
                None
            }
            _ => Some(self.command(line)),
        }
    }

    fn command(&mut self, line: &[u8]) -> Reply {
        let command = Command::try_from(line);

        match command {
            Ok(Command::Helo(id)) => {
                self.reset();
                self.message.helo.clone_from(&id);
                self.transition(State::Mail);
                Reply::new(Status::Ok, format!("Hello {id}"))
            }
            Ok(Command::Ehlo(id)) => {
                self.reset();
                self.message.helo.clone_from(&id);
                self.transition(State::Mail);

                let mut text = vec![
                    format!("{} Hello {id}", self.hostname),
                    "PIPELINING".to_string(),
                ];
                let mechanisms = self.hooks.supported_mechanisms();
                if !mechanisms.is_empty() {
                    text.push(format!("AUTH {}", mechanisms.join(" ")));
                }

                Reply::multiline(Status::Ok, text)
            }
            Ok(Command::Auth { mechanism, initial })
                if matches!(self.state, State::Establish | State::Mail) =>
            {
                if !self
                    .hooks
                    .supported_mechanisms()
                    .iter()
                    .any(|supported| supported.eq_ignore_ascii_case(&mechanism))
                {
                    return Reply::new(
                        Status::UnsupportedParameter,
                        "Unsupported authentication mechanism",
                    );
                }

                match initial {
                    Some(response) => {
                        let reply = self.authenticate(&response);
                        self.transition(State::Mail);
                        reply
                    }
                    None => {
                        self.transition(State::AuthPlain);
                        Reply::new(Status::AuthContinue, "")
                    }
                }
            }
            Ok(Command::MailFrom(from)) if matches!(self.state, State::Establish | State::Mail) => {
                if self.hooks.validate_sender(&from) {
                    self.reset();
                    self.message.from.clone_from(&from);
                    self.transition(State::Rcpt);
                    Reply::new(Status::Ok, format!("Sender {from} ok"))
                } else {
                    Reply::new(Status::Error, format!("Invalid sender {from}"))
                }
            }
            Ok(Command::RcptTo(to)) if self.state == State::Rcpt => {
                if self.hooks.validate_recipient(&to) {
                    let reply = Reply::new(Status::Ok, format!("Recipient {to} ok"));
                    self.message.to.push(to);
                    reply
                } else {
                    Reply::new(Status::Error, format!("Invalid recipient {to}"))
                }
            }
            Ok(Command::Data) if self.state == State::Rcpt && !self.message.to.is_empty() => {
                self.transition(State::Data);
                Reply::data()
            }
            Ok(Command::Rset) => {
                self.reset();
                if self.state != State::Establish {
                    self.transition(State::Mail);
                }
                Reply::ok()
            }
            Ok(Command::Noop) => Reply::ok(),
            Ok(Command::Quit) => {
                self.transition(State::Done);
                Reply::bye()
            }
            Ok(command) => {
                self.hooks
                    .log(format_args!("{command} not allowed in state {:?}", self.state));
                Reply::bad_sequence()
            }
            Err(command) => {
                self.hooks.log(format_args!("Unrecognised command: {command}"));
                Reply::unrecognised()
            }
        }
    }

    async fn data(&mut self, line: &[u8]) -> Option<Reply> {
        if line == b"." {
            self.transition(State::Mail);
            return Some(self.complete().await);
        }

        let line = line.strip_prefix(b".").unwrap_or(line);
        self.message.data.extend_from_slice(line);
        self.message.data.extend_from_slice(b"\r\n");

        None
    }

    async fn complete(&mut self) -> Reply {
        let next = SmtpMessage {
            helo: self.message.helo.clone(),
            ..SmtpMessage::default()
        };
        let message = mem::replace(&mut self.message, next);

        match self.hooks.on_message_accepted(message).await {
            Ok(id) => Reply::new(Status::Ok, format!("Ok: queued as {id}")),
            Err(err) => {
                self.hooks.log(format_args!("Error storing message: {err}"));
                Reply::storage_failed()
            }
        }
    }

    fn authenticate(&self, response: &str) -> Reply {
        let response = response.trim();
        if response == "*" {
            return Reply::new(Status::SyntaxError, "Authentication cancelled");
        }

        let Ok(decoded) = STANDARD.decode(response) else {
            return Reply::new(Status::SyntaxError, "Invalid authentication response");
        };

        let credentials = decoded
            .split(|byte| *byte == 0)
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect::<Vec<_>>();

        if credentials.len() != 3 {
            return Reply::new(Status::SyntaxError, "Invalid authentication response");
        }

        match self.hooks.validate_authentication("PLAIN", &credentials) {
            Ok(()) => Reply::new(Status::AuthSuccessful, "Authentication successful"),
            Err(reply) => reply,
        }
    }
}

#[async_trait]
impl Interpreter for Protocol {
    fn start(&mut self) -> Reply {
        Reply::greeting(&self.hostname)
    }

    async fn parse<'a>(&mut self, buffer: &'a [u8]) -> (&'a [u8], Option<Reply>) {
        let Some(end) = line_end(buffer) else {
            return (buffer, None);
        };

        let (line, remainder) = (&buffer[..end], &buffer[end + 2..]);
        let reply = self.process(line).await;

        (remainder, reply)
    }
}
