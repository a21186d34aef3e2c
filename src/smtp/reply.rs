use core::fmt::{self, Display, Formatter};

use super::status::Status;

/// A protocol response: a status and the text of each line, in order.
///
/// [`Reply::lines`] renders the text into the exact bytes sent on the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    status: Status,
    text: Vec<String>,
}

impl Reply {
    #[must_use]
    pub fn new(status: Status, text: impl Into<String>) -> Self {
        Self {
            status,
            text: vec![text.into()],
        }
    }

    #[must_use]
    pub fn multiline<I, S>(status: Status, text: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            status,
            text: text.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    #[inline]
    #[must_use]
    pub fn text(&self) -> &[String] {
        &self.text
    }

    /// The peer asked to end the session; nothing is sent after this reply.
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status == Status::GoodBye
    }

    /// Wire lines, each terminated with CRLF. Every line but the last uses
    /// the `-` continuation separator.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        if self.text.is_empty() {
            return vec![format!("{}\r\n", self.status)];
        }

        let last = self.text.len() - 1;
        self.text
            .iter()
            .enumerate()
            .map(|(idx, line)| {
                let separator = if idx == last { ' ' } else { '-' };
                format!("{}{separator}{line}\r\n", self.status)
            })
            .collect()
    }

    pub fn greeting(hostname: &str) -> Self {
        Self::new(Status::ServiceReady, format!("{hostname} ESMTP mailsink"))
    }

    pub fn ok() -> Self {
        Self::new(Status::Ok, "Ok")
    }

    pub fn bye() -> Self {
        Self::new(Status::GoodBye, "Bye")
    }

    pub fn data() -> Self {
        Self::new(Status::StartMailInput, "End data with <CR><LF>.<CR><LF>")
    }

    pub fn unrecognised() -> Self {
        Self::new(Status::Unrecognised, "Unrecognised command")
    }

    pub fn bad_sequence() -> Self {
        Self::new(Status::InvalidCommandSequence, "Bad sequence of commands")
    }

    pub fn line_too_long() -> Self {
        Self::new(Status::Unrecognised, "Line too long")
    }

    pub fn storage_failed() -> Self {
        Self::new(Status::InsufficientStorage, "Unable to store message")
    }

    pub fn shutting_down(hostname: &str) -> Self {
        Self::new(
            Status::Unavailable,
            format!("{hostname} Service not available, closing transmission channel"),
        )
    }
}

impl Display for Reply {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        write!(fmt, "{} {}", self.status, self.text.join(" | "))
    }
}
