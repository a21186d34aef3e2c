use core::fmt::{self, Display, Formatter};

use serde::Serialize;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Debug, Serialize)]
#[serde(into = "u32")]
pub enum Status {
    ServiceReady,
    GoodBye,
    AuthSuccessful,
    Ok,
    AuthContinue,
    StartMailInput,
    Unavailable,
    InsufficientStorage,
    Unrecognised,
    SyntaxError,
    InvalidCommandSequence,
    UnsupportedParameter,
    InvalidCredentials,
    Error,
    Unknown(u32),
}

impl Status {
    /// Checks if the status is a permanent rejection
    pub fn is_permanent(self) -> bool {
        u32::from(self) >= 500
    }

    /// Checks if the status is a temporary rejection
    pub fn is_temporary(self) -> bool {
        u32::from(self) >= 400 && u32::from(self) < 500
    }
}

impl From<u32> for Status {
    fn from(value: u32) -> Self {
        match value {
            220 => Self::ServiceReady,
            221 => Self::GoodBye,
            235 => Self::AuthSuccessful,
            250 => Self::Ok,
            334 => Self::AuthContinue,
            354 => Self::StartMailInput,
            421 => Self::Unavailable,
            452 => Self::InsufficientStorage,
            500 => Self::Unrecognised,
            501 => Self::SyntaxError,
            503 => Self::InvalidCommandSequence,
            504 => Self::UnsupportedParameter,
            535 => Self::InvalidCredentials,
            550 => Self::Error,
            _ => Self::Unknown(value),
        }
    }
}

impl From<Status> for u32 {
    fn from(value: Status) -> Self {
        match value {
            Status::ServiceReady => 220,
            Status::GoodBye => 221,
            Status::AuthSuccessful => 235,
            Status::Ok => 250,
            Status::AuthContinue => 334,
            Status::StartMailInput => 354,
            Status::Unavailable => 421,
            Status::InsufficientStorage => 452,
            Status::Unrecognised => 500,
            Status::SyntaxError => 501,
            Status::InvalidCommandSequence => 503,
            Status::UnsupportedParameter => 504,
            Status::InvalidCredentials => 535,
            Status::Error => 550,
            Status::Unknown(v) => v,
        }
    }
}

impl Display for Status {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(fmt, "{}", u32::from(*self))
    }
}
