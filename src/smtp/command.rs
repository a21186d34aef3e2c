use core::fmt::{self, Display, Formatter};

#[derive(PartialEq, Eq, Debug, Clone)]
pub enum Command {
    Helo(String),
    Ehlo(String),
    Auth {
        mechanism: String,
        initial: Option<String>,
    },
    /// An empty path is the `null reverse-path` from
    /// [RFC-5321](https://www.ietf.org/rfc/rfc5321.txt).
    MailFrom(String),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Invalid(String),
}

/// Extract the address from `<path> [params]`, tolerating a missing pair of
/// angle brackets.
fn path(argument: &str) -> Option<String> {
    let argument = argument.trim();

    if let Some(rest) = argument.strip_prefix('<') {
        let (path, _params) = rest.split_once('>')?;
        return Some(path.trim().to_string());
    }

    argument
        .split_whitespace()
        .next()
        .map(str::to_string)
        .filter(|path| !path.contains(['<', '>']))
}

impl Display for Command {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo(id) => write!(fmt, "HELO {id}"),
            Self::Ehlo(id) => write!(fmt, "EHLO {id}"),
            Self::Auth { mechanism, .. } => write!(fmt, "AUTH {mechanism}"),
            Self::MailFrom(from) => write!(fmt, "MAIL FROM:<{from}>"),
            Self::RcptTo(to) => write!(fmt, "RCPT TO:<{to}>"),
            Self::Data => fmt.write_str("DATA"),
            Self::Rset => fmt.write_str("RSET"),
            Self::Noop => fmt.write_str("NOOP"),
            Self::Quit => fmt.write_str("QUIT"),
            Self::Invalid(s) => fmt.write_str(s),
        }
    }
}

impl TryFrom<&str> for Command {
    type Error = Self;

    fn try_from(command: &str) -> Result<Self, Self::Error> {
        let command = command.trim();
        let (verb, args) = command
            .split_once(' ')
            .map_or((command, ""), |(verb, args)| (verb, args.trim()));
        let upper = command.to_ascii_uppercase();

        if upper.starts_with("MAIL FROM:") {
            path(&command[10..]).map_or_else(
                || Err(Self::Invalid(command.to_owned())),
                |from| Ok(Self::MailFrom(from)),
            )
        } else if upper.starts_with("RCPT TO:") {
            path(&command[8..])
                .filter(|to| !to.is_empty())
                .map_or_else(
                    || Err(Self::Invalid(command.to_owned())),
                    |to| Ok(Self::RcptTo(to)),
                )
        } else {
            match verb.to_ascii_uppercase().as_str() {
                "HELO" if !args.is_empty() => Ok(Self::Helo(args.to_string())),
                "EHLO" if !args.is_empty() => Ok(Self::Ehlo(args.to_string())),
                "AUTH" if !args.is_empty() => {
                    let mut parts = args.split_whitespace();
                    let mechanism = parts.next().unwrap_or_default().to_ascii_uppercase();
                    Ok(Self::Auth {
                        mechanism,
                        initial: parts.next().map(str::to_string),
                    })
                }
                "DATA" if args.is_empty() => Ok(Self::Data),
                "RSET" if args.is_empty() => Ok(Self::Rset),
                "NOOP" => Ok(Self::Noop),
                "QUIT" if args.is_empty() => Ok(Self::Quit),
                _ => Err(Self::Invalid(command.to_owned())),
            }
        }
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = Self;

    fn try_from(command: &[u8]) -> Result<Self, Self::Error> {
        std::str::from_utf8(command).map_or(
            Err(Self::Invalid("Unable to interpret command".to_string())),
            Self::try_from,
        )
    }
}

impl TryFrom<String> for Command {
    type Error = Self;

    fn try_from(command: String) -> Result<Self, Self::Error> {
        Self::try_from(command.as_str())
    }
}
