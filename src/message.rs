//! Captured SMTP transactions and the finalized messages built from them.

use std::{
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use ulid::Ulid;

use crate::internal;

/// The raw capture of one transaction, as assembled by the interpreter.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SmtpMessage {
    pub helo: String,
    pub from: String,
    pub to: Vec<String>,
    /// Message data exactly as received, dot-unstuffed, CRLF line endings.
    pub data: Vec<u8>,
}

/// Globally unique message identifier, `<ulid>@<hostname>`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn generate(hostname: &str) -> Self {
        Self(format!("{}@{hostname}", Ulid::new()))
    }

    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A reverse- or forward-path split into its parts.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Path {
    pub relays: Vec<String>,
    pub mailbox: String,
    pub domain: String,
    pub params: String,
}

impl From<&str> for Path {
    /// Parses `[@relay,@relay:]mailbox[@domain]`.
    fn from(path: &str) -> Self {
        let (relays, address) = match path.split_once(':') {
            Some((relays, address)) => (
                relays.split(',').map(str::to_string).collect(),
                address,
            ),
            None => (Vec::default(), path),
        };

        let (mailbox, domain) = address
            .split_once('@')
            .map_or((address, ""), |(mailbox, domain)| (mailbox, domain));

        Self {
            relays,
            mailbox: mailbox.to_string(),
            domain: domain.to_string(),
            params: String::default(),
        }
    }
}

impl Display for Path {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.domain.is_empty() {
            f.write_str(&self.mailbox)
        } else {
            write!(f, "{}@{}", self.mailbox, self.domain)
        }
    }
}

/// Printable ASCII without a colon, as RFC 5322 allows for field names.
fn is_header_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .bytes()
            .all(|byte| byte.is_ascii_graphic() && byte != b':')
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Content {
    pub headers: BTreeMap<String, Vec<String>>,
    pub body: String,
    pub size: usize,
}

impl Content {
    /// Split raw transaction data into headers and body.
    ///
    /// Data without a blank line separating a well-formed header block is
    /// treated as a bare body. Bytes that are not UTF-8 are replaced in this
    /// view only; the raw capture keeps them.
    #[must_use]
    pub fn parse(data: &[u8]) -> Self {
        let size = data.len();
        let bare = || Self {
            headers: BTreeMap::default(),
            body: String::from_utf8_lossy(data).into_owned(),
            size,
        };

        if !data.windows(4).any(|window| window == b"\r\n\r\n") {
            return bare();
        }

        let (parsed, offset) = match mailparse::parse_headers(data) {
            Ok(parsed) => parsed,
            Err(err) => {
                internal!(level = DEBUG, "Unable to parse headers: {err}");
                return bare();
            }
        };

        let mut headers = BTreeMap::<String, Vec<String>>::default();
        for header in parsed {
            let key = header.get_key();
            if !is_header_name(&key) {
                internal!(level = DEBUG, "Treating data as body, found header name {key:?}");
                return bare();
            }

            headers.entry(key).or_default().push(header.get_value());
        }

        Self {
            headers,
            body: String::from_utf8_lossy(data.get(offset..).unwrap_or_default()).into_owned(),
            size,
        }
    }

    /// First value of a header, matched case-insensitively.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }

    fn set(&mut self, name: &str, value: String) {
        self.headers.retain(|key, _| !key.eq_ignore_ascii_case(name));
        self.headers.insert(name.to_string(), vec![value]);
    }
}

/// A finalized message, ready for storage and notification.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: MessageId,
    pub from: Path,
    pub to: Vec<Path>,
    pub content: Content,
    pub created: DateTime<Utc>,
    pub raw: SmtpMessage,
}

impl SmtpMessage {
    /// Build the finalized message, assigning its id and stamping the trace
    /// headers for `hostname`.
    #[must_use]
    pub fn parse(&self, hostname: &str) -> Message {
        let id = MessageId::generate(hostname);
        let created = Utc::now();

        let mut content = Content::parse(&self.data);
        content.set("Message-ID", id.to_string());
        content.set(
            "Received",
            format!(
                "from {} by {hostname} (mailsink)\r\n          id {id}; {}",
                self.helo,
                created.to_rfc2822()
            ),
        );
        content.set("Return-Path", format!("<{}>", self.from));

        Message {
            from: Path::from(self.from.as_str()),
            to: self.to.iter().map(|to| Path::from(to.as_str())).collect(),
            id,
            content,
            created,
            raw: self.clone(),
        }
    }
}
