//! TOML configuration.
//!
//! Every key is optional; a missing file section falls back to its default.
//!
//! ```toml
//! [smtp]
//! bind_addr = "0.0.0.0:1025"
//! hostname = "mailsink.example"
//!
//! [smtp.timeouts]
//! read_secs = 300
//! write_secs = 60
//!
//! [notify]
//! capacity = 64
//! backpressure = "block"  # or "drop_newest"
//!
//! [storage]
//! capacity = 10000
//! ```

use std::{
    net::{Ipv4Addr, SocketAddr},
    path::Path,
};

use serde::{Deserialize, Serialize};

use crate::{error::ConfigError, notify::Backpressure, smtp::connection::Deadlines};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub smtp: SmtpConfig,
    pub notify: NotifyConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub bind_addr: SocketAddr,
    pub hostname: String,
    pub timeouts: Timeouts,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 1025)),
            hostname: "mailsink.example".to_string(),
            timeouts: Timeouts::default(),
        }
    }
}

/// Per-operation deadlines, in seconds. `0` disables a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Timeouts {
    pub read_secs: u64,
    pub write_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            read_secs: 300,
            write_secs: 60,
        }
    }
}

impl Timeouts {
    #[must_use]
    pub fn deadlines(&self) -> Deadlines {
        Deadlines::from_secs(self.read_secs, self.write_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub capacity: usize,
    pub backpressure: Backpressure,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            backpressure: Backpressure::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Maximum number of messages held, unlimited if absent
    pub capacity: Option<usize>,
}

impl Config {
    /// Read and validate the configuration at `path`
    ///
    /// # Errors
    /// If the file cannot be read, is not valid TOML, or holds invalid values
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&content)
    }

    /// Parse and validate a configuration document
    ///
    /// # Errors
    /// If `content` is not valid TOML or holds invalid values
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.smtp.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "smtp.hostname",
                reason: "must not be empty".to_string(),
            });
        }

        if self.notify.capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "notify.capacity",
                reason: "must be at least 1".to_string(),
            });
        }

        if self.storage.capacity == Some(0) {
            return Err(ConfigError::Invalid {
                field: "storage.capacity",
                reason: "must be at least 1 when set".to_string(),
            });
        }

        Ok(())
    }
}
