//! Client configuration.
//!
//! | Variable                 | Default           |
//! |--------------------------|-------------------|
//! | `TUFF_ADDR`              | `127.0.0.1:25565` |
//! | `TUFF_USERNAME`          | `tuff`            |
//! | `TUFF_PROTOCOL`          | from status probe |
//! | `TUFF_READ_TIMEOUT_SECS` | `30`              |
//! | `TUFF_STATUS_ONLY`       | `false`           |

use std::time::Duration;

use tuff_mc::ProtocolVersion;
use tuff_mc::packets::login::MAX_USERNAME_LENGTH;

use crate::error::{ClientError, Result};
use crate::utils::{EnvError, env_bool, env_parse, env_string, env_u32};

const DEFAULT_ADDR: &str = "127.0.0.1:25565";
const DEFAULT_USERNAME: &str = "tuff";
const DEFAULT_READ_TIMEOUT_SECS: u32 = 30;

/// Everything needed to reach and log in to one server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Server address as `host:port`.
    pub addr: String,
    /// Offline-mode username.
    pub username: String,
    /// Forced protocol version; `None` uses the status probe.
    pub protocol: Option<ProtocolVersion>,
    /// An inbound read that stalls this long disconnects.
    pub read_timeout: Duration,
    /// Only probe the server status, never log in.
    pub status_only: bool,
}

impl ClientConfig {
    #[must_use]
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            username: DEFAULT_USERNAME.to_string(),
            protocol: None,
            read_timeout: Duration::from_secs(u64::from(DEFAULT_READ_TIMEOUT_SECS)),
            status_only: false,
        }
    }

    /// Build the configuration from `TUFF_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any variable is set to an invalid value.
    pub fn from_env() -> std::result::Result<Self, EnvError> {
        let config = Self::new(env_string("TUFF_ADDR", DEFAULT_ADDR)?)
            .with_username(env_string("TUFF_USERNAME", DEFAULT_USERNAME)?)
            .with_read_timeout(Duration::from_secs(u64::from(env_u32(
                "TUFF_READ_TIMEOUT_SECS",
                DEFAULT_READ_TIMEOUT_SECS,
            )?)))
            .with_status_only(env_bool("TUFF_STATUS_ONLY", false)?);

        let config = match env_parse::<i32>("TUFF_PROTOCOL")? {
            Some(raw) => config.with_protocol(ProtocolVersion::from_raw_lenient(raw)),
            None => config,
        };

        config.validate()?;
        Ok(config)
    }

    /// Set the username.
    #[must_use]
    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    /// Force a protocol version instead of probing.
    #[must_use]
    pub const fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = Some(protocol);
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub const fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Only probe the server status.
    #[must_use]
    pub const fn with_status_only(mut self, status_only: bool) -> Self {
        self.status_only = status_only;
        self
    }

    /// Check the values a server would otherwise reject late.
    ///
    /// # Errors
    ///
    /// Returns an error for a bad address, username or zero timeout.
    pub fn validate(&self) -> Result<()> {
        self.host_port()?;
        if self.username.is_empty() || self.username.chars().count() > MAX_USERNAME_LENGTH {
            return Err(ClientError::InvalidConfig(format!(
                "username must be 1 to {MAX_USERNAME_LENGTH} characters"
            )));
        }
        if self.read_timeout.is_zero() {
            return Err(ClientError::InvalidConfig("read timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Split [`ClientConfig::addr`] into host and port.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::InvalidAddress`] unless the address is
    /// `host:port` with a non-empty host and a valid port.
    pub fn host_port(&self) -> Result<(&str, u16)> {
        let invalid = || ClientError::InvalidAddress(self.addr.clone());
        let (host, port) = self.addr.rsplit_once(':').ok_or_else(invalid)?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse().map_err(|_| invalid())?;
        Ok((host, port))
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADDR)
    }
}
