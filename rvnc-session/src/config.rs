//! Session configuration.

use crate::errors::SessionError;
use rvnc_encodings as enc;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Connection parameters for one session.
///
/// The TCP port is `base_port + display`, following the VNC convention of
/// display numbers starting at port 5900.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server hostname or IP address.
    pub host: String,
    /// Display number added to `base_port`.
    #[serde(default)]
    pub display: u16,
    /// Base TCP port, 5900 unless the server is somewhere unusual.
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    /// Request a shared session so other clients stay connected.
    #[serde(default = "default_true")]
    pub shared: bool,
    /// Suppress all input messages to the server.
    #[serde(default)]
    pub view_only: bool,
    /// Encoding preference order. Raw is always kept available as the
    /// final fallback even if the list omits it.
    #[serde(default = "default_encodings")]
    pub encodings: Vec<i32>,
    /// Connect timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_base_port() -> u16 {
    5900
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_encodings() -> Vec<i32> {
    vec![
        enc::ENCODING_ZRLE,
        enc::ENCODING_HEXTILE,
        enc::ENCODING_ZLIB,
        enc::ENCODING_RRE,
        enc::ENCODING_COPY_RECT,
        enc::ENCODING_RAW,
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::new(),
            display: 0,
            base_port: default_base_port(),
            shared: default_true(),
            view_only: false,
            encodings: default_encodings(),
            connect_timeout_ms: default_timeout_ms(),
        }
    }
}

impl Config {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject configurations that cannot possibly connect.
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.host.is_empty() {
            return Err(SessionError::Config("host cannot be empty".into()));
        }
        if self.encodings.is_empty() {
            return Err(SessionError::Config(
                "at least one encoding must be configured".into(),
            ));
        }
        Ok(())
    }

    /// The TCP port this configuration points at.
    pub fn port(&self) -> u16 {
        self.base_port.wrapping_add(self.display)
    }

    /// Connect timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// The encoding list actually sent in SetEncodings: the configured
    /// preference order with Raw moved (or appended) to the end.
    pub fn effective_encodings(&self) -> Vec<i32> {
        let mut encodings: Vec<i32> = self
            .encodings
            .iter()
            .copied()
            .filter(|&e| e != enc::ENCODING_RAW)
            .collect();
        encodings.push(enc::ENCODING_RAW);
        encodings
    }
}

/// Builder for [`Config`].
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn display(mut self, display: u16) -> Self {
        self.config.display = display;
        self
    }

    #[must_use]
    pub fn base_port(mut self, port: u16) -> Self {
        self.config.base_port = port;
        self
    }

    #[must_use]
    pub fn shared(mut self, shared: bool) -> Self {
        self.config.shared = shared;
        self
    }

    #[must_use]
    pub fn view_only(mut self, view_only: bool) -> Self {
        self.config.view_only = view_only;
        self
    }

    #[must_use]
    pub fn encodings(mut self, encodings: Vec<i32>) -> Self {
        self.config.encodings = encodings;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<Config, SessionError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_defaults() {
        let config = Config::builder().host("localhost").display(2).build().unwrap();
        assert_eq!(config.port(), 5902);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.shared);
        assert!(!config.view_only);
    }

    #[test]
    fn empty_host_is_rejected() {
        assert!(Config::builder().build().is_err());
    }

    #[test]
    fn empty_encodings_are_rejected() {
        let result = Config::builder().host("h").encodings(Vec::new()).build();
        assert!(result.is_err());
    }

    #[test]
    fn raw_is_always_the_last_encoding() {
        let config = Config::builder().host("h").build().unwrap();
        assert_eq!(*config.effective_encodings().last().unwrap(), enc::ENCODING_RAW);

        // Raw configured in the middle still ends up last, once.
        let config = Config::builder()
            .host("h")
            .encodings(vec![enc::ENCODING_RAW, enc::ENCODING_ZRLE, enc::ENCODING_RAW])
            .build()
            .unwrap();
        assert_eq!(
            config.effective_encodings(),
            vec![enc::ENCODING_ZRLE, enc::ENCODING_RAW]
        );
    }
}
