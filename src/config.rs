//! Per-port server configuration.
//!
//! The plain settings deserialize from TOML:
//!
//! ```toml
//! domain_name = "example.org"
//! port = 8443
//! timeout = 10
//! tls_cert = "/etc/basehttp/server.pem"
//! spillover_dir = "/var/log/basehttp/large"
//! ```
//!
//! Access log sinks are attached in code with [`ServerConfig::sink`].

use std::fmt;
use std::fs;
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::access_log::AccessSink;

/// Errors produced while loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_timeout() -> u64 {
    10
}

fn default_spillover_dir() -> PathBuf {
    PathBuf::from("./large")
}

/// Everything one [`ServerRunner`](crate::server::ServerRunner) needs besides
/// its hooks. One config serves exactly one port.
#[derive(Clone, Deserialize)]
pub struct ServerConfig {
    /// Informational; included in log events.
    pub domain_name: String,
    /// `0` binds an ephemeral port, reported through the readiness signal.
    pub port: u16,
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,
    /// Per-connection read/write timeout in seconds, also advertised in `Keep-Alive`.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// PEM file holding the certificate chain and private key. Absent = plain HTTP.
    #[serde(default)]
    pub tls_cert: Option<PathBuf>,
    #[serde(default = "default_spillover_dir")]
    pub spillover_dir: PathBuf,
    #[serde(skip)]
    pub sinks: Vec<Arc<dyn AccessSink>>,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("domain_name", &self.domain_name)
            .field("port", &self.port)
            .field("bind_address", &self.bind_address)
            .field("timeout", &self.timeout)
            .field("tls_cert", &self.tls_cert)
            .field("spillover_dir", &self.spillover_dir)
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl ServerConfig {
    /// Creates a plain-HTTP config with default timeout and spillover directory.
    pub fn new(domain_name: impl Into<String>, port: u16) -> Self {
        Self {
            domain_name: domain_name.into(),
            port,
            bind_address: default_bind_address(),
            timeout: default_timeout(),
            tls_cert: None,
            spillover_dir: default_spillover_dir(),
            sinks: Vec::new(),
        }
    }

    /// Parses settings from a TOML document. Sinks start empty.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    #[must_use]
    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.bind_address = address;
        self
    }

    #[must_use]
    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    #[must_use]
    pub fn tls_cert(mut self, path: impl Into<PathBuf>) -> Self {
        self.tls_cert = Some(path.into());
        self
    }

    #[must_use]
    pub fn spillover_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spillover_dir = dir.into();
        self
    }

    /// Appends an access log sink; sinks receive exchanges in the order added.
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn AccessSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    pub fn is_tls(&self) -> bool {
        self.tls_cert.is_some()
    }
}
