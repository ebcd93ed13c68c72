//! Server runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the
//! router. Request handlers never read environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Listen address used when `DOCDIR_ADDR` is unset.
pub const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Store directory used when `DOCDIR_STORE_DIR` is unset.
pub const DEFAULT_STORE_DIR: &str = "./public";

/// Template directory used when `DOCDIR_TEMPLATE_DIR` is unset.
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid listen address {value:?}: {source}")]
    InvalidAddress {
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
    #[error("{0} cannot be empty")]
    EmptyPath(&'static str),
}

/// Server configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    addr: SocketAddr,
    store_dir: PathBuf,
    template_dir: PathBuf,
}

impl ServerConfig {
    /// Create a new `ServerConfig`.
    pub fn new(addr: &str, store_dir: PathBuf, template_dir: PathBuf) -> Result<Self, ConfigError> {
        let addr = addr
            .trim()
            .parse::<SocketAddr>()
            .map_err(|source| ConfigError::InvalidAddress {
                value: addr.to_owned(),
                source,
            })?;

        if store_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("store directory"));
        }
        if template_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyPath("template directory"));
        }

        Ok(Self {
            addr,
            store_dir,
            template_dir,
        })
    }

    /// Build a `ServerConfig` from optional raw values, falling back to defaults.
    ///
    /// `None` and blank values both select the default.
    pub fn from_env_values(
        addr: Option<String>,
        store_dir: Option<String>,
        template_dir: Option<String>,
    ) -> Result<Self, ConfigError> {
        fn or_default(value: Option<String>, default: &str) -> String {
            value
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        }

        Self::new(
            &or_default(addr, DEFAULT_ADDR),
            PathBuf::from(or_default(store_dir, DEFAULT_STORE_DIR)),
            PathBuf::from(or_default(template_dir, DEFAULT_TEMPLATE_DIR)),
        )
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    pub fn template_dir(&self) -> &Path {
        &self.template_dir
    }
}
