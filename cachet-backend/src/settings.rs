//! Connection settings.
//!
//! [`Settings`] is plain data: it can be built in code with struct-update
//! syntax or loaded from YAML. Omitted fields fall back to their defaults
//! (`127.0.0.1:6379`, no password, default database, no partition).
//!
//! ```
//! use cachet_backend::Settings;
//!
//! let settings = Settings {
//!     partition: Some("app".to_owned()),
//!     ..Settings::default()
//! };
//! assert_eq!(settings.port, 6379);
//!
//! let settings = Settings::from_yaml("host: cache.local\ndb: 2\n").unwrap();
//! assert_eq!(settings.host, "cache.local");
//! assert_eq!(settings.database, Some(2));
//! ```

use std::path::PathBuf;

use cachet_core::{Key, key};
use percent_encoding::{AsciiSet, CONTROLS, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 6379;
const DEFAULT_SENTINEL_NAME: &str = "mymaster";

/// Userinfo characters that must be escaped in a connection URL.
const USERINFO: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Path characters that must be escaped in a socket URL.
const SOCKET_PATH: &AsciiSet = &CONTROLS.add(b' ').add(b'#').add(b'?').add(b'%');

/// Store connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Server host, used when no other addressing mode is configured.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Password sent on connect.
    pub password: Option<String>,
    /// Database index selected on connect.
    #[serde(alias = "db")]
    pub database: Option<u32>,
    /// Prefix separating logical caches that share one store.
    pub partition: Option<String>,
    /// Connect over TLS to `host:port`.
    pub tls: Option<TlsOptions>,
    /// Sentinel nodes. When non-empty, sentinel discovery is used.
    pub sentinels: Vec<SentinelAddr>,
    /// Name of the master monitored by the sentinels.
    #[serde(alias = "sentinelName")]
    pub sentinel_name: Option<String>,
    /// Full connection URL.
    pub url: Option<String>,
    /// Unix socket path.
    pub socket: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            password: None,
            database: None,
            partition: None,
            tls: None,
            sentinels: Vec::new(),
            sentinel_name: None,
            url: None,
            socket: None,
        }
    }
}

/// TLS connection options.
///
/// Certificates are PEM files. `client_cert` and `client_key` enable mutual
/// TLS and must be given together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsOptions {
    /// Skip certificate verification.
    pub insecure: bool,
    /// CA bundle used instead of the system roots.
    #[serde(alias = "ca")]
    pub ca_cert: Option<PathBuf>,
    /// Client certificate.
    #[serde(alias = "cert")]
    pub client_cert: Option<PathBuf>,
    /// Client private key.
    #[serde(alias = "key")]
    pub client_key: Option<PathBuf>,
}

impl TlsOptions {
    /// Returns `true` if any certificate file is configured.
    pub fn has_certificates(&self) -> bool {
        self.ca_cert.is_some() || self.client_cert.is_some() || self.client_key.is_some()
    }
}

/// Address of a sentinel node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentinelAddr {
    /// Sentinel host.
    pub host: String,
    /// Sentinel port.
    #[serde(default = "default_sentinel_port")]
    pub port: u16,
}

fn default_sentinel_port() -> u16 {
    26379
}

/// How a connection attempt reaches the store.
///
/// Exactly one mode is used per attempt, see [`Settings::connection_mode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    /// Discover the master through sentinel nodes.
    Sentinel {
        /// Sentinel nodes to query.
        sentinels: Vec<SentinelAddr>,
        /// Monitored master name.
        master_name: String,
    },
    /// TLS connection to a single server.
    Tls {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
        /// Skip certificate verification.
        insecure: bool,
    },
    /// Connection URL given verbatim.
    Url(String),
    /// Unix domain socket.
    Socket(PathBuf),
    /// Plain TCP connection.
    Tcp {
        /// Server host.
        host: String,
        /// Server port.
        port: u16,
    },
}

impl ConnectionMode {
    /// Short name of the mode, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sentinel { .. } => "sentinel",
            Self::Tls { .. } => "tls",
            Self::Url(_) => "url",
            Self::Socket(_) => "socket",
            Self::Tcp { .. } => "tcp",
        }
    }

    /// Renders the redis connection URL for this mode.
    ///
    /// Password and database come from `settings`. A [`Url`](Self::Url) is
    /// returned unchanged. Returns `None` for [`Sentinel`](Self::Sentinel),
    /// which is not addressable by a single URL.
    pub fn to_url(&self, settings: &Settings) -> Option<String> {
        match self {
            Self::Sentinel { .. } => None,
            Self::Url(url) => Some(url.clone()),
            Self::Tcp { host, port } => Some(server_url("redis", host, *port, settings)),
            Self::Tls {
                host,
                port,
                insecure,
            } => {
                let mut url = server_url("rediss", host, *port, settings);
                if *insecure {
                    url.push_str("#insecure");
                }
                Some(url)
            }
            Self::Socket(path) => {
                let path = path.to_string_lossy();
                let mut url = format!("redis+unix://{}", utf8_percent_encode(&path, SOCKET_PATH));
                let mut query = Vec::new();
                if let Some(db) = settings.database {
                    query.push(format!("db={db}"));
                }
                if let Some(password) = &settings.password {
                    query.push(format!("pass={}", utf8_percent_encode(password, USERINFO)));
                }
                if !query.is_empty() {
                    url.push('?');
                    url.push_str(&query.join("&"));
                }
                Some(url)
            }
        }
    }
}

fn server_url(scheme: &str, host: &str, port: u16, settings: &Settings) -> String {
    let auth = settings
        .password
        .as_deref()
        .map(|password| format!(":{}@", utf8_percent_encode(password, USERINFO)))
        .unwrap_or_default();
    let host = if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]")
    } else {
        host.to_owned()
    };
    let db = settings
        .database
        .map(|db| format!("/{db}"))
        .unwrap_or_default();
    format!("{scheme}://{auth}{host}:{port}{db}")
}

impl Settings {
    /// Loads settings from a YAML document.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Selects the addressing mode for a connection attempt.
    ///
    /// Precedence: sentinels (if any) > tls > url > socket > host/port.
    pub fn connection_mode(&self) -> ConnectionMode {
        if !self.sentinels.is_empty() {
            ConnectionMode::Sentinel {
                sentinels: self.sentinels.clone(),
                master_name: self
                    .sentinel_name
                    .clone()
                    .unwrap_or_else(|| DEFAULT_SENTINEL_NAME.to_owned()),
            }
        } else if let Some(tls) = &self.tls {
            ConnectionMode::Tls {
                host: self.host.clone(),
                port: self.port,
                insecure: tls.insecure,
            }
        } else if let Some(url) = &self.url {
            ConnectionMode::Url(url.clone())
        } else if let Some(socket) = &self.socket {
            ConnectionMode::Socket(socket.clone())
        } else {
            ConnectionMode::Tcp {
                host: self.host.clone(),
                port: self.port,
            }
        }
    }

    /// Store key for `key` under this partition.
    pub fn generate_key(&self, key: &Key) -> String {
        key::generate(self.partition.as_deref(), key)
    }
}
