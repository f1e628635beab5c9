//! Opening Redis connections.

use cachet_backend::{
    Cache, ConnectionAttempt, ConnectionMode, Connector, SentinelAddr, Settings, TlsOptions,
};
use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{debug, trace};

use crate::error::Error;
use crate::store::RedisStore;

/// Cache backed by Redis.
pub type RedisCache = Cache<RedisConnector>;

/// Opens Redis connections with redis-rs.
///
/// Every attempt runs on its own task and reports exactly one event: `Ready`
/// with the connected [`RedisStore`], or `Error`.
///
/// # Examples
///
/// ```no_run
/// use cachet_backend::{Key, Settings};
/// use cachet_redis::RedisConnector;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let cache = RedisConnector::cache(Settings::default());
/// cache.start().await?;
///
/// let key = Key::new("sessions", "u1")?;
/// cache.set(&key, "hello", 5000).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct RedisConnector;

impl RedisConnector {
    /// Creates a cache that connects to Redis on `start`.
    pub fn cache(settings: Settings) -> RedisCache {
        Cache::new(settings, RedisConnector)
    }

    /// Creates a cache around an existing connection.
    pub fn cache_with_connection(settings: Settings, connection: ConnectionManager) -> RedisCache {
        Cache::with_store(settings, RedisConnector, RedisStore::new(connection))
    }
}

impl Connector for RedisConnector {
    type Store = RedisStore;

    fn connect(&self, mode: ConnectionMode, settings: &Settings) -> ConnectionAttempt<RedisStore> {
        let (events, attempt) = ConnectionAttempt::channel();
        let settings = settings.clone();

        let task = tokio::spawn(async move {
            match open(mode, &settings).await {
                Ok(store) => {
                    events.ready(store);
                }
                Err(error) => {
                    events.error(error);
                }
            }
        });
        attempt.with_task(task)
    }
}

async fn open(mode: ConnectionMode, settings: &Settings) -> Result<RedisStore, Error> {
    let mode = match mode {
        ConnectionMode::Sentinel {
            sentinels,
            master_name,
        } => {
            let (host, port) = resolve_master(&sentinels, &master_name).await?;
            debug!(%host, port, master = %master_name, "Resolved master through sentinel");
            ConnectionMode::Tcp { host, port }
        }
        mode => mode,
    };

    // Only sentinel mode has no URL, and it was resolved above.
    let url = mode.to_url(settings).ok_or(Error::NoSentinels)?;
    let client = match (&mode, &settings.tls) {
        (ConnectionMode::Tls { .. }, Some(tls)) if tls.has_certificates() => {
            tls_client(url, tls).await?
        }
        _ => Client::open(url)?,
    };

    trace!("Initialize new redis connection manager");
    let connection = client.get_connection_manager().await?;
    Ok(RedisStore::new(connection))
}

#[cfg(feature = "tls")]
async fn tls_client(url: String, tls: &TlsOptions) -> Result<Client, Error> {
    use redis::{ClientTlsConfig, TlsCertificates};

    let client_tls = match (&tls.client_cert, &tls.client_key) {
        (Some(cert), Some(key)) => Some(ClientTlsConfig {
            client_cert: read_pem(cert).await?,
            client_key: read_pem(key).await?,
        }),
        (None, None) => None,
        _ => return Err(Error::IncompleteClientCertificate),
    };
    let root_cert = match &tls.ca_cert {
        Some(path) => Some(read_pem(path).await?),
        None => None,
    };

    trace!(
        ca = root_cert.is_some(),
        client = client_tls.is_some(),
        "Build redis client with TLS certificates"
    );
    Ok(Client::build_with_tls(
        url,
        TlsCertificates {
            client_tls,
            root_cert,
        },
    )?)
}

#[cfg(not(feature = "tls"))]
async fn tls_client(_url: String, _tls: &TlsOptions) -> Result<Client, Error> {
    Err(Error::TlsDisabled)
}

#[cfg(feature = "tls")]
async fn read_pem(path: &std::path::Path) -> Result<Vec<u8>, Error> {
    tokio::fs::read(path)
        .await
        .map_err(|source| Error::Certificate {
            path: path.to_owned(),
            source,
        })
}

/// Asks each sentinel in turn for the master address.
async fn resolve_master(
    sentinels: &[SentinelAddr],
    master_name: &str,
) -> Result<(String, u16), Error> {
    let mut last_error = Error::NoSentinels;
    for sentinel in sentinels {
        match query_master(sentinel, master_name).await {
            Ok(address) => return Ok(address),
            Err(error) => {
                debug!(host = %sentinel.host, port = sentinel.port, %error, "Sentinel query failed");
                last_error = error;
            }
        }
    }
    Err(last_error)
}

async fn query_master(sentinel: &SentinelAddr, master_name: &str) -> Result<(String, u16), Error> {
    let node = ConnectionMode::Tcp {
        host: sentinel.host.clone(),
        port: sentinel.port,
    };
    let url = node.to_url(&Settings::default()).ok_or(Error::NoSentinels)?;
    let client = Client::open(url)?;
    let mut con = client.get_multiplexed_async_connection().await?;

    let address: Option<(String, u16)> = redis::cmd("SENTINEL")
        .arg("get-master-addr-by-name")
        .arg(master_name)
        .query_async(&mut con)
        .await?;
    address.ok_or_else(|| Error::UnknownMaster(master_name.to_owned()))
}
