//! Redis connection pool for the distributed rate limit storage.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use config::{RedisConfig, RedisTlsConfig};
use deadpool::managed::{self, Metrics};
use redis::{Client, RedisError, RedisResult, aio::MultiplexedConnection};

/// Redis connection pool.
pub(super) type Pool = managed::Pool<Manager>;

/// A connection checked out of the pool.
pub(super) type Connection = managed::Object<Manager>;

/// Creates and health-checks multiplexed Redis connections.
#[derive(Debug)]
pub(super) struct Manager {
    client: Client,
    ping_number: AtomicUsize,
}

impl Manager {
    fn new(config: &RedisConfig) -> RedisResult<Self> {
        let client = match config.tls.as_ref().filter(|tls| tls.enabled) {
            Some(tls) => Client::build_with_tls(config.url.as_str(), tls_certificates(tls)?)?,
            None => Client::open(config.url.as_str())?,
        };

        Ok(Self {
            client,
            ping_number: AtomicUsize::new(0),
        })
    }
}

impl managed::Manager for Manager {
    type Type = MultiplexedConnection;
    type Error = RedisError;

    async fn create(&self) -> Result<MultiplexedConnection, Self::Error> {
        self.client.get_multiplexed_async_connection().await
    }

    async fn recycle(&self, conn: &mut MultiplexedConnection, _: &Metrics) -> managed::RecycleResult<Self::Error> {
        let ping_number = self.ping_number.fetch_add(1, Ordering::Relaxed).to_string();

        let (echoed,) = redis::Pipeline::with_capacity(1)
            .cmd("PING")
            .arg(&ping_number)
            .query_async::<(String,)>(conn)
            .await?;

        if echoed == ping_number {
            Ok(())
        } else {
            Err(managed::RecycleError::message("Invalid PING response"))
        }
    }
}

fn tls_certificates(config: &RedisTlsConfig) -> RedisResult<redis::TlsCertificates> {
    let root_cert = config.ca_cert_path.as_deref().map(read_file).transpose()?;

    let client_tls = match (&config.client_cert_path, &config.client_key_path) {
        (Some(cert_path), Some(key_path)) if !config.insecure => Some(redis::ClientTlsConfig {
            client_cert: read_file(cert_path)?,
            client_key: read_file(key_path)?,
        }),
        _ => None,
    };

    Ok(redis::TlsCertificates { client_tls, root_cert })
}

fn read_file(path: &Path) -> RedisResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        RedisError::from((
            redis::ErrorKind::IoError,
            "Failed to read TLS file",
            format!("{}: {e}", path.display()),
        ))
    })
}

/// Create a Redis connection pool from configuration. No connection is opened until first use.
pub(super) fn create_pool(config: &RedisConfig) -> RedisResult<Pool> {
    let manager = Manager::new(config)?;

    let mut pool_config = managed::PoolConfig::default();

    if let Some(max_size) = config.pool.max_size {
        pool_config.max_size = max_size;
    }

    pool_config.timeouts.create = config.pool.timeout_create;
    pool_config.timeouts.wait = config.pool.timeout_wait;
    pool_config.timeouts.recycle = config.pool.timeout_recycle;

    Pool::builder(manager)
        .config(pool_config)
        .runtime(deadpool::Runtime::Tokio1)
        .build()
        .map_err(|e| RedisError::from((redis::ErrorKind::IoError, "Failed to create pool", e.to_string())))
}
