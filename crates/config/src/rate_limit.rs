//! Rate limiting configuration structures.

use std::{borrow::Cow, path::PathBuf, time::Duration};

use duration_str::{deserialize_duration, deserialize_option_duration};
use serde::Deserialize;

/// Rate limiting configuration: the two sliding-window caps and where their state lives.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Maximum number of allowed actions per identity within the trailing minute.
    pub max_per_minute: u32,
    /// Maximum number of allowed actions per identity within the trailing hour.
    pub max_per_hour: u32,
    /// Path of the HTTP decision endpoint.
    pub path: Cow<'static, str>,
    /// Storage backend configuration.
    pub storage: StorageConfig,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_per_minute: 20,
            max_per_hour: 100,
            path: Cow::Borrowed("/v1/check"),
            storage: StorageConfig::default(),
        }
    }
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Process-local storage. State is lost on restart and not shared between instances.
    #[default]
    Memory,
    /// Redis storage, shared by every instance pointing at the same server.
    Redis(Box<RedisConfig>),
}

/// Redis storage configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedisConfig {
    /// Redis connection URL (redis:// or rediss:// for TLS).
    pub url: String,
    /// Connection pool configuration.
    #[serde(default)]
    pub pool: RedisPoolConfig,
    /// TLS configuration.
    pub tls: Option<RedisTlsConfig>,
    /// Prefix prepended to the identity to form the sorted set key.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Upper bound for a single Redis command.
    #[serde(default = "default_response_timeout", deserialize_with = "deserialize_duration")]
    pub response_timeout: Duration,
}

fn default_key_prefix() -> String {
    "throttle:rate_limit:".to_string()
}

fn default_response_timeout() -> Duration {
    Duration::from_secs(1)
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379/0".to_string(),
            pool: RedisPoolConfig::default(),
            tls: None,
            key_prefix: default_key_prefix(),
            response_timeout: default_response_timeout(),
        }
    }
}

/// Redis connection pool configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RedisPoolConfig {
    /// Maximum number of connections.
    pub max_size: Option<usize>,
    /// Timeout for creating connections.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_create: Option<Duration>,
    /// Timeout for waiting for a connection.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_wait: Option<Duration>,
    /// Timeout for recycling an idle connection.
    #[serde(deserialize_with = "deserialize_option_duration")]
    pub timeout_recycle: Option<Duration>,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            max_size: Some(16),
            timeout_create: Some(Duration::from_secs(5)),
            timeout_wait: Some(Duration::from_secs(5)),
            timeout_recycle: Some(Duration::from_secs(300)),
        }
    }
}

/// Redis TLS configuration.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct RedisTlsConfig {
    /// Enable TLS (automatically enabled for rediss:// URLs).
    pub enabled: bool,
    /// Skip loading client certificates and trust only the optional CA certificate.
    pub insecure: bool,
    /// Path to CA certificate file.
    pub ca_cert_path: Option<PathBuf>,
    /// Path to client certificate file (for mutual TLS).
    pub client_cert_path: Option<PathBuf>,
    /// Path to client key file (for mutual TLS).
    pub client_key_path: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rate_limit_config() {
        let config = RateLimitConfig::default();
        insta::assert_debug_snapshot!(config, @r#"
        RateLimitConfig {
            max_per_minute: 20,
            max_per_hour: 100,
            path: "/v1/check",
            storage: Memory,
        }
        "#);
    }

    #[test]
    fn deserialize_memory_storage() {
        let toml = r#"
            type = "memory"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @"Memory");
    }

    #[test]
    fn deserialize_redis_storage_minimal() {
        let toml = r#"
            type = "redis"
            url = "redis://localhost:6379/0"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        Redis(
            RedisConfig {
                url: "redis://localhost:6379/0",
                pool: RedisPoolConfig {
                    max_size: Some(
                        16,
                    ),
                    timeout_create: Some(
                        5s,
                    ),
                    timeout_wait: Some(
                        5s,
                    ),
                    timeout_recycle: Some(
                        300s,
                    ),
                },
                tls: None,
                key_prefix: "throttle:rate_limit:",
                response_timeout: 1s,
            },
        )
        "#);
    }

    #[test]
    fn deserialize_redis_storage_full() {
        let toml = r#"
            type = "redis"
            url = "rediss://localhost:6380/0"
            key_prefix = "anamnesis:"
            response_timeout = "250ms"

            [pool]
            max_size = 32
            timeout_wait = "2s"

            [tls]
            enabled = true
            ca_cert_path = "/path/to/ca.crt"
            client_cert_path = "/path/to/client.crt"
            client_key_path = "/path/to/client.key"
        "#;
        let config: StorageConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        Redis(
            RedisConfig {
                url: "rediss://localhost:6380/0",
                pool: RedisPoolConfig {
                    max_size: Some(
                        32,
                    ),
                    timeout_create: Some(
                        5s,
                    ),
                    timeout_wait: Some(
                        2s,
                    ),
                    timeout_recycle: Some(
                        300s,
                    ),
                },
                tls: Some(
                    RedisTlsConfig {
                        enabled: true,
                        insecure: false,
                        ca_cert_path: Some(
                            "/path/to/ca.crt",
                        ),
                        client_cert_path: Some(
                            "/path/to/client.crt",
                        ),
                        client_key_path: Some(
                            "/path/to/client.key",
                        ),
                    },
                ),
                key_prefix: "anamnesis:",
                response_timeout: 250ms,
            },
        )
        "#);
    }

    #[test]
    fn rate_limit_config_partial_overrides() {
        let toml = r#"
            max_per_minute = 5

            [storage]
            type = "memory"
        "#;
        let config: RateLimitConfig = toml::from_str(toml).unwrap();
        insta::assert_debug_snapshot!(config, @r#"
        RateLimitConfig {
            max_per_minute: 5,
            max_per_hour: 100,
            path: "/v1/check",
            storage: Memory,
        }
        "#);
    }

    #[test]
    fn unknown_storage_type_is_rejected() {
        let toml = r#"
            type = "postgres"
        "#;
        let result: Result<StorageConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_rate_limit_field_is_rejected() {
        let toml = r#"
            max_per_day = 1000
        "#;
        let result: Result<RateLimitConfig, _> = toml::from_str(toml);
        assert!(result.is_err());
    }
}
