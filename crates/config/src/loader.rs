use std::path::Path;

use anyhow::bail;

use crate::{Config, StorageConfig};

pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;

    let warnings = validate(&config)?;

    for warning in warnings {
        log::warn!("{warning}");
    }

    Ok(config)
}

pub(crate) fn validate(config: &Config) -> anyhow::Result<Vec<String>> {
    let mut warnings = Vec::new();
    let rate_limit = &config.rate_limit;

    if rate_limit.max_per_minute == 0 {
        bail!("rate_limit.max_per_minute must be greater than zero");
    }

    if rate_limit.max_per_hour == 0 {
        bail!("rate_limit.max_per_hour must be greater than zero");
    }

    if rate_limit.max_per_minute > rate_limit.max_per_hour {
        warnings.push(format!(
            "rate_limit.max_per_minute ({}) exceeds rate_limit.max_per_hour ({}), the per-minute cap can never be reached",
            rate_limit.max_per_minute, rate_limit.max_per_hour
        ));
    }

    if !rate_limit.path.starts_with('/') {
        bail!("rate_limit.path must start with '/', got '{}'", rate_limit.path);
    }

    if !config.server.health.path.starts_with('/') {
        bail!("server.health.path must start with '/', got '{}'", config.server.health.path);
    }

    if let StorageConfig::Redis(redis) = &rate_limit.storage {
        let secure = redis.url.starts_with("rediss://");

        if !secure && !redis.url.starts_with("redis://") {
            bail!(
                "rate_limit.storage.url must use the redis:// or rediss:// scheme, got '{}'",
                redis.url
            );
        }

        if redis.key_prefix.is_empty() {
            bail!("rate_limit.storage.key_prefix must not be empty");
        }

        if redis.response_timeout.is_zero() {
            bail!("rate_limit.storage.response_timeout must be greater than zero");
        }

        if let Some(tls) = &redis.tls
            && tls.enabled
            && !secure
        {
            warnings.push(format!(
                "TLS is enabled for Redis but the URL '{}' does not use rediss://, the connection will not be encrypted",
                redis.url
            ));
        }

        if let Some(tls) = &redis.tls
            && tls.client_cert_path.is_some() != tls.client_key_path.is_some()
        {
            bail!("rate_limit.storage.tls requires both client_cert_path and client_key_path for mutual TLS");
        }
    }

    Ok(warnings)
}
