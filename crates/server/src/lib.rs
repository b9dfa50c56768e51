//! Throttle server library.
//!
//! Provides a reusable server function to serve Throttle either for the binary, or for the integration tests.

#![deny(missing_docs)]

mod health;
mod rate_limit;

use std::{net::SocketAddr, sync::Arc};

use ::rate_limit::RateLimiter;
use anyhow::anyhow;
use axum::{
    Router,
    routing::{get, post},
};
use config::Config;
use tokio::net::TcpListener;

/// Configuration for serving Throttle.
pub struct ServeConfig {
    /// The socket address (IP and port) the server will bind to
    pub listen_address: SocketAddr,
    /// The deserialized Throttle TOML configuration.
    pub config: Config,
}

/// Starts and runs the Throttle server with the provided configuration.
pub async fn serve(ServeConfig { listen_address, config }: ServeConfig) -> anyhow::Result<()> {
    let limiter = RateLimiter::new(&config.rate_limit)
        .await
        .map_err(|e| anyhow!("Failed to initialize the rate limiter: {e}"))?;

    let mut app = Router::new()
        .route(&config.rate_limit.path, post(rate_limit::check))
        .with_state(Arc::new(limiter));

    if config.server.health.enabled {
        if let Some(listen) = config.server.health.listen {
            let health_config = config.server.health.clone();

            tokio::spawn(async move {
                if let Err(e) = health::bind_health_endpoint(listen, health_config).await {
                    log::error!("{e}");
                }
            });
        } else {
            app = app.route(&config.server.health.path, get(health::health));
        }
    }

    let listener = TcpListener::bind(listen_address)
        .await
        .map_err(|e| anyhow!("Failed to bind to {listen_address}: {e}"))?;

    log::info!(
        "Rate limit endpoint available at: http://{listen_address}{}",
        config.rate_limit.path
    );

    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow!("Failed to start HTTP server: {e}"))?;

    Ok(())
}
