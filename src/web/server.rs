//! Web server for groupvault.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;

use crate::config::WebConfig;
use crate::db::RefreshTokenRepository;
use crate::{Result, VaultError};

use super::handlers::AppState;
use super::middleware::{JwtState, RateLimitState};
use super::router::{create_health_router, create_openapi_router, create_router};

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// JWT state.
    jwt_state: Arc<JwtState>,
    /// Login rate limiter.
    rate_limit_state: Arc<RateLimitState>,
    /// Web configuration.
    web_config: WebConfig,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &WebConfig, app_state: AppState) -> Result<Self> {
        let addr = config
            .bind_address()
            .parse()
            .map_err(|e| VaultError::Config(format!("invalid web server address: {e}")))?;

        Ok(Self {
            addr,
            app_state: Arc::new(app_state),
            jwt_state: Arc::new(JwtState::new(&config.jwt_secret)),
            rate_limit_state: Arc::new(
                RateLimitState::new(config.login_rate_limit)
                    .with_trusted_proxy_headers(config.trust_proxy_headers),
            ),
            web_config: config.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the token cleanup background task.
    ///
    /// Runs every hour and removes expired and revoked refresh tokens.
    fn start_token_cleanup_task(app_state: Arc<AppState>) {
        tokio::spawn(async move {
            const CLEANUP_INTERVAL_SECS: u64 = 3600;

            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                let repo = RefreshTokenRepository::new(app_state.db.pool());
                match repo.cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(
                            deleted_count = count,
                            "Cleaned up expired/revoked refresh tokens"
                        );
                    }
                    Ok(_) => tracing::debug!("No expired refresh tokens to clean up"),
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup refresh tokens"),
                }
            }
        });
    }

    /// Assemble the full application router.
    fn build_router(&self) -> Router {
        create_router(
            self.app_state.clone(),
            self.jwt_state.clone(),
            self.rate_limit_state.clone(),
            &self.web_config.cors_origins,
        )
        .merge(create_health_router())
        .merge(create_openapi_router())
    }

    /// Bind the listener and start background tasks.
    async fn bind(&self) -> std::io::Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        Self::start_token_cleanup_task(self.app_state.clone());
        self.rate_limit_state.clone().start_cleanup_task();
        tracing::info!("Token cleanup task started (runs every hour)");

        tracing::info!("Web server listening on http://{}", local_addr);
        Ok((listener, local_addr))
    }

    /// Run the web server.
    pub async fn run(self) -> std::io::Result<()> {
        let router = self.build_router();
        let (listener, _) = self.bind().await?;

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }

    /// Run the server in the background and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> std::io::Result<SocketAddr> {
        let router = self.build_router();
        let (listener, local_addr) = self.bind().await?;

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
