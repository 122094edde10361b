//! API server setup and lifecycle.

use super::{
    handlers::AppState,
    middleware::{create_cors_layer, request_id_middleware},
    routes::create_router,
};
use crate::bets::BetService;
use crate::config::ApiConfig;
use crate::replay::ReplayService;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::signal;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(
        config: ApiConfig,
        bets: BetService,
        seeds: Arc<crate::seeds::SeedPairManager>,
        ledger: Arc<crate::ledger::BalanceLedger>,
        replay: ReplayService,
    ) -> Self {
        let state = Arc::new(AppState {
            bets,
            seeds,
            ledger,
            replay,
            version: env!("CARGO_PKG_VERSION").to_string(),
        });
        Self { config, state }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_app();
        let addr = SocketAddr::from((
            self.config.listen_address.parse::<std::net::IpAddr>()?,
            self.config.port,
        ));

        info!("Starting faircore API server on http://{}", addr);
        info!("   CORS origins: {:?}", self.config.cors_origins);
        info!("   Request timeout: {}s", self.config.request_timeout_secs);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped gracefully");
        Ok(())
    }

    fn create_app(&self) -> axum::Router {
        create_router(self.state.clone())
            // Request id first so every later layer sees it.
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(create_cors_layer(self.config.cors_origins.clone()))
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(TraceLayer::new_for_http())
    }
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
