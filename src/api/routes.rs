//! Route definitions.

use super::handlers::*;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        // Betting
        .route("/bet/place", post(place_bet_handler))
        // Seed lifecycle
        .route("/seeds/active/:user_id", get(active_seed_handler))
        .route("/seeds/rotate", post(rotate_seed_handler))
        .route("/seeds/client-seed", post(set_client_seed_handler))
        .route("/verify/:seed_pair_id", get(verify_seed_handler))
        // Replay / audit
        .route("/replay/:session_id", get(replay_session_handler))
        .route("/replay/batch", post(replay_batch_handler))
        // Wallets
        .route("/wallet/deposit", post(deposit_handler))
        .route("/wallet/withdraw", post(withdraw_handler))
        .route("/wallet/:user_id/:asset", get(wallet_handler))
        .route(
            "/wallet/:user_id/:asset/operations",
            get(operations_handler),
        )
        // Operational
        .route("/admin/seed/:seed_pair_id/nonce", post(admin_nonce_handler))
        .with_state(state)
}
