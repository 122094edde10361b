//! Request handlers.

use super::{errors::ApiError, middleware::RequestId, models::*};
use crate::bets::{BetService, PlaceBetRequest};
use crate::ledger::{parse_amount, Asset, BalanceLedger, OperationType};
use crate::metrics;
use crate::replay::ReplayService;
use crate::seeds::SeedPairManager;
use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use std::str::FromStr;
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub bets: BetService,
    pub seeds: Arc<SeedPairManager>,
    pub ledger: Arc<BalanceLedger>,
    pub replay: ReplayService,
    pub version: String,
}

fn parse_asset(request_id: &str, raw: &str) -> Result<Asset, ApiError> {
    Asset::from_str(raw)
        .map_err(|e| ApiError::bad_request(request_id.to_string(), e.to_string()))
}

/// GET /health
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Running".to_string(),
        version: state.version.clone(),
    })
}

/// GET /metrics
pub async fn metrics_handler() -> ([(axum::http::HeaderName, &'static str); 1], String) {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::gather(),
    )
}

/// POST /bet/place
pub async fn place_bet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<PlaceBetHttpRequest>,
) -> Result<Json<BetResponse>, ApiError> {
    let asset = parse_asset(&request_id.0, &request.asset)?;
    let stake = parse_amount(asset, &request.stake)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e.to_string()))?;

    let receipt = state
        .bets
        .place_bet(PlaceBetRequest {
            user_id: request.user_id,
            session_id: request.session_id,
            step: request.step,
            asset,
            stake,
            params: request.params,
        })
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(BetResponse::new(receipt, asset)))
}

/// GET /verify/:seed_pair_id
///
/// Active pairs answer with the hash commitment only; retired pairs include
/// the revealed seed and the recomputed hash check.
pub async fn verify_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(seed_pair_id): Path<String>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let pair = state
        .seeds
        .get_pair(&seed_pair_id)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    if pair.is_active {
        return Ok(Json(VerifyResponse {
            seed_pair_id: pair.id,
            is_active: true,
            server_seed_hash: pair.server_seed_hash,
            server_seed: None,
            hash_matches: None,
        }));
    }
    let revealed = state
        .seeds
        .reveal_and_verify(&seed_pair_id)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(VerifyResponse {
        seed_pair_id: revealed.seed_pair_id,
        is_active: false,
        server_seed_hash: revealed.server_seed_hash,
        server_seed: Some(revealed.server_seed_hex),
        hash_matches: Some(revealed.hash_matches),
    }))
}

/// POST /seeds/rotate
pub async fn rotate_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<RotateSeedRequest>,
) -> Result<Json<RotateSeedResponse>, ApiError> {
    let (retired, replacement) = state
        .seeds
        .rotate(&request.user_id, request.client_seed)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    let revealed = state
        .seeds
        .reveal_and_verify(&retired.id)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    metrics::SEED_ROTATIONS.inc();
    Ok(Json(RotateSeedResponse {
        revealed,
        replacement: replacement.into(),
    }))
}

/// GET /seeds/active/:user_id
pub async fn active_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<String>,
) -> Result<Json<SeedPairView>, ApiError> {
    let pair = state
        .seeds
        .get_or_create_active(&user_id)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(pair.into()))
}

/// POST /seeds/client-seed
pub async fn set_client_seed_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<SetClientSeedRequest>,
) -> Result<Json<SeedPairView>, ApiError> {
    let pair = state
        .seeds
        .set_client_seed(&request.user_id, request.client_seed)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(pair.into()))
}

/// GET /replay/:session_id?from_step=&to_step=
pub async fn replay_session_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Query(range): Query<ReplayRangeQuery>,
) -> Result<Json<crate::replay::SessionReplay>, ApiError> {
    let replay = state
        .replay
        .replay_session(
            &session_id,
            range.from_step.unwrap_or(0),
            range.to_step.unwrap_or(u64::MAX),
        )
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(replay))
}

/// POST /replay/batch
pub async fn replay_batch_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<ReplayBatchRequest>,
) -> Result<Json<Vec<crate::replay::SessionReplay>>, ApiError> {
    let replays = state
        .replay
        .replay_batch(&request.queries)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(replays))
}

/// GET /wallet/:user_id/:asset
pub async fn wallet_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((user_id, asset)): Path<(String, String)>,
) -> Result<Json<WalletResponse>, ApiError> {
    let asset = parse_asset(&request_id.0, &asset)?;
    let balance = state
        .ledger
        .balance(&user_id, asset)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(WalletResponse {
        user_id,
        asset: asset.to_string(),
        balance: crate::ledger::format_amount(asset, balance),
        balance_minor: balance,
    }))
}

async fn apply_funds(
    request_id: &RequestId,
    state: &AppState,
    request: FundsRequest,
    operation_type: OperationType,
) -> Result<Json<OperationView>, ApiError> {
    let asset = parse_asset(&request_id.0, &request.asset)?;
    let amount = parse_amount(asset, &request.amount)
        .map_err(|e| ApiError::bad_request(request_id.0.clone(), e.to_string()))?;
    if amount <= 0 {
        return Err(ApiError::bad_request(
            request_id.0.clone(),
            "amount must be positive".to_string(),
        ));
    }
    let signed = match operation_type {
        OperationType::Withdraw => -amount,
        _ => amount,
    };
    let row = state
        .ledger
        .apply(
            &request.operation_id,
            &request.user_id,
            asset,
            signed,
            operation_type,
            None,
        )
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(OperationView::new(row)))
}

/// POST /wallet/deposit
pub async fn deposit_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<FundsRequest>,
) -> Result<Json<OperationView>, ApiError> {
    apply_funds(&request_id, &state, request, OperationType::Deposit).await
}

/// POST /wallet/withdraw
pub async fn withdraw_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Json(request): Json<FundsRequest>,
) -> Result<Json<OperationView>, ApiError> {
    apply_funds(&request_id, &state, request, OperationType::Withdraw).await
}

/// GET /wallet/:user_id/:asset/operations?limit=
pub async fn operations_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path((user_id, asset)): Path<(String, String)>,
    Query(query): Query<OperationsQuery>,
) -> Result<Json<OperationsResponse>, ApiError> {
    let asset = parse_asset(&request_id.0, &asset)?;
    let limit = query.limit.unwrap_or(50).min(500);
    let operations = state
        .ledger
        .recent_operations(&user_id, asset, limit)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(OperationsResponse {
        user_id,
        asset: asset.to_string(),
        operations: operations.into_iter().map(OperationView::new).collect(),
    }))
}

/// POST /admin/seed/:seed_pair_id/nonce
///
/// Requires `confirm: true` in the body; refuses otherwise. This never sits
/// on the bet path.
pub async fn admin_nonce_handler(
    Extension(request_id): Extension<RequestId>,
    State(state): State<Arc<AppState>>,
    Path(seed_pair_id): Path<String>,
    Json(request): Json<AdminNonceRequest>,
) -> Result<Json<SeedPairView>, ApiError> {
    if !request.confirm {
        return Err(ApiError::bad_request(
            request_id.0.clone(),
            "nonce override requires confirm: true".to_string(),
        ));
    }
    let pair = state
        .seeds
        .admin_override_nonce(&seed_pair_id, request.nonce)
        .map_err(|e| ApiError::from_core(request_id.0.clone(), e))?;
    Ok(Json(pair.into()))
}
