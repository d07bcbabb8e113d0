use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use common::{Error, TradeKey};

use crate::{auth::require_auth, AppState};

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

pub fn api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/health", get(get_health))
        .route("/api/trades", get(get_trades))
        .route("/api/trades/close", post(close_trade))
        .route("/api/wallet", get(get_wallet))
        .route("/api/kill-switch", post(kill_switch))
        .route("/api/trading/enable", post(enable_trading))
        .route("/api/blacklist/:instrument/clear", post(clear_blacklist))
        .route("/api/cache/:instrument", delete(purge_cache))
        .route_layer(middleware::from_fn_with_state(state, require_auth))
}

fn failure(status: StatusCode, message: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": message.to_string() })))
}

fn from_error(e: Error) -> (StatusCode, Json<Value>) {
    let status = match e {
        Error::Unauthorized => StatusCode::FORBIDDEN,
        Error::PoolTimeout => StatusCode::SERVICE_UNAVAILABLE,
        Error::TransientFetch { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!(error = %e, "Request failed");
    }
    failure(status, e)
}

// ─── Health ───────────────────────────────────────────────────────────────────

async fn get_health(State(state): State<AppState>) -> Json<Value> {
    let engine = &state.engine;
    let pool = engine.store().pool();
    Json(json!({
        "health": engine.health().status(),
        "trading_disabled": engine.trades().is_trading_disabled(),
        "auto_trading": engine.settings().auto_trading,
        "open_trades": engine.trades().len(),
        "strategies": engine.registry().names(),
        "pool": {
            "size": pool.size(),
            "idle": pool.idle(),
            "capacity": pool.capacity(),
        },
    }))
}

// ─── Trades ───────────────────────────────────────────────────────────────────

async fn get_trades(State(state): State<AppState>) -> Json<Value> {
    let trades: Vec<Value> = state
        .engine
        .trades()
        .all()
        .into_iter()
        .map(|(key, trade)| {
            json!({
                "exchange": key.exchange,
                "strategy": key.strategy,
                "instrument": key.instrument,
                "direction": trade.direction,
                "entry_price": trade.entry_price,
                "opened_at": trade.opened_at,
            })
        })
        .collect();
    Json(json!({ "total": trades.len(), "trades": trades }))
}

#[derive(Deserialize)]
struct CloseRequest {
    strategy: String,
    instrument: String,
}

async fn close_trade(State(state): State<AppState>, Json(body): Json<CloseRequest>) -> ApiResult {
    let key = TradeKey::new(state.engine.exchange(), &body.strategy, &body.instrument);
    match state.engine.trades().close(&key) {
        Some(trade) => Ok(Json(json!({ "closed": key, "trade": trade }))),
        None => Err(failure(StatusCode::NOT_FOUND, format!("no open trade for {key}"))),
    }
}

// ─── Wallet ───────────────────────────────────────────────────────────────────

async fn get_wallet(State(state): State<AppState>) -> ApiResult {
    let balances = state.engine.wallet().await.map_err(from_error)?;
    Ok(Json(json!({ "balances": balances })))
}

// ─── Kill switch ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct PasswordRequest {
    password: String,
}

async fn kill_switch(
    State(state): State<AppState>,
    Json(body): Json<PasswordRequest>,
) -> ApiResult {
    warn!("Kill switch requested via API");
    let report = state.kill_switch.execute(&body.password).map_err(from_error)?;
    Ok(Json(json!(report)))
}

async fn enable_trading(
    State(state): State<AppState>,
    Json(body): Json<PasswordRequest>,
) -> ApiResult {
    state.kill_switch.reenable(&body.password).map_err(from_error)?;
    Ok(Json(json!({ "trading_disabled": false })))
}

// ─── Blacklist / cache ────────────────────────────────────────────────────────

async fn clear_blacklist(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
) -> ApiResult {
    if state.engine.health().clear_blacklist(&instrument) {
        info!(instrument = %instrument, "Blacklist cleared via API");
        Ok(Json(json!({ "instrument": instrument, "blacklisted": false })))
    } else {
        Err(failure(
            StatusCode::NOT_FOUND,
            format!("{instrument} is not blacklisted"),
        ))
    }
}

async fn purge_cache(
    State(state): State<AppState>,
    Path(instrument): Path<String>,
) -> ApiResult {
    let deleted = state.engine.purge_cache(&instrument).await.map_err(from_error)?;
    Ok(Json(json!({ "instrument": instrument, "deleted": deleted })))
}
