use super::AppState;
use super::error::ApiError;
use crate::core::config::AppConfig;
use crate::core::rates::{PairQuote, RateSnapshot};
use crate::core::validator::{Validator, check_date, check_pair};
use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

const STATUS_LOG_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct StatusResponse<'a> {
    pub status: &'static str,
    pub version: &'static str,
    pub config: &'a AppConfig,
    pub logs: Vec<String>,
}

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/v1/status", get(status))
        .route("/v1/rates", get(latest_rates))
        // date format: 2024-04-20
        .route("/v1/rates/{date}", get(dated_rates))
        // pair format: USD-UAH (1 USD = x UAH)
        .route("/v1/pair/{pair}", get(pair))
}

async fn index() -> &'static str {
    "Welcome!\n"
}

async fn status(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>, ApiError> {
    let logs = state
        .requests
        .recent(STATUS_LOG_LIMIT)
        .await?
        .iter()
        .map(ToString::to_string)
        .collect();

    let response = StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        config: &state.config,
        logs,
    };
    Ok(Json(serde_json::to_value(&response).map_err(anyhow::Error::from)?))
}

async fn latest_rates(State(state): State<Arc<AppState>>) -> Result<Json<RateSnapshot>, ApiError> {
    rates_for(&state, "").await
}

async fn dated_rates(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Json<RateSnapshot>, ApiError> {
    rates_for(&state, &date).await
}

async fn rates_for(state: &AppState, raw_date: &str) -> Result<Json<RateSnapshot>, ApiError> {
    let mut v = Validator::new();
    let date = check_date(&mut v, raw_date);
    if !v.valid() {
        return Err(ApiError::Validation(v));
    }

    state.audit("rates", &format!("date: {raw_date}")).await;

    let snapshot = state.resolver.resolve(date).await?;
    Ok(Json(snapshot))
}

async fn pair(
    State(state): State<Arc<AppState>>,
    Path(raw_pair): Path<String>,
) -> Result<Json<PairQuote>, ApiError> {
    let mut v = Validator::new();
    let pair = check_pair(&mut v, &raw_pair, state.resolver.currencies());
    let Some(pair) = pair else {
        return Err(ApiError::Validation(v));
    };

    state.audit("pair", &format!("pair: {pair}")).await;

    let quote = state.resolver.resolve_pair(&pair).await?;
    Ok(Json(quote))
}

impl AppState {
    async fn audit(&self, kind: &str, request: &str) {
        if let Err(e) = self.requests.record(kind, request).await {
            error!(kind, request, error = %e, "Failed to log request");
        }
    }
}
