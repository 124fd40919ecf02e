use crate::data_structures::{AppState, SharedServiceInfo, SharedUpstream};
use crate::error::ApiError;
use crate::trend::{self, MultiTimeframePrices, TrendPrediction};
use crate::upstream::{self, RawJson};
use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

const DEFAULT_ASSET_ID: &str = "bitcoin";
const DEFAULT_HISTORY_DAYS: u32 = 30;
const DEFAULT_MARKETS_PER_PAGE: u32 = 20;

fn default_asset_id() -> String {
    DEFAULT_ASSET_ID.to_string()
}

fn default_history_days() -> u32 {
    DEFAULT_HISTORY_DAYS
}

fn default_per_page() -> u32 {
    DEFAULT_MARKETS_PER_PAGE
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
    #[serde(default = "default_asset_id")]
    pub id: String,
    #[serde(default = "default_history_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct CoinParams {
    #[serde(default = "default_asset_id")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct MarketsParams {
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    #[serde(default = "default_page")]
    pub page: u32,
}

#[derive(Debug, Deserialize)]
pub struct PriceParams {
    // Comma-separated CoinGecko ids
    #[serde(default = "default_asset_id")]
    pub ids: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub node: String,
    pub environment: String,
    pub uptime_secs: u64,
    pub timestamp: DateTime<Utc>,
}

/// Builds the public HTTP surface. Cross-origin requests are accepted from
/// any origin with credentials, so origin, method and headers are mirrored
/// back instead of answered with `*`.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true);

    Router::new()
        .route("/predict", post(predict_handler))
        .route("/news", get(news_handler))
        .route("/coingecko-history", get(coingecko_history_handler))
        .route("/coingecko-coin", get(coingecko_coin_handler))
        .route("/coingecko-markets", get(coingecko_markets_handler))
        .route("/coingecko-price", get(coingecko_price_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

fn invalid_query(rejection: QueryRejection) -> ApiError {
    warn!(reason = %rejection.body_text(), "Rejected query string");
    ApiError::InvalidInput(rejection.body_text())
}

// Ids become a URL path segment upstream
fn checked_asset_id(id: &str) -> Result<&str, ApiError> {
    if upstream::is_valid_path_segment(id) {
        Ok(id)
    } else {
        warn!(id, "Rejected asset id");
        Err(ApiError::InvalidInput(format!("invalid asset id: {id:?}")))
    }
}

#[instrument(skip_all)]
pub async fn predict_handler(
    payload: Result<Json<MultiTimeframePrices>, JsonRejection>,
) -> Result<Json<TrendPrediction>, ApiError> {
    let Json(prices) = payload.map_err(|rejection| {
        warn!(reason = %rejection.body_text(), "Rejected predict payload");
        ApiError::InvalidInput(rejection.body_text())
    })?;

    debug!(
        points_1d = prices.prices_1d.len(),
        points_7d = prices.prices_7d.len(),
        points_30d = prices.prices_30d.len(),
        "Received predict request"
    );

    let prediction = trend::predict(&prices);
    info!(?prediction, "Returning trend prediction");
    Ok(Json(prediction))
}

#[instrument(skip_all)]
pub async fn news_handler(State(upstream): State<SharedUpstream>) -> Result<Json<RawJson>, ApiError> {
    debug!("Received request for news");
    let body = upstream.fetch_news().await?;
    Ok(Json(body))
}

#[instrument(skip_all)]
pub async fn coingecko_history_handler(
    State(upstream): State<SharedUpstream>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<RawJson>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;
    debug!(id = %params.id, days = params.days, "Received request for market history");

    let id = checked_asset_id(&params.id)?;
    let body = upstream.fetch_market_history(id, params.days).await?;
    Ok(Json(body))
}

#[instrument(skip_all)]
pub async fn coingecko_coin_handler(
    State(upstream): State<SharedUpstream>,
    params: Result<Query<CoinParams>, QueryRejection>,
) -> Result<Json<RawJson>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;
    debug!(id = %params.id, "Received request for coin detail");

    let id = checked_asset_id(&params.id)?;
    let body = upstream.fetch_coin(id).await?;
    Ok(Json(body))
}

#[instrument(skip_all)]
pub async fn coingecko_markets_handler(
    State(upstream): State<SharedUpstream>,
    params: Result<Query<MarketsParams>, QueryRejection>,
) -> Result<Json<RawJson>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;
    debug!(per_page = params.per_page, page = params.page, "Received request for market listing");

    let body = upstream.fetch_markets(params.per_page, params.page).await?;
    Ok(Json(body))
}

#[instrument(skip_all)]
pub async fn coingecko_price_handler(
    State(upstream): State<SharedUpstream>,
    params: Result<Query<PriceParams>, QueryRejection>,
) -> Result<Json<RawJson>, ApiError> {
    let Query(params) = params.map_err(invalid_query)?;
    debug!(ids = %params.ids, "Received request for spot prices");

    let body = upstream.fetch_simple_price(&params.ids).await?;
    Ok(Json(body))
}

pub async fn health_handler(State(service): State<SharedServiceInfo>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        node: service.node_name.clone(),
        environment: service.environment.clone(),
        uptime_secs: service.started_at.elapsed().as_secs(),
        timestamp: Utc::now(),
    })
}
