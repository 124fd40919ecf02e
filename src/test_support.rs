//! In-process stand-ins for the news and market-data APIs.

use crate::config::UpstreamConfig;
use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use reqwest::Url;
use serde_json::json;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

pub const TEST_NEWS_TOKEN: &str = "test-news-token";

// Trailing zeros and key order must survive relaying untouched
pub const HISTORY_BODY: &str = r#"{"prices":[[1717200000000,67512.50],[1717286400000,68001.00]],"market_caps":[],"total_volumes":[]}"#;
pub const NEWS_BODY: &str = r#"{"count":1,"results":[{"title":"Bitcoin climbs","url":"https://example.com/btc"}]}"#;
pub const COIN_BODY: &str = r#"{"id":"bitcoin","symbol":"btc","market_data":{"current_price":{"usd":68001.00},"market_cap":{"usd":1339000000000},"roi":null,"price_change_percentage_24h":-0.70}}"#;
pub const MARKETS_BODY: &str = r#"[{"id":"bitcoin","symbol":"btc"},{"id":"ethereum","symbol":"eth"}]"#;

pub async fn spawn_mock(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Accepts connections and never answers them.
pub async fn spawn_stalled() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn upstream_config(addr: SocketAddr) -> UpstreamConfig {
    UpstreamConfig {
        news_api_url: Url::parse(&format!("http://{addr}/api/v1/posts/")).unwrap(),
        news_api_token: TEST_NEWS_TOKEN.to_string(),
        market_api_url: Url::parse(&format!("http://{addr}/api/v3")).unwrap(),
        timeout: Duration::from_secs(5),
        random_user_agent: true,
    }
}

pub fn mock_upstream() -> Router {
    Router::new()
        .route("/api/v1/posts/", get(news))
        .route("/api/v3/coins/markets", get(markets))
        .route("/api/v3/coins/{id}", get(coin))
        .route("/api/v3/coins/{id}/market_chart", get(market_chart))
        .route("/api/v3/simple/price", get(simple_price))
}

fn raw_json(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}

fn is_browser(headers: &HeaderMap) -> bool {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|agent| agent.starts_with("Mozilla/5.0"))
}

async fn news(Query(query): Query<HashMap<String, String>>) -> Response {
    let authorized = query.get("auth_token").map(String::as_str) == Some(TEST_NEWS_TOKEN);
    if !authorized || query.get("public").map(String::as_str) != Some("true") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"status": "Incomplete", "info": "Token not found"})),
        )
            .into_response();
    }
    raw_json(NEWS_BODY)
}

async fn market_chart(
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !is_browser(&headers) || query.get("vs_currency").map(String::as_str) != Some("usd") {
        return (StatusCode::FORBIDDEN, "blocked").into_response();
    }
    let days = query.get("days").cloned().unwrap_or_default();
    match (id.as_str(), days.as_str()) {
        ("bitcoin", "30") => raw_json(HISTORY_BODY),
        ("unknown-coin", _) => {
            (StatusCode::NOT_FOUND, Json(json!({"error": "coin not found"}))).into_response()
        }
        ("garbled", _) => raw_json("<html>rate limited</html>"),
        _ => Json(json!({"id": id.as_str(), "days": days.as_str()})).into_response(),
    }
}

async fn coin(Path(id): Path<String>, headers: HeaderMap) -> Response {
    if !is_browser(&headers) {
        return (StatusCode::FORBIDDEN, "blocked").into_response();
    }
    match id.as_str() {
        "bitcoin" => raw_json(COIN_BODY),
        _ => (StatusCode::NOT_FOUND, Json(json!({"error": "coin not found"}))).into_response(),
    }
}

async fn markets(Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    let expected = query.get("order").map(String::as_str) == Some("market_cap_desc")
        && query.get("vs_currency").map(String::as_str) == Some("usd");
    if !is_browser(&headers) || !expected {
        return (StatusCode::FORBIDDEN, "blocked").into_response();
    }
    match (query.get("per_page").map(String::as_str), query.get("page").map(String::as_str)) {
        (Some("20"), Some("1")) => raw_json(MARKETS_BODY),
        _ => Json(json!({"per_page": query.get("per_page"), "page": query.get("page")})).into_response(),
    }
}

async fn simple_price(Query(query): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    if !is_browser(&headers) || query.get("include_24hr_change").map(String::as_str) != Some("true") {
        return (StatusCode::FORBIDDEN, "blocked").into_response();
    }
    let ids = query.get("ids").cloned().unwrap_or_default();
    let prices: serde_json::Map<String, serde_json::Value> = ids
        .split(',')
        .filter(|id| !id.is_empty())
        .map(|id| (id.to_string(), json!({"usd": 1.0, "usd_24h_change": 0.5})))
        .collect();
    Json(serde_json::Value::Object(prices)).into_response()
}
