use crate::config::UpstreamConfig;
use rand::seq::IndexedRandom;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde_json::value::RawValue;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Upstream JSON relayed as-is. The body is validated as JSON but never
/// re-encoded, so key order and number formatting survive the round trip.
pub type RawJson = Box<RawValue>;

const SERVICE_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const BROWSER_USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.3 Safari/605.1.15",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
];

const QUOTE_CURRENCY: &str = "usd";

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{}", error_chain(.0))]
    Request(reqwest::Error),
    #[error("upstream returned {status} for {endpoint}")]
    Status { status: StatusCode, endpoint: String },
    #[error("cannot build upstream URL from {0}")]
    InvalidUrl(String),
    #[error("{0:?} is not a usable path segment")]
    InvalidSegment(String),
}

// The request URL may carry the news credential, so it is dropped here
impl From<reqwest::Error> for UpstreamError {
    fn from(error: reqwest::Error) -> Self {
        UpstreamError::Request(error.without_url())
    }
}

/// URL path handling would drop these or resolve them against the parent,
/// silently changing which upstream endpoint is hit.
pub fn is_valid_path_segment(segment: &str) -> bool {
    !matches!(segment, "" | "." | "..")
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Read-only client for the news aggregator and the market-data API.
pub struct UpstreamClient {
    client: Client,
    news_api_url: Url,
    news_api_token: String,
    market_api_url: Url,
    random_agent: bool,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(SERVICE_USER_AGENT)
            .build()?;

        Ok(UpstreamClient {
            client,
            news_api_url: config.news_api_url.clone(),
            news_api_token: config.news_api_token.clone(),
            market_api_url: config.market_api_url.clone(),
            random_agent: config.random_user_agent,
        })
    }

    fn browser_user_agent(&self) -> &'static str {
        if self.random_agent {
            BROWSER_USER_AGENTS
                .choose(&mut rand::rng())
                .copied()
                .unwrap_or(BROWSER_USER_AGENTS[0])
        } else {
            BROWSER_USER_AGENTS[0]
        }
    }

    fn market_url(&self, segments: &[&str]) -> Result<Url, UpstreamError> {
        if let Some(bad) = segments.iter().find(|s| !is_valid_path_segment(s)) {
            return Err(UpstreamError::InvalidSegment(bad.to_string()));
        }
        let mut url = self.market_api_url.clone();
        url.path_segments_mut()
            .map_err(|_| UpstreamError::InvalidUrl(self.market_api_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json(
        &self,
        url: Url,
        query: &[(&str, &str)],
        browser_agent: Option<&str>,
    ) -> Result<RawJson, UpstreamError> {
        let endpoint = url.path().to_string();
        let started = Instant::now();

        let mut request = self
            .client
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json");
        if let Some(agent) = browser_agent {
            request = request
                .header(USER_AGENT, agent)
                .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9");
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let error = UpstreamError::from(e);
                warn!(%endpoint, %error, "Upstream request failed");
                return Err(error);
            }
        };

        let status = response.status();
        debug!(%endpoint, %status, elapsed_ms = started.elapsed().as_millis() as u64, "Upstream responded");

        if !status.is_success() {
            warn!(%endpoint, %status, "Upstream returned non-success status");
            return Err(UpstreamError::Status { status, endpoint });
        }

        match response.json::<RawJson>().await {
            Ok(body) => {
                info!(%endpoint, bytes = body.get().len(), elapsed_ms = started.elapsed().as_millis() as u64, "Relaying upstream body");
                Ok(body)
            }
            Err(e) => {
                let error = UpstreamError::from(e);
                warn!(%endpoint, %error, "Upstream body is not valid JSON");
                Err(error)
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn fetch_news(&self) -> Result<RawJson, UpstreamError> {
        let query = [("auth_token", self.news_api_token.as_str()), ("public", "true")];
        self.get_json(self.news_api_url.clone(), &query, None).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_market_history(&self, id: &str, days: u32) -> Result<RawJson, UpstreamError> {
        let url = self.market_url(&["coins", id, "market_chart"])?;
        let days = days.to_string();
        let query = [("vs_currency", QUOTE_CURRENCY), ("days", days.as_str())];
        self.get_json(url, &query, Some(self.browser_user_agent())).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_coin(&self, id: &str) -> Result<RawJson, UpstreamError> {
        let url = self.market_url(&["coins", id])?;
        self.get_json(url, &[], Some(self.browser_user_agent())).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_markets(&self, per_page: u32, page: u32) -> Result<RawJson, UpstreamError> {
        let url = self.market_url(&["coins", "markets"])?;
        let per_page = per_page.to_string();
        let page = page.to_string();
        let query = [
            ("vs_currency", QUOTE_CURRENCY),
            ("order", "market_cap_desc"),
            ("per_page", per_page.as_str()),
            ("page", page.as_str()),
        ];
        self.get_json(url, &query, Some(self.browser_user_agent())).await
    }

    #[instrument(skip(self))]
    pub async fn fetch_simple_price(&self, ids: &str) -> Result<RawJson, UpstreamError> {
        let url = self.market_url(&["simple", "price"])?;
        let query = [
            ("ids", ids),
            ("vs_currencies", QUOTE_CURRENCY),
            ("include_24hr_change", "true"),
        ];
        self.get_json(url, &query, Some(self.browser_user_agent())).await
    }
}
