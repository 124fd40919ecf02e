use reqwest::Url;
use serde::Deserialize;
use std::env;
use std::fs;
use std::time::Duration;
use thiserror::Error;

// Used when no news credential is configured; upstream will reject it
pub const PLACEHOLDER_NEWS_TOKEN: &str = "YOUR_CRYPTOPANIC_API_KEY";

const DEFAULT_NODE_NAME: &str = "cryptotrend-proxy";
const DEFAULT_ENVIRONMENT: &str = "development";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_NEWS_API_URL: &str = "https://cryptopanic.com/api/v1/posts/";
const DEFAULT_MARKET_API_URL: &str = "https://api.coingecko.com/api/v3";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid URL for {key}: {reason}")]
    InvalidUrl { key: &'static str, reason: String },
}

// Shape of the CONFIG_FILE YAML document
#[derive(Deserialize, Debug, Default)]
pub struct ConfigYaml {
    pub node_name: Option<String>,
    pub environment: Option<String>,
    pub port: Option<u16>,
    pub news_api_token: Option<String>,
    pub news_api_url: Option<String>,
    pub market_api_url: Option<String>,
    pub upstream_timeout_secs: Option<u64>,
    pub random_user_agent: Option<bool>,
}

/// Outbound API settings handed to the upstream client at construction time.
#[derive(Clone, Debug)]
pub struct UpstreamConfig {
    pub news_api_url: Url,
    pub news_api_token: String,
    pub market_api_url: Url,
    pub timeout: Duration,
    pub random_user_agent: bool,
}

impl UpstreamConfig {
    pub fn uses_placeholder_token(&self) -> bool {
        self.news_api_token == PLACEHOLDER_NEWS_TOKEN
    }
}

// Holds application-wide settings
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub node_name: String,
    pub environment: String,
    pub port: u16,
    pub upstream: UpstreamConfig,
}

impl AppConfig {
    // Load configuration from YAML file or environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(config_file) = env::var("CONFIG_FILE") {
            Self::from_yaml(&config_file)
        } else {
            Self::from_env()
        }
    }

    pub fn from_yaml(file_path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(file_path).map_err(|source| ConfigError::Read {
            path: file_path.to_string(),
            source,
        })?;
        Self::from_yaml_str(&yaml_content)
    }

    pub fn from_yaml_str(yaml_content: &str) -> Result<Self, ConfigError> {
        let yaml_config: ConfigYaml = serde_yaml::from_str(yaml_content)?;
        Self::from_yaml_config(yaml_config)
    }

    fn from_yaml_config(yaml_config: ConfigYaml) -> Result<Self, ConfigError> {
        let news_api_url = yaml_config.news_api_url.as_deref().unwrap_or(DEFAULT_NEWS_API_URL);
        let market_api_url = yaml_config.market_api_url.as_deref().unwrap_or(DEFAULT_MARKET_API_URL);

        Ok(Self {
            node_name: yaml_config.node_name.unwrap_or_else(|| DEFAULT_NODE_NAME.to_string()),
            environment: yaml_config.environment.unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            port: yaml_config.port.unwrap_or(DEFAULT_PORT),
            upstream: UpstreamConfig {
                news_api_url: parse_url("news_api_url", news_api_url)?,
                news_api_token: yaml_config
                    .news_api_token
                    .unwrap_or_else(|| PLACEHOLDER_NEWS_TOKEN.to_string()),
                market_api_url: parse_url("market_api_url", market_api_url)?,
                timeout: Duration::from_secs(
                    yaml_config.upstream_timeout_secs.unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS),
                ),
                random_user_agent: yaml_config.random_user_agent.unwrap_or(true),
            },
        })
    }

    // Load all configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key/value source shaped like the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let news_api_url = lookup("NEWS_API_URL").unwrap_or_else(|| DEFAULT_NEWS_API_URL.to_string());
        let market_api_url =
            lookup("MARKET_API_URL").unwrap_or_else(|| DEFAULT_MARKET_API_URL.to_string());

        let port = lookup("PORT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let upstream_timeout_secs = lookup("UPSTREAM_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECS);

        let random_user_agent = lookup("RANDOM_USER_AGENT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(true);

        Ok(Self {
            node_name: lookup("NODE_NAME").unwrap_or_else(|| DEFAULT_NODE_NAME.to_string()),
            environment: lookup("ENVIRONMENT").unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string()),
            port,
            upstream: UpstreamConfig {
                news_api_url: parse_url("NEWS_API_URL", &news_api_url)?,
                news_api_token: lookup("CRYPTOPANIC_API_KEY")
                    .unwrap_or_else(|| PLACEHOLDER_NEWS_TOKEN.to_string()),
                market_api_url: parse_url("MARKET_API_URL", &market_api_url)?,
                timeout: Duration::from_secs(upstream_timeout_secs),
                random_user_agent,
            },
        })
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::InvalidUrl {
        key,
        reason: format!("{value}: {e}"),
    })?;
    if url.cannot_be_a_base() {
        return Err(ConfigError::InvalidUrl {
            key,
            reason: format!("{value}: not a base URL"),
        });
    }
    Ok(url)
}
