use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::OddsConfig;
use crate::data::normalize::DayWindow;

const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, thiserror::Error)]
pub enum SourceUnavailableError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Odds request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Odds API rejected the API key ({0})")]
    Unauthorized(StatusCode),

    #[error("Odds API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Odds payload is not a list of games: {0}")]
    Payload(String),

    #[error("None of the {0} odds records could be read")]
    NothingUsable(usize),
}

/// Pull-only client for The Odds API moneyline snapshot.
pub struct OddsApiClient {
    client: Client,
    config: OddsConfig,
    api_key: String,
}

impl OddsApiClient {
    pub fn new(config: OddsConfig, api_key: String) -> Result<Self, SourceUnavailableError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(SourceUnavailableError::Client)?;

        Ok(Self {
            client,
            config,
            api_key,
        })
    }

    pub fn sport(&self) -> &str {
        &self.config.sport
    }

    pub fn odds_url(&self) -> String {
        format!(
            "{}/sports/{}/odds",
            self.config.base_url.trim_end_matches('/'),
            self.config.sport
        )
    }

    /// Query parameters for one local day; `commenceTimeTo` is inclusive upstream.
    pub fn query(&self, window: &DayWindow) -> Vec<(&'static str, String)> {
        let last_second = window.end - chrono::Duration::seconds(1);

        let mut params = vec![
            ("apiKey", self.api_key.clone()),
            ("regions", self.config.regions.clone()),
            ("markets", "h2h".to_string()),
            ("oddsFormat", "american".to_string()),
            ("dateFormat", "iso".to_string()),
            (
                "commenceTimeFrom",
                window.start.format(QUERY_TIME_FORMAT).to_string(),
            ),
            (
                "commenceTimeTo",
                last_second.format(QUERY_TIME_FORMAT).to_string(),
            ),
        ];

        if !self.config.bookmakers.is_empty() {
            params.push(("bookmakers", self.config.bookmakers.join(",")));
        }

        params
    }

    /// Fetch the raw snapshot of games commencing inside `window`.
    ///
    /// Records are returned untyped; an empty list means nothing is scheduled.
    pub async fn fetch_odds(&self, window: &DayWindow) -> Result<Vec<Value>, SourceUnavailableError> {
        let url = self.odds_url();
        info!(sport = %self.config.sport, date = %window.date, "Fetching odds");

        let response = self
            .client
            .get(&url)
            .query(&self.query(window))
            .send()
            .await
            .map_err(SourceUnavailableError::Request)?;

        let status = response.status();
        if let Some(remaining) = header_str(&response, "x-requests-remaining") {
            debug!(
                remaining,
                used = header_str(&response, "x-requests-used").unwrap_or("?"),
                "Odds API quota"
            );
        }

        let body = response
            .text()
            .await
            .map_err(SourceUnavailableError::Request)?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SourceUnavailableError::Unauthorized(status));
        }
        if !status.is_success() {
            return Err(SourceUnavailableError::Status {
                status,
                body: snippet(&body),
            });
        }

        let records = parse_payload(&body)?;
        info!(records = records.len(), "Odds snapshot received");
        Ok(records)
    }
}

fn header_str<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

pub fn parse_payload(body: &str) -> Result<Vec<Value>, SourceUnavailableError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(records)) => Ok(records),
        Ok(other) => Err(SourceUnavailableError::Payload(snippet(&other.to_string()))),
        Err(e) => Err(SourceUnavailableError::Payload(e.to_string())),
    }
}

fn snippet(body: &str) -> String {
    body.trim()
        .replace(['\n', '\r'], " ")
        .chars()
        .take(200)
        .collect()
}
