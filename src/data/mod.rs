pub mod normalize;
pub mod odds_api;
pub mod types;

use async_trait::async_trait;
use serde_json::Value;

use normalize::DayWindow;
use odds_api::{OddsApiClient, SourceUnavailableError};

/// Pull-only snapshot of the day's games, untyped and untrusted.
#[async_trait]
pub trait OddsSource: Send + Sync {
    async fn fetch(&self, window: &DayWindow) -> Result<Vec<Value>, SourceUnavailableError>;
}

#[async_trait]
impl OddsSource for OddsApiClient {
    async fn fetch(&self, window: &DayWindow) -> Result<Vec<Value>, SourceUnavailableError> {
        self.fetch_odds(window).await
    }
}
