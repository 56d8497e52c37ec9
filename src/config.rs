use anyhow::{Context, Result};
use chrono_tz::Tz;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use crate::strategies::favorite::FallbackPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub odds: OddsConfig,
    pub schedule: ScheduleConfig,
    pub selector: SelectorConfig,
    pub digest: DigestConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OddsConfig {
    pub base_url: String,
    /// League identifier, e.g. `baseball_mlb`
    pub sport: String,
    pub regions: String,
    /// Empty means every bookmaker the provider has for the region
    pub bookmakers: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for OddsConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.the-odds-api.com/v4".to_string(),
            sport: "baseball_mlb".to_string(),
            regions: "us".to_string(),
            bookmakers: vec!["fanduel".to_string()],
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// IANA zone that defines "today"
    pub timezone: String,
    /// Minutes after local midnight to run in `--watch` mode
    pub run_at_offset_mins: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: "US/Eastern".to_string(),
            run_at_offset_mins: 0,
        }
    }
}

impl ScheduleConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!("Invalid schedule.timezone '{}': {}", self.timezone, e))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DigestConfig {
    pub title: String,
    pub best_bet_footer: bool,
}

impl Default for DigestConfig {
    fn default() -> Self {
        Self {
            title: "MLB".to_string(),
            best_bet_footer: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    #[default]
    Gmail,
    Webhook,
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub channel: Channel,
    pub subject: Option<String>,
    pub token_path: String,
    /// Exit non-zero when the send attempt fails
    pub strict_delivery: bool,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            channel: Channel::Gmail,
            subject: None,
            token_path: "token.json".to_string(),
            strict_delivery: false,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub odds_api_key: String,
    pub sender_email: Option<String>,
    pub recipient_email: Option<String>,
    pub webhook_url: Option<String>,
    pub gmail_token_path: Option<String>,
    pub dry_run: bool,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Falls back to defaults when `path` does not exist.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!(path, "No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.schedule.tz()?;

        if self.odds.sport.trim().is_empty() {
            anyhow::bail!("odds.sport must not be empty");
        }
        if self.odds.timeout_secs == 0 || self.notifier.timeout_secs == 0 {
            anyhow::bail!("timeouts must be at least one second");
        }
        if self.schedule.run_at_offset_mins >= 24 * 60 {
            anyhow::bail!("schedule.run_at_offset_mins must be less than a day");
        }

        Ok(())
    }
}

impl EnvConfig {
    pub fn load() -> Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            odds_api_key: non_empty_var("ODDS_API_KEY").context("ODDS_API_KEY not set")?,
            sender_email: non_empty_var("SENDER_EMAIL"),
            recipient_email: non_empty_var("RECIPIENT_EMAIL"),
            webhook_url: non_empty_var("WEBHOOK_URL"),
            gmail_token_path: non_empty_var("GMAIL_TOKEN_PATH"),
            dry_run: std::env::var("DRY_RUN")
                .unwrap_or_else(|_| "false".to_string())
                .parse()
                .unwrap_or(false),
        })
    }

    /// Sender and recipient for the gmail channel, both validated.
    pub fn mail_addresses(&self) -> Result<(String, String)> {
        let sender = self
            .sender_email
            .clone()
            .context("SENDER_EMAIL not set")?;
        let recipient = self
            .recipient_email
            .clone()
            .context("RECIPIENT_EMAIL not set")?;

        for address in [&sender, &recipient] {
            if !is_valid_address(address) {
                anyhow::bail!("Not a valid email address: {}", address);
            }
        }

        Ok((sender, recipient))
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Loose address check; SMS gateway aliases like `5551234567@vtext.com` pass.
static ADDRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s<>]+@[^@\s<>]+\.[A-Za-z]{2,}$").expect("address pattern compiles")
});

pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.odds.sport, "baseball_mlb");
        assert_eq!(config.odds.bookmakers, vec!["fanduel".to_string()]);
        assert_eq!(config.schedule.timezone, "US/Eastern");
        assert_eq!(config.selector.fallback, FallbackPolicy::LowestPrice);
        assert_eq!(config.notifier.channel, Channel::Gmail);
        assert!(!config.notifier.strict_delivery);
    }

    #[test]
    fn test_partial_config_overrides() {
        let config = Config::parse(
            r#"
            [odds]
            sport = "basketball_nba"
            bookmakers = []

            [selector]
            fallback = "skip"

            [notifier]
            channel = "webhook"
            strict_delivery = true
            "#,
        )
        .unwrap();

        assert_eq!(config.odds.sport, "basketball_nba");
        assert!(config.odds.bookmakers.is_empty());
        assert_eq!(config.odds.regions, "us");
        assert_eq!(config.selector.fallback, FallbackPolicy::Skip);
        assert_eq!(config.notifier.channel, Channel::Webhook);
        assert!(config.notifier.strict_delivery);
    }

    #[test]
    fn test_invalid_timezone_rejected() {
        let result = Config::parse("[schedule]\ntimezone = \"Mars/Olympus\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[digest]\ntitle = \"NHL\"\nbest_bet_footer = true").unwrap();

        let config = Config::load(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.digest.title, "NHL");
        assert!(config.digest.best_bet_footer);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Config::load_or_default("/definitely/not/here/config.toml").unwrap();
        assert_eq!(config.digest.title, "MLB");
    }

    #[test]
    fn test_address_validation() {
        assert!(is_valid_address("me@example.com"));
        assert!(is_valid_address("5551234567@vtext.com"));
        assert!(!is_valid_address("not-an-address"));
        assert!(!is_valid_address("two@@example.com"));
        assert!(!is_valid_address("spaced out@example.com"));
        assert!(!is_valid_address("<me@example.com>"));
    }

    #[test]
    fn test_blank_api_key_rejected() {
        std::env::set_var("ODDS_API_KEY", "   ");
        let blank = EnvConfig::load();

        std::env::set_var("ODDS_API_KEY", " abc123 ");
        let set = EnvConfig::load();
        std::env::remove_var("ODDS_API_KEY");

        let err = blank.unwrap_err();
        assert!(err.to_string().contains("ODDS_API_KEY not set"));
        assert_eq!(set.unwrap().odds_api_key, "abc123");
    }
}
