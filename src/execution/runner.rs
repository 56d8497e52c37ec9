use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;
use reqwest::Client;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::config::{Channel, Config, EnvConfig};
use crate::data::normalize::{normalize, DayWindow};
use crate::data::odds_api::SourceUnavailableError;
use crate::data::OddsSource;
use crate::notify::{GmailNotifier, LogNotifier, Notifier, NotifierDeliveryError, WebhookNotifier};
use crate::strategies::digest::{build_digest, header_line};
use crate::strategies::favorite::FavoriteSelector;

#[derive(Debug)]
pub enum RunOutcome {
    Delivered { picks: usize },
    /// Header-only digest was still sent
    NothingToReport,
    DeliveryFailed {
        picks: usize,
        error: NotifierDeliveryError,
    },
}

impl RunOutcome {
    pub const EXIT_OK: u8 = 0;
    pub const EXIT_FAILED: u8 = 1;
    pub const EXIT_UNDELIVERED: u8 = 3;

    /// A failed send only fails the process under strict delivery.
    pub fn exit_code(&self, strict_delivery: bool) -> u8 {
        match self {
            RunOutcome::DeliveryFailed { .. } if strict_delivery => Self::EXIT_UNDELIVERED,
            _ => Self::EXIT_OK,
        }
    }

    pub fn delivery_error(&self) -> Option<&NotifierDeliveryError> {
        match self {
            RunOutcome::DeliveryFailed { error, .. } => Some(error),
            _ => None,
        }
    }
}

pub struct Runner {
    source: Box<dyn OddsSource>,
    notifier: Box<dyn Notifier>,
    selector: FavoriteSelector,
    tz: Tz,
    title: String,
    best_bet_footer: bool,
}

impl Runner {
    pub fn new(
        source: Box<dyn OddsSource>,
        notifier: Box<dyn Notifier>,
        config: &Config,
    ) -> Result<Self> {
        Ok(Self {
            source,
            notifier,
            selector: FavoriteSelector::new(config.selector.fallback),
            tz: config.schedule.tz()?,
            title: config.digest.title.clone(),
            best_bet_footer: config.digest.best_bet_footer,
        })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// One full pass: fetch, normalize, select, format, send.
    ///
    /// Only an unavailable or unreadable odds source is an error; a failed send is an outcome.
    pub async fn run_once(&self, date: Option<NaiveDate>) -> Result<RunOutcome> {
        let window = match date {
            Some(date) => DayWindow::for_date(date, self.tz)?,
            None => DayWindow::today(self.tz)?,
        };

        let raw = self
            .source
            .fetch(&window)
            .await
            .context("Odds source unavailable")?;
        let snapshot = normalize(raw, &window);
        if snapshot.nothing_usable() {
            return Err(SourceUnavailableError::NothingUsable(snapshot.total))
                .context("Odds source unavailable");
        }

        let message = build_digest(
            snapshot.games,
            self.selector,
            header_line(&self.title, window.date),
        )
        .into_message(self.best_bet_footer);
        let picks = message.picks.len();

        info!(
            date = %window.date,
            picks,
            channel = self.notifier.channel(),
            "Digest built, sending"
        );

        match self.notifier.send(&message).await {
            Ok(()) if message.is_header_only() => {
                info!("No games with a favorite today");
                Ok(RunOutcome::NothingToReport)
            }
            Ok(()) => Ok(RunOutcome::Delivered { picks }),
            Err(e) => {
                error!(channel = self.notifier.channel(), error = %e, "Digest delivery failed");
                Ok(RunOutcome::DeliveryFailed { picks, error: e })
            }
        }
    }

    /// Run every local day until Ctrl-C; failures are logged and the loop continues.
    pub async fn watch(&self, offset_mins: u32) -> Result<()> {
        loop {
            match self.run_once(None).await {
                Ok(outcome) => info!(?outcome, "Daily run finished"),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    error!(error = %reason, "Daily run failed");
                }
            }

            let next = next_run_at(Utc::now(), self.tz, offset_mins)?;
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            info!(next = %next, "Sleeping until next run");

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                    return Ok(());
                }
            }
        }
    }
}

/// Next local midnight after `now`, plus `offset_mins`.
pub fn next_run_at(now: DateTime<Utc>, tz: Tz, offset_mins: u32) -> Result<DateTime<Utc>> {
    let today = now.with_timezone(&tz).date_naive();
    let offset = Duration::minutes(i64::from(offset_mins));

    let this_day = DayWindow::for_date(today, tz)?;
    if this_day.start + offset > now {
        return Ok(this_day.start + offset);
    }
    Ok(this_day.end + offset)
}

pub fn build_notifier(config: &Config, env: &EnvConfig, dry_run: bool) -> Result<Box<dyn Notifier>> {
    if dry_run {
        info!("Dry run, digest will only be logged");
        return Ok(Box::new(LogNotifier));
    }

    let client = Client::builder()
        .timeout(std::time::Duration::from_secs(config.notifier.timeout_secs))
        .build()
        .context("Failed to build notifier HTTP client")?;

    let notifier: Box<dyn Notifier> = match config.notifier.channel {
        Channel::Gmail => {
            let (sender, recipient) = env.mail_addresses()?;
            let token_path = env
                .gmail_token_path
                .clone()
                .unwrap_or_else(|| config.notifier.token_path.clone());
            if !std::path::Path::new(&token_path).exists() {
                warn!(path = %token_path, "Gmail token file not found, sending will fail");
            }
            Box::new(GmailNotifier::new(
                client,
                PathBuf::from(token_path),
                sender,
                recipient,
                config.notifier.subject.clone(),
            ))
        }
        Channel::Webhook => {
            let url = env.webhook_url.clone().context("WEBHOOK_URL not set")?;
            Box::new(WebhookNotifier::new(client, url))
        }
        Channel::Log => Box::new(LogNotifier),
    };

    Ok(notifier)
}
