use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::data::types::{BookmakerQuote, Game};

const MONEYLINE_MARKET: &str = "h2h";

#[derive(Debug, thiserror::Error)]
pub enum MalformedDataError {
    #[error("record could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("missing or empty field: {0}")]
    MissingField(&'static str),

    #[error("invalid commence_time '{0}'")]
    InvalidTime(String),

    #[error("bookmaker {bookmaker}: no h2h market")]
    NoMoneyline { bookmaker: String },

    #[error("bookmaker {bookmaker}: no price for {team}")]
    MissingPrice { bookmaker: String, team: String },

    #[error("bookmaker {bookmaker}: {value} for {team} is not an American moneyline price")]
    InvalidPrice {
        bookmaker: String,
        team: String,
        value: String,
    },
}

/// The local calendar day, as a half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayWindow {
    pub fn for_date(date: NaiveDate, tz: Tz) -> Result<Self> {
        let next = date
            .succ_opt()
            .with_context(|| format!("No day after {}", date))?;

        Ok(Self {
            date,
            start: local_midnight(date, tz)?,
            end: local_midnight(next, tz)?,
        })
    }

    pub fn today(tz: Tz) -> Result<Self> {
        Self::for_date(Utc::now().with_timezone(&tz).date_naive(), tz)
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

fn local_midnight(date: NaiveDate, tz: Tz) -> Result<DateTime<Utc>> {
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("No midnight on {}", date))?;

    // A few zones skip midnight on DST change; the day then starts an hour later.
    tz.from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Local midnight of {} does not exist in {}", date, tz.name()))
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    home_team: Option<String>,
    #[serde(default)]
    away_team: Option<String>,
    #[serde(default)]
    commence_time: Option<String>,
    #[serde(default)]
    bookmakers: Option<Vec<Value>>,
}

#[derive(Debug, Deserialize)]
struct RawBookmaker {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    markets: Vec<RawMarket>,
}

#[derive(Debug, Deserialize)]
struct RawMarket {
    key: String,
    #[serde(default)]
    outcomes: Vec<RawOutcome>,
}

#[derive(Debug, Deserialize)]
struct RawOutcome {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    price: Value,
}

/// Today's games plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub games: Vec<Game>,
    pub total: usize,
    pub malformed: usize,
    pub outside: usize,
}

impl Snapshot {
    /// The provider sent records but not one of them could be read.
    pub fn nothing_usable(&self) -> bool {
        self.total > 0 && self.malformed == self.total
    }
}

/// Turn the provider snapshot into today's games, in provider order.
///
/// Records outside `window` are skipped. A malformed record drops only that
/// game, and a malformed bookmaker entry drops only that quote.
pub fn normalize(raw: Vec<Value>, window: &DayWindow) -> Snapshot {
    let total = raw.len();
    let mut games = Vec::with_capacity(total);
    let mut malformed = 0usize;
    let mut outside = 0usize;

    for (index, record) in raw.into_iter().enumerate() {
        match parse_game(record) {
            Ok(game) if window.contains(game.commence_time) => games.push(game),
            Ok(game) => {
                outside += 1;
                debug!(
                    home = %game.home_team,
                    away = %game.away_team,
                    commence_time = %game.commence_time,
                    "Skipping game outside today's window"
                );
            }
            Err(e) => {
                malformed += 1;
                warn!(index, error = %e, "Dropping malformed odds record");
            }
        }
    }

    info!(
        date = %window.date,
        total,
        kept = games.len(),
        malformed,
        outside,
        "Normalized odds snapshot"
    );

    Snapshot {
        games,
        total,
        malformed,
        outside,
    }
}

pub fn parse_game(record: Value) -> Result<Game, MalformedDataError> {
    let raw: RawEvent = serde_json::from_value(record)?;

    let home_team = required(raw.home_team, "home_team")?;
    let away_team = required(raw.away_team, "away_team")?;
    let commence = required(raw.commence_time, "commence_time")?;
    let commence_time = DateTime::parse_from_rfc3339(&commence)
        .map_err(|_| MalformedDataError::InvalidTime(commence.clone()))?
        .with_timezone(&Utc);

    let bookmakers = raw.bookmakers.unwrap_or_default();
    let mut quotes = Vec::with_capacity(bookmakers.len());
    for bookmaker in bookmakers {
        match parse_quote(bookmaker, &home_team, &away_team) {
            Ok(quote) => quotes.push(quote),
            Err(e) => debug!(
                home = %home_team,
                away = %away_team,
                error = %e,
                "Dropping unusable bookmaker quote"
            ),
        }
    }

    Ok(Game {
        id: raw.id,
        home_team,
        away_team,
        commence_time,
        quotes,
    })
}

pub fn parse_quote(
    record: Value,
    home_team: &str,
    away_team: &str,
) -> Result<BookmakerQuote, MalformedDataError> {
    let raw: RawBookmaker = serde_json::from_value(record)?;

    let bookmaker = raw
        .key
        .or(raw.title)
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .ok_or(MalformedDataError::MissingField("bookmakers[].key"))?;

    let market = raw
        .markets
        .iter()
        .find(|m| m.key == MONEYLINE_MARKET)
        .ok_or_else(|| MalformedDataError::NoMoneyline {
            bookmaker: bookmaker.clone(),
        })?;

    let home_price = price_for(market, &bookmaker, home_team)?;
    let away_price = price_for(market, &bookmaker, away_team)?;

    Ok(BookmakerQuote {
        bookmaker,
        home_price,
        away_price,
    })
}

fn price_for(market: &RawMarket, bookmaker: &str, team: &str) -> Result<i32, MalformedDataError> {
    let outcome = market
        .outcomes
        .iter()
        .find(|o| o.name.as_deref().map(str::trim) == Some(team))
        .ok_or_else(|| MalformedDataError::MissingPrice {
            bookmaker: bookmaker.to_string(),
            team: team.to_string(),
        })?;

    coerce_american(&outcome.price).ok_or_else(|| MalformedDataError::InvalidPrice {
        bookmaker: bookmaker.to_string(),
        team: team.to_string(),
        value: outcome.price.to_string(),
    })
}

/// Integral price with magnitude of at least 100; numeric strings like "+130" are accepted.
pub fn coerce_american(value: &Value) -> Option<i32> {
    let price = match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => i,
            None => {
                let f = n.as_f64()?;
                if f.fract() != 0.0 {
                    return None;
                }
                f as i64
            }
        },
        Value::String(s) => s.trim().trim_start_matches('+').parse::<i64>().ok()?,
        _ => return None,
    };

    let price = i32::try_from(price).ok()?;
    if price.unsigned_abs() < 100 {
        return None;
    }
    Some(price)
}

fn required(value: Option<String>, field: &'static str) -> Result<String, MalformedDataError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or(MalformedDataError::MissingField(field))
}
