use chrono::{DateTime, Utc};
use serde::Serialize;

/// One scheduled matchup for the current day.
#[derive(Debug, Clone, Serialize)]
pub struct Game {
    pub id: Option<String>,
    pub home_team: String,
    pub away_team: String,
    pub commence_time: DateTime<Utc>,
    /// Usable quotes only, in the provider's bookmaker order
    pub quotes: Vec<BookmakerQuote>,
}

impl Game {
    pub fn team(&self, side: Side) -> &str {
        match side {
            Side::Home => &self.home_team,
            Side::Away => &self.away_team,
        }
    }

    pub fn has_quotes(&self) -> bool {
        !self.quotes.is_empty()
    }
}

/// A bookmaker's moneyline for both sides of a game, American odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmakerQuote {
    pub bookmaker: String,
    pub home_price: i32,
    pub away_price: i32,
}

impl BookmakerQuote {
    pub fn price(&self, side: Side) -> i32 {
        match side {
            Side::Home => self.home_price,
            Side::Away => self.away_price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    Home,
    Away,
}

impl Side {
    /// Examination order inside one quote
    pub const BOTH: [Side; 2] = [Side::Home, Side::Away];

    pub fn opposite(self) -> Self {
        match self {
            Side::Home => Side::Away,
            Side::Away => Side::Home,
        }
    }
}
