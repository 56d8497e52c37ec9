use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::data::types::Side;

/// The favored side of one game and the best price found for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pick {
    pub team: String,
    pub opponent: String,
    pub side: Side,
    pub price: i32,
    pub bookmaker: String,
    /// No bookmaker had either side negative; picked by the fallback rule
    pub close_game: bool,
    pub commence_time: DateTime<Utc>,
}

impl Pick {
    pub fn summary_line(&self) -> String {
        let mut line = format!(
            "{} {} vs {} ({})",
            self.team,
            AmericanOdds(self.price),
            self.opponent,
            self.bookmaker
        );
        if self.close_game {
            line.push_str(" [close game]");
        }
        line
    }
}

/// Display wrapper that always signs the price: `-150`, `+130`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmericanOdds(pub i32);

impl fmt::Display for AmericanOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:+}", self.0)
    }
}
