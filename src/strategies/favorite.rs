use serde::Deserialize;
use tracing::debug;

use crate::data::types::{Game, Side};
use crate::strategies::types::Pick;

/// What to do when no bookmaker prices either side as a favorite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FallbackPolicy {
    /// Take the lowest price anyway and tag the pick as a close game
    #[default]
    LowestPrice,
    /// Produce no pick
    Skip,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FavoriteSelector {
    fallback: FallbackPolicy,
}

struct Candidate<'a> {
    side: Side,
    price: i32,
    bookmaker: &'a str,
}

impl FavoriteSelector {
    pub fn new(fallback: FallbackPolicy) -> Self {
        Self { fallback }
    }

    /// Pick the favored side of `game`, or `None` when it has no usable quotes.
    ///
    /// The lowest price across every quote and side wins. Quotes are scanned in
    /// input order, home before away, and only a strictly lower price replaces
    /// the current best, so ties go to the earliest bookmaker.
    pub fn pick_favorite(&self, game: &Game) -> Option<Pick> {
        if !game.has_quotes() {
            return None;
        }

        let mut best: Option<Candidate<'_>> = None;

        for quote in &game.quotes {
            for side in Side::BOTH {
                let price = quote.price(side);
                if best.as_ref().map_or(true, |b| price < b.price) {
                    best = Some(Candidate {
                        side,
                        price,
                        bookmaker: &quote.bookmaker,
                    });
                }
            }
        }

        let best = best?;
        let close_game = best.price >= 0;

        if close_game && self.fallback == FallbackPolicy::Skip {
            debug!(
                home = %game.home_team,
                away = %game.away_team,
                "No favorite priced, skipping game"
            );
            return None;
        }

        Some(Pick {
            team: game.team(best.side).to_string(),
            opponent: game.team(best.side.opposite()).to_string(),
            side: best.side,
            price: best.price,
            bookmaker: best.bookmaker.to_string(),
            close_game,
            commence_time: game.commence_time,
        })
    }
}

/// The single lowest-priced pick of the day; ties keep the earlier game.
pub fn best_bet(picks: &[Pick]) -> Option<&Pick> {
    picks
        .iter()
        .reduce(|best, pick| if pick.price < best.price { pick } else { best })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::types::BookmakerQuote;
    use chrono::Utc;

    fn quote(bookmaker: &str, home_price: i32, away_price: i32) -> BookmakerQuote {
        BookmakerQuote {
            bookmaker: bookmaker.to_string(),
            home_price,
            away_price,
        }
    }

    fn game(home: &str, away: &str, quotes: Vec<BookmakerQuote>) -> Game {
        Game {
            id: None,
            home_team: home.to_string(),
            away_team: away.to_string(),
            commence_time: Utc::now(),
            quotes,
        }
    }

    #[test]
    fn test_home_favorite() {
        let g = game("Yankees", "Red Sox", vec![quote("fanduel", -150, 130)]);
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.team, "Yankees");
        assert_eq!(pick.opponent, "Red Sox");
        assert_eq!(pick.price, -150);
        assert!(!pick.close_game);
    }

    #[test]
    fn test_away_favorite() {
        let g = game("Cubs", "Cardinals", vec![quote("fanduel", 105, -110)]);
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.team, "Cardinals");
        assert_eq!(pick.side, Side::Away);
        assert_eq!(pick.price, -110);
    }

    #[test]
    fn test_most_negative_across_bookmakers() {
        let g = game(
            "Dodgers",
            "Giants",
            vec![
                quote("fanduel", -180, 155),
                quote("draftkings", -195, 165),
                quote("betmgm", -175, 150),
            ],
        );
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.team, "Dodgers");
        assert_eq!(pick.price, -195);
        assert_eq!(pick.bookmaker, "draftkings");
    }

    #[test]
    fn test_bookmakers_disagree_on_favorite() {
        let g = game(
            "Mets",
            "Phillies",
            vec![quote("fanduel", -105, -115), quote("draftkings", -120, 100)],
        );
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.team, "Mets");
        assert_eq!(pick.price, -120);
    }

    #[test]
    fn test_tie_prefers_first_bookmaker() {
        let g = game(
            "Braves",
            "Marlins",
            vec![
                quote("fanduel", -200, 170),
                quote("draftkings", -200, 165),
                quote("betmgm", -190, 160),
            ],
        );

        for _ in 0..10 {
            let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();
            assert_eq!(pick.bookmaker, "fanduel");
            assert_eq!(pick.price, -200);
        }
    }

    #[test]
    fn test_all_positive_falls_back_to_lowest() {
        let g = game("Rays", "Orioles", vec![quote("fanduel", 120, 140)]);
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.team, "Rays");
        assert_eq!(pick.price, 120);
        assert!(pick.close_game);
    }

    #[test]
    fn test_even_money_tie_goes_home() {
        let g = game("Rays", "Orioles", vec![quote("fanduel", 100, 100)]);
        let pick = FavoriteSelector::default().pick_favorite(&g).unwrap();

        assert_eq!(pick.side, Side::Home);
        assert!(pick.close_game);
    }

    #[test]
    fn test_skip_policy_drops_close_games() {
        let selector = FavoriteSelector::new(FallbackPolicy::Skip);

        let close = game("Rays", "Orioles", vec![quote("fanduel", 120, 140)]);
        assert!(selector.pick_favorite(&close).is_none());

        let clear = game("Yankees", "Red Sox", vec![quote("fanduel", -150, 130)]);
        assert!(selector.pick_favorite(&clear).is_some());
    }

    #[test]
    fn test_no_quotes_no_pick() {
        let g = game("Twins", "Guardians", vec![]);
        assert!(FavoriteSelector::default().pick_favorite(&g).is_none());
    }

    #[test]
    fn test_pick_is_always_one_of_the_teams() {
        let prices = [-300, -150, -110, -100, 100, 105, 150, 300];
        let selector = FavoriteSelector::default();

        for &home in &prices {
            for &away in &prices {
                let g = game(
                    "Astros",
                    "Rangers",
                    vec![quote("a", home, away), quote("b", away, home)],
                );
                let pick = selector.pick_favorite(&g).unwrap();
                assert!(pick.team == "Astros" || pick.team == "Rangers");
                assert_ne!(pick.team, pick.opponent);
                assert_eq!(pick.price, home.min(away));
            }
        }
    }

    #[test]
    fn test_best_bet() {
        let selector = FavoriteSelector::default();
        let picks: Vec<Pick> = [
            game("Yankees", "Red Sox", vec![quote("fanduel", -150, 130)]),
            game("Cubs", "Cardinals", vec![quote("fanduel", 105, -110)]),
            game("Dodgers", "Giants", vec![quote("fanduel", -150, 130)]),
        ]
        .iter()
        .filter_map(|g| selector.pick_favorite(g))
        .collect();

        assert_eq!(best_bet(&picks).unwrap().team, "Yankees");
        assert!(best_bet(&[]).is_none());
    }
}
