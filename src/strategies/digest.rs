use chrono::NaiveDate;

use crate::data::types::Game;
use crate::strategies::favorite::{best_bet, FavoriteSelector};
use crate::strategies::types::{AmericanOdds, Pick};

/// Lazy digest: yields the header line, then one summary line per pick.
///
/// Consuming it is one-shot; the picks seen so far are kept so the final
/// message can report them.
pub struct Digest<I> {
    header: String,
    header_emitted: bool,
    picks: I,
    seen: Vec<Pick>,
}

pub fn header_line(title: &str, date: NaiveDate) -> String {
    format!("{} favorites for {}", title, date.format("%A, %B %-d, %Y"))
}

/// Build the digest for `games`, preserving their order and skipping games without a pick.
pub fn build_digest<G>(
    games: G,
    selector: FavoriteSelector,
    header: String,
) -> Digest<impl Iterator<Item = Pick>>
where
    G: IntoIterator<Item = Game>,
{
    Digest {
        header,
        header_emitted: false,
        picks: games
            .into_iter()
            .filter_map(move |game| selector.pick_favorite(&game)),
        seen: Vec::new(),
    }
}

impl<I: Iterator<Item = Pick>> Iterator for Digest<I> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if !self.header_emitted {
            self.header_emitted = true;
            return Some(self.header.clone());
        }

        let pick = self.picks.next()?;
        let line = pick.summary_line();
        self.seen.push(pick);
        Some(line)
    }
}

impl<I: Iterator<Item = Pick>> Digest<I> {
    /// Drain the remaining lines into a complete message.
    pub fn into_message(mut self, best_bet_footer: bool) -> DigestMessage {
        self.by_ref().for_each(drop);
        let lines = self.seen.iter().map(Pick::summary_line).collect();

        let footer = if best_bet_footer {
            best_bet(&self.seen).map(|pick| {
                format!("Best bet: {} {}", pick.team, AmericanOdds(pick.price))
            })
        } else {
            None
        };

        DigestMessage {
            header: self.header,
            lines,
            footer,
            picks: self.seen,
        }
    }
}

/// The finished text handed to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestMessage {
    pub header: String,
    pub lines: Vec<String>,
    pub footer: Option<String>,
    pub picks: Vec<Pick>,
}

impl DigestMessage {
    pub fn body(&self) -> String {
        let mut body = self.header.clone();
        for line in self.lines.iter().chain(self.footer.iter()) {
            body.push('\n');
            body.push_str(line);
        }
        body
    }

    pub fn is_header_only(&self) -> bool {
        self.picks.is_empty()
    }
}
