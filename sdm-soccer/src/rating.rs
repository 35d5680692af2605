//! Externally supplied team ratings, keyed by league, round and team name.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::data::LeagueId;

/// Round key assumed for contests that carry no round.
pub const DEFAULT_ROUND: &str = "R";

/// JSON layout: `{ "<league id>": { "<round>": { "<team name>": rating } } }`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RatingArchive {
    leagues: FxHashMap<String, FxHashMap<String, FxHashMap<String, f64>>>,
}
impl RatingArchive {
    pub fn insert(&mut self, league: LeagueId, round: &str, team: &str, rating: f64) {
        self.leagues
            .entry(league.to_string())
            .or_default()
            .entry(round.to_string())
            .or_default()
            .insert(team.to_string(), rating);
    }

    pub fn rating(&self, league: LeagueId, round: Option<&str>, team: &str) -> Option<f64> {
        self.leagues
            .get(&league.to_string())?
            .get(round.unwrap_or(DEFAULT_ROUND))?
            .get(team)
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.leagues.is_empty()
    }
}
