//! Validated contest records.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::domain::{Score, Sided};

pub type FixtureId = u64;
pub type TeamId = u64;
pub type LeagueId = u64;
pub type PlayerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
}

/// A player reference as it appears in absence lists and league leaderboards. Either key may
/// be missing in the source data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlayerRef {
    pub id: Option<PlayerId>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRating {
    pub id: PlayerId,
    pub name: Option<String>,
    pub rating: Option<f64>,
}

/// Roster information for one side of a contest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RosterContext {
    pub absences: Vec<PlayerRef>,
    pub ratings: Vec<PlayerRating>,
}

/// League-wide reference lists for the players of one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeagueMeta {
    pub top_scorers: Vec<PlayerRef>,
    pub top_assists: Vec<PlayerRef>,
    pub top_defenders: Vec<PlayerRef>,
    pub top_goalkeepers: Vec<PlayerRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsOutcome {
    pub name: String,
    pub price: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OddsMarket {
    pub name: String,
    pub outcomes: Vec<OddsOutcome>,
}

/// Market prices quoted for a contest. Bookmaker bets are flattened after any explicitly
/// listed markets, preserving their order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OddsPayload {
    pub markets: Vec<OddsMarket>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contest {
    pub id: FixtureId,
    pub date: DateTime<FixedOffset>,
    pub status: Option<String>,
    pub league: LeagueId,
    pub round: Option<String>,
    pub teams: Sided<Team>,
    pub goals: Sided<Option<u8>>,
    pub expected_goals: Sided<Option<f64>>,
    pub context: Option<Sided<RosterContext>>,
    pub meta: Sided<Option<LeagueMeta>>,
    pub odds: Option<OddsPayload>,
}
impl Contest {
    /// The final score, if both sides have one.
    pub fn score(&self) -> Option<Score> {
        match (self.goals.home, self.goals.away) {
            (Some(home), Some(away)) => Some(Score::new(home, away)),
            _ => None,
        }
    }

    /// The per-side scoring observation: expected goals where recorded, otherwise goals.
    pub fn scoring_observation(&self) -> Option<Sided<f64>> {
        let score = self.score()?;
        Some(Sided::new(
            self.expected_goals.home.unwrap_or(score.home as f64),
            self.expected_goals.away.unwrap_or(score.away as f64),
        ))
    }
}
