use std::fmt::{Display, Formatter};

use ordinalizer::Ordinal;
use serde::{Deserialize, Serialize};
use strum_macros::{EnumCount, EnumIter};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Score {
    pub home: u8,
    pub away: u8,
}
impl Score {
    pub fn new(home: u8, away: u8) -> Self {
        Self { home, away }
    }

    pub fn nil_all() -> Self {
        Self { home: 0, away: 0 }
    }

    pub fn total(&self) -> u16 {
        self.home as u16 + self.away as u16
    }
}

impl Display for Score {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.home, self.away)
    }
}

/// A pair of values, one per side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sided<T> {
    pub home: T,
    pub away: T,
}
impl<T> Sided<T> {
    pub fn new(home: T, away: T) -> Self {
        Self { home, away }
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Sided<U> {
        Sided {
            home: f(&self.home),
            away: f(&self.away),
        }
    }
}

/// The derived markets evaluated by the replay.
#[derive(
    Clone,
    Copy,
    Debug,
    Hash,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Ordinal,
    EnumCount,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    DoubleChance,
    Over25,
    Over35,
    BothTeamsToScore,
    HomeOver05,
    HomeOver15,
    AwayOver05,
    AwayOver15,
}
impl Market {
    /// Binary markets are yes/no propositions on the score and carry their own calibrator.
    pub fn is_binary(&self) -> bool {
        !matches!(self, Market::DoubleChance)
    }

    /// The "yes" or "over" side of a binary market.
    pub fn affirmative(&self) -> Selection {
        match self {
            Market::DoubleChance => Selection::HomeOrDraw,
            Market::BothTeamsToScore => Selection::Yes,
            _ => Selection::Over,
        }
    }

    /// The "no" or "under" side of a binary market.
    pub fn negative(&self) -> Selection {
        match self {
            Market::DoubleChance => Selection::AwayOrDraw,
            Market::BothTeamsToScore => Selection::No,
            _ => Selection::Under,
        }
    }

    /// Whether the proposition of a binary market holds for `score`.
    pub fn holds(&self, score: &Score) -> bool {
        match self {
            Market::DoubleChance => score.home >= score.away,
            Market::Over25 => score.total() > 2,
            Market::Over35 => score.total() > 3,
            Market::BothTeamsToScore => score.home > 0 && score.away > 0,
            Market::HomeOver05 => score.home > 0,
            Market::HomeOver15 => score.home > 1,
            Market::AwayOver05 => score.away > 0,
            Market::AwayOver15 => score.away > 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Market::DoubleChance => "double_chance",
            Market::Over25 => "ou25",
            Market::Over35 => "ou35",
            Market::BothTeamsToScore => "btts",
            Market::HomeOver05 => "home_over_05",
            Market::HomeOver15 => "home_over_15",
            Market::AwayOver05 => "away_over_05",
            Market::AwayOver15 => "away_over_15",
        }
    }
}

impl Display for Market {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Selection {
    #[serde(rename = "1X")]
    HomeOrDraw,
    #[serde(rename = "X2")]
    AwayOrDraw,
    #[serde(rename = "12")]
    HomeOrAway,
    #[serde(rename = "over")]
    Over,
    #[serde(rename = "under")]
    Under,
    #[serde(rename = "yes")]
    Yes,
    #[serde(rename = "no")]
    No,
}
impl Selection {
    /// Settles the selection against the final score.
    pub fn wins(&self, market: Market, score: &Score) -> bool {
        match self {
            Selection::HomeOrDraw => score.home >= score.away,
            Selection::AwayOrDraw => score.away >= score.home,
            Selection::HomeOrAway => score.home != score.away,
            Selection::Over | Selection::Yes => market.holds(score),
            Selection::Under | Selection::No => !market.holds(score),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Selection::HomeOrDraw => "1X",
            Selection::AwayOrDraw => "X2",
            Selection::HomeOrAway => "12",
            Selection::Over => "over",
            Selection::Under => "under",
            Selection::Yes => "yes",
            Selection::No => "no",
        }
    }
}

impl Display for Selection {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
