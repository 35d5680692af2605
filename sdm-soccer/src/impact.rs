//! Roster-impact assessment of absent players.

use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::data::{LeagueMeta, PlayerId, PlayerRef, RosterContext};

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ImpactTag {
    TopScorer,
    TopAssist,
    TopDefender,
    TopGoalkeeper,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbsenceImpact {
    pub player_id: Option<PlayerId>,
    pub name: String,
    pub tags: Vec<ImpactTag>,
    pub offensive: f64,
    pub defensive: f64,
}

/// Offensive and defensive impact of one side's absences. Both totals are non-negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ImpactAssessment {
    pub offensive: f64,
    pub defensive: f64,
    pub absences: Vec<AbsenceImpact>,
}

pub trait ImpactModel {
    fn assess(&self, roster: &RosterContext, meta: &LeagueMeta) -> ImpactAssessment;
}

/// Assesses nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoImpact;

impl ImpactModel for NoImpact {
    fn assess(&self, _roster: &RosterContext, _meta: &LeagueMeta) -> ImpactAssessment {
        ImpactAssessment::default()
    }
}

/// Scores absences against the league's leaderboards, nudged by the absentee's own rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyPlayerImpact {
    pub top_scorer: f64,
    pub top_assist: f64,
    pub top_defender: f64,
    pub top_goalkeeper: f64,
    /// Rating of an average player; absentees rated below it raise the impact.
    pub reference_rating: f64,
    pub rating_scale: f64,
    pub max_rating_nudge: f64,
}

impl Default for KeyPlayerImpact {
    fn default() -> Self {
        Self {
            top_scorer: 1.0,
            top_assist: 0.5,
            top_defender: 0.8,
            top_goalkeeper: 1.2,
            reference_rating: 7.5,
            rating_scale: 10.0,
            max_rating_nudge: 0.5,
        }
    }
}

/// Lowercased and trimmed, with diacritics stripped after canonical decomposition, so that
/// "Mbappé" and "Mbappe" compare equal.
pub fn normalise_player_name(name: &str) -> String {
    name.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

/// Membership by id, falling back to the normalised name.
fn listed(list: &[PlayerRef], player: &PlayerRef) -> bool {
    if let Some(id) = player.id {
        if list.iter().any(|entry| entry.id == Some(id)) {
            return true;
        }
    }
    let name = normalise_player_name(player.name.as_deref().unwrap_or_default());
    !name.is_empty()
        && list
            .iter()
            .any(|entry| entry.name.as_deref().map(normalise_player_name).as_deref() == Some(name.as_str()))
}

fn resolve_name(player: &PlayerRef, roster: &RosterContext, meta: &LeagueMeta) -> String {
    if let Some(name) = &player.name {
        return name.clone();
    }
    if let Some(id) = player.id {
        let from_ratings = roster
            .ratings
            .iter()
            .find(|rating| rating.id == id)
            .and_then(|rating| rating.name.clone());
        let from_meta = || {
            meta.top_scorers
                .iter()
                .chain(meta.top_assists.iter())
                .find(|entry| entry.id == Some(id))
                .and_then(|entry| entry.name.clone())
        };
        from_ratings.or_else(from_meta).unwrap_or_else(|| format!("#{id}"))
    } else {
        "unknown".to_string()
    }
}

impl ImpactModel for KeyPlayerImpact {
    fn assess(&self, roster: &RosterContext, meta: &LeagueMeta) -> ImpactAssessment {
        let mut assessment = ImpactAssessment::default();
        for player in &roster.absences {
            let (mut offensive, mut defensive) = (0.0, 0.0);
            let mut tags = vec![];
            for (tag, list, weight, is_offensive) in [
                (ImpactTag::TopScorer, &meta.top_scorers, self.top_scorer, true),
                (ImpactTag::TopAssist, &meta.top_assists, self.top_assist, true),
                (ImpactTag::TopDefender, &meta.top_defenders, self.top_defender, false),
                (ImpactTag::TopGoalkeeper, &meta.top_goalkeepers, self.top_goalkeeper, false),
            ] {
                if listed(list, player) {
                    tags.push(tag);
                    if is_offensive {
                        offensive += weight;
                    } else {
                        defensive += weight;
                    }
                }
            }

            let rating = player
                .id
                .and_then(|id| roster.ratings.iter().find(|rating| rating.id == id))
                .and_then(|rating| rating.rating)
                .filter(|rating| rating.is_finite());
            if let Some(rating) = rating {
                let nudge = ((self.reference_rating - rating) / self.rating_scale)
                    .clamp(-self.max_rating_nudge, self.max_rating_nudge);
                offensive += nudge;
                defensive += nudge / 2.0;
            }

            assessment.offensive += offensive;
            assessment.defensive += defensive;
            assessment.absences.push(AbsenceImpact {
                player_id: player.id,
                name: resolve_name(player, roster, meta),
                tags,
                offensive,
                defensive,
            });
        }
        assessment.offensive = f64::max(0.0, assessment.offensive);
        assessment.defensive = f64::max(0.0, assessment.defensive);
        assessment
    }
}
