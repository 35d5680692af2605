//! Seeded synthetic seasons for benchmarking and smoke-testing the replay.
//!
//! Each team draws a multiplicative attack and defence strength. Fixtures follow a double
//! round-robin (the circle method, with a bye for odd team counts); goals are Poisson-sampled
//! from the implied rates and bookmaker prices are the fair prices of the independent score grid
//! with a uniform overround.

use anyhow::bail;
use chrono::{Duration, FixedOffset, TimeZone};
use serde::{Deserialize, Serialize};
use tinyrand::{Rand, Seeded, StdRand};

use crate::data::{Contest, FixtureId, LeagueId, OddsMarket, OddsOutcome, OddsPayload, Team, TeamId};
use crate::domain::Sided;
use crate::odds::SANE_PRICES;
use crate::rating::RatingArchive;
use crate::scoregrid::{DerivedProbs, ScoreDistribution};

const MAX_SAMPLED_GOALS: u8 = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    pub seed: u64,
    pub teams: usize,
    pub league: LeagueId,
    /// Kick-off of the first round, in seconds since the epoch (UTC).
    pub start_timestamp: i64,
    pub home_rate: f64,
    pub away_rate: f64,
    /// Half-width of the log-strength distribution.
    pub strength_spread: f64,
    /// Half-width of the relative noise applied to the expected goals.
    pub xg_noise: f64,
    pub overround: f64,
    pub max_goals: u8,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            teams: 10,
            league: 1,
            start_timestamp: 1_723_302_000,
            home_rate: 1.45,
            away_rate: 1.15,
            strength_spread: 0.3,
            xg_noise: 0.25,
            overround: 1.05,
            max_goals: 8,
        }
    }
}

impl SeasonConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.teams < 2 {
            bail!("at least two teams are required");
        }
        if self.home_rate <= 0.0 || self.away_rate <= 0.0 {
            bail!("scoring rates must be positive");
        }
        if !(0.0..1.0).contains(&self.xg_noise) {
            bail!("xg noise must lie in [0, 1)");
        }
        if self.strength_spread < 0.0 {
            bail!("strength spread must be non-negative");
        }
        if self.overround < 1.0 {
            bail!("overround must be at least 1");
        }
        if self.max_goals == 0 {
            bail!("max_goals must be at least 1");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamProfile {
    pub team: Team,
    pub attack: f64,
    /// Multiplier on the opponent's rate; below 1 is a strong defence.
    pub defence: f64,
    pub rating: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyntheticSeason {
    pub profiles: Vec<TeamProfile>,
    pub contests: Vec<Contest>,
    pub ratings: RatingArchive,
}

#[inline]
fn random_f64(rand: &mut impl Rand) -> f64 {
    rand.next_u64() as f64 / u64::MAX as f64
}

/// Inverse-transform sample of a Poisson variate, capped at [`MAX_SAMPLED_GOALS`].
fn sample_poisson(rand: &mut impl Rand, lambda: f64) -> u8 {
    let u = random_f64(rand);
    let mut term = f64::exp(-lambda);
    let mut cdf = term;
    let mut k = 0;
    while u > cdf && k < MAX_SAMPLED_GOALS {
        k += 1;
        term *= lambda / k as f64;
        cdf += term;
    }
    k
}

/// Pairings of a double round-robin over `teams` teams, with venues swapped in the second half.
pub fn double_round_robin(teams: usize) -> Vec<Vec<(usize, usize)>> {
    let mut slots: Vec<Option<usize>> = (0..teams).map(Some).collect();
    if teams % 2 == 1 {
        slots.push(None);
    }
    let n = slots.len();
    let mut first_half = Vec::with_capacity(n - 1);
    for round in 0..n - 1 {
        let mut pairings = Vec::with_capacity(n / 2);
        for index in 0..n / 2 {
            if let (Some(a), Some(b)) = (slots[index], slots[n - 1 - index]) {
                if index == 0 && round % 2 == 1 {
                    pairings.push((b, a));
                } else {
                    pairings.push((a, b));
                }
            }
        }
        first_half.push(pairings);
        slots[1..].rotate_right(1);
    }
    let second_half: Vec<Vec<_>> = first_half
        .iter()
        .map(|pairings| pairings.iter().map(|&(home, away)| (away, home)).collect())
        .collect();
    first_half.into_iter().chain(second_half).collect()
}

/// Rounded to cents and kept within [`SANE_PRICES`].
fn price(probability: f64, overround: f64) -> f64 {
    let fair = 1.0 / (probability * overround);
    let rounded = (fair * 100.0).round() / 100.0;
    rounded.clamp(*SANE_PRICES.start(), *SANE_PRICES.end())
}

fn market(name: &str, outcomes: &[(&str, f64)], overround: f64) -> OddsMarket {
    OddsMarket {
        name: name.to_string(),
        outcomes: outcomes
            .iter()
            .map(|&(outcome, probability)| OddsOutcome {
                name: outcome.to_string(),
                price: Some(price(probability, overround)),
            })
            .collect(),
    }
}

fn quote(probs: &DerivedProbs, overround: f64) -> OddsPayload {
    OddsPayload {
        markets: vec![
            market(
                "Double Chance",
                &[
                    ("Home/Draw", probs.home + probs.draw),
                    ("Draw/Away", probs.away + probs.draw),
                    ("Home/Away", probs.home + probs.away),
                ],
                overround,
            ),
            market("Over/Under 2.5", &[("Over 2.5", probs.over25), ("Under 2.5", 1.0 - probs.over25)], overround),
            market("Over/Under 3.5", &[("Over 3.5", probs.over35), ("Under 3.5", 1.0 - probs.over35)], overround),
            market("Both Teams Score", &[("Yes", probs.btts), ("No", 1.0 - probs.btts)], overround),
            market("Away Team Total Goals", &[("Over 0.5", probs.away_over05)], overround),
        ],
    }
}

/// Generates a season. The same configuration always yields the same season.
pub fn generate(config: &SeasonConfig) -> Result<SyntheticSeason, anyhow::Error> {
    config.validate()?;
    let Some(start) = FixedOffset::east_opt(0).and_then(|utc| utc.timestamp_opt(config.start_timestamp, 0).single())
    else {
        bail!("invalid start timestamp {}", config.start_timestamp);
    };
    let mut rand = StdRand::seed(config.seed);

    let profiles: Vec<_> = (0..config.teams)
        .map(|index| {
            let attack = f64::exp(config.strength_spread * (2.0 * random_f64(&mut rand) - 1.0));
            let defence = f64::exp(config.strength_spread * (2.0 * random_f64(&mut rand) - 1.0));
            TeamProfile {
                team: Team {
                    id: 100 + index as TeamId,
                    name: format!("Team {}", index + 1),
                },
                attack,
                defence,
                rating: 1500.0 + 400.0 * f64::log10(attack / defence),
            }
        })
        .collect();

    let mut contests = vec![];
    let mut ratings = RatingArchive::default();
    for (round, pairings) in double_round_robin(config.teams).into_iter().enumerate() {
        let round_name = format!("Regular Season - {}", round + 1);
        for profile in &profiles {
            ratings.insert(config.league, &round_name, &profile.team.name, profile.rating);
        }

        let kick_off = start + Duration::days(7 * round as i64);
        for (slot, (home, away)) in pairings.into_iter().enumerate() {
            let (home, away) = (&profiles[home], &profiles[away]);
            let rates = Sided::new(
                config.home_rate * home.attack * away.defence,
                config.away_rate * away.attack * home.defence,
            );
            let goals = Sided::new(sample_poisson(&mut rand, rates.home), sample_poisson(&mut rand, rates.away));
            let mut noise = || 1.0 + config.xg_noise * (2.0 * random_f64(&mut rand) - 1.0);
            let expected_goals = Sided::new(rates.home * noise(), rates.away * noise());
            let probs = ScoreDistribution::dixon_coles(rates.home, rates.away, 0.0, config.max_goals).probs;

            contests.push(Contest {
                id: (contests.len() + 1) as FixtureId,
                date: kick_off + Duration::minutes(15 * slot as i64),
                status: Some("FT".to_string()),
                league: config.league,
                round: Some(round_name.clone()),
                teams: Sided::new(home.team.clone(), away.team.clone()),
                goals: Sided::new(Some(goals.home), Some(goals.away)),
                expected_goals: Sided::new(Some(expected_goals.home), Some(expected_goals.away)),
                context: None,
                meta: Sided::default(),
                odds: Some(quote(&probs, config.overround)),
            });
        }
    }

    Ok(SyntheticSeason {
        profiles,
        contests,
        ratings,
    })
}

#[cfg(test)]
mod tests;
