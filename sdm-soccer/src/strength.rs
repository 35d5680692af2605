//! Scoring-rate estimation from rolling team statistics and relative ratings.

use std::path::Path;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use sdm::file::read_json;

use crate::data::{LeagueMeta, RosterContext};
use crate::domain::Sided;
use crate::impact::{ImpactAssessment, ImpactModel};

/// Model parameters. Every field may be overridden; omitted fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Overall scale applied to the blended attack/defence rate.
    pub w_xg: f64,
    /// Exponent applied to the rating-implied win probability ratio.
    pub w_elo: f64,
    /// Dixon-Coles dependence parameter.
    pub rho: f64,
    /// Home-field advantage in rating points.
    pub hfa: f64,
    pub impact_offensive: f64,
    pub impact_defensive: f64,
    /// Observations each team needs before its contests are predicted.
    pub min_matches: usize,
    /// Pseudo-count pulling team means towards the league average.
    pub confidence_shrinkage: f64,
    pub max_goals: u8,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            w_xg: 1.071767,
            w_elo: 0.490061,
            rho: 0.067551,
            hfa: 63.171357,
            impact_offensive: 0.069775,
            impact_defensive: 0.045351,
            min_matches: 3,
            confidence_shrinkage: 18.60107,
            max_goals: 8,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        for (name, value) in [
            ("w_xg", self.w_xg),
            ("w_elo", self.w_elo),
            ("rho", self.rho),
            ("hfa", self.hfa),
            ("impact_offensive", self.impact_offensive),
            ("impact_defensive", self.impact_defensive),
            ("confidence_shrinkage", self.confidence_shrinkage),
        ] {
            if !value.is_finite() {
                bail!("{name} must be finite, got {value}");
            }
        }
        if self.w_xg <= 0.0 {
            bail!("w_xg must be positive");
        }
        if self.impact_offensive < 0.0 || self.impact_defensive < 0.0 {
            bail!("impact weights must be non-negative");
        }
        if self.confidence_shrinkage < 0.0 {
            bail!("confidence_shrinkage must be non-negative");
        }
        if self.max_goals == 0 {
            bail!("max_goals must be at least 1");
        }
        Ok(())
    }

    /// Reads either an optimiser output file of the form `{"best_params": {..}, "max_goals": n}`
    /// or a bare parameter object.
    pub fn read_params_file(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let value: Value = read_json(path)?;
        let config = Self::from_params_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_params_value(mut value: Value) -> Result<Self, anyhow::Error> {
        match value.get_mut("best_params").map(Value::take) {
            Some(best_params) => {
                let mut config: ModelConfig = serde_json::from_value(best_params)?;
                if let Some(max_goals) = value.get("max_goals") {
                    config.max_goals = serde_json::from_value(max_goals.clone())?;
                }
                Ok(config)
            }
            None => Ok(serde_json::from_value(value)?),
        }
    }
}

/// Numeric stand-ins for quantities the data may not supply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Fallbacks {
    /// Rating of a team absent from the rating archive.
    pub rating: f64,
    /// League average scoring rate when no observations exist.
    pub league_average: f64,
    /// Floor applied to both scoring rates.
    pub min_rate: f64,
}

impl Default for Fallbacks {
    fn default() -> Self {
        Self {
            rating: 1500.0,
            league_average: 1.5,
            min_rate: 0.01,
        }
    }
}

/// Per-team observations in replay order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamRollingStats {
    /// Expected goals (or goals, where unrecorded) scored in each past contest.
    pub scoring: Vec<f64>,
    /// Goals conceded in each past contest.
    pub conceded: Vec<f64>,
}
impl TeamRollingStats {
    pub fn observations(&self) -> usize {
        self.scoring.len()
    }

    pub fn push(&mut self, scoring: f64, conceded: f64) {
        self.scoring.push(scoring);
        self.conceded.push(conceded);
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Blends the mean of `observations` with `league_average`, weighting the latter as
/// `strength` pseudo-observations. With no observations this is exactly the league average.
pub fn bayesian_shrinkage(observations: &[f64], league_average: f64, strength: f64) -> f64 {
    let n = observations.len();
    if n == 0 {
        return league_average;
    }
    (strength * league_average + n as f64 * mean(observations)) / (strength + n as f64)
}

/// Home win probability implied by a rating difference, on the logistic base-10 curve with a
/// 400-point scale.
pub fn rating_win_probability(delta: f64) -> f64 {
    1.0 / (f64::powf(10.0, -delta / 400.0) + 1.0)
}

/// Roster data required by the impact adjustment.
#[derive(Debug, Clone, Copy)]
pub struct RosterInputs<'a> {
    pub context: &'a Sided<RosterContext>,
    pub meta: &'a Sided<Option<LeagueMeta>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strengths {
    pub lambda: Sided<f64>,
    /// Rates before the impact adjustment and flooring.
    pub base: Sided<f64>,
    pub win_probability: Sided<f64>,
    pub ratings: Sided<f64>,
    pub league_average: f64,
    pub impact: Option<Sided<ImpactAssessment>>,
}

pub struct StrengthEstimator<M> {
    pub config: ModelConfig,
    pub fallbacks: Fallbacks,
    pub impact_model: M,
}
impl<M: ImpactModel> StrengthEstimator<M> {
    pub fn new(config: ModelConfig, fallbacks: Fallbacks, impact_model: M) -> Self {
        Self {
            config,
            fallbacks,
            impact_model,
        }
    }

    pub fn has_history(&self, stats: &TeamRollingStats) -> bool {
        stats.observations() >= self.config.min_matches
    }

    /// Estimates both scoring rates, or `None` while either team lacks history or the rates
    /// cannot be represented.
    pub fn estimate(
        &self,
        home: &TeamRollingStats,
        away: &TeamRollingStats,
        ratings: Sided<f64>,
        roster: Option<RosterInputs>,
    ) -> Option<Strengths> {
        if !self.has_history(home) || !self.has_history(away) {
            return None;
        }
        let config = &self.config;

        let pooled = home.scoring.len() + away.scoring.len();
        let league_average = if pooled == 0 {
            self.fallbacks.league_average
        } else {
            (home.scoring.iter().sum::<f64>() + away.scoring.iter().sum::<f64>()) / pooled as f64
        };

        let shrink = |observations: &[f64]| bayesian_shrinkage(observations, league_average, config.confidence_shrinkage);
        let (attack_home, defence_away) = (shrink(&home.scoring), shrink(&away.conceded));
        let (attack_away, defence_home) = (shrink(&away.scoring), shrink(&home.conceded));

        let win_home = rating_win_probability(ratings.home - ratings.away + config.hfa);
        let win_away = 1.0 - win_home;

        let base = Sided::new(
            (attack_home * 0.6 + defence_away * 0.4) * config.w_xg * f64::powf(win_home / 0.5, config.w_elo),
            (attack_away * 0.6 + defence_home * 0.4) * config.w_xg * f64::powf(win_away / 0.5, config.w_elo),
        );

        let mut lambda = base;
        let impact = roster.map(|roster| {
            // a side without leaderboards has nothing to measure absences against
            let assess = |context: &RosterContext, meta: &Option<LeagueMeta>| match meta {
                Some(meta) => self.impact_model.assess(context, meta),
                None => ImpactAssessment::default(),
            };
            let impact = Sided::new(
                assess(&roster.context.home, &roster.meta.home),
                assess(&roster.context.away, &roster.meta.away),
            );
            apply_impact(config, &impact, &mut lambda);
            impact
        });

        if !lambda.home.is_finite() || !lambda.away.is_finite() {
            warn!("non-finite scoring rates {}:{}, skipping prediction", lambda.home, lambda.away);
            return None;
        }
        lambda.home = f64::max(lambda.home, self.fallbacks.min_rate);
        lambda.away = f64::max(lambda.away, self.fallbacks.min_rate);

        Some(Strengths {
            lambda,
            base,
            win_probability: Sided::new(win_home, win_away),
            ratings,
            league_average,
            impact,
        })
    }
}

/// A side's missing attackers dampen its own rate; the opponent's missing defenders lift it.
fn apply_impact(config: &ModelConfig, impact: &Sided<ImpactAssessment>, lambda: &mut Sided<f64>) {
    if impact.home.offensive > 0.0 {
        lambda.home *= 1.0 - config.impact_offensive * impact.home.offensive;
    }
    if impact.away.defensive > 0.0 {
        lambda.home *= 1.0 + config.impact_defensive * impact.away.defensive;
    }
    if impact.away.offensive > 0.0 {
        lambda.away *= 1.0 - config.impact_offensive * impact.away.offensive;
    }
    if impact.home.defensive > 0.0 {
        lambda.away *= 1.0 + config.impact_defensive * impact.home.defensive;
    }
}
