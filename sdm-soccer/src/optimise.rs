//! Walk-forward parameter fitting.
//!
//! A candidate [`ModelConfig`] is scored by replaying the contests and combining the mean
//! proper-scoring losses of the evaluated contests. Candidates come from a hypergrid search over
//! a chosen subset of the model's continuous parameters.

use std::ops::RangeInclusive;
use std::path::Path;

use anyhow::bail;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use tracing::{debug, info};

use sdm::file::write_json;
use sdm::opt::{hypergrid_search, HypergridSearchConfig};

use crate::backtest::{Backtest, BacktestConfig, ScoringLosses};
use crate::data::Contest;
use crate::impact::ImpactModel;
use crate::rating::RatingArchive;
use crate::strength::ModelConfig;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LossWeights {
    pub brier_1x2: f64,
    pub nll_score: f64,
    pub brier_sub: f64,
}

impl Default for LossWeights {
    fn default() -> Self {
        Self {
            brier_1x2: 0.55,
            nll_score: 0.30,
            brier_sub: 0.15,
        }
    }
}

impl LossWeights {
    pub fn combine(&self, losses: &ScoringLosses) -> f64 {
        self.brier_1x2 * losses.brier_1x2 + self.nll_score * losses.nll_score + self.brier_sub * losses.brier_sub
    }
}

/// A tunable [`ModelConfig`] parameter.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Serialize, Deserialize, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    WXg,
    WElo,
    Rho,
    Hfa,
    ConfidenceShrinkage,
}
impl Dimension {
    pub fn default_bounds(&self) -> RangeInclusive<f64> {
        match self {
            Dimension::WXg => 0.4..=2.8,
            Dimension::WElo => 0.1..=2.8,
            Dimension::Rho => -0.2..=0.3,
            Dimension::Hfa => 10.0..=180.0,
            Dimension::ConfidenceShrinkage => 2.0..=30.0,
        }
    }

    pub fn get(&self, config: &ModelConfig) -> f64 {
        match self {
            Dimension::WXg => config.w_xg,
            Dimension::WElo => config.w_elo,
            Dimension::Rho => config.rho,
            Dimension::Hfa => config.hfa,
            Dimension::ConfidenceShrinkage => config.confidence_shrinkage,
        }
    }

    pub fn set(&self, config: &mut ModelConfig, value: f64) {
        let field = match self {
            Dimension::WXg => &mut config.w_xg,
            Dimension::WElo => &mut config.w_elo,
            Dimension::Rho => &mut config.rho,
            Dimension::Hfa => &mut config.hfa,
            Dimension::ConfidenceShrinkage => &mut config.confidence_shrinkage,
        };
        *field = value;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchDimension {
    pub dimension: Dimension,
    pub bounds: RangeInclusive<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimiserConfig {
    pub dimensions: Vec<SearchDimension>,
    pub max_steps: u64,
    pub resolution: usize,
    pub weights: LossWeights,
}

impl Default for OptimiserConfig {
    fn default() -> Self {
        Self {
            dimensions: Dimension::iter()
                .map(|dimension| SearchDimension {
                    dimension,
                    bounds: dimension.default_bounds(),
                })
                .collect(),
            max_steps: 4,
            resolution: 3,
            weights: LossWeights::default(),
        }
    }
}

/// Mean losses of one replay under a given configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayLoss {
    pub loss: f64,
    pub losses: ScoringLosses,
    pub evaluated: usize,
}

pub fn replay_loss<M: ImpactModel>(
    config: BacktestConfig,
    ratings: &RatingArchive,
    impact_model: M,
    contests: &[Contest],
    weights: &LossWeights,
) -> ReplayLoss {
    let report = Backtest::new(config, ratings, impact_model).run_contests(contests);
    ReplayLoss {
        loss: weights.combine(&report.losses),
        losses: report.losses,
        evaluated: report.total,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimisationOutcome {
    pub config: ModelConfig,
    pub replay: ReplayLoss,
    /// Loss of the starting configuration.
    pub initial_loss: f64,
    pub steps: u64,
    pub evaluations: u64,
}

/// Searches the configured dimensions for the configuration minimising the combined loss. The
/// starting configuration is kept unless some candidate beats it.
pub fn optimise<M: ImpactModel + Clone>(
    base: &BacktestConfig,
    ratings: &RatingArchive,
    impact_model: &M,
    contests: &[Contest],
    optimiser: &OptimiserConfig,
) -> Result<OptimisationOutcome, anyhow::Error> {
    base.validate()?;
    let weights = &optimiser.weights;
    let candidate = |values: &[f64]| {
        let mut config = BacktestConfig {
            collect_traces: false,
            ..base.clone()
        };
        for (dimension, &value) in optimiser.dimensions.iter().zip(values) {
            dimension.dimension.set(&mut config.model, value);
        }
        config
    };

    let initial = replay_loss(candidate(&[]), ratings, impact_model.clone(), contests, weights);
    if initial.evaluated == 0 {
        bail!("no contest has enough history to be evaluated");
    }
    info!("initial loss {:.6} over {} contest(s)", initial.loss, initial.evaluated);

    let bounds: Vec<_> = optimiser.dimensions.iter().map(|dimension| dimension.bounds.clone()).collect();
    let outcome = hypergrid_search(
        &HypergridSearchConfig {
            max_steps: optimiser.max_steps,
            acceptable_residual: 0.0,
            bounds: &bounds,
            resolution: optimiser.resolution,
        },
        |_| true,
        |values| {
            let replay = replay_loss(candidate(values), ratings, impact_model.clone(), contests, weights);
            debug!("candidate {values:?}: loss {:.6} over {} contest(s)", replay.loss, replay.evaluated);
            if replay.evaluated == 0 {
                f64::MAX
            } else {
                replay.loss
            }
        },
    )?;

    let (config, replay) = if outcome.optimal_residual < initial.loss {
        let config = candidate(&outcome.optimal_values);
        let replay = replay_loss(config.clone(), ratings, impact_model.clone(), contests, weights);
        (config.model, replay)
    } else {
        (base.model.clone(), initial.clone())
    };
    info!(
        "optimised loss {:.6} (from {:.6}) after {} step(s), {} evaluation(s)",
        replay.loss, initial.loss, outcome.steps, outcome.evaluations
    );

    Ok(OptimisationOutcome {
        config,
        replay,
        initial_loss: initial.loss,
        steps: outcome.steps,
        evaluations: outcome.evaluations,
    })
}

/// The optimiser's output, readable by [`ModelConfig::read_params_file`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsFile {
    pub best_params: ModelConfig,
    pub max_goals: u8,
    pub loss: f64,
    pub evaluated: usize,
    pub loss_weights: LossWeights,
}
impl ParamsFile {
    pub fn new(outcome: &OptimisationOutcome, weights: &LossWeights) -> Self {
        Self {
            best_params: outcome.config.clone(),
            max_goals: outcome.config.max_goals,
            loss: outcome.replay.loss,
            evaluated: outcome.replay.evaluated,
            loss_weights: *weights,
        }
    }

    pub fn write(&self, path: impl AsRef<Path>) -> Result<(), anyhow::Error> {
        Ok(write_json(path, self)?)
    }
}

#[cfg(test)]
mod tests;
