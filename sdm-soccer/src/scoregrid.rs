//! The joint distribution of final scores.
//!
//! Cells are indexed `(home_goals, away_goals)`. A grid is built from two independent Poisson
//! marginals with the Dixon-Coles correction applied to the four low-scoring cells, then
//! renormalised so that it integrates to 1 over `0..=max_goals` on either axis.
//!
//! Rates are floored but not capped. Once `e^-λ` underflows every cell of the product table, the
//! grid is rebuilt from the log-domain terms relative to the modal cell, which keeps the
//! truncated distribution well defined for any finite rate.

use serde::Serialize;
use tracing::warn;

use sdm::linear::Matrix;
use sdm::poisson;
use sdm::probs::SliceExt;

use crate::domain::{Market, Score, Selection, Sided};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProbableScoreOutcome {
    pub score: Score,
    pub probability: f64,
}

/// Dixon-Coles dependence factor for the cell `(home_goals, away_goals)`.
#[inline]
pub fn dixon_coles_tau(home_goals: usize, away_goals: usize, home_rate: f64, away_rate: f64, rho: f64) -> f64 {
    match (home_goals, away_goals) {
        (0, 0) => 1.0 - home_rate * away_rate * rho,
        (0, 1) => 1.0 + home_rate * rho,
        (1, 0) => 1.0 + away_rate * rho,
        (1, 1) => 1.0 - rho,
        _ => 1.0,
    }
}

pub fn from_univariate_poisson(home_rate: f64, away_rate: f64, scoregrid: &mut Matrix) {
    let home_probs = poisson::univariate_series(home_rate, scoregrid.rows() - 1);
    let away_probs = poisson::univariate_series(away_rate, scoregrid.cols() - 1);
    for (home_goals, &home_prob) in home_probs.iter().enumerate() {
        for (away_goals, &away_prob) in away_probs.iter().enumerate() {
            scoregrid[(home_goals, away_goals)] = home_prob * away_prob;
        }
    }
}

/// Product table scaled so that its largest cell is 1. Unlike [`from_univariate_poisson`], no
/// cell underflows merely because the rates are large.
pub fn from_ln_univariate_poisson(home_rate: f64, away_rate: f64, scoregrid: &mut Matrix) {
    let home_ln_probs = poisson::ln_univariate_series(home_rate, scoregrid.rows() - 1);
    let away_ln_probs = poisson::ln_univariate_series(away_rate, scoregrid.cols() - 1);
    let peak = home_ln_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
        + away_ln_probs.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    for (home_goals, &home_ln_prob) in home_ln_probs.iter().enumerate() {
        for (away_goals, &away_ln_prob) in away_ln_probs.iter().enumerate() {
            scoregrid[(home_goals, away_goals)] = f64::exp(home_ln_prob + away_ln_prob - peak);
        }
    }
}

/// Multiplies the low-scoring cells by τ and clamps any resulting negative cell to zero.
/// Returns the smallest cell value seen before clamping.
pub fn apply_dixon_coles(home_rate: f64, away_rate: f64, rho: f64, scoregrid: &mut Matrix) -> f64 {
    let mut min_raw = f64::INFINITY;
    for home_goals in 0..scoregrid.rows() {
        for away_goals in 0..scoregrid.cols() {
            let cell = &mut scoregrid[(home_goals, away_goals)];
            *cell *= dixon_coles_tau(home_goals, away_goals, home_rate, away_rate, rho);
            min_raw = f64::min(min_raw, *cell);
            if *cell < 0.0 {
                *cell = 0.0;
            }
        }
    }
    min_raw
}

pub fn home_away_expectations(scoregrid: &Matrix) -> Sided<f64> {
    let mut expectations = Sided::new(0.0, 0.0);
    for (home_goals, away_goals, prob) in scoregrid.cells() {
        expectations.home += home_goals as f64 * prob;
        expectations.away += away_goals as f64 * prob;
    }
    expectations
}

/// The `n` most probable scorelines, most probable first. Equal probabilities keep their
/// row-major order.
pub fn top_scores(scoregrid: &Matrix, n: usize) -> Vec<ProbableScoreOutcome> {
    let mut outcomes: Vec<_> = scoregrid
        .cells()
        .map(|(home_goals, away_goals, probability)| ProbableScoreOutcome {
            score: Score::new(home_goals as u8, away_goals as u8),
            probability,
        })
        .collect();
    outcomes.sort_by(|a, b| b.probability.total_cmp(&a.probability));
    outcomes.truncate(n);
    outcomes
}

impl Market {
    /// Probability that the market's proposition holds.
    pub fn gather(&self, scoregrid: &Matrix) -> f64 {
        gather_where(scoregrid, |score| self.holds(score))
    }
}

fn gather_where(scoregrid: &Matrix, mut predicate: impl FnMut(&Score) -> bool) -> f64 {
    let mut prob = 0.0;
    for (home_goals, away_goals, cell) in scoregrid.cells() {
        if predicate(&Score::new(home_goals as u8, away_goals as u8)) {
            prob += cell;
        }
    }
    prob
}

pub fn gather_win_draw_loss(scoregrid: &Matrix) -> (f64, f64, f64) {
    let (mut home, mut draw, mut away) = (0.0, 0.0, 0.0);
    for (home_goals, away_goals, prob) in scoregrid.cells() {
        match home_goals.cmp(&away_goals) {
            std::cmp::Ordering::Greater => home += prob,
            std::cmp::Ordering::Equal => draw += prob,
            std::cmp::Ordering::Less => away += prob,
        }
    }
    (home, draw, away)
}

/// Market-level probabilities derived from one score grid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DerivedProbs {
    pub home: f64,
    pub draw: f64,
    pub away: f64,
    pub btts: f64,
    pub over25: f64,
    pub over35: f64,
    pub home_over05: f64,
    pub home_over15: f64,
    pub away_over05: f64,
    pub away_over15: f64,
}
impl DerivedProbs {
    pub fn from_scoregrid(scoregrid: &Matrix) -> Self {
        let (home, draw, away) = gather_win_draw_loss(scoregrid);
        Self {
            home,
            draw,
            away,
            btts: Market::BothTeamsToScore.gather(scoregrid),
            over25: Market::Over25.gather(scoregrid),
            over35: Market::Over35.gather(scoregrid),
            home_over05: Market::HomeOver05.gather(scoregrid),
            home_over15: Market::HomeOver15.gather(scoregrid),
            away_over05: Market::AwayOver05.gather(scoregrid),
            away_over15: Market::AwayOver15.gather(scoregrid),
        }
    }

    /// Probability that `market`'s proposition holds. For double chance, that is `1X`.
    pub fn proposition(&self, market: Market) -> f64 {
        match market {
            Market::DoubleChance => self.home + self.draw,
            Market::Over25 => self.over25,
            Market::Over35 => self.over35,
            Market::BothTeamsToScore => self.btts,
            Market::HomeOver05 => self.home_over05,
            Market::HomeOver15 => self.home_over15,
            Market::AwayOver05 => self.away_over05,
            Market::AwayOver15 => self.away_over15,
        }
    }

    /// The double chance pick and its probability: `1X` unless the away win is strictly more
    /// likely, in which case `X2`. `12` is never picked.
    pub fn double_chance(&self) -> (Selection, f64) {
        if self.home >= self.away {
            (Selection::HomeOrDraw, self.home + self.draw)
        } else {
            (Selection::AwayOrDraw, self.away + self.draw)
        }
    }
}

/// A normalised score grid together with its construction diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreDistribution {
    scoregrid: Matrix,
    /// Sum of the corrected (or, if degenerate, uncorrected) cells prior to normalisation.
    pub raw_sum: f64,
    /// Smallest corrected cell prior to clamping.
    pub raw_min: f64,
    /// Set when the correction left no probability mass and the product table was used.
    pub degenerate: bool,
    pub probs: DerivedProbs,
    pub top_scores: Vec<ProbableScoreOutcome>,
}
impl ScoreDistribution {
    pub fn dixon_coles(home_rate: f64, away_rate: f64, rho: f64, max_goals: u8) -> Self {
        let dim = max_goals as usize + 1;
        let mut scoregrid = Matrix::zeros(dim, dim);
        from_univariate_poisson(home_rate, away_rate, &mut scoregrid);
        let raw_min = apply_dixon_coles(home_rate, away_rate, rho, &mut scoregrid);

        let mut raw_sum = scoregrid.as_slice().sum();
        let degenerate = raw_sum.is_nan() || raw_sum <= 0.0;
        if degenerate {
            warn!("degenerate score grid for rates {home_rate}:{away_rate} with rho {rho}, falling back to independent product");
            from_univariate_poisson(home_rate, away_rate, &mut scoregrid);
            raw_sum = scoregrid.as_slice().sum();
            if raw_sum.is_nan() || raw_sum <= 0.0 {
                from_ln_univariate_poisson(home_rate, away_rate, &mut scoregrid);
            }
        }
        if scoregrid.as_slice().sum() > 0.0 {
            scoregrid.as_mut_slice().normalise(1.0);
        }

        let probs = DerivedProbs::from_scoregrid(&scoregrid);
        let top_scores = top_scores(&scoregrid, 3);
        Self {
            scoregrid,
            raw_sum,
            raw_min,
            degenerate,
            probs,
            top_scores,
        }
    }

    pub fn scoregrid(&self) -> &Matrix {
        &self.scoregrid
    }

    pub fn max_goals(&self) -> u8 {
        (self.scoregrid.rows() - 1) as u8
    }

    /// Probability of `score`, or zero beyond the grid.
    pub fn probability(&self, score: &Score) -> f64 {
        let (home, away) = (score.home as usize, score.away as usize);
        if home < self.scoregrid.rows() && away < self.scoregrid.cols() {
            self.scoregrid[(home, away)]
        } else {
            0.0
        }
    }

    /// Expected goals of the normalised grid. These differ from the input rates by the
    /// truncation at `max_goals` and by the low-score correction.
    pub fn expectations(&self) -> Sided<f64> {
        home_away_expectations(&self.scoregrid)
    }

    pub fn most_likely(&self) -> Score {
        self.top_scores
            .first()
            .map(|outcome| outcome.score)
            .unwrap_or_else(Score::nil_all)
    }
}
