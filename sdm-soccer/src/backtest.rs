//! Chronological replay of contests.
//!
//! Contests are ordered by date, then by fixture id, and folded one at a time through a
//! [`ReplayState`]. Each step predicts from the rolling statistics accumulated so far, settles the
//! picks against the final score, and only then appends the contest's own observations, so no
//! contest can inform its own prediction.

use std::collections::BTreeMap;
use std::ops::Range;

use anyhow::bail;
use chrono::{DateTime, FixedOffset};
use ordinalizer::Ordinal;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strum::{EnumCount, IntoEnumIterator};
use strum_macros::{EnumCount, EnumIter};
use tracing::{debug, info, warn};

use sdm::calibrate::{CalibratorSnapshot, PlattCalibrator, PlattConfig};
use sdm::probs::clamp_probability;
use sdm::stake::{Bet, RoiSummary, RoiTracker, StakingConfig};

use crate::data::{Contest, FixtureId, LeagueId, TeamId};
use crate::domain::{Market, Score, Selection, Sided};
use crate::impact::ImpactModel;
use crate::odds::{map_odds, MarketMappingWarning};
use crate::rating::RatingArchive;
use crate::scoregrid::{DerivedProbs, ProbableScoreOutcome, ScoreDistribution};
use crate::strength::{Fallbacks, ModelConfig, RosterInputs, StrengthEstimator, Strengths, TeamRollingStats};
use crate::validation::Dataset;

/// Binary market probabilities are kept this far from 0 and 1 before calibration.
pub const PROBABILITY_EPSILON: f64 = 1e-6;

/// Floor applied to the probability of the observed score when taking its log.
pub const NLL_FLOOR: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub model: ModelConfig,
    pub fallbacks: Fallbacks,
    pub calibration: PlattConfig,
    pub staking: StakingConfig,
    /// Replays only the first `n` contests in chronological order.
    pub sample_size: Option<usize>,
    /// Keeps a [`ContestTrace`] for every evaluated contest.
    pub collect_traces: bool,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            fallbacks: Fallbacks::default(),
            calibration: PlattConfig {
                lr: 0.02,
                ..PlattConfig::default()
            },
            staking: StakingConfig::default(),
            sample_size: None,
            collect_traces: false,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.model.validate()?;
        self.calibration.validate()?;
        self.staking.validate()?;
        if self.fallbacks.min_rate <= 0.0 {
            bail!("minimum scoring rate must be positive");
        }
        if self.sample_size == Some(0) {
            bail!("sample size must be positive when specified");
        }
        Ok(())
    }
}

/// Rolling statistics of every team seen so far in a replay.
#[derive(Debug, Clone, Default)]
pub struct TeamTracker {
    teams: FxHashMap<TeamId, TeamRollingStats>,
}
impl TeamTracker {
    pub fn get(&self, team: TeamId) -> Option<&TeamRollingStats> {
        self.teams.get(&team)
    }

    /// Appends a contest's observations: each side's scoring observation and the goals it conceded.
    pub fn append(&mut self, teams: Sided<TeamId>, observation: Sided<f64>, score: &Score) {
        self.teams
            .entry(teams.home)
            .or_default()
            .push(observation.home, score.away as f64);
        self.teams
            .entry(teams.away)
            .or_default()
            .push(observation.away, score.home as f64);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BetKey {
    pub contest: FixtureId,
    pub market: Market,
    pub selection: Selection,
}

/// The side taken in one market of one contest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketPick {
    pub market: Market,
    pub selection: Selection,
    /// Model probability of the market's proposition, before calibration.
    pub raw: f64,
    /// Calibrated probability of the proposition.
    pub calibrated: f64,
    /// Calibrated probability of the selected side.
    pub probability: f64,
    pub won: bool,
    pub price: Option<f64>,
}

/// Confidence tiers of a pick, by the probability of the selected side.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Ordinal, EnumCount, EnumIter)]
pub enum ConfidenceBucket {
    #[serde(rename = "50-60")]
    Fifty,
    #[serde(rename = "60-70")]
    Sixty,
    #[serde(rename = "70-80")]
    Seventy,
    #[serde(rename = "80-90")]
    Eighty,
    #[serde(rename = "90-100")]
    Ninety,
}
impl ConfidenceBucket {
    /// Percentage range covered by the bucket, lower bound inclusive.
    pub fn range(&self) -> Range<f64> {
        let lower = 50.0 + 10.0 * self.ordinal() as f64;
        lower..lower + 10.0
    }

    /// The bucket holding `probability`; 100% falls in the top bucket. Below 50% there is none.
    pub fn of(probability: f64) -> Option<Self> {
        let percent = probability * 100.0;
        if percent == 100.0 {
            return Some(ConfidenceBucket::Ninety);
        }
        Self::iter().find(|bucket| bucket.range().contains(&percent))
    }

    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceBucket::Fifty => "50-60",
            ConfidenceBucket::Sixty => "60-70",
            ConfidenceBucket::Seventy => "70-80",
            ConfidenceBucket::Eighty => "80-90",
            ConfidenceBucket::Ninety => "90-100",
        }
    }
}

/// Running counts for one market, or one market within one confidence bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MarketAggregate {
    pub picks: usize,
    pub wins: usize,
    /// Picks that carried a price and were staked.
    pub bets: usize,
    pub stake: f64,
    pub pnl: f64,
}
impl MarketAggregate {
    fn record(&mut self, pick: &MarketPick, bet: Option<&Bet<BetKey>>) {
        self.picks += 1;
        if pick.won {
            self.wins += 1;
        }
        if let Some(bet) = bet {
            self.bets += 1;
            self.stake += bet.stake;
            self.pnl += bet.pnl;
        }
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.wins as f64, self.picks as f64)
    }

    pub fn roi(&self) -> f64 {
        ratio(self.pnl, self.stake)
    }
}

#[inline]
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Proper scoring losses of one contest, or their means over a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoringLosses {
    /// Mean squared error of the home/draw/away triple.
    pub brier_1x2: f64,
    /// Negative log-likelihood of the observed score.
    pub nll_score: f64,
    /// Mean squared error of the raw binary market probabilities.
    pub brier_sub: f64,
}
impl ScoringLosses {
    pub fn evaluate(distribution: &ScoreDistribution, picks: &[MarketPick], score: &Score) -> Self {
        let probs = &distribution.probs;
        let outcome: [f64; 3] = match score.home.cmp(&score.away) {
            std::cmp::Ordering::Greater => [1.0, 0.0, 0.0],
            std::cmp::Ordering::Equal => [0.0, 1.0, 0.0],
            std::cmp::Ordering::Less => [0.0, 0.0, 1.0],
        };
        let brier_1x2 = [probs.home, probs.draw, probs.away]
            .iter()
            .zip(outcome)
            .map(|(prob, actual)| (prob - actual).powi(2))
            .sum::<f64>()
            / 3.0;

        // scores beyond the grid are charged to its edge
        let max_goals = distribution.max_goals();
        let clipped = Score::new(score.home.min(max_goals), score.away.min(max_goals));
        let nll_score = -f64::ln(f64::max(distribution.probability(&clipped), NLL_FLOOR));

        let (mut sum, mut count) = (0.0, 0);
        for pick in picks.iter().filter(|pick| pick.market.is_binary()) {
            let actual = if pick.market.holds(score) { 1.0 } else { 0.0 };
            sum += (pick.raw - actual).powi(2);
            count += 1;
        }

        Self {
            brier_1x2,
            nll_score,
            brier_sub: ratio(sum, count as f64),
        }
    }

    fn accumulate(&mut self, other: &ScoringLosses) {
        self.brier_1x2 += other.brier_1x2;
        self.nll_score += other.nll_score;
        self.brier_sub += other.brier_sub;
    }

    fn mean(&self, count: usize) -> Self {
        let count = count as f64;
        Self {
            brier_1x2: ratio(self.brier_1x2, count),
            nll_score: ratio(self.nll_score, count),
            brier_sub: ratio(self.brier_sub, count),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreDiagnostics {
    /// Share of contests whose most likely scoreline was the final score.
    pub exact_accuracy: f64,
    /// Share of contests whose final score was among the three most likely.
    pub top3_accuracy: f64,
    /// Mean of (most likely − actual) goals per side.
    pub mean_error: Sided<f64>,
    pub mean_absolute_error: Sided<f64>,
}

#[derive(Debug, Clone, Default)]
struct ScoreTally {
    exact_hits: usize,
    top3_hits: usize,
    error: Sided<f64>,
    absolute_error: Sided<f64>,
}
impl ScoreTally {
    fn record(&mut self, distribution: &ScoreDistribution, score: &Score) {
        let predicted = distribution.most_likely();
        if predicted == *score {
            self.exact_hits += 1;
        }
        if distribution.top_scores.iter().any(|outcome| outcome.score == *score) {
            self.top3_hits += 1;
        }
        let home_error = predicted.home as f64 - score.home as f64;
        let away_error = predicted.away as f64 - score.away as f64;
        self.error.home += home_error;
        self.error.away += away_error;
        self.absolute_error.home += home_error.abs();
        self.absolute_error.away += away_error.abs();
    }

    fn diagnostics(&self, evaluated: usize) -> ScoreDiagnostics {
        let count = evaluated as f64;
        ScoreDiagnostics {
            exact_accuracy: ratio(self.exact_hits as f64, count),
            top3_accuracy: ratio(self.top3_hits as f64, count),
            mean_error: self.error.map(|sum| ratio(*sum, count)),
            mean_absolute_error: self.absolute_error.map(|sum| ratio(*sum, count)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestWarnings {
    pub contest: FixtureId,
    pub warnings: Vec<MarketMappingWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContestTrace {
    pub contest: FixtureId,
    pub date: DateTime<FixedOffset>,
    pub league: LeagueId,
    pub round: Option<String>,
    pub teams: Sided<String>,
    pub actual: Score,
    pub probs: DerivedProbs,
    pub top_scores: Vec<ProbableScoreOutcome>,
    pub picks: Vec<MarketPick>,
    pub losses: ScoringLosses,
    pub strengths: Strengths,
    /// Expected goals implied by the normalised grid.
    pub grid_expectations: Sided<f64>,
    pub raw_sum: f64,
    pub raw_min: f64,
    pub degenerate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketReport {
    pub market: Market,
    pub picks: usize,
    pub wins: usize,
    pub accuracy: f64,
    pub bets: usize,
    pub stake: f64,
    pub pnl: f64,
    pub roi: f64,
}
impl MarketReport {
    fn new(market: Market, aggregate: &MarketAggregate) -> Self {
        Self {
            market,
            picks: aggregate.picks,
            wins: aggregate.wins,
            accuracy: aggregate.accuracy(),
            bets: aggregate.bets,
            stake: aggregate.stake,
            pnl: aggregate.pnl,
            roi: aggregate.roi(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub bucket: ConfidenceBucket,
    #[serde(flatten)]
    pub aggregate: MarketReport,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Contests for which a prediction was made.
    pub total: usize,
    /// Played contests skipped while either team lacked history.
    pub warming: usize,
    /// Contests without a final score.
    pub unplayed: usize,
    /// Records excluded by validation.
    pub rejected: Vec<String>,
    pub markets: Vec<MarketReport>,
    /// Non-empty confidence buckets, by market and then by bucket.
    pub buckets: Vec<BucketReport>,
    pub scores: ScoreDiagnostics,
    pub losses: ScoringLosses,
    pub calibrators: BTreeMap<Market, CalibratorSnapshot>,
    pub roi: RoiSummary<BetKey>,
    pub warnings: Vec<ContestWarnings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traces: Option<Vec<ContestTrace>>,
}
impl Report {
    pub fn market(&self, market: Market) -> Option<&MarketReport> {
        self.markets.iter().find(|report| report.market == market)
    }

    pub fn accuracy(&self, market: Market) -> f64 {
        self.market(market).map_or(0.0, |report| report.accuracy)
    }

    /// Accuracy of the double chance pick.
    pub fn pick_accuracy(&self) -> f64 {
        self.accuracy(Market::DoubleChance)
    }

    pub fn buckets(&self, market: Market) -> impl Iterator<Item = &BucketReport> {
        self.buckets.iter().filter(move |bucket| bucket.aggregate.market == market)
    }
}

#[derive(Debug, Clone)]
struct ReplayTally {
    evaluated: usize,
    warming: usize,
    unplayed: usize,
    markets: [MarketAggregate; Market::COUNT],
    buckets: [[MarketAggregate; ConfidenceBucket::COUNT]; Market::COUNT],
    scores: ScoreTally,
    losses: ScoringLosses,
    warnings: Vec<ContestWarnings>,
    traces: Option<Vec<ContestTrace>>,
}

/// Everything a replay mutates, threaded through [`ReplayState::step`].
#[derive(Debug, Clone)]
pub struct ReplayState {
    tracker: TeamTracker,
    calibrators: BTreeMap<Market, PlattCalibrator>,
    roi: RoiTracker<BetKey>,
    tally: ReplayTally,
}
impl ReplayState {
    pub fn new(config: &BacktestConfig) -> Self {
        let calibrators = Market::iter()
            .filter(Market::is_binary)
            .map(|market| (market, PlattCalibrator::new(config.calibration.clone())))
            .collect();
        Self {
            tracker: TeamTracker::default(),
            calibrators,
            roi: RoiTracker::new(config.staking.clone()),
            tally: ReplayTally {
                evaluated: 0,
                warming: 0,
                unplayed: 0,
                markets: [MarketAggregate::default(); Market::COUNT],
                buckets: [[MarketAggregate::default(); ConfidenceBucket::COUNT]; Market::COUNT],
                scores: ScoreTally::default(),
                losses: ScoringLosses::default(),
                warnings: vec![],
                traces: config.collect_traces.then(Vec::new),
            },
        }
    }

    pub fn tracker(&self) -> &TeamTracker {
        &self.tracker
    }

    /// Predicts and settles one contest, then folds its observations into the tracker.
    pub fn step<M: ImpactModel>(mut self, backtest: &Backtest<M>, contest: &Contest) -> Self {
        let Some(score) = contest.score() else {
            debug!("contest {} has no final score", contest.id);
            self.tally.unplayed += 1;
            return self;
        };

        if let Some(strengths) = self.estimate(backtest, contest) {
            self.evaluate(backtest, contest, &score, strengths);
        } else {
            debug!("warming up on contest {}", contest.id);
            self.tally.warming += 1;
        }

        if let Some(observation) = contest.scoring_observation() {
            let teams = contest.teams.map(|team| team.id);
            self.tracker.append(teams, observation, &score);
        }
        self
    }

    fn estimate<M: ImpactModel>(&self, backtest: &Backtest<M>, contest: &Contest) -> Option<Strengths> {
        let empty = TeamRollingStats::default();
        let home = self.tracker.get(contest.teams.home.id).unwrap_or(&empty);
        let away = self.tracker.get(contest.teams.away.id).unwrap_or(&empty);
        let ratings = contest.teams.map(|team| backtest.rating(contest, &team.name));
        let roster = contest.context.as_ref().map(|context| RosterInputs {
            context,
            meta: &contest.meta,
        });
        backtest.estimator.estimate(home, away, ratings, roster)
    }

    fn pick(&self, market: Market, probs: &DerivedProbs, score: &Score) -> MarketPick {
        let (selection, raw, calibrated, probability) = if market.is_binary() {
            let raw = clamp_probability(probs.proposition(market), PROBABILITY_EPSILON);
            let calibrated = self
                .calibrators
                .get(&market)
                .map_or(raw, |calibrator| calibrator.predict(raw));
            let selection = if calibrated >= 0.5 {
                market.affirmative()
            } else {
                market.negative()
            };
            (selection, raw, calibrated, f64::max(calibrated, 1.0 - calibrated))
        } else {
            let (selection, prob) = probs.double_chance();
            (selection, prob, prob, prob)
        };
        MarketPick {
            market,
            selection,
            raw,
            calibrated,
            probability,
            won: selection.wins(market, score),
            price: None,
        }
    }

    fn evaluate<M: ImpactModel>(&mut self, backtest: &Backtest<M>, contest: &Contest, score: &Score, strengths: Strengths) {
        let model = &backtest.config.model;
        let distribution = ScoreDistribution::dixon_coles(strengths.lambda.home, strengths.lambda.away, model.rho, model.max_goals);
        if distribution.degenerate {
            warn!("contest {} produced a degenerate score grid", contest.id);
        }
        let probs = &distribution.probs;

        let mut picks: Vec<_> = Market::iter().map(|market| self.pick(market, probs, score)).collect();

        let odds = contest.odds.as_ref().map(|payload| {
            let (odds, warnings) = map_odds(payload);
            if !warnings.is_empty() {
                warn!("contest {}: {} odds mapping warning(s)", contest.id, warnings.len());
                self.tally.warnings.push(ContestWarnings {
                    contest: contest.id,
                    warnings,
                });
            }
            odds
        });

        for pick in &mut picks {
            pick.price = odds.as_ref().and_then(|odds| odds.price(pick.market, pick.selection));
            let key = BetKey {
                contest: contest.id,
                market: pick.market,
                selection: pick.selection,
            };
            let bet = match pick.price {
                Some(price) => self.roi.record_bet(key, pick.probability, price, pick.won),
                None => None,
            };
            let ordinal = pick.market.ordinal();
            self.tally.markets[ordinal].record(pick, bet);
            if let Some(bucket) = ConfidenceBucket::of(pick.probability) {
                self.tally.buckets[ordinal][bucket.ordinal()].record(pick, bet);
            }
        }

        for pick in &picks {
            if let Some(calibrator) = self.calibrators.get_mut(&pick.market) {
                calibrator.update(pick.raw, pick.market.holds(score));
            }
        }

        let losses = ScoringLosses::evaluate(&distribution, &picks, score);
        self.tally.losses.accumulate(&losses);
        self.tally.scores.record(&distribution, score);
        self.tally.evaluated += 1;

        debug!(
            contest = contest.id,
            score = %score,
            pick = %picks[Market::DoubleChance.ordinal()].selection,
            home = probs.home,
            draw = probs.draw,
            away = probs.away,
            "contest processed"
        );

        if let Some(traces) = &mut self.tally.traces {
            traces.push(ContestTrace {
                contest: contest.id,
                date: contest.date,
                league: contest.league,
                round: contest.round.clone(),
                teams: contest.teams.map(|team| team.name.clone()),
                actual: *score,
                probs: *probs,
                top_scores: distribution.top_scores.clone(),
                picks,
                losses,
                strengths,
                grid_expectations: distribution.expectations(),
                raw_sum: distribution.raw_sum,
                raw_min: distribution.raw_min,
                degenerate: distribution.degenerate,
            });
        }
    }

    pub fn into_report(self, rejected: Vec<String>) -> Report {
        let tally = self.tally;
        let markets = Market::iter()
            .map(|market| MarketReport::new(market, &tally.markets[market.ordinal()]))
            .collect();
        let buckets = Market::iter()
            .flat_map(|market| {
                ConfidenceBucket::iter().filter_map(move |bucket| {
                    let aggregate = &tally.buckets[market.ordinal()][bucket.ordinal()];
                    (aggregate.picks > 0).then(|| BucketReport {
                        bucket,
                        aggregate: MarketReport::new(market, aggregate),
                    })
                })
            })
            .collect();
        Report {
            total: tally.evaluated,
            warming: tally.warming,
            unplayed: tally.unplayed,
            rejected,
            markets,
            buckets,
            scores: tally.scores.diagnostics(tally.evaluated),
            losses: tally.losses.mean(tally.evaluated),
            calibrators: self
                .calibrators
                .iter()
                .map(|(market, calibrator)| (*market, calibrator.snapshot()))
                .collect(),
            roi: self.roi.summary(),
            warnings: tally.warnings,
            traces: tally.traces,
        }
    }
}

pub struct Backtest<'a, M> {
    config: BacktestConfig,
    ratings: &'a RatingArchive,
    estimator: StrengthEstimator<M>,
}
impl<'a, M: ImpactModel> Backtest<'a, M> {
    pub fn new(config: BacktestConfig, ratings: &'a RatingArchive, impact_model: M) -> Self {
        let estimator = StrengthEstimator::new(config.model.clone(), config.fallbacks.clone(), impact_model);
        Self {
            config,
            ratings,
            estimator,
        }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    fn rating(&self, contest: &Contest, team: &str) -> f64 {
        self.ratings
            .rating(contest.league, contest.round.as_deref(), team)
            .unwrap_or(self.config.fallbacks.rating)
    }

    /// Replays the valid contests of `dataset`, listing its rejections in the report.
    pub fn run(&self, dataset: &Dataset) -> Report {
        let rejected = dataset.rejections.iter().map(ToString::to_string).collect();
        self.replay(&dataset.contests, rejected)
    }

    pub fn run_contests(&self, contests: &[Contest]) -> Report {
        self.replay(contests, vec![])
    }

    fn replay(&self, contests: &[Contest], rejected: Vec<String>) -> Report {
        let mut ordered: Vec<_> = contests.iter().collect();
        ordered.sort_by(|a, b| a.date.cmp(&b.date).then(a.id.cmp(&b.id)));
        if let Some(sample_size) = self.config.sample_size {
            ordered.truncate(sample_size);
        }

        let state = ordered
            .into_iter()
            .fold(ReplayState::new(&self.config), |state, contest| state.step(self, contest));
        let report = state.into_report(rejected);
        info!(
            "replayed {} contest(s): {} evaluated, {} warming, {} unplayed, {} rejected",
            contests.len(),
            report.total,
            report.warming,
            report.unplayed,
            report.rejected.len()
        );
        report
    }
}

#[cfg(test)]
mod tests;
