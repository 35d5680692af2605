//! Stake sizing and a running profit-and-loss ledger.

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::market::PriceBounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Flat,
    Kelly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StakingConfig {
    pub initial_bankroll: f64,
    pub strategy: Strategy,
    pub unit_stake: f64,
    pub kelly_fraction: f64,
    pub price_bounds: PriceBounds,
}
impl StakingConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.initial_bankroll.is_finite() && self.initial_bankroll > 0.0) {
            bail!("initial bankroll must be positive");
        }
        if !(self.unit_stake.is_finite() && self.unit_stake > 0.0) {
            bail!("unit stake must be positive");
        }
        if !(0.0..=1.0).contains(&self.kelly_fraction) {
            bail!("Kelly fraction must lie in [0, 1]");
        }
        if self.price_bounds.start() > self.price_bounds.end() {
            bail!("price bounds {:?} are empty", self.price_bounds);
        }
        Ok(())
    }
}

impl Default for StakingConfig {
    fn default() -> Self {
        Self {
            initial_bankroll: 100.0,
            strategy: Strategy::Flat,
            unit_stake: 1.0,
            kelly_fraction: 0.25,
            price_bounds: 1.01..=200.0,
        }
    }
}

/// Fractional Kelly stake for a bet at decimal `price` believed to win with `prob`.
pub fn kelly_stake(prob: f64, price: f64, bankroll: f64, fraction: f64) -> f64 {
    let divisor = price - 1.0;
    if divisor <= 0.0 {
        return 0.0;
    }
    let edge = prob * price - 1.0;
    let stake = bankroll * f64::clamp(edge / divisor, 0.0, 1.0) * fraction;
    if stake > 0.0 {
        stake
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bet<K> {
    pub key: K,
    pub probability: f64,
    pub price: f64,
    pub stake: f64,
    pub pnl: f64,
    pub edge: f64,
    pub won: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiSummary<K> {
    pub bankroll_start: f64,
    pub bankroll_end: f64,
    pub total_stake: f64,
    pub pnl: f64,
    /// Realised return on turnover; zero when nothing was staked.
    pub roi: f64,
    pub total_bets: usize,
    pub bets: Vec<Bet<K>>,
}

/// Sizes, settles and records bets, carrying the bankroll forward between them.
#[derive(Debug, Clone)]
pub struct RoiTracker<K> {
    config: StakingConfig,
    bankroll: f64,
    total_stake: f64,
    pnl: f64,
    bets: Vec<Bet<K>>,
}
impl<K: Clone> RoiTracker<K> {
    pub fn new(config: StakingConfig) -> Self {
        let bankroll = config.initial_bankroll;
        Self {
            config,
            bankroll,
            total_stake: 0.0,
            pnl: 0.0,
            bets: vec![],
        }
    }

    pub fn bankroll(&self) -> f64 {
        self.bankroll
    }

    /// Stake the current policy would place; zero wherever the bet should be skipped.
    pub fn stake(&self, prob: f64, price: f64) -> f64 {
        if !prob.is_finite() || !price.is_finite() {
            return 0.0;
        }
        if !self.config.price_bounds.contains(&price) {
            return 0.0;
        }
        if prob <= 0.0 || prob >= 1.0 {
            return 0.0;
        }
        match self.config.strategy {
            Strategy::Flat => self.config.unit_stake,
            Strategy::Kelly => kelly_stake(prob, price, self.bankroll, self.config.kelly_fraction),
        }
    }

    /// Settles a bet on `key`, returning `None` if the policy stakes nothing.
    pub fn record_bet(&mut self, key: K, prob: f64, price: f64, won: bool) -> Option<&Bet<K>> {
        let stake = self.stake(prob, price);
        if stake <= 0.0 {
            return None;
        }
        let pnl = if won { stake * (price - 1.0) } else { -stake };
        self.total_stake += stake;
        self.pnl += pnl;
        self.bankroll += pnl;
        self.bets.push(Bet {
            key,
            probability: prob,
            price,
            stake,
            pnl,
            edge: prob * price - 1.0,
            won,
        });
        self.bets.last()
    }

    pub fn summary(&self) -> RoiSummary<K> {
        RoiSummary {
            bankroll_start: self.config.initial_bankroll,
            bankroll_end: self.bankroll,
            total_stake: self.total_stake,
            pnl: self.pnl,
            roi: if self.total_stake > 0.0 {
                self.pnl / self.total_stake
            } else {
                0.0
            },
            total_bets: self.bets.len(),
            bets: self.bets.clone(),
        }
    }
}
