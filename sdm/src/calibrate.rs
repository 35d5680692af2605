//! Online Platt scaling: `q = sigmoid(a · logit(p) + b)`, fitted one observation at a time by a
//! single log-loss gradient step per outcome.

use std::ops::RangeInclusive;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::probs::{logit, sigmoid};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlattConfig {
    /// Learning rate of the gradient step.
    pub lr: f64,
    /// L2 penalty pulling both parameters towards zero.
    pub reg: f64,
    pub clip_a: RangeInclusive<f64>,
    pub clip_b: RangeInclusive<f64>,
}
impl PlattConfig {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.lr.is_finite() && self.lr > 0.0) {
            bail!("learning rate must be positive");
        }
        if !(self.reg.is_finite() && self.reg >= 0.0) {
            bail!("regularisation must be non-negative");
        }
        for (name, clip) in [("a", &self.clip_a), ("b", &self.clip_b)] {
            if clip.start() > clip.end() {
                bail!("clip range for {name} is empty: {clip:?}");
            }
        }
        if !self.clip_a.contains(&1.0) || !self.clip_b.contains(&0.0) {
            bail!("clip ranges must admit the identity transform");
        }
        Ok(())
    }
}

impl Default for PlattConfig {
    fn default() -> Self {
        Self {
            lr: 0.03,
            reg: 0.001,
            clip_a: -3.0..=3.0,
            clip_b: -3.0..=3.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibratorSnapshot {
    pub a: f64,
    pub b: f64,
    pub n: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlattCalibrator {
    config: PlattConfig,
    a: f64,
    b: f64,
    n: u64,
}
impl PlattCalibrator {
    /// Starts from the identity transform (`a = 1`, `b = 0`).
    pub fn new(config: PlattConfig) -> Self {
        Self {
            config,
            a: 1.0,
            b: 0.0,
            n: 0,
        }
    }

    pub fn predict(&self, raw_prob: f64) -> f64 {
        sigmoid(self.a * logit(raw_prob) + self.b)
    }

    /// Steps both parameters towards the observed outcome. A probability outside `(0, 1)`
    /// carries no usable gradient and leaves the calibrator untouched.
    pub fn update(&mut self, raw_prob: f64, outcome: bool) {
        if !(raw_prob > 0.0 && raw_prob < 1.0) {
            return;
        }
        let y = if outcome { 1.0 } else { 0.0 };
        let diff = self.predict(raw_prob) - y;
        let grad_a = diff * logit(raw_prob) + self.config.reg * self.a;
        let grad_b = diff + self.config.reg * self.b;

        self.a = clip(self.a - self.config.lr * grad_a, &self.config.clip_a);
        self.b = clip(self.b - self.config.lr * grad_b, &self.config.clip_b);
        self.n += 1;
    }

    pub fn snapshot(&self) -> CalibratorSnapshot {
        CalibratorSnapshot {
            a: self.a,
            b: self.b,
            n: self.n,
        }
    }
}

impl Default for PlattCalibrator {
    fn default() -> Self {
        Self::new(PlattConfig::default())
    }
}

#[inline]
fn clip(value: f64, range: &RangeInclusive<f64>) -> f64 {
    value.clamp(*range.start(), *range.end())
}
