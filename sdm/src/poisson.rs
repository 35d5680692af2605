//! Poisson probability mass over a truncated support `0..=max`.
//!
//! Terms are accumulated as logarithms, `ln p(k) = ln p(k - 1) + ln λ - ln k`, so no factorial is
//! materialised and callers facing rates large enough to underflow `e^-λ` can still work with the
//! relative weights of the terms.

/// Fills `ln_probs[k]` with the log-probability of exactly `k` events. A zero rate puts all of
/// the mass on `k = 0`, with `-inf` elsewhere.
pub fn fill_ln_univariate(lambda: f64, ln_probs: &mut [f64]) {
    let ln_lambda = lambda.ln();
    let mut ln_prob = -lambda;
    for (k, slot) in ln_probs.iter_mut().enumerate() {
        if k > 0 {
            ln_prob += ln_lambda - (k as f64).ln();
        }
        *slot = ln_prob;
    }
}

/// Fills `probs[k]` with the probability of exactly `k` events.
pub fn fill_univariate(lambda: f64, probs: &mut [f64]) {
    fill_ln_univariate(lambda, probs);
    for prob in probs {
        *prob = prob.exp();
    }
}

pub fn ln_univariate_series(lambda: f64, max: usize) -> Vec<f64> {
    let mut ln_probs = vec![0.0; max + 1];
    fill_ln_univariate(lambda, &mut ln_probs);
    ln_probs
}

pub fn univariate_series(lambda: f64, max: usize) -> Vec<f64> {
    let mut probs = vec![0.0; max + 1];
    fill_univariate(lambda, &mut probs);
    probs
}
