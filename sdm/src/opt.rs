//! Derivative-free optimisation.

use std::ops::RangeInclusive;

use anyhow::bail;

use crate::comb::{count_permutations, pick};

#[derive(Clone, Debug)]
pub struct HypergridSearchConfig<'a> {
    pub max_steps: u64,
    pub acceptable_residual: f64,
    pub bounds: &'a [RangeInclusive<f64>],
    pub resolution: usize,
}
impl HypergridSearchConfig<'_> {
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_steps == 0 {
            bail!("at least one step must be specified")
        }
        if self.acceptable_residual < 0.0 {
            bail!("acceptable residual must be non-negative")
        }
        if self.bounds.is_empty() {
            bail!("at least one search dimension must be specified")
        }
        if let Some(bound) = self.bounds.iter().find(|bound| bound.start() > bound.end()) {
            bail!("search bound {bound:?} is empty")
        }
        const MIN_RESOLUTION: usize = 3;
        if self.resolution < MIN_RESOLUTION {
            bail!("search resolution must be at least {MIN_RESOLUTION}")
        }
        Ok(())
    }
}

#[derive(Debug)]
pub struct HypergridSearchOutcome {
    pub steps: u64,
    pub evaluations: u64,
    pub optimal_values: Vec<f64>,
    pub optimal_residual: f64,
}

/// Evaluates `loss_f` over a regular grid of `resolution` points per dimension, then narrows
/// every dimension around the best point found so far and repeats, for up to `max_steps`
/// rounds. Points rejected by `constraint_f` are not evaluated. The narrowed bounds never
/// leave the original `bounds`.
pub fn hypergrid_search(
    config: &HypergridSearchConfig,
    mut constraint_f: impl FnMut(&[f64]) -> bool,
    mut loss_f: impl FnMut(&[f64]) -> f64,
) -> Result<HypergridSearchOutcome, anyhow::Error> {
    config.validate()?;

    let dimensions = config.bounds.len();
    let mut values = vec![0.0; dimensions];
    let mut optimal_values: Vec<f64> = config.bounds.iter().map(|bound| *bound.start()).collect();
    let mut optimal_residual = f64::MAX;

    let cardinalities = vec![config.resolution; dimensions];
    let mut ordinals = cardinalities.clone();
    let permutations = count_permutations(&cardinalities);
    let mut bounds = config.bounds.to_vec();
    let inv_resolution = 1.0 / (config.resolution - 1) as f64;

    let (mut steps, mut evaluations) = (0, 0);
    'outer: while steps < config.max_steps {
        steps += 1;

        for permutation in 0..permutations {
            pick(&cardinalities, permutation, &mut ordinals);
            for (dimension, &ordinal) in ordinals.iter().enumerate() {
                let bound = &bounds[dimension];
                let range = bound.end() - bound.start();
                values[dimension] = bound.start() + ordinal as f64 * range * inv_resolution;
            }

            if constraint_f(&values) {
                evaluations += 1;
                let residual = loss_f(&values);
                if residual < optimal_residual {
                    optimal_residual = residual;
                    optimal_values.copy_from_slice(&values);

                    if residual <= config.acceptable_residual {
                        break 'outer;
                    }
                }
            }
        }

        for (dimension, &value) in optimal_values.iter().enumerate() {
            let hard_bound = &config.bounds[dimension];
            let bound = &mut bounds[dimension];
            let new_range = (bound.end() - bound.start()) / config.resolution as f64;
            let new_start = f64::max(*hard_bound.start(), value - new_range / 2.0);
            let new_end = f64::min(new_start + new_range, *hard_bound.end());
            *bound = new_start..=new_end;
        }
    }

    Ok(HypergridSearchOutcome {
        steps,
        evaluations,
        optimal_values,
        optimal_residual,
    })
}
