//! Sport-agnostic numerics for score distribution modelling: Poisson terms, probability
//! slices, online Platt calibration, staking with a running ledger and a derivative-free
//! hypergrid optimiser.

#![allow(clippy::too_many_arguments)]

pub mod calibrate;
pub mod comb;
pub mod file;
pub mod linear;
pub mod market;
pub mod opt;
pub mod poisson;
pub mod probs;
pub mod stake;

#[doc = include_str!("../../README.md")]
#[cfg(doc)]
fn readme() {}
