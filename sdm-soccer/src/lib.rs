//! Football on top of `sdm`: validated contest records, odds-market mapping, scoring-rate
//! estimation with roster impact, Dixon-Coles score grids and a chronological backtest with
//! online calibration and staking.

pub mod backtest;
pub mod data;
pub mod domain;
pub mod impact;
pub mod odds;
pub mod optimise;
pub mod print;
pub mod rating;
pub mod scoregrid;
pub mod strength;
pub mod synthetic;
pub mod validation;

#[doc = include_str!("../../README.md")]
#[cfg(doc)]
fn readme() {}
