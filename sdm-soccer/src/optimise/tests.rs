use super::*;
use crate::impact::{KeyPlayerImpact, NoImpact};
use crate::validation::Dataset;
use assert_float_eq::*;
use sdm::file::read_json;
use strum::IntoEnumIterator;

fn sample() -> (Dataset, RatingArchive) {
    let dataset = Dataset::read_json_file("resources/test/history_sample.json").unwrap();
    let ratings = read_json("resources/test/ratings_sample.json").unwrap();
    (dataset, ratings)
}

#[test]
fn dimension_accessors() {
    let mut config = ModelConfig::default();
    for (index, dimension) in Dimension::iter().enumerate() {
        dimension.set(&mut config, index as f64);
        assert_eq!(index as f64, dimension.get(&config));
        assert!(dimension.default_bounds().start() < dimension.default_bounds().end());
    }
    assert_eq!(2.0, config.rho);
    assert_eq!(ModelConfig::default().impact_offensive, config.impact_offensive);
}

#[test]
fn weights_combine_losses() {
    let losses = ScoringLosses {
        brier_1x2: 0.2,
        nll_score: 3.0,
        brier_sub: 0.4,
    };
    assert_float_absolute_eq!(0.11 + 0.9 + 0.06, LossWeights::default().combine(&losses));
}

#[test]
fn default_loss_of_sample() {
    let (dataset, ratings) = sample();
    let replay = replay_loss(
        BacktestConfig::default(),
        &ratings,
        KeyPlayerImpact::default(),
        &dataset.contests,
        &LossWeights::default(),
    );
    assert_eq!(21, replay.evaluated);
    assert_float_absolute_eq!(0.9931981002732784, replay.loss, 1e-9);
}

#[test]
fn search_improves_on_defaults() {
    let (dataset, ratings) = sample();
    let optimiser = OptimiserConfig {
        dimensions: vec![SearchDimension {
            dimension: Dimension::Rho,
            bounds: Dimension::Rho.default_bounds(),
        }],
        max_steps: 1,
        resolution: 3,
        weights: LossWeights::default(),
    };
    let outcome = optimise(
        &BacktestConfig::default(),
        &ratings,
        &KeyPlayerImpact::default(),
        &dataset.contests,
        &optimiser,
    )
    .unwrap();
    assert_eq!(1, outcome.steps);
    assert_eq!(3, outcome.evaluations);
    assert_eq!(0.3, outcome.config.rho);
    assert_eq!(ModelConfig::default().hfa, outcome.config.hfa);
    assert_float_absolute_eq!(0.9931981002732784, outcome.initial_loss, 1e-9);
    assert_float_absolute_eq!(0.9853578906955507, outcome.replay.loss, 1e-9);
    assert!(outcome.replay.loss < outcome.initial_loss);

    let params = ParamsFile::new(&outcome, &optimiser.weights);
    let value = serde_json::to_value(&params).unwrap();
    assert_eq!(outcome.config, ModelConfig::from_params_value(value).unwrap());
}

#[test]
fn no_history_no_search() {
    let (dataset, ratings) = sample();
    let err = optimise(
        &BacktestConfig::default(),
        &ratings,
        &NoImpact,
        &dataset.contests[..2],
        &OptimiserConfig::default(),
    )
    .unwrap_err();
    assert_eq!("no contest has enough history to be evaluated", err.to_string());
}
