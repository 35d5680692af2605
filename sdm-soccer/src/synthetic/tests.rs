use super::*;
use crate::backtest::{Backtest, BacktestConfig};
use crate::domain::{Market, Selection};
use crate::impact::NoImpact;
use crate::odds::{map_odds, MarketMappingWarning, MARKET_TABLE};
use rustc_hash::FxHashMap;

#[test]
fn round_robin_even() {
    let rounds = double_round_robin(6);
    assert_eq!(10, rounds.len());
    let mut fixtures = FxHashMap::default();
    for pairings in &rounds {
        assert_eq!(3, pairings.len());
        let mut seen = vec![false; 6];
        for &(home, away) in pairings {
            assert_ne!(home, away);
            assert!(!seen[home] && !seen[away]);
            seen[home] = true;
            seen[away] = true;
            *fixtures.entry((home, away)).or_insert(0) += 1;
        }
    }
    assert_eq!(30, fixtures.len());
    assert!(fixtures.values().all(|&count| count == 1));
}

#[test]
fn round_robin_odd_has_byes() {
    let rounds = double_round_robin(5);
    assert_eq!(10, rounds.len());
    assert!(rounds.iter().all(|pairings| pairings.len() == 2));
    assert_eq!(20, rounds.iter().map(Vec::len).sum::<usize>());
}

#[test]
fn season_shape() {
    let config = SeasonConfig {
        teams: 6,
        ..SeasonConfig::default()
    };
    let season = generate(&config).unwrap();
    assert_eq!(6, season.profiles.len());
    assert_eq!(30, season.contests.len());
    for pair in season.contests.windows(2) {
        assert!(pair[0].date < pair[1].date);
        assert!(pair[0].id < pair[1].id);
    }
    for contest in &season.contests {
        assert!(contest.score().is_some());
        let xg = contest.expected_goals;
        assert!(xg.home.unwrap() > 0.0 && xg.away.unwrap() > 0.0);
        for team in [&contest.teams.home, &contest.teams.away] {
            assert!(season
                .ratings
                .rating(config.league, contest.round.as_deref(), &team.name)
                .is_some());
        }
    }
}

#[test]
fn seeded_generation_is_deterministic() {
    let config = SeasonConfig::default();
    assert_eq!(generate(&config).unwrap(), generate(&config).unwrap());
    let reseeded = generate(&SeasonConfig { seed: 1, ..config }).unwrap();
    assert_ne!(generate(&SeasonConfig::default()).unwrap().contests, reseeded.contests);
}

#[test]
fn quotes_map_onto_the_market_table() {
    let season = generate(&SeasonConfig::default()).unwrap();
    for contest in &season.contests {
        let (odds, warnings) = map_odds(contest.odds.as_ref().unwrap());
        for def in MARKET_TABLE {
            for (selection, _) in def.selections {
                assert!(odds.price(def.market, *selection).is_some(), "{} {}", def.market, selection.label());
            }
        }
        assert!(odds.price(Market::BothTeamsToScore, Selection::No).is_some());
        assert_eq!(1, warnings.len(), "{warnings:?}");
        assert!(matches!(
            warnings[0],
            MarketMappingWarning::InconsistentBooksum {
                market: Market::DoubleChance,
                ..
            }
        ));
    }
}

#[test]
fn replays_are_idempotent() {
    let season = generate(&SeasonConfig::default()).unwrap();
    let backtest = Backtest::new(BacktestConfig::default(), &season.ratings, NoImpact);
    let first = backtest.run_contests(&season.contests);
    assert!(first.total > 0);
    assert_eq!(season.contests.len(), first.total + first.warming);
    assert_eq!(first, backtest.run_contests(&season.contests));
}

#[test]
fn config_validation() {
    assert!(SeasonConfig::default().validate().is_ok());
    let config = SeasonConfig {
        teams: 1,
        ..SeasonConfig::default()
    };
    assert_eq!("at least two teams are required", config.validate().unwrap_err().to_string());
    let config = SeasonConfig {
        overround: 0.9,
        ..SeasonConfig::default()
    };
    assert_eq!("overround must be at least 1", config.validate().unwrap_err().to_string());
}
