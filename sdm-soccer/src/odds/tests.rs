use super::*;
use crate::data::OddsOutcome;
use rustc_hash::FxHashSet;

fn market(name: &str, outcomes: &[(&str, f64)]) -> OddsMarket {
    OddsMarket {
        name: name.to_string(),
        outcomes: outcomes
            .iter()
            .map(|&(name, price)| OddsOutcome {
                name: name.to_string(),
                price: Some(price),
            })
            .collect(),
    }
}

/// Number of (market, selection) pairs in the table that carry a price.
fn priced(odds: &MappedOdds) -> usize {
    MARKET_TABLE
        .iter()
        .flat_map(|def| def.selections.iter().map(move |(selection, _)| (def.market, *selection)))
        .filter(|&(market, selection)| odds.price(market, selection).is_some())
        .count()
}

fn complete_payload() -> OddsPayload {
    OddsPayload {
        markets: vec![
            market("O/U 2.5", &[("Over 2.5", 1.9), ("Under 2.5", 1.95)]),
            market("Over/Under 3.5", &[("Over 3.5", 2.8), ("Under 3.5", 15.0)]),
            market("Both Teams To Score", &[("Yes", 1.7), ("No", 2.1)]),
            market("Away Team Total Goals", &[("Over 0.5", 1.4)]),
            market("Double Chance", &[("1X", 1.3), ("X2", 1.6), ("12", 1.25)]),
        ],
    }
}

#[test]
fn table_is_consistent() {
    let mut market_names = FxHashSet::default();
    let mut markets = FxHashSet::default();
    for def in MARKET_TABLE {
        assert!(markets.insert(def.market), "duplicate entry for {}", def.market);
        for name in def.names {
            assert!(market_names.insert(normalise_name(name)), "duplicate market name {name}");
        }

        let mut labels = FxHashSet::default();
        let mut selections = FxHashSet::default();
        for (selection, selection_labels) in def.selections {
            assert!(selections.insert(*selection), "duplicate selection {selection} in {}", def.market);
            if def.market.is_binary() {
                assert!(
                    *selection == def.market.affirmative() || *selection == def.market.negative(),
                    "{selection} does not belong to {}",
                    def.market
                );
            }
            for label in *selection_labels {
                assert!(labels.insert(normalise_name(label)), "duplicate label {label} in {}", def.market);
            }
        }
    }
}

#[test]
fn complete_payload_maps_with_booksum_warnings() {
    let (odds, warnings) = map_odds(&complete_payload());
    assert_eq!(Some(1.9), odds.price(Market::Over25, Selection::Over));
    assert_eq!(Some(15.0), odds.price(Market::Over35, Selection::Under));
    assert_eq!(Some(1.7), odds.price(Market::BothTeamsToScore, Selection::Yes));
    assert_eq!(Some(1.4), odds.price(Market::AwayOver05, Selection::Over));
    assert_eq!(None, odds.price(Market::AwayOver05, Selection::Under));
    assert_eq!(Some(1.25), odds.price(Market::DoubleChance, Selection::HomeOrAway));
    assert_eq!(10, priced(&odds));

    assert_eq!(2, warnings.len(), "{warnings:?}");
    assert!(matches!(
        warnings[0],
        MarketMappingWarning::InconsistentBooksum { market: Market::Over35, .. }
    ));
    assert!(matches!(
        warnings[1],
        MarketMappingWarning::InconsistentBooksum { market: Market::DoubleChance, .. }
    ));
    assert_eq!(
        "ou35: implied probability sum looks inconsistent: 0.42",
        warnings[0].to_string()
    );
}

#[test]
fn names_match_after_normalisation() {
    let payload = OddsPayload {
        markets: vec![market("  o/u 2.5 ", &[(" OVER 2.5", 2.0), ("under 2.5  ", 1.9)])],
    };
    let (odds, _) = map_odds(&payload);
    assert_eq!(Some(2.0), odds.price(Market::Over25, Selection::Over));
    assert_eq!(Some(1.9), odds.price(Market::Over25, Selection::Under));
}

#[test]
fn missing_markets_and_outcomes() {
    let payload = OddsPayload {
        markets: vec![
            market("O/U 2.5", &[("Over 2.5", 1.9)]),
            market("Match Winner", &[("Home", 2.0)]),
            market("Match Winner", &[("Home", 2.1)]),
        ],
    };
    let (odds, warnings) = map_odds(&payload);
    assert_eq!(1, priced(&odds));
    assert_eq!(
        vec![
            MarketMappingWarning::MissingOutcomes {
                market: Market::Over25,
                selections: vec![Selection::Under]
            },
            MarketMappingWarning::MissingMarket(Market::Over35),
            MarketMappingWarning::MissingMarket(Market::BothTeamsToScore),
            MarketMappingWarning::MissingMarket(Market::AwayOver05),
            MarketMappingWarning::MissingMarket(Market::DoubleChance),
            MarketMappingWarning::UnmappedMarket("Match Winner".to_string()),
        ],
        warnings
    );
    assert_eq!("ou25: missing outcomes: under", warnings[0].to_string());
    assert_eq!("market missing: btts", warnings[2].to_string());
}

#[test]
fn unpriced_outcomes_count_as_missing() {
    let payload = OddsPayload {
        markets: vec![OddsMarket {
            name: "Double Chance".to_string(),
            outcomes: vec![
                OddsOutcome {
                    name: "1X".to_string(),
                    price: None,
                },
                OddsOutcome {
                    name: "X2".to_string(),
                    price: Some(1.5),
                },
            ],
        }],
    };
    let (odds, warnings) = map_odds(&payload);
    assert_eq!(None, odds.price(Market::DoubleChance, Selection::HomeOrDraw));
    assert_eq!(
        MarketMappingWarning::MissingOutcomes {
            market: Market::DoubleChance,
            selections: vec![Selection::HomeOrDraw, Selection::HomeOrAway]
        },
        warnings[4]
    );
}

#[test]
fn out_of_bounds_prices_are_flagged_but_kept() {
    let payload = OddsPayload {
        markets: vec![market("Both Teams Score", &[("Yes", 1.0), ("No", 1.8)])],
    };
    let (odds, warnings) = map_odds(&payload);
    assert_eq!(Some(1.0), odds.price(Market::BothTeamsToScore, Selection::Yes));
    assert!(warnings.contains(&MarketMappingWarning::PriceOutOfBounds {
        market: Market::BothTeamsToScore,
        selection: Selection::Yes,
        price: 1.0
    }));
    // 1/1.0 + 1/1.8
    assert!(warnings.contains(&MarketMappingWarning::InconsistentBooksum {
        market: Market::BothTeamsToScore,
        booksum: 1.0 + 1.0 / 1.8
    }));
}
