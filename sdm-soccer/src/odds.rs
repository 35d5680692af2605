//! Mapping of free-text bookmaker markets onto [`Market`] and [`Selection`].
//!
//! Names are matched through [`MARKET_TABLE`] after trimming and lowercasing. Anything that
//! cannot be mapped, or maps to implausible prices, is reported as a [`MarketMappingWarning`];
//! mapping never fails.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Serialize;
use thiserror::Error;

use sdm::market::{booksum, is_sane_price, PriceBounds};

use crate::data::{OddsMarket, OddsPayload};
use crate::domain::{Market, Selection};

pub struct MarketDef {
    pub market: Market,
    pub names: &'static [&'static str],
    pub selections: &'static [(Selection, &'static [&'static str])],
}

pub const MARKET_TABLE: &[MarketDef] = &[
    MarketDef {
        market: Market::Over25,
        names: &["O/U 2.5", "Over/Under 2.5"],
        selections: &[(Selection::Over, &["Over 2.5"]), (Selection::Under, &["Under 2.5"])],
    },
    MarketDef {
        market: Market::Over35,
        names: &["O/U 3.5", "Over/Under 3.5"],
        selections: &[(Selection::Over, &["Over 3.5"]), (Selection::Under, &["Under 3.5"])],
    },
    MarketDef {
        market: Market::BothTeamsToScore,
        names: &["Both Teams Score", "Both Teams To Score"],
        selections: &[
            (Selection::Yes, &["Yes", "Both Teams Score", "BTTS Yes"]),
            (Selection::No, &["No", "BTTS No"]),
        ],
    },
    MarketDef {
        market: Market::AwayOver05,
        names: &["Away Team Total Goals"],
        selections: &[(Selection::Over, &["Over 0.5", "Away Over 0.5"])],
    },
    MarketDef {
        market: Market::DoubleChance,
        names: &["Double Chance"],
        selections: &[
            (Selection::HomeOrDraw, &["1X", "Home/Draw"]),
            (Selection::AwayOrDraw, &["X2", "Draw/Away"]),
            (Selection::HomeOrAway, &["12", "Home/Away"]),
        ],
    },
];

pub const SANE_PRICES: PriceBounds = 1.01..=150.0;

pub const PLAUSIBLE_BOOKSUM: RangeInclusive<f64> = 0.7..=1.4;

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
pub enum MarketMappingWarning {
    #[error("market missing: {0}")]
    MissingMarket(Market),

    #[error("{market}: missing outcomes: {}", join_selections(.selections))]
    MissingOutcomes { market: Market, selections: Vec<Selection> },

    #[error("{market}: price out of bounds for {selection}: {price}")]
    PriceOutOfBounds { market: Market, selection: Selection, price: f64 },

    #[error("{market}: implied probability sum looks inconsistent: {booksum:.2}")]
    InconsistentBooksum { market: Market, booksum: f64 },

    #[error("unmapped market: {0}")]
    UnmappedMarket(String),
}

fn join_selections(selections: &[Selection]) -> String {
    selections.iter().map(Selection::label).collect::<Vec<_>>().join(", ")
}

#[inline]
pub fn normalise_name(name: &str) -> String {
    name.trim().to_lowercase()
}

impl MarketDef {
    fn matches_name(&self, name: &str) -> bool {
        let name = normalise_name(name);
        self.names.iter().any(|candidate| normalise_name(candidate) == name)
    }

    fn resolve_selection(&self, outcome_name: &str) -> Option<Selection> {
        let name = normalise_name(outcome_name);
        self.selections
            .iter()
            .find(|(_, labels)| labels.iter().any(|label| normalise_name(label) == name))
            .map(|(selection, _)| *selection)
    }
}

/// Prices keyed by canonical market and selection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MappedOdds {
    prices: BTreeMap<(Market, Selection), f64>,
}
impl MappedOdds {
    pub fn price(&self, market: Market, selection: Selection) -> Option<f64> {
        self.prices.get(&(market, selection)).copied()
    }
}

fn map_market(def: &MarketDef, market: &OddsMarket, odds: &mut MappedOdds, warnings: &mut Vec<MarketMappingWarning>) {
    let mut mapped = BTreeMap::new();
    for outcome in &market.outcomes {
        if let (Some(selection), Some(price)) = (def.resolve_selection(&outcome.name), outcome.price) {
            mapped.insert(selection, price);
        }
    }

    let missing: Vec<_> = def
        .selections
        .iter()
        .map(|(selection, _)| *selection)
        .filter(|selection| !mapped.contains_key(selection))
        .collect();
    if !missing.is_empty() {
        warnings.push(MarketMappingWarning::MissingOutcomes {
            market: def.market,
            selections: missing,
        });
    }

    for (&selection, &price) in &mapped {
        if !is_sane_price(price, &SANE_PRICES) {
            warnings.push(MarketMappingWarning::PriceOutOfBounds {
                market: def.market,
                selection,
                price,
            });
        }
    }

    if mapped.len() >= 2 {
        let prices: Vec<_> = mapped.values().copied().collect();
        let booksum = booksum(&prices);
        if !PLAUSIBLE_BOOKSUM.contains(&booksum) {
            warnings.push(MarketMappingWarning::InconsistentBooksum {
                market: def.market,
                booksum,
            });
        }
    }

    for (selection, price) in mapped {
        odds.prices.insert((def.market, selection), price);
    }
}

/// Maps the payload onto canonical prices. The first payload market matching a table entry
/// is used; payload markets matching no entry are reported once per distinct name.
pub fn map_odds(payload: &OddsPayload) -> (MappedOdds, Vec<MarketMappingWarning>) {
    let mut odds = MappedOdds::default();
    let mut warnings = vec![];

    for def in MARKET_TABLE {
        match payload.markets.iter().find(|market| def.matches_name(&market.name)) {
            None => warnings.push(MarketMappingWarning::MissingMarket(def.market)),
            Some(market) => map_market(def, market, &mut odds, &mut warnings),
        }
    }

    let mut unmapped: Vec<String> = vec![];
    for market in &payload.markets {
        if !MARKET_TABLE.iter().any(|def| def.matches_name(&market.name)) && !unmapped.contains(&market.name) {
            unmapped.push(market.name.clone());
        }
    }
    warnings.extend(unmapped.into_iter().map(MarketMappingWarning::UnmappedMarket));

    (odds, warnings)
}

#[cfg(test)]
mod tests;
