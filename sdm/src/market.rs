//! Decimal price helpers.

use std::ops::RangeInclusive;

pub type PriceBounds = RangeInclusive<f64>;

#[inline]
pub fn implied_probability(price: f64) -> f64 {
    1.0 / price
}

/// Sum of the implied probabilities of the given prices. A fair book sums to 1; bookmaker
/// margin pushes the sum above 1.
pub fn booksum(prices: &[f64]) -> f64 {
    prices.iter().copied().map(implied_probability).sum()
}

#[inline]
pub fn is_sane_price(price: f64, bounds: &PriceBounds) -> bool {
    price.is_finite() && bounds.contains(&price)
}
