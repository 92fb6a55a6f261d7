//! Order book metrics calculation

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Level, OrderBook};
use crate::parser::price_to_decimal;

/// Computed metrics for an order book
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderBookMetrics {
    /// Mid price (average of best bid and ask)
    pub mid_price: Option<Decimal>,

    /// Best ask minus best bid
    pub spread: Option<Decimal>,

    /// Shares resting at the best bid
    pub bid_top_shares: i64,

    /// Shares resting at the best ask
    pub ask_top_shares: i64,

    /// Number of bid levels
    pub bid_levels: usize,

    /// Number of ask levels
    pub ask_levels: usize,

    /// Orders resident on either side
    pub resident_orders: usize,
}

impl OrderBookMetrics {
    pub(crate) fn compute(book: &OrderBook, bids: &[Level], asks: &[Level]) -> Self {
        let best_bid = book.best_bid().map(price_to_decimal);
        let best_ask = book.best_ask().map(price_to_decimal);

        let (mid_price, spread) = match (best_bid, best_ask) {
            (Some(bid), Some(ask)) => (Some((bid + ask) / Decimal::from(2)), Some(ask - bid)),
            _ => (None, None),
        };

        Self {
            mid_price,
            spread,
            bid_top_shares: bids.first().map_or(0, |level| level.shares),
            ask_top_shares: asks.first().map_or(0, |level| level.shares),
            bid_levels: book.bid_levels(),
            ask_levels: book.ask_levels(),
            resident_orders: book.resident_orders(),
        }
    }

    /// Both sides quoted
    pub fn is_two_sided(&self) -> bool {
        self.bid_levels > 0 && self.ask_levels > 0
    }

    /// Best bid at or through the best ask
    ///
    /// Books are never matched here, so a crossed feed stays crossed.
    pub fn is_crossed(&self) -> bool {
        self.spread.is_some_and(|spread| spread <= Decimal::ZERO)
    }
}
