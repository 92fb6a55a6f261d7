//! Top-of-book residency analysis
//!
//! For every order that entered its book at the best price, the time it held
//! that position is `exit_time - entry_time`. Orders still at the top when the
//! stream ends have no exit time; they are counted separately and never enter
//! the average.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::orderbook::OrderRegistry;
use crate::parser::Symbol;

/// Residency statistics for one symbol
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Residency {
    pub symbol: Symbol,
    /// Top-of-book orders with a defined duration
    pub measured: usize,
    /// Top-of-book orders with no exit time at end of stream
    pub still_at_top: usize,
    /// Sum of measured durations, in seconds
    pub total_secs: f64,
    /// `total_secs / measured`; `None` when nothing was measured
    pub average_secs: Option<f64>,
}

impl Residency {
    fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            measured: 0,
            still_at_top: 0,
            total_secs: 0.0,
            average_secs: None,
        }
    }
}

/// Derive per-symbol residency from terminal order state, ordered by symbol
pub fn analyze(registry: &OrderRegistry) -> Vec<Residency> {
    let mut by_symbol: BTreeMap<Symbol, Residency> = BTreeMap::new();

    for order in registry.iter().filter(|order| order.entry_at_top) {
        let stats = by_symbol
            .entry(order.symbol)
            .or_insert_with(|| Residency::new(order.symbol));
        match order.top_of_book_duration() {
            Some(duration) => {
                stats.measured += 1;
                stats.total_secs += duration;
            }
            None => stats.still_at_top += 1,
        }
    }

    by_symbol
        .into_values()
        .map(|mut stats| {
            if stats.measured > 0 {
                stats.average_secs = Some(stats.total_secs / stats.measured as f64);
            }
            stats
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{EventTime, Order, Side};
    use crate::parser::OrderId;

    fn top_order(id: OrderId, symbol: &str, entry: u64, exit: Option<u64>) -> Order {
        let mut order = Order::new(id, Symbol::from(symbol), Side::Bid, 100, 1_000);
        order.entry_at_top = true;
        order.entry_time = Some(EventTime::from_secs(entry));
        order.exit_time = exit.map(EventTime::from_secs);
        order
    }

    #[test]
    fn test_average_per_symbol() {
        let mut registry = OrderRegistry::new();
        registry.insert(top_order(1, "AAPL", 0, Some(2))).unwrap();
        registry.insert(top_order(2, "AAPL", 1, Some(5))).unwrap();
        registry.insert(top_order(3, "MSFT", 3, Some(4))).unwrap();

        let stats = analyze(&registry);
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].symbol.text(), "AAPL");
        assert_eq!(stats[0].measured, 2);
        assert_eq!(stats[0].average_secs, Some(3.0));
        assert_eq!(stats[1].average_secs, Some(1.0));
    }

    #[test]
    fn test_orders_still_at_top_are_excluded() {
        let mut registry = OrderRegistry::new();
        registry.insert(top_order(1, "AAPL", 0, Some(4))).unwrap();
        registry.insert(top_order(2, "AAPL", 1, None)).unwrap();

        let stats = analyze(&registry);
        assert_eq!(stats[0].measured, 1);
        assert_eq!(stats[0].still_at_top, 1);
        assert_eq!(stats[0].average_secs, Some(4.0));
    }

    #[test]
    fn test_symbol_with_only_unresolved_orders_has_no_average() {
        let mut registry = OrderRegistry::new();
        registry.insert(top_order(1, "PG", 0, None)).unwrap();

        let stats = analyze(&registry);
        assert_eq!(stats[0].average_secs, None);
        assert_eq!(stats[0].still_at_top, 1);
    }

    #[test]
    fn test_orders_not_entering_at_top_are_ignored() {
        let mut registry = OrderRegistry::new();
        let mut order = top_order(1, "AAPL", 0, Some(9));
        order.entry_at_top = false;
        registry.insert(order).unwrap();

        assert!(analyze(&registry).is_empty());
    }
}
