//! Order registry
//!
//! Single owner of every order seen in the session, live or terminal.

use std::collections::HashMap;

use super::Order;
use crate::error::{PitchError, Result};
use crate::parser::OrderId;

/// Orders keyed by id
///
/// Removed orders stay here as terminal state for analysis but no longer
/// resolve through [`get`](Self::get) or [`get_mut`](Self::get_mut).
#[derive(Debug, Default)]
pub struct OrderRegistry {
    orders: HashMap<OrderId, Order>,
}

impl OrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new order; ids are never reused within a session
    pub fn insert(&mut self, order: Order) -> Result<()> {
        if self.orders.contains_key(&order.id) {
            return Err(PitchError::DuplicateOrder(order.id));
        }
        self.orders.insert(order.id, order);
        Ok(())
    }

    /// Resolve a live order
    pub fn get(&self, order_id: OrderId) -> Result<&Order> {
        self.orders
            .get(&order_id)
            .filter(|order| order.resident)
            .ok_or(PitchError::UnknownOrderReference(order_id))
    }

    /// Resolve a live order for mutation
    pub fn get_mut(&mut self, order_id: OrderId) -> Result<&mut Order> {
        self.orders
            .get_mut(&order_id)
            .filter(|order| order.resident)
            .ok_or(PitchError::UnknownOrderReference(order_id))
    }

    /// Any order ever registered, live or terminal
    pub fn order(&self, order_id: OrderId) -> Option<&Order> {
        self.orders.get(&order_id)
    }

    pub(crate) fn entry_mut(&mut self, order_id: OrderId) -> Option<&mut Order> {
        self.orders.get_mut(&order_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Number of orders currently resident in a book
    pub fn live_count(&self) -> usize {
        self.orders.values().filter(|order| order.resident).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Side;
    use crate::parser::Symbol;

    fn order(id: OrderId) -> Order {
        Order::new(id, Symbol::from("AAPL"), Side::Bid, 100, 1_000_000)
    }

    #[test]
    fn test_insert_and_resolve() {
        let mut registry = OrderRegistry::new();
        registry.insert(order(1)).unwrap();
        // not resident until a book accepts it
        assert!(matches!(
            registry.get(1),
            Err(PitchError::UnknownOrderReference(1))
        ));

        registry.entry_mut(1).unwrap().resident = true;
        assert_eq!(registry.get(1).unwrap().id, 1);
        registry.get_mut(1).unwrap().size -= 40;
        assert_eq!(registry.get(1).unwrap().size, 60);
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn test_unknown_order() {
        let mut registry = OrderRegistry::new();
        assert!(matches!(
            registry.get_mut(9),
            Err(PitchError::UnknownOrderReference(9))
        ));
        assert!(registry.order(9).is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = OrderRegistry::new();
        registry.insert(order(1)).unwrap();
        assert!(matches!(
            registry.insert(order(1)),
            Err(PitchError::DuplicateOrder(1))
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_terminal_orders_remain_queryable() {
        let mut registry = OrderRegistry::new();
        registry.insert(order(3)).unwrap();
        assert!(registry.order(3).is_some());
        assert!(registry.get(3).is_err());
        assert_eq!(registry.iter().count(), 1);
        assert!(!registry.is_empty());
    }
}
