//! Order book manager
//!
//! Dispatches decoded messages onto the registry and the per-symbol books,
//! threading the session clock.

use std::collections::HashMap;
use tracing::{debug, info};

use super::{BookSnapshot, EventTime, Order, OrderBook, OrderRegistry, SessionClock};
use crate::error::{PitchError, Result};
use crate::parser::{AddOrder, Message, ModifyOrder, OrderId, Symbol};

/// Book-level effect of applying one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookEvent {
    /// Time message moved the clock base
    ClockReset,
    /// New order inserted
    Added,
    /// Price change: removed and re-inserted
    Repriced,
    /// Size changed, order still resident
    Resized,
    /// Order left the book
    Removed,
    /// Trade, trade break, or end of session; no book change
    Informational,
}

/// Manages order books for multiple symbols
#[derive(Debug)]
pub struct OrderBookManager {
    books: HashMap<Symbol, OrderBook>,
    registry: OrderRegistry,
    clock: SessionClock,
    max_depth: usize,
    applied: u64,
}

impl Default for OrderBookManager {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderBookManager {
    /// Create a new order book manager
    pub fn new() -> Self {
        Self::with_depth(10)
    }

    /// Create with custom snapshot depth
    pub fn with_depth(max_depth: usize) -> Self {
        Self {
            books: HashMap::new(),
            registry: OrderRegistry::new(),
            clock: SessionClock::new(),
            max_depth,
            applied: 0,
        }
    }

    /// Apply one message in feed order
    ///
    /// Errors are data-integrity failures; the caller should stop the stream.
    pub fn apply(&mut self, message: &Message) -> Result<BookEvent> {
        let event = match message {
            Message::Time(time) => {
                self.clock.reset(time.seconds);
                BookEvent::ClockReset
            }
            Message::AddOrderLong(add) | Message::AddOrderShort(add) => self.add_order(add)?,
            Message::ModifyOrderLong(modify) | Message::ModifyOrderShort(modify) => {
                self.modify_order(modify)?
            }
            Message::ReduceSizeLong(reduce) | Message::ReduceSizeShort(reduce) => {
                let now = self.clock.at(reduce.offset);
                let size = self.decrement(reduce.order_id, reduce.canceled_shares)?;
                self.remove_if(size <= 0, reduce.order_id, now)?
            }
            Message::OrderExecuted(exec) => {
                let now = self.clock.at(exec.offset);
                let size = self.decrement(exec.order_id, exec.executed_shares)?;
                self.remove_if(size <= 0, exec.order_id, now)?
            }
            Message::OrderExecutedAtPriceSize(exec) => {
                // the venue's remaining count decides removal, not the local size
                let now = self.clock.at(exec.offset);
                self.decrement(exec.order_id, exec.executed_shares)?;
                self.remove_if(exec.remaining_shares == 0, exec.order_id, now)?
            }
            Message::DeleteOrder(delete) => {
                let now = self.clock.at(delete.offset);
                self.remove(delete.order_id, now)?;
                BookEvent::Removed
            }
            Message::TradeLong(_) | Message::TradeShort(_) | Message::TradeBreak(_) => {
                BookEvent::Informational
            }
            Message::EndOfSession(end) => {
                info!(
                    at = self.clock.at(end.offset).as_secs_f64(),
                    books = self.books.len(),
                    live_orders = self.registry.live_count(),
                    "End of session"
                );
                BookEvent::Informational
            }
        };

        self.applied += 1;
        Ok(event)
    }

    fn add_order(&mut self, add: &AddOrder) -> Result<BookEvent> {
        let now = self.clock.at(add.offset);
        let order = Order::new(
            add.order_id,
            add.symbol,
            add.side,
            i64::from(add.shares),
            add.price,
        );
        self.registry.insert(order)?;

        let book = self
            .books
            .entry(add.symbol)
            .or_insert_with(|| OrderBook::new(add.symbol));
        book.add(&mut self.registry, add.order_id, now)?;

        debug!(
            order_id = add.order_id,
            symbol = %add.symbol,
            side = ?add.side,
            price = add.price,
            shares = add.shares,
            "Order added"
        );
        Ok(BookEvent::Added)
    }

    fn modify_order(&mut self, modify: &ModifyOrder) -> Result<BookEvent> {
        let now = self.clock.at(modify.offset);
        let order = self.registry.get_mut(modify.order_id)?;
        order.size = i64::from(modify.shares);
        let (symbol, old_price, size) = (order.symbol, order.price, order.size);

        if old_price != modify.price {
            let book = book_for(&mut self.books, symbol, modify.order_id)?;
            book.remove(&mut self.registry, modify.order_id, now)?;
            self.registry
                .entry_mut(modify.order_id)
                .ok_or(PitchError::UnknownOrderReference(modify.order_id))?
                .price = modify.price;
            book.add(&mut self.registry, modify.order_id, now)?;

            debug!(
                order_id = modify.order_id,
                symbol = %symbol,
                from = old_price,
                to = modify.price,
                "Order repriced"
            );
            return Ok(BookEvent::Repriced);
        }

        self.remove_if(size <= 0, modify.order_id, now)
    }

    /// Subtract shares from a live order, returning the new size
    fn decrement(&mut self, order_id: OrderId, shares: u32) -> Result<i64> {
        let order = self.registry.get_mut(order_id)?;
        order.size -= i64::from(shares);
        Ok(order.size)
    }

    fn remove_if(&mut self, condition: bool, order_id: OrderId, now: EventTime) -> Result<BookEvent> {
        if condition {
            self.remove(order_id, now)?;
            Ok(BookEvent::Removed)
        } else {
            Ok(BookEvent::Resized)
        }
    }

    fn remove(&mut self, order_id: OrderId, now: EventTime) -> Result<()> {
        let symbol = self.registry.get(order_id)?.symbol;
        let book = book_for(&mut self.books, symbol, order_id)?;
        book.remove(&mut self.registry, order_id, now)?;
        debug!(order_id, symbol = %symbol, "Order removed");
        Ok(())
    }

    /// Get the book of a specific symbol
    pub fn book(&self, symbol: &Symbol) -> Option<&OrderBook> {
        self.books.get(symbol)
    }

    pub fn books(&self) -> impl Iterator<Item = &OrderBook> {
        self.books.values()
    }

    /// Best bid and ask snapshot of a specific book
    pub fn snapshot(&self, symbol: &Symbol) -> Option<BookSnapshot> {
        self.books
            .get(symbol)
            .map(|book| book.snapshot(&self.registry, self.max_depth))
    }

    /// Snapshots of all books, ordered by symbol
    pub fn snapshots(&self) -> Vec<BookSnapshot> {
        let mut snapshots: Vec<_> = self
            .books
            .values()
            .map(|book| book.snapshot(&self.registry, self.max_depth))
            .collect();
        snapshots.sort_by_key(|snapshot| snapshot.symbol);
        snapshots
    }

    pub fn registry(&self) -> &OrderRegistry {
        &self.registry
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Get list of symbols being tracked
    pub fn symbols(&self) -> Vec<Symbol> {
        let mut symbols: Vec<_> = self.books.keys().copied().collect();
        symbols.sort();
        symbols
    }

    /// Check if a symbol exists
    pub fn has_symbol(&self, symbol: &Symbol) -> bool {
        self.books.contains_key(symbol)
    }

    /// Messages applied so far
    pub fn applied(&self) -> u64 {
        self.applied
    }

    /// Consume the manager, keeping the terminal order state
    pub fn into_registry(self) -> OrderRegistry {
        self.registry
    }
}

fn book_for(
    books: &mut HashMap<Symbol, OrderBook>,
    symbol: Symbol,
    order_id: OrderId,
) -> Result<&mut OrderBook> {
    books
        .get_mut(&symbol)
        .ok_or(PitchError::UnknownOrderReference(order_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::Side;
    use crate::parser::{
        DeleteOrder, EndOfSession, OrderExecuted, OrderExecutedAtPriceSize, ReduceSize, Time,
        Trade,
    };

    const AAPL: &str = "AAPL";

    fn add(order_id: OrderId, side: Side, price: u64, shares: u32, offset: u32) -> Message {
        Message::AddOrderLong(AddOrder {
            offset,
            order_id,
            side,
            shares,
            symbol: Symbol::from(AAPL),
            price,
        })
    }

    fn order(manager: &OrderBookManager, id: OrderId) -> &Order {
        manager.registry().order(id).unwrap()
    }

    #[test]
    fn test_add_creates_book() {
        let mut manager = OrderBookManager::new();
        manager.apply(&Message::Time(Time { seconds: 10 })).unwrap();
        let event = manager.apply(&add(1, Side::Bid, 100, 50, 500)).unwrap();

        assert_eq!(event, BookEvent::Added);
        assert!(manager.has_symbol(&Symbol::from(AAPL)));
        assert_eq!(
            order(&manager, 1).entry_time,
            Some(EventTime::from_nanos(10_000_000_500))
        );
        assert_eq!(manager.applied(), 2);
    }

    #[test]
    fn test_reduce_removes_at_zero() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Ask, 100, 50, 0)).unwrap();

        let reduce = |canceled_shares| {
            Message::ReduceSizeShort(ReduceSize {
                offset: 1,
                order_id: 1,
                canceled_shares,
            })
        };
        assert_eq!(manager.apply(&reduce(20)).unwrap(), BookEvent::Resized);
        assert_eq!(order(&manager, 1).size, 30);
        assert_eq!(manager.apply(&reduce(30)).unwrap(), BookEvent::Removed);
        assert_eq!(manager.book(&Symbol::from(AAPL)).unwrap().best_ask(), None);
    }

    #[test]
    fn test_execution_removes_when_filled() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Bid, 100, 50, 0)).unwrap();
        let exec = Message::OrderExecuted(OrderExecuted {
            offset: 2,
            order_id: 1,
            executed_shares: 60,
            execution_id: 7,
        });
        assert_eq!(manager.apply(&exec).unwrap(), BookEvent::Removed);
        assert_eq!(order(&manager, 1).size, -10);
        assert!(!order(&manager, 1).resident);
    }

    #[test]
    fn test_execution_at_price_size_keeps_order_with_remaining() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Bid, 100, 50, 0)).unwrap();
        let exec = Message::OrderExecutedAtPriceSize(OrderExecutedAtPriceSize {
            offset: 2,
            order_id: 1,
            executed_shares: 50,
            remaining_shares: 5,
            execution_id: 7,
            price: 100,
        });
        assert_eq!(manager.apply(&exec).unwrap(), BookEvent::Resized);
        assert_eq!(order(&manager, 1).size, 0);
        assert!(order(&manager, 1).resident);
    }

    #[test]
    fn test_modify_same_price_to_zero_removes() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Bid, 100, 50, 0)).unwrap();
        let modify = Message::ModifyOrderLong(ModifyOrder {
            offset: 3,
            order_id: 1,
            shares: 0,
            price: 100,
        });
        assert_eq!(manager.apply(&modify).unwrap(), BookEvent::Removed);
        assert_eq!(order(&manager, 1).exit_time, Some(EventTime::from_nanos(3)));
    }

    #[test]
    fn test_modify_worse_price_loses_top() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Ask, 100, 50, 0)).unwrap();
        manager.apply(&add(2, Side::Ask, 101, 50, 1)).unwrap();
        let modify = Message::ModifyOrderLong(ModifyOrder {
            offset: 4,
            order_id: 1,
            shares: 50,
            price: 103,
        });
        assert_eq!(manager.apply(&modify).unwrap(), BookEvent::Repriced);

        let book = manager.book(&Symbol::from(AAPL)).unwrap();
        assert_eq!(book.best_ask(), Some(101));
        let repriced = order(&manager, 1);
        assert_eq!(repriced.price, 103);
        assert!(repriced.entry_at_top);
        assert_eq!(repriced.entry_time, Some(EventTime::from_nanos(0)));
        assert_eq!(repriced.exit_time, Some(EventTime::from_nanos(4)));
    }

    #[test]
    fn test_informational_messages_leave_books_alone() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Bid, 100, 50, 0)).unwrap();
        let trade = Message::TradeLong(Trade {
            offset: 1,
            order_id: 1,
            side: Side::Bid,
            shares: 50,
            symbol: Symbol::from(AAPL),
            price: 100,
            execution_id: 1,
        });
        assert_eq!(manager.apply(&trade).unwrap(), BookEvent::Informational);
        assert_eq!(
            manager
                .apply(&Message::EndOfSession(EndOfSession { offset: 2 }))
                .unwrap(),
            BookEvent::Informational
        );
        assert_eq!(order(&manager, 1).size, 50);
        assert!(order(&manager, 1).resident);
    }

    #[test]
    fn test_unknown_reference_is_fatal() {
        let mut manager = OrderBookManager::new();
        let err = manager
            .apply(&Message::DeleteOrder(DeleteOrder {
                offset: 0,
                order_id: 404,
            }))
            .unwrap_err();
        assert!(matches!(err, PitchError::UnknownOrderReference(404)));
        assert_eq!(manager.applied(), 0);
    }

    #[test]
    fn test_duplicate_add_is_fatal() {
        let mut manager = OrderBookManager::new();
        manager.apply(&add(1, Side::Bid, 100, 50, 0)).unwrap();
        let err = manager.apply(&add(1, Side::Bid, 101, 50, 1)).unwrap_err();
        assert!(matches!(err, PitchError::DuplicateOrder(1)));
    }

    #[test]
    fn test_snapshots_sorted_by_symbol() {
        let mut manager = OrderBookManager::with_depth(2);
        for (id, symbol) in [(1, "MSFT"), (2, "AAPL"), (3, "GOOG")] {
            manager
                .apply(&Message::AddOrderLong(AddOrder {
                    offset: 0,
                    order_id: id,
                    side: Side::Bid,
                    shares: 10,
                    symbol: Symbol::from(symbol),
                    price: 100,
                }))
                .unwrap();
        }
        let symbols: Vec<String> = manager
            .snapshots()
            .iter()
            .map(|s| s.symbol.to_string())
            .collect();
        assert_eq!(symbols, ["AAPL", "GOOG", "MSFT"]);
        assert_eq!(manager.symbols().len(), 3);
        assert_eq!(
            manager.snapshot(&Symbol::from("GOOG")).unwrap().best_bid,
            Some(100)
        );
    }
}
