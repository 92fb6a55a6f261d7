//! Core order book implementation
//!
//! Uses BTreeMap for efficient sorted price level management. Bids are keyed by
//! `Reverse<Price>` so the first key on either side is the best price, which
//! keeps best-price lookup and recomputation after a removal logarithmic in the
//! number of distinct levels.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::debug;

use super::{BookSnapshot, EventTime, Level, OrderBookMetrics, OrderRegistry, Side};
use crate::error::{PitchError, Result};
use crate::parser::{price_to_decimal, OrderId, Price, Symbol};

/// Ordering key for one side: smaller keys are better prices
trait PriceKey: Ord + Copy {
    fn from_price(price: Price) -> Self;
    fn price(self) -> Price;
}

impl PriceKey for Price {
    fn from_price(price: Price) -> Self {
        price
    }

    fn price(self) -> Price {
        self
    }
}

impl PriceKey for Reverse<Price> {
    fn from_price(price: Price) -> Self {
        Reverse(price)
    }

    fn price(self) -> Price {
        self.0
    }
}

/// Outcome of inserting into one side
struct Insertion {
    at_top: bool,
    /// Previous best price when the insertion strictly improved it
    displaced: Option<Price>,
}

/// One side of the book: price levels of order ids in arrival order
#[derive(Debug)]
struct BookSide<K> {
    levels: BTreeMap<K, Vec<OrderId>>,
}

impl<K: PriceKey> BookSide<K> {
    fn new() -> Self {
        Self {
            levels: BTreeMap::new(),
        }
    }

    fn best(&self) -> Option<Price> {
        self.levels.first_key_value().map(|(key, _)| key.price())
    }

    fn insert(&mut self, price: Price, order_id: OrderId) -> Insertion {
        let key = K::from_price(price);
        let best = self.levels.first_key_value().map(|(best, _)| *best);
        self.levels.entry(key).or_default().push(order_id);

        match best {
            None => Insertion {
                at_top: true,
                displaced: None,
            },
            Some(best) => Insertion {
                at_top: key <= best,
                displaced: (key < best).then(|| best.price()),
            },
        }
    }

    fn remove(&mut self, price: Price, order_id: OrderId) -> bool {
        let key = K::from_price(price);
        let Some(orders) = self.levels.get_mut(&key) else {
            return false;
        };
        let Some(pos) = orders.iter().position(|id| *id == order_id) else {
            return false;
        };
        orders.remove(pos);
        if orders.is_empty() {
            self.levels.remove(&key);
        }
        true
    }

    fn level(&self, price: Price) -> &[OrderId] {
        self.levels
            .get(&K::from_price(price))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Levels from best to worst
    fn iter(&self) -> impl Iterator<Item = (Price, &[OrderId])> {
        self.levels
            .iter()
            .map(|(key, orders)| (key.price(), orders.as_slice()))
    }

    fn len(&self) -> usize {
        self.levels.len()
    }
}

/// Order book for a single symbol
#[derive(Debug)]
pub struct OrderBook {
    symbol: Symbol,
    /// Bids sorted by price descending (highest first)
    bids: BookSide<Reverse<Price>>,
    /// Asks sorted by price ascending (lowest first)
    asks: BookSide<Price>,
    /// Orders currently resident on either side
    resident: usize,
    /// Time of the last mutation
    last_event: Option<EventTime>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            bids: BookSide::new(),
            asks: BookSide::new(),
            resident: 0,
            last_event: None,
        }
    }

    pub fn symbol(&self) -> Symbol {
        self.symbol
    }

    /// Insert a registered order at its current price
    ///
    /// Stamps `entry_time` on first insertion and sets `entry_at_top` when the
    /// price is at least as good as the side's best. A strict improvement
    /// stamps `exit_time` on every order still resting at the previous best.
    pub fn add(&mut self, registry: &mut OrderRegistry, order_id: OrderId, now: EventTime) -> Result<()> {
        let order = registry
            .entry_mut(order_id)
            .ok_or(PitchError::UnknownOrderReference(order_id))?;
        if order.resident {
            return Err(PitchError::DuplicateOrder(order_id));
        }

        let (side, price) = (order.side, order.price);
        let insertion = match side {
            Side::Bid => self.bids.insert(price, order_id),
            Side::Ask => self.asks.insert(price, order_id),
        };

        order.entry_time.get_or_insert(now);
        order.entry_at_top |= insertion.at_top;
        order.resident = true;
        self.resident += 1;
        self.last_event = Some(now);

        if let Some(previous) = insertion.displaced {
            let displaced = match side {
                Side::Bid => self.bids.level(previous),
                Side::Ask => self.asks.level(previous),
            };
            for id in displaced {
                if let Some(other) = registry.entry_mut(*id) {
                    other.exit_time.get_or_insert(now);
                }
            }
            debug!(
                symbol = %self.symbol,
                ?side,
                previous,
                best = price,
                displaced = displaced.len(),
                "Best price improved"
            );
        }

        Ok(())
    }

    /// Take a resident order out of its level, stamping `exit_time` if unset
    pub fn remove(&mut self, registry: &mut OrderRegistry, order_id: OrderId, now: EventTime) -> Result<()> {
        let order = registry.get_mut(order_id)?;

        let removed = match order.side {
            Side::Bid => self.bids.remove(order.price, order_id),
            Side::Ask => self.asks.remove(order.price, order_id),
        };
        if !removed {
            return Err(PitchError::UnknownOrderReference(order_id));
        }

        order.exit_time.get_or_insert(now);
        order.resident = false;
        self.resident -= 1;
        self.last_event = Some(now);
        Ok(())
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Price> {
        self.bids.best()
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Price> {
        self.asks.best()
    }

    pub fn best(&self, side: Side) -> Option<Price> {
        match side {
            Side::Bid => self.best_bid(),
            Side::Ask => self.best_ask(),
        }
    }

    /// Order ids resting at `price`, in arrival order
    pub fn level(&self, side: Side, price: Price) -> &[OrderId] {
        match side {
            Side::Bid => self.bids.level(price),
            Side::Ask => self.asks.level(price),
        }
    }

    /// All levels of one side from best to worst
    pub fn levels(&self, side: Side) -> Vec<(Price, &[OrderId])> {
        match side {
            Side::Bid => self.bids.iter().collect(),
            Side::Ask => self.asks.iter().collect(),
        }
    }

    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    pub fn resident_orders(&self) -> usize {
        self.resident
    }

    pub fn is_empty(&self) -> bool {
        self.resident == 0
    }

    pub fn last_event(&self) -> Option<EventTime> {
        self.last_event
    }

    /// Snapshot with at most `depth` levels per side
    pub fn snapshot(&self, registry: &OrderRegistry, depth: usize) -> BookSnapshot {
        let to_level = |(price, orders): (Price, &[OrderId])| Level {
            price: price_to_decimal(price),
            orders: orders.len(),
            shares: orders
                .iter()
                .filter_map(|id| registry.order(*id))
                .map(|order| order.size)
                .sum(),
        };

        let bids: Vec<Level> = self.bids.iter().take(depth).map(to_level).collect();
        let asks: Vec<Level> = self.asks.iter().take(depth).map(to_level).collect();
        let metrics = OrderBookMetrics::compute(self, &bids, &asks);

        BookSnapshot {
            symbol: self.symbol,
            last_event: self.last_event,
            best_bid: self.best_bid(),
            best_ask: self.best_ask(),
            bids,
            asks,
            metrics,
        }
    }

    /// Check structural invariants against the registry
    ///
    /// Every level is non-empty, every listed order is resident here at the
    /// level's side and price, no order is listed twice, and the resident
    /// count matches.
    pub fn verify(&self, registry: &OrderRegistry) -> std::result::Result<(), String> {
        let mut seen = std::collections::HashSet::new();
        for side in [Side::Bid, Side::Ask] {
            for (price, orders) in self.levels(side) {
                if orders.is_empty() {
                    return Err(format!("{} {side:?} level {price} is empty", self.symbol));
                }
                for id in orders {
                    if !seen.insert(*id) {
                        return Err(format!("order {id} listed twice"));
                    }
                    let order = registry
                        .order(*id)
                        .ok_or_else(|| format!("order {id} is not registered"))?;
                    if !order.resident
                        || order.side != side
                        || order.price != price
                        || order.symbol != self.symbol
                    {
                        return Err(format!("order {id} does not belong at {side:?} {price}"));
                    }
                }
            }
        }
        if seen.len() != self.resident {
            return Err(format!(
                "{} resident count {} but {} listed",
                self.symbol,
                self.resident,
                seen.len()
            ));
        }
        Ok(())
    }
}
