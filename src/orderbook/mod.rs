//! Order book module
//!
//! Reconstructs per-symbol limit order books from decoded PITCH events and
//! tracks how long each order held the best price on its side.

mod book;
mod clock;
mod manager;
mod metrics;
mod registry;

pub use book::OrderBook;
pub use clock::SessionClock;
pub use manager::{BookEvent, OrderBookManager};
pub use metrics::OrderBookMetrics;
pub use registry::OrderRegistry;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PitchError, Result};
use crate::parser::{OrderId, Price, Symbol};

/// Side of the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Bid,
    Ask,
}

impl Side {
    /// Decode the PITCH side indicator (`B` buy, `S` sell)
    pub fn from_wire(byte: u8) -> Result<Self> {
        match byte {
            b'B' => Ok(Side::Bid),
            b'S' => Ok(Side::Ask),
            other => Err(PitchError::InvalidSide(other)),
        }
    }

    pub fn as_wire(self) -> u8 {
        match self {
            Side::Bid => b'B',
            Side::Ask => b'S',
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Bid => "B",
            Side::Ask => "S",
        })
    }
}

/// Absolute event time in nanoseconds since midnight
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct EventTime(u64);

impl EventTime {
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000_000)
    }

    pub fn as_nanos(self) -> u64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Signed distance from `earlier` to `self`, in seconds
    pub fn seconds_since(self, earlier: EventTime) -> f64 {
        (self.0 as i128 - earlier.0 as i128) as f64 / 1e9
    }
}

/// Live or terminal state of one order
///
/// Owned by the [`OrderRegistry`]; books refer to orders by id only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    /// Outstanding shares; executions and reductions may drive it negative
    pub size: i64,
    pub price: Price,
    /// First insertion into a book
    pub entry_time: Option<EventTime>,
    /// First loss of top-of-book status, or removal from the book
    pub exit_time: Option<EventTime>,
    /// Set once an insertion lands at or better than the side's best price
    pub entry_at_top: bool,
    /// Present in its book right now
    pub resident: bool,
}

impl Order {
    pub fn new(id: OrderId, symbol: Symbol, side: Side, size: i64, price: Price) -> Self {
        Self {
            id,
            symbol,
            side,
            size,
            price,
            entry_time: None,
            exit_time: None,
            entry_at_top: false,
            resident: false,
        }
    }

    /// Seconds between entry and exit; `None` until both are known
    pub fn top_of_book_duration(&self) -> Option<f64> {
        match (self.entry_time, self.exit_time) {
            (Some(entry), Some(exit)) => Some(exit.seconds_since(entry)),
            _ => None,
        }
    }
}

/// A single price level in a book snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Level {
    pub price: Decimal,
    pub orders: usize,
    pub shares: i64,
}

/// Point-in-time view of one book
#[derive(Debug, Clone, Serialize)]
pub struct BookSnapshot {
    pub symbol: Symbol,
    pub last_event: Option<EventTime>,
    pub best_bid: Option<Price>,
    pub best_ask: Option<Price>,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub metrics: OrderBookMetrics,
}
