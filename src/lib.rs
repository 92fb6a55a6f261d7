//! PITCH Book - BATS PITCH decoder and top-of-book analysis
//!
//! This crate decodes a captured BATS PITCH feed, reconstructs a limit order
//! book per symbol, and measures how long orders that entered at the best
//! price held that position.

use std::io::Read;

pub mod analyzer;
pub mod config;
pub mod error;
pub mod orderbook;
pub mod parser;
pub mod report;
pub mod telemetry;

pub use analyzer::{analyze, Residency};
pub use config::Config;
pub use error::{PitchError, Result};
pub use orderbook::{
    BookEvent, BookSnapshot, EventTime, Order, OrderBook, OrderBookManager, OrderBookMetrics,
    OrderRegistry, SessionClock, Side,
};
pub use parser::{Message, MessageReader, MessageType, OrderId, Price, Symbol};
pub use report::{FeedStats, FeedSummary, ReportFormat, RunReport};
pub use telemetry::FeedTelemetry;

/// Decode every message from `source` and apply it to a fresh manager
///
/// Stops at the first decode or data-integrity error.
pub fn replay<R: Read>(source: R) -> Result<OrderBookManager> {
    let mut manager = OrderBookManager::new();
    for message in MessageReader::new(source) {
        manager.apply(&message?)?;
    }
    Ok(manager)
}
