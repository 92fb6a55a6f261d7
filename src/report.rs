//! Feed summary and end-of-run report
//!
//! Collects the whole-feed statistics (message counts, distinct symbols and
//! orders, price range) and renders the final report as text, JSON or
//! MessagePack.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt::Write as _;
use std::str::FromStr;
use std::time::Duration;

use crate::analyzer::Residency;
use crate::error::{PitchError, Result};
use crate::orderbook::BookSnapshot;
use crate::parser::{price_to_decimal, Message, OrderId, Price, Symbol};

/// Running statistics over every decoded message
#[derive(Debug, Default)]
pub struct FeedStats {
    messages: u64,
    by_kind: BTreeMap<&'static str, u64>,
    symbols: BTreeSet<Symbol>,
    order_ids: HashSet<OrderId>,
    min_price: Option<Price>,
    max_price: Option<Price>,
}

impl FeedStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, message: &Message) {
        self.messages += 1;
        *self.by_kind.entry(message.kind().label()).or_default() += 1;

        if let Some(price) = message.price() {
            self.min_price = Some(self.min_price.map_or(price, |min| min.min(price)));
            self.max_price = Some(self.max_price.map_or(price, |max| max.max(price)));
        }
        if let Some(symbol) = message.symbol() {
            self.symbols.insert(symbol);
        }
        if let Some(order_id) = message.order_id() {
            self.order_ids.insert(order_id);
        }
    }

    pub fn messages(&self) -> u64 {
        self.messages
    }

    pub fn finish(self, elapsed: Duration) -> FeedSummary {
        FeedSummary {
            messages: self.messages,
            elapsed_secs: elapsed.as_secs_f64(),
            by_kind: self.by_kind,
            symbols: self.symbols.into_iter().collect(),
            distinct_orders: self.order_ids.len(),
            min_price: self.min_price.map(price_to_decimal),
            max_price: self.max_price.map(price_to_decimal),
        }
    }
}

/// Whole-feed statistics
#[derive(Debug, Clone, Serialize)]
pub struct FeedSummary {
    pub messages: u64,
    pub elapsed_secs: f64,
    pub by_kind: BTreeMap<&'static str, u64>,
    pub symbols: Vec<Symbol>,
    pub distinct_orders: usize,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

/// Output encoding of the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    MsgPack,
}

impl FromStr for ReportFormat {
    type Err = PitchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "txt" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            "msgpack" | "messagepack" => Ok(ReportFormat::MsgPack),
            other => Err(PitchError::ConfigError(format!(
                "unknown report format: {other}"
            ))),
        }
    }
}

/// Everything the run produced, ready to render
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub summary: FeedSummary,
    pub top_of_book: Vec<Residency>,
    pub books: Vec<BookSnapshot>,
}

impl RunReport {
    pub fn new(summary: FeedSummary, top_of_book: Vec<Residency>, books: Vec<BookSnapshot>) -> Self {
        Self {
            generated_at: Utc::now(),
            summary,
            top_of_book,
            books,
        }
    }

    /// Keep only the given symbols in the per-symbol sections
    pub fn retain_symbols(&mut self, symbols: &[Symbol]) {
        if symbols.is_empty() {
            return;
        }
        self.top_of_book.retain(|stats| symbols.contains(&stats.symbol));
        self.books.retain(|book| symbols.contains(&book.symbol));
    }

    pub fn render(&self, format: ReportFormat) -> Result<Vec<u8>> {
        match format {
            ReportFormat::Text => Ok(self.render_text().into_bytes()),
            ReportFormat::Json => Ok(serde_json::to_vec_pretty(self)?),
            ReportFormat::MsgPack => Ok(rmp_serde::to_vec_named(self)?),
        }
    }

    fn render_text(&self) -> String {
        let summary = &self.summary;
        let symbols: Vec<_> = summary.symbols.iter().map(Symbol::text).collect();
        let mut out = String::new();

        let _ = writeln!(
            out,
            "Parsed {} message(s) in {:.3} second(s), symbols were {}, orders were {}, min price was {} and max price was {}.",
            summary.messages,
            summary.elapsed_secs,
            symbols.join(","),
            summary.distinct_orders,
            display_opt(summary.min_price),
            display_opt(summary.max_price),
        );

        if !self.top_of_book.is_empty() {
            let _ = writeln!(out, "\nAverage top-of-book duration (seconds):");
            for stats in &self.top_of_book {
                let average = stats
                    .average_secs
                    .map_or_else(|| "n/a".to_string(), |avg| format!("{avg:.9}"));
                let _ = writeln!(
                    out,
                    "{:<6} {} (measured {}, still at top {})",
                    stats.symbol, average, stats.measured, stats.still_at_top
                );
            }
        }

        if !self.books.is_empty() {
            let _ = writeln!(out, "\nBooks:");
            for book in &self.books {
                let _ = writeln!(
                    out,
                    "{:<6} {}<->{} resident {}",
                    book.symbol,
                    display_opt(book.best_bid.map(price_to_decimal)),
                    display_opt(book.best_ask.map(price_to_decimal)),
                    book.metrics.resident_orders
                );
            }
        }

        out
    }
}

fn display_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
