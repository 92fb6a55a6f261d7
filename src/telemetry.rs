//! Prometheus counters for feed processing

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::error::Result;
use crate::orderbook::BookEvent;
use crate::parser::Message;

/// Process counters kept on a private registry
pub struct FeedTelemetry {
    registry: Registry,
    messages: IntCounterVec,
    adds: IntCounter,
    removals: IntCounter,
    reprices: IntCounter,
    live_orders: IntGauge,
}

impl FeedTelemetry {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let messages = IntCounterVec::new(
            Opts::new("pitch_messages_total", "Decoded PITCH messages by kind"),
            &["kind"],
        )?;
        let adds = IntCounter::new("pitch_book_adds_total", "Orders inserted into a book")?;
        let removals = IntCounter::new("pitch_book_removals_total", "Orders removed from a book")?;
        let reprices = IntCounter::new(
            "pitch_book_reprices_total",
            "Orders removed and re-inserted at a new price",
        )?;
        let live_orders = IntGauge::new("pitch_live_orders", "Orders resident in any book")?;

        registry.register(Box::new(messages.clone()))?;
        registry.register(Box::new(adds.clone()))?;
        registry.register(Box::new(removals.clone()))?;
        registry.register(Box::new(reprices.clone()))?;
        registry.register(Box::new(live_orders.clone()))?;

        Ok(Self {
            registry,
            messages,
            adds,
            removals,
            reprices,
            live_orders,
        })
    }

    pub fn record_message(&self, message: &Message) {
        self.messages
            .with_label_values(&[message.kind().label()])
            .inc();
    }

    pub fn record_event(&self, event: BookEvent) {
        match event {
            BookEvent::Added => {
                self.adds.inc();
                self.live_orders.inc();
            }
            BookEvent::Removed => {
                self.removals.inc();
                self.live_orders.dec();
            }
            BookEvent::Repriced => self.reprices.inc(),
            BookEvent::ClockReset | BookEvent::Resized | BookEvent::Informational => {}
        }
    }

    /// Text exposition format of every counter
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
