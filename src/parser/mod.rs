//! Parser module for BATS PITCH messages
//!
//! Decodes the fixed-width little-endian payloads of the fourteen PITCH message
//! kinds into typed records. Framing (block headers and sub-message prefixes)
//! lives in [`reader`]; the inverse encoding lives in [`writer`].

mod reader;
mod writer;

pub use reader::{BlockHeader, MessageReader, BLOCK_HEADER_LEN};
pub use writer::{encode_feed, encode_message, FeedWriter};

use bytes::Buf;
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;

use crate::error::{PitchError, Result};
use crate::orderbook::Side;

/// Venue-assigned order identifier, unique within a session
pub type OrderId = u64;

/// Price in venue ticks (four implied decimal places)
pub type Price = u64;

/// Short-form prices carry two implied decimals; long-form carry four.
pub const SHORT_PRICE_MULTIPLIER: u64 = 100;

/// Implied decimal places of a normalized [`Price`]
pub const PRICE_SCALE: u32 = 4;

/// Render a normalized price as a decimal
pub fn price_to_decimal(price: Price) -> Decimal {
    Decimal::from_i128_with_scale(price as i128, PRICE_SCALE)
}

/// Fixed-width, space-padded six byte symbol
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol([u8; 6]);

impl Symbol {
    pub const fn new(raw: [u8; 6]) -> Self {
        Self(raw)
    }

    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }

    /// Symbol text with the trailing padding stripped
    ///
    /// Bytes outside printable ASCII are escaped (`\xNN`), so distinct raw
    /// symbols never render the same.
    pub fn text(&self) -> Cow<'_, str> {
        let end = self
            .0
            .iter()
            .rposition(|b| !matches!(b, b' ' | 0))
            .map_or(0, |last| last + 1);
        let raw = &self.0[..end];
        match std::str::from_utf8(raw) {
            Ok(text) if raw.iter().all(u8::is_ascii_graphic) => Cow::Borrowed(text),
            _ => Cow::Owned(raw.escape_ascii().to_string()),
        }
    }
}

impl From<&str> for Symbol {
    /// Pads with spaces; anything past six bytes is dropped.
    fn from(s: &str) -> Self {
        let mut raw = [b' '; 6];
        for (dst, src) in raw.iter_mut().zip(s.bytes()) {
            *dst = src;
        }
        Self(raw)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.text())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({:?})", self.text())
    }
}

impl Serialize for Symbol {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text())
    }
}

/// PITCH message type codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum MessageType {
    Time = 0x20,
    AddOrderLong = 0x21,
    AddOrderShort = 0x22,
    OrderExecuted = 0x23,
    OrderExecutedAtPriceSize = 0x24,
    ReduceSizeLong = 0x25,
    ReduceSizeShort = 0x26,
    ModifyOrderLong = 0x27,
    ModifyOrderShort = 0x28,
    DeleteOrder = 0x29,
    TradeLong = 0x2A,
    TradeShort = 0x2B,
    TradeBreak = 0x2C,
    EndOfSession = 0x2D,
}

impl MessageType {
    pub const ALL: [MessageType; 14] = [
        MessageType::Time,
        MessageType::AddOrderLong,
        MessageType::AddOrderShort,
        MessageType::OrderExecuted,
        MessageType::OrderExecutedAtPriceSize,
        MessageType::ReduceSizeLong,
        MessageType::ReduceSizeShort,
        MessageType::ModifyOrderLong,
        MessageType::ModifyOrderShort,
        MessageType::DeleteOrder,
        MessageType::TradeLong,
        MessageType::TradeShort,
        MessageType::TradeBreak,
        MessageType::EndOfSession,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Payload length in bytes, excluding the two byte length/type prefix
    pub fn payload_len(self) -> usize {
        match self {
            MessageType::Time => 4,
            MessageType::AddOrderLong => 31,
            MessageType::AddOrderShort => 23,
            MessageType::OrderExecuted => 24,
            MessageType::OrderExecutedAtPriceSize => 36,
            MessageType::ReduceSizeLong => 16,
            MessageType::ReduceSizeShort => 14,
            MessageType::ModifyOrderLong => 24,
            MessageType::ModifyOrderShort => 16,
            MessageType::DeleteOrder => 12,
            MessageType::TradeLong => 39,
            MessageType::TradeShort => 31,
            MessageType::TradeBreak => 12,
            MessageType::EndOfSession => 4,
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            MessageType::Time => "Time",
            MessageType::AddOrderLong => "Add Order - Long",
            MessageType::AddOrderShort => "Add Order - Short",
            MessageType::OrderExecuted => "Order Executed",
            MessageType::OrderExecutedAtPriceSize => "Order Executed at Price/Size",
            MessageType::ReduceSizeLong => "Reduce Size - Long",
            MessageType::ReduceSizeShort => "Reduce Size - Short",
            MessageType::ModifyOrderLong => "Modify Order - Long",
            MessageType::ModifyOrderShort => "Modify Order - Short",
            MessageType::DeleteOrder => "Delete Order",
            MessageType::TradeLong => "Trade - Long",
            MessageType::TradeShort => "Trade - Short",
            MessageType::TradeBreak => "Trade Break",
            MessageType::EndOfSession => "End of Session",
        }
    }

    /// Stable snake_case label used for metrics and report keys
    pub fn label(self) -> &'static str {
        match self {
            MessageType::Time => "time",
            MessageType::AddOrderLong => "add_order_long",
            MessageType::AddOrderShort => "add_order_short",
            MessageType::OrderExecuted => "order_executed",
            MessageType::OrderExecutedAtPriceSize => "order_executed_at_price_size",
            MessageType::ReduceSizeLong => "reduce_size_long",
            MessageType::ReduceSizeShort => "reduce_size_short",
            MessageType::ModifyOrderLong => "modify_order_long",
            MessageType::ModifyOrderShort => "modify_order_short",
            MessageType::DeleteOrder => "delete_order",
            MessageType::TradeLong => "trade_long",
            MessageType::TradeShort => "trade_short",
            MessageType::TradeBreak => "trade_break",
            MessageType::EndOfSession => "end_of_session",
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = PitchError;

    fn try_from(code: u8) -> Result<Self> {
        MessageType::ALL
            .into_iter()
            .find(|kind| kind.code() == code)
            .ok_or(PitchError::UnknownMessageType(code))
    }
}

/// Time: seconds since midnight, the base for subsequent offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Time {
    pub seconds: u32,
}

/// Add Order, long or short form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AddOrder {
    pub offset: u32,
    pub order_id: OrderId,
    pub side: Side,
    pub shares: u32,
    pub symbol: Symbol,
    pub price: Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderExecuted {
    pub offset: u32,
    pub order_id: OrderId,
    pub executed_shares: u32,
    pub execution_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OrderExecutedAtPriceSize {
    pub offset: u32,
    pub order_id: OrderId,
    pub executed_shares: u32,
    pub remaining_shares: u32,
    pub execution_id: u64,
    pub price: Price,
}

/// Reduce Size, long or short form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReduceSize {
    pub offset: u32,
    pub order_id: OrderId,
    pub canceled_shares: u32,
}

/// Modify Order, long or short form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModifyOrder {
    pub offset: u32,
    pub order_id: OrderId,
    pub shares: u32,
    pub price: Price,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOrder {
    pub offset: u32,
    pub order_id: OrderId,
}

/// Trade against a non-displayed order, long or short form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Trade {
    pub offset: u32,
    pub order_id: OrderId,
    pub side: Side,
    pub shares: u32,
    pub symbol: Symbol,
    pub price: Price,
    pub execution_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TradeBreak {
    pub offset: u32,
    pub execution_id: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EndOfSession {
    pub offset: u32,
}

/// Decoded PITCH message
///
/// Long and short forms share a payload type; short-form prices are already
/// normalized to the long-form unit by the time a `Message` exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Message {
    Time(Time),
    AddOrderLong(AddOrder),
    AddOrderShort(AddOrder),
    OrderExecuted(OrderExecuted),
    OrderExecutedAtPriceSize(OrderExecutedAtPriceSize),
    ReduceSizeLong(ReduceSize),
    ReduceSizeShort(ReduceSize),
    ModifyOrderLong(ModifyOrder),
    ModifyOrderShort(ModifyOrder),
    DeleteOrder(DeleteOrder),
    TradeLong(Trade),
    TradeShort(Trade),
    TradeBreak(TradeBreak),
    EndOfSession(EndOfSession),
}

impl Message {
    /// Decode a payload given its type byte
    ///
    /// The payload must be exactly the fixed length of its type.
    pub fn decode(type_code: u8, payload: &[u8]) -> Result<Self> {
        let kind = MessageType::try_from(type_code)?;
        if payload.len() != kind.payload_len() {
            return Err(PitchError::framing(format!(
                "{} payload is {} bytes, expected {}",
                kind.description(),
                payload.len(),
                kind.payload_len()
            )));
        }

        let mut buf = payload;
        let message = match kind {
            MessageType::Time => Message::Time(Time {
                seconds: buf.get_u32_le(),
            }),
            MessageType::AddOrderLong => Message::AddOrderLong(AddOrder {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                side: get_side(&mut buf)?,
                shares: buf.get_u32_le(),
                symbol: get_symbol(&mut buf),
                price: buf.get_u64_le(),
            }),
            MessageType::AddOrderShort => Message::AddOrderShort(AddOrder {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                side: get_side(&mut buf)?,
                shares: u32::from(buf.get_u16_le()),
                symbol: get_symbol(&mut buf),
                price: get_short_price(&mut buf),
            }),
            MessageType::OrderExecuted => Message::OrderExecuted(OrderExecuted {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                executed_shares: buf.get_u32_le(),
                execution_id: buf.get_u64_le(),
            }),
            MessageType::OrderExecutedAtPriceSize => {
                Message::OrderExecutedAtPriceSize(OrderExecutedAtPriceSize {
                    offset: buf.get_u32_le(),
                    order_id: buf.get_u64_le(),
                    executed_shares: buf.get_u32_le(),
                    remaining_shares: buf.get_u32_le(),
                    execution_id: buf.get_u64_le(),
                    price: buf.get_u64_le(),
                })
            }
            MessageType::ReduceSizeLong => Message::ReduceSizeLong(ReduceSize {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                canceled_shares: buf.get_u32_le(),
            }),
            MessageType::ReduceSizeShort => Message::ReduceSizeShort(ReduceSize {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                canceled_shares: u32::from(buf.get_u16_le()),
            }),
            MessageType::ModifyOrderLong => Message::ModifyOrderLong(ModifyOrder {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                shares: buf.get_u32_le(),
                price: buf.get_u64_le(),
            }),
            MessageType::ModifyOrderShort => Message::ModifyOrderShort(ModifyOrder {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                shares: u32::from(buf.get_u16_le()),
                price: get_short_price(&mut buf),
            }),
            MessageType::DeleteOrder => Message::DeleteOrder(DeleteOrder {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
            }),
            MessageType::TradeLong => Message::TradeLong(Trade {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                side: get_side(&mut buf)?,
                shares: buf.get_u32_le(),
                symbol: get_symbol(&mut buf),
                price: buf.get_u64_le(),
                execution_id: buf.get_u64_le(),
            }),
            MessageType::TradeShort => Message::TradeShort(Trade {
                offset: buf.get_u32_le(),
                order_id: buf.get_u64_le(),
                side: get_side(&mut buf)?,
                shares: u32::from(buf.get_u16_le()),
                symbol: get_symbol(&mut buf),
                price: get_short_price(&mut buf),
                execution_id: buf.get_u64_le(),
            }),
            MessageType::TradeBreak => Message::TradeBreak(TradeBreak {
                offset: buf.get_u32_le(),
                execution_id: buf.get_u64_le(),
            }),
            MessageType::EndOfSession => Message::EndOfSession(EndOfSession {
                offset: buf.get_u32_le(),
            }),
        };

        Ok(message)
    }

    pub fn kind(&self) -> MessageType {
        match self {
            Message::Time(_) => MessageType::Time,
            Message::AddOrderLong(_) => MessageType::AddOrderLong,
            Message::AddOrderShort(_) => MessageType::AddOrderShort,
            Message::OrderExecuted(_) => MessageType::OrderExecuted,
            Message::OrderExecutedAtPriceSize(_) => MessageType::OrderExecutedAtPriceSize,
            Message::ReduceSizeLong(_) => MessageType::ReduceSizeLong,
            Message::ReduceSizeShort(_) => MessageType::ReduceSizeShort,
            Message::ModifyOrderLong(_) => MessageType::ModifyOrderLong,
            Message::ModifyOrderShort(_) => MessageType::ModifyOrderShort,
            Message::DeleteOrder(_) => MessageType::DeleteOrder,
            Message::TradeLong(_) => MessageType::TradeLong,
            Message::TradeShort(_) => MessageType::TradeShort,
            Message::TradeBreak(_) => MessageType::TradeBreak,
            Message::EndOfSession(_) => MessageType::EndOfSession,
        }
    }

    /// Nanoseconds since the last Time message; `None` for Time itself
    pub fn offset(&self) -> Option<u32> {
        match self {
            Message::Time(_) => None,
            Message::AddOrderLong(m) | Message::AddOrderShort(m) => Some(m.offset),
            Message::OrderExecuted(m) => Some(m.offset),
            Message::OrderExecutedAtPriceSize(m) => Some(m.offset),
            Message::ReduceSizeLong(m) | Message::ReduceSizeShort(m) => Some(m.offset),
            Message::ModifyOrderLong(m) | Message::ModifyOrderShort(m) => Some(m.offset),
            Message::DeleteOrder(m) => Some(m.offset),
            Message::TradeLong(m) | Message::TradeShort(m) => Some(m.offset),
            Message::TradeBreak(m) => Some(m.offset),
            Message::EndOfSession(m) => Some(m.offset),
        }
    }

    pub fn order_id(&self) -> Option<OrderId> {
        match self {
            Message::AddOrderLong(m) | Message::AddOrderShort(m) => Some(m.order_id),
            Message::OrderExecuted(m) => Some(m.order_id),
            Message::OrderExecutedAtPriceSize(m) => Some(m.order_id),
            Message::ReduceSizeLong(m) | Message::ReduceSizeShort(m) => Some(m.order_id),
            Message::ModifyOrderLong(m) | Message::ModifyOrderShort(m) => Some(m.order_id),
            Message::DeleteOrder(m) => Some(m.order_id),
            Message::TradeLong(m) | Message::TradeShort(m) => Some(m.order_id),
            Message::Time(_) | Message::TradeBreak(_) | Message::EndOfSession(_) => None,
        }
    }

    pub fn price(&self) -> Option<Price> {
        match self {
            Message::AddOrderLong(m) | Message::AddOrderShort(m) => Some(m.price),
            Message::OrderExecutedAtPriceSize(m) => Some(m.price),
            Message::ModifyOrderLong(m) | Message::ModifyOrderShort(m) => Some(m.price),
            Message::TradeLong(m) | Message::TradeShort(m) => Some(m.price),
            _ => None,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Message::AddOrderLong(m) | Message::AddOrderShort(m) => Some(m.symbol),
            Message::TradeLong(m) | Message::TradeShort(m) => Some(m.symbol),
            _ => None,
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.kind().description().to_uppercase();
        match self {
            Message::Time(m) => write!(f, "{title}: seconds={}", m.seconds),
            Message::AddOrderLong(m) | Message::AddOrderShort(m) => write!(
                f,
                "{title}: offset={} order_id={} side={} shares={} symbol={} price={}",
                m.offset,
                m.order_id,
                m.side,
                m.shares,
                m.symbol,
                price_to_decimal(m.price)
            ),
            Message::OrderExecuted(m) => write!(
                f,
                "{title}: offset={} order_id={} executed_shares={} execution_id={}",
                m.offset, m.order_id, m.executed_shares, m.execution_id
            ),
            Message::OrderExecutedAtPriceSize(m) => write!(
                f,
                "{title}: offset={} order_id={} executed_shares={} remaining_shares={} execution_id={} price={}",
                m.offset,
                m.order_id,
                m.executed_shares,
                m.remaining_shares,
                m.execution_id,
                price_to_decimal(m.price)
            ),
            Message::ReduceSizeLong(m) | Message::ReduceSizeShort(m) => write!(
                f,
                "{title}: offset={} order_id={} canceled_shares={}",
                m.offset, m.order_id, m.canceled_shares
            ),
            Message::ModifyOrderLong(m) | Message::ModifyOrderShort(m) => write!(
                f,
                "{title}: offset={} order_id={} shares={} price={}",
                m.offset,
                m.order_id,
                m.shares,
                price_to_decimal(m.price)
            ),
            Message::DeleteOrder(m) => {
                write!(f, "{title}: offset={} order_id={}", m.offset, m.order_id)
            }
            Message::TradeLong(m) | Message::TradeShort(m) => write!(
                f,
                "{title}: offset={} order_id={} side={} shares={} symbol={} price={} execution_id={}",
                m.offset,
                m.order_id,
                m.side,
                m.shares,
                m.symbol,
                price_to_decimal(m.price),
                m.execution_id
            ),
            Message::TradeBreak(m) => write!(
                f,
                "{title}: offset={} execution_id={}",
                m.offset, m.execution_id
            ),
            Message::EndOfSession(m) => write!(f, "{title}: offset={}", m.offset),
        }
    }
}

fn get_side(buf: &mut &[u8]) -> Result<Side> {
    Side::from_wire(buf.get_u8())
}

fn get_symbol(buf: &mut &[u8]) -> Symbol {
    let mut raw = [0u8; 6];
    buf.copy_to_slice(&mut raw);
    Symbol(raw)
}

fn get_short_price(buf: &mut &[u8]) -> Price {
    u64::from(buf.get_u16_le()) * SHORT_PRICE_MULTIPLIER
}
