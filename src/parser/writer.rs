//! Encoding of messages into PITCH blocks
//!
//! Used to build synthetic feeds for tests, fixtures, and benchmarks.

use bytes::{BufMut, Bytes, BytesMut};

use super::{reader::BLOCK_HEADER_LEN, Message, Price, Symbol, SHORT_PRICE_MULTIPLIER};
use crate::error::{PitchError, Result};

/// Messages per block produced by [`encode_feed`]
const MESSAGES_PER_BLOCK: usize = 16;

/// Accumulates blocks for a single unit, numbering messages sequentially
#[derive(Debug)]
pub struct FeedWriter {
    unit: u8,
    next_sequence: u32,
    out: BytesMut,
}

impl FeedWriter {
    pub fn new(unit: u8) -> Self {
        Self {
            unit,
            next_sequence: 1,
            out: BytesMut::new(),
        }
    }

    /// Append one block holding `messages`
    pub fn write_block(&mut self, messages: &[Message]) -> Result<()> {
        let count = u8::try_from(messages.len()).map_err(|_| {
            PitchError::framing(format!("{} messages do not fit one block", messages.len()))
        })?;

        let mut body = BytesMut::new();
        for message in messages {
            encode_message(message, &mut body)?;
        }

        let length = u16::try_from(BLOCK_HEADER_LEN + body.len()).map_err(|_| {
            PitchError::framing(format!("block of {} bytes is too long", body.len()))
        })?;

        self.out.put_u16_le(length);
        self.out.put_u8(count);
        self.out.put_u8(self.unit);
        self.out.put_u32_le(self.next_sequence);
        self.out.extend_from_slice(&body);
        self.next_sequence = self.next_sequence.wrapping_add(u32::from(count));
        Ok(())
    }

    pub fn into_bytes(self) -> Bytes {
        self.out.freeze()
    }
}

/// Encode a whole message sequence as consecutive blocks on unit 1
pub fn encode_feed(messages: &[Message]) -> Result<Bytes> {
    let mut writer = FeedWriter::new(1);
    for chunk in messages.chunks(MESSAGES_PER_BLOCK) {
        writer.write_block(chunk)?;
    }
    Ok(writer.into_bytes())
}

/// Append one sub-message (length, type, payload) to `out`
///
/// Short forms fail if a value does not fit the narrow field or a price is not
/// a whole multiple of the short-form unit.
pub fn encode_message(message: &Message, out: &mut BytesMut) -> Result<()> {
    let kind = message.kind();
    out.put_u8((kind.payload_len() + 2) as u8);
    out.put_u8(kind.code());

    match message {
        Message::Time(m) => out.put_u32_le(m.seconds),
        Message::AddOrderLong(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u8(m.side.as_wire());
            out.put_u32_le(m.shares);
            put_symbol(out, &m.symbol);
            out.put_u64_le(m.price);
        }
        Message::AddOrderShort(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u8(m.side.as_wire());
            out.put_u16_le(narrow(m.shares, "shares")?);
            put_symbol(out, &m.symbol);
            out.put_u16_le(short_price(m.price)?);
        }
        Message::OrderExecuted(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u32_le(m.executed_shares);
            out.put_u64_le(m.execution_id);
        }
        Message::OrderExecutedAtPriceSize(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u32_le(m.executed_shares);
            out.put_u32_le(m.remaining_shares);
            out.put_u64_le(m.execution_id);
            out.put_u64_le(m.price);
        }
        Message::ReduceSizeLong(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u32_le(m.canceled_shares);
        }
        Message::ReduceSizeShort(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u16_le(narrow(m.canceled_shares, "canceled_shares")?);
        }
        Message::ModifyOrderLong(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u32_le(m.shares);
            out.put_u64_le(m.price);
        }
        Message::ModifyOrderShort(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u16_le(narrow(m.shares, "shares")?);
            out.put_u16_le(short_price(m.price)?);
        }
        Message::DeleteOrder(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
        }
        Message::TradeLong(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u8(m.side.as_wire());
            out.put_u32_le(m.shares);
            put_symbol(out, &m.symbol);
            out.put_u64_le(m.price);
            out.put_u64_le(m.execution_id);
        }
        Message::TradeShort(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.order_id);
            out.put_u8(m.side.as_wire());
            out.put_u16_le(narrow(m.shares, "shares")?);
            put_symbol(out, &m.symbol);
            out.put_u16_le(short_price(m.price)?);
            out.put_u64_le(m.execution_id);
        }
        Message::TradeBreak(m) => {
            out.put_u32_le(m.offset);
            out.put_u64_le(m.execution_id);
        }
        Message::EndOfSession(m) => out.put_u32_le(m.offset),
    }

    Ok(())
}

fn put_symbol(out: &mut BytesMut, symbol: &Symbol) {
    out.put_slice(symbol.as_bytes());
}

fn narrow(value: u32, field: &str) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| PitchError::framing(format!("{field} {value} does not fit a short field")))
}

fn short_price(price: Price) -> Result<u16> {
    if price % SHORT_PRICE_MULTIPLIER != 0 {
        return Err(PitchError::framing(format!(
            "price {price} is not representable in short form"
        )));
    }
    u16::try_from(price / SHORT_PRICE_MULTIPLIER)
        .map_err(|_| PitchError::framing(format!("price {price} does not fit a short field")))
}
