//! Block and sub-message framing
//!
//! A feed is a run of blocks, each an 8 byte header followed by
//! `message_count` sub-messages of the form `{length:u8, type:u8, payload}`.

use bytes::Buf;
use serde::Serialize;
use std::io::{ErrorKind, Read};
use tracing::{trace, warn};

use super::Message;
use crate::error::{PitchError, Result};

pub const BLOCK_HEADER_LEN: usize = 8;

/// Sequenced unit header preceding every block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockHeader {
    pub length: u16,
    pub message_count: u8,
    pub unit: u8,
    pub sequence: u32,
}

impl BlockHeader {
    pub fn decode(raw: &[u8; BLOCK_HEADER_LEN]) -> Self {
        let mut buf = &raw[..];
        Self {
            length: buf.get_u16_le(),
            message_count: buf.get_u8(),
            unit: buf.get_u8(),
            sequence: buf.get_u32_le(),
        }
    }
}

/// Pull-based reader yielding one [`Message`] at a time
///
/// A fresh block header is read only once the current block's message count is
/// exhausted. An empty source at a block boundary ends the stream cleanly, as
/// does a short read in the middle of a record unless strict framing is on.
/// The header's byte length must match its sub-messages exactly.
pub struct MessageReader<R> {
    source: R,
    remaining: u8,
    /// Body bytes of the current block not yet consumed
    budget: usize,
    header: Option<BlockHeader>,
    strict: bool,
    finished: bool,
    scratch: [u8; u8::MAX as usize],
}

impl<R: Read> MessageReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            remaining: 0,
            budget: 0,
            header: None,
            strict: false,
            finished: false,
            scratch: [0u8; u8::MAX as usize],
        }
    }

    /// Treat a truncated tail as a framing error instead of end of stream
    pub fn with_strict_framing(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Header of the block currently being read
    pub fn last_header(&self) -> Option<BlockHeader> {
        self.header
    }

    /// Read the next message, `Ok(None)` at end of stream
    ///
    /// Any error is terminal; later calls return `Ok(None)`.
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_next();
        if result.is_err() {
            self.finished = true;
        }
        result
    }

    pub fn into_inner(self) -> R {
        self.source
    }

    fn read_next(&mut self) -> Result<Option<Message>> {
        while self.remaining == 0 {
            if self.budget != 0 {
                return Err(PitchError::framing(format!(
                    "block declares {} byte(s) beyond its messages",
                    self.budget
                )));
            }

            let mut raw = [0u8; BLOCK_HEADER_LEN];
            let n = read_full(&mut self.source, &mut raw)?;
            if n == 0 {
                self.finished = true;
                return Ok(None);
            }
            if n < BLOCK_HEADER_LEN {
                return self.truncated(format!(
                    "block header has {n} of {BLOCK_HEADER_LEN} bytes"
                ));
            }
            let header = BlockHeader::decode(&raw);
            let Some(budget) = usize::from(header.length).checked_sub(BLOCK_HEADER_LEN) else {
                return Err(PitchError::framing(format!(
                    "block length {} is shorter than its header",
                    header.length
                )));
            };
            trace!(
                sequence = header.sequence,
                unit = header.unit,
                count = header.message_count,
                "Block header"
            );
            self.remaining = header.message_count;
            self.budget = budget;
            self.header = Some(header);
        }

        let mut prefix = [0u8; 2];
        let n = read_full(&mut self.source, &mut prefix)?;
        if n < prefix.len() {
            return self.truncated(format!(
                "{} message(s) announced but sub-message prefix has {n} of 2 bytes",
                self.remaining
            ));
        }

        let (length, type_code) = (prefix[0] as usize, prefix[1]);
        if length < prefix.len() {
            return Err(PitchError::framing(format!(
                "sub-message length {length} is shorter than its prefix"
            )));
        }

        if length > self.budget {
            return Err(PitchError::framing(format!(
                "sub-message 0x{type_code:02X} of {length} bytes overruns its block ({} left)",
                self.budget
            )));
        }

        let payload_len = length - prefix.len();
        let n = read_full(&mut self.source, &mut self.scratch[..payload_len])?;
        if n < payload_len {
            return self.truncated(format!(
                "sub-message 0x{type_code:02X} has {n} of {payload_len} payload bytes"
            ));
        }

        self.remaining -= 1;
        self.budget -= length;
        Message::decode(type_code, &self.scratch[..payload_len]).map(Some)
    }

    fn truncated(&mut self, reason: String) -> Result<Option<Message>> {
        self.finished = true;
        if self.strict {
            return Err(PitchError::framing(reason));
        }
        warn!(reason = %reason, "Truncated feed tail, ending stream");
        Ok(None)
    }
}

impl<R: Read> Iterator for MessageReader<R> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_message().transpose()
    }
}

/// Fill `buf` from `source`, returning fewer bytes only at end of input
fn read_full<R: Read>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
