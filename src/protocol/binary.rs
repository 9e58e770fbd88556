use bytes::{Buf, BufMut, BytesMut};
use std::io;
use tokio_util::codec::{Decoder, Encoder};

use crate::engine::errors::ProtocolError;
use crate::models::{Order, OrderId, OrderSide};

/// Instrument field width, including the terminating NUL
pub const INSTRUMENT_LEN: usize = 9;

/// Alignment padding after the instrument field
const PADDING_LEN: usize = 3;

/// One client record on the wire (28 bytes, little-endian)
///
/// ```text
/// offset  size  field
///      0     4  command     'B', 'S' or 'C' as a u32
///      4     4  order_id
///      8     4  price
///     12     4  count
///     16     9  instrument  NUL-terminated ASCII
///     25     3  padding
/// ```
///
/// Cancel records only carry a meaningful `order_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRecord {
    pub command: u32,
    pub order_id: OrderId,
    pub price: u32,
    pub count: u32,
    pub instrument: [u8; INSTRUMENT_LEN],
}

impl InputRecord {
    pub const SIZE: usize = 16 + INSTRUMENT_LEN + PADDING_LEN;

    /// Encode to bytes
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.reserve(Self::SIZE);
        buf.put_u32_le(self.command);
        buf.put_u32_le(self.order_id);
        buf.put_u32_le(self.price);
        buf.put_u32_le(self.count);
        buf.put_slice(&self.instrument);
        buf.put_bytes(0, PADDING_LEN);
    }

    /// Decode from bytes
    pub fn decode(buf: &mut impl Buf) -> io::Result<Self> {
        if buf.remaining() < Self::SIZE {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "Incomplete record"));
        }

        let command = buf.get_u32_le();
        let order_id = buf.get_u32_le();
        let price = buf.get_u32_le();
        let count = buf.get_u32_le();

        let mut instrument = [0u8; INSTRUMENT_LEN];
        buf.copy_to_slice(&mut instrument);
        buf.advance(PADDING_LEN);

        Ok(Self {
            command,
            order_id,
            price,
            count,
            instrument,
        })
    }

    /// Create from domain Order type
    ///
    /// Instruments longer than 8 bytes are truncated so the field stays
    /// NUL-terminated.
    pub fn from_order(order: &Order) -> Self {
        let mut instrument = [0u8; INSTRUMENT_LEN];
        let name = order.instrument.as_bytes();
        let copy_len = name.len().min(INSTRUMENT_LEN - 1);
        instrument[..copy_len].copy_from_slice(&name[..copy_len]);

        Self {
            command: u32::from(order.side.code()),
            order_id: order.id,
            price: order.price,
            count: order.remaining_count,
            instrument,
        }
    }

    /// Instrument name up to the first NUL
    ///
    /// `None` when the field has no NUL or the name is not valid UTF-8.
    pub fn instrument_name(&self) -> Option<&str> {
        let end = self.instrument.iter().position(|&b| b == 0)?;
        std::str::from_utf8(&self.instrument[..end]).ok()
    }

    /// Convert to domain Order type
    pub fn into_order(self) -> Result<Order, ProtocolError> {
        let side = OrderSide::from_code(self.command).ok_or(ProtocolError::UnknownSide(self.command))?;

        if side == OrderSide::Cancel {
            return Ok(Order::cancel(self.order_id));
        }

        let instrument = match self.instrument_name() {
            Some("") => return Err(ProtocolError::MissingInstrument(self.order_id)),
            Some(name) => name.to_string(),
            None => return Err(ProtocolError::InvalidInstrument(self.order_id)),
        };

        Ok(Order::new(side, self.order_id, instrument, self.price, self.count))
    }
}

/// Fixed-size record codec for client streams
///
/// A partial record left in the buffer when the stream ends is dropped and
/// counted; it never becomes an order.
#[derive(Debug, Default)]
pub struct InputCodec {
    truncated_records: u64,
}

impl InputCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Partial records discarded at end of stream
    pub fn truncated_records(&self) -> u64 {
        self.truncated_records
    }
}

impl Decoder for InputCodec {
    type Item = InputRecord;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < InputRecord::SIZE {
            src.reserve(InputRecord::SIZE - src.len());
            return Ok(None); // Need more data
        }

        InputRecord::decode(src).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None => {
                if !src.is_empty() {
                    tracing::warn!(
                        bytes = src.len(),
                        "Truncated record at end of stream dropped"
                    );
                    self.truncated_records += 1;
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<InputRecord> for InputCodec {
    type Error = io::Error;

    fn encode(&mut self, record: InputRecord, dst: &mut BytesMut) -> Result<(), Self::Error> {
        record.encode(dst);
        Ok(())
    }
}
