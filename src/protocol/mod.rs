//! Client wire protocol
//!
//! - `binary` - Fixed-size little-endian input records and their codec

pub mod binary;

pub use binary::{InputCodec, InputRecord, INSTRUMENT_LEN};
