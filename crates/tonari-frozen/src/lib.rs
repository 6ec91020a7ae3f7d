//! Frozen, mmap-friendly serialisation for tonari indices.
//!
//! A *frozen file* is an immutable container of items that can be opened
//! with `mmap` and read by item id without a load phase:
//!
//! ```text
//! ┌──────────────────┐
//! │ varint(count)    │
//! ├──────────────────┤
//! │ count x u32 (BE) │  absolute file offset of each item
//! ├──────────────────┤
//! │ item payloads    │  written in ascending id order
//! └──────────────────┘
//! ```
//!
//! Payloads are built from a small set of codecs (see [`varint`]):
//!
//! - unsigned varints: big-endian 7-bit groups, continuation bit on every
//!   byte except the last
//! - signed varints: zigzag-mapped then unsigned
//! - floats: byte-swapped IEEE-754 bit patterns as unsigned varints, so
//!   values near zero encode in one byte
//! - strings: varint length plus raw UTF-8
//!
//! # Example
//!
//! ```
//! use tonari_frozen::{freeze_items, ByteReader, FrozenDecode, FrozenEncode, FrozenFile};
//! use std::io::Write;
//!
//! struct Row(u64);
//!
//! impl FrozenEncode for Row {
//!     fn encode(&self, w: &mut dyn Write) -> std::io::Result<u64> {
//!         tonari_frozen::varint::write_uvarint(w, self.0)
//!     }
//! }
//!
//! impl FrozenDecode for Row {
//!     fn decode(r: &mut ByteReader<'_>) -> tonari_frozen::Result<Self> {
//!         Ok(Row(tonari_frozen::varint::read_uvarint(r)?))
//!     }
//! }
//!
//! let dir = tempfile::tempdir().unwrap();
//! let path = dir.path().join("rows.frozen");
//!
//! let mut file = std::fs::File::create(&path).unwrap();
//! freeze_items(&mut file, &[Row(1), Row(300)]).unwrap();
//! file.flush().unwrap();
//!
//! let frozen = FrozenFile::open(&path).unwrap();
//! assert_eq!(frozen.count(), 2);
//! assert_eq!(frozen.get_item::<Row>(1).unwrap().0, 300);
//! ```

mod freezer;
mod stream;
pub mod varint;

pub use freezer::{freeze_items, FrozenDecode, FrozenEncode, FrozenFile};
pub use stream::ByteReader;

/// Error type for frozen-format operations.
#[derive(Debug, thiserror::Error)]
pub enum FrozenError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected end of stream at offset {0}")]
    UnexpectedEof(usize),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("invalid UTF-8 in string payload: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Result type for frozen-format operations.
pub type Result<T> = std::result::Result<T, FrozenError>;
