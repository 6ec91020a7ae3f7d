//! Frozen container: write a list of items once, read any item by id
//! through an mmap without a load phase.

use crate::{varint, ByteReader, FrozenError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

/// An item that can be serialised into a frozen container.
pub trait FrozenEncode {
    /// Writes the item's payload, returning the number of bytes written.
    ///
    /// Encoding must be deterministic: the container writer runs a sizing
    /// pass against [`std::io::sink`] before the real pass, and both must
    /// produce the same length.
    fn encode(&self, w: &mut dyn Write) -> io::Result<u64>;
}

/// An item that can be decoded from a frozen container payload.
pub trait FrozenDecode: Sized {
    fn decode(r: &mut ByteReader<'_>) -> Result<Self>;
}

/// Writes `items` as a frozen container: a varint count, one 4-byte
/// big-endian absolute offset per item, then the payloads in id order.
/// Returns the total number of bytes written.
pub fn freeze_items<W, T>(mut w: W, items: &[T]) -> Result<u64>
where
    W: Write,
    T: FrozenEncode,
{
    // Sizing pass: offsets must be known before any payload is written.
    let mut sizes = Vec::with_capacity(items.len());
    for item in items {
        sizes.push(item.encode(&mut io::sink())?);
    }

    let mut off = varint::write_uvarint(&mut w, items.len() as u64)? + 4 * items.len() as u64;
    for &size in &sizes {
        if off > u64::from(u32::MAX) {
            return Err(FrozenError::InvalidFormat(format!(
                "container offset {} exceeds the 32-bit offset limit",
                off
            )));
        }
        w.write_all(&(off as u32).to_be_bytes())?;
        off += size;
    }

    for (i, item) in items.iter().enumerate() {
        let written = item.encode(&mut w)?;
        if written != sizes[i] {
            return Err(FrozenError::InvalidFormat(format!(
                "item {} encoded {} bytes after sizing pass reported {}",
                i, written, sizes[i]
            )));
        }
    }

    Ok(off)
}

/// A read-only, memory-mapped frozen container.
///
/// Opening reads only the item count; payloads decode on demand from the
/// map, so random access by id costs one offset lookup plus the item's own
/// decoding.
pub struct FrozenFile {
    mmap: Mmap,
    header: usize,
    count: u64,
}

impl FrozenFile {
    /// Opens and memory-maps a frozen container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        // Safety: the file is opened read-only and the format is immutable
        // by contract; concurrent truncation is outside the threat model.
        let mmap = unsafe { Mmap::map(&file)? };

        let mut reader = ByteReader::new(&mmap, 0);
        let count = varint::read_uvarint(&mut reader)?;
        let header = reader.position();

        let table_end = header as u64 + count.checked_mul(4).ok_or_else(|| {
            FrozenError::InvalidFormat(format!("item count {} overflows offset table", count))
        })?;
        if table_end > mmap.len() as u64 {
            return Err(FrozenError::InvalidFormat(format!(
                "offset table for {} items does not fit in {} bytes",
                count,
                mmap.len()
            )));
        }

        Ok(Self {
            mmap,
            header,
            count,
        })
    }

    /// Number of items in the container.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Decodes item `index`.
    ///
    /// Panics if `index >= count()`; out-of-range access is a programmer
    /// error, not a data error.
    pub fn get_item<T: FrozenDecode>(&self, index: u64) -> Result<T> {
        let mut reader = self.item_reader(index)?;
        T::decode(&mut reader)
    }

    /// Returns a reader positioned at the payload of item `index`.
    ///
    /// Panics if `index >= count()`.
    pub fn item_reader(&self, index: u64) -> Result<ByteReader<'_>> {
        assert!(
            index < self.count,
            "item index {} out of range (count {})",
            index,
            self.count
        );

        let entry = self.header + index as usize * 4;
        let bytes = &self.mmap[entry..entry + 4];
        let offset = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;

        if offset > self.mmap.len() {
            return Err(FrozenError::InvalidFormat(format!(
                "item {} offset {} is beyond the end of the file",
                index, offset
            )));
        }
        Ok(ByteReader::new(&self.mmap, offset))
    }
}
