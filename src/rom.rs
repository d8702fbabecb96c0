//! Read-only access to ROM images.
//!
//! A [`ByteSource`] is an immutable, bounds-checked view over a flat byte
//! image: either a cartridge ROM loaded from disk, or a buffer produced by
//! decompressing part of one. Sources are cheap to clone and safe to read from
//! any number of threads at once.
//!
//! [`ByteSource`]: struct.ByteSource.html

use std::fmt;
use std::fs;
use std::io;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use crate::error::Error;

/// An immutable byte image.
///
/// Every read is checked against the length of the image; a request that
/// would run past the end fails with [`Error::OutOfBounds`] rather than
/// returning a short slice.
///
/// [`Error::OutOfBounds`]: ../error/enum.Error.html#variant.OutOfBounds
#[derive(Clone)]
pub struct ByteSource {
  bytes: Arc<[u8]>,
}

impl ByteSource {
  /// Reads a whole ROM image from `path`.
  pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
    let path = path.as_ref();
    let bytes = fs::read(path)?;
    log::info!("loaded {} ({} bytes)", path.display(), bytes.len());
    Ok(Self::from_bytes(bytes))
  }

  /// Wraps an in-memory buffer.
  pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
    Self {
      bytes: Arc::from(bytes.into()),
    }
  }

  /// Returns the number of bytes in this source.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  /// Returns true if this source holds no bytes at all.
  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Returns the whole image.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }

  /// Reads exactly `len` bytes starting at `offset`.
  pub fn read(&self, offset: usize, len: usize) -> Result<&[u8], Error> {
    let out_of_bounds = || Error::OutOfBounds {
      offset,
      len,
      source_len: self.len(),
    };
    let end = offset.checked_add(len).ok_or_else(out_of_bounds)?;
    self.bytes.get(offset..end).ok_or_else(out_of_bounds)
  }

  /// Reads the bytes in `range`.
  pub fn read_range(&self, range: Range<usize>) -> Result<&[u8], Error> {
    self.read(range.start, range.end.saturating_sub(range.start))
  }

  /// Reads everything from `offset` to the end of the source.
  ///
  /// This is used for streams whose length is only known once they have been
  /// decoded. `offset` may be equal to the length of the source, in which case
  /// the returned slice is empty.
  pub fn read_from(&self, offset: usize) -> Result<&[u8], Error> {
    self.bytes.get(offset..).ok_or(Error::OutOfBounds {
      offset,
      len: 0,
      source_len: self.len(),
    })
  }

  /// Reads the byte at `offset`.
  pub fn read_u8(&self, offset: usize) -> Result<u8, Error> {
    Ok(self.read(offset, 1)?[0])
  }

  /// Reads a little-endian `u16` at `offset`.
  pub fn read_u16(&self, offset: usize) -> Result<u16, Error> {
    let bytes = self.read(offset, 2)?;
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
  }

  /// Reads a little-endian `u32` at `offset`.
  pub fn read_u32(&self, offset: usize) -> Result<u32, Error> {
    let bytes = self.read(offset, 4)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
  }

  /// Dumps the bytes in `range` to the given `Write`, sixteen to a line, with
  /// an ASCII column on the right.
  ///
  /// Addresses are printed relative to the start of the source.
  pub fn dump(
    &self,
    range: Range<usize>,
    mut w: impl io::Write,
  ) -> Result<(), Error> {
    let bytes = self.read_range(range.clone())?;

    let mut ascii_str = String::new();
    for (i, chunk) in bytes.chunks(16).enumerate() {
      write!(w, "{:08X}:", range.start + i * 16)?;

      ascii_str.clear();
      for &byte in chunk {
        write!(w, " {:02x}", byte)?;

        if 0x20 <= byte && byte <= 0x7e {
          ascii_str.push(byte as char);
        } else {
          ascii_str.push('.');
        }
      }
      for _ in chunk.len()..16 {
        write!(w, "   ")?;
      }
      writeln!(w, "  |{}|", ascii_str)?;
    }
    Ok(())
  }
}

impl fmt::Debug for ByteSource {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "ByteSource({} bytes)", self.len())
  }
}
