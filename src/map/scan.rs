//! Searching for compressed streams.
//!
//! Compressed data carries no index, so the only way to find it is to try
//! decoding at every address and keep whatever decodes cleanly. A random
//! byte equal to the LZ77 tag is common, so candidates are filtered by the
//! plausibility of their declared size before any decoding happens.

use std::ops::Range;

use crate::codec::lz77;
use crate::codec::Compression;
use crate::error::Error;
use crate::int::u24;
use crate::kind::ContentKind;
use crate::map::Registry;
use crate::map::Segment;
use crate::rom::ByteSource;

/// Options for a scan.
#[derive(Copy, Clone, Debug)]
pub struct Options {
  /// The smallest declared size worth reporting.
  pub min_len: usize,
  /// The largest declared size worth reporting.
  pub max_len: usize,
  /// Whether to resume scanning after the end of each stream found, rather
  /// than at the next byte.
  pub skip_found: bool,
}

impl Default for Options {
  fn default() -> Self {
    Self {
      min_len: 16,
      max_len: 600 * 400 * 2,
      skip_found: false,
    }
  }
}

/// A stream found by a scan.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Found {
  /// The address of the stream's header.
  pub address: u32,
  /// The number of bytes the stream occupies.
  pub len: u32,
  /// The size of the stream's output.
  pub decompressed_len: usize,
}

impl Found {
  /// Returns a segment covering this stream.
  pub fn to_segment(self) -> Segment {
    Segment::new(
      self.address,
      self.len,
      ContentKind::Compressed(Compression::Lz77),
    )
  }
}

/// Scans `range` of `source` for LZ77 streams.
///
/// Streams must lie entirely within `range`.
pub fn scan(
  source: &ByteSource,
  range: Range<u32>,
  opts: &Options,
) -> Result<Vec<Found>, Error> {
  let base = range.start;
  let window = source.read_range(range.start as usize..range.end as usize)?;

  let mut found = Vec::new();
  let mut offset = 0;
  while offset < window.len() {
    let address = base + offset as u32;
    match try_at(&window[offset..], address, opts) {
      Some(stream) => {
        offset += match opts.skip_found {
          true => stream.len as usize,
          false => 1,
        };
        found.push(stream);
      }
      None => offset += 1,
    }
  }

  log::info!(
    "found {} streams in 0x{:08X}..0x{:08X}",
    found.len(),
    range.start,
    range.end
  );
  Ok(found)
}

fn try_at(input: &[u8], address: u32, opts: &Options) -> Option<Found> {
  match input {
    [lz77::TAG, a, b, c, ..] => {
      let size = u24::from_le_bytes([*a, *b, *c]).to_u32() as usize;
      if size == 0 {
        return None;
      }
      if size < opts.min_len || size > opts.max_len {
        log::warn!("0x{:08X}: skipped stream of {} bytes", address, size);
        return None;
      }
    }
    _ => return None,
  }

  let out = lz77::decode(input).ok()?;
  Some(Found {
    address,
    len: out.consumed as u32,
    decompressed_len: out.bytes.len(),
  })
}

impl Registry {
  /// Scans `range` for LZ77 streams, ignoring any that overlap existing
  /// segments.
  pub fn scan(
    &self,
    range: Range<u32>,
    opts: &Options,
  ) -> Result<Vec<Found>, Error> {
    let mut found = scan(self.source(), range, opts)?;
    found.retain(|f| {
      let range = f.address..f.address + f.len;
      self.segments_overlapping(range).next().is_none()
    });
    Ok(found)
  }
}
