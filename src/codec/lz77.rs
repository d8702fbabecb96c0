//! The GBA BIOS LZ77 format.
//!
//! A stream starts with a four-byte header: the tag `0x10`, followed by the
//! decompressed size as a little-endian 24-bit integer. After the header come
//! groups of one flag byte and up to eight tokens; flag bits are read from
//! the most significant down, and a set bit marks a back-reference while a
//! clear bit marks a literal byte.
//!
//! A back-reference is two bytes: the high nibble of the first is the copy
//! length minus three, and the remaining twelve bits are the distance back
//! into the output minus one. Copies may overlap the bytes they produce.

use crate::codec::write_header;
use crate::codec::Decompressed;
use crate::codec::Reader;
use crate::error::Error;

/// The header tag for LZ77 streams.
pub const TAG: u8 = 0x10;

const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 18;
const WINDOW: usize = 4096;

/// Decodes an LZ77 stream.
///
/// Decoding stops as soon as the declared size has been produced, even in
/// the middle of a flag group; trailing bytes in `input` are ignored, and the
/// returned [`Decompressed::consumed`] says where the stream ended.
///
/// [`Decompressed::consumed`]: ../struct.Decompressed.html#structfield.consumed
pub fn decode(input: &[u8]) -> Result<Decompressed, Error> {
  let mut r = Reader::new(input);
  let size = r.header(TAG, "lz77")?;
  let mut out = Vec::with_capacity(size);

  while out.len() < size {
    let flags = r.u8()?;
    for bit in 0..8 {
      if out.len() >= size {
        break;
      }
      if flags & (0x80 >> bit) == 0 {
        out.push(r.u8()?);
        continue;
      }

      let at = r.pos();
      let (hi, lo) = (r.u8()? as usize, r.u8()? as usize);
      let len = (hi >> 4) + MIN_MATCH;
      let dist = ((hi & 0xf) << 8 | lo) + 1;
      if dist > out.len() {
        return Err(Error::MalformedStream {
          offset: at,
          reason: "back-reference before the start of the output",
        });
      }
      if out.len() + len > size {
        return Err(Error::MalformedStream {
          offset: at,
          reason: "back-reference past the declared size",
        });
      }

      let from = out.len() - dist;
      for i in from..from + len {
        let byte = out[i];
        out.push(byte);
      }
    }
  }

  Ok(Decompressed {
    bytes: out,
    consumed: r.pos(),
  })
}

/// Encodes `input` as an LZ77 stream.
///
/// Matching is greedy: at each position, the longest match within the window
/// is taken, preferring the nearest one. The output is not padded, so
/// decoding it reports a `consumed` equal to its length.
pub fn encode(input: &[u8]) -> Result<Vec<u8>, Error> {
  let mut out = Vec::with_capacity(input.len() + input.len() / 8 + 4);
  write_header(&mut out, TAG, input.len())?;

  let mut pos = 0;
  while pos < input.len() {
    let flag_idx = out.len();
    out.push(0);
    for bit in 0..8 {
      if pos >= input.len() {
        break;
      }
      match longest_match(input, pos) {
        Some((dist, len)) => {
          out[flag_idx] |= 0x80 >> bit;
          let dist = dist - 1;
          out.push(((len - MIN_MATCH) << 4 | dist >> 8) as u8);
          out.push(dist as u8);
          pos += len;
        }
        None => {
          out.push(input[pos]);
          pos += 1;
        }
      }
    }
  }

  Ok(out)
}

/// Finds the longest match for the bytes at `pos`, returning its distance and
/// length.
fn longest_match(input: &[u8], pos: usize) -> Option<(usize, usize)> {
  let max_len = MAX_MATCH.min(input.len() - pos);
  if max_len < MIN_MATCH {
    return None;
  }

  let needle = &input[pos..pos + max_len];
  let mut best = None;
  let mut best_len = MIN_MATCH - 1;
  for from in (pos.saturating_sub(WINDOW)..pos).rev() {
    let len = input[from..]
      .iter()
      .zip(needle)
      .take_while(|(a, b)| a == b)
      .count();
    if len > best_len {
      best = Some((pos - from, len));
      best_len = len;
      if len == max_len {
        break;
      }
    }
  }
  best
}

#[cfg(test)]
mod test {
  use super::*;

  const SMILEY: &[u8] = b"\x10\x30\x00\x00\x08\x00\x00\x00\x00\x30\x03\x01\
      \x01\x01\x4b\x01\x10\x06\x02\x02\x20\x08\x01\x10\x06\x20\x10\xc0\x30\
      \x06\x40\x25";

  #[test]
  fn known_stream() {
    let out = decode(SMILEY).unwrap();
    assert_eq!(out.consumed, 32);
    assert_eq!(out.bytes.len(), 48);

    let rows: Vec<&[u8]> = out.bytes.chunks(8).collect();
    assert_eq!(rows[0], &[0; 8]);
    assert_eq!(rows[1], &[0, 0, 1, 1, 1, 1, 0, 0]);
    assert_eq!(rows[2], &[0, 1, 2, 2, 1, 1, 1, 0]);
    assert_eq!(rows[3], &[0, 1, 2, 1, 1, 1, 1, 0]);
    assert_eq!(rows[4], &[0, 0, 1, 1, 1, 1, 0, 0]);
    assert_eq!(rows[5], &[0; 8]);
  }

  #[test]
  fn trailing_bytes_are_not_consumed() {
    let mut input = SMILEY.to_vec();
    input.extend_from_slice(&[0xff; 7]);
    let out = decode(&input).unwrap();
    assert_eq!(out.consumed, 32);
    assert_eq!(out.bytes.len(), 48);
  }

  #[test]
  fn empty_window() {
    // The very first token is a back-reference, which has nothing to copy.
    let input = b"\x10\x30\x00\x00\xb2\x70\x00\x01\x00\x00\x10\x06\x02\x02\
        \x20\x08\x01\xf0\x10\x06\x20\x10\x30\x06\x40\x00\x00\x00";
    assert!(matches!(
      decode(input),
      Err(Error::MalformedStream { offset: 5, .. })
    ));
  }

  #[test]
  fn malformed() {
    // Wrong tag.
    assert!(matches!(
      decode(&[0x11, 0x00, 0x00, 0x00]),
      Err(Error::UnsupportedVariant { tag: 0x11, .. })
    ));
    // Truncated header.
    assert!(matches!(
      decode(&[0x10, 0x30]),
      Err(Error::MalformedStream { .. })
    ));
    // Input runs out after three of four literals.
    assert!(matches!(
      decode(&[0x10, 0x04, 0x00, 0x00, 0x00, 1, 2, 3]),
      Err(Error::MalformedStream { offset: 8, .. })
    ));
    // A six-byte copy into a four-byte output.
    assert!(matches!(
      decode(&[0x10, 0x04, 0x00, 0x00, 0x40, 0xaa, 0x30, 0x00]),
      Err(Error::MalformedStream { offset: 6, .. })
    ));
  }

  #[test]
  fn zero_size() {
    let out = decode(&[0x10, 0x00, 0x00, 0x00]).unwrap();
    assert!(out.bytes.is_empty());
    assert_eq!(out.consumed, 4);
    assert_eq!(encode(&[]).unwrap(), vec![0x10, 0x00, 0x00, 0x00]);
  }

  #[test]
  fn overlapping_copy() {
    // One literal, then a distance-1 copy of length 18 that repeats it.
    let input = [0x10, 0x13, 0x00, 0x00, 0x40, 0x7a, 0xf0, 0x00];
    let out = decode(&input).unwrap();
    assert_eq!(out.bytes, vec![0x7a; 19]);
    assert_eq!(out.consumed, 8);
    assert_eq!(encode(&[0x7a; 19]).unwrap(), input.to_vec());
  }

  #[test]
  fn encoded_streams_decode() {
    let smiley = decode(SMILEY).unwrap().bytes;
    let mut noise = Vec::new();
    let mut x = 0x1234_5678u32;
    for _ in 0..5000 {
      x ^= x << 13;
      x ^= x >> 17;
      x ^= x << 5;
      noise.push((x % 7) as u8);
    }

    for data in &[&smiley[..], &noise[..], &b"abcabcabcabcabcabcabcabcxyz"[..]] {
      let packed = encode(data).unwrap();
      let out = decode(&packed).unwrap();
      assert_eq!(&out.bytes[..], *data);
      assert_eq!(out.consumed, packed.len());
    }

    assert!(encode(&smiley).unwrap().len() < smiley.len());
  }
}
