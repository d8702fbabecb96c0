//! The GBA BIOS run-length format.
//!
//! The header is the tag `0x30` followed by a 24-bit decompressed size, just
//! like LZ77. Each following flag byte starts a run: if bit 7 is set, the
//! next byte is repeated `(flag & 0x7f) + 3` times; otherwise the next
//! `(flag & 0x7f) + 1` bytes are copied verbatim.

use crate::codec::write_header;
use crate::codec::Decompressed;
use crate::codec::Reader;
use crate::error::Error;

/// The header tag for run-length streams.
pub const TAG: u8 = 0x30;

const MIN_RUN: usize = 3;
const MAX_RUN: usize = 0x7f + MIN_RUN;
const MAX_LITERALS: usize = 0x80;

/// Decodes a run-length stream.
pub fn decode(input: &[u8]) -> Result<Decompressed, Error> {
  let mut r = Reader::new(input);
  let size = r.header(TAG, "rle")?;
  let mut out = Vec::with_capacity(size);

  while out.len() < size {
    let at = r.pos();
    let flag = r.u8()?;
    let is_run = flag & 0x80 != 0;
    let len = match is_run {
      true => (flag & 0x7f) as usize + MIN_RUN,
      false => (flag & 0x7f) as usize + 1,
    };
    if out.len() + len > size {
      return Err(Error::MalformedStream {
        offset: at,
        reason: "run past the declared size",
      });
    }

    if is_run {
      let byte = r.u8()?;
      out.resize(out.len() + len, byte);
    } else {
      for _ in 0..len {
        out.push(r.u8()?);
      }
    }
  }

  Ok(Decompressed {
    bytes: out,
    consumed: r.pos(),
  })
}

/// Encodes `input` as a run-length stream.
pub fn encode(input: &[u8]) -> Result<Vec<u8>, Error> {
  let mut out = Vec::with_capacity(input.len() + input.len() / 64 + 5);
  write_header(&mut out, TAG, input.len())?;

  let mut pos = 0;
  let mut literals_start = 0;
  while pos < input.len() {
    let byte = input[pos];
    let run = input[pos..]
      .iter()
      .take(MAX_RUN)
      .take_while(|&&b| b == byte)
      .count();
    if run < MIN_RUN {
      pos += 1;
      continue;
    }

    push_literals(&mut out, &input[literals_start..pos]);
    out.push(0x80 | (run - MIN_RUN) as u8);
    out.push(byte);
    pos += run;
    literals_start = pos;
  }
  push_literals(&mut out, &input[literals_start..]);

  Ok(out)
}

fn push_literals(out: &mut Vec<u8>, literals: &[u8]) {
  for chunk in literals.chunks(MAX_LITERALS) {
    out.push((chunk.len() - 1) as u8);
    out.extend_from_slice(chunk);
  }
}
