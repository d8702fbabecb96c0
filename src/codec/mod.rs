//! Stateless decoders and encoders for each kind of ROM content.
//!
//! Every function in this module is a pure function of its input bytes and
//! parameters: there is no shared state, so any number of ranges can be
//! decoded concurrently.
//!
//! [`decode()`] is the single entry point used by the rest of the engine; it
//! dispatches on a [`ContentKind`] to the codec for that kind and wraps the
//! result in an [`Artifact`].
//!
//! [`decode()`]: fn.decode.html
//! [`ContentKind`]: ../kind/enum.ContentKind.html
//! [`Artifact`]: enum.Artifact.html

use crate::error::Error;
use crate::int::u24;
use crate::kind::ContentKind;

pub mod audio;
pub mod header;
pub mod image;
pub mod lz77;
pub mod palette;
pub mod rle;

/// A BIOS compression algorithm.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Compression {
  /// LZ77 ("LZSS") compression, type tag `0x10`.
  Lz77,
  /// Run-length compression, type tag `0x30`.
  RunLength,
}

impl Compression {
  /// Returns the header tag byte identifying this algorithm.
  pub fn tag(self) -> u8 {
    match self {
      Self::Lz77 => lz77::TAG,
      Self::RunLength => rle::TAG,
    }
  }

  /// Returns the name used for this algorithm in descriptors.
  pub fn name(self) -> &'static str {
    match self {
      Self::Lz77 => "lz77",
      Self::RunLength => "rle",
    }
  }

  /// Parses a descriptor name into a `Compression`.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "lz77" => Some(Self::Lz77),
      "rle" => Some(Self::RunLength),
      _ => None,
    }
  }

  /// Decodes a stream compressed with this algorithm.
  pub fn decode(self, input: &[u8]) -> Result<Decompressed, Error> {
    match self {
      Self::Lz77 => lz77::decode(input),
      Self::RunLength => rle::decode(input),
    }
  }

  /// Compresses `input` with this algorithm.
  pub fn encode(self, input: &[u8]) -> Result<Vec<u8>, Error> {
    match self {
      Self::Lz77 => lz77::encode(input),
      Self::RunLength => rle::encode(input),
    }
  }
}

/// The result of decompressing a stream.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Decompressed {
  /// The decompressed payload.
  pub bytes: Vec<u8>,
  /// The number of input bytes the stream occupied, header included.
  ///
  /// A compressed stream's end is only known once it has been decoded, so
  /// this is how the exact extent of a compressed region is discovered.
  pub consumed: usize,
}

/// Decompresses a BIOS-compressed stream, picking the algorithm from its type
/// tag.
pub fn decompress(input: &[u8]) -> Result<Decompressed, Error> {
  match input.first() {
    Some(&lz77::TAG) => lz77::decode(input),
    Some(&rle::TAG) => rle::decode(input),
    Some(&tag) => Err(Error::UnsupportedVariant {
      format: "compression",
      tag: tag as u32,
    }),
    None => Err(Error::MalformedStream {
      offset: 0,
      reason: "empty input",
    }),
  }
}

/// A decoded, in-memory structured result of applying a codec to some bytes.
#[derive(Clone, PartialEq, Debug)]
pub enum Artifact {
  /// Uninterpreted bytes, for raw, padding, and unidentified content.
  Bytes(Vec<u8>),
  /// A decompressed payload.
  Decompressed(Decompressed),
  /// Palette indices of an image.
  Image(image::Pixels),
  /// A set of 8x8 tiles.
  TileSet(image::TileSet),
  /// A list of colors.
  Palette(palette::Palette),
  /// PCM audio.
  Audio(audio::Samples),
  /// A cartridge header.
  Header(header::CartridgeHeader),
}

impl Artifact {
  /// Returns a short name for the type of this artifact.
  pub fn name(&self) -> &'static str {
    match self {
      Self::Bytes(_) => "bytes",
      Self::Decompressed(_) => "decompressed",
      Self::Image(_) => "image",
      Self::TileSet(_) => "tileset",
      Self::Palette(_) => "palette",
      Self::Audio(_) => "audio",
      Self::Header(_) => "header",
    }
  }
}

/// Decodes `bytes` as content of the given kind.
pub fn decode(kind: &ContentKind, bytes: &[u8]) -> Result<Artifact, Error> {
  let artifact = match kind {
    ContentKind::Raw | ContentKind::Padding | ContentKind::Unidentified => {
      Artifact::Bytes(bytes.to_vec())
    }
    ContentKind::Compressed(algorithm) => {
      Artifact::Decompressed(algorithm.decode(bytes)?)
    }
    ContentKind::Image(params) => {
      Artifact::Image(image::decode(bytes, params)?)
    }
    ContentKind::TileSet(params) => {
      Artifact::TileSet(image::decode_tiles(bytes, params.depth)?)
    }
    ContentKind::Palette(_) => Artifact::Palette(palette::decode(bytes)?),
    ContentKind::Audio(params) => {
      Artifact::Audio(audio::decode(bytes, params)?)
    }
    ContentKind::Header(_) => Artifact::Header(header::decode(bytes)?),
  };
  Ok(artifact)
}

/// A cursor over a compressed stream.
///
/// Running off the end of the input is always a [`MalformedStream`] error,
/// since a stream never ends before its declared size is produced.
///
/// [`MalformedStream`]: ../error/enum.Error.html#variant.MalformedStream
pub(in crate::codec) struct Reader<'a> {
  input: &'a [u8],
  pos: usize,
}

impl<'a> Reader<'a> {
  pub fn new(input: &'a [u8]) -> Self {
    Self { input, pos: 0 }
  }

  /// Returns the number of bytes consumed so far.
  pub fn pos(&self) -> usize {
    self.pos
  }

  pub fn u8(&mut self) -> Result<u8, Error> {
    let byte = self.input.get(self.pos).copied().ok_or(Error::MalformedStream {
      offset: self.pos,
      reason: "input ended before the declared size was reached",
    })?;
    self.pos += 1;
    Ok(byte)
  }

  /// Reads a BIOS compression header, checking its type tag and returning
  /// the declared decompressed size.
  pub fn header(
    &mut self,
    tag: u8,
    format: &'static str,
  ) -> Result<usize, Error> {
    let found = self.u8()?;
    if found != tag {
      return Err(Error::UnsupportedVariant {
        format,
        tag: found as u32,
      });
    }
    let size = u24::from_le_bytes([self.u8()?, self.u8()?, self.u8()?]);
    Ok(size.to_u32() as usize)
  }
}

/// Writes a BIOS compression header for `len` bytes of payload.
pub(in crate::codec) fn write_header(
  out: &mut Vec<u8>,
  tag: u8,
  len: usize,
) -> Result<(), Error> {
  let size = match len {
    len if len <= u24::MAX.to_u32() as usize => u24::from_u32(len as u32),
    _ => {
      return Err(Error::SizeMismatch {
        expected: crate::error::Expect::AtMost(u24::MAX.to_u32() as usize),
        actual: len,
      })
    }
  };
  out.push(tag);
  out.extend_from_slice(&size.to_le_bytes());
  Ok(())
}
