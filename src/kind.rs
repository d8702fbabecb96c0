//! Content kinds.
//!
//! A [`ContentKind`] says how the bytes of a segment should be interpreted,
//! and carries exactly the parameters its codec needs. Kinds know which
//! lengths they are consistent with, which is what keeps a segment's
//! declared extent and its decode parameters from drifting apart.
//!
//! [`ContentKind`]: enum.ContentKind.html

use std::fmt;

use crate::codec::audio::AudioParams;
use crate::codec::header;
use crate::codec::image::Depth;
use crate::codec::image::ImageParams;
use crate::codec::palette::PaletteParams;
use crate::codec::Compression;
use crate::error::Error;
use crate::error::Expect;

/// Parameters for tile set content.
///
/// Tiles are always 8x8 pixels.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct TileSetParams {
  /// The pixel depth of every tile.
  pub depth: Depth,
}

/// A cartridge header layout.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum HeaderLayout {
  /// The GBA header, either standard or multiboot-extended.
  Gba,
}

/// The interpretation of a segment's bytes.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ContentKind {
  /// Bytes with no particular interpretation.
  Raw,
  /// A BIOS-compressed stream.
  Compressed(Compression),
  /// An indexed-color image.
  Image(ImageParams),
  /// A list of colors.
  Palette(PaletteParams),
  /// PCM audio.
  Audio(AudioParams),
  /// A run of 8x8 tiles.
  TileSet(TileSetParams),
  /// The cartridge header.
  Header(HeaderLayout),
  /// Filler bytes.
  Padding,
  /// Bytes that have been looked at, but not classified.
  Unidentified,
}

impl ContentKind {
  /// Returns the tag naming this kind in descriptors.
  pub fn tag(&self) -> &'static str {
    match self {
      Self::Raw => "raw",
      Self::Compressed(_) => "compressed",
      Self::Image(_) => "image",
      Self::Palette(_) => "palette",
      Self::Audio(_) => "audio",
      Self::TileSet(_) => "tileset",
      Self::Header(_) => "header",
      Self::Padding => "padding",
      Self::Unidentified => "unidentified",
    }
  }

  /// Checks that a segment of this kind may be `len` bytes long.
  ///
  /// `truncated` permits an image to be shorter than its dimensions imply;
  /// other kinds ignore it.
  pub fn check_len(&self, len: usize, truncated: bool) -> Result<(), Error> {
    let multiple_of = |n: usize| match len % n {
      0 => Ok(()),
      _ => Err(Error::SizeMismatch {
        expected: Expect::MultipleOf(n),
        actual: len,
      }),
    };

    match self {
      Self::Compressed(_) if len < 4 => Err(Error::SizeMismatch {
        expected: Expect::AtLeast(4),
        actual: len,
      }),
      Self::Image(params) => {
        params.check_dimensions()?;
        let expected = params.byte_len();
        match (truncated, len) {
          (false, len) if len != expected => Err(Error::SizeMismatch {
            expected: Expect::Exactly(expected),
            actual: len,
          }),
          (true, len) if len > expected => Err(Error::SizeMismatch {
            expected: Expect::AtMost(expected),
            actual: len,
          }),
          _ => Ok(()),
        }
      }
      Self::Palette(params) => {
        multiple_of(2 * params.colors_per_bank.unwrap_or(1).max(1) as usize)
      }
      Self::Audio(params) => multiple_of(params.frame_len()?),
      Self::TileSet(params) => multiple_of(params.depth.tile_len()),
      Self::Header(HeaderLayout::Gba) => {
        match len {
          header::HEADER_LEN | header::EXTENDED_LEN => Ok(()),
          _ => Err(Error::SizeMismatch {
            expected: Expect::Exactly(header::HEADER_LEN),
            actual: len,
          }),
        }
      }
      _ => Ok(()),
    }
  }
}

impl fmt::Display for ContentKind {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.tag())?;
    match self {
      Self::Compressed(algorithm) => write!(f, " {}", algorithm.name()),
      Self::Image(p) => {
        write!(f, " {} {}x{} {}", p.depth, p.width, p.height, p.layout.name())?;
        if let Some(addr) = p.palette {
          write!(f, " palette=0x{:08X}", addr)?;
        }
        match p.bank {
          Some(bank) => write!(f, " bank={}", bank),
          None => Ok(()),
        }
      }
      Self::Palette(p) => {
        write!(f, " {}", p.format.name())?;
        match p.colors_per_bank {
          Some(n) => write!(f, " banks of {}", n),
          None => Ok(()),
        }
      }
      Self::Audio(p) => write!(
        f,
        " {}Hz {}-bit x{}",
        p.sample_rate, p.bit_depth, p.channels
      ),
      Self::TileSet(p) => write!(f, " {} 8x8", p.depth),
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::codec::image::Layout;
  use crate::codec::palette::ColorFormat;

  fn image(width: u32, height: u32, layout: Layout) -> ContentKind {
    ContentKind::Image(ImageParams {
      depth: Depth::Bpp4,
      width,
      height,
      layout,
      palette: None,
      bank: None,
    })
  }

  macro_rules! assert_len {
    ($kind:expr, $len:expr => $err:pat) => {
      assert!(
        matches!($kind.check_len($len, false), Err($err)),
        "{} with {}",
        $kind,
        $len
      );
    };
    ($kind:expr, $len:expr) => {
      assert!($kind.check_len($len, false).is_ok(), "{} with {}", $kind, $len);
    };
  }

  #[test]
  fn lengths() {
    assert_len!(ContentKind::Raw, 1);
    assert_len!(ContentKind::Compressed(Compression::Lz77), 4);
    assert_len!(ContentKind::Compressed(Compression::Lz77), 3 => Error::SizeMismatch { .. });

    assert_len!(image(16, 16, Layout::Tiled8x8), 128);
    assert_len!(image(16, 16, Layout::Tiled8x8), 127 => Error::SizeMismatch { .. });
    assert_len!(image(12, 16, Layout::Tiled8x8), 96 => Error::SizeMismatch { .. });
    assert_len!(image(12, 16, Layout::Linear), 96);

    let palette = |colors_per_bank| {
      ContentKind::Palette(PaletteParams {
        format: ColorFormat::Rgb555,
        colors_per_bank,
      })
    };
    assert_len!(palette(None), 512);
    assert_len!(palette(None), 511 => Error::SizeMismatch { .. });
    assert_len!(palette(Some(16)), 64);
    assert_len!(palette(Some(16)), 48 => Error::SizeMismatch { .. });

    let audio = |bit_depth| {
      ContentKind::Audio(AudioParams {
        sample_rate: 13379,
        bit_depth,
        channels: 2,
      })
    };
    assert_len!(audio(16), 400);
    assert_len!(audio(16), 402 => Error::SizeMismatch { .. });
    assert_len!(audio(24), 600 => Error::UnsupportedBitDepth(24));

    let tiles = ContentKind::TileSet(TileSetParams { depth: Depth::Bpp8 });
    assert_len!(tiles, 128);
    assert_len!(tiles, 96 => Error::SizeMismatch { .. });

    let header = ContentKind::Header(HeaderLayout::Gba);
    assert_len!(header, 192);
    assert_len!(header, 228);
    assert_len!(header, 200 => Error::SizeMismatch { .. });
  }

  #[test]
  fn truncation() {
    let kind = image(16, 16, Layout::Tiled8x8);
    assert!(kind.check_len(100, true).is_ok());
    assert!(kind.check_len(129, true).is_err());
    assert!(kind.check_len(100, false).is_err());
  }

  #[test]
  fn display() {
    assert_eq!(image(8, 16, Layout::Tiled8x8).to_string(), "image 4bpp 8x16 tiled8x8");
    assert_eq!(
      ContentKind::Compressed(Compression::RunLength).to_string(),
      "compressed rle"
    );
    assert_eq!(ContentKind::Padding.to_string(), "padding");
  }
}
