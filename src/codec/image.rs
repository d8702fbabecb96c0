//! Indexed-color images and tiles.
//!
//! Images are stored as palette indices packed at four or eight bits per
//! pixel. At 4bpp, the low nibble of each byte is the left pixel. Pixels are
//! either stored in row-major order, or in the GBA's native tiled order:
//! 8x8 tiles, each row-major internally, with the tiles themselves laid out
//! row-major across the image.

use std::convert::TryFrom;
use std::fmt;

use crate::codec::palette::Rgb;
use crate::error::Error;
use crate::error::Expect;

/// A pixel depth.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Depth {
  /// Four bits, or sixteen colors, per pixel.
  Bpp4,
  /// Eight bits, or 256 colors, per pixel.
  Bpp8,
}

impl Depth {
  /// Returns the number of bits per pixel.
  pub fn bits(self) -> u8 {
    match self {
      Self::Bpp4 => 4,
      Self::Bpp8 => 8,
    }
  }

  /// Converts a number of bits per pixel into a `Depth`.
  pub fn from_bits(bits: u8) -> Option<Self> {
    match bits {
      4 => Some(Self::Bpp4),
      8 => Some(Self::Bpp8),
      _ => None,
    }
  }

  /// Returns the number of bytes `pixels` pixels occupy at this depth,
  /// rounding up.
  ///
  /// This cannot overflow for any pixel count.
  pub fn byte_len(self, pixels: u64) -> u64 {
    let bits = self.bits() as u64;
    pixels / 8 * bits + (pixels % 8 * bits + 7) / 8
  }

  /// Returns the number of bytes in one 8x8 tile at this depth.
  pub fn tile_len(self) -> usize {
    self.byte_len(TILE_PIXELS as u64) as usize
  }
}

impl fmt::Display for Depth {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}bpp", self.bits())
  }
}

/// A pixel storage order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Layout {
  /// Row-major order across the whole image.
  Linear,
  /// 8x8 tiles.
  Tiled8x8,
}

impl Layout {
  /// Returns the name used for this layout in descriptors.
  pub fn name(self) -> &'static str {
    match self {
      Self::Linear => "linear",
      Self::Tiled8x8 => "tiled8x8",
    }
  }

  /// Parses a descriptor name into a `Layout`.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "linear" => Some(Self::Linear),
      "tiled8x8" => Some(Self::Tiled8x8),
      _ => None,
    }
  }
}

const TILE_SIDE: u32 = 8;
const TILE_PIXELS: usize = 64;

/// Parameters for indexed image content.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct ImageParams {
  /// The pixel depth.
  pub depth: Depth,
  /// The width, in pixels.
  pub width: u32,
  /// The height, in pixels.
  pub height: u32,
  /// The storage order.
  pub layout: Layout,
  /// The address of the palette segment used to render this image, if known.
  pub palette: Option<u32>,
  /// Which bank of the palette to render with, for palettes divided into
  /// banks.
  pub bank: Option<u16>,
}

/// The largest image, in bytes; no segment can be longer than this.
const MAX_IMAGE_LEN: u64 = u32::MAX as u64;

impl ImageParams {
  /// Returns the number of pixels in the image.
  ///
  /// Only meaningful once [`check_dimensions()`] has passed.
  ///
  /// [`check_dimensions()`]: #method.check_dimensions
  pub fn pixel_count(&self) -> usize {
    (self.width as u64 * self.height as u64) as usize
  }

  /// Returns the number of bytes the image occupies.
  ///
  /// Only meaningful once [`check_dimensions()`] has passed.
  ///
  /// [`check_dimensions()`]: #method.check_dimensions
  pub fn byte_len(&self) -> usize {
    self.stored_len() as usize
  }

  fn stored_len(&self) -> u64 {
    self.depth.byte_len(self.width as u64 * self.height as u64)
  }

  /// Checks that the dimensions are usable with the layout.
  ///
  /// Both dimensions must be non-zero; a tiled image must also be a whole
  /// number of tiles wide and high. The image must also fit in a segment.
  pub fn check_dimensions(&self) -> Result<(), Error> {
    for &side in &[self.width, self.height] {
      if side == 0 {
        return Err(Error::SizeMismatch {
          expected: Expect::NonZero,
          actual: 0,
        });
      }
      if self.layout == Layout::Tiled8x8 && side % TILE_SIDE != 0 {
        return Err(Error::SizeMismatch {
          expected: Expect::MultipleOf(TILE_SIDE as usize),
          actual: side as usize,
        });
      }
    }

    let len = self.stored_len();
    if len > MAX_IMAGE_LEN {
      return Err(Error::SizeMismatch {
        expected: Expect::AtMost(MAX_IMAGE_LEN as usize),
        actual: usize::try_from(len).unwrap_or(usize::MAX),
      });
    }
    Ok(())
  }
}

/// A decoded image: a grid of palette indices in row-major order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Pixels {
  /// The width, in pixels.
  pub width: u32,
  /// The height, in pixels.
  pub height: u32,
  /// The palette index of each pixel, row by row.
  pub indices: Vec<u8>,
}

impl Pixels {
  /// Returns the palette index at `(x, y)`, if it is inside the image.
  pub fn get(&self, x: u32, y: u32) -> Option<u8> {
    if x >= self.width || y >= self.height {
      return None;
    }
    self.indices.get((y * self.width + x) as usize).copied()
  }

  /// Returns an iterator over the rows of the image.
  pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
    self.indices.chunks(self.width.max(1) as usize)
  }
}

/// A rendered image: a grid of colors in row-major order.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Bitmap {
  /// The width, in pixels.
  pub width: u32,
  /// The height, in pixels.
  pub height: u32,
  /// The color of each pixel, row by row.
  pub colors: Vec<Rgb>,
}

/// Maps the `n`th stored pixel of a tiled image to its row-major index.
fn untile(n: usize, width: u32) -> usize {
  let side = TILE_SIDE as usize;
  let (tile, within) = (n / TILE_PIXELS, n % TILE_PIXELS);
  let tiles_per_row = width as usize / side;
  let x = (tile % tiles_per_row) * side + within % side;
  let y = (tile / tiles_per_row) * side + within / side;
  y * width as usize + x
}

fn unpack(bytes: &[u8], depth: Depth) -> Vec<u8> {
  match depth {
    Depth::Bpp8 => bytes.to_vec(),
    Depth::Bpp4 => bytes.iter().flat_map(|&b| vec![b & 0xf, b >> 4]).collect(),
  }
}

fn pack(indices: &[u8], depth: Depth) -> Vec<u8> {
  match depth {
    Depth::Bpp8 => indices.to_vec(),
    Depth::Bpp4 => indices
      .chunks(2)
      .map(|pair| pair[0] & 0xf | pair.get(1).copied().unwrap_or(0) << 4)
      .collect(),
  }
}

/// Decodes an image.
///
/// `bytes` must hold exactly [`ImageParams::byte_len()`] bytes.
///
/// [`ImageParams::byte_len()`]: struct.ImageParams.html#method.byte_len
pub fn decode(bytes: &[u8], params: &ImageParams) -> Result<Pixels, Error> {
  params.check_dimensions()?;
  if bytes.len() != params.byte_len() {
    return Err(Error::SizeMismatch {
      expected: Expect::Exactly(params.byte_len()),
      actual: bytes.len(),
    });
  }

  let mut stored = unpack(bytes, params.depth);
  stored.truncate(params.pixel_count());
  let indices = match params.layout {
    Layout::Linear => stored,
    Layout::Tiled8x8 => {
      let mut indices = vec![0; stored.len()];
      for (n, &index) in stored.iter().enumerate() {
        indices[untile(n, params.width)] = index;
      }
      indices
    }
  };

  Ok(Pixels {
    width: params.width,
    height: params.height,
    indices,
  })
}

/// Encodes an image at the given depth and layout.
///
/// At 4bpp, every index must be below sixteen.
pub fn encode(
  pixels: &Pixels,
  depth: Depth,
  layout: Layout,
) -> Result<Vec<u8>, Error> {
  let params = ImageParams {
    depth,
    width: pixels.width,
    height: pixels.height,
    layout,
    palette: None,
    bank: None,
  };
  params.check_dimensions()?;
  if pixels.indices.len() != params.pixel_count() {
    return Err(Error::SizeMismatch {
      expected: Expect::Exactly(params.pixel_count()),
      actual: pixels.indices.len(),
    });
  }
  if let Some(&max) = pixels.indices.iter().max() {
    let limit = 1usize << depth.bits();
    if max as usize >= limit {
      return Err(Error::SizeMismatch {
        expected: Expect::AtMost(limit - 1),
        actual: max as usize,
      });
    }
  }

  let stored = match layout {
    Layout::Linear => pixels.indices.clone(),
    Layout::Tiled8x8 => (0..pixels.indices.len())
      .map(|n| pixels.indices[untile(n, pixels.width)])
      .collect(),
  };
  Ok(pack(&stored, depth))
}

/// Maps every pixel of an image through a palette.
///
/// `offset` is added to each index before lookup, which selects a bank of a
/// multi-bank palette. Fails if any pixel refers past the end of the
/// palette.
pub fn render(
  pixels: &Pixels,
  palette: &[Rgb],
  offset: usize,
) -> Result<Bitmap, Error> {
  let colors = pixels
    .indices
    .iter()
    .map(|&i| {
      let index = i as usize + offset;
      palette.get(index).copied().ok_or(Error::SizeMismatch {
        expected: Expect::AtLeast(index + 1),
        actual: palette.len(),
      })
    })
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Bitmap {
    width: pixels.width,
    height: pixels.height,
    colors,
  })
}

/// A decoded set of 8x8 tiles.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct TileSet {
  /// The depth the tiles were stored at.
  pub depth: Depth,
  /// The palette indices of each tile, row-major within the tile.
  pub tiles: Vec<[u8; TILE_PIXELS]>,
}

impl TileSet {
  /// Returns the number of tiles.
  pub fn len(&self) -> usize {
    self.tiles.len()
  }

  /// Returns true if there are no tiles.
  pub fn is_empty(&self) -> bool {
    self.tiles.is_empty()
  }

  /// Arranges the tiles into an image `columns` tiles wide, for viewing.
  ///
  /// The last row is filled out with index zero.
  pub fn arrange(&self, columns: u32) -> Pixels {
    let columns = columns.max(1);
    let rows = (self.tiles.len() as u32 + columns - 1) / columns;
    let width = columns * TILE_SIDE;
    let height = rows * TILE_SIDE;

    let mut indices = vec![0; (width * height) as usize];
    for (t, tile) in self.tiles.iter().enumerate() {
      for (p, &index) in tile.iter().enumerate() {
        indices[untile(t * TILE_PIXELS + p, width)] = index;
      }
    }
    Pixels {
      width,
      height,
      indices,
    }
  }
}

/// Decodes a sequence of 8x8 tiles.
///
/// `bytes` must be a whole number of tiles: 32 bytes each at 4bpp, or 64 at
/// 8bpp.
pub fn decode_tiles(bytes: &[u8], depth: Depth) -> Result<TileSet, Error> {
  let tile_len = depth.tile_len();
  if bytes.len() % tile_len != 0 {
    return Err(Error::SizeMismatch {
      expected: Expect::MultipleOf(tile_len),
      actual: bytes.len(),
    });
  }

  let tiles = bytes
    .chunks_exact(tile_len)
    .map(|chunk| {
      let mut tile = [0; TILE_PIXELS];
      tile.copy_from_slice(&unpack(chunk, depth));
      tile
    })
    .collect();
  Ok(TileSet { depth, tiles })
}

/// Returns every `(width, height)` pair whose product is `pixels`, narrowest
/// first.
///
/// This is useful for guessing the shape of an image whose size is known but
/// whose dimensions are not, such as the payload of a compressed stream.
///
/// ```
/// # use romsection::codec::image::candidate_shapes;
/// assert_eq!(candidate_shapes(12), vec![(1, 12), (2, 6), (3, 4), (4, 3), (6, 2), (12, 1)]);
/// assert!(candidate_shapes(0).is_empty());
/// ```
pub fn candidate_shapes(pixels: usize) -> Vec<(u32, u32)> {
  (1..=pixels)
    .take_while(|w| w * w <= pixels)
    .filter(|w| pixels % w == 0)
    .flat_map(|w| {
      let h = pixels / w;
      match w == h {
        true => vec![(w, h)],
        false => vec![(w, h), (h, w)],
      }
    })
    .map(|(w, h)| (w as u32, h as u32))
    .collect::<std::collections::BTreeSet<_>>()
    .into_iter()
    .collect()
}

#[cfg(test)]
mod test {
  use super::*;

  fn params(depth: Depth, width: u32, height: u32, layout: Layout) -> ImageParams {
    ImageParams {
      depth,
      width,
      height,
      layout,
      palette: None,
      bank: None,
    }
  }

  #[test]
  fn nibble_order() {
    let p = params(Depth::Bpp4, 2, 1, Layout::Linear);
    let pixels = decode(&[0x21], &p).unwrap();
    assert_eq!(pixels.indices, vec![1, 2]);
    assert_eq!(encode(&pixels, Depth::Bpp4, Layout::Linear).unwrap(), vec![0x21]);
  }

  #[test]
  fn tiled_order() {
    // Two 8x8 tiles side by side; each stored pixel holds its own storage
    // index.
    let p = params(Depth::Bpp8, 16, 8, Layout::Tiled8x8);
    let bytes: Vec<u8> = (0..128).collect();
    let pixels = decode(&bytes, &p).unwrap();

    assert_eq!(pixels.get(0, 0), Some(0));
    assert_eq!(pixels.get(7, 0), Some(7));
    assert_eq!(pixels.get(8, 0), Some(64));
    assert_eq!(pixels.get(0, 1), Some(8));
    assert_eq!(pixels.get(15, 7), Some(127));
    assert_eq!(pixels.get(16, 0), None);
    assert_eq!(pixels.rows().next().unwrap()[8], 64);

    assert_eq!(encode(&pixels, Depth::Bpp8, Layout::Tiled8x8).unwrap(), bytes);
  }

  #[test]
  fn size_checks() {
    let p = params(Depth::Bpp4, 8, 8, Layout::Linear);
    assert!(decode(&[0; 32], &p).is_ok());
    assert!(matches!(
      decode(&[0; 31], &p),
      Err(Error::SizeMismatch {
        expected: Expect::Exactly(32),
        actual: 31
      })
    ));

    let p = params(Depth::Bpp8, 12, 8, Layout::Tiled8x8);
    assert!(matches!(
      decode(&[0; 96], &p),
      Err(Error::SizeMismatch {
        expected: Expect::MultipleOf(8),
        actual: 12
      })
    ));

    let p = params(Depth::Bpp8, 0, 8, Layout::Linear);
    assert!(decode(&[], &p).is_err());

    // Dimensions whose byte count overflows are rejected, not wrapped.
    let p = params(Depth::Bpp8, 0x8000_0000, 0x8000_0000, Layout::Linear);
    assert!(matches!(
      p.check_dimensions(),
      Err(Error::SizeMismatch {
        expected: Expect::AtMost(0xffff_ffff),
        ..
      })
    ));
    assert!(decode(&[0; 16], &p).is_err());
    let p = params(Depth::Bpp4, u32::MAX, u32::MAX, Layout::Linear);
    assert!(p.check_dimensions().is_err());
    assert_eq!(Depth::Bpp8.byte_len(u64::MAX), u64::MAX);

    // Odd pixel counts round up to a whole byte.
    let p = params(Depth::Bpp4, 3, 1, Layout::Linear);
    assert_eq!(decode(&[0x21, 0x03], &p).unwrap().indices, vec![1, 2, 3]);
  }

  #[test]
  fn index_range() {
    let pixels = Pixels {
      width: 2,
      height: 1,
      indices: vec![3, 16],
    };
    assert!(encode(&pixels, Depth::Bpp4, Layout::Linear).is_err());
    assert_eq!(
      encode(&pixels, Depth::Bpp8, Layout::Linear).unwrap(),
      vec![3, 16]
    );
  }

  #[test]
  fn render_with_bank() {
    let palette: Vec<Rgb> = (0..20).map(|i| Rgb::new(i, 0, 0)).collect();
    let pixels = Pixels {
      width: 2,
      height: 1,
      indices: vec![0, 3],
    };

    let bitmap = render(&pixels, &palette, 16).unwrap();
    assert_eq!(bitmap.colors, vec![Rgb::new(16, 0, 0), Rgb::new(19, 0, 0)]);
    assert!(matches!(
      render(&pixels, &palette, 17),
      Err(Error::SizeMismatch {
        expected: Expect::AtLeast(21),
        actual: 20
      })
    ));
  }

  #[test]
  fn tiles() {
    let mut bytes = vec![0x11; 32];
    bytes.extend_from_slice(&[0x32; 32]);
    let set = decode_tiles(&bytes, Depth::Bpp4).unwrap();
    assert_eq!(set.len(), 2);
    assert_eq!(set.tiles[1][0], 2);
    assert_eq!(set.tiles[1][1], 3);
    assert!(decode_tiles(&bytes[..40], Depth::Bpp4).is_err());
    assert!(decode_tiles(&bytes, Depth::Bpp8).unwrap().len() == 1);

    let sheet = set.arrange(3);
    assert_eq!((sheet.width, sheet.height), (24, 8));
    assert_eq!(sheet.get(0, 0), Some(1));
    assert_eq!(sheet.get(8, 0), Some(2));
    assert_eq!(sheet.get(16, 0), Some(0));
  }

  #[test]
  fn shapes() {
    assert_eq!(candidate_shapes(1), vec![(1, 1)]);
    assert_eq!(candidate_shapes(7), vec![(1, 7), (7, 1)]);
    assert!(candidate_shapes(64).contains(&(8, 8)));
    assert_eq!(candidate_shapes(64).len(), 7);
  }
}
