//! RGB555 palettes.
//!
//! The GBA stores colors as little-endian 16-bit words: bits 0-4 are red,
//! bits 5-9 are green, and bits 10-14 are blue. Bit 15 is ignored.

use std::fmt;

use crate::error::Error;
use crate::error::Expect;

/// An 8-bit-per-channel color.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub struct Rgb {
  /// The red channel.
  pub r: u8,
  /// The green channel.
  pub g: u8,
  /// The blue channel.
  pub b: u8,
}

impl Rgb {
  /// Creates a new `Rgb`.
  pub const fn new(r: u8, g: u8, b: u8) -> Self {
    Self { r, g, b }
  }

  /// Expands a 15-bit color word into 8-bit channels.
  ///
  /// Each five-bit channel `v` becomes `v * 255 / 31`, so that both black and
  /// full intensity are preserved exactly.
  ///
  /// ```
  /// # use romsection::codec::palette::Rgb;
  /// assert_eq!(Rgb::from_rgb555(0x7fff), Rgb::new(255, 255, 255));
  /// assert_eq!(Rgb::from_rgb555(0x001f), Rgb::new(255, 0, 0));
  /// assert_eq!(Rgb::from_rgb555(0x8000), Rgb::new(0, 0, 0));
  /// ```
  pub fn from_rgb555(word: u16) -> Self {
    let expand = |v: u16| ((v & 0x1f) as u32 * 255 / 31) as u8;
    Self {
      r: expand(word),
      g: expand(word >> 5),
      b: expand(word >> 10),
    }
  }

  /// Packs this color into a 15-bit color word, dropping the low three bits
  /// of each channel.
  pub fn to_rgb555(self) -> u16 {
    let pack = |v: u8| (v >> 3) as u16;
    pack(self.r) | pack(self.g) << 5 | pack(self.b) << 10
  }
}

impl fmt::Display for Rgb {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
  }
}

/// A color encoding.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ColorFormat {
  /// 15-bit little-endian color words.
  Rgb555,
}

impl ColorFormat {
  /// Returns the name used for this format in descriptors.
  pub fn name(self) -> &'static str {
    match self {
      Self::Rgb555 => "rgb555",
    }
  }

  /// Parses a descriptor name into a `ColorFormat`.
  pub fn from_name(name: &str) -> Option<Self> {
    match name {
      "rgb555" => Some(Self::Rgb555),
      _ => None,
    }
  }
}

/// Parameters for palette content.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct PaletteParams {
  /// The encoding of each color.
  pub format: ColorFormat,
  /// The number of colors in each bank, if the palette is split into banks.
  ///
  /// 4bpp graphics use banks of sixteen colors.
  pub colors_per_bank: Option<u16>,
}

impl Default for PaletteParams {
  fn default() -> Self {
    Self {
      format: ColorFormat::Rgb555,
      colors_per_bank: None,
    }
  }
}

/// A decoded list of colors.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Palette {
  /// The colors, in storage order.
  pub colors: Vec<Rgb>,
}

impl Palette {
  /// Returns the number of colors.
  pub fn len(&self) -> usize {
    self.colors.len()
  }

  /// Returns true if there are no colors.
  pub fn is_empty(&self) -> bool {
    self.colors.is_empty()
  }

  /// Returns the `index`th bank of `per_bank` colors, if it exists.
  pub fn bank(&self, index: usize, per_bank: usize) -> Option<&[Rgb]> {
    self.banks(per_bank).nth(index)
  }

  /// Returns an iterator over consecutive banks of `per_bank` colors.
  ///
  /// The last bank may be short.
  pub fn banks(&self, per_bank: usize) -> impl Iterator<Item = &[Rgb]> {
    self.colors.chunks(per_bank.max(1))
  }
}

/// Decodes RGB555 color words.
///
/// Fails with [`Error::SizeMismatch`] if `bytes` has odd length.
///
/// [`Error::SizeMismatch`]: ../../error/enum.Error.html#variant.SizeMismatch
pub fn decode(bytes: &[u8]) -> Result<Palette, Error> {
  if bytes.len() % 2 != 0 {
    return Err(Error::SizeMismatch {
      expected: Expect::MultipleOf(2),
      actual: bytes.len(),
    });
  }

  let colors = bytes
    .chunks_exact(2)
    .map(|w| Rgb::from_rgb555(u16::from_le_bytes([w[0], w[1]])))
    .collect();
  Ok(Palette { colors })
}

/// Encodes colors as RGB555 color words.
pub fn encode(colors: &[Rgb]) -> Vec<u8> {
  colors
    .iter()
    .flat_map(|c| c.to_rgb555().to_le_bytes().to_vec())
    .collect()
}

/// Returns `colors` evenly spaced shades from black to white.
pub fn grayscale(colors: usize) -> Vec<Rgb> {
  (0..colors)
    .map(|i| {
      let v = (i * 255 / colors.saturating_sub(1).max(1)) as u8;
      Rgb::new(v, v, v)
    })
    .collect()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn decode_words() {
    let palette = decode(&[0x00, 0x00, 0x1f, 0x00, 0xe0, 0x03, 0x00, 0x7c]).unwrap();
    assert_eq!(
      palette.colors,
      vec![
        Rgb::new(0, 0, 0),
        Rgb::new(255, 0, 0),
        Rgb::new(0, 255, 0),
        Rgb::new(0, 0, 255),
      ]
    );
    assert!(decode(&[]).unwrap().is_empty());
    assert!(matches!(
      decode(&[0x00, 0x00, 0x1f]),
      Err(Error::SizeMismatch {
        expected: Expect::MultipleOf(2),
        actual: 3
      })
    ));
  }

  #[test]
  fn every_word_survives() {
    for word in 0..0x8000u16 {
      assert_eq!(Rgb::from_rgb555(word).to_rgb555(), word);
    }
  }

  #[test]
  fn truncation() {
    let bytes = encode(&[Rgb::new(255, 100, 7)]);
    assert_eq!(decode(&bytes).unwrap().colors, vec![Rgb::new(255, 98, 0)]);
  }

  #[test]
  fn banks() {
    let palette = Palette {
      colors: (0..40).map(|i| Rgb::new(i, i, i)).collect(),
    };
    assert_eq!(palette.banks(16).count(), 3);
    assert_eq!(palette.bank(1, 16).unwrap()[0], Rgb::new(16, 16, 16));
    assert_eq!(palette.bank(2, 16).unwrap().len(), 8);
    assert!(palette.bank(3, 16).is_none());
  }

  #[test]
  fn ramps() {
    let ramp = grayscale(16);
    assert_eq!(ramp.len(), 16);
    assert_eq!(ramp[0], Rgb::new(0, 0, 0));
    assert_eq!(ramp[1], Rgb::new(17, 17, 17));
    assert_eq!(ramp[15], Rgb::new(255, 255, 255));
    assert_eq!(grayscale(1), vec![Rgb::new(0, 0, 0)]);
  }

  #[test]
  fn display() {
    assert_eq!(Rgb::new(255, 98, 0).to_string(), "#ff6200");
  }
}
