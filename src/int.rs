//! Integer types and literals used by ROMSECTION.
//!
//! GBA BIOS compression headers and ARM branch instructions both carry 24-bit
//! quantities, and descriptor files accept integers in a few different
//! notations. This module provides types for handling both cleanly.

use std::fmt;

/// A 24-bit unsigned integer.
///
/// This is the width of the decompressed-size field of BIOS compression
/// headers, and of the offset field of an ARM `b` instruction.
#[allow(non_camel_case_types)]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
pub struct u24(u32);

impl u24 {
  /// The largest value a `u24` can hold.
  pub const MAX: u24 = u24(0xff_ffff);

  /// Creates a `u24` by truncating a `u32`.
  #[inline]
  pub const fn from_u32(i: u32) -> Self {
    u24(i & 0xff_ffff)
  }

  /// Zero-extends this `u24` into a `u32`.
  #[inline]
  pub const fn to_u32(self) -> u32 {
    self.0
  }

  /// Sign-extends this `u24` into an `i32`.
  #[inline]
  pub const fn to_i32(self) -> i32 {
    // NOTE: shifting the value up to the top of the word and then doing an
    // arithmetic shift back down replicates bit 23 into the top byte.
    ((self.0 << 8) as i32) >> 8
  }

  /// Reads a `u24` from three little-endian bytes.
  #[inline]
  pub fn from_le_bytes(bytes: [u8; 3]) -> Self {
    u24(bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16)
  }

  /// Converts this `u24`'s bytes into an array, in little-endian order.
  #[inline]
  pub fn to_le_bytes(self) -> [u8; 3] {
    let [a, b, c, _] = self.0.to_le_bytes();
    [a, b, c]
  }
}

macro_rules! impl_fmt_u24 {
  ($($trait:ident),*) => {
    $(impl fmt::$trait for u24 {
      fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::$trait::fmt(&self.to_u32(), f)
      }
    })*
  }
}
impl_fmt_u24!(Display, Binary, Octal, LowerHex, UpperHex);

/// The notation of an integer literal.
///
/// Integers may be written as decimal, binary, or hexadecimal:
/// - Decimal: `0`, `123`, etc.
/// - Binary: `%10` (assembler-style), `0b1111` (C-style).
/// - Hexadecimal: `$dead` (assembler-style), `0x1ee7` (C-style);
///   case-insensitive.
///
/// Underscores may be interspersed throughout a literal, except as the first
/// digit, to separate groups of digits: `1_000`, `0x0800_0000`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum DigitStyle {
  /// Decimal digits, with no prefix.
  Dec,
  /// Binary digits, with a `%` or `0b` prefix.
  Bin,
  /// Hexadecimal digits, with a `$` or `0x` prefix.
  Hex,
}

impl DigitStyle {
  /// Returns the radix for this style.
  pub fn radix(self) -> u32 {
    match self {
      Self::Dec => 10,
      Self::Bin => 2,
      Self::Hex => 16,
    }
  }
}

/// Parses an integer literal in any of the notations described by
/// [`DigitStyle`].
///
/// Surrounding whitespace is ignored. Returns `None` for anything that is not
/// a well-formed literal, including values that overflow a `u64`.
///
/// ```
/// # use romsection::int::parse_int;
/// assert_eq!(parse_int("192"), Some(192));
/// assert_eq!(parse_int("0xC0"), Some(192));
/// assert_eq!(parse_int("$c0"), Some(192));
/// assert_eq!(parse_int("0b1100_0000"), Some(192));
/// assert_eq!(parse_int("0x0800_0000"), Some(0x0800_0000));
/// assert_eq!(parse_int("_1"), None);
/// assert_eq!(parse_int("0x"), None);
/// assert_eq!(parse_int("12ab"), None);
/// ```
///
/// [`DigitStyle`]: enum.DigitStyle.html
pub fn parse_int(text: &str) -> Option<u64> {
  let text = text.trim();
  let hex = strip_prefix(text, &["0x", "0X", "$"]);
  let (style, digits) = if let Some(rest) = hex {
    (DigitStyle::Hex, rest)
  } else if let Some(rest) = strip_prefix(text, &["0b", "0B", "%"]) {
    (DigitStyle::Bin, rest)
  } else {
    (DigitStyle::Dec, text)
  };

  if digits.is_empty() || digits.starts_with('_') {
    return None;
  }
  let digits = digits.chars().filter(|&c| c != '_').collect::<String>();
  if !digits.chars().all(|c| c.is_digit(style.radix())) {
    return None;
  }
  u64::from_str_radix(&digits, style.radix()).ok()
}

fn strip_prefix<'a>(text: &'a str, prefixes: &[&str]) -> Option<&'a str> {
  prefixes
    .iter()
    .find(|p| text.starts_with(*p))
    .map(|p| &text[p.len()..])
}
