//! The GBA cartridge header.
//!
//! Every cartridge begins with a 192-byte header: an ARM branch to the entry
//! point, the compressed Nintendo logo, the game's title and codes, and a
//! checksum over the bytes in between. Multiboot images extend the header to
//! 228 bytes with additional entry points.
//!
//! Decoding never rejects a header over a bad checksum or fixed byte, since
//! hacked and homebrew ROMs routinely carry them; those problems are reported
//! as [`Warning`]s instead.
//!
//! [`Warning`]: enum.Warning.html

use std::fmt;

use crate::error::Error;
use crate::error::Expect;
use crate::int::u24;

/// The length of a standard header.
pub const HEADER_LEN: usize = 0xc0;
/// The length of a header with multiboot fields.
pub const EXTENDED_LEN: usize = 0xe4;
/// The value the byte at `0xb2` must hold.
pub const FIXED_VALUE: u8 = 0x96;
/// The address cartridge ROM is mapped at.
pub const ROM_BASE: u32 = 0x0800_0000;

const LOGO: std::ops::Range<usize> = 0x04..0xa0;
const TITLE: std::ops::Range<usize> = 0xa0..0xac;
const GAME_CODE: std::ops::Range<usize> = 0xac..0xb0;
const MAKER_CODE: std::ops::Range<usize> = 0xb0..0xb2;
const CHECKED: std::ops::Range<usize> = 0xa0..0xbd;

/// A decoded cartridge header.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CartridgeHeader {
  /// The first instruction, normally a branch to the entry point.
  pub entry_point: u32,
  /// The compressed Nintendo logo bitmap.
  pub logo: Vec<u8>,
  /// The game title, with trailing NULs removed.
  pub title: String,
  /// The four-character game code.
  pub game_code: String,
  /// The two-character maker code.
  pub maker_code: String,
  /// The byte at `0xb2`.
  pub fixed_value: u8,
  /// The main unit code.
  pub unit_code: u8,
  /// The device type.
  pub device_type: u8,
  /// The software version.
  pub version: u8,
  /// The stored complement checksum.
  pub checksum: u8,
  /// Multiboot fields, for 228-byte headers.
  pub multiboot: Option<Multiboot>,
  /// Problems noticed while decoding.
  pub warnings: Vec<Warning>,
}

impl CartridgeHeader {
  /// Returns the address execution begins at, assuming the cartridge is
  /// mapped at `base`.
  ///
  /// Returns `None` if the first instruction is not an unconditional branch.
  pub fn entry_target(&self, base: u32) -> Option<u32> {
    branch_target(self.entry_point, base)
  }
}

/// Extra entry points present in multiboot headers.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Multiboot {
  /// Entry point used when booting from RAM.
  pub ram_entry_point: u32,
  /// Written by the BIOS at boot.
  pub boot_mode: u8,
  /// Written by the BIOS at boot.
  pub slave_id: u8,
  /// Entry point used when booting over the link cable.
  pub joybus_entry_point: u32,
}

/// A non-fatal problem with a header.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Warning {
  /// The stored checksum does not match the header's contents.
  ChecksumMismatch {
    /// The checksum in the header.
    stored: u8,
    /// The checksum of the header's contents.
    computed: u8,
  },
  /// The byte at `0xb2` is not `0x96`.
  FixedValue(u8),
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::ChecksumMismatch { stored, computed } => write!(
        f,
        "header checksum is 0x{:02x}, but should be 0x{:02x}",
        stored, computed
      ),
      Self::FixedValue(v) => {
        write!(f, "fixed byte is 0x{:02x}, not 0x{:02x}", v, FIXED_VALUE)
      }
    }
  }
}

/// Computes the complement checksum of a header.
///
/// `header` must be at least `0xbd` bytes long; shorter input is treated as
/// zero-padded.
pub fn checksum(header: &[u8]) -> u8 {
  let sum = CHECKED
    .filter_map(|i| header.get(i))
    .fold(0u8, |acc, &b| acc.wrapping_add(b));
  0u8.wrapping_sub(sum).wrapping_sub(0x19)
}

/// Rewrites the checksum byte of `header` to match its contents.
pub fn fix_checksum(header: &mut [u8]) -> Result<(), Error> {
  if header.len() < HEADER_LEN {
    return Err(Error::SizeMismatch {
      expected: Expect::AtLeast(HEADER_LEN),
      actual: header.len(),
    });
  }
  header[CHECKED.end] = checksum(header);
  Ok(())
}

/// Computes the target of an ARM `b` instruction located at `base`.
///
/// Returns `None` unless `word` is an unconditional, non-linking branch.
///
/// ```
/// # use romsection::codec::header::branch_target;
/// assert_eq!(branch_target(0xea00_002e, 0x0800_0000), Some(0x0800_00c0));
/// assert_eq!(branch_target(0xeaff_fffe, 0x0800_0000), Some(0x0800_0000));
/// assert_eq!(branch_target(0xeb00_002e, 0x0800_0000), None);
/// ```
pub fn branch_target(word: u32, base: u32) -> Option<u32> {
  if word >> 24 != 0xea {
    return None;
  }
  let offset = u24::from_u32(word).to_i32().wrapping_mul(4);
  Some(base.wrapping_add(8).wrapping_add(offset as u32))
}

fn text(bytes: &[u8]) -> String {
  let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
  String::from_utf8_lossy(&bytes[..end]).into_owned()
}

fn word(bytes: &[u8], at: usize) -> u32 {
  u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// Decodes a cartridge header.
///
/// `bytes` must hold at least a standard header. If it holds an extended one,
/// the multiboot fields are decoded too; anything further is ignored.
pub fn decode(bytes: &[u8]) -> Result<CartridgeHeader, Error> {
  if bytes.len() < HEADER_LEN {
    return Err(Error::SizeMismatch {
      expected: Expect::AtLeast(HEADER_LEN),
      actual: bytes.len(),
    });
  }

  let multiboot = match bytes.len() >= EXTENDED_LEN {
    true => Some(Multiboot {
      ram_entry_point: word(bytes, 0xc0),
      boot_mode: bytes[0xc4],
      slave_id: bytes[0xc5],
      joybus_entry_point: word(bytes, 0xe0),
    }),
    false => None,
  };

  let mut header = CartridgeHeader {
    entry_point: word(bytes, 0x00),
    logo: bytes[LOGO].to_vec(),
    title: text(&bytes[TITLE]),
    game_code: text(&bytes[GAME_CODE]),
    maker_code: text(&bytes[MAKER_CODE]),
    fixed_value: bytes[0xb2],
    unit_code: bytes[0xb3],
    device_type: bytes[0xb4],
    version: bytes[0xbc],
    checksum: bytes[0xbd],
    multiboot,
    warnings: Vec::new(),
  };

  if header.fixed_value != FIXED_VALUE {
    header.warnings.push(Warning::FixedValue(header.fixed_value));
  }
  let computed = checksum(bytes);
  if computed != header.checksum {
    header.warnings.push(Warning::ChecksumMismatch {
      stored: header.checksum,
      computed,
    });
  }
  for warning in &header.warnings {
    log::warn!("{}: {}", header.title, warning);
  }

  Ok(header)
}
