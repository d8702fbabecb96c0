//! Segments: typed, labeled address ranges.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

use crate::desc::check_extra;
use crate::error::Error;
use crate::error::Expect;
use crate::kind::ContentKind;

/// A typed address range within a byte source.
///
/// A segment is purely declarative: it says where some content lives and how
/// to decode it, but holds none of the bytes.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Segment {
  /// The first address covered.
  pub start: u32,
  /// The number of bytes covered.
  pub len: u32,
  /// How to interpret the bytes.
  pub kind: ContentKind,
  /// A human-readable name.
  pub label: Option<String>,
  /// Whether an image segment is deliberately shorter than its dimensions.
  pub truncated: bool,
  /// Descriptor keys this version doesn't understand, kept verbatim so they
  /// survive a load and save.
  pub extra: BTreeMap<String, String>,
}

impl Segment {
  /// Creates an unlabeled segment.
  pub fn new(start: u32, len: u32, kind: ContentKind) -> Self {
    Self {
      start,
      len,
      kind,
      label: None,
      truncated: false,
      extra: BTreeMap::new(),
    }
  }

  /// Sets the label of this segment.
  pub fn with_label(mut self, label: impl Into<String>) -> Self {
    self.label = Some(label.into());
    self
  }

  /// Returns the address one past the last byte covered.
  ///
  /// Saturates rather than overflowing; [`validate()`] rejects segments for
  /// which that would matter.
  ///
  /// [`validate()`]: #method.validate
  pub fn end(&self) -> u32 {
    self.start.saturating_add(self.len)
  }

  /// Returns the range of addresses covered.
  pub fn range(&self) -> Range<u32> {
    self.start..self.end()
  }

  /// Returns true if `address` is covered by this segment.
  pub fn contains(&self, address: u32) -> bool {
    self.start <= address && address < self.end()
  }

  /// Returns true if this segment shares any address with `range`.
  pub fn overlaps(&self, range: &Range<u32>) -> bool {
    self.start < range.end && range.start < self.end()
  }

  /// Checks that this segment fits within a source of `source_len` bytes,
  /// and that its kind is consistent with its length.
  ///
  /// Extra keys must also be writable to a descriptor: each must be a key
  /// with no meaning of its own, whose value text reads back unchanged.
  pub fn validate(&self, source_len: usize) -> Result<(), Error> {
    for (key, text) in &self.extra {
      check_extra(key, text).map_err(|reason| Error::InvalidExtra {
        address: self.start,
        key: key.clone(),
        reason,
      })?;
    }

    if self.len == 0 {
      return Err(Error::SizeMismatch {
        expected: Expect::NonZero,
        actual: 0,
      });
    }

    let end = self.start.checked_add(self.len).map(|end| end as usize);
    if end.map_or(true, |end| end > source_len) {
      return Err(Error::OutOfBounds {
        offset: self.start as usize,
        len: self.len as usize,
        source_len,
      });
    }

    match self.kind {
      ContentKind::Image(_) => {}
      _ if self.truncated => {
        return Err(Error::WrongKind {
          address: self.start,
          expected: "image",
          found: self.kind.tag(),
        })
      }
      ContentKind::Header(_) if self.start != 0 => {
        return Err(Error::Misplaced {
          address: self.start,
          kind: self.kind.tag(),
          expected: 0,
        })
      }
      _ => {}
    }

    self.kind.check_len(self.len as usize, self.truncated)
  }
}

impl fmt::Display for Segment {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(
      f,
      "0x{:08X}..0x{:08X} {}",
      self.start,
      self.end(),
      self.kind
    )?;
    if self.truncated {
      write!(f, " (truncated)")?;
    }
    if let Some(label) = &self.label {
      write!(f, " \"{}\"", label)?;
    }
    Ok(())
  }
}
