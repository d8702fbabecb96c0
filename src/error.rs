//! Errors, and error printing facilities.
//!
//! Every fallible engine operation returns the crate-wide [`Error`] type.
//! Batch operations, like checking every segment of a ROM, collect failures
//! into [`Errors`]; the [`Diagnostic`] trait describes how such a failure can
//! be converted into a simple, user-facing report.
//!
//! [`Error`]: enum.Error.html
//! [`Errors`]: struct.Errors.html
//! [`Diagnostic`]: trait.Diagnostic.html

use std::error;
use std::fmt;
use std::io;
use std::ops::Range;
use std::path::Path;

/// An error produced by the engine.
#[derive(Debug)]
pub enum Error {
  /// Indicates an address or range outside of a byte source.
  OutOfBounds {
    /// The first requested byte.
    offset: usize,
    /// The number of requested bytes.
    len: usize,
    /// The length of the source that was read from.
    source_len: usize,
  },
  /// Indicates structural corruption of a compressed stream.
  MalformedStream {
    /// The offset within the stream at which decoding went wrong.
    offset: usize,
    /// What went wrong.
    reason: &'static str,
  },
  /// Indicates a recognized, but unimplemented, format variant, such as an
  /// unsupported compression type tag.
  UnsupportedVariant {
    /// The format whose variant was rejected.
    format: &'static str,
    /// The variant's tag value.
    tag: u32,
  },
  /// Indicates an audio bit depth other than 8 or 16.
  UnsupportedBitDepth(u8),
  /// Indicates that declared dimensions don't fit a byte range.
  SizeMismatch {
    /// The size that was expected.
    expected: Expect,
    /// The size that was found.
    actual: usize,
  },
  /// Indicates an attempt to insert a segment over an existing one.
  OverlapConflict {
    /// The range of the segment being inserted.
    new: Range<u32>,
    /// The range of the segment already present.
    existing: Range<u32>,
  },
  /// Indicates a segment of a kind that may only appear at one address.
  Misplaced {
    /// The start of the segment.
    address: u32,
    /// The segment's kind.
    kind: &'static str,
    /// The only address it may start at.
    expected: u32,
  },
  /// Indicates that no segment covers an address.
  NotFound(u32),
  /// Indicates that an operation does not apply to the kind of the segment
  /// it was requested on.
  WrongKind {
    /// The start of the segment.
    address: u32,
    /// What the operation needed.
    expected: &'static str,
    /// What the segment actually is.
    found: &'static str,
  },
  /// Indicates an unrecognized descriptor key or value that could not be
  /// saved and loaded back unchanged.
  InvalidExtra {
    /// The start of the segment carrying it.
    address: u32,
    /// The key.
    key: String,
    /// What is wrong with it.
    reason: String,
  },
  /// Indicates that a descriptor failed to parse or validate.
  DescriptorInvalid {
    /// The zero-based index of the offending block.
    block: usize,
    /// The one-based line of the offending text, if known.
    line: usize,
    /// A description of the problem.
    reason: String,
  },
  /// Indicates a failure to read or write a file.
  Io(io::Error),
}

/// A size constraint, as reported by [`Error::SizeMismatch`].
///
/// [`Error::SizeMismatch`]: enum.Error.html#variant.SizeMismatch
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Expect {
  /// Exactly this many bytes.
  Exactly(usize),
  /// At least this many bytes.
  AtLeast(usize),
  /// At most this many bytes.
  AtMost(usize),
  /// A multiple of this many bytes (or pixels).
  MultipleOf(usize),
  /// Not zero.
  NonZero,
}

impl fmt::Display for Expect {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::Exactly(n) => write!(f, "exactly {}", n),
      Self::AtLeast(n) => write!(f, "at least {}", n),
      Self::AtMost(n) => write!(f, "at most {}", n),
      Self::MultipleOf(n) => write!(f, "a multiple of {}", n),
      Self::NonZero => write!(f, "non-zero"),
    }
  }
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match self {
      Self::OutOfBounds {
        offset,
        len,
        source_len,
      } => write!(
        f,
        "range 0x{:08X}+{} is outside of a {}-byte source",
        offset, len, source_len
      ),
      Self::MalformedStream { offset, reason } => {
        write!(f, "malformed stream at byte {}: {}", offset, reason)
      }
      Self::UnsupportedVariant { format, tag } => {
        write!(f, "unsupported {} variant 0x{:02X}", format, tag)
      }
      Self::UnsupportedBitDepth(depth) => {
        write!(f, "unsupported bit depth: {}", depth)
      }
      Self::SizeMismatch { expected, actual } => {
        write!(f, "size mismatch: expected {}, found {}", expected, actual)
      }
      Self::OverlapConflict { new, existing } => write!(
        f,
        "0x{:08X}..0x{:08X} overlaps 0x{:08X}..0x{:08X}",
        new.start, new.end, existing.start, existing.end
      ),
      Self::Misplaced {
        address,
        kind,
        expected,
      } => write!(
        f,
        "{} must start at 0x{:08X}, not 0x{:08X}",
        kind, expected, address
      ),
      Self::NotFound(addr) => write!(f, "no segment at 0x{:08X}", addr),
      Self::WrongKind {
        address,
        expected,
        found,
      } => write!(
        f,
        "segment at 0x{:08X} is {}, not {}",
        address, found, expected
      ),
      Self::InvalidExtra {
        address, reason, ..
      } => write!(f, "segment at 0x{:08X}: {}", address, reason),
      Self::DescriptorInvalid {
        block,
        line,
        reason,
      } => write!(f, "block #{} (line {}): {}", block, line, reason),
      Self::Io(e) => write!(f, "{}", e),
    }
  }
}

impl error::Error for Error {
  fn source(&self) -> Option<&(dyn error::Error + 'static)> {
    match self {
      Self::Io(e) => Some(e),
      _ => None,
    }
  }
}

impl From<io::Error> for Error {
  fn from(e: io::Error) -> Self {
    Error::Io(e)
  }
}

/// An error which can be described as a diagnostic.
///
/// Types that implement `Diagnostic` must also implement
/// [`std::fmt::Display`]. For the user-displayed error to look right, this
/// implementation should only be one line long.
///
/// [`std::fmt::Display`]: https://doc.rust-lang.org/std/fmt/trait.Display.html
pub trait Diagnostic: fmt::Debug + fmt::Display {
  /// Returns a `Cause` describing the input that resulted in the error.
  fn cause(&self) -> Cause<'_>;
  /// Returns an action this error is associated with, if any at all.
  fn action(&self) -> Option<Action>;
}

/// A collection of errors that may build up over the course of an action.
///
/// The type parameter `E` should be a type implementing [`Diagnostic`].
///
/// [`Diagnostic`]: trait.Diagnostic.html
#[derive(Debug)]
pub struct Errors<E>(Vec<E>);

impl<E> Errors<E> {
  /// Creates an empty `Errors`.
  pub fn new() -> Self {
    Errors(Vec::new())
  }

  /// Returns true if this `Errors` hasn't had any errors added yet.
  pub fn is_ok(&self) -> bool {
    self.0.is_empty()
  }

  /// Returns the number of errors collected so far.
  pub fn len(&self) -> usize {
    self.0.len()
  }

  /// Adds a new error to this `Errors`.
  pub fn push(&mut self, error: E) {
    self.0.push(error);
  }
}

impl<E> Default for Errors<E> {
  fn default() -> Self {
    Self::new()
  }
}

impl<E: Diagnostic> Errors<E> {
  /// Dumps this collection of errors as user-displayable text into `sink`.
  ///
  /// Returns `Ok(true)` if anything was written.
  pub fn dump_to(&self, mut sink: impl io::Write) -> io::Result<bool> {
    if self.0.is_empty() {
      return Ok(false);
    }

    for (i, error) in self.0.iter().enumerate() {
      writeln!(sink, "error: {}", error)?;
      let action = error.action().map(Action::describe);
      match (error.cause(), action) {
        (Cause::Segment { address, label }, action) => {
          write!(sink, "  {} ", action.unwrap_or("at"))?;
          write!(sink, "segment 0x{:08X}", address)?;
          match label {
            Some(label) => writeln!(sink, " ({})", label)?,
            None => writeln!(sink, "")?,
          }
        }
        (Cause::Block(block), action) => {
          writeln!(sink, "  {} block #{}", action.unwrap_or("at"), block)?;
        }
        (Cause::File(path), action) => {
          writeln!(sink, "  {} {}", action.unwrap_or("at"), path.display())?;
        }
      }

      if i != self.0.len() - 1 {
        writeln!(sink, "")?;
      }
    }

    Ok(true)
  }

  /// Calls `dump_to()` on `stderr`, exiting the process with the given
  /// `exit_code` if any errors are present.
  pub fn dump_and_die(self, code: i32) {
    // Writing to stderr is fairly unlikely to fail, so panicking is a fine
    // response here.
    if self.dump_to(io::stderr()).unwrap() {
      eprintln!("");
      eprintln!("error: there were {} errors", self.0.len());
      std::process::exit(code)
    }
  }
}

/// The place where an error occured, to varying degrees of specificity.
pub enum Cause<'a> {
  /// A segment of a registry.
  Segment {
    /// The start of the segment.
    address: u32,
    /// The segment's label, if it has one.
    label: Option<&'a str>,
  },
  /// A block within a descriptor.
  Block(usize),
  /// A file, for when we don't know much about where the error came from
  /// within.
  File(&'a Path),
}

/// An action that ROMSECTION performs, which an error may be associated with.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Action {
  /// Reading bytes out of a source.
  Reading,
  /// Decoding bytes into an artifact.
  Decoding,
  /// Loading a descriptor.
  Loading,
  /// Saving a descriptor.
  Saving,
}

impl Action {
  fn describe(self) -> &'static str {
    match self {
      Self::Reading => "while reading",
      Self::Decoding => "while decoding",
      Self::Loading => "while loading",
      Self::Saving => "while saving",
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[derive(Debug)]
  struct Failure(u32);

  impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
      write!(f, "failure {}", self.0)
    }
  }

  impl Diagnostic for Failure {
    fn cause(&self) -> Cause<'_> {
      Cause::Segment {
        address: self.0,
        label: Some("title"),
      }
    }

    fn action(&self) -> Option<Action> {
      Some(Action::Decoding)
    }
  }

  #[test]
  fn dump() {
    let mut errors = Errors::new();
    let mut out = Vec::new();
    assert!(!errors.dump_to(&mut out).unwrap());

    errors.push(Failure(0xc0));
    errors.push(Failure(0x200));
    assert!(errors.dump_to(&mut out).unwrap());
    let text = String::from_utf8(out).unwrap();
    assert_eq!(
      text,
      "error: failure 192\n  while decoding segment 0x000000C0 (title)\n\n\
       error: failure 512\n  while decoding segment 0x00000200 (title)\n"
    );
  }

  #[test]
  fn display() {
    let e = Error::SizeMismatch {
      expected: Expect::MultipleOf(2),
      actual: 3,
    };
    assert_eq!(e.to_string(), "size mismatch: expected a multiple of 2, found 3");
    assert_eq!(Error::NotFound(0x10).to_string(), "no segment at 0x00000010");
  }
}
