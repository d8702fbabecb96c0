//! Descriptor files.
//!
//! A descriptor is the persisted form of a [`Registry`]: a plain-text list of
//! `[segment]` blocks, one per segment, giving each segment's range, kind,
//! decode parameters, and label. Descriptors never contain ROM bytes, and are
//! meant to be edited by hand and kept under version control:
//!
//! ```text
//! # Title screen.
//! [segment]
//! address = 0x000000C0
//! length = 512
//! kind = "palette"
//! color_format = "rgb555"
//! label = "title palette"
//! ```
//!
//! Segments of a compressed segment's nested registry follow it, with a
//! `parent` key giving the path of compressed segments they live in: a single
//! address, or a quoted list like `"0x00000800/0x00000020"` when nested more
//! than one level deep. Their addresses are offsets into the decompressed
//! bytes.
//!
//! Keys this version does not recognize are carried through a load and save
//! untouched.
//!
//! [`Registry`]: ../map/struct.Registry.html

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use crate::error::Action;
use crate::error::Cause;
use crate::error::Diagnostic;
use crate::error::Error;
use crate::map::Registry;
use crate::rom::ByteSource;

pub mod json;
mod parse;
mod record;

pub use parse::quote;
pub(crate) use record::check_extra;
use record::Record;

/// Flattens `registry` and its nested registries into records, depth first.
fn records(registry: &Registry) -> Vec<Record> {
  fn walk(registry: &Registry, path: &mut Vec<u32>, out: &mut Vec<Record>) {
    for segment in registry.segments() {
      let mut record = Record::from_segment(segment);
      if !path.is_empty() {
        record.parent = Some(path.clone());
      }
      out.push(record);

      if let Some(nested) = registry.nested(segment.start) {
        path.push(segment.start);
        walk(nested, path, out);
        path.pop();
      }
    }
  }

  let mut out = Vec::new();
  walk(registry, &mut Vec::new(), &mut out);
  out
}

/// Adds the segment `record` describes to `registry`, or to the nested
/// registry its `parent` names.
///
/// Nested registries are created as needed, which decompresses their
/// parents.
fn insert(registry: &mut Registry, record: &Record) -> Result<(), String> {
  let segment = record.to_segment()?;
  let mut target = registry;
  for &address in record.parent.iter().flatten() {
    target = target.nested_mut(address).map_err(|e| {
      format!("bad parent 0x{:08X}: {}", address, e)
    })?;
  }
  target.add_segment(segment, false).map(|_| ()).map_err(|e| e.to_string())
}

/// Renders `registry` as descriptor text.
///
/// Segments are written in address order, each followed by the segments
/// nested in it, and keys in a fixed order, so saving a registry loaded from
/// a saved descriptor reproduces it exactly.
pub fn save(registry: &Registry) -> String {
  let mut out = String::new();
  for (i, record) in records(registry).iter().enumerate() {
    if i != 0 {
      out.push('\n');
    }
    out.push_str("[segment]\n");
    for (key, value) in record.fields() {
      out.push_str(key);
      out.push_str(" = ");
      out.push_str(&value);
      out.push('\n');
    }
  }
  out
}

/// Builds a registry over `source` from descriptor text.
///
/// Every segment is checked against the length of the source it lives in,
/// and against the segments before it; the first problem found fails the
/// whole load. Only compressed segments with nested segments are read.
pub fn load(text: &str, source: &ByteSource) -> Result<Registry, Error> {
  let blocks = parse::parse(text)?;
  let mut registry = Registry::new(source.clone());
  for (i, block) in blocks.iter().enumerate() {
    let invalid = |line, reason| Error::DescriptorInvalid {
      block: i,
      line,
      reason,
    };
    let record = Record::from_block(block)
      .map_err(|(line, reason)| invalid(line, reason))?;
    insert(&mut registry, &record)
      .map_err(|reason| invalid(block.line, reason))?;
  }
  Ok(registry)
}

/// Loads the descriptor at `path`.
pub fn load_file(
  path: impl AsRef<Path>,
  source: &ByteSource,
) -> Result<Registry, Error> {
  let path = path.as_ref();
  let text = fs::read_to_string(path)?;
  let registry = load(&text, source)?;
  log::info!(
    "loaded {} top-level segments from {}",
    registry.len(),
    path.display()
  );
  Ok(registry)
}

/// Saves `registry` to `path`.
///
/// The descriptor is written to a temporary file next to `path`, which then
/// replaces it, so an interrupted save never leaves a partial file behind.
pub fn save_file(
  registry: &Registry,
  path: impl AsRef<Path>,
) -> Result<(), Error> {
  let path = path.as_ref();
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);

  let mut file = fs::File::create(&tmp)?;
  file.write_all(save(registry).as_bytes())?;
  file.sync_all()?;
  drop(file);
  fs::rename(&tmp, path)?;

  log::info!("saved {} segments to {}", registry.len(), path.display());
  Ok(())
}

/// Returns the descriptor path used for a ROM when none is given: the ROM's
/// path with `.map` appended.
///
/// ```
/// # use std::path::Path;
/// # use romsection::desc::default_path;
/// assert_eq!(default_path("game.gba"), Path::new("game.gba.map"));
/// ```
pub fn default_path(rom: impl AsRef<Path>) -> PathBuf {
  let mut path = rom.as_ref().as_os_str().to_owned();
  path.push(".map");
  PathBuf::from(path)
}

/// A failure to load or save a descriptor file.
#[derive(Debug)]
pub struct Failure {
  /// The descriptor's path.
  pub path: PathBuf,
  /// Whether the file was being loaded or saved.
  pub action: Action,
  /// What went wrong.
  pub error: Error,
}

impl Failure {
  /// Wraps an error from loading the file at `path`.
  pub fn loading(path: impl Into<PathBuf>, error: Error) -> Self {
    Self {
      path: path.into(),
      action: Action::Loading,
      error,
    }
  }

  /// Wraps an error from saving the file at `path`.
  pub fn saving(path: impl Into<PathBuf>, error: Error) -> Self {
    Self {
      path: path.into(),
      action: Action::Saving,
      error,
    }
  }
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    match &self.error {
      Error::DescriptorInvalid { line, reason, .. } if *line > 0 => {
        write!(f, "{}:{}: {}", self.path.display(), line, reason)
      }
      e => write!(f, "{}: {}", self.path.display(), e),
    }
  }
}

impl Diagnostic for Failure {
  fn cause(&self) -> Cause<'_> {
    match self.error {
      Error::DescriptorInvalid { block, .. } => Cause::Block(block),
      _ => Cause::File(&self.path),
    }
  }

  fn action(&self) -> Option<Action> {
    Some(self.action)
  }
}
