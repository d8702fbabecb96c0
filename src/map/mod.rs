//! Segmentation registries.
//!
//! A [`Registry`] is the ordered set of [`Segment`]s describing one byte
//! source: either a whole ROM, or the decompressed output of one of the ROM's
//! compressed segments. Segments in a registry never overlap; anything they
//! don't cover is implicitly unidentified.
//!
//! Compressed segments may own a nested registry over their decompressed
//! bytes, forming a tree. Decompressed buffers are cached per registry, keyed
//! on the segment that produced them, and are dropped whenever that segment
//! is removed or changed.
//!
//! [`Registry`]: struct.Registry.html
//! [`Segment`]: segment/struct.Segment.html

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fmt;
use std::ops::Range;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::sync::RwLockWriteGuard;

use rayon::prelude::*;

use crate::codec;
use crate::codec::image::Bitmap;
use crate::codec::palette;
use crate::codec::Artifact;
use crate::codec::Compression;
use crate::codec::Decompressed;
use crate::error::Action;
use crate::error::Cause;
use crate::error::Diagnostic;
use crate::error::Error;
use crate::error::Errors;
use crate::error::Expect;
use crate::kind::ContentKind;
use crate::rom::ByteSource;

pub mod scan;
pub mod segment;

pub use segment::Segment;

/// What occupies an address.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum Occupant<'a> {
  /// The segment covering the address.
  Segment(&'a Segment),
  /// No segment covers the address.
  Unidentified,
}

impl<'a> Occupant<'a> {
  /// Returns the segment, if there is one.
  pub fn segment(self) -> Option<&'a Segment> {
    match self {
      Self::Segment(s) => Some(s),
      Self::Unidentified => None,
    }
  }
}

/// A decompressed buffer, along with what it was decompressed from.
struct Cached {
  len: u32,
  algorithm: Compression,
  output: ByteSource,
  consumed: usize,
}

/// An ordered, non-overlapping collection of segments over one byte source.
pub struct Registry {
  source: ByteSource,
  segments: Vec<Segment>,
  children: BTreeMap<u32, Registry>,
  cache: RwLock<HashMap<u32, Cached>>,
}

impl Registry {
  /// Creates an empty registry over `source`.
  pub fn new(source: ByteSource) -> Self {
    Self {
      source,
      segments: Vec::new(),
      children: BTreeMap::new(),
      cache: RwLock::new(HashMap::new()),
    }
  }

  /// Returns the source this registry describes.
  pub fn source(&self) -> &ByteSource {
    &self.source
  }

  /// Returns every segment, in address order.
  pub fn segments(&self) -> &[Segment] {
    &self.segments
  }

  /// Returns the number of segments.
  pub fn len(&self) -> usize {
    self.segments.len()
  }

  /// Returns true if there are no segments.
  pub fn is_empty(&self) -> bool {
    self.segments.is_empty()
  }

  /// Returns the index of the segment covering `address`.
  fn index_of(&self, address: u32) -> Option<usize> {
    let i = self.segments.partition_point(|s| s.start <= address);
    match i.checked_sub(1) {
      Some(i) if self.segments[i].contains(address) => Some(i),
      _ => None,
    }
  }

  fn find(&self, address: u32) -> Result<&Segment, Error> {
    self
      .index_of(address)
      .map(|i| &self.segments[i])
      .ok_or(Error::NotFound(address))
  }

  /// Returns what occupies `address`.
  ///
  /// Segments are half-open, so when two segments are adjacent, their shared
  /// boundary belongs to the one that starts there.
  pub fn segment_at(&self, address: u32) -> Occupant<'_> {
    match self.index_of(address) {
      Some(i) => Occupant::Segment(&self.segments[i]),
      None => Occupant::Unidentified,
    }
  }

  /// Returns an iterator over every segment sharing an address with `range`,
  /// in address order.
  pub fn segments_overlapping(
    &self,
    range: Range<u32>,
  ) -> impl Iterator<Item = &Segment> + Clone + '_ {
    let first = match range.start < range.end {
      true => self.segments.partition_point(|s| s.end() <= range.start),
      false => self.segments.len(),
    };
    self.segments[first..]
      .iter()
      .take_while(move |s| s.start < range.end)
  }

  /// Adds a segment.
  ///
  /// If the segment overlaps existing ones, this fails with
  /// [`Error::OverlapConflict`], unless `replace` is set; in that case, the
  /// overlapped segments are removed and returned.
  ///
  /// [`Error::OverlapConflict`]: ../error/enum.Error.html#variant.OverlapConflict
  pub fn add_segment(
    &mut self,
    segment: Segment,
    replace: bool,
  ) -> Result<Vec<Segment>, Error> {
    segment.validate(self.source.len())?;

    let range = segment.range();
    let first = self.segments.partition_point(|s| s.end() <= range.start);
    let last = self.segments.partition_point(|s| s.start < range.end);
    if first < last && !replace {
      return Err(Error::OverlapConflict {
        new: range,
        existing: self.segments[first].range(),
      });
    }

    let superseded: Vec<_> = self.segments.drain(first..last).collect();
    for old in &superseded {
      log::debug!("superseding {}", old);
      self.invalidate(old.start);
    }
    log::debug!("adding {}", segment);
    self.segments.insert(first, segment);
    Ok(superseded)
  }

  /// Removes the segment covering `address`.
  pub fn remove_segment(&mut self, address: u32) -> Result<Segment, Error> {
    let i = self.index_of(address).ok_or(Error::NotFound(address))?;
    let segment = self.segments.remove(i);
    self.invalidate(segment.start);
    log::debug!("removed {}", segment);
    Ok(segment)
  }

  /// Changes the kind of the segment covering `address`, returning the old
  /// one.
  ///
  /// The segment keeps its range and label; the new kind must be consistent
  /// with that range.
  pub fn set_kind(
    &mut self,
    address: u32,
    kind: ContentKind,
  ) -> Result<ContentKind, Error> {
    let i = self.index_of(address).ok_or(Error::NotFound(address))?;
    let mut changed = self.segments[i].clone();
    changed.kind = kind;
    changed.truncated &= matches!(kind, ContentKind::Image(_));
    changed.validate(self.source.len())?;

    let old = std::mem::replace(&mut self.segments[i], changed);
    if old.kind != kind {
      self.invalidate(old.start);
    }
    Ok(old.kind)
  }

  /// Changes the label of the segment covering `address`.
  pub fn set_label(
    &mut self,
    address: u32,
    label: Option<String>,
  ) -> Result<(), Error> {
    let i = self.index_of(address).ok_or(Error::NotFound(address))?;
    self.segments[i].label = label;
    Ok(())
  }

  /// Drops all derived state for the segment starting at `start`.
  fn invalidate(&mut self, start: u32) {
    self
      .cache
      .get_mut()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&start);
    self.children.remove(&start);
  }

  /// Splits the segment covering `address` in two, so that `address` starts
  /// the second half.
  ///
  /// Only content-free segments (raw, padding, and unidentified) can be
  /// split. Splitting at the start of a segment does nothing.
  pub fn split_at(&mut self, address: u32) -> Result<(), Error> {
    let i = self.index_of(address).ok_or(Error::NotFound(address))?;
    let first = &mut self.segments[i];
    match first.kind {
      ContentKind::Raw | ContentKind::Padding | ContentKind::Unidentified => {}
      _ => {
        return Err(Error::WrongKind {
          address: first.start,
          expected: "raw, padding, or unidentified",
          found: first.kind.tag(),
        })
      }
    }
    if address == first.start {
      return Ok(());
    }

    let mut second = first.clone();
    second.start = address;
    second.len = first.end() - address;
    second.label = None;
    first.len = address - first.start;
    log::debug!("split at 0x{:08X}", address);
    self.segments.insert(i + 1, second);
    Ok(())
  }

  /// Returns every range no segment covers, in address order.
  pub fn gaps(&self) -> Vec<Range<u32>> {
    let source_end = self.source.len().min(u32::MAX as usize) as u32;
    let mut gaps = Vec::new();
    let mut cursor = 0;
    for segment in &self.segments {
      if cursor < segment.start {
        gaps.push(cursor..segment.start);
      }
      cursor = segment.end();
    }
    if cursor < source_end {
      gaps.push(cursor..source_end);
    }
    gaps
  }

  /// Covers every gap with an explicit unidentified segment, returning how
  /// many were added.
  pub fn fill_unidentified(&mut self) -> usize {
    let gaps = self.gaps();
    for gap in &gaps {
      let len = gap.end - gap.start;
      let filler = Segment::new(gap.start, len, ContentKind::Unidentified);
      self.segments.push(filler);
    }
    self.segments.sort_by_key(|s| s.start);
    log::info!("filled {} gaps", gaps.len());
    gaps.len()
  }

  /// Removes every unidentified segment, returning how many were removed.
  pub fn clear_unidentified(&mut self) -> usize {
    let before = self.segments.len();
    self
      .segments
      .retain(|s| !matches!(s.kind, ContentKind::Unidentified));
    before - self.segments.len()
  }

  /// Adds a compressed segment at `address`, whose length is discovered by
  /// decoding the stream found there.
  ///
  /// Returns the length of the new segment.
  pub fn add_compressed(&mut self, address: u32) -> Result<u32, Error> {
    let tail = self.source.read_from(address as usize)?;
    let algorithm = match tail.first() {
      Some(&tag) if tag == Compression::RunLength.tag() => {
        Compression::RunLength
      }
      _ => Compression::Lz77,
    };
    let out = algorithm.decode(tail)?;

    let len = out.consumed as u32;
    self.add_segment(
      Segment::new(address, len, ContentKind::Compressed(algorithm)),
      false,
    )?;
    self.cache_write().insert(
      address,
      Cached {
        len,
        algorithm,
        output: ByteSource::from_bytes(out.bytes),
        consumed: out.consumed,
      },
    );
    Ok(len)
  }

  fn cache_write(&self) -> RwLockWriteGuard<'_, HashMap<u32, Cached>> {
    self.cache.write().unwrap_or_else(PoisonError::into_inner)
  }

  /// Returns the decompressed output of a compressed segment, decoding it if
  /// it is not already cached.
  fn decompress(
    &self,
    segment: &Segment,
  ) -> Result<(ByteSource, usize), Error> {
    let algorithm = match segment.kind {
      ContentKind::Compressed(algorithm) => algorithm,
      _ => {
        return Err(Error::WrongKind {
          address: segment.start,
          expected: "compressed",
          found: segment.kind.tag(),
        })
      }
    };

    {
      let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
      match cache.get(&segment.start) {
        Some(c) if c.len == segment.len && c.algorithm == algorithm => {
          return Ok((c.output.clone(), c.consumed))
        }
        _ => {}
      }
    }

    log::debug!("decompressing {}", segment);
    let bytes = self.source.read(segment.start as usize, segment.len as usize)?;
    let out = algorithm.decode(bytes)?;
    let output = ByteSource::from_bytes(out.bytes);
    self.cache_write().insert(
      segment.start,
      Cached {
        len: segment.len,
        algorithm,
        output: output.clone(),
        consumed: out.consumed,
      },
    );
    Ok((output, out.consumed))
  }

  /// Creates a fresh registry over the decompressed output of the compressed
  /// segment covering `address`.
  pub fn derive_nested(&self, address: u32) -> Result<Registry, Error> {
    let segment = self.find(address)?;
    let (output, _) = self.decompress(segment)?;
    Ok(Registry::new(output))
  }

  /// Returns the nested registry of the compressed segment covering
  /// `address`, if one has been created.
  pub fn nested(&self, address: u32) -> Option<&Registry> {
    let segment = self.segment_at(address).segment()?;
    self.children.get(&segment.start)
  }

  /// Returns the nested registry of the compressed segment covering
  /// `address`, creating it if necessary.
  ///
  /// The nested registry lives as long as the segment does.
  pub fn nested_mut(&mut self, address: u32) -> Result<&mut Registry, Error> {
    let start = self.find(address)?.start;
    if !self.children.contains_key(&start) {
      let child = self.derive_nested(start)?;
      self.children.insert(start, child);
    }
    self.children.get_mut(&start).ok_or(Error::NotFound(address))
  }

  /// Decodes the segment covering `address`.
  ///
  /// A truncated image decodes as though its missing tail were zeros.
  pub fn decode(&self, address: u32) -> Result<Artifact, Error> {
    let segment = self.find(address)?;
    self.decode_segment(segment)
  }

  fn decode_segment(&self, segment: &Segment) -> Result<Artifact, Error> {
    if let ContentKind::Compressed(_) = segment.kind {
      let (output, consumed) = self.decompress(segment)?;
      return Ok(Artifact::Decompressed(Decompressed {
        bytes: output.as_bytes().to_vec(),
        consumed,
      }));
    }

    log::debug!("decoding {}", segment);
    let bytes = self.source.read(segment.start as usize, segment.len as usize)?;
    match segment.kind {
      ContentKind::Image(params) if segment.truncated => {
        let mut padded = bytes.to_vec();
        padded.resize(params.byte_len(), 0);
        codec::decode(&segment.kind, &padded)
      }
      _ => codec::decode(&segment.kind, bytes),
    }
  }

  /// Decodes the image covering `address` and maps it through its palette.
  ///
  /// The palette is the palette segment the image refers to, or just one
  /// bank of it if the image names a bank. Banks are the palette's
  /// `colors_per_bank` long, or `2^bpp` if it doesn't say. An image without
  /// a palette is rendered in grayscale.
  pub fn render_image(&self, address: u32) -> Result<Bitmap, Error> {
    let segment = self.find(address)?;
    let (params, pixels) = match (segment.kind, self.decode_segment(segment)?) {
      (ContentKind::Image(params), Artifact::Image(pixels)) => (params, pixels),
      _ => {
        return Err(Error::WrongKind {
          address: segment.start,
          expected: "image",
          found: segment.kind.tag(),
        })
      }
    };

    let shades = 1usize << params.depth.bits();
    let address = match params.palette {
      Some(address) => address,
      None => {
        let colors = palette::grayscale(shades);
        return codec::image::render(&pixels, &colors, 0);
      }
    };

    let source = self.find(address)?;
    let decoded = self.decode_segment(source)?;
    let (per_bank, palette) = match (source.kind, decoded) {
      (ContentKind::Palette(p), Artifact::Palette(palette)) => {
        let per_bank = p.colors_per_bank.map_or(shades, usize::from);
        (per_bank.max(1), palette)
      }
      _ => {
        return Err(Error::WrongKind {
          address,
          expected: "palette",
          found: source.kind.tag(),
        })
      }
    };

    let bank = match params.bank {
      Some(bank) => bank as usize,
      None => return codec::image::render(&pixels, &palette.colors, 0),
    };
    let colors = palette.bank(bank, per_bank).ok_or_else(|| {
      Error::SizeMismatch {
        expected: Expect::AtLeast((bank * per_bank + 1) * 2),
        actual: palette.len() * 2,
      }
    })?;
    log::debug!("rendering 0x{:08X} with palette bank {}", address, bank);
    codec::image::render(&pixels, colors, 0)
  }

  /// Decodes every segment in parallel, returning the results in address
  /// order.
  pub fn decode_all(&self) -> Vec<Result<Artifact, Failure>> {
    self
      .segments
      .par_iter()
      .map(|segment| {
        self.decode_segment(segment).map_err(|error| Failure {
          address: segment.start,
          label: segment.label.clone(),
          error,
        })
      })
      .collect()
  }

  /// Decodes every segment, collecting any failures.
  pub fn check(&self) -> Errors<Failure> {
    let mut errors = Errors::new();
    let results = self.decode_all();
    log::info!("decoded {} segments", results.len());
    for result in results {
      if let Err(failure) = result {
        errors.push(failure);
      }
    }
    errors
  }
}

impl Registry {
  fn populated(&self) -> impl Iterator<Item = (&u32, &Registry)> {
    self.children.iter().filter(|(_, child)| !child.is_empty())
  }
}

/// Registries are equal when they describe the same segments; a nested
/// registry with no segments counts the same as none at all.
impl PartialEq for Registry {
  fn eq(&self, other: &Self) -> bool {
    self.source.len() == other.source.len()
      && self.segments == other.segments
      && self.populated().eq(other.populated())
  }
}

impl fmt::Debug for Registry {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.debug_struct("Registry")
      .field("source", &self.source)
      .field("segments", &self.segments)
      .field("children", &self.children)
      .finish()
  }
}

/// A segment that failed to decode.
#[derive(Debug)]
pub struct Failure {
  /// The start of the segment.
  pub address: u32,
  /// The segment's label.
  pub label: Option<String>,
  /// Why decoding failed.
  pub error: Error,
}

impl fmt::Display for Failure {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.error)
  }
}

impl Diagnostic for Failure {
  fn cause(&self) -> Cause<'_> {
    Cause::Segment {
      address: self.address,
      label: self.label.as_deref(),
    }
  }

  fn action(&self) -> Option<Action> {
    match self.error {
      Error::OutOfBounds { .. } => Some(Action::Reading),
      _ => Some(Action::Decoding),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::codec::image::Depth;
  use crate::codec::image::ImageParams;
  use crate::codec::image::Layout;
  use crate::codec::lz77;
  use crate::codec::palette;
  use crate::codec::palette::PaletteParams;
  use crate::codec::palette::Rgb;

  fn registry(len: usize) -> Registry {
    Registry::new(ByteSource::from_bytes(vec![0; len]))
  }

  fn raw(start: u32, len: u32) -> Segment {
    Segment::new(start, len, ContentKind::Raw)
  }

  fn starts(registry: &Registry) -> Vec<u32> {
    registry.segments().iter().map(|s| s.start).collect()
  }

  #[test]
  fn overlap() {
    let mut map = registry(100);
    map.add_segment(raw(0, 10), false).unwrap();
    map.add_segment(raw(10, 10), false).unwrap();
    assert!(matches!(
      map.add_segment(raw(5, 10), false),
      Err(Error::OverlapConflict { new, existing })
        if new == (5..15) && existing == (0..10)
    ));
    assert_eq!(starts(&map), vec![0, 10]);

    let superseded = map.add_segment(raw(5, 10), true).unwrap();
    assert_eq!(superseded, vec![raw(0, 10), raw(10, 10)]);
    assert_eq!(starts(&map), vec![5]);

    assert!(matches!(
      map.add_segment(raw(95, 10), false),
      Err(Error::OutOfBounds { .. })
    ));
  }

  #[test]
  fn lookup() {
    let mut map = registry(100);
    map.add_segment(raw(10, 10), false).unwrap();
    map.add_segment(raw(20, 5).with_label("b"), false).unwrap();

    assert_eq!(map.segment_at(0), Occupant::Unidentified);
    assert_eq!(map.segment_at(10).segment().unwrap().start, 10);
    assert_eq!(map.segment_at(19).segment().unwrap().start, 10);
    assert_eq!(map.segment_at(20).segment().unwrap().start, 20);
    assert_eq!(map.segment_at(25), Occupant::Unidentified);

    let hits = |r: Range<u32>| -> Vec<u32> {
      map.segments_overlapping(r).map(|s| s.start).collect()
    };
    assert_eq!(hits(0..100), vec![10, 20]);
    assert_eq!(hits(19..21), vec![10, 20]);
    assert_eq!(hits(20..21), vec![20]);
    assert_eq!(hits(0..10), Vec::<u32>::new());
    assert_eq!(hits(15..15), Vec::<u32>::new());

    let iter = map.segments_overlapping(0..100);
    assert_eq!(iter.clone().count(), 2);
    assert_eq!(iter.count(), 2);
  }

  #[test]
  fn remove() {
    let mut map = registry(100);
    map.add_segment(raw(10, 10), false).unwrap();
    assert!(matches!(map.remove_segment(9), Err(Error::NotFound(9))));
    assert_eq!(map.remove_segment(15).unwrap(), raw(10, 10));
    assert!(map.is_empty());
  }

  #[test]
  fn gaps_and_filling() {
    let mut map = registry(100);
    map.add_segment(raw(10, 10), false).unwrap();
    map.add_segment(raw(50, 50), false).unwrap();
    assert_eq!(map.gaps(), vec![0..10, 20..50]);

    assert_eq!(map.fill_unidentified(), 2);
    assert!(map.gaps().is_empty());
    assert_eq!(starts(&map), vec![0, 10, 20, 50]);
    assert!(matches!(
      map.segment_at(30),
      Occupant::Segment(s) if s.kind == ContentKind::Unidentified
    ));

    map.split_at(30).unwrap();
    assert_eq!(starts(&map), vec![0, 10, 20, 30, 50]);
    assert_eq!(map.clear_unidentified(), 3);
    assert_eq!(starts(&map), vec![10, 50]);
  }

  #[test]
  fn split() {
    let mut map = registry(100);
    map.add_segment(raw(10, 10).with_label("a"), false).unwrap();
    map.split_at(10).unwrap();
    assert_eq!(map.len(), 1);
    map.split_at(14).unwrap();
    assert_eq!(map.segments()[0], raw(10, 4).with_label("a"));
    assert_eq!(map.segments()[1], raw(14, 6));
    assert!(matches!(map.split_at(40), Err(Error::NotFound(40))));

    let stream = ContentKind::Compressed(Compression::Lz77);
    map.add_segment(Segment::new(40, 8, stream), false).unwrap();
    assert!(matches!(map.split_at(44), Err(Error::WrongKind { .. })));
  }

  fn with_stream() -> (Registry, Vec<u8>) {
    let payload: Vec<u8> = (0..64).map(|i| (i / 4) as u8).collect();
    let mut rom = vec![0xffu8; 16];
    rom.extend(lz77::encode(&payload).unwrap());
    rom.extend_from_slice(&[0xff; 16]);
    (Registry::new(ByteSource::from_bytes(rom)), payload)
  }

  #[test]
  fn compressed() {
    let (mut map, payload) = with_stream();
    let len = map.add_compressed(16).unwrap();
    assert_eq!(map.segment_at(16 + len - 1).segment().unwrap().len, len);
    assert_eq!(map.segment_at(16 + len), Occupant::Unidentified);

    match map.decode(16).unwrap() {
      Artifact::Decompressed(out) => {
        assert_eq!(out.bytes, payload);
        assert_eq!(out.consumed, len as usize);
      }
      other => panic!("unexpected artifact: {:?}", other),
    }

    let nested = map.derive_nested(20).unwrap();
    assert_eq!(nested.source().as_bytes(), &payload[..]);
    assert!(matches!(map.derive_nested(0), Err(Error::NotFound(0))));
  }

  #[test]
  fn nested_lifetime() {
    let (mut map, _) = with_stream();
    let len = map.add_compressed(16).unwrap();
    assert!(map.nested(16).is_none());

    map
      .nested_mut(16)
      .unwrap()
      .add_segment(raw(0, 32).with_label("tiles"), false)
      .unwrap();
    assert_eq!(map.nested(16).unwrap().len(), 1);

    // Changing the producing segment drops everything derived from it.
    map.set_kind(16, ContentKind::Raw).unwrap();
    assert!(map.nested(16).is_none());
    assert!(matches!(map.nested_mut(16), Err(Error::WrongKind { .. })));

    map
      .set_kind(16, ContentKind::Compressed(Compression::Lz77))
      .unwrap();
    assert_eq!(map.nested_mut(16).unwrap().len(), 0);
    map.remove_segment(16 + len - 1).unwrap();
    assert!(map.nested(16).is_none());
  }

  #[test]
  fn malformed_stream_leaves_registry_alone() {
    let rom = b"\x10\x30\x00\x00\xb2\x70\x00\x01\x00\x00\x10\x06\x02\x02".to_vec();
    let mut map = Registry::new(ByteSource::from_bytes(rom));
    assert!(matches!(
      map.add_compressed(0),
      Err(Error::MalformedStream { .. })
    ));
    assert!(map.is_empty());

    let stream = ContentKind::Compressed(Compression::Lz77);
    map.add_segment(Segment::new(0, 14, stream), false).unwrap();
    assert!(map.decode(0).is_err());
    assert!(map.derive_nested(0).is_err());
    assert_eq!(map.len(), 1);
  }

  #[test]
  fn render() {
    let mut rom = vec![0x10, 0x32];
    rom.extend(palette::encode(&[
      Rgb::new(0, 0, 0),
      Rgb::new(255, 0, 0),
      Rgb::new(0, 255, 0),
      Rgb::new(0, 0, 255),
    ]));
    let mut map = Registry::new(ByteSource::from_bytes(rom));

    let mut params = ImageParams {
      depth: Depth::Bpp4,
      width: 4,
      height: 1,
      layout: Layout::Linear,
      palette: Some(2),
      bank: None,
    };
    map
      .add_segment(Segment::new(0, 2, ContentKind::Image(params)), false)
      .unwrap();
    map
      .add_segment(
        Segment::new(2, 8, ContentKind::Palette(PaletteParams::default())),
        false,
      )
      .unwrap();

    let bitmap = map.render_image(0).unwrap();
    assert_eq!(
      bitmap.colors,
      vec![
        Rgb::new(0, 0, 0),
        Rgb::new(255, 0, 0),
        Rgb::new(0, 255, 0),
        Rgb::new(0, 0, 255),
      ]
    );

    params.palette = None;
    map.set_kind(0, ContentKind::Image(params)).unwrap();
    let bitmap = map.render_image(0).unwrap();
    assert_eq!(bitmap.colors[1], Rgb::new(17, 17, 17));

    assert!(matches!(map.render_image(2), Err(Error::WrongKind { .. })));
  }

  #[test]
  fn render_with_bank() {
    let colors: Vec<Rgb> = (0..8).map(Rgb::from_rgb555).collect();
    let mut rom = vec![0x10, 0x32];
    rom.extend(palette::encode(&colors));
    let mut map = Registry::new(ByteSource::from_bytes(rom));

    let mut params = ImageParams {
      depth: Depth::Bpp4,
      width: 4,
      height: 1,
      layout: Layout::Linear,
      palette: Some(2),
      bank: Some(1),
    };
    let banked = PaletteParams {
      colors_per_bank: Some(4),
      ..PaletteParams::default()
    };
    map
      .add_segment(Segment::new(0, 2, ContentKind::Image(params)), false)
      .unwrap();
    map
      .add_segment(Segment::new(2, 16, ContentKind::Palette(banked)), false)
      .unwrap();

    let bitmap = map.render_image(0).unwrap();
    assert_eq!(bitmap.colors, &colors[4..]);

    params.bank = Some(2);
    map.set_kind(0, ContentKind::Image(params)).unwrap();
    assert!(matches!(
      map.render_image(0),
      Err(Error::SizeMismatch {
        expected: Expect::AtLeast(18),
        actual: 16,
      })
    ));

    // Without `colors_per_bank`, a 4bpp bank is 16 colors.
    map
      .set_kind(2, ContentKind::Palette(PaletteParams::default()))
      .unwrap();
    params.bank = Some(0);
    map.set_kind(0, ContentKind::Image(params)).unwrap();
    assert_eq!(map.render_image(0).unwrap().colors, &colors[..4]);
    params.bank = Some(1);
    map.set_kind(0, ContentKind::Image(params)).unwrap();
    assert!(map.render_image(0).is_err());
  }

  #[test]
  fn truncated_image_is_zero_filled() {
    let mut map = Registry::new(ByteSource::from_bytes(vec![0x11; 4]));
    let mut seg = Segment::new(
      0,
      4,
      ContentKind::Image(ImageParams {
        depth: Depth::Bpp4,
        width: 4,
        height: 4,
        layout: Layout::Linear,
        palette: None,
        bank: None,
      }),
    );
    seg.truncated = true;
    map.add_segment(seg, false).unwrap();

    match map.decode(0).unwrap() {
      Artifact::Image(pixels) => {
        assert_eq!(&pixels.indices[..8], &[1; 8]);
        assert_eq!(&pixels.indices[8..], &[0; 8]);
      }
      other => panic!("unexpected artifact: {:?}", other),
    }
  }

  #[test]
  fn check_collects_failures() {
    let (mut map, _) = with_stream();
    map.add_compressed(16).unwrap();
    let stream = ContentKind::Compressed(Compression::Lz77);
    let junk = Segment::new(0, 16, stream).with_label("junk");
    map.add_segment(junk, false).unwrap();

    let results = map.decode_all();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_err());
    assert!(results[1].is_ok());

    let errors = map.check();
    assert_eq!(errors.len(), 1);
    let mut out = Vec::new();
    errors.dump_to(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("segment 0x00000000 (junk)"), "{}", text);
  }
}
