//! The flat, serializable form of a segment.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use crate::codec::audio::AudioParams;
use crate::codec::image::Depth;
use crate::codec::image::ImageParams;
use crate::codec::image::Layout;
use crate::codec::palette::ColorFormat;
use crate::codec::palette::PaletteParams;
use crate::codec::Compression;
use crate::desc::parse::parse;
use crate::desc::parse::quote;
use crate::desc::parse::Block;
use crate::desc::parse::Value;
use crate::int::parse_int;
use crate::kind::ContentKind;
use crate::kind::HeaderLayout;
use crate::kind::TileSetParams;
use crate::map::Segment;

/// One segment, as written in a descriptor.
///
/// Kind parameters are all optional here; which ones must be present, and
/// which must be absent, depends on `kind`.
#[derive(Clone, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
  /// The starts of the compressed segments this one is nested in, outermost
  /// first. Absent for segments of the ROM itself.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub parent: Option<Vec<u32>>,
  pub address: u32,
  pub length: u32,
  pub kind: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub algorithm: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bits_per_pixel: Option<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub width: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub height: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tile_layout: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub palette: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub palette_bank: Option<u16>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub color_format: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub colors_per_bank: Option<u16>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sample_rate: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bit_depth: Option<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub channels: Option<u8>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub tile_size: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub layout: Option<String>,

  #[serde(default, skip_serializing_if = "is_false")]
  pub truncated: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub label: Option<String>,
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub extra: BTreeMap<String, String>,
}

fn is_false(b: &bool) -> bool {
  !*b
}

const TILE_SIZE: &str = "8x8";
const GBA_LAYOUT: &str = "gba";

/// Every key with a meaning of its own, in the order they are written.
const KEYS: [&str; 20] = [
  "parent",
  "address",
  "length",
  "kind",
  "algorithm",
  "bits_per_pixel",
  "width",
  "height",
  "tile_layout",
  "palette",
  "palette_bank",
  "color_format",
  "colors_per_bank",
  "sample_rate",
  "bit_depth",
  "channels",
  "tile_size",
  "layout",
  "truncated",
  "label",
];

/// Which parameter keys each kind accepts.
fn params_for(kind: &str) -> Option<&'static [&'static str]> {
  let params: &[&str] = match kind {
    "raw" | "padding" | "unidentified" => &[],
    "compressed" => &["algorithm"],
    "image" => &[
      "bits_per_pixel",
      "width",
      "height",
      "tile_layout",
      "palette",
      "palette_bank",
    ],
    "palette" => &["color_format", "colors_per_bank"],
    "audio" => &["sample_rate", "bit_depth", "channels"],
    "tileset" => &["bits_per_pixel", "tile_size"],
    "header" => &["layout"],
    _ => return None,
  };
  Some(params)
}

fn required<T: Copy>(value: Option<T>, key: &str) -> Result<T, String> {
  value.ok_or_else(|| format!("missing `{}`", key))
}

fn depth(bits: Option<u8>) -> Result<Depth, String> {
  let bits = required(bits, "bits_per_pixel")?;
  Depth::from_bits(bits)
    .ok_or_else(|| format!("`bits_per_pixel` must be 4 or 8, not {}", bits))
}

fn named<T>(
  value: &Option<String>,
  key: &str,
  default: Option<&str>,
  from_name: impl Fn(&str) -> Option<T>,
) -> Result<T, String> {
  let name = match (value, default) {
    (Some(name), _) => name.as_str(),
    (None, Some(default)) => default,
    (None, None) => return Err(format!("missing `{}`", key)),
  };
  from_name(name).ok_or_else(|| format!("unknown {} `{}`", key, name))
}

/// Parses a `parent` path like `0x00000800/0x00000020`.
fn parent_path(text: &str) -> Option<Vec<u32>> {
  text
    .split('/')
    .map(|a| parse_int(a).filter(|&n| n <= u32::MAX as u64))
    .map(|n| n.map(|n| n as u32))
    .collect()
}

/// Checks that an unrecognized key and its raw value text would be written
/// and read back as the same single entry.
pub fn check_extra(key: &str, text: &str) -> Result<(), String> {
  if KEYS.contains(&key) {
    return Err(format!("`{}` is not an unrecognized key", key));
  }

  let src = format!("[segment]\n{} = {}\n", key, text);
  let survives = match parse(&src) {
    Ok(blocks) => match &blocks[..] {
      [block] => match &block.entries[..] {
        [entry] => entry.key == key && entry.text == text,
        _ => false,
      },
      _ => false,
    },
    Err(_) => false,
  };
  match survives {
    true => Ok(()),
    false => Err(format!("`{}` = {} cannot be written back", key, quote(text))),
  }
}

impl Record {
  /// Flattens a segment.
  pub fn from_segment(segment: &Segment) -> Self {
    let mut record = Record {
      address: segment.start,
      length: segment.len,
      kind: segment.kind.tag().to_string(),
      truncated: segment.truncated,
      label: segment.label.clone(),
      extra: segment.extra.clone(),
      ..Record::default()
    };

    match segment.kind {
      ContentKind::Compressed(algorithm) => {
        record.algorithm = Some(algorithm.name().into());
      }
      ContentKind::Image(p) => {
        record.bits_per_pixel = Some(p.depth.bits());
        record.width = Some(p.width);
        record.height = Some(p.height);
        record.tile_layout = Some(p.layout.name().into());
        record.palette = p.palette;
        record.palette_bank = p.bank;
      }
      ContentKind::Palette(p) => {
        record.color_format = Some(p.format.name().into());
        record.colors_per_bank = p.colors_per_bank;
      }
      ContentKind::Audio(p) => {
        record.sample_rate = Some(p.sample_rate);
        record.bit_depth = Some(p.bit_depth);
        record.channels = Some(p.channels);
      }
      ContentKind::TileSet(p) => {
        record.bits_per_pixel = Some(p.depth.bits());
        record.tile_size = Some(TILE_SIZE.into());
      }
      ContentKind::Header(HeaderLayout::Gba) => {
        record.layout = Some(GBA_LAYOUT.into());
      }
      ContentKind::Raw | ContentKind::Padding | ContentKind::Unidentified => {}
    }
    record
  }

  /// Returns the name and presence of every kind parameter, in the order
  /// they are written.
  fn params(&self) -> [(&'static str, bool); 14] {
    [
      ("algorithm", self.algorithm.is_some()),
      ("bits_per_pixel", self.bits_per_pixel.is_some()),
      ("width", self.width.is_some()),
      ("height", self.height.is_some()),
      ("tile_layout", self.tile_layout.is_some()),
      ("palette", self.palette.is_some()),
      ("palette_bank", self.palette_bank.is_some()),
      ("color_format", self.color_format.is_some()),
      ("colors_per_bank", self.colors_per_bank.is_some()),
      ("sample_rate", self.sample_rate.is_some()),
      ("bit_depth", self.bit_depth.is_some()),
      ("channels", self.channels.is_some()),
      ("tile_size", self.tile_size.is_some()),
      ("layout", self.layout.is_some()),
    ]
  }

  /// Rebuilds a segment, checking that the parameters make sense for the
  /// kind.
  ///
  /// This does not check the segment against any source; see
  /// [`Segment::validate()`].
  ///
  /// [`Segment::validate()`]: ../../map/segment/struct.Segment.html#method.validate
  pub fn to_segment(&self) -> Result<Segment, String> {
    let allowed = params_for(&self.kind)
      .ok_or_else(|| format!("unknown kind `{}`", self.kind))?;
    for &(key, present) in self.params().iter() {
      if present && !allowed.contains(&key) {
        return Err(format!("`{}` does not apply to {}", key, self.kind));
      }
    }
    if self.palette_bank.is_some() && self.palette.is_none() {
      return Err("`palette_bank` needs a `palette`".into());
    }

    let kind = match self.kind.as_str() {
      "raw" => ContentKind::Raw,
      "padding" => ContentKind::Padding,
      "unidentified" => ContentKind::Unidentified,
      "compressed" => ContentKind::Compressed(named(
        &self.algorithm,
        "algorithm",
        None,
        Compression::from_name,
      )?),
      "image" => ContentKind::Image(ImageParams {
        depth: depth(self.bits_per_pixel)?,
        width: required(self.width, "width")?,
        height: required(self.height, "height")?,
        layout: named(
          &self.tile_layout,
          "tile_layout",
          None,
          Layout::from_name,
        )?,
        palette: self.palette,
        bank: self.palette_bank,
      }),
      "palette" => ContentKind::Palette(PaletteParams {
        format: named(
          &self.color_format,
          "color_format",
          Some(ColorFormat::Rgb555.name()),
          ColorFormat::from_name,
        )?,
        colors_per_bank: self.colors_per_bank,
      }),
      "audio" => ContentKind::Audio(AudioParams {
        sample_rate: required(self.sample_rate, "sample_rate")?,
        bit_depth: required(self.bit_depth, "bit_depth")?,
        channels: required(self.channels, "channels")?,
      }),
      "tileset" => {
        named(&self.tile_size, "tile_size", Some(TILE_SIZE), |s| {
          Some(()).filter(|_| s == TILE_SIZE)
        })?;
        ContentKind::TileSet(TileSetParams {
          depth: depth(self.bits_per_pixel)?,
        })
      }
      _ => {
        let layout = named(&self.layout, "layout", Some(GBA_LAYOUT), |s| {
          Some(HeaderLayout::Gba).filter(|_| s == GBA_LAYOUT)
        })?;
        ContentKind::Header(layout)
      }
    };

    Ok(Segment {
      start: self.address,
      len: self.length,
      kind,
      label: self.label.clone(),
      truncated: self.truncated,
      extra: self.extra.clone(),
    })
  }

  /// Builds a record out of a parsed block.
  pub fn from_block(block: &Block<'_>) -> Result<Self, (usize, String)> {
    let mut record = Record::default();
    let mut seen = HashSet::new();
    for entry in &block.entries {
      if !seen.insert(entry.key) {
        return Err((entry.line, format!("duplicate key `{}`", entry.key)));
      }
      record.set(entry.key, &entry.value, entry.text).map_err(|reason| {
        (entry.line, reason)
      })?;
    }

    for &key in &["address", "length", "kind"] {
      if !seen.contains(key) {
        return Err((block.line, format!("missing `{}`", key)));
      }
    }
    Ok(record)
  }

  fn set(
    &mut self,
    key: &str,
    value: &Value,
    text: &str,
  ) -> Result<(), String> {
    let mismatch = |expected: &str| {
      format!(
        "`{}` must be {}, not {}",
        key,
        expected,
        value.describe()
      )
    };
    let int = || match value {
      Value::Int(n) => Ok(*n),
      _ => Err(mismatch("an integer")),
    };
    let string = || match value {
      Value::Str(s) => Ok(s.clone()),
      _ => Err(mismatch("a string")),
    };
    let narrow = |n: u64, max: u64| match n <= max {
      true => Ok(n),
      false => Err(format!("`{}` is out of range: {}", key, n)),
    };

    match key {
      "parent" => {
        let path = match value {
          Value::Int(n) => vec![narrow(*n, u32::MAX as u64)? as u32],
          Value::Str(s) => parent_path(s).ok_or_else(|| {
            format!("`parent` must be addresses joined by `/`, not {}", text)
          })?,
          _ => return Err(mismatch("an address or a quoted path")),
        };
        self.parent = Some(path);
      }
      "address" => self.address = narrow(int()?, u32::MAX as u64)? as u32,
      "length" => self.length = narrow(int()?, u32::MAX as u64)? as u32,
      "kind" => self.kind = string()?,
      "algorithm" => self.algorithm = Some(string()?),
      "bits_per_pixel" => {
        self.bits_per_pixel = Some(narrow(int()?, u8::MAX as u64)? as u8)
      }
      "width" => self.width = Some(narrow(int()?, u32::MAX as u64)? as u32),
      "height" => self.height = Some(narrow(int()?, u32::MAX as u64)? as u32),
      "tile_layout" => self.tile_layout = Some(string()?),
      "palette" => self.palette = Some(narrow(int()?, u32::MAX as u64)? as u32),
      "palette_bank" => {
        self.palette_bank = Some(narrow(int()?, u16::MAX as u64)? as u16)
      }
      "color_format" => self.color_format = Some(string()?),
      "colors_per_bank" => {
        self.colors_per_bank = Some(narrow(int()?, u16::MAX as u64)? as u16)
      }
      "sample_rate" => {
        self.sample_rate = Some(narrow(int()?, u32::MAX as u64)? as u32)
      }
      "bit_depth" => {
        self.bit_depth = Some(narrow(int()?, u8::MAX as u64)? as u8)
      }
      "channels" => self.channels = Some(narrow(int()?, u8::MAX as u64)? as u8),
      "tile_size" => self.tile_size = Some(string()?),
      "layout" => self.layout = Some(string()?),
      "truncated" => match value {
        Value::Bool(b) => self.truncated = *b,
        _ => return Err(mismatch("a boolean")),
      },
      "label" => self.label = Some(string()?),
      _ => {
        self.extra.insert(key.to_string(), text.to_string());
      }
    }
    Ok(())
  }

  /// Returns every key and value, rendered as descriptor text, in the order
  /// they are written.
  pub fn fields(&self) -> Vec<(&str, String)> {
    let mut fields = Vec::new();
    match self.parent.as_deref() {
      None | Some([]) => {}
      Some([address]) => fields.push(("parent", format!("0x{:08X}", address))),
      Some(path) => {
        let path: Vec<String> =
          path.iter().map(|a| format!("0x{:08X}", a)).collect();
        fields.push(("parent", quote(&path.join("/"))));
      }
    }
    fields.push(("address", format!("0x{:08X}", self.address)));
    fields.push(("length", self.length.to_string()));
    fields.push(("kind", quote(&self.kind)));

    let strings = [
      ("algorithm", &self.algorithm),
      ("tile_layout", &self.tile_layout),
      ("color_format", &self.color_format),
      ("tile_size", &self.tile_size),
      ("layout", &self.layout),
    ];
    let ints = [
      ("bits_per_pixel", self.bits_per_pixel.map(u64::from)),
      ("width", self.width.map(u64::from)),
      ("height", self.height.map(u64::from)),
      ("palette_bank", self.palette_bank.map(u64::from)),
      ("colors_per_bank", self.colors_per_bank.map(u64::from)),
      ("sample_rate", self.sample_rate.map(u64::from)),
      ("bit_depth", self.bit_depth.map(u64::from)),
      ("channels", self.channels.map(u64::from)),
    ];
    for &(key, present) in self.params().iter() {
      if !present {
        continue;
      }
      let text = if key == "palette" {
        self.palette.map(|a| format!("0x{:08X}", a))
      } else if let Some((_, s)) = strings.iter().find(|(k, _)| *k == key) {
        s.as_deref().map(quote)
      } else {
        ints
          .iter()
          .find(|(k, _)| *k == key)
          .and_then(|(_, n)| n.map(|n| n.to_string()))
      };
      if let Some(text) = text {
        fields.push((key, text));
      }
    }

    if self.truncated {
      fields.push(("truncated", "true".into()));
    }
    if let Some(label) = &self.label {
      fields.push(("label", quote(label)));
    }
    for (key, text) in &self.extra {
      fields.push((key.as_str(), text.clone()));
    }
    fields
  }
}
