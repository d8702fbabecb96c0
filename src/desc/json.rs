//! JSON5 interchange.
//!
//! The same records as a descriptor, as a single JSON5 document, for tools
//! that would rather not parse descriptors:
//!
//! ```text
//! {
//!   segments: [
//!     { address: 192, length: 512, kind: "palette", color_format: "rgb555" },
//!   ],
//! }
//! ```
//!
//! Nested segments carry their `parent` path as an array of addresses.
//! Unlike descriptors, unknown keys are rejected; the `extra` object holds
//! whatever a descriptor carried that this version doesn't understand, and
//! is held to the same rules as in a descriptor.

use serde::Deserialize;
use serde::Serialize;

use crate::desc::insert;
use crate::desc::record::Record;
use crate::desc::records;
use crate::error::Error;
use crate::map::Registry;
use crate::rom::ByteSource;

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Document {
  segments: Vec<Record>,
}

/// Renders `registry` as a JSON5 document.
pub fn export(registry: &Registry) -> Result<String, Error> {
  let doc = Document {
    segments: records(registry),
  };
  json5::to_string(&doc).map_err(|e| Error::DescriptorInvalid {
    block: 0,
    line: 0,
    reason: e.to_string(),
  })
}

/// Builds a registry over `source` from a JSON5 document.
///
/// Errors in a particular record report its index as the block; the line is
/// always zero.
pub fn import(text: &str, source: &ByteSource) -> Result<Registry, Error> {
  let doc: Document =
    json5::from_str(text).map_err(|e| Error::DescriptorInvalid {
      block: 0,
      line: 0,
      reason: e.to_string(),
    })?;

  let mut registry = Registry::new(source.clone());
  for (i, record) in doc.segments.iter().enumerate() {
    insert(&mut registry, record).map_err(|reason| {
      Error::DescriptorInvalid {
        block: i,
        line: 0,
        reason,
      }
    })?;
  }
  log::info!("imported {} segments", registry.len());
  Ok(registry)
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::codec::lz77;
  use crate::codec::palette::PaletteParams;
  use crate::kind::ContentKind;
  use crate::map::Segment;

  fn rom() -> ByteSource {
    ByteSource::from_bytes(vec![0; 0x400])
  }

  #[test]
  fn round_trip() {
    let mut map = Registry::new(rom());
    let mut raw = Segment::new(0, 16, ContentKind::Raw).with_label("code");
    raw.extra.insert("reviewed".into(), "yes".into());
    map.add_segment(raw, false).unwrap();
    map
      .add_segment(
        Segment::new(0xc0, 32, ContentKind::Palette(PaletteParams::default())),
        false,
      )
      .unwrap();

    let text = export(&map).unwrap();
    assert_eq!(import(&text, &rom()).unwrap(), map);
  }

  #[test]
  fn nested() {
    let mut bytes = lz77::encode(&[7; 64]).unwrap();
    bytes.resize(0x100, 0);
    let rom = ByteSource::from_bytes(bytes);

    let mut map = Registry::new(rom.clone());
    map.add_compressed(0).unwrap();
    map
      .nested_mut(0)
      .unwrap()
      .add_segment(Segment::new(8, 16, ContentKind::Raw), false)
      .unwrap();

    let text = export(&map).unwrap();
    assert!(text.contains("parent"));
    let loaded = import(&text, &rom).unwrap();
    assert_eq!(loaded.nested(0).unwrap().len(), 1);
    assert_eq!(loaded, map);

    let text = r#"{ segments: [
      { parent: [0], address: 0, length: 4, kind: "raw" },
    ] }"#;
    assert!(matches!(
      import(text, &rom),
      Err(Error::DescriptorInvalid { block: 0, .. })
    ));
  }

  #[test]
  fn bad_extra() {
    let texts = [
      r#"{ segments: [
        { address: 0, length: 4, kind: "raw", extra: { note: "" } },
      ] }"#,
      r#"{ segments: [
        { address: 0, length: 4, kind: "raw", extra: { note: "x\nlength = 5" } },
      ] }"#,
      r#"{ segments: [
        { address: 0, length: 4, kind: "raw", extra: { label: "\"x\"" } },
      ] }"#,
    ];
    for text in &texts {
      match import(text, &rom()) {
        Err(Error::DescriptorInvalid { block: 0, reason, .. }) => {
          assert!(reason.contains("cannot be written back")
            || reason.contains("recognized"), "{}", reason)
        }
        other => panic!("expected DescriptorInvalid, got {:?}", other),
      }
    }
  }

  #[test]
  fn hand_written() {
    let text = r#"
      // Written by hand.
      {
        segments: [
          { address: 16, length: 32, kind: "palette", colors_per_bank: 16 },
          { address: 48, length: 4, kind: "padding", },
        ],
      }
    "#;
    let map = import(text, &rom()).unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(
      map.segments()[0].kind,
      ContentKind::Palette(PaletteParams {
        colors_per_bank: Some(16),
        ..PaletteParams::default()
      })
    );
  }

  #[test]
  fn rejects() {
    let bad = [
      (r#"{ segments: [ { address: 0, length: 4, kind: "raw", x: 1 } ] }"#, 0),
      (r#"{ segments: [ { address: 0, kind: "raw" } ] }"#, 0),
      (r#"{ segments: [ "#, 0),
      (
        r#"{ segments: [
          { address: 0, length: 8, kind: "raw" },
          { address: 4, length: 8, kind: "raw" },
        ] }"#,
        1,
      ),
      (
        r#"{ segments: [
          { address: 0, length: 8, kind: "raw" },
          { address: 8, length: 8, kind: "tileset", bits_per_pixel: 4 },
        ] }"#,
        1,
      ),
    ];
    for &(text, index) in &bad {
      match import(text, &rom()) {
        Err(Error::DescriptorInvalid { block, .. }) => {
          assert_eq!(block, index, "{}", text)
        }
        other => panic!("expected DescriptorInvalid, got {:?}", other),
      }
    }
  }
}
