//! ROMSECTION, a Game Boy Advance ROM segmentation and decoding engine.
//!
//! A ROM image is opened as a [`ByteSource`], and carved into typed
//! [`Segment`]s held by a [`Registry`]. Each segment's kind selects a codec
//! that turns its bytes into an [`Artifact`]: decompressed data, an image, a
//! palette, PCM audio, or the cartridge header. The segmentation itself is
//! persisted in a hand-editable [descriptor](desc/index.html), so that the
//! work of mapping out a ROM can be resumed and shared.
//!
//! [`ByteSource`]: rom/struct.ByteSource.html
//! [`Segment`]: map/segment/struct.Segment.html
//! [`Registry`]: map/struct.Registry.html
//! [`Artifact`]: codec/enum.Artifact.html

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod codec;
pub mod desc;
pub mod error;
pub mod int;
pub mod kind;
pub mod map;
pub mod rom;
