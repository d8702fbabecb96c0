//! Signed PCM audio.

use std::time::Duration;

use crate::error::Error;
use crate::error::Expect;

/// Parameters for PCM audio content.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub struct AudioParams {
  /// Frames per second.
  pub sample_rate: u32,
  /// Bits per sample: 8 or 16.
  pub bit_depth: u8,
  /// Samples per frame.
  pub channels: u8,
}

impl AudioParams {
  /// Returns the number of bytes in one frame, checking that the parameters
  /// make sense.
  pub fn frame_len(&self) -> Result<usize, Error> {
    if self.bit_depth != 8 && self.bit_depth != 16 {
      return Err(Error::UnsupportedBitDepth(self.bit_depth));
    }
    for &n in &[self.channels as u32, self.sample_rate] {
      if n == 0 {
        return Err(Error::SizeMismatch {
          expected: Expect::NonZero,
          actual: 0,
        });
      }
    }
    Ok(self.bit_depth as usize / 8 * self.channels as usize)
  }
}

/// Interleaved PCM samples.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Pcm {
  /// 8-bit signed samples.
  I8(Vec<i8>),
  /// 16-bit little-endian signed samples.
  I16(Vec<i16>),
}

/// Decoded PCM audio.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Samples {
  /// Frames per second.
  pub sample_rate: u32,
  /// Samples per frame.
  pub channels: u8,
  /// The samples, interleaved by channel.
  pub pcm: Pcm,
}

impl Samples {
  /// Returns the number of frames.
  pub fn frames(&self) -> usize {
    let samples = match &self.pcm {
      Pcm::I8(s) => s.len(),
      Pcm::I16(s) => s.len(),
    };
    samples / self.channels.max(1) as usize
  }

  /// Returns the playback time of the samples.
  pub fn duration(&self) -> Duration {
    match self.sample_rate {
      0 => Duration::default(),
      rate => {
        Duration::from_secs_f64(self.frames() as f64 / rate as f64)
      }
    }
  }

  /// Extracts one channel, widened to 16 bits.
  ///
  /// 8-bit samples are scaled up so that both depths share a range.
  pub fn channel(&self, channel: u8) -> Vec<i16> {
    let step = self.channels.max(1) as usize;
    let skip = channel as usize;
    match &self.pcm {
      Pcm::I8(s) => s
        .iter()
        .skip(skip)
        .step_by(step)
        .map(|&v| (v as i16) << 8)
        .collect(),
      Pcm::I16(s) => s.iter().skip(skip).step_by(step).copied().collect(),
    }
  }
}

/// Decodes PCM audio.
///
/// `bytes` must be a whole number of frames.
pub fn decode(bytes: &[u8], params: &AudioParams) -> Result<Samples, Error> {
  let frame_len = params.frame_len()?;
  if bytes.len() % frame_len != 0 {
    return Err(Error::SizeMismatch {
      expected: Expect::MultipleOf(frame_len),
      actual: bytes.len(),
    });
  }

  let pcm = match params.bit_depth {
    8 => Pcm::I8(bytes.iter().map(|&b| b as i8).collect()),
    _ => Pcm::I16(
      bytes
        .chunks_exact(2)
        .map(|w| i16::from_le_bytes([w[0], w[1]]))
        .collect(),
    ),
  };
  Ok(Samples {
    sample_rate: params.sample_rate,
    channels: params.channels,
    pcm,
  })
}

/// Encodes PCM samples back into bytes.
pub fn encode(samples: &Samples) -> Vec<u8> {
  match &samples.pcm {
    Pcm::I8(s) => s.iter().map(|&v| v as u8).collect(),
    Pcm::I16(s) => s.iter().flat_map(|v| v.to_le_bytes().to_vec()).collect(),
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn params(sample_rate: u32, bit_depth: u8, channels: u8) -> AudioParams {
    AudioParams {
      sample_rate,
      bit_depth,
      channels,
    }
  }

  #[test]
  fn eight_bit() {
    let samples = decode(&[0x00, 0x7f, 0x80, 0xff], &params(8000, 8, 1)).unwrap();
    assert_eq!(samples.pcm, Pcm::I8(vec![0, 127, -128, -1]));
    assert_eq!(samples.frames(), 4);
    assert_eq!(samples.duration(), Duration::from_micros(500));
    assert_eq!(samples.channel(0), vec![0, 127 << 8, -128 << 8, -256]);
    assert_eq!(encode(&samples), vec![0x00, 0x7f, 0x80, 0xff]);
  }

  #[test]
  fn sixteen_bit_stereo() {
    let bytes = [0x01, 0x00, 0xff, 0xff, 0x00, 0x80, 0xff, 0x7f];
    let samples = decode(&bytes, &params(13379, 16, 2)).unwrap();
    assert_eq!(samples.pcm, Pcm::I16(vec![1, -1, i16::MIN, i16::MAX]));
    assert_eq!(samples.frames(), 2);
    assert_eq!(samples.channel(0), vec![1, i16::MIN]);
    assert_eq!(samples.channel(1), vec![-1, i16::MAX]);
    assert_eq!(encode(&samples), bytes.to_vec());
  }

  #[test]
  fn bad_params() {
    assert!(matches!(
      decode(&[0; 4], &params(8000, 12, 1)),
      Err(Error::UnsupportedBitDepth(12))
    ));
    assert!(matches!(
      decode(&[0; 4], &params(8000, 8, 0)),
      Err(Error::SizeMismatch { .. })
    ));
    assert!(matches!(
      decode(&[0; 6], &params(8000, 16, 2)),
      Err(Error::SizeMismatch {
        expected: Expect::MultipleOf(4),
        actual: 6
      })
    ));
  }
}
