//! ROMSECTION, a Game Boy Advance ROM segmentation and decoding tool.

use std::convert::TryFrom;
use std::fs;
use std::io;
use std::io::Write;
use std::ops::Range;
use std::path::Path;
use std::path::PathBuf;
use std::process;

use lazy_static::lazy_static;
use regex::Regex;
use structopt::StructOpt;

use romsection::codec::audio::Pcm;
use romsection::codec::audio::Samples;
use romsection::codec::header;
use romsection::codec::image::Bitmap;
use romsection::codec::palette;
use romsection::codec::Artifact;
use romsection::desc;
use romsection::error::Diagnostic;
use romsection::error::Error;
use romsection::error::Errors;
use romsection::int::parse_int;
use romsection::kind::ContentKind;
use romsection::map::scan;
use romsection::map::Occupant;
use romsection::map::Registry;
use romsection::rom::ByteSource;

#[derive(StructOpt)]
#[structopt(
  name = "romsection",
  about = "Maps out and decodes the contents of GBA ROM images."
)]
struct Opts {
  /// The ROM image to work on.
  #[structopt(parse(from_os_str))]
  rom: PathBuf,

  /// The descriptor to read and update; defaults to the ROM's path with
  /// `.map` appended.
  #[structopt(short, long, parse(from_os_str))]
  map: Option<PathBuf>,

  /// Logs more; may be repeated. `RUST_LOG` takes precedence.
  #[structopt(short, long, parse(from_occurrences))]
  verbose: u8,

  #[structopt(subcommand)]
  cmd: Command,
}

#[derive(StructOpt)]
enum Command {
  /// Prints the cartridge header, including the multiboot extension if the
  /// map's header segment covers it.
  Header,
  /// Lists the segments in the descriptor.
  List {
    /// Lists the gaps between segments instead.
    #[structopt(long)]
    gaps: bool,
  },
  /// Hexdumps a range of the ROM, like `0x100..0x200` or `0x100+64`.
  Dump {
    #[structopt(parse(try_from_str = parse_span))]
    range: Range<u32>,
  },
  /// Adds a segment, with kind parameters given as `key=value`.
  Add {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
    #[structopt(parse(try_from_str = parse_address))]
    length: u32,
    kind: String,
    params: Vec<String>,
    /// A label for the new segment.
    #[structopt(short, long)]
    label: Option<String>,
    /// Replaces any segments the new one overlaps.
    #[structopt(long)]
    replace: bool,
  },
  /// Marks the LZ77 stream at an address as a compressed segment.
  Compressed {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
  },
  /// Removes the segment covering an address.
  Remove {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
  },
  /// Splits the segment covering an address in two.
  Split {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
  },
  /// Sets or clears the label of the segment covering an address.
  Label {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
    label: Option<String>,
  },
  /// Decodes a segment and writes the result to a file.
  ///
  /// Images are written as PPM, tile sets as PGM, audio as WAV, palettes and
  /// headers as text, and everything else as raw bytes.
  Extract {
    #[structopt(parse(try_from_str = parse_address))]
    address: u32,
    /// Where to write the result.
    #[structopt(short, long, parse(from_os_str))]
    out: PathBuf,
    /// Writes the segment's bytes without decoding them.
    #[structopt(long)]
    raw: bool,
  },
  /// Searches for LZ77 streams.
  Scan {
    /// The range to search; defaults to the whole ROM.
    #[structopt(long, parse(try_from_str = parse_span))]
    range: Option<Range<u32>>,
    /// The smallest decompressed size to report.
    #[structopt(long, default_value = "16")]
    min_len: usize,
    /// The largest decompressed size to report.
    #[structopt(long, default_value = "480000")]
    max_len: usize,
    /// Resumes after the end of each stream found.
    #[structopt(long)]
    skip_found: bool,
    /// Adds every stream found to the descriptor.
    #[structopt(long)]
    save: bool,
  },
  /// Covers every gap with an unidentified segment.
  Fill {
    /// Removes unidentified segments instead.
    #[structopt(long)]
    clear: bool,
  },
  /// Decodes every segment, reporting any that fail.
  Check,
  /// Writes the descriptor as JSON5.
  Export {
    #[structopt(short, long, parse(from_os_str))]
    out: PathBuf,
  },
  /// Replaces the descriptor with one read from JSON5.
  Import {
    #[structopt(parse(from_os_str))]
    input: PathBuf,
  },
}

fn parse_address(s: &str) -> Result<u32, String> {
  parse_int(s)
    .filter(|&n| n <= u32::MAX as u64)
    .map(|n| n as u32)
    .ok_or_else(|| format!("not an address: `{}`", s))
}

fn parse_span(s: &str) -> Result<Range<u32>, String> {
  lazy_static! {
    static ref SPAN: Regex =
      Regex::new(r"^\s*([^.+\s]+)\s*(\.\.|\+)\s*([^.+\s]+)\s*$").unwrap();
  }

  let caps = SPAN
    .captures(s)
    .ok_or_else(|| format!("expected `start..end` or `start+len`: `{}`", s))?;
  let start = parse_address(&caps[1])?;
  let end = match &caps[2] {
    "+" => start
      .checked_add(parse_address(&caps[3])?)
      .ok_or_else(|| format!("range overflows: `{}`", s))?,
    _ => parse_address(&caps[3])?,
  };
  if end < start {
    return Err(format!("range ends before it starts: `{}`", s));
  }
  Ok(start..end)
}

/// The loaded state a command works on.
struct Session {
  rom: ByteSource,
  map_path: PathBuf,
  map: Registry,
}

impl Session {
  fn open(opts: &Opts) -> Self {
    let rom = ByteSource::open(&opts.rom).unwrap_or_else(|e| {
      eprintln!("error: could not open {}: {}", opts.rom.display(), e);
      process::exit(1)
    });
    log::info!("opened {} ({} bytes)", opts.rom.display(), rom.len());

    let map_path = opts
      .map
      .clone()
      .unwrap_or_else(|| desc::default_path(&opts.rom));
    let map = if map_path.exists() {
      desc::load_file(&map_path, &rom)
        .unwrap_or_else(|e| die(desc::Failure::loading(&map_path, e)))
    } else {
      log::info!("no descriptor at {}; starting fresh", map_path.display());
      Registry::new(rom.clone())
    };

    Self { rom, map_path, map }
  }

  fn save(&self) {
    if let Err(e) = desc::save_file(&self.map, &self.map_path) {
      die(desc::Failure::saving(&self.map_path, e));
    }
  }
}

/// Reports a single diagnostic and exits.
fn die(failure: impl Diagnostic) -> ! {
  let mut errors = Errors::new();
  errors.push(failure);
  errors.dump_and_die(1);
  process::exit(1)
}

/// Reports an engine error and exits.
fn fail(e: Error) -> ! {
  eprintln!("error: {}", e);
  process::exit(1)
}

fn main() {
  let opts = Opts::from_args();

  let level = match opts.verbose {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };
  let env = env_logger::Env::default().default_filter_or(level);
  env_logger::Builder::from_env(env)
    .format_timestamp(None)
    .init();

  let mut session = Session::open(&opts);
  if let Err(e) = run(&opts.cmd, &mut session) {
    fail(e)
  }
}

fn run(cmd: &Command, s: &mut Session) -> Result<(), Error> {
  match cmd {
    Command::Header => print_header(&read_header(&s.map)?, io::stdout())?,
    Command::List { gaps } => {
      let stdout = io::stdout();
      let mut out = stdout.lock();
      if *gaps {
        for gap in s.map.gaps() {
          writeln!(
            out,
            "0x{:08X}..0x{:08X} ({} bytes)",
            gap.start,
            gap.end,
            gap.end - gap.start
          )?;
        }
      } else {
        for segment in s.map.segments() {
          writeln!(out, "{}", segment)?;
        }
      }
    }
    Command::Dump { range } => {
      s.rom
        .dump(range.start as usize..range.end as usize, io::stdout())?;
    }
    Command::Add {
      address,
      length,
      kind,
      params,
      label,
      replace,
    } => {
      let mut text = format!(
        "[segment]\naddress = {}\nlength = {}\nkind = {}\n",
        address,
        length,
        desc::quote(kind)
      );
      for param in params {
        match param.find('=') {
          Some(i) => {
            let (key, value) = (&param[..i], &param[i + 1..]);
            text.push_str(&format!("{} = {}\n", key.trim(), quoted(value)));
          }
          None => {
            return Err(Error::DescriptorInvalid {
              block: 0,
              line: 0,
              reason: format!("expected `key=value`, got `{}`", param),
            })
          }
        }
      }
      if let Some(label) = label {
        text.push_str(&format!("label = {}\n", desc::quote(label)));
      }

      let parsed = desc::load(&text, &s.rom)?;
      for segment in parsed.segments() {
        for old in s.map.add_segment(segment.clone(), *replace)? {
          println!("replaced {}", old);
        }
        println!("added {}", segment);
      }
      s.save();
    }
    Command::Compressed { address } => {
      let len = s.map.add_compressed(*address)?;
      println!("added {} byte stream at 0x{:08X}", len, address);
      s.save();
    }
    Command::Remove { address } => {
      println!("removed {}", s.map.remove_segment(*address)?);
      s.save();
    }
    Command::Split { address } => {
      s.map.split_at(*address)?;
      s.save();
    }
    Command::Label { address, label } => {
      s.map.set_label(*address, label.clone())?;
      s.save();
    }
    Command::Extract { address, out, raw } => {
      extract(&s.map, *address, out, *raw)?;
    }
    Command::Scan {
      range,
      min_len,
      max_len,
      skip_found,
      save,
    } => {
      let opts = scan::Options {
        min_len: *min_len,
        max_len: *max_len,
        skip_found: *skip_found,
      };
      let range = range.clone().unwrap_or(0..s.rom.len() as u32);
      let found = s.map.scan(range, &opts)?;
      for f in &found {
        println!(
          "0x{:08X}: {} bytes -> {} bytes",
          f.address, f.len, f.decompressed_len
        );
      }
      if *save {
        let mut added = 0;
        for f in &found {
          // Streams found without skipping may overlap one another.
          match s.map.add_segment(f.to_segment(), false) {
            Ok(_) => added += 1,
            Err(e) => log::warn!("0x{:08X}: {}", f.address, e),
          }
        }
        println!("added {} of {} streams", added, found.len());
        s.save();
      }
    }
    Command::Fill { clear } => {
      if *clear {
        let n = s.map.clear_unidentified();
        println!("removed {} unidentified segments", n);
      } else {
        let n = s.map.fill_unidentified();
        println!("added {} unidentified segments", n);
      }
      s.save();
    }
    Command::Check => {
      let errors = s.map.check();
      let len = s.map.len();
      errors.dump_and_die(2);
      println!("all {} segments decoded", len);
    }
    Command::Export { out } => {
      fs::write(out, desc::json::export(&s.map)?)?;
    }
    Command::Import { input } => {
      let text = fs::read_to_string(input)?;
      s.map = desc::json::import(&text, &s.rom)?;
      s.save();
    }
  }
  Ok(())
}

/// Quotes `value` for a descriptor unless it is already quoted or is a
/// number or boolean.
fn quoted(value: &str) -> String {
  let value = value.trim();
  let bare = value.starts_with('"')
    || value == "true"
    || value == "false"
    || parse_int(value).is_some();
  match bare {
    true => value.to_string(),
    false => desc::quote(value),
  }
}

/// Decodes the header segment at 0 if there is one, or else the first
/// `HEADER_LEN` bytes.
fn read_header(map: &Registry) -> Result<header::CartridgeHeader, Error> {
  if let Some(segment) = map.segment_at(0).segment() {
    if let ContentKind::Header(_) = segment.kind {
      if let Artifact::Header(h) = map.decode(0)? {
        return Ok(h);
      }
    }
  }
  let rom = map.source();
  header::decode(rom.read(0, header::HEADER_LEN.min(rom.len()))?)
}

fn print_header(
  h: &header::CartridgeHeader,
  mut w: impl Write,
) -> io::Result<()> {
  writeln!(w, "title:       {}", h.title)?;
  writeln!(w, "game code:   {}", h.game_code)?;
  writeln!(w, "maker code:  {}", h.maker_code)?;
  writeln!(w, "unit code:   0x{:02x}", h.unit_code)?;
  writeln!(w, "device type: 0x{:02x}", h.device_type)?;
  writeln!(w, "version:     {}", h.version)?;
  writeln!(w, "checksum:    0x{:02x}", h.checksum)?;
  match h.entry_target(header::ROM_BASE) {
    Some(target) => writeln!(w, "entry point: 0x{:08X}", target)?,
    None => {
      writeln!(w, "entry point: 0x{:08X} (not a branch)", h.entry_point)?
    }
  }
  if let Some(mb) = &h.multiboot {
    writeln!(w, "ram entry:   0x{:08X}", mb.ram_entry_point)?;
    writeln!(w, "joybus:      0x{:08X}", mb.joybus_entry_point)?;
  }
  Ok(())
}

fn extract(
  map: &Registry,
  address: u32,
  out: &Path,
  raw: bool,
) -> Result<(), Error> {
  let segment = match map.segment_at(address) {
    Occupant::Segment(segment) => segment,
    Occupant::Unidentified => return Err(Error::NotFound(address)),
  };
  if raw {
    let bytes = map
      .source()
      .read(segment.start as usize, segment.len as usize)?;
    fs::write(out, bytes)?;
    return Ok(());
  }

  let artifact = map.decode(address)?;
  let name = artifact.name();
  let mut file = io::BufWriter::new(fs::File::create(out)?);
  match artifact {
    Artifact::Bytes(bytes) => file.write_all(&bytes)?,
    Artifact::Decompressed(d) => file.write_all(&d.bytes)?,
    Artifact::Image(_) => write_ppm(&map.render_image(address)?, &mut file)?,
    Artifact::TileSet(tiles) => {
      let pixels = tiles.arrange(16);
      let shades = palette::grayscale(1 << tiles.depth.bits());
      write!(file, "P5\n{} {}\n255\n", pixels.width, pixels.height)?;
      for &i in &pixels.indices {
        file.write_all(&[shades[i as usize].r])?;
      }
    }
    Artifact::Palette(p) => {
      for color in &p.colors {
        writeln!(file, "{}", color)?;
      }
    }
    Artifact::Audio(samples) => write_wav(&samples, &mut file)?,
    Artifact::Header(h) => print_header(&h, &mut file)?,
  }
  file.flush()?;
  log::info!("wrote {} to {}", name, out.display());
  Ok(())
}

fn write_ppm(bitmap: &Bitmap, mut w: impl Write) -> io::Result<()> {
  write!(w, "P6\n{} {}\n255\n", bitmap.width, bitmap.height)?;
  for c in &bitmap.colors {
    w.write_all(&[c.r, c.g, c.b])?;
  }
  Ok(())
}

fn write_wav(samples: &Samples, mut w: impl Write) -> io::Result<()> {
  let (bits, data): (u16, Vec<u8>) = match &samples.pcm {
    // WAV stores 8-bit samples unsigned.
    Pcm::I8(pcm) => (8, pcm.iter().map(|&s| s as u8 ^ 0x80).collect()),
    Pcm::I16(pcm) => {
      (16, pcm.iter().flat_map(|s| s.to_le_bytes().to_vec()).collect())
    }
  };
  let too_big = |what: &str| io::Error::new(io::ErrorKind::InvalidInput, what);
  let channels = samples.channels as u16;
  let block_align = channels * bits / 8;
  let byte_rate = samples
    .sample_rate
    .checked_mul(block_align as u32)
    .ok_or_else(|| too_big("sample rate too high for WAV"))?;
  let data_len = u32::try_from(data.len())
    .ok()
    .filter(|&n| n <= u32::MAX - 36)
    .ok_or_else(|| too_big("too many samples for WAV"))?;

  w.write_all(b"RIFF")?;
  w.write_all(&(36 + data_len).to_le_bytes())?;
  w.write_all(b"WAVEfmt ")?;
  w.write_all(&16u32.to_le_bytes())?;
  w.write_all(&1u16.to_le_bytes())?;
  w.write_all(&channels.to_le_bytes())?;
  w.write_all(&samples.sample_rate.to_le_bytes())?;
  w.write_all(&byte_rate.to_le_bytes())?;
  w.write_all(&block_align.to_le_bytes())?;
  w.write_all(&bits.to_le_bytes())?;
  w.write_all(b"data")?;
  w.write_all(&data_len.to_le_bytes())?;
  w.write_all(&data)
}

#[cfg(test)]
mod test {
  use super::*;
  use romsection::kind::HeaderLayout;
  use romsection::map::Segment;

  #[test]
  fn spans() {
    assert_eq!(parse_span("0x100..0x200"), Ok(0x100..0x200));
    assert_eq!(parse_span("0x100+64"), Ok(0x100..0x140));
    assert_eq!(parse_span(" $10 .. $20 "), Ok(0x10..0x20));
    assert!(parse_span("0x200..0x100").is_err());
    assert!(parse_span("0x100").is_err());
    assert!(parse_span("0xffffffff+2").is_err());
  }

  #[test]
  fn quoting() {
    assert_eq!(quoted("16"), "16");
    assert_eq!(quoted(" 0x10 "), "0x10");
    assert_eq!(quoted("true"), "true");
    assert_eq!(quoted("\"lz77\""), "\"lz77\"");
    assert_eq!(quoted("tiled8x8"), "\"tiled8x8\"");
  }

  #[test]
  fn wav_header() {
    let samples = Samples {
      sample_rate: 8000,
      channels: 1,
      pcm: Pcm::I8(vec![0, -128, 127]),
    };
    let mut out = Vec::new();
    write_wav(&samples, &mut out).unwrap();
    assert_eq!(out.len(), 44 + 3);
    assert_eq!(&out[..4], b"RIFF");
    assert_eq!(&out[40..44], &3u32.to_le_bytes());
    assert_eq!(&out[44..], &[0x80, 0x00, 0xff]);

    let samples = Samples {
      sample_rate: u32::MAX,
      channels: 2,
      pcm: Pcm::I16(vec![0; 4]),
    };
    let err = write_wav(&samples, &mut Vec::new()).unwrap_err();
    assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
  }

  #[test]
  fn header_segment() {
    let mut rom = vec![0; 0x200];
    rom[0xe0..0xe4].copy_from_slice(&0x0200_0100u32.to_le_bytes());
    let mut map = Registry::new(ByteSource::from_bytes(rom));
    assert!(read_header(&map).unwrap().multiboot.is_none());

    let kind = ContentKind::Header(HeaderLayout::Gba);
    let len = header::EXTENDED_LEN as u32;
    map.add_segment(Segment::new(0, len, kind), false).unwrap();
    let mb = read_header(&map).unwrap().multiboot.unwrap();
    assert_eq!(mb.joybus_entry_point, 0x0200_0100);

    let tiny = Registry::new(ByteSource::from_bytes(vec![0; 16]));
    assert!(read_header(&tiny).is_err());
  }
}
