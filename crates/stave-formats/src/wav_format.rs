//! WAV decoding for sample sheets and WAV export of songs.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use stave_engine::sample_bank::{split_sheet, BANK_SIZE};
use stave_engine::{Player, SampleBank, REFERENCE_RATE};
use stave_ir::Song;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::FormatError;

/// Default export rate: the rate the instrument samples were recorded at.
pub const EXPORT_RATE: u32 = REFERENCE_RATE;
/// Samples rendered per `Player::render` call while exporting.
const RENDER_BLOCK: usize = 8 * 1024;
/// `smpl` chunk body size with one loop.
const SMPL_BODY: u32 = 60;

// --- Export ---

/// Where the parts of an exported song fall, in samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExportLayout {
    pub sample_rate: u32,
    /// Silence before the first beat.
    pub leader: usize,
    /// One pass through the song.
    pub body: usize,
    /// Two for a looping song, otherwise one.
    pub passes: usize,
    /// Ring-out after the last pass.
    pub tail: usize,
}

impl ExportLayout {
    /// A quarter second of silence, then the song once (twice when it loops),
    /// then three seconds of tail so the last notes ring out.
    pub fn new(song: &Song, beat_len: u32, sample_rate: u32) -> Self {
        Self {
            sample_rate,
            leader: (sample_rate / 4) as usize,
            body: song.length() as usize * beat_len as usize,
            passes: if song.looping { 2 } else { 1 },
            tail: (sample_rate * 3) as usize,
        }
    }

    /// Total samples.
    pub fn total(&self) -> usize {
        self.leader + self.body * self.passes + self.tail
    }

    fn tail_start(&self) -> usize {
        self.total() - self.tail
    }

    /// Inclusive sample range of the second pass through a looping song.
    pub fn loop_range(&self) -> Option<(u32, u32)> {
        (self.passes == 2).then(|| {
            let start = self.leader + self.body;
            (start as u32, (start + self.body).saturating_sub(1) as u32)
        })
    }

    /// Linear fade applied to a looping song's tail.
    fn gain(&self, at: usize) -> Option<f64> {
        if self.passes != 2 || at < self.tail_start() {
            return None;
        }
        Some((self.total() - at) as f64 / self.tail as f64)
    }
}

/// Render a song and write it as a mono 16-bit WAV stream.
///
/// Audio is rendered and written one block at a time, so memory use does
/// not grow with the song. A looping song's tail fades to silence and its
/// second pass is marked as the loop in a `smpl` chunk.
pub fn write_export(
    w: &mut impl Write,
    song: &Song,
    bank: &Arc<SampleBank>,
    sample_rate: u32,
) -> io::Result<ExportLayout> {
    let mut player = Player::new(bank.clone(), sample_rate);
    player.play(song, 0);
    let layout = ExportLayout::new(song, player.beat_length(), sample_rate);

    let smpl_size = if layout.passes == 2 { 8 + SMPL_BODY as usize } else { 0 };
    let riff_size = (layout.total() * 2)
        .checked_add(36 + smpl_size)
        .and_then(|size| u32::try_from(size).ok())
        .ok_or_else(|| io::Error::other("song too long for a WAV file"))?;
    let data_size = (layout.total() * 2) as u32;

    w.write_all(b"RIFF")?;
    w.write_all(&riff_size.to_le_bytes())?;
    w.write_all(b"WAVE")?;
    write_fmt_chunk(w, sample_rate)?;
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;

    let mut block = vec![0i16; RENDER_BLOCK];
    let mut bytes = Vec::with_capacity(RENDER_BLOCK * 2);
    let mut at = 0;
    while at < layout.leader {
        let n = RENDER_BLOCK.min(layout.leader - at);
        write_samples(w, &block[..n], &mut bytes)?;
        at += n;
    }
    while at < layout.total() {
        let n = RENDER_BLOCK.min(layout.total() - at);
        let block = &mut block[..n];
        player.render(song, block);
        for (i, s) in block.iter_mut().enumerate() {
            if let Some(gain) = layout.gain(at + i) {
                *s = (gain * f64::from(*s)) as i16;
            }
        }
        write_samples(w, block, &mut bytes)?;
        at += n;
    }

    if let Some((start, end)) = layout.loop_range() {
        write_smpl_chunk(w, sample_rate, start, end)?;
    }
    Ok(layout)
}

/// Export a song to `path`.
///
/// The WAV is streamed into a temporary file next to `path` and moved into
/// place only once complete, so a failed export leaves no partial file.
pub fn export_wav(
    path: &Path,
    song: &Song,
    bank: &Arc<SampleBank>,
    sample_rate: u32,
) -> Result<ExportLayout, FormatError> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    let layout = {
        let mut w = BufWriter::new(file.as_file_mut());
        let layout = write_export(&mut w, song, bank, sample_rate)?;
        w.flush()?;
        layout
    };
    file.persist(path).map_err(|e| FormatError::Io(e.error))?;
    debug!(path = %path.display(), samples = layout.total(), "exported wav");
    Ok(layout)
}

fn write_samples(w: &mut impl Write, pcm: &[i16], bytes: &mut Vec<u8>) -> io::Result<()> {
    bytes.clear();
    bytes.extend(pcm.iter().flat_map(|s| s.to_le_bytes()));
    w.write_all(bytes)
}

fn write_fmt_chunk(w: &mut impl Write, sample_rate: u32) -> io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * 2).to_le_bytes())?;
    w.write_all(&2u16.to_le_bytes())?;
    w.write_all(&16u16.to_le_bytes())
}

fn write_smpl_chunk(w: &mut impl Write, sample_rate: u32, start: u32, end: u32) -> io::Result<()> {
    let period_ns = (1_000_000_000.0 / f64::from(sample_rate)) as u32;
    let fields: [u32; 15] = [
        0,         // manufacturer
        0,         // product
        period_ns, // sample period
        60,        // MIDI unity note
        0,         // pitch fraction
        0,         // SMPTE format
        0,         // SMPTE offset
        1,         // loop count
        0,         // sampler data
        0,         // cue point id
        0,         // forward loop
        start,
        end,
        0, // fraction
        0, // play count (infinite)
    ];
    w.write_all(b"smpl")?;
    w.write_all(&SMPL_BODY.to_le_bytes())?;
    for f in fields {
        w.write_all(&f.to_le_bytes())?;
    }
    Ok(())
}

// --- Reading ---

/// Load a sample sheet WAV and split it into a bank.
pub fn load_sample_sheet(path: &Path) -> Result<SampleBank, FormatError> {
    let data = fs::read(path)?;
    let (pcm, sample_rate) = decode_pcm(&data)?;
    if sample_rate != REFERENCE_RATE {
        warn!(sample_rate, "sample sheet is not at {} Hz; pitch will be off", REFERENCE_RATE);
    }

    let entries = split_sheet(&pcm);
    if entries.len() != BANK_SIZE {
        warn!(found = entries.len(), expected = BANK_SIZE, "sample sheet entry count mismatch");
    }
    info!(path = %path.display(), entries = entries.len(), "loaded sample sheet");
    Ok(SampleBank::from_entries(entries))
}

/// Decode PCM WAV data to mono 16-bit samples. Stereo is averaged.
pub fn decode_pcm(data: &[u8]) -> Result<(Vec<i16>, u32), FormatError> {
    let header = parse_header(data)?;
    let end = (header.data_offset + header.data_size).min(data.len());
    let raw = &data[header.data_offset..end];

    let pcm = match (header.bits_per_sample, header.num_channels) {
        (8, 1) => raw.iter().map(|&b| (b as i16 - 128) << 8).collect(),
        (8, 2) => raw
            .chunks_exact(2)
            .map(|c| ((c[0] as i16 - 128) + (c[1] as i16 - 128)) << 7)
            .collect(),
        (16, 1) => raw.chunks_exact(2).map(|c| i16::from_le_bytes([c[0], c[1]])).collect(),
        (16, 2) => raw
            .chunks_exact(4)
            .map(|c| {
                let l = i16::from_le_bytes([c[0], c[1]]) as i32;
                let r = i16::from_le_bytes([c[2], c[3]]) as i32;
                ((l + r) / 2) as i16
            })
            .collect(),
        _ => return Err(FormatError::UnsupportedWav("sample format")),
    };

    Ok((pcm, header.sample_rate))
}

struct WavHeader {
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    data_offset: usize,
    data_size: usize,
}

fn parse_header(data: &[u8]) -> Result<WavHeader, FormatError> {
    if data.len() < 44 {
        return Err(FormatError::UnexpectedEof);
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(FormatError::InvalidHeader("WAV"));
    }

    let mut pos = 12;
    let mut fmt: Option<(u16, u32, u16)> = None;
    let mut data_chunk: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = read_u32_le(data, pos + 4) as usize;

        if chunk_id == b"fmt " && chunk_size >= 16 && pos + 24 <= data.len() {
            if read_u16_le(data, pos + 8) != 1 {
                return Err(FormatError::UnsupportedWav("compressed"));
            }
            let channels = read_u16_le(data, pos + 10);
            let rate = read_u32_le(data, pos + 12);
            let bits = read_u16_le(data, pos + 22);
            fmt = Some((channels, rate, bits));
        } else if chunk_id == b"data" {
            data_chunk = Some((pos + 8, chunk_size));
        }

        pos += 8 + chunk_size;
        if pos % 2 != 0 {
            pos += 1;
        }
    }

    let (num_channels, sample_rate, bits_per_sample) = fmt.ok_or(FormatError::InvalidHeader("WAV"))?;
    let (data_offset, data_size) = data_chunk.ok_or(FormatError::InvalidHeader("WAV"))?;

    if bits_per_sample != 8 && bits_per_sample != 16 {
        return Err(FormatError::UnsupportedWav("bit depth"));
    }
    if !(1..=2).contains(&num_channels) {
        return Err(FormatError::UnsupportedWav("channel count"));
    }

    Ok(WavHeader {
        num_channels,
        sample_rate,
        bits_per_sample,
        data_offset,
        data_size,
    })
}

fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}
