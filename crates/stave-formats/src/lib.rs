//! Song codecs and audio file handling for the stave sequencer.
//!
//! Loads and saves `.sho` song files and SNES savestates, decodes the WAV
//! sample sheet into a [`SampleBank`], and exports songs as WAV.

mod multi;
mod s9x;
mod sho;
mod wav_format;
mod zst;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use stave_engine::SampleBank;
use stave_ir::{Song, BASE_LIMIT};
use thiserror::Error;
use tracing::{debug, info};

pub use multi::{save_multi, slice_path};
pub use s9x::{decode_s9x, patch_s9x, S9X_MIN_SIZE, S9X_RAM_OFFSET};
pub use sho::{decode_sho, encode_sho};
pub use wav_format::{
    decode_pcm, export_wav, load_sample_sheet, write_export, ExportLayout, EXPORT_RATE,
};
pub use zst::{decode_zst, patch_zst, playback_speed, RAM_OFFSET, ZST_MIN_SIZE};

/// Largest file any codec will read.
pub const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024;

/// Error type for song and audio files.
///
/// The display text is the reason shown to the user.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Unknown extension.")]
    UnknownExtension,
    #[error("Empty file.")]
    Empty,
    #[error("File is unexpectedly large.")]
    TooLarge,
    #[error("File too small.")]
    TooSmall,
    #[error("Not a valid {0} file.")]
    InvalidHeader(&'static str),
    #[error("Unknown .sho version {0}.")]
    UnsupportedVersion(u16),
    #[error("Unknown .sho compression type {0}.")]
    UnsupportedCompression(u8),
    #[error("Not enough data in file.")]
    UnexpectedEof,
    #[error("Song is too long ({0} beats).")]
    TooLong(u16),
    #[error("Song too long for savestate. Use multi-export.")]
    SavestateCapacity,
    #[error("No savestate to patch. Save from the emulator first, then save over it.")]
    MissingSavestate,
    #[error("Unable to read gz compressed data: {0}")]
    Gzip(#[source] std::io::Error),
    #[error("Unsupported WAV data: {0}")]
    UnsupportedWav(&'static str),
    #[error("Multi-export needs a .zs0 file name.")]
    MultiExtension,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// File kinds, chosen by extension.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Sho,
    /// ZSNES savestate: `.zst`, `.zs0`-`.zs9`, `.z00`-`.z99`.
    Zst,
    /// SNES9X savestate: `.000`-`.999`.
    Snes9x,
    Wav,
}

impl Format {
    /// Pick the format for a path. Case-insensitive.
    pub fn from_path(path: &Path) -> Result<Format, FormatError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .ok_or(FormatError::UnknownExtension)?
            .to_ascii_lowercase();
        let b = ext.as_bytes();

        match ext.as_str() {
            "sho" => Ok(Format::Sho),
            "wav" => Ok(Format::Wav),
            "zst" => Ok(Format::Zst),
            _ if b.len() == 3 && b[0] == b'z' && b[1] == b's' && b[2].is_ascii_digit() => Ok(Format::Zst),
            _ if b.len() == 3 && b[0] == b'z' && b[1].is_ascii_digit() && b[2].is_ascii_digit() => {
                Ok(Format::Zst)
            }
            _ if b.len() == 3 && b.iter().all(u8::is_ascii_digit) => Ok(Format::Snes9x),
            _ => Err(FormatError::UnknownExtension),
        }
    }
}

/// A decoded song and whether decoding had to repair it.
#[derive(Clone, Debug)]
pub struct LoadedSong {
    pub song: Song,
    pub corrected: bool,
}

impl LoadedSong {
    /// Sanitize a freshly decoded song.
    pub(crate) fn sanitized(mut song: Song) -> Self {
        let corrected = song.sanitize();
        song.dirty = corrected;
        Self { song, corrected }
    }
}

/// What a successful save produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveKind {
    /// The song can be reloaded from the file without loss.
    Song,
    /// A rendering; the song itself is still unsaved.
    Export,
}

/// Read a whole file, enforcing the size limits every codec shares.
pub fn read_file(path: &Path) -> Result<Vec<u8>, FormatError> {
    let size = fs::metadata(path)?.len();
    if size == 0 {
        return Err(FormatError::Empty);
    }
    if size >= MAX_FILE_SIZE {
        return Err(FormatError::TooLarge);
    }
    Ok(fs::read(path)?)
}

/// Load a song from any supported file.
pub fn load_song(path: &Path) -> Result<LoadedSong, FormatError> {
    let decode: fn(&[u8]) -> Result<LoadedSong, FormatError> = match Format::from_path(path)? {
        Format::Sho => decode_sho,
        Format::Zst => decode_zst,
        Format::Snes9x => decode_s9x,
        Format::Wav => return Err(FormatError::UnknownExtension),
    };
    let loaded = decode(&read_file(path)?)?;

    info!(
        path = %path.display(),
        length = loaded.song.length(),
        corrected = loaded.corrected,
        "loaded song"
    );
    Ok(loaded)
}

/// Save a song in the format its extension names.
///
/// Songs and savestates are built in memory first and WAV exports are
/// streamed to a temporary file, so a refused save never leaves a partial
/// file behind.
pub fn save_song(
    path: &Path,
    song: &Song,
    bank: &Arc<SampleBank>,
    export_rate: u32,
) -> Result<SaveKind, FormatError> {
    let (bytes, kind) = match Format::from_path(path)? {
        Format::Sho => (encode_sho(song), SaveKind::Song),
        Format::Zst => {
            if song.length() > BASE_LIMIT {
                return Err(FormatError::SavestateCapacity);
            }
            let mut state = existing_savestate(path)?.ok_or(FormatError::MissingSavestate)?;
            patch_zst(&mut state, song)?;
            (state, SaveKind::Song)
        }
        Format::Snes9x => {
            if song.length() > BASE_LIMIT {
                return Err(FormatError::SavestateCapacity);
            }
            let state = existing_savestate(path)?.ok_or(FormatError::MissingSavestate)?;
            (patch_s9x(&state, song)?, SaveKind::Song)
        }
        Format::Wav => {
            let layout = export_wav(path, song, bank, export_rate)?;
            info!(path = %path.display(), samples = layout.total(), "exported song");
            return Ok(SaveKind::Export);
        }
    };

    fs::write(path, &bytes)?;
    info!(path = %path.display(), bytes = bytes.len(), ?kind, "saved song");
    Ok(kind)
}

/// Read a savestate that is about to be patched, if one exists.
pub(crate) fn existing_savestate(path: &Path) -> Result<Option<Vec<u8>>, FormatError> {
    if !path.exists() {
        debug!(path = %path.display(), "no savestate to patch");
        return Ok(None);
    }
    read_file(path).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(name: &str) -> Result<Format, FormatError> {
        Format::from_path(Path::new(name))
    }

    #[test]
    fn extension_dispatch() {
        assert_eq!(fmt("a.sho").unwrap(), Format::Sho);
        assert_eq!(fmt("a.SHO").unwrap(), Format::Sho);
        assert_eq!(fmt("a.zst").unwrap(), Format::Zst);
        assert_eq!(fmt("a.ZS7").unwrap(), Format::Zst);
        assert_eq!(fmt("a.z42").unwrap(), Format::Zst);
        assert_eq!(fmt("a.003").unwrap(), Format::Snes9x);
        assert_eq!(fmt("a.Wav").unwrap(), Format::Wav);
        assert!(matches!(fmt("a.mid"), Err(FormatError::UnknownExtension)));
        assert!(matches!(fmt("noext"), Err(FormatError::UnknownExtension)));
        assert!(matches!(fmt("a.zsx"), Err(FormatError::UnknownExtension)));
    }

    #[test]
    fn reasons_read_as_messages() {
        assert_eq!(FormatError::UnknownExtension.to_string(), "Unknown extension.");
        assert_eq!(
            FormatError::SavestateCapacity.to_string(),
            "Song too long for savestate. Use multi-export."
        );
    }
}
