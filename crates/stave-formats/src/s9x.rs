//! SNES9X savestates (`.000`-`.999`).
//!
//! The whole state is gzip-compressed. The song block has the same layout
//! as in a ZSNES state, just further into the decompressed image.

use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use stave_ir::{Song, BASE_LIMIT};

use crate::zst::{read_ram, write_ram};
use crate::{FormatError, LoadedSong, MAX_FILE_SIZE};

/// Offset of the song block in the decompressed state.
pub const S9X_RAM_OFFSET: usize = 0x115BF;
/// Smallest decompressed state accepted.
pub const S9X_MIN_SIZE: usize = S9X_RAM_OFFSET + 1024;

/// Inflate a savestate, refusing anything that decompresses past `MAX_FILE_SIZE`.
fn inflate(data: &[u8]) -> Result<Vec<u8>, FormatError> {
    if data.is_empty() {
        return Err(FormatError::Empty);
    }
    let mut state = Vec::new();
    MultiGzDecoder::new(data)
        .take(MAX_FILE_SIZE)
        .read_to_end(&mut state)
        .map_err(FormatError::Gzip)?;
    if state.len() as u64 >= MAX_FILE_SIZE {
        return Err(FormatError::TooLarge);
    }
    if state.len() < S9X_MIN_SIZE {
        return Err(FormatError::TooSmall);
    }
    Ok(state)
}

/// Decode the song block of a compressed savestate.
pub fn decode_s9x(data: &[u8]) -> Result<LoadedSong, FormatError> {
    let state = inflate(data)?;
    Ok(LoadedSong::sanitized(read_ram(&state[S9X_RAM_OFFSET..])))
}

/// Write the song block into a compressed savestate, returning the
/// recompressed file.
pub fn patch_s9x(data: &[u8], song: &Song) -> Result<Vec<u8>, FormatError> {
    if song.length() > BASE_LIMIT {
        return Err(FormatError::SavestateCapacity);
    }
    let mut state = inflate(data)?;
    write_ram(&mut state[S9X_RAM_OFFSET..], song);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&state)?;
    Ok(encoder.finish()?)
}
