//! ZSNES savestates (`.zst` and numbered variants).
//!
//! Only the song block of the editor's RAM is read or written; everything
//! else in the savestate is left untouched, so saving patches an existing
//! file rather than producing one from scratch.

use stave_ir::{column_from_bytes, column_to_bytes, Metre, Song, SongText, BASE_LIMIT, EMPTY_COLUMN};

use crate::{FormatError, LoadedSong};

/// File offset of the song block.
pub const RAM_OFFSET: usize = 0x15F7;
/// Bytes from the first note to the end of the song block.
pub(crate) const RAM_BLOCK_LEN: usize = POS_METRE + 1;
/// Smallest file that contains the whole song block.
pub const ZST_MIN_SIZE: usize = RAM_OFFSET + RAM_BLOCK_LEN;

const POS_NOTES: usize = 0x000;
const POS_LENGTH: usize = 0x240;
const POS_LOOP: usize = 0x242;
const POS_TEMPO: usize = 0x244;
const POS_SPEED: usize = 0x246;
const POS_METRE: usize = 0x24E;
const NOTE_BYTES: usize = BASE_LIMIT as usize * 6;

/// Multiplier turning the editor tempo step into the playback routine's speed word.
const SPEED_MULTIPLIER: u32 = 3291161;

/// Playback speed word the game keeps next to the editor tempo.
pub fn playback_speed(tempo: u8) -> u32 {
    (u32::from(tempo) + stave_engine::timing::TEMPO_OFFSET) * SPEED_MULTIPLIER
}

fn text(s: &str) -> SongText {
    let mut t = SongText::new();
    let _ = t.try_push_str(s);
    t
}

/// Read the editor's song block, starting at its first note byte.
///
/// Shared by every savestate flavour; only the block's offset in the file
/// differs. `ram` must hold at least [`RAM_BLOCK_LEN`] bytes.
pub(crate) fn read_ram(ram: &[u8]) -> Song {
    let mut song = Song::new();

    let raw_length = u16::from_le_bytes([ram[POS_LENGTH], ram[POS_LENGTH + 1]]);
    let length = ((raw_length >> 3) as i32 - 2).clamp(0, u16::MAX as i32) as u16;
    song.restore_length(length);
    song.tempo = ram[POS_TEMPO];
    song.looping = ram[POS_LOOP] == 1;
    song.metre = if ram[POS_METRE] == 0 { Metre::Three } else { Metre::Four };

    let notes = &ram[POS_NOTES..POS_NOTES + NOTE_BYTES];
    for (beat, bytes) in notes.chunks_exact(6).take(length as usize).enumerate() {
        song.write_column(beat, column_from_bytes(bytes));
    }
    song
}

/// Overwrite the editor's song block. The song must fit in [`BASE_LIMIT`] beats.
pub(crate) fn write_ram(ram: &mut [u8], song: &Song) {
    for beat in 0..BASE_LIMIT as usize {
        let column = if beat < song.length() as usize { song.column(beat) } else { EMPTY_COLUMN };
        let at = POS_NOTES + beat * 6;
        ram[at..at + 6].copy_from_slice(&column_to_bytes(&column));
    }
    ram[POS_LENGTH..POS_LENGTH + 2].copy_from_slice(&((song.length() + 2) << 3).to_le_bytes());
    ram[POS_SPEED..POS_SPEED + 4].copy_from_slice(&playback_speed(song.tempo).to_le_bytes());
    ram[POS_LOOP] = u8::from(song.looping);
    ram[POS_TEMPO] = song.tempo;
    ram[POS_METRE] = match song.metre {
        Metre::Three => 0,
        Metre::Four => 1,
    };
}

/// Decode the song block of a savestate.
pub fn decode_zst(data: &[u8]) -> Result<LoadedSong, FormatError> {
    if data.is_empty() {
        return Err(FormatError::Empty);
    }
    if data.len() < ZST_MIN_SIZE {
        return Err(FormatError::TooSmall);
    }

    let mut song = read_ram(&data[RAM_OFFSET..]);
    song.title = text("ZST import");
    song.author = text("Mario Paint");
    Ok(LoadedSong::sanitized(song))
}

/// Write the song block into an existing savestate image.
pub fn patch_zst(state: &mut [u8], song: &Song) -> Result<(), FormatError> {
    if song.length() > BASE_LIMIT {
        return Err(FormatError::SavestateCapacity);
    }
    if state.len() < ZST_MIN_SIZE {
        return Err(FormatError::TooSmall);
    }
    write_ram(&mut state[RAM_OFFSET..], song);
    Ok(())
}
