//! Splitting a long song across numbered savestates.

use std::fs;
use std::path::{Path, PathBuf};

use stave_ir::{Song, BASE_LIMIT};
use tracing::info;

use crate::zst::patch_zst;
use crate::{existing_savestate, FormatError};

/// Path of slice `index` for a multi-export rooted at `first` (`name.zs0`).
///
/// Slices 0-9 use `.zs0`-`.zs9`; later ones use `.z10`, `.z11` and so on.
pub fn slice_path(first: &Path, index: usize) -> PathBuf {
    let ext = first.extension().and_then(|e| e.to_str()).unwrap_or("zs0");
    let z = ext.get(..1).unwrap_or("z");
    let new_ext = if index < 10 {
        format!("{}{}", ext.get(..2).unwrap_or("zs"), index)
    } else {
        format!("{z}{index}")
    };
    first.with_extension(new_ext)
}

/// The 96-beat window of `song` starting at `first_beat`, as its own song.
fn slice(song: &Song, first_beat: usize) -> Song {
    let mut part = Song::new();
    part.tempo = song.tempo;
    part.metre = song.metre;
    part.looping = song.looping;
    part.title = song.title;
    part.author = song.author;

    let remaining = song.length() as usize - first_beat;
    let length = remaining.min(BASE_LIMIT as usize);
    part.set_length(length as u16);
    for beat in 0..length {
        part.write_column(beat, song.column(first_beat + beat));
    }
    part
}

/// Save `song` as consecutive 96-beat savestates `name.zs0`, `name.zs1`, ...
///
/// Each slice patches the savestate already at its path, or a copy of the
/// first slice's savestate when it does not exist yet. Every slice is built
/// before any file is written. Returns the paths written.
pub fn save_multi(first: &Path, song: &Song) -> Result<Vec<PathBuf>, FormatError> {
    let is_zs0 = first
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zs0"));
    if !is_zs0 {
        return Err(FormatError::MultiExtension);
    }

    let template = existing_savestate(first)?.ok_or(FormatError::MissingSavestate)?;

    let mut outputs = Vec::new();
    for (index, first_beat) in (0..song.length() as usize).step_by(BASE_LIMIT as usize).enumerate() {
        let path = slice_path(first, index);
        let mut state = match existing_savestate(&path)? {
            Some(state) => state,
            None => template.clone(),
        };
        patch_zst(&mut state, &slice(song, first_beat))?;
        outputs.push((path, state));
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (path, state) in outputs {
        fs::write(&path, state)?;
        written.push(path);
    }
    info!(first = %first.display(), slices = written.len(), "multi-export complete");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_ir::Cell;

    #[test]
    fn slice_names() {
        let first = Path::new("dir/song.zs0");
        assert_eq!(slice_path(first, 0), PathBuf::from("dir/song.zs0"));
        assert_eq!(slice_path(first, 7), PathBuf::from("dir/song.zs7"));
        assert_eq!(slice_path(first, 10), PathBuf::from("dir/song.z10"));
        assert_eq!(slice_path(first, 29), PathBuf::from("dir/song.z29"));
        assert_eq!(slice_path(Path::new("SONG.ZS0"), 3), PathBuf::from("SONG.ZS3"));
    }

    #[test]
    fn slices_shift_notes_down() {
        let mut song = Song::new();
        song.restore_length(200);
        song.write_cell(100, 0, Cell::new(3, 3));
        song.write_cell(199, 2, Cell::new(4, 4));

        let second = slice(&song, 96);
        assert_eq!(second.length(), 96);
        assert_eq!(second.cell(4, 0), Cell::new(3, 3));

        let third = slice(&song, 192);
        assert_eq!(third.length(), 8);
        assert_eq!(third.cell(7, 2), Cell::new(4, 4));
    }
}
