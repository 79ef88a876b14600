//! `.sho` song files.
//!
//! Version 2 holds exactly 96 beats with the optional length/loop/metre
//! bytes appended after the tempo. Version 3 stores a variable-length grid
//! up to the extended capacity.

use std::io::Cursor;

use binrw::{binrw, BinRead, BinWrite};
use stave_ir::{
    column_from_bytes, column_to_bytes, text_from_bytes, text_to_bytes, Metre, Song, BASE_LIMIT,
    EMPTY_COLUMN, MAX_LIMIT,
};

use crate::{FormatError, LoadedSong};

const TEXT_FIELD: usize = 32;
/// Offset of the first byte after the header.
const NOTE_POS: usize = 4 + 2 + 1 + TEXT_FIELD * 3;
const COLUMN_BYTES: usize = 6;
const V2_NOTES: usize = BASE_LIMIT as usize * COLUMN_BYTES;
/// Smallest valid version 2 file: header, notes, tempo.
const V2_MIN_SIZE: usize = NOTE_POS + V2_NOTES + 1;
/// Version 2 file with the extended length/loop/metre bytes.
const V2_FULL_SIZE: usize = V2_MIN_SIZE + 3;
/// Instrument set name written into new files.
const INSTRUMENT_SET: &[u8] = b"default.shi";

#[binrw]
#[brw(little, magic = b"shro")]
#[derive(Debug)]
struct ShoHeader {
    version: u16,
    compression: u8,
    title: [u8; TEXT_FIELD],
    author: [u8; TEXT_FIELD],
    instruments: [u8; TEXT_FIELD],
}

fn metre_flag(metre: Metre) -> u8 {
    match metre {
        Metre::Three => 0,
        Metre::Four => 1,
    }
}

fn metre_from_flag(flag: u8) -> Metre {
    if flag == 0 {
        Metre::Three
    } else {
        Metre::Four
    }
}

fn read_columns(song: &mut Song, notes: &[u8], count: usize) {
    for (beat, bytes) in notes.chunks_exact(COLUMN_BYTES).take(count).enumerate() {
        song.write_column(beat, column_from_bytes(bytes));
    }
}

/// Decode a `.sho` file.
pub fn decode_sho(data: &[u8]) -> Result<LoadedSong, FormatError> {
    let header = ShoHeader::read(&mut Cursor::new(data)).map_err(|e| match e {
        binrw::Error::BadMagic { .. } => FormatError::InvalidHeader(".sho"),
        _ => FormatError::UnexpectedEof,
    })?;

    if header.version != 2 && header.version != 3 {
        return Err(FormatError::UnsupportedVersion(header.version));
    }
    if header.compression != 0 {
        return Err(FormatError::UnsupportedCompression(header.compression));
    }

    let mut song = Song::new();
    song.title = text_from_bytes(&header.title);
    song.author = text_from_bytes(&header.author);

    if header.version == 2 {
        if data.len() < V2_MIN_SIZE {
            return Err(FormatError::UnexpectedEof);
        }
        song.tempo = data[NOTE_POS + V2_NOTES];
        let (length, looping, metre) = if data.len() >= V2_FULL_SIZE {
            let ext = &data[V2_MIN_SIZE..V2_FULL_SIZE];
            (u16::from(ext[0]), ext[1] != 0, metre_from_flag(ext[2]))
        } else {
            (BASE_LIMIT, true, Metre::Four)
        };
        song.restore_length(length);
        song.looping = looping;
        song.metre = metre;
        read_columns(&mut song, &data[NOTE_POS..NOTE_POS + V2_NOTES], length as usize);
    } else {
        let fields = data.get(NOTE_POS..NOTE_POS + 5).ok_or(FormatError::UnexpectedEof)?;
        let length = u16::from_le_bytes([fields[0], fields[1]]);
        if length > MAX_LIMIT {
            return Err(FormatError::TooLong(length));
        }
        let notes = data
            .get(NOTE_POS + 5..NOTE_POS + 5 + length as usize * COLUMN_BYTES)
            .ok_or(FormatError::UnexpectedEof)?;

        song.looping = fields[2] != 0;
        song.metre = metre_from_flag(fields[3]);
        song.tempo = fields[4];
        song.restore_length(length);
        read_columns(&mut song, notes, length as usize);
    }

    Ok(LoadedSong::sanitized(song))
}

/// Encode a song, as version 2 when it fits in 96 beats.
pub fn encode_sho(song: &Song) -> Vec<u8> {
    let length = song.length();
    let version = if length <= BASE_LIMIT { 2 } else { 3 };

    let mut instruments = [0u8; TEXT_FIELD];
    instruments[..INSTRUMENT_SET.len()].copy_from_slice(INSTRUMENT_SET);
    let header = ShoHeader {
        version,
        compression: 0,
        title: text_to_bytes(&song.title),
        author: text_to_bytes(&song.author),
        instruments,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(V2_FULL_SIZE));
    header.write(&mut cursor).expect("Vec<u8> write cannot fail");
    let mut out = cursor.into_inner();

    if version == 2 {
        for beat in 0..BASE_LIMIT as usize {
            let column = if beat < length as usize { song.column(beat) } else { EMPTY_COLUMN };
            out.extend_from_slice(&column_to_bytes(&column));
        }
        out.push(song.tempo);
        out.push(length as u8);
        out.push(u8::from(song.looping));
        out.push(metre_flag(song.metre));
    } else {
        out.extend_from_slice(&length.to_le_bytes());
        out.push(u8::from(song.looping));
        out.push(metre_flag(song.metre));
        out.push(song.tempo);
        for column in song.columns() {
            out.extend_from_slice(&column_to_bytes(column));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use stave_ir::Cell;

    fn sample_song(length: u16) -> Song {
        let mut song = Song::new();
        song.restore_length(length);
        song.tempo = 0x40;
        song.metre = Metre::Three;
        song.looping = true;
        let _ = song.title.try_push_str("Title");
        let _ = song.author.try_push_str("Me");
        for beat in 0..length as usize {
            song.write_cell(beat, beat % 3, Cell::new((beat % 13) as u8 + 1, (beat % 15) as u8));
        }
        song
    }

    #[test]
    fn short_song_writes_version_2() {
        let bytes = encode_sho(&sample_song(40));
        assert_eq!(bytes.len(), V2_FULL_SIZE);
        assert_eq!(&bytes[..4], b"shro");
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 2);
        assert_eq!(&bytes[7 + 64..7 + 64 + 11], b"default.shi");
        assert_eq!(bytes[680], 40);
        assert_eq!(bytes[682], 0);
    }

    #[test]
    fn long_song_writes_version_3() {
        let bytes = encode_sho(&sample_song(200));
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), 3);
        assert_eq!(bytes.len(), NOTE_POS + 5 + 200 * 6);
    }

    #[test]
    fn decode_restores_fields() {
        for length in [1, 40, 96, 97, 2880] {
            let song = sample_song(length);
            let loaded = decode_sho(&encode_sho(&song)).unwrap();
            assert!(!loaded.corrected);
            assert_eq!(loaded.song.columns(), song.columns());
            assert_eq!(loaded.song.length(), length);
            assert_eq!(loaded.song.tempo, 0x40);
            assert_eq!(loaded.song.metre, Metre::Three);
            assert!(loaded.song.looping);
            assert_eq!(loaded.song.title.as_str(), "Title");
            assert_eq!(loaded.song.is_extended(), length > 96);
        }
    }

    #[test]
    fn plain_version_2_gets_defaults() {
        let mut bytes = encode_sho(&sample_song(10));
        bytes.truncate(V2_MIN_SIZE);
        let loaded = decode_sho(&bytes).unwrap();
        assert_eq!(loaded.song.length(), 96);
        assert!(loaded.song.looping);
        assert_eq!(loaded.song.metre, Metre::Four);
    }

    #[test]
    fn rejects_bad_input() {
        let good = encode_sho(&sample_song(10));

        let mut bad_magic = good.clone();
        bad_magic[0] = b'x';
        assert!(matches!(decode_sho(&bad_magic), Err(FormatError::InvalidHeader(_))));

        let mut bad_version = good.clone();
        bad_version[4] = 9;
        assert!(matches!(decode_sho(&bad_version), Err(FormatError::UnsupportedVersion(9))));

        let mut packed = good.clone();
        packed[6] = 1;
        assert!(matches!(decode_sho(&packed), Err(FormatError::UnsupportedCompression(1))));

        assert!(matches!(decode_sho(&good[..600]), Err(FormatError::UnexpectedEof)));
    }

    #[test]
    fn version_3_over_capacity_is_refused() {
        let mut bytes = encode_sho(&sample_song(200));
        bytes[NOTE_POS..NOTE_POS + 2].copy_from_slice(&3000u16.to_le_bytes());
        assert!(matches!(decode_sho(&bytes), Err(FormatError::TooLong(3000))));
    }

    #[test]
    fn out_of_range_values_are_corrected() {
        let mut bytes = encode_sho(&sample_song(10));
        bytes[NOTE_POS + V2_NOTES] = 0xF0;
        bytes[NOTE_POS] = 0x20;
        let loaded = decode_sho(&bytes).unwrap();
        assert!(loaded.corrected);
        assert!(loaded.song.dirty);
        assert_eq!(loaded.song.tempo, stave_ir::MAX_TEMPO);
        assert_eq!(loaded.song.cell(0, 0), Cell::EMPTY);
    }
}
