//! Song document: a fixed three-channel note grid plus transport fields.

use alloc::vec;
use alloc::vec::Vec;
use arrayvec::ArrayString;

/// Number of score channels per beat.
pub const CHANNELS: usize = 3;
/// Lowest playable note (bottom of the staff).
pub const NOTE_MIN: u8 = 1;
/// Highest playable note.
pub const NOTE_MAX: u8 = 13;
/// Highest score instrument index.
pub const INSTRUMENT_MAX: u8 = 14;
/// Note byte of an empty cell.
pub const SENTINEL_NOTE: u8 = 0xFF;
/// Instrument byte of an empty cell.
pub const SENTINEL_INSTRUMENT: u8 = 0xDF;
/// Fastest tempo value.
pub const MAX_TEMPO: u8 = 0x9F;
/// Tempo of a new song.
pub const DEFAULT_TEMPO: u8 = 80;
/// Beat capacity of a standard song.
pub const BASE_LIMIT: u16 = 96;
/// Multiplier applied to the base capacity in extended mode.
pub const EXTRA_SIZE: u16 = 30;
/// Beat capacity of an extended song.
pub const MAX_LIMIT: u16 = BASE_LIMIT * EXTRA_SIZE;
/// Maximum title/author length in characters.
pub const TEXT_LEN: usize = 31;

/// Bounded song text (title or author).
pub type SongText = ArrayString<TEXT_LEN>;

/// One (note, instrument) byte pair in the grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Cell {
    pub note: u8,
    pub instrument: u8,
}

impl Cell {
    /// The sentinel pair meaning "no note".
    pub const EMPTY: Cell = Cell {
        note: SENTINEL_NOTE,
        instrument: SENTINEL_INSTRUMENT,
    };

    pub const fn new(note: u8, instrument: u8) -> Self {
        Self { note, instrument }
    }

    /// Decode from the on-disk byte pair.
    pub const fn from_bytes(bytes: [u8; 2]) -> Self {
        Self::new(bytes[0], bytes[1])
    }

    pub const fn to_bytes(self) -> [u8; 2] {
        [self.note, self.instrument]
    }

    /// Returns true for a slot the editor treats as free.
    pub const fn is_empty(&self) -> bool {
        self.note == SENTINEL_NOTE
    }

    /// Returns true if this pair triggers a voice during playback.
    pub const fn is_playable(&self) -> bool {
        self.note >= NOTE_MIN && self.note <= NOTE_MAX && self.instrument <= INSTRUMENT_MAX
    }

    /// A cell is valid if it is playable or exactly the sentinel pair.
    pub const fn is_valid(&self) -> bool {
        self.is_playable() || (self.note == SENTINEL_NOTE && self.instrument == SENTINEL_INSTRUMENT)
    }
}

impl Default for Cell {
    fn default() -> Self {
        Cell::EMPTY
    }
}

/// All three channels of one beat. Index 0 is channel C, index 2 is channel A.
pub type Column = [Cell; CHANNELS];

/// A beat with no notes.
pub const EMPTY_COLUMN: Column = [Cell::EMPTY; CHANNELS];

/// Encode a column as its six on-disk bytes.
pub fn column_to_bytes(column: &Column) -> [u8; 6] {
    let mut out = [0u8; 6];
    for (i, cell) in column.iter().enumerate() {
        out[i * 2] = cell.note;
        out[i * 2 + 1] = cell.instrument;
    }
    out
}

/// Decode a column from six on-disk bytes.
pub fn column_from_bytes(bytes: &[u8]) -> Column {
    let mut column = EMPTY_COLUMN;
    for (cell, pair) in column.iter_mut().zip(bytes.chunks_exact(2)) {
        *cell = Cell::from_bytes([pair[0], pair[1]]);
    }
    column
}

/// Time signature: beats per bar.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Metre {
    Three,
    #[default]
    Four,
}

impl Metre {
    pub const fn beats(self) -> u8 {
        match self {
            Metre::Three => 3,
            Metre::Four => 4,
        }
    }

    /// Map a beat count to a metre. Anything other than 3 or 4 is rejected.
    pub const fn from_beats(beats: u8) -> Option<Metre> {
        match beats {
            3 => Some(Metre::Three),
            4 => Some(Metre::Four),
            _ => None,
        }
    }

    pub const fn toggled(self) -> Metre {
        match self {
            Metre::Three => Metre::Four,
            Metre::Four => Metre::Three,
        }
    }
}

/// The mutable song document.
///
/// The grid always holds `MAX_LIMIT` columns so switching capacity never
/// reallocates; only the first `limit` columns are addressable by edits and
/// only the first `length` are played or saved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Song {
    notes: Vec<Column>,
    /// Tempo, 0 (slowest) to `MAX_TEMPO`.
    pub tempo: u8,
    pub metre: Metre,
    length: u16,
    limit: u16,
    /// Wrap to the first beat after the last one.
    pub looping: bool,
    pub title: SongText,
    pub author: SongText,
    /// Unsaved changes are present.
    pub dirty: bool,
}

impl Default for Song {
    fn default() -> Self {
        Self {
            notes: vec![EMPTY_COLUMN; MAX_LIMIT as usize],
            tempo: DEFAULT_TEMPO,
            metre: Metre::Four,
            length: BASE_LIMIT,
            limit: BASE_LIMIT,
            looping: false,
            title: SongText::new(),
            author: SongText::new(),
            dirty: false,
        }
    }
}

impl Song {
    /// Create a blank song.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset every field to a blank song without reallocating the grid.
    pub fn clear(&mut self) {
        self.notes.fill(EMPTY_COLUMN);
        self.tempo = DEFAULT_TEMPO;
        self.metre = Metre::Four;
        self.length = BASE_LIMIT;
        self.limit = BASE_LIMIT;
        self.looping = false;
        self.title.clear();
        self.author.clear();
        self.dirty = false;
    }

    /// Number of active beats.
    pub fn length(&self) -> u16 {
        self.length
    }

    /// Current beat capacity (`BASE_LIMIT` or `MAX_LIMIT`).
    pub fn limit(&self) -> u16 {
        self.limit
    }

    /// True when the song uses the extended capacity.
    pub fn is_extended(&self) -> bool {
        self.limit != BASE_LIMIT
    }

    /// Set the active length, clamped to `[0, limit]`.
    pub fn set_length(&mut self, length: u16) {
        self.length = length.min(self.limit);
    }

    /// Restore a recorded length, widening capacity if it needs more than the base.
    pub fn restore_length(&mut self, length: u16) {
        if length > BASE_LIMIT {
            self.limit = MAX_LIMIT;
        }
        self.set_length(length);
    }

    /// Switch capacity. Shrinking also truncates the length.
    pub fn set_limit(&mut self, limit: u16) {
        self.limit = limit.clamp(1, MAX_LIMIT);
        self.length = self.length.min(self.limit);
    }

    /// Read a column. Out-of-range beats read as empty.
    pub fn column(&self, beat: usize) -> Column {
        self.notes.get(beat).copied().unwrap_or(EMPTY_COLUMN)
    }

    /// Borrow one cell of the grid.
    pub fn cell(&self, beat: usize, channel: usize) -> Cell {
        self.notes
            .get(beat)
            .and_then(|col| col.get(channel))
            .copied()
            .unwrap_or(Cell::EMPTY)
    }

    /// Overwrite a column. Writes outside the grid are ignored.
    pub fn write_column(&mut self, beat: usize, column: Column) {
        if let Some(slot) = self.notes.get_mut(beat) {
            *slot = column;
        }
    }

    /// Overwrite one cell.
    pub fn write_cell(&mut self, beat: usize, channel: usize, cell: Cell) {
        if let Some(slot) = self.notes.get_mut(beat).and_then(|col| col.get_mut(channel)) {
            *slot = cell;
        }
    }

    /// Active columns in play order.
    pub fn columns(&self) -> &[Column] {
        &self.notes[..self.length as usize]
    }

    /// Columns of the addressable window, including hidden ones past `length`.
    pub fn window(&self) -> &[Column] {
        &self.notes[..self.limit as usize]
    }

    /// Shift every column from `beat` to the end of the grid right by one
    /// beat and write `column` at `beat`.
    ///
    /// The whole grid moves, not just the addressable window, so a column
    /// pushed past `limit` is still there if the capacity changes later.
    /// Returns the column pushed off the end of the grid. The length grows
    /// by one unless it is already at the limit.
    pub fn shift_in(&mut self, beat: usize, column: Column) -> Column {
        let end = self.notes.len();
        if beat >= end {
            return EMPTY_COLUMN;
        }
        let displaced = self.notes[end - 1];
        self.notes.copy_within(beat..end - 1, beat + 1);
        self.notes[beat] = column;
        if self.length < self.limit {
            self.length += 1;
        }
        displaced
    }

    /// Remove the column at `beat`, shifting the rest of the grid left by one beat.
    ///
    /// The last column of the grid becomes empty and the length shrinks by one.
    pub fn shift_out(&mut self, beat: usize) -> Column {
        let end = self.notes.len();
        if beat >= end {
            return EMPTY_COLUMN;
        }
        let removed = self.notes[beat];
        self.notes.copy_within(beat + 1..end, beat);
        self.notes[end - 1] = EMPTY_COLUMN;
        self.length = self.length.saturating_sub(1);
        removed
    }

    /// Float empty slots toward channel C so remaining notes sit on the last channels.
    pub fn collapse_column(&mut self, beat: usize) {
        let Some(col) = self.notes.get_mut(beat) else {
            return;
        };
        let mut moved = true;
        while moved {
            moved = false;
            for i in 0..CHANNELS - 1 {
                if !col[i].is_empty() && col[i + 1].is_empty() {
                    col[i + 1] = col[i];
                    col[i] = Cell::EMPTY;
                    moved = true;
                }
            }
        }
    }

    /// Clamp every field into range. Returns true if anything was corrected.
    ///
    /// Applying it twice is the same as applying it once.
    pub fn sanitize(&mut self) -> bool {
        let mut corrected = false;

        if self.length < 1 {
            self.length = 1;
            corrected = true;
        }
        if self.length > BASE_LIMIT {
            self.limit = MAX_LIMIT;
            if self.length > self.limit {
                self.length = self.limit;
                corrected = true;
            }
        }
        if self.tempo > MAX_TEMPO {
            self.tempo = MAX_TEMPO;
            corrected = true;
        }
        for cell in self.notes.iter_mut().flatten() {
            if !cell.is_valid() {
                *cell = Cell::EMPTY;
                corrected = true;
            }
        }

        if corrected {
            self.dirty = true;
        }
        corrected
    }
}

/// Which channel edits are pinned to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChannelSelect {
    /// Notes go to the first free channel, erasing compacts the column.
    #[default]
    All,
    A,
    B,
    C,
}

impl ChannelSelect {
    /// Grid index of the pinned channel, if any.
    pub const fn index(self) -> Option<usize> {
        match self {
            ChannelSelect::All => None,
            ChannelSelect::A => Some(2),
            ChannelSelect::B => Some(1),
            ChannelSelect::C => Some(0),
        }
    }

    /// All -> A -> B -> C -> All.
    pub const fn next(self) -> ChannelSelect {
        match self {
            ChannelSelect::All => ChannelSelect::A,
            ChannelSelect::A => ChannelSelect::B,
            ChannelSelect::B => ChannelSelect::C,
            ChannelSelect::C => ChannelSelect::All,
        }
    }

    /// Display label of a grid channel index.
    pub const fn label(index: usize) -> &'static str {
        match index {
            0 => "C",
            1 => "B",
            _ => "A",
        }
    }
}

/// Copy printable ASCII from a NUL-terminated byte field into song text.
///
/// Non-printable bytes become `?`; text stops at the first NUL or at `TEXT_LEN`.
pub fn text_from_bytes(bytes: &[u8]) -> SongText {
    let mut text = SongText::new();
    for &b in bytes.iter().take_while(|&&b| b != 0).take(TEXT_LEN) {
        let c = if (32..127).contains(&b) { b as char } else { '?' };
        let _ = text.try_push(c);
    }
    text
}

/// Write song text into a fixed NUL-padded byte field.
pub fn text_to_bytes<const N: usize>(text: &SongText) -> [u8; N] {
    let mut out = [0u8; N];
    for (dst, src) in out.iter_mut().zip(text.as_bytes()).take(N.saturating_sub(1)) {
        *dst = *src;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(n: u8, i: u8) -> Cell {
        Cell::new(n, i)
    }

    #[test]
    fn new_song_is_blank() {
        let song = Song::new();
        assert_eq!(song.tempo, DEFAULT_TEMPO);
        assert_eq!(song.length(), 96);
        assert_eq!(song.limit(), 96);
        assert!(song.window().iter().all(|c| *c == EMPTY_COLUMN));
        assert!(!song.dirty);
    }

    #[test]
    fn cell_validity() {
        assert!(note(1, 0).is_playable());
        assert!(note(13, 14).is_playable());
        assert!(!note(0, 0).is_playable());
        assert!(!note(14, 0).is_playable());
        assert!(!note(5, 15).is_playable());
        assert!(Cell::EMPTY.is_valid());
        assert!(!note(0xFF, 3).is_valid());
    }

    #[test]
    fn column_bytes_layout() {
        let col = [note(1, 2), Cell::EMPTY, note(13, 14)];
        assert_eq!(column_to_bytes(&col), [1, 2, 0xFF, 0xDF, 13, 14]);
        assert_eq!(column_from_bytes(&[1, 2, 0xFF, 0xDF, 13, 14]), col);
    }

    #[test]
    fn shift_in_at_limit_pushes_last_column_past_the_window() {
        let mut song = Song::new();
        song.write_column(95, [note(7, 7); 3]);
        song.write_column(MAX_LIMIT as usize - 1, [note(9, 9); 3]);
        let displaced = song.shift_in(0, [note(1, 1); 3]);
        assert_eq!(displaced, [note(9, 9); 3]);
        assert_eq!(song.length(), 96);
        assert_eq!(song.column(0), [note(1, 1); 3]);
        assert_eq!(song.column(96), [note(7, 7); 3]);
    }

    #[test]
    fn shift_in_grows_length_below_limit() {
        let mut song = Song::new();
        song.set_length(10);
        song.write_column(3, [note(2, 2); 3]);
        let displaced = song.shift_in(3, EMPTY_COLUMN);
        assert_eq!(displaced, EMPTY_COLUMN);
        assert_eq!(song.length(), 11);
        assert_eq!(song.column(4), [note(2, 2); 3]);
    }

    #[test]
    fn shift_out_clears_grid_tail() {
        let mut song = Song::new();
        song.write_column(95, [note(3, 3); 3]);
        let removed = song.shift_out(0);
        assert_eq!(removed, EMPTY_COLUMN);
        assert_eq!(song.column(94), [note(3, 3); 3]);
        assert_eq!(song.column(95), EMPTY_COLUMN);
        assert_eq!(song.length(), 95);
    }

    #[test]
    fn collapse_moves_notes_toward_channel_a() {
        let mut song = Song::new();
        song.write_column(0, [note(4, 1), Cell::EMPTY, Cell::EMPTY]);
        song.collapse_column(0);
        assert_eq!(song.column(0), [Cell::EMPTY, Cell::EMPTY, note(4, 1)]);
    }

    #[test]
    fn collapse_closes_a_gap_in_the_middle() {
        let mut song = Song::new();
        song.write_column(0, [note(3, 0), note(2, 0), Cell::EMPTY]);
        song.collapse_column(0);
        assert_eq!(song.column(0), [Cell::EMPTY, note(3, 0), note(2, 0)]);
    }

    #[test]
    fn sanitize_clamps_and_reports() {
        let mut song = Song::new();
        song.tempo = 0xF0;
        song.set_length(0);
        song.write_cell(5, 1, note(0, 3));
        assert!(song.sanitize());
        assert_eq!(song.tempo, MAX_TEMPO);
        assert_eq!(song.length(), 1);
        assert_eq!(song.cell(5, 1), Cell::EMPTY);
        assert!(!song.sanitize());
    }

    #[test]
    fn sanitize_is_idempotent() {
        let mut song = Song::new();
        song.tempo = 0xFF;
        song.write_cell(0, 0, note(0xFF, 2));
        song.write_cell(1, 2, note(20, 20));
        song.sanitize();
        let once = song.clone();
        song.sanitize();
        assert_eq!(song, once);
    }

    #[test]
    fn restore_length_widens_capacity() {
        let mut song = Song::new();
        song.restore_length(200);
        assert!(song.is_extended());
        assert_eq!(song.length(), 200);
    }

    #[test]
    fn text_round_trip_is_nul_terminated() {
        let text = text_from_bytes(b"Hello\x01\0junk");
        assert_eq!(text.as_str(), "Hello?");
        let bytes: [u8; 32] = text_to_bytes(&text);
        assert_eq!(&bytes[..7], b"Hello?\0");
    }

    #[test]
    fn channel_select_cycles() {
        let mut sel = ChannelSelect::All;
        for _ in 0..4 {
            sel = sel.next();
        }
        assert_eq!(sel, ChannelSelect::All);
        assert_eq!(ChannelSelect::A.index(), Some(2));
        assert_eq!(ChannelSelect::C.index(), Some(0));
    }
}
