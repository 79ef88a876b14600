//! Undo-aware mutation primitives.
//!
//! A [`Document`] pairs the song with its undo log so that every mutation
//! pushes its inverse before touching the song.

use alloc::vec::Vec;

use crate::song::{
    Cell, ChannelSelect, Column, Metre, Song, BASE_LIMIT, CHANNELS, EMPTY_COLUMN, MAX_LIMIT,
    MAX_TEMPO, TEXT_LEN,
};
use crate::undo::{UndoEntry, UndoLog, UndoOutcome};

/// Which text field a keystroke goes to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextField {
    Title,
    Author,
}

/// The live song together with its undo history.
#[derive(Clone, Debug, Default)]
pub struct Document {
    pub song: Song,
    pub undo: UndoLog,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the song (after a load) and restart history from it.
    pub fn replace(&mut self, song: Song, corrected: bool) {
        self.song = song;
        self.song.dirty = corrected;
        self.undo.reset(corrected);
    }

    /// Blank the song and restart history. Not undoable.
    pub fn clear(&mut self) {
        self.song.clear();
        self.undo.reset(false);
    }

    /// Record that the song was persisted as-is.
    pub fn mark_saved(&mut self) {
        self.song.dirty = false;
        self.undo.mark_saved();
    }

    pub fn undo(&mut self) -> UndoOutcome {
        self.undo.undo(&mut self.song)
    }

    fn record(&mut self, entry: UndoEntry) {
        self.undo.push(entry);
        self.song.dirty = true;
    }

    /// Place a note on `beat`.
    ///
    /// With a pinned channel the note replaces whatever is there; otherwise it
    /// goes to the first free channel scanning from A toward C. Returns the
    /// channel written, or `None` if nothing changed.
    pub fn set_note(&mut self, beat: usize, note: u8, instrument: u8, pin: ChannelSelect) -> Option<usize> {
        let cell = Cell::new(note, instrument);
        if beat >= self.song.length() as usize || !cell.is_playable() {
            return None;
        }

        let channel = match pin.index() {
            Some(channel) => channel,
            None => (0..CHANNELS).rev().find(|&ch| self.song.cell(beat, ch).is_empty())?,
        };

        self.record(UndoEntry::column_edit(&self.song, beat));
        self.song.write_cell(beat, channel, cell);
        Some(channel)
    }

    /// Remove `note` from `beat`.
    ///
    /// Takes the first channel holding the note, preferring the pinned one.
    /// In all-channels mode the column is compacted afterwards.
    pub fn erase_note(&mut self, beat: usize, note: u8, pin: ChannelSelect) -> bool {
        if beat >= self.song.length() as usize {
            return false;
        }

        let mut found = None;
        for ch in 0..CHANNELS {
            if self.song.cell(beat, ch).note == note && (found.is_none() || pin.index() == Some(ch)) {
                found = Some(ch);
            }
        }
        let Some(channel) = found else {
            return false;
        };

        self.record(UndoEntry::column_edit(&self.song, beat));
        self.song.write_cell(beat, channel, Cell::EMPTY);
        if pin == ChannelSelect::All {
            self.song.collapse_column(beat);
        }
        true
    }

    /// Overwrite a whole column inside the active length.
    pub fn set_column(&mut self, beat: usize, column: Column) -> bool {
        if beat >= self.song.length() as usize {
            return false;
        }
        self.record(UndoEntry::column_edit(&self.song, beat));
        self.song.write_column(beat, column);
        true
    }

    /// Set tempo, clamped to `[0, MAX_TEMPO]`.
    pub fn set_tempo(&mut self, tempo: i32) {
        self.record(UndoEntry::TempoChange { tempo: self.song.tempo });
        self.song.tempo = tempo.clamp(0, MAX_TEMPO as i32) as u8;
    }

    pub fn set_metre(&mut self, metre: Metre) {
        self.record(UndoEntry::MetreChange { metre: self.song.metre });
        self.song.metre = metre;
    }

    pub fn set_loop(&mut self, looping: bool) {
        self.record(UndoEntry::LoopChange { looping: self.song.looping });
        self.song.looping = looping;
    }

    /// Length tool: make `beats` the song length, clamped to `[1, limit]`.
    pub fn set_length(&mut self, beats: usize) -> bool {
        if beats < 1 {
            return false;
        }
        let length = beats.min(self.song.limit() as usize) as u16;
        self.record(UndoEntry::LengthChange { length: self.song.length() });
        self.song.set_length(length);
        true
    }

    /// Switch between standard and extended capacity.
    ///
    /// Dropping back to standard capacity truncates the length first, which
    /// is undoable; the capacity switch itself is not.
    pub fn toggle_limit(&mut self) {
        if self.song.is_extended() {
            if self.song.length() > BASE_LIMIT {
                self.record(UndoEntry::LengthChange { length: self.song.length() });
            }
            self.song.set_limit(BASE_LIMIT);
        } else {
            self.song.set_limit(MAX_LIMIT);
        }
    }

    /// Append a printable ASCII character to a text field.
    pub fn type_char(&mut self, field: TextField, c: char) -> bool {
        if !(' '..='~').contains(&c) {
            return false;
        }
        let len = self.text(field).len();
        if len >= TEXT_LEN {
            return false;
        }
        let entry = self.text_entry(field, len);
        self.record(entry);
        self.text_mut(field).push(c);
        true
    }

    /// Delete the last character of a text field.
    pub fn backspace(&mut self, field: TextField) -> bool {
        let len = self.text(field).len();
        if len == 0 {
            return false;
        }
        let entry = self.text_entry(field, len - 1);
        self.record(entry);
        self.text_mut(field).pop();
        true
    }

    fn text(&self, field: TextField) -> &str {
        match field {
            TextField::Title => self.song.title.as_str(),
            TextField::Author => self.song.author.as_str(),
        }
    }

    fn text_mut(&mut self, field: TextField) -> &mut crate::song::SongText {
        match field {
            TextField::Title => &mut self.song.title,
            TextField::Author => &mut self.song.author,
        }
    }

    fn text_entry(&self, field: TextField, pos: usize) -> UndoEntry {
        match field {
            TextField::Title => UndoEntry::title_edit(&self.song, pos),
            TextField::Author => UndoEntry::author_edit(&self.song, pos),
        }
    }

    /// Remove the column at `beat`, pulling later beats back.
    pub fn delete_column(&mut self, beat: usize) -> bool {
        if beat >= self.song.length() as usize {
            return false;
        }
        self.record(UndoEntry::before_delete(&self.song, beat));
        self.song.shift_out(beat);
        true
    }

    /// Insert `column` at `beat`, pushing later beats forward.
    ///
    /// At full capacity the last column moves past the window. The column
    /// pushed off the end of the grid is kept in the undo entry, so undo
    /// restores the grid exactly even if the capacity changed in between.
    pub fn insert_column(&mut self, beat: usize, column: Column) -> bool {
        if beat > self.song.length() as usize || beat >= self.song.limit() as usize {
            return false;
        }
        self.record(UndoEntry::before_insert(&self.song, beat));
        self.song.shift_in(beat, column);
        true
    }

    fn close_group(&mut self, count: usize) -> usize {
        if count > 0 {
            self.undo.push(UndoEntry::GroupMarker { count: count as u16 });
        }
        count
    }

    /// Blank every column in `first..=last` as one undoable action.
    pub fn erase_range(&mut self, first: usize, last: usize) -> usize {
        let count = (first..=last).filter(|&beat| self.set_column(beat, EMPTY_COLUMN)).count();
        self.close_group(count)
    }

    /// Remove `first..=last`, returning the removed columns for the clipboard.
    pub fn cut_range(&mut self, first: usize, last: usize) -> Vec<Column> {
        let clip = self.copy_range(first, last);
        let count = clip.iter().filter(|_| self.delete_column(first)).count();
        self.close_group(count);
        clip
    }

    /// Copy `first..=last` without changing anything.
    pub fn copy_range(&self, first: usize, last: usize) -> Vec<Column> {
        if last < first {
            return Vec::new();
        }
        (first..=last).map(|beat| self.song.column(beat)).collect()
    }

    /// Overwrite columns starting at `beat` as one undoable action.
    pub fn paste(&mut self, beat: usize, columns: &[Column]) -> usize {
        let count = columns
            .iter()
            .enumerate()
            .filter(|(i, col)| self.set_column(beat + i, **col))
            .count();
        self.close_group(count)
    }

    /// Insert columns starting at `beat` as one undoable action.
    pub fn paste_insert(&mut self, beat: usize, columns: &[Column]) -> usize {
        let count = columns
            .iter()
            .enumerate()
            .filter(|(i, col)| self.insert_column(beat + i, **col))
            .count();
        self.close_group(count)
    }
}
