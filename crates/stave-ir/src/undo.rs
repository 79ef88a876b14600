//! Fixed-capacity circular undo log.
//!
//! Every mutation of a [`Song`] records one [`UndoEntry`] holding the
//! pre-mutation state it touched. Undo walks the ring backward from `head`
//! until it meets the [`UndoEntry::ClearMarker`], which is never overwritten:
//! when the ring wraps onto it, the marker moves one slot forward.

use alloc::vec;
use alloc::vec::Vec;

use crate::song::{Column, Metre, Song, SongText, MAX_LIMIT};

/// Number of slots in the ring.
pub const UNDO_CAPACITY: usize = 2048;

/// One reversible delta against a song.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UndoEntry {
    /// Unused slot.
    #[default]
    Empty,
    /// Origin of the log; undo stops here.
    ClearMarker,
    /// A column was overwritten; restore its previous contents.
    ColumnEdit { beat: u16, column: Column },
    TempoChange { tempo: u8 },
    MetreChange { metre: Metre },
    LengthChange { length: u16 },
    LoopChange { looping: bool },
    /// Title bytes at `pos` and `pos + 1` before a keystroke (0 = end of text).
    TitleEdit { pos: u8, prev: [u8; 2] },
    AuthorEdit { pos: u8, prev: [u8; 2] },
    /// A column was inserted at `beat`; undo removes it, puts `displaced`
    /// back at the end of the grid and regrows the length if the insert
    /// happened at full capacity.
    DeleteColumn { beat: u16, displaced: Column, regrow: bool },
    /// A column was deleted at `beat`; undo inserts `column` back.
    InsertColumn { beat: u16, column: Column },
    /// The previous `count` entries form one user action.
    GroupMarker { count: u16 },
}

impl UndoEntry {
    /// Capture the column at `beat` before it is overwritten.
    pub fn column_edit(song: &Song, beat: usize) -> Self {
        UndoEntry::ColumnEdit {
            beat: beat as u16,
            column: song.column(beat),
        }
    }

    /// Capture what an insert at `beat` will push off the end of the grid.
    pub fn before_insert(song: &Song, beat: usize) -> Self {
        let last = MAX_LIMIT as usize - 1;
        UndoEntry::DeleteColumn {
            beat: beat as u16,
            displaced: song.column(last),
            regrow: song.length() == song.limit(),
        }
    }

    /// Capture the column a delete at `beat` will remove.
    pub fn before_delete(song: &Song, beat: usize) -> Self {
        UndoEntry::InsertColumn {
            beat: beat as u16,
            column: song.column(beat),
        }
    }

    /// Capture the title bytes a keystroke at `pos` will touch.
    pub fn title_edit(song: &Song, pos: usize) -> Self {
        UndoEntry::TitleEdit {
            pos: pos as u8,
            prev: text_pair(&song.title, pos),
        }
    }

    /// Capture the author bytes a keystroke at `pos` will touch.
    pub fn author_edit(song: &Song, pos: usize) -> Self {
        UndoEntry::AuthorEdit {
            pos: pos as u8,
            prev: text_pair(&song.author, pos),
        }
    }

    /// Apply the inverse of the recorded mutation.
    ///
    /// # Panics
    /// On `Empty` and `ClearMarker`, which carry no mutation; reaching them
    /// here means the log is corrupt.
    pub fn revert(&self, song: &mut Song) {
        match *self {
            UndoEntry::ColumnEdit { beat, column } => song.write_column(beat as usize, column),
            UndoEntry::TempoChange { tempo } => song.tempo = tempo,
            UndoEntry::MetreChange { metre } => song.metre = metre,
            UndoEntry::LengthChange { length } => song.restore_length(length),
            UndoEntry::LoopChange { looping } => song.looping = looping,
            UndoEntry::TitleEdit { pos, prev } => restore_text(&mut song.title, pos, prev),
            UndoEntry::AuthorEdit { pos, prev } => restore_text(&mut song.author, pos, prev),
            UndoEntry::DeleteColumn { beat, displaced, regrow } => {
                song.shift_out(beat as usize);
                song.write_column(MAX_LIMIT as usize - 1, displaced);
                if regrow && song.length() < song.limit() {
                    song.set_length(song.length() + 1);
                }
            }
            UndoEntry::InsertColumn { beat, column } => {
                song.shift_in(beat as usize, column);
            }
            UndoEntry::GroupMarker { .. } => {}
            UndoEntry::Empty | UndoEntry::ClearMarker => {
                panic!("undo log corrupt: cannot revert {:?}", self)
            }
        }
    }
}

fn text_pair(text: &SongText, pos: usize) -> [u8; 2] {
    let bytes = text.as_bytes();
    [
        bytes.get(pos).copied().unwrap_or(0),
        bytes.get(pos + 1).copied().unwrap_or(0),
    ]
}

fn restore_text(text: &mut SongText, pos: u8, prev: [u8; 2]) {
    let pos = pos as usize;
    if pos > text.len() {
        return;
    }
    text.truncate(pos);
    for &b in prev.iter().take_while(|&&b| b != 0) {
        let _ = text.try_push(b as char);
    }
}

/// Result of a single `undo` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UndoOutcome {
    /// One entry (or one group) was reverted.
    Reverted,
    /// `head` sits on the origin marker; nothing changed.
    AtOrigin,
}

/// Circular buffer of reversible deltas.
#[derive(Clone, Debug)]
pub struct UndoLog {
    slots: Vec<UndoEntry>,
    /// Index of the most recently pushed entry.
    head: usize,
    /// Index matching the last persisted state, if still reachable.
    savepoint: Option<usize>,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new()
    }
}

impl UndoLog {
    pub fn new() -> Self {
        Self::with_capacity(UNDO_CAPACITY)
    }

    /// Create a log with a custom ring size (at least two slots).
    pub fn with_capacity(capacity: usize) -> Self {
        let mut log = Self {
            slots: vec![UndoEntry::Empty; capacity.max(2)],
            head: 0,
            savepoint: Some(0),
        };
        log.reset(false);
        log
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn savepoint(&self) -> Option<usize> {
        self.savepoint
    }

    /// The entry `undo` would revert next.
    pub fn peek(&self) -> UndoEntry {
        self.slots[self.head]
    }

    /// True if `undo` would change the song.
    pub fn can_undo(&self) -> bool {
        self.peek() != UndoEntry::ClearMarker
    }

    /// True if the log sits exactly at the last persisted state.
    pub fn at_savepoint(&self) -> bool {
        self.savepoint == Some(self.head)
    }

    /// Start over from a fresh origin.
    ///
    /// A document whose load needed corrections can never be undone back to
    /// its on-disk bytes, so its savepoint starts unreachable.
    pub fn reset(&mut self, corrected: bool) {
        self.slots.fill(UndoEntry::Empty);
        self.slots[0] = UndoEntry::ClearMarker;
        self.head = 0;
        self.savepoint = if corrected { None } else { Some(0) };
    }

    /// Record the current position as the persisted state.
    pub fn mark_saved(&mut self) {
        self.savepoint = Some(self.head);
    }

    /// Append an entry, overwriting the oldest one when full.
    pub fn push(&mut self, entry: UndoEntry) {
        let capacity = self.slots.len();
        self.head = (self.head + 1) % capacity;

        if self.slots[self.head] == UndoEntry::ClearMarker {
            let next = (self.head + 1) % capacity;
            self.slots[next] = UndoEntry::ClearMarker;
            if self.savepoint == Some(next) {
                self.savepoint = None;
            }
        }
        if self.savepoint == Some(self.head) {
            self.savepoint = None;
        }

        self.slots[self.head] = entry;
    }

    /// Revert the entry at `head`; a group marker reverts its whole group.
    ///
    /// Sets `song.dirty` to whether the resulting position differs from the
    /// savepoint.
    ///
    /// # Panics
    /// If `head` points at an `Empty` slot, which means the ring is corrupt.
    pub fn undo(&mut self, song: &mut Song) -> UndoOutcome {
        let mut pending: usize = 1;
        let mut outcome = UndoOutcome::AtOrigin;

        while pending > 0 {
            pending -= 1;
            let entry = self.slots[self.head];
            match entry {
                UndoEntry::ClearMarker => break,
                UndoEntry::Empty => panic!("undo log corrupt: empty slot at head {}", self.head),
                UndoEntry::GroupMarker { count } => pending += count as usize,
                other => other.revert(song),
            }

            self.slots[self.head] = UndoEntry::Empty;
            self.head = (self.head + self.slots.len() - 1) % self.slots.len();
            song.dirty = !self.at_savepoint();
            outcome = UndoOutcome::Reverted;
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Cell;

    fn edit(song: &mut Song, log: &mut UndoLog, beat: usize, n: u8) {
        log.push(UndoEntry::column_edit(song, beat));
        song.write_cell(beat, 2, Cell::new(n, 0));
        song.dirty = true;
    }

    #[test]
    fn fresh_log_cannot_undo() {
        let mut song = Song::new();
        let mut log = UndoLog::new();
        assert!(!log.can_undo());
        assert_eq!(log.undo(&mut song), UndoOutcome::AtOrigin);
        assert_eq!(log.head(), 0);
    }

    #[test]
    fn undo_restores_column() {
        let mut song = Song::new();
        let before = song.clone();
        let mut log = UndoLog::new();
        edit(&mut song, &mut log, 4, 7);
        assert_eq!(log.undo(&mut song), UndoOutcome::Reverted);
        assert_eq!(song, before);
    }

    #[test]
    fn savepoint_tracks_dirty() {
        let mut song = Song::new();
        let mut log = UndoLog::new();
        edit(&mut song, &mut log, 0, 1);
        edit(&mut song, &mut log, 1, 2);
        log.mark_saved();
        edit(&mut song, &mut log, 2, 3);
        log.undo(&mut song);
        assert!(!song.dirty);
        log.undo(&mut song);
        assert!(song.dirty);
    }

    #[test]
    fn corrected_reset_has_no_savepoint() {
        let mut song = Song::new();
        let mut log = UndoLog::new();
        log.reset(true);
        edit(&mut song, &mut log, 0, 1);
        log.undo(&mut song);
        assert!(song.dirty);
    }

    #[test]
    fn pushing_onto_savepoint_invalidates_it() {
        let mut song = Song::new();
        let mut log = UndoLog::with_capacity(4);
        edit(&mut song, &mut log, 0, 1);
        log.mark_saved();
        log.undo(&mut song);
        assert!(song.dirty);
        edit(&mut song, &mut log, 0, 2);
        assert_eq!(log.savepoint(), None);
    }

    #[test]
    fn group_marker_undoes_whole_group() {
        let mut song = Song::new();
        let before = song.clone();
        let mut log = UndoLog::new();
        for beat in 0..5 {
            edit(&mut song, &mut log, beat, 9);
        }
        log.push(UndoEntry::GroupMarker { count: 5 });
        log.undo(&mut song);
        assert_eq!(log.head(), 0);
        assert_eq!(song.columns(), before.columns());
    }

    #[test]
    fn wraparound_keeps_capacity_minus_one() {
        let capacity = 8;
        let mut song = Song::new();
        let mut log = UndoLog::with_capacity(capacity);
        for i in 0..(capacity * 3 + 1) {
            edit(&mut song, &mut log, i % 90, (i % 13 + 1) as u8);
        }
        let mut undone = 0;
        while log.undo(&mut song) == UndoOutcome::Reverted {
            undone += 1;
        }
        assert_eq!(undone, capacity - 1);
        assert_eq!(log.peek(), UndoEntry::ClearMarker);
        let head = log.head();
        assert_eq!(log.undo(&mut song), UndoOutcome::AtOrigin);
        assert_eq!(log.head(), head);
    }

    #[test]
    fn text_edit_reverts_typed_and_deleted_chars() {
        let mut song = Song::new();
        let _ = song.title.try_push_str("ab");

        let typed = UndoEntry::title_edit(&song, 2);
        song.title.push('c');
        typed.revert(&mut song);
        assert_eq!(song.title.as_str(), "ab");

        let erased = UndoEntry::title_edit(&song, 1);
        song.title.pop();
        erased.revert(&mut song);
        assert_eq!(song.title.as_str(), "ab");
    }

    #[test]
    #[should_panic(expected = "undo log corrupt")]
    fn reverting_empty_is_a_defect() {
        let mut song = Song::new();
        UndoEntry::Empty.revert(&mut song);
    }
}
