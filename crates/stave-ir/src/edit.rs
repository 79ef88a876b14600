//! Edit commands for mutating song data, possibly during playback.

use alloc::vec::Vec;

use crate::document::{Document, TextField};
use crate::song::{ChannelSelect, Column, Metre};

/// An undoable edit command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Edit {
    /// Place a note, pinned to a channel or on the first free one.
    SetNote {
        beat: u16,
        note: u8,
        instrument: u8,
        channel: ChannelSelect,
    },
    /// Remove a note from a beat.
    EraseNote {
        beat: u16,
        note: u8,
        channel: ChannelSelect,
    },
    SetTempo(i32),
    SetMetre(Metre),
    SetLength(u16),
    SetLoop(bool),
    TypeChar { field: TextField, c: char },
    Backspace(TextField),
    DeleteColumn(u16),
    InsertColumn { beat: u16, column: Column },
    /// Overwrite consecutive columns starting at `beat`.
    SetColumns { beat: u16, columns: Vec<Column> },
    /// Insert consecutive columns starting at `beat`.
    InsertColumns { beat: u16, columns: Vec<Column> },
    /// Blank the inclusive range `first..=last`.
    EraseColumns { first: u16, last: u16 },
    /// Remove the inclusive range `first..=last`.
    CutColumns { first: u16, last: u16 },
    ToggleLimit,
}

impl Document {
    /// Apply an edit. Returns false if it was rejected and nothing changed.
    pub fn apply(&mut self, edit: &Edit) -> bool {
        match edit {
            Edit::SetNote { beat, note, instrument, channel } => {
                self.set_note(*beat as usize, *note, *instrument, *channel).is_some()
            }
            Edit::EraseNote { beat, note, channel } => self.erase_note(*beat as usize, *note, *channel),
            Edit::SetTempo(tempo) => {
                self.set_tempo(*tempo);
                true
            }
            Edit::SetMetre(metre) => {
                self.set_metre(*metre);
                true
            }
            Edit::SetLength(beats) => self.set_length(*beats as usize),
            Edit::SetLoop(looping) => {
                self.set_loop(*looping);
                true
            }
            Edit::TypeChar { field, c } => self.type_char(*field, *c),
            Edit::Backspace(field) => self.backspace(*field),
            Edit::DeleteColumn(beat) => self.delete_column(*beat as usize),
            Edit::InsertColumn { beat, column } => self.insert_column(*beat as usize, *column),
            Edit::SetColumns { beat, columns } => self.paste(*beat as usize, columns) > 0,
            Edit::InsertColumns { beat, columns } => self.paste_insert(*beat as usize, columns) > 0,
            Edit::EraseColumns { first, last } => self.erase_range(*first as usize, *last as usize) > 0,
            Edit::CutColumns { first, last } => {
                !self.cut_range(*first as usize, *last as usize).is_empty()
            }
            Edit::ToggleLimit => {
                self.toggle_limit();
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::song::Cell;

    #[test]
    fn rejected_edit_leaves_log_alone() {
        let mut doc = Document::new();
        let applied = doc.apply(&Edit::SetNote {
            beat: 0,
            note: 0,
            instrument: 3,
            channel: ChannelSelect::All,
        });
        assert!(!applied);
        assert!(!doc.undo.can_undo());
    }

    #[test]
    fn apply_then_undo() {
        let mut doc = Document::new();
        assert!(doc.apply(&Edit::SetNote {
            beat: 10,
            note: 13,
            instrument: 14,
            channel: ChannelSelect::C,
        }));
        assert_eq!(doc.song.cell(10, 0), Cell::new(13, 14));
        doc.undo();
        assert_eq!(doc.song.cell(10, 0), Cell::EMPTY);
    }
}
