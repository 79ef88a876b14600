//! Core song types for the stave sequencer.
//!
//! This crate defines the note grid, its undo log and the undo-aware edit
//! primitives. Codecs produce a [`Song`], the engine reads one, and the
//! editor mutates one through a [`Document`].
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod document;
mod edit;
pub mod song;
pub mod undo;

pub use document::{Document, TextField};
pub use edit::Edit;
pub use song::{
    column_from_bytes, column_to_bytes, text_from_bytes, text_to_bytes, Cell, ChannelSelect,
    Column, Metre, Song, SongText, BASE_LIMIT, CHANNELS, DEFAULT_TEMPO, EMPTY_COLUMN, EXTRA_SIZE,
    INSTRUMENT_MAX, MAX_LIMIT, MAX_TEMPO, NOTE_MAX, NOTE_MIN, SENTINEL_INSTRUMENT, SENTINEL_NOTE,
    TEXT_LEN,
};
pub use undo::{UndoEntry, UndoLog, UndoOutcome, UNDO_CAPACITY};
