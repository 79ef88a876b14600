//! Playback engine for the stave sequencer.
//!
//! Walks a song's note grid beat by beat and mixes sample-bank voices into a
//! mono 16-bit stream.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod frame;
mod mixer;
mod player;
pub mod sample_bank;
pub mod scheduler;
pub mod timing;
mod voice;

pub use frame::Frame;
pub use mixer::{Mixer, PREVIEW_VOICE, VOICES};
pub use player::Player;
pub use sample_bank::{EditorSound, SampleBank, BANK_SIZE, EDITOR_INSTRUMENT};
pub use scheduler::BeatScheduler;
pub use timing::{beat_length, tuning, REFERENCE_RATE};
pub use voice::{Voice, FADE_LEN};
