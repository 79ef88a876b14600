//! The document and player shared between the editor and the audio thread.

use std::sync::Arc;

use parking_lot::Mutex;
use stave_engine::{EditorSound, Player, SampleBank, EDITOR_INSTRUMENT};
use stave_ir::Document;

/// Song, undo history and player behind one lock.
///
/// The audio thread holds the lock for one [`Deck::render`] call at a time,
/// so every field the render path reads is stable for a whole block.
#[derive(Debug)]
pub struct Deck {
    pub doc: Document,
    pub player: Player,
}

pub type SharedDeck = Arc<Mutex<Deck>>;

impl Deck {
    pub fn new(bank: Arc<SampleBank>, sample_rate: u32) -> Self {
        Self {
            doc: Document::new(),
            player: Player::new(bank, sample_rate),
        }
    }

    pub fn shared(self) -> SharedDeck {
        Arc::new(Mutex::new(self))
    }

    /// Render the next block of mono output.
    pub fn render(&mut self, out: &mut [i16]) {
        self.player.render(&self.doc.song, out);
    }

    /// Sound an editor cue on the preview voice.
    pub fn cue(&mut self, sound: EditorSound) {
        self.player.play_note_immediate(sound.note(), EDITOR_INSTRUMENT);
    }
}
