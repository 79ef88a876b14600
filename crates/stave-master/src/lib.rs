//! Editor controller for the stave sequencer.
//!
//! Owns the shared [`Deck`], the editor-only state (tool, channel pin, view,
//! selection, clipboard) and the audio thread, and maps each [`Command`] onto
//! undo-aware document edits and transport calls. Both the CLI and any
//! front end drive the editor through this one API.

mod audio;
mod config;
mod deck;
mod follow;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use stave_audio::AudioError;
use stave_engine::{EditorSound, SampleBank};
use stave_formats::LoadedSong;
use stave_ir::{Edit, INSTRUMENT_MAX};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::audio::AudioHandle;
use crate::follow::Follow;

pub use config::{ConfigError, Settings};
pub use deck::{Deck, SharedDeck};
pub use follow::FINE_STEPS;
pub use stave_formats::{FormatError, SaveKind};
pub use stave_ir::{ChannelSelect, Column, Document, Metre, Song, TextField};

/// Columns kept in view to the right of the scroll position.
const VIEW_TAIL: usize = 4;
/// Placing a note in this view column scrolls the view on by one.
const LAST_VIEW_COLUMN: usize = 5;
/// Note previewed when an instrument is picked.
const PICK_NOTE: u8 = 5;

/// Error type for controller operations.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Audio thread exited before the device opened.")]
    AudioThread,
    #[error("No file name yet. Save with a file name first.")]
    NoFile,
    #[error("You have unsaved changes.")]
    UnsavedChanges,
}

/// What a click on the grid does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    /// Place notes with this instrument.
    Instrument(u8),
    /// Set the song length to the clicked beat.
    Length,
    Eraser,
}

/// Every editor action.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    SelectInstrument(u8),
    SelectLengthTool,
    SelectEraser,
    CycleChannel,
    SelectChannel(ChannelSelect),
    /// Click the grid at `beat`, on the row of `note`.
    Click { beat: usize, note: u8 },
    /// While set, clicks audition the column instead of editing.
    SetListen(bool),
    /// While set, clicks erase whatever the tool.
    SetEraseOverride(bool),
    TempoUp,
    TempoDown,
    SetTempo(i32),
    SetMetre(Metre),
    ToggleMetre,
    ToggleLoop,
    TypeChar(TextField, char),
    Backspace(TextField),
    SelectLeft(usize),
    SelectRight(usize),
    SelectClear,
    SelectErase,
    SelectCut,
    SelectCopy,
    /// Overwrite from `beat` with the clipboard.
    Paste(usize),
    /// Insert the clipboard at `beat`.
    PasteInsert(usize),
    Undo,
    Play,
    PlayFromView,
    Stop,
    Scroll(i64),
    SetScroll(usize),
    ToggleLimit,
    Clear,
    Load { path: PathBuf, discard_changes: bool },
    Save(PathBuf),
    QuickSave,
    MultiSave(PathBuf),
    Quit { discard_changes: bool },
}

/// Result of a successful command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Done,
    /// A loaded file had errors that were repaired.
    Corrected,
    Saved(SaveKind),
    /// Files written by a multi-save.
    Written(Vec<PathBuf>),
}

/// Headless editor: one document, its player and the editing state.
pub struct Controller {
    deck: SharedDeck,
    bank: Arc<SampleBank>,
    settings: Settings,
    tool: Tool,
    channel: ChannelSelect,
    listen: bool,
    erase_override: bool,
    scroll: usize,
    fine: u32,
    selection: Option<(usize, usize)>,
    clipboard: Vec<Column>,
    follow: Option<Follow>,
    current_file: Option<PathBuf>,
    audio: Option<AudioHandle>,
}

impl Controller {
    /// Create a controller, loading the configured sample sheet.
    pub fn new(settings: Settings) -> Result<Self, ControllerError> {
        let bank = match &settings.sample_sheet {
            Some(path) => stave_formats::load_sample_sheet(path)?,
            None => {
                debug!("no sample sheet configured, using synthesized bank");
                SampleBank::synthesized()
            }
        };
        Ok(Self::with_bank(settings, Arc::new(bank)))
    }

    /// Create a controller around an existing bank.
    pub fn with_bank(settings: Settings, bank: Arc<SampleBank>) -> Self {
        let mut deck = Deck::new(bank.clone(), settings.sample_rate);
        deck.cue(EditorSound::Startup);
        Self {
            deck: deck.shared(),
            bank,
            settings,
            tool: Tool::Instrument(0),
            channel: ChannelSelect::All,
            listen: false,
            erase_override: false,
            scroll: 0,
            fine: 0,
            selection: None,
            clipboard: Vec::new(),
            follow: None,
            current_file: None,
            audio: None,
        }
    }

    /// Open the output device and start the audio thread. Returns the
    /// device rate.
    pub fn start_audio(&mut self) -> Result<u32, ControllerError> {
        if let Some(audio) = &self.audio {
            return Ok(audio.sample_rate());
        }
        let audio = AudioHandle::spawn(self.deck.clone(), self.settings.sample_rate, self.settings.latency_ms)?;
        let rate = audio.sample_rate();
        if rate != self.settings.sample_rate {
            warn!(requested = self.settings.sample_rate, rate, "device rate differs from configured rate");
        }
        self.audio = Some(audio);
        Ok(rate)
    }

    pub fn stop_audio(&mut self) {
        if let Some(mut audio) = self.audio.take() {
            audio.shutdown();
        }
    }

    /// The shared deck, for rendering without the audio thread.
    pub fn deck(&self) -> SharedDeck {
        self.deck.clone()
    }

    /// Run `f` against the current document.
    pub fn with_document<R>(&self, f: impl FnOnce(&Document) -> R) -> R {
        f(&self.deck.lock().doc)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn channel(&self) -> ChannelSelect {
        self.channel
    }

    /// First beat in view.
    pub fn scroll(&self) -> usize {
        self.scroll
    }

    /// Sub-beat scroll offset while following playback, in `0..FINE_STEPS`.
    pub fn scroll_fine(&self) -> u32 {
        self.fine
    }

    /// Selected beats as `(first, last)`, if any.
    pub fn selection(&self) -> Option<(usize, usize)> {
        self.selection.filter(|(left, right)| left <= right)
    }

    pub fn clipboard(&self) -> &[Column] {
        &self.clipboard
    }

    /// Whether the view is following playback.
    pub fn is_playing(&self) -> bool {
        self.follow.is_some()
    }

    /// Beat under the follow cursor.
    pub fn playback_beat(&self) -> Option<usize> {
        self.follow.as_ref().map(Follow::beat)
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.deck.lock().doc.song.dirty
    }

    /// Apply one editor action.
    pub fn execute(&mut self, command: Command) -> Result<Outcome, ControllerError> {
        debug!(?command, "execute");
        match command {
            Command::SelectInstrument(instrument) => {
                let instrument = instrument.min(INSTRUMENT_MAX);
                self.tool = Tool::Instrument(instrument);
                self.deck.lock().player.play_note_immediate(PICK_NOTE, instrument);
            }
            Command::SelectLengthTool => {
                self.tool = Tool::Length;
                self.cue(EditorSound::LengthSelect);
            }
            Command::SelectEraser => {
                self.tool = Tool::Eraser;
                self.cue(EditorSound::Click);
            }
            Command::CycleChannel => {
                self.channel = self.channel.next();
                self.cue(EditorSound::Click);
            }
            Command::SelectChannel(channel) => self.channel = channel,
            Command::Click { beat, note } => self.click(beat, note),
            Command::SetListen(on) => self.listen = on,
            Command::SetEraseOverride(on) => self.erase_override = on,
            Command::TempoUp => {
                let tempo = self.with_document(|doc| doc.song.tempo);
                self.apply(Edit::SetTempo(i32::from(tempo) + 1));
            }
            Command::TempoDown => {
                let tempo = self.with_document(|doc| doc.song.tempo);
                self.apply(Edit::SetTempo(i32::from(tempo) - 1));
            }
            Command::SetTempo(tempo) => {
                self.apply(Edit::SetTempo(tempo));
            }
            Command::SetMetre(metre) => {
                self.apply(Edit::SetMetre(metre));
                self.cue(EditorSound::Click);
            }
            Command::ToggleMetre => {
                let metre = self.with_document(|doc| doc.song.metre.toggled());
                self.apply(Edit::SetMetre(metre));
                self.cue(EditorSound::Click);
            }
            Command::ToggleLoop => {
                let looping = self.with_document(|doc| doc.song.looping);
                self.apply(Edit::SetLoop(!looping));
                self.cue(EditorSound::Click);
            }
            Command::TypeChar(field, c) => {
                self.apply(Edit::TypeChar { field, c });
            }
            Command::Backspace(field) => {
                self.apply(Edit::Backspace(field));
            }
            Command::SelectLeft(beat) => self.select(beat, true),
            Command::SelectRight(beat) => self.select(beat, false),
            Command::SelectClear => self.selection = None,
            Command::SelectErase => {
                if let Some((first, last)) = self.selection() {
                    self.apply(Edit::EraseColumns { first: first as u16, last: last as u16 });
                }
            }
            Command::SelectCut => {
                if let Some((first, last)) = self.selection() {
                    self.clipboard = self.with_document(|doc| doc.copy_range(first, last));
                    self.apply(Edit::CutColumns { first: first as u16, last: last as u16 });
                }
            }
            Command::SelectCopy => {
                if let Some((first, last)) = self.selection() {
                    self.clipboard = self.with_document(|doc| doc.copy_range(first, last));
                }
            }
            Command::Paste(beat) => {
                if self.in_capacity(beat) {
                    let columns = self.clipboard.clone();
                    self.apply(Edit::SetColumns { beat: beat as u16, columns });
                }
            }
            Command::PasteInsert(beat) => {
                if self.in_capacity(beat) {
                    let columns = self.clipboard.clone();
                    self.apply(Edit::InsertColumns { beat: beat as u16, columns });
                }
            }
            Command::Undo => {
                let mut deck = self.deck.lock();
                deck.cue(EditorSound::Undo);
                deck.doc.undo();
            }
            Command::Play => self.begin_play(true),
            Command::PlayFromView => self.begin_play(false),
            Command::Stop => self.stop(),
            Command::Scroll(delta) => self.set_scroll(self.scroll as i64 + delta),
            Command::SetScroll(beat) => self.set_scroll(beat as i64),
            Command::ToggleLimit => {
                self.apply(Edit::ToggleLimit);
                self.set_scroll(self.scroll as i64);
            }
            Command::Clear => self.clear(),
            Command::Load { path, discard_changes } => return self.load(&path, discard_changes),
            Command::Save(path) => return self.save(path),
            Command::QuickSave => {
                let path = self.current_file.clone().ok_or(ControllerError::NoFile)?;
                return self.save(path);
            }
            Command::MultiSave(path) => return self.multi_save(&path),
            Command::Quit { discard_changes } => {
                if self.is_dirty() && !discard_changes {
                    return Err(ControllerError::UnsavedChanges);
                }
                self.stop();
                self.cue(EditorSound::Bomb);
            }
        }
        Ok(Outcome::Done)
    }

    /// Advance the follow cursor by `ms` of wall-clock time.
    ///
    /// Picks up tempo edits made during playback and stops transport once a
    /// non-looping song has been over for the configured grace period.
    pub fn update(&mut self, ms: u32) {
        let Some(follow) = self.follow.as_mut() else {
            return;
        };

        let (finished, length, limit) = {
            let mut guard = self.deck.lock();
            let deck = &mut *guard;
            let tempo = deck.doc.song.tempo;
            if tempo != follow.tempo() {
                deck.player.apply_tempo(tempo);
                let beat_len_ms = follow::beat_ms(deck.player.beat_length(), deck.player.sample_rate());
                follow.retempo(tempo, beat_len_ms);
            }
            let song = &deck.doc.song;
            let finished = follow.advance(ms, song.length() as usize, song.looping, self.settings.end_stop_ms);
            (finished, song.length() as usize, song.limit() as usize)
        };

        if follow.beat() + VIEW_TAIL >= length {
            self.scroll = clamp_scroll(length as i64 - VIEW_TAIL as i64, limit);
            self.fine = 0;
        } else {
            self.scroll = clamp_scroll(follow.beat() as i64, limit);
            self.fine = follow.fine();
        }

        if finished {
            debug!("end of song, stopping");
            self.stop();
        }
    }

    fn cue(&self, sound: EditorSound) {
        self.deck.lock().cue(sound);
    }

    fn apply(&self, edit: Edit) -> bool {
        self.deck.lock().doc.apply(&edit)
    }

    fn in_capacity(&self, beat: usize) -> bool {
        beat < self.with_document(|doc| doc.song.limit() as usize)
    }

    fn set_scroll(&mut self, beat: i64) {
        let limit = self.with_document(|doc| doc.song.limit() as usize);
        self.scroll = clamp_scroll(beat, limit);
    }

    fn select(&mut self, beat: usize, left: bool) {
        if !self.in_capacity(beat) {
            return;
        }
        self.selection = Some(match (self.selection, left) {
            (Some((_, right)), true) => (beat, right),
            (Some((left, _)), false) => (left, beat),
            (None, _) => (beat, beat),
        });
    }

    fn click(&mut self, beat: usize, note: u8) {
        if self.follow.is_some() {
            self.stop();
            return;
        }

        let mut guard = self.deck.lock();
        let deck = &mut *guard;

        if self.listen {
            deck.player.play_beat_immediate(&deck.doc.song, beat as i64);
            return;
        }
        if self.tool == Tool::Length {
            if deck.doc.apply(&Edit::SetLength(beat.min(u16::MAX as usize) as u16)) {
                deck.cue(EditorSound::Length);
            }
            return;
        }
        if beat >= deck.doc.song.length() as usize {
            return;
        }
        match self.tool {
            _ if self.erase_override || self.tool == Tool::Eraser => {
                let erase = Edit::EraseNote { beat: beat as u16, note, channel: self.channel };
                if deck.doc.apply(&erase) {
                    deck.cue(EditorSound::Erase);
                }
            }
            Tool::Instrument(instrument) => {
                deck.player.play_note_immediate(note, instrument);
                let place = Edit::SetNote { beat: beat as u16, note, instrument, channel: self.channel };
                if deck.doc.apply(&place) && beat == self.scroll + LAST_VIEW_COLUMN {
                    self.scroll = clamp_scroll(self.scroll as i64 + 1, deck.doc.song.limit() as usize);
                }
            }
            Tool::Length | Tool::Eraser => {}
        }
    }

    fn begin_play(&mut self, from_start: bool) {
        let mut guard = self.deck.lock();
        let deck = &mut *guard;
        let length = deck.doc.song.length() as usize;

        if from_start {
            self.scroll = 0;
        } else if self.scroll >= length {
            self.scroll = length.saturating_sub(1);
        }
        let from = self.scroll;

        deck.player.play(&deck.doc.song, from);
        let beat_len_ms = follow::beat_ms(deck.player.beat_length(), deck.player.sample_rate());
        self.follow = Some(Follow::new(from, deck.doc.song.tempo, beat_len_ms, self.settings.latency_ms));
        self.fine = 0;
        info!(from, tempo = deck.doc.song.tempo, "play");
    }

    fn stop(&mut self) {
        self.deck.lock().player.stop();
        self.follow = None;
        self.fine = 0;
    }

    fn clear(&mut self) {
        self.stop();
        let mut deck = self.deck.lock();
        deck.cue(EditorSound::Clear);
        deck.doc.clear();
        drop(deck);

        self.selection = None;
        self.clipboard.clear();
        self.scroll = 0;
        self.current_file = None;
        info!("song cleared");
    }

    fn load(&mut self, path: &Path, discard_changes: bool) -> Result<Outcome, ControllerError> {
        self.cue(EditorSound::Click);
        if self.is_dirty() && !discard_changes {
            return Err(ControllerError::UnsavedChanges);
        }

        let LoadedSong { song, corrected } = stave_formats::load_song(path)?;
        self.stop();
        self.deck.lock().doc.replace(song, corrected);
        self.scroll = 0;
        self.current_file = Some(path.to_path_buf());

        if corrected {
            warn!(path = %path.display(), "errors in file were corrected");
            Ok(Outcome::Corrected)
        } else {
            Ok(Outcome::Done)
        }
    }

    fn save(&mut self, path: PathBuf) -> Result<Outcome, ControllerError> {
        self.stop();
        self.cue(EditorSound::Click);

        let song = self.with_document(|doc| doc.song.clone());
        let kind = stave_formats::save_song(&path, &song, &self.bank, self.settings.export_rate)?;
        if kind == SaveKind::Song {
            self.deck.lock().doc.mark_saved();
        }
        self.current_file = Some(path);
        Ok(Outcome::Saved(kind))
    }

    fn multi_save(&mut self, path: &Path) -> Result<Outcome, ControllerError> {
        self.stop();
        self.cue(EditorSound::Click);

        let song = self.with_document(|doc| doc.song.clone());
        let written = stave_formats::save_multi(path, &song)?;
        Ok(Outcome::Written(written))
    }
}

fn clamp_scroll(beat: i64, limit: usize) -> usize {
    beat.clamp(0, limit.saturating_sub(VIEW_TAIL) as i64) as usize
}
