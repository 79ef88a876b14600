//! Playback engine: transport, previews and the real-time render loop.

use alloc::sync::Arc;
use stave_ir::{Song, CHANNELS};

use crate::mixer::{Mixer, PREVIEW_VOICE};
use crate::sample_bank::SampleBank;
use crate::scheduler::BeatScheduler;
use crate::timing::{self, REFERENCE_RATE};

/// Renders a [`Song`] through the sample bank.
///
/// The player never owns the song: every call that needs grid data borrows
/// it, so the caller decides how the document is shared with the audio
/// thread. [`Player::render`] does not allocate and always finishes in time
/// proportional to the buffer length.
#[derive(Clone, Debug)]
pub struct Player {
    bank: Arc<SampleBank>,
    mixer: Mixer,
    scheduler: BeatScheduler,
    sample_rate: u32,
    /// 16.16 read step locking playback to the reference rate.
    tuning: u32,
    /// Tempo the current beat length was derived from.
    tempo: u8,
}

impl Player {
    /// Create a stopped player at `sample_rate`.
    pub fn new(bank: Arc<SampleBank>, sample_rate: u32) -> Self {
        let mut player = Self {
            bank,
            mixer: Mixer::new(),
            scheduler: BeatScheduler::new(),
            sample_rate: REFERENCE_RATE,
            tuning: timing::tuning(REFERENCE_RATE),
            tempo: stave_ir::DEFAULT_TEMPO,
        };
        player.set_sample_rate(sample_rate);
        player
    }

    pub fn bank(&self) -> &SampleBank {
        &self.bank
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn tuning(&self) -> u32 {
        self.tuning
    }

    /// Samples per beat at the current tempo and rate.
    pub fn beat_length(&self) -> u32 {
        self.scheduler.beat_len()
    }

    /// Next beat the scheduler will fire.
    pub fn beat(&self) -> usize {
        self.scheduler.beat()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    /// Samples left before the next beat fires.
    pub fn samples_to_next_beat(&self) -> u32 {
        self.scheduler.countdown()
    }

    /// Change the output rate. Takes effect on the next rendered sample.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate.max(1);
        self.tuning = timing::tuning(self.sample_rate);
        self.scheduler
            .set_beat_len(timing::beat_length(self.tempo, self.sample_rate));
    }

    /// Cut every voice.
    pub fn silence(&mut self) {
        self.mixer.silence();
    }

    /// Start playback at `from_beat` with the song's tempo.
    pub fn play(&mut self, song: &Song, from_beat: usize) {
        self.silence();
        self.apply_tempo(song.tempo);
        self.scheduler.start(0);
        self.scheduler.seek(from_beat as i64, song.length() as usize);
    }

    /// Stop advancing beats. Voices already sounding ring out.
    pub fn stop(&mut self) {
        self.scheduler.stop();
    }

    /// Jump to `beat`, clamped to `[0, length]`, without firing it.
    pub fn seek(&mut self, song: &Song, beat: i64) {
        self.scheduler.seek(beat, song.length() as usize);
    }

    /// Recompute the beat length for `tempo`; the countdown in progress is kept.
    pub fn apply_tempo(&mut self, tempo: u8) {
        self.tempo = tempo;
        self.scheduler
            .set_beat_len(timing::beat_length(tempo, self.sample_rate));
    }

    /// Sound one pair on the preview voice, regardless of transport state.
    pub fn play_note_immediate(&mut self, note: u8, instrument: u8) {
        if let Some(sample) = SampleBank::index(instrument, note) {
            self.mixer.trigger(PREVIEW_VOICE, sample);
        }
    }

    /// Sound one column on the score voices, regardless of transport state.
    pub fn play_beat_immediate(&mut self, song: &Song, beat: i64) {
        if beat < 0 || beat >= i64::from(song.length()) {
            return;
        }
        self.trigger_column(song, beat as usize);
    }

    fn trigger_column(&mut self, song: &Song, beat: usize) {
        for channel in 0..CHANNELS {
            let cell = song.cell(beat, channel);
            if !cell.is_playable() {
                continue;
            }
            if let Some(sample) = SampleBank::index(cell.instrument, cell.note) {
                self.mixer.trigger(channel, sample);
            }
        }
    }

    /// Fill `out` with mono samples, firing beats as they come due.
    pub fn render(&mut self, song: &Song, out: &mut [i16]) {
        let length = song.length() as usize;
        let mut done = 0;

        while done < out.len() {
            let run = self.scheduler.run_length(out.len() - done);
            self.mixer
                .fill(&self.bank, self.tuning, &mut out[done..done + run]);
            done += run;

            while self.scheduler.is_due() {
                if let Some(beat) = self.scheduler.fire(length, song.looping) {
                    self.trigger_column(song, beat);
                }
            }
        }
    }
}
