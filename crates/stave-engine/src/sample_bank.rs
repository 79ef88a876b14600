//! Immutable table of PCM waveforms, one per (instrument, note).

use alloc::vec;
use alloc::vec::Vec;

use stave_ir::{INSTRUMENT_MAX, NOTE_MAX, NOTE_MIN};

use crate::timing::REFERENCE_RATE;

/// Score instruments in the table.
pub const INSTRUMENTS: usize = INSTRUMENT_MAX as usize + 1;
/// Pitches per instrument.
pub const NOTES: usize = NOTE_MAX as usize;
/// Editor feedback sounds stored after the score instruments.
pub const EDITOR_SOUNDS: usize = 8;
/// Total number of table entries.
pub const BANK_SIZE: usize = INSTRUMENTS * NOTES + EDITOR_SOUNDS;
/// Instrument number addressing the editor sounds.
pub const EDITOR_INSTRUMENT: u8 = INSTRUMENTS as u8;

/// Amplitude below which a sheet sample counts as silence.
const SILENCE_THRESHOLD: i16 = 26;
/// Consecutive silent samples that end an entry.
const SILENCE_GAP: usize = 3200;
/// Bursts this short are treated as noise.
const SPIKE_LEN: usize = 5;
/// Length of the linear fade appended to each entry.
pub const FADE_TAIL: usize = 400;

/// Sounds the editor plays for its own actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum EditorSound {
    Startup = 1,
    Click = 2,
    Erase = 3,
    Undo = 4,
    Clear = 5,
    LengthSelect = 6,
    Length = 7,
    Bomb = 8,
}

impl EditorSound {
    /// Note number under [`EDITOR_INSTRUMENT`].
    pub const fn note(self) -> u8 {
        self as u8
    }
}

/// Per-(instrument, note) PCM table at the reference rate.
#[derive(Clone, Debug, Default)]
pub struct SampleBank {
    samples: Vec<Vec<i16>>,
}

impl SampleBank {
    /// A bank where every entry is silent.
    pub fn empty() -> Self {
        Self {
            samples: vec![Vec::new(); BANK_SIZE],
        }
    }

    /// Build from entries in table order. Missing entries are silent; extras are dropped.
    pub fn from_entries(mut entries: Vec<Vec<i16>>) -> Self {
        entries.resize_with(BANK_SIZE, Vec::new);
        Self { samples: entries }
    }

    /// Table slot for a pair, or `None` if the pair addresses no sound.
    pub fn index(instrument: u8, note: u8) -> Option<usize> {
        if (NOTE_MIN..=NOTE_MAX).contains(&note) && instrument <= INSTRUMENT_MAX {
            Some(instrument as usize * NOTES + (note - NOTE_MIN) as usize)
        } else if instrument == EDITOR_INSTRUMENT && (1..=EDITOR_SOUNDS as u8).contains(&note) {
            Some(INSTRUMENTS * NOTES + (note - 1) as usize)
        } else {
            None
        }
    }

    /// PCM for a table slot.
    pub fn get(&self, index: usize) -> &[i16] {
        self.samples.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// PCM for a pair, if the pair addresses a sound.
    pub fn lookup(&self, instrument: u8, note: u8) -> Option<&[i16]> {
        Self::index(instrument, note).map(|i| self.get(i))
    }

    /// Number of entries holding audio.
    pub fn loaded(&self) -> usize {
        self.samples.iter().filter(|s| !s.is_empty()).count()
    }

    /// Split a silence-separated sample sheet into table entries.
    ///
    /// Entries are taken in order: all 13 notes of instrument 0, then
    /// instrument 1, and so on, then the editor sounds.
    pub fn from_sheet(pcm: &[i16]) -> Self {
        Self::from_entries(split_sheet(pcm))
    }

    /// Deterministic decaying tones for every entry.
    ///
    /// Used when no sample sheet is configured, and by tests.
    pub fn synthesized() -> Self {
        let mut entries = Vec::with_capacity(BANK_SIZE);
        for instrument in 0..INSTRUMENTS {
            for note in 0..NOTES {
                entries.push(synth_note(instrument, note));
            }
        }
        for sound in 0..EDITOR_SOUNDS {
            entries.push(synth_blip(sound));
        }
        Self::from_entries(entries)
    }
}

fn is_silent(s: i16) -> bool {
    s > -SILENCE_THRESHOLD && s < SILENCE_THRESHOLD
}

/// Split PCM on runs of silence.
pub fn split_sheet(pcm: &[i16]) -> Vec<Vec<i16>> {
    let mut entries = Vec::new();
    let mut start = 0;

    loop {
        while start < pcm.len() && is_silent(pcm[start]) {
            start += 1;
        }
        if start >= pcm.len() {
            break;
        }

        let mut silent = 0;
        let mut end = start + 1;
        while end < pcm.len() && silent < SILENCE_GAP {
            if is_silent(pcm[end]) {
                silent += 1;
            } else {
                silent = 0;
            }
            end += 1;
        }
        end -= silent;

        if end - start <= SPIKE_LEN {
            start = end;
            continue;
        }

        end += FADE_TAIL;
        let mut entry = pcm[start..end.min(pcm.len())].to_vec();
        apply_fade_tail(&mut entry);
        entries.push(entry);
        start = end;
    }

    entries
}

/// Ramp the last `FADE_TAIL` samples linearly down to zero.
pub fn apply_fade_tail(pcm: &mut [i16]) {
    let tail = FADE_TAIL.min(pcm.len());
    let len = pcm.len();
    for i in 0..tail {
        let p = len - (i + 1);
        pcm[p] = (i as i32 * pcm[p] as i32 / FADE_TAIL as i32) as i16;
    }
}

/// Semitone offset of each staff position above the lowest note (B3).
const STAFF_SEMITONES: [u8; NOTES] = [0, 1, 3, 5, 6, 8, 10, 12, 13, 15, 17, 18, 20];
const LOWEST_HZ: f32 = 246.94;
const SYNTH_AMPLITUDE: f32 = 7000.0;

fn synth_note(instrument: usize, note: usize) -> Vec<i16> {
    let hz = LOWEST_HZ * libm::powf(2.0, STAFF_SEMITONES[note] as f32 / 12.0);
    let decay = 3.0 + (instrument % 5) as f32 * 1.5;
    let len = REFERENCE_RATE as usize / 2;
    render_tone(len, hz, decay, instrument % 4)
}

fn synth_blip(sound: usize) -> Vec<i16> {
    let hz = 880.0 + sound as f32 * 110.0;
    render_tone(REFERENCE_RATE as usize / 10, hz, 30.0, sound % 2)
}

fn render_tone(len: usize, hz: f32, decay: f32, shape: usize) -> Vec<i16> {
    let rate = REFERENCE_RATE as f32;
    let mut pcm: Vec<i16> = (0..len)
        .map(|i| {
            let t = i as f32 / rate;
            let phase = libm::fmodf(t * hz, 1.0);
            let wave = match shape {
                0 => libm::sinf(phase * core::f32::consts::TAU),
                1 => if phase < 0.5 { 0.6 } else { -0.6 },
                2 => 1.0 - 4.0 * libm::fabsf(phase - 0.5),
                _ => 2.0 * phase - 1.0,
            };
            (SYNTH_AMPLITUDE * libm::expf(-t * decay) * wave) as i16
        })
        .collect();
    apply_fade_tail(&mut pcm);
    pcm
}
