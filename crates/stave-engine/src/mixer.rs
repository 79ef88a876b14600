//! Fixed voice set summed into one mono stream.

use stave_ir::CHANNELS;

use crate::sample_bank::SampleBank;
use crate::voice::Voice;

/// Mixer width is `1 << VOICE_POWER` voices.
pub const VOICE_POWER: u32 = 2;
/// Three score voices plus one preview voice.
pub const VOICES: usize = 1 << VOICE_POWER;
/// Voice reserved for single-note auditioning.
pub const PREVIEW_VOICE: usize = CHANNELS;

/// Sums every voice and divides by the voice count.
#[derive(Clone, Debug, Default)]
pub struct Mixer {
    voices: [Voice; VOICES],
}

impl Mixer {
    pub const fn new() -> Self {
        Self {
            voices: [Voice::new(); VOICES],
        }
    }

    /// Start a bank slot on one voice. Out-of-range voices are ignored.
    pub fn trigger(&mut self, voice: usize, sample: usize) {
        if let Some(v) = self.voices.get_mut(voice) {
            v.trigger(sample);
        }
    }

    /// Cut every voice.
    pub fn silence(&mut self) {
        for v in &mut self.voices {
            v.stop();
        }
    }

    pub fn voice(&self, index: usize) -> &Voice {
        &self.voices[index]
    }

    /// Mix one output sample.
    #[inline]
    pub fn mix(&mut self, bank: &SampleBank, tuning: u32) -> i16 {
        let sum: i32 = self.voices.iter_mut().map(|v| v.render(bank, tuning)).sum();
        (sum >> VOICE_POWER).clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    /// Mix into every slot of `out`.
    pub fn fill(&mut self, bank: &SampleBank, tuning: u32, out: &mut [i16]) {
        for slot in out {
            *slot = self.mix(bank, tuning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn averages_voices() {
        let bank = SampleBank::from_entries(vec![vec![400; 8], vec![-100; 8]]);
        let mut mixer = Mixer::new();
        mixer.trigger(0, 0);
        mixer.trigger(1, 0);
        mixer.trigger(PREVIEW_VOICE, 1);
        assert_eq!(mixer.mix(&bank, 0x10000), (400 + 400 - 100) / 4);
    }

    #[test]
    fn saturates_instead_of_wrapping() {
        let bank = SampleBank::from_entries(vec![vec![i16::MAX; 2048]]);
        let mut mixer = Mixer::new();
        for v in 0..VOICES {
            mixer.trigger(v, 0);
        }
        // Retriggering doubles each voice while the old sound fades.
        for v in 0..VOICES {
            mixer.trigger(v, 0);
        }
        assert_eq!(mixer.mix(&bank, 0x10000), i16::MAX);
    }

    #[test]
    fn silence_stops_everything() {
        let bank = SampleBank::from_entries(vec![vec![1000; 8]]);
        let mut mixer = Mixer::new();
        mixer.trigger(2, 0);
        mixer.silence();
        let mut out = [1i16; 4];
        mixer.fill(&bank, 0x10000, &mut out);
        assert_eq!(out, [0; 4]);
        assert!(!mixer.voice(2).is_active());
    }
}
