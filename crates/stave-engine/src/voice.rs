//! Voice: one sampler slot with an anti-click fade slot.

use crate::sample_bank::SampleBank;

/// Fade length is `1 << FADE_POWER` samples.
pub const FADE_POWER: u32 = 10;
/// Samples over which a cut-off sound fades out.
pub const FADE_LEN: u32 = 1 << FADE_POWER;

/// A sample being read at a 16.16 fixed-point position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    /// Bank slot of the waveform.
    sample: u16,
    /// Read position (16.16 fixed-point).
    pos: u32,
}

/// A single voice producing audio from the sample bank.
///
/// Retriggering moves the sound that was playing into a secondary slot that
/// keeps running at a linearly falling weight for [`FADE_LEN`] samples, which
/// hides the click of cutting a waveform mid-cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Voice {
    primary: Option<Cursor>,
    fading: Option<Cursor>,
    /// Remaining weight of the fading slot, out of `FADE_LEN`.
    fade: u32,
}

impl Voice {
    pub const fn new() -> Self {
        Self {
            primary: None,
            fading: None,
            fade: 0,
        }
    }

    /// Is either slot still producing audio?
    pub fn is_active(&self) -> bool {
        self.primary.is_some() || self.fading.is_some()
    }

    /// Start the waveform in bank slot `sample` from position 0.
    pub fn trigger(&mut self, sample: usize) {
        self.fading = self.primary;
        self.fade = FADE_LEN;
        self.primary = Some(Cursor {
            sample: sample as u16,
            pos: 0,
        });
    }

    /// Cut both slots immediately.
    pub fn stop(&mut self) {
        self.primary = None;
        self.fading = None;
    }

    /// Produce one output sample and advance by `tuning`.
    #[inline]
    pub fn render(&mut self, bank: &SampleBank, tuning: u32) -> i32 {
        let Some(primary) = self.primary.as_mut() else {
            return 0;
        };

        let pcm = bank.get(primary.sample as usize);
        let index = (primary.pos >> 16) as usize;
        let Some(&value) = pcm.get(index) else {
            self.stop();
            return 0;
        };
        let mut output = value as i32;
        primary.pos = primary.pos.wrapping_add(tuning);

        if let Some(fading) = self.fading.as_mut() {
            let pcm = bank.get(fading.sample as usize);
            match pcm.get((fading.pos >> 16) as usize) {
                Some(&old) => {
                    output += (old as i32 * self.fade as i32) >> FADE_POWER;
                    fading.pos = fading.pos.wrapping_add(tuning);
                    self.fade -= 1;
                    if self.fade == 0 {
                        self.fading = None;
                    }
                }
                None => self.fading = None,
            }
        }

        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use alloc::vec::Vec;

    fn bank(entries: Vec<Vec<i16>>) -> SampleBank {
        SampleBank::from_entries(entries)
    }

    #[test]
    fn idle_voice_is_silent() {
        let bank = bank(vec![vec![100; 4]]);
        let mut v = Voice::new();
        assert_eq!(v.render(&bank, 0x10000), 0);
        assert!(!v.is_active());
    }

    #[test]
    fn plays_through_and_disables() {
        let bank = bank(vec![vec![1, 2, 3]]);
        let mut v = Voice::new();
        v.trigger(0);
        let out: Vec<i32> = (0..5).map(|_| v.render(&bank, 0x10000)).collect();
        assert_eq!(out, vec![1, 2, 3, 0, 0]);
        assert!(!v.is_active());
    }

    #[test]
    fn half_tuning_repeats_samples() {
        let bank = bank(vec![vec![10, 20]]);
        let mut v = Voice::new();
        v.trigger(0);
        let out: Vec<i32> = (0..4).map(|_| v.render(&bank, 0x8000)).collect();
        assert_eq!(out, vec![10, 10, 20, 20]);
    }

    #[test]
    fn retrigger_fades_previous_sound() {
        let bank = bank(vec![vec![1024; 4000], vec![0; 4000]]);
        let mut v = Voice::new();
        v.trigger(0);
        v.render(&bank, 0x10000);
        v.trigger(1);

        assert_eq!(v.render(&bank, 0x10000), 1024);
        assert_eq!(v.render(&bank, 0x10000), 1023);
        for _ in 2..FADE_LEN {
            v.render(&bank, 0x10000);
        }
        assert_eq!(v.render(&bank, 0x10000), 0);
        assert!(v.fading.is_none());
    }

    #[test]
    fn fading_slot_clears_when_exhausted() {
        let bank = bank(vec![vec![500; 2], vec![0; 100]]);
        let mut v = Voice::new();
        v.trigger(0);
        v.render(&bank, 0x10000);
        v.trigger(1);
        assert_eq!(v.render(&bank, 0x10000), 500);
        assert_eq!(v.render(&bank, 0x10000), 0);
        assert!(v.fading.is_none());
    }

    #[test]
    fn short_retrigger_ending_first_drops_the_fade() {
        let bank = bank(vec![vec![300; 4000], vec![5; 2]]);
        let mut v = Voice::new();
        v.trigger(0);
        v.trigger(1);
        for _ in 0..2 {
            v.render(&bank, 0x10000);
        }
        assert_eq!(v.render(&bank, 0x10000), 0);
        assert!(v.fading.is_none());
        assert!(!v.is_active());
    }

    #[test]
    fn stop_silences_both_slots() {
        let bank = bank(vec![vec![7; 100]]);
        let mut v = Voice::new();
        v.trigger(0);
        v.trigger(0);
        v.stop();
        assert_eq!(v.render(&bank, 0x10000), 0);
    }
}
