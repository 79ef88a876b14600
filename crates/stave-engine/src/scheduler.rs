//! Beat scheduling: when the next column fires and which one it is.

/// Counts samples down to the next beat and walks the grid one column at a time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BeatScheduler {
    playing: bool,
    /// Next column to fire.
    beat: usize,
    /// Samples left before `beat` fires.
    countdown: u32,
    /// Samples per beat, at least 1.
    beat_len: u32,
}

impl Default for BeatScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BeatScheduler {
    pub const fn new() -> Self {
        Self {
            playing: false,
            beat: 0,
            countdown: 0,
            beat_len: 1,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn beat(&self) -> usize {
        self.beat
    }

    pub fn beat_len(&self) -> u32 {
        self.beat_len
    }

    /// Samples left before the next beat fires.
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Change the beat duration without touching the current countdown.
    pub fn set_beat_len(&mut self, beat_len: u32) {
        self.beat_len = beat_len.max(1);
    }

    /// Begin playing at `beat`; the first beat fires immediately.
    pub fn start(&mut self, beat: usize) {
        self.playing = true;
        self.beat = beat;
        self.countdown = 0;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    /// Move to `beat`, clamped to `[0, length]`. Does not fire anything.
    pub fn seek(&mut self, beat: i64, length: usize) {
        self.beat = beat.clamp(0, length as i64) as usize;
    }

    /// How many samples can be mixed before the next beat, out of `remaining`.
    ///
    /// Consumes that much of the countdown. Returns `remaining` when stopped.
    pub fn run_length(&mut self, remaining: usize) -> usize {
        if !self.playing {
            return remaining;
        }
        let countdown = self.countdown as usize;
        if countdown >= remaining {
            self.countdown -= remaining as u32;
            remaining
        } else {
            self.countdown = 0;
            countdown
        }
    }

    /// True when playing and the countdown has run out.
    pub fn is_due(&self) -> bool {
        self.playing && self.countdown == 0
    }

    /// Fire the due beat.
    ///
    /// Returns the column to trigger, if any, then advances: past the last
    /// column it wraps to 0 when `looping`, else it stops with the beat index
    /// left at `length`. The countdown is rearmed either way.
    pub fn fire(&mut self, length: usize, looping: bool) -> Option<usize> {
        self.countdown = self.countdown.saturating_add(self.beat_len);
        if !self.playing {
            return None;
        }

        if self.beat >= length {
            if looping && length > 0 {
                self.beat = 0;
            } else {
                self.beat = length;
                self.playing = false;
                return None;
            }
        }

        let column = self.beat;
        self.beat += 1;
        if self.beat >= length {
            if looping {
                self.beat = 0;
            } else {
                self.playing = false;
            }
        }
        Some(column)
    }
}
