//! Wall-clock view of playback for the scrolling cursor.
//!
//! The engine counts beats in samples on the audio thread; the editor only
//! gets periodic `update(ms)` calls. The follow cursor re-derives the beat
//! from elapsed time so the view can scroll smoothly without reading the
//! engine every frame.

/// Sub-beat steps the view scrolls through per beat.
pub const FINE_STEPS: u32 = 32;

#[derive(Clone, Debug)]
pub struct Follow {
    beat: usize,
    /// Milliseconds into the current beat. Negative while output latency
    /// is still being waited out.
    pos_ms: f64,
    beat_len_ms: f64,
    tempo: u8,
    /// Milliseconds spent past the end of a non-looping song.
    end_ms: u32,
}

/// One beat length in milliseconds.
pub fn beat_ms(beat_samples: u32, sample_rate: u32) -> f64 {
    f64::from(beat_samples) * 1000.0 / f64::from(sample_rate.max(1))
}

impl Follow {
    pub fn new(beat: usize, tempo: u8, beat_len_ms: f64, latency_ms: u32) -> Self {
        Self {
            beat,
            pos_ms: -f64::from(latency_ms),
            beat_len_ms,
            tempo,
            end_ms: 0,
        }
    }

    pub fn beat(&self) -> usize {
        self.beat
    }

    pub fn tempo(&self) -> u8 {
        self.tempo
    }

    /// Rescale the position inside the beat to a new beat length.
    pub fn retempo(&mut self, tempo: u8, beat_len_ms: f64) {
        if self.pos_ms > 0.0 {
            self.pos_ms *= beat_len_ms / self.beat_len_ms;
        }
        self.tempo = tempo;
        self.beat_len_ms = beat_len_ms;
    }

    /// Advance by `ms`. Returns true once a non-looping song has been over
    /// for at least `end_stop_ms`.
    pub fn advance(&mut self, ms: u32, length: usize, looping: bool, end_stop_ms: u32) -> bool {
        self.pos_ms += f64::from(ms);
        if self.beat_len_ms > 0.0 {
            while self.pos_ms >= self.beat_len_ms {
                self.pos_ms -= self.beat_len_ms;
                self.beat += 1;
                if self.beat >= length {
                    self.beat = if looping { 0 } else { length };
                }
            }
        }

        if !looping && self.beat >= length {
            self.end_ms = self.end_ms.saturating_add(ms);
            return self.end_ms >= end_stop_ms;
        }
        false
    }

    /// Position inside the current beat in `0..FINE_STEPS`.
    pub fn fine(&self) -> u32 {
        if self.pos_ms <= 0.0 || self.beat_len_ms <= 0.0 {
            return 0;
        }
        ((f64::from(FINE_STEPS) * self.pos_ms / self.beat_len_ms) as u32).min(FINE_STEPS - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waits_out_latency() {
        let mut follow = Follow::new(0, 80, 100.0, 50);
        assert!(!follow.advance(40, 8, true, 2000));
        assert_eq!(follow.beat(), 0);
        assert_eq!(follow.fine(), 0);
        follow.advance(60, 8, true, 2000);
        assert_eq!(follow.beat(), 0);
        assert_eq!(follow.fine(), 16);
        follow.advance(100, 8, true, 2000);
        assert_eq!(follow.beat(), 1);
    }

    #[test]
    fn loops_back_to_start() {
        let mut follow = Follow::new(3, 80, 10.0, 0);
        follow.advance(10, 4, true, 2000);
        assert_eq!(follow.beat(), 0);
    }

    #[test]
    fn stops_after_grace_period() {
        let mut follow = Follow::new(3, 80, 10.0, 0);
        assert!(!follow.advance(10, 4, false, 100));
        assert_eq!(follow.beat(), 4);
        assert!(!follow.advance(50, 4, false, 100));
        assert!(follow.advance(50, 4, false, 100));
        assert_eq!(follow.beat(), 4);
    }

    #[test]
    fn retempo_keeps_phase() {
        let mut follow = Follow::new(0, 80, 100.0, 0);
        follow.advance(50, 8, true, 2000);
        assert_eq!(follow.fine(), 16);
        follow.retempo(100, 50.0);
        assert_eq!(follow.fine(), 16);
        assert_eq!(follow.tempo(), 100);
    }

    #[test]
    fn beat_length_in_ms() {
        assert_eq!(beat_ms(32000, 32000), 1000.0);
        assert_eq!(beat_ms(16000, 32000), 500.0);
    }
}
