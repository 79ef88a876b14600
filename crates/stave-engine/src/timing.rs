//! Tempo and sample-rate maths.
//!
//! Beat durations were measured against the original hardware at 32000 Hz.
//! The tempo byte behaves like an accumulator step of `14 + tempo` per video
//! frame, so one beat lasts `690892.8 / (14 + tempo)` reference samples.

/// Rate every sample in the bank is recorded at.
pub const REFERENCE_RATE: u32 = 32000;

/// Reference samples per beat at a tempo step of one.
pub const BEAT_NUMERATOR: f64 = 690892.8;

/// Offset added to the tempo byte to get the accumulator step.
pub const TEMPO_OFFSET: u32 = 14;

/// Samples per beat at `tempo` when rendering at `sample_rate`.
///
/// Never returns zero, so the scheduler always makes progress.
pub fn beat_length(tempo: u8, sample_rate: u32) -> u32 {
    let reference = BEAT_NUMERATOR / f64::from(TEMPO_OFFSET + u32::from(tempo));
    let samples = f64::from(sample_rate) * reference / f64::from(REFERENCE_RATE);
    (libm::round(samples) as u32).max(1)
}

/// 16.16 read-position step that plays reference-rate samples at `sample_rate`.
pub fn tuning(sample_rate: u32) -> u32 {
    let sample_rate = sample_rate.max(1);
    libm::round(65536.0 * f64::from(REFERENCE_RATE) / f64::from(sample_rate)) as u32
}
