//! Conversion between timeline seconds and buffer sample offsets.
//!
//! Playback and mixdown both derive what to play from [`plan_playback`], so a
//! clip sounds the same whether it is heard live, after a seek, or exported.

use crate::clip::Clip;

/// Segments shorter than this are not worth scheduling.
pub const NEGLIGIBLE_LENGTH: f64 = 1e-5;

/// Nearest whole sample for a duration in seconds.
#[inline]
pub fn seconds_to_samples(seconds: f64, sample_rate: f64) -> i64 {
    (seconds * sample_rate).round() as i64
}

/// Whole samples covering `seconds`, tolerant of float noise just above an
/// integer.
#[inline]
pub fn ceil_samples(seconds: f64, sample_rate: f64) -> i64 {
    let exact = seconds * sample_rate;
    let nearest = exact.round();
    if (exact - nearest).abs() < 1e-6 {
        nearest as i64
    } else {
        exact.ceil() as i64
    }
}

/// Snap a duration to the nearest whole sample.
#[inline]
pub fn quantize_seconds(seconds: f64, sample_rate: f64) -> f64 {
    seconds_to_samples(seconds, sample_rate) as f64 / sample_rate
}

/// Half-open frame range `[start, end)` inside a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleRange {
    pub start: usize,
    pub end: usize,
}

impl SampleRange {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// Frames `[start_samples, total - trim_end_samples)` clamped into the buffer.
///
/// The result always satisfies `start < end <= total`; `None` only for an
/// empty buffer.
pub fn clamp_range(start_samples: i64, trim_end_samples: i64, total: usize) -> Option<SampleRange> {
    if total == 0 {
        return None;
    }
    let total = total as i64;
    let start = start_samples.clamp(0, total - 1);
    let end = (total - trim_end_samples).clamp(start + 1, total);
    Some(SampleRange {
        start: start as usize,
        end: end as usize,
    })
}

/// What to play for one clip when playback starts at a timeline position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSpan {
    /// Seconds after the schedule base at which the clip starts sounding.
    pub delay: f64,
    /// Seconds into the buffer, re-derived from `range.start`.
    pub offset: f64,
    /// Seconds to play, re-derived from `range`.
    pub length: f64,
    pub range: SampleRange,
}

/// Per-clip sample math for starting playback at `from_time`.
///
/// Returns `None` when the clip has already finished by `from_time` or when
/// the playable remainder is negligible.
pub fn plan_playback(clip: &Clip, from_time: f64) -> Option<PlaybackSpan> {
    if from_time >= clip.end_time() {
        return None;
    }

    let rate = clip.sample_rate() as f64;
    let play_offset = (from_time - clip.start_time).max(0.0);

    let start = seconds_to_samples(clip.offset, rate)
        + seconds_to_samples(clip.trim_start, rate)
        + seconds_to_samples(play_offset, rate);
    let trim_end = seconds_to_samples(clip.trim_end, rate);
    let range = clamp_range(start, trim_end, clip.audio.frames())?;

    let offset = range.start as f64 / rate;
    let length = range.len() as f64 / rate;
    if length < NEGLIGIBLE_LENGTH {
        return None;
    }

    Some(PlaybackSpan {
        delay: (clip.start_time - from_time).max(0.0),
        offset,
        length,
        range,
    })
}
