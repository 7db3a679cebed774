//! Sample-accurate trim and split of a single clip.

use arranger_transport::{Clip, ClipId, TrackId, ceil_samples, seconds_to_samples};

/// Shortest audible span a trim may leave, in seconds.
pub const MIN_CLIP_DURATION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EditError {
    #[error("split point {at} s is not inside {clip}")]
    SplitOutsideClip { clip: ClipId, at: f64 },

    #[error("unknown {0}")]
    UnknownClip(ClipId),

    #[error("unknown {0}")]
    UnknownTrack(TrackId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrimSide {
    Start,
    End,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimOutcome {
    /// Change actually applied to the trim, after clamping and quantizing.
    pub applied_delta: f64,
    /// Whether the cached waveform was invalidated.
    pub waveform_stale: bool,
}

/// Move one trim handle by `delta` seconds; positive values remove more
/// audio from that side.
///
/// The new trim is clamped and snapped to whole samples of the clip's
/// buffer. The audible span never drops below `min_duration` (and never
/// below one sample). Trimming the start keeps the right edge fixed and
/// never moves `start_time` below 0; trimming the end keeps `start_time`.
pub fn trim_clip(clip: &mut Clip, side: TrimSide, delta: f64, min_duration: f64) -> TrimOutcome {
    let rate = clip.sample_rate() as f64;
    let total = seconds_to_samples(clip.original_duration, rate);
    let floor = ceil_samples(min_duration.max(0.0), rate).max(1);
    let trim_start = seconds_to_samples(clip.trim_start, rate);
    let trim_end = seconds_to_samples(clip.trim_end, rate);

    let (current, lower, upper) = match side {
        TrimSide::Start => {
            // start_time = right_edge - duration must stay >= 0
            let shortfall = clip.original_duration - clip.trim_end - clip.end_time();
            let lower = ceil_samples(shortfall, rate).max(0);
            (clip.trim_start, lower, total - trim_end - floor)
        }
        TrimSide::End => (clip.trim_end, 0, total - trim_start - floor),
    };

    if upper < lower {
        tracing::trace!(clip = %clip.id, ?side, "no room to trim");
        return TrimOutcome {
            applied_delta: 0.0,
            waveform_stale: false,
        };
    }

    let requested = seconds_to_samples(current + delta, rate).clamp(lower, upper);
    let trimmed = requested as f64 / rate;
    if trimmed == current {
        return TrimOutcome {
            applied_delta: 0.0,
            waveform_stale: false,
        };
    }

    match side {
        TrimSide::Start => {
            let right_edge = clip.end_time();
            clip.trim_start = trimmed;
            clip.duration = clip.original_duration - clip.trim_start - clip.trim_end;
            clip.start_time = (right_edge - clip.duration).max(0.0);
        }
        TrimSide::End => {
            clip.trim_end = trimmed;
            clip.duration = clip.original_duration - clip.trim_start - clip.trim_end;
        }
    }
    clip.mark_waveform_stale();

    TrimOutcome {
        applied_delta: trimmed - current,
        waveform_stale: true,
    }
}

/// Cut `clip` at timeline position `at`.
///
/// `clip` becomes the left part and keeps its id; the returned right part
/// carries `new_id`. Both reference the same buffer with the same offset.
/// Positions on or outside the clip's edges are rejected without touching
/// the clip.
pub fn split_clip(clip: &mut Clip, at: f64, new_id: ClipId) -> Result<Clip, EditError> {
    if !clip.contains_strictly(at) {
        return Err(EditError::SplitOutsideClip { clip: clip.id, at });
    }

    let (left_duration, right_duration) = split_duration(clip.duration, at - clip.start_time);

    let mut right = clip.clone();
    right.id = new_id;
    right.start_time = at;
    right.duration = right_duration;
    right.trim_start += left_duration;
    right.mark_waveform_stale();

    clip.duration = left_duration;
    clip.trim_end += right_duration;
    clip.mark_waveform_stale();

    Ok(right)
}

/// Two parts of `total` whose float sum is exactly `total`, the first as
/// close to `first` as that allows.
///
/// The larger part is `total` minus the smaller one, so it is at least
/// `total / 2` and subtracting it back from `total` is exact.
fn split_duration(total: f64, first: f64) -> (f64, f64) {
    let second = total - first;
    let larger = total - first.min(second);
    let smaller = total - larger;
    if first <= second {
        (smaller, larger)
    } else {
        (larger, smaller)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arranger_transport::AudioArc;

    fn clip(seconds: f64, start_time: f64) -> Clip {
        let frames = (seconds * 48000.0).round() as usize;
        let audio = AudioArc::new(vec![0.0; frames], 48000, 1);
        Clip::new(ClipId(1), "s", audio, start_time, 0.0)
    }

    fn assert_invariant(clip: &Clip) {
        let expected = clip.original_duration - clip.trim_start - clip.trim_end;
        assert!(
            (clip.duration - expected).abs() < 1e-9,
            "duration {} != {expected}",
            clip.duration
        );
    }

    #[test]
    fn test_split_in_the_middle() {
        let mut left = clip(4.0, 1.0);
        let right = split_clip(&mut left, 2.5, ClipId(2)).unwrap();

        assert_eq!(left.id, ClipId(1));
        assert_eq!(right.id, ClipId(2));
        assert_eq!(left.start_time, 1.0);
        assert_eq!(left.duration, 1.5);
        assert_eq!(left.trim_end, 2.5);
        assert_eq!(right.start_time, 2.5);
        assert_eq!(right.duration, 2.5);
        assert_eq!(right.trim_start, 1.5);
        assert_eq!(right.offset, left.offset);
        assert!(right.audio.ptr_eq(&left.audio));
        assert!(left.is_waveform_stale() && right.is_waveform_stale());
        assert_invariant(&left);
        assert_invariant(&right);
    }

    #[test]
    fn test_split_rejects_edges_without_mutation() {
        let mut c = clip(2.0, 1.0);
        for at in [0.5, 1.0, 3.0, 3.5] {
            assert_eq!(
                split_clip(&mut c, at, ClipId(2)).unwrap_err(),
                EditError::SplitOutsideClip {
                    clip: ClipId(1),
                    at
                }
            );
        }
        assert_eq!(c.duration, 2.0);
        assert_eq!(c.trim_end, 0.0);
    }

    #[test]
    fn test_split_exactness_sweep() {
        for &(seconds, start) in &[(0.0025, 0.0), (0.5, 0.3), (3.0, 1.7), (10.0, 12.25)] {
            let template = clip(seconds, start);
            for step in 1..50 {
                let at = start + seconds * step as f64 / 50.0;
                let mut left = template.clone();
                let old = left.duration;
                let Ok(right) = split_clip(&mut left, at, ClipId(2)) else {
                    panic!("split at {at} rejected");
                };

                assert!((left.start_time + left.duration - at).abs() < 1e-4);
                assert_eq!(right.start_time, at);
                assert_eq!(left.duration + right.duration, old);
                assert_invariant(&left);
                assert_invariant(&right);
            }
        }
    }

    #[test]
    fn test_split_durations_sum_exactly() {
        // a case where `relative + (old - relative)` drifts by one ulp
        let mut left = clip(4.7597, 2.1885);
        let old = left.duration;
        let right = split_clip(&mut left, 2.5703, ClipId(2)).unwrap();
        assert_eq!(left.duration + right.duration, old);

        for &(seconds, start) in &[(4.7597, 2.1885), (0.731, 0.007), (97.3, 13.37)] {
            let template = clip(seconds, start);
            for step in 1..1000 {
                let at = start + seconds * (step as f64 * 0.618_034).fract();
                let mut left = template.clone();
                let old = left.duration;
                let Ok(right) = split_clip(&mut left, at, ClipId(2)) else {
                    continue;
                };
                assert_eq!(left.duration + right.duration, old, "split at {at}");
                assert!(left.duration > 0.0 && right.duration > 0.0);
            }
        }
    }

    #[test]
    fn test_split_of_trimmed_clip_accumulates_trims() {
        let mut c = clip(4.0, 0.0).with_trim(0.5, 0.5).unwrap();
        let right = split_clip(&mut c, 1.0, ClipId(2)).unwrap();

        assert_eq!(c.trim_start, 0.5);
        assert_eq!(c.trim_end, 2.5);
        assert_eq!(right.trim_start, 1.5);
        assert_eq!(right.trim_end, 0.5);
        assert_eq!(right.duration, 2.0);
    }

    #[test]
    fn test_trim_start_keeps_right_edge() {
        let mut c = clip(2.0, 1.0);
        let outcome = trim_clip(&mut c, TrimSide::Start, 0.5, MIN_CLIP_DURATION);

        assert_eq!(outcome.applied_delta, 0.5);
        assert!(outcome.waveform_stale);
        assert_eq!(c.trim_start, 0.5);
        assert_eq!(c.start_time, 1.5);
        assert_eq!(c.end_time(), 3.0);
        assert_invariant(&c);
    }

    #[test]
    fn test_trim_end_keeps_left_edge() {
        let mut c = clip(2.0, 1.0);
        trim_clip(&mut c, TrimSide::End, 0.75, MIN_CLIP_DURATION);

        assert_eq!(c.start_time, 1.0);
        assert_eq!(c.trim_end, 0.75);
        assert_eq!(c.duration, 1.25);
    }

    #[test]
    fn test_trim_is_quantized_to_samples() {
        let mut c = clip(1.0, 0.0);
        trim_clip(&mut c, TrimSide::End, 0.123_456_7, MIN_CLIP_DURATION);

        let samples = c.trim_end * 48000.0;
        assert!((samples - samples.round()).abs() < 1e-6);
        assert_eq!(samples.round(), 5926.0);
    }

    #[test]
    fn test_trim_respects_floor() {
        let mut c = clip(1.0, 0.0);
        trim_clip(&mut c, TrimSide::End, 5.0, MIN_CLIP_DURATION);
        assert!((c.duration - MIN_CLIP_DURATION).abs() < 1e-9);

        // the opposite side cannot take any more
        let outcome = trim_clip(&mut c, TrimSide::Start, 0.5, MIN_CLIP_DURATION);
        assert_eq!(outcome.applied_delta, 0.0);
        assert!(!outcome.waveform_stale);
    }

    #[test]
    fn test_trim_cannot_extend_past_buffer() {
        let mut c = clip(1.0, 2.0).with_trim(0.25, 0.25).unwrap();
        trim_clip(&mut c, TrimSide::End, -1.0, MIN_CLIP_DURATION);
        assert_eq!(c.trim_end, 0.0);

        trim_clip(&mut c, TrimSide::Start, -1.0, MIN_CLIP_DURATION);
        assert_eq!(c.trim_start, 0.0);
        assert_eq!(c.start_time, 1.75);
        assert_eq!(c.end_time(), 2.75);
    }

    #[test]
    fn test_trim_start_stops_at_timeline_origin() {
        // right edge at 0.5 with 0.75 s trimmed away: only 0.5 s can come back
        let mut c = clip(2.0, 0.0).with_trim(0.75, 0.75).unwrap();
        c.start_time = 0.0;
        trim_clip(&mut c, TrimSide::Start, -1.0, MIN_CLIP_DURATION);

        assert_eq!(c.start_time, 0.0);
        assert_eq!(c.end_time(), 0.5);
        assert_eq!(c.trim_start, 0.75);

        let mut c = clip(2.0, 0.25).with_trim(0.75, 0.75).unwrap();
        trim_clip(&mut c, TrimSide::Start, -1.0, MIN_CLIP_DURATION);
        assert!(c.start_time.abs() < 1e-12);
        assert!((c.end_time() - 0.75).abs() < 1e-12);
        assert!((c.trim_start - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_trim_sequences_fix_edges() {
        let deltas = [0.3, -0.1, 0.05, 0.7, -0.45, 1.9, -2.0, 0.000_3, 0.25];
        let mut c = clip(3.0, 1.0);

        for (i, delta) in deltas.iter().enumerate() {
            if i % 2 == 0 {
                let right_edge = c.end_time();
                trim_clip(&mut c, TrimSide::Start, *delta, MIN_CLIP_DURATION);
                assert!((c.end_time() - right_edge).abs() < 1e-9, "step {i}");
            } else {
                let left_edge = c.start_time;
                trim_clip(&mut c, TrimSide::End, *delta, MIN_CLIP_DURATION);
                assert_eq!(c.start_time, left_edge, "step {i}");
            }
            assert!(c.duration >= MIN_CLIP_DURATION - 1e-12);
            assert!(c.trim_start >= 0.0 && c.trim_end >= 0.0);
            assert!(c.start_time >= 0.0);
            assert_invariant(&c);
        }
    }
}
