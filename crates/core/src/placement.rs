//! Finding a start time where a clip fits on a track without overlapping.

use arranger_transport::{Clip, ClipId, Track};

/// Default gap left after a clip that a placement was pushed past.
pub const PLACEMENT_GAP: f64 = 0.1;

/// Earliest start at or after `desired_start` where a clip of
/// `clip_duration` seconds fits on `track`.
///
/// Returns `desired_start` (clamped to 0) unchanged when it is already free.
pub fn find_free_start(track: &Track, desired_start: f64, clip_duration: f64) -> f64 {
    find_free_start_excluding(track, desired_start, clip_duration, None, PLACEMENT_GAP)
}

/// [`find_free_start`] with an explicit gap, ignoring the window of
/// `ignore` so a clip being moved along its own track does not collide with
/// where it currently sits.
pub fn find_free_start_excluding(
    track: &Track,
    desired_start: f64,
    clip_duration: f64,
    ignore: Option<ClipId>,
    gap: f64,
) -> f64 {
    let mut candidate = if desired_start.is_finite() {
        desired_start.max(0.0)
    } else {
        0.0
    };
    let duration = clip_duration.max(0.0);
    let gap = gap.max(0.0);

    let mut windows: Vec<(f64, f64)> = track
        .clips()
        .iter()
        .filter(|c| Some(c.id) != ignore)
        .map(Clip::window)
        .collect();
    windows.sort_by(|a, b| a.0.total_cmp(&b.0));

    for (start, end) in windows {
        if end <= candidate {
            continue;
        }
        if candidate + duration <= start {
            break;
        }
        candidate = candidate.max(end + gap);
    }

    candidate
}
