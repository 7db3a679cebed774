//! Timeline data model shared by playback, mixdown and persistence.

mod audio;
mod clip;
mod pan;
mod track;
mod window;

pub use audio::{AudioArc, AudioBuffer, WaveformData, resample_audio_arc};
pub use clip::{Clip, ClipId, WAVEFORM_BUCKET};
pub use pan::{pan_frame, stereo_frame};
pub use track::{PlayableClip, Track, TrackId, playable_end_time, resolve_playable_clips};
pub use window::{
    NEGLIGIBLE_LENGTH, PlaybackSpan, SampleRange, ceil_samples, clamp_range, plan_playback,
    quantize_seconds, seconds_to_samples,
};
