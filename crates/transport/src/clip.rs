use std::sync::Arc;

use crate::audio::{AudioArc, WaveformData};
use crate::window::seconds_to_samples;

/// Frames per waveform overview bucket.
pub const WAVEFORM_BUCKET: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(pub u64);

impl std::fmt::Display for ClipId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "clip#{}", self.0)
    }
}

/// One placed instance of a sound on the timeline.
///
/// All positions are in seconds. The audible span is
/// `original_duration - trim_start - trim_end`; the trim/split operations keep
/// `duration` equal to that after every mutation.
#[derive(Debug, Clone)]
pub struct Clip {
    pub id: ClipId,
    /// Key the sound asset provider resolves back into `audio`.
    pub sound_id: String,
    pub name: String,
    pub start_time: f64,
    pub duration: f64,
    /// Where the untrimmed region begins inside `audio`.
    pub offset: f64,
    pub trim_start: f64,
    pub trim_end: f64,
    pub original_duration: f64,
    pub audio: AudioArc,
    /// Cached overview of the trimmed region; `None` once it is stale.
    pub waveform: Option<Arc<WaveformData>>,
}

impl Clip {
    pub fn new(
        id: ClipId,
        sound_id: impl Into<String>,
        audio: AudioArc,
        start_time: f64,
        offset: f64,
    ) -> Self {
        let sound_id = sound_id.into();
        let offset = offset.clamp(0.0, audio.duration_secs());
        let original_duration = audio.duration_secs() - offset;
        Self {
            id,
            name: sound_id.clone(),
            sound_id,
            start_time: start_time.max(0.0),
            duration: original_duration,
            offset,
            trim_start: 0.0,
            trim_end: 0.0,
            original_duration,
            audio,
            waveform: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Apply both trims at once, recomputing `duration`.
    ///
    /// Returns `None` when the trims are negative or leave nothing audible.
    pub fn with_trim(mut self, trim_start: f64, trim_end: f64) -> Option<Self> {
        if trim_start < 0.0 || trim_end < 0.0 || trim_start + trim_end >= self.original_duration
        {
            return None;
        }
        self.trim_start = trim_start;
        self.trim_end = trim_end;
        self.duration = self.original_duration - trim_start - trim_end;
        Some(self)
    }

    #[inline]
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }

    /// Effective audible window `[start_time, end_time)`.
    #[inline]
    pub fn window(&self) -> (f64, f64) {
        (self.start_time, self.end_time())
    }

    /// Half-open intersection with `[start, end)`.
    #[inline]
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start_time < end && start < self.end_time()
    }

    /// True when `t` lies strictly after the start and before the end.
    #[inline]
    pub fn contains_strictly(&self, t: f64) -> bool {
        t > self.start_time && t < self.end_time()
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate()
    }

    pub fn is_waveform_stale(&self) -> bool {
        self.waveform.is_none()
    }

    pub fn mark_waveform_stale(&mut self) {
        self.waveform = None;
    }

    /// Recompute the overview for the current trim window.
    pub fn refresh_waveform(&mut self) -> Arc<WaveformData> {
        let rate = self.sample_rate() as f64;
        let start = seconds_to_samples(self.offset + self.trim_start, rate).max(0) as usize;
        let end = (self.audio.frames() as i64 - seconds_to_samples(self.trim_end, rate)).max(0)
            as usize;
        let waveform = Arc::new(WaveformData::for_range(
            &self.audio,
            start,
            end,
            WAVEFORM_BUCKET,
        ));
        self.waveform = Some(waveform.clone());
        waveform
    }
}
