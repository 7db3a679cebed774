use std::sync::Arc;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

/// Owned, mutable interleaved audio. Produced by decoding and by the mixdown
/// renderer; converted into an [`AudioArc`] once it becomes shared.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioBuffer {
    /// A zeroed buffer of `frames` frames.
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: vec![0.0; frames * channels as usize],
            sample_rate,
            channels,
        }
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            return 0;
        }
        self.samples.len() / self.channels as usize
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }
}

/// Shared, immutable decoded sound.
///
/// The sample data lives in an `Arc<[f32]>`, so cloning an `AudioArc` only
/// bumps a reference count. Every clip placed from the same sound points at
/// the same allocation; nothing in the engine writes into it.
///
/// ```
/// use arranger_transport::AudioArc;
///
/// let audio = AudioArc::new(vec![0.0, 0.5, 1.0, 0.5], 44100, 2);
/// let shared = audio.clone();
/// assert_eq!(shared.frames(), 2);
/// ```
#[derive(Clone)]
pub struct AudioArc {
    /// Interleaved samples, `[L, R, L, R, ...]` for stereo.
    samples: Arc<[f32]>,
    sample_rate: u32,
    channels: u16,
}

impl AudioArc {
    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self::from_arc(Arc::from(samples), sample_rate, channels)
    }

    /// # Panics
    ///
    /// Panics if `channels` is 0 or if `samples.len()` is not divisible by `channels`.
    pub fn from_arc(samples: Arc<[f32]>, sample_rate: u32, channels: u16) -> Self {
        assert!(channels > 0, "channels must be greater than 0");
        assert_eq!(
            samples.len() % channels as usize,
            0,
            "samples.len() must be divisible by channels"
        );
        Self {
            samples,
            sample_rate,
            channels,
        }
    }

    /// Take ownership of a decoded buffer's samples.
    pub fn from_audio_buffer(buffer: AudioBuffer) -> Self {
        Self::new(buffer.samples, buffer.sample_rate, buffer.channels)
    }

    #[inline]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn samples_arc(&self) -> &Arc<[f32]> {
        &self.samples
    }

    /// True when both handles point at the same sample allocation.
    pub fn ptr_eq(&self, other: &AudioArc) -> bool {
        Arc::ptr_eq(&self.samples, &other.samples)
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Number of frames (samples per channel).
    #[inline]
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Sample at `frame` on `channel`, or silence past the end.
    #[inline]
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        self.samples
            .get(frame * self.channels as usize + channel)
            .copied()
            .unwrap_or(0.0)
    }

    /// # Panics
    ///
    /// Panics if `channel` is >= `self.channels()`.
    pub fn channel(&self, channel: usize) -> impl Iterator<Item = f32> + '_ {
        assert!(
            channel < self.channels as usize,
            "channel index out of bounds"
        );
        let channels = self.channels as usize;
        (0..self.frames()).map(move |frame| self.samples[frame * channels + channel])
    }

    /// Resample to `target_sample_rate`; a cheap clone when already there.
    pub fn resample(&self, target_sample_rate: u32) -> anyhow::Result<Self> {
        resample_audio_arc(self, target_sample_rate)
    }
}

impl std::fmt::Debug for AudioArc {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioArc")
            .field("frames", &self.frames())
            .field("sample_rate", &self.sample_rate)
            .field("channels", &self.channels)
            .field("duration_secs", &self.duration_secs())
            .finish()
    }
}

/// Min/max overview of a clip's audible region, one pair per bucket.
#[derive(Debug, Clone)]
pub struct WaveformData {
    pub peaks: Vec<(f32, f32)>,
    pub samples_per_bucket: usize,
}

impl WaveformData {
    /// Peaks of the mono mixdown of `audio` over frames `[start, end)`.
    pub fn for_range(
        audio: &AudioArc,
        start: usize,
        end: usize,
        samples_per_bucket: usize,
    ) -> Self {
        let samples_per_bucket = samples_per_bucket.max(1);
        let end = end.min(audio.frames());
        let start = start.min(end);
        let frames = end - start;
        let num_buckets = frames.div_ceil(samples_per_bucket);
        let channels = audio.channels() as usize;
        let mut peaks = Vec::with_capacity(num_buckets);

        for bucket in 0..num_buckets {
            let from = start + bucket * samples_per_bucket;
            let to = (from + samples_per_bucket).min(end);

            let mut min_val: f32 = 0.0;
            let mut max_val: f32 = 0.0;
            for frame in from..to {
                let sum: f32 = (0..channels).map(|ch| audio.sample(frame, ch)).sum();
                let mono = sum / channels as f32;
                min_val = min_val.min(mono);
                max_val = max_val.max(mono);
            }
            peaks.push((min_val, max_val));
        }

        Self {
            peaks,
            samples_per_bucket,
        }
    }
}

const SINC_LEN: usize = 256;

/// Resample an `AudioArc` with sinc interpolation.
///
/// The result holds exactly `ceil(frames * target / source)` frames, so a
/// clip keeps its length in seconds at the new rate.
pub fn resample_audio_arc(audio: &AudioArc, target_sample_rate: u32) -> anyhow::Result<AudioArc> {
    if audio.sample_rate == target_sample_rate {
        return Ok(audio.clone());
    }
    if audio.is_empty() {
        return Ok(AudioArc::new(Vec::new(), target_sample_rate, audio.channels));
    }

    let channels = audio.channels as usize;
    let input_frames = audio.frames();
    let resample_ratio = target_sample_rate as f64 / audio.sample_rate as f64;
    let output_frames = (input_frames as u64 * target_sample_rate as u64)
        .div_ceil(audio.sample_rate as u64) as usize;

    // The interpolator holds back half a kernel of input; trailing silence
    // pushes the real tail through in the same pass.
    let padded_frames = input_frames + SINC_LEN;
    tracing::debug!(
        from = audio.sample_rate,
        to = target_sample_rate,
        frames = input_frames,
        "resampling"
    );

    // rubato works on planar data
    let mut planar = vec![Vec::with_capacity(padded_frames); channels];
    for frame in 0..input_frames {
        for (ch, plane) in planar.iter_mut().enumerate() {
            plane.push(audio.samples[frame * channels + ch]);
        }
    }
    for plane in planar.iter_mut() {
        plane.resize(padded_frames, 0.0);
    }

    let params = SincInterpolationParameters {
        sinc_len: SINC_LEN,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler =
        SincFixedIn::<f32>::new(resample_ratio, 2.0, params, padded_frames, channels)?;
    let output = resampler.process(&planar, None)?;

    if output[0].len() < output_frames {
        tracing::debug!(
            produced = output[0].len(),
            expected = output_frames,
            "resampler came up short, padding with silence"
        );
    }

    let mut interleaved = Vec::with_capacity(output_frames * channels);
    for frame in 0..output_frames {
        for plane in &output {
            interleaved.push(plane.get(frame).copied().unwrap_or(0.0));
        }
    }

    Ok(AudioArc::new(interleaved, target_sample_rate, audio.channels))
}
