use std::borrow::Cow;
use std::collections::HashMap;

use arranger_transport::{
    AudioArc, AudioBuffer, Clip, PlayableClip, PlaybackSpan, ceil_samples, plan_playback,
    resample_audio_arc, stereo_frame,
};

use crate::RenderError;

/// Fixed-length offline target. Every clip is mixed in one pass from time 0.
struct OfflineContext {
    buffer: AudioBuffer,
    frames: usize,
}

impl OfflineContext {
    fn new(duration: f64, sample_rate: u32, channels: u16) -> Result<Self, RenderError> {
        if !duration.is_finite() || duration <= 0.0 {
            return Err(RenderError::EmptyRender(duration));
        }
        if sample_rate == 0 {
            return Err(RenderError::InvalidSampleRate(sample_rate));
        }
        if !(1..=2).contains(&channels) {
            return Err(RenderError::UnsupportedChannels(channels));
        }
        let frames = ceil_samples(duration, sample_rate as f64).max(0) as usize;
        Ok(Self {
            buffer: AudioBuffer::silence(frames, sample_rate, channels),
            frames,
        })
    }

    fn mix(&mut self, audio: &AudioArc, span: &PlaybackSpan, gain: f32, pan: f32) {
        let rate = self.buffer.sample_rate as f64;
        let first = (span.delay * rate).round() as usize;
        let channels = self.buffer.channels as usize;

        for i in 0..span.range.len() {
            let dst = first + i;
            if dst >= self.frames {
                break;
            }
            let src = span.range.start + i;
            if channels == 1 {
                let source_channels = audio.channels() as usize;
                let sum: f32 = (0..source_channels).map(|ch| audio.sample(src, ch)).sum();
                self.buffer.samples[dst] += gain * sum / source_channels as f32;
            } else {
                let (l, r) = stereo_frame(audio, src, gain, pan);
                self.buffer.samples[dst * 2] += l;
                self.buffer.samples[dst * 2 + 1] += r;
            }
        }
    }

    fn finish(self) -> AudioBuffer {
        self.buffer
    }
}

/// Render already-filtered clips into one buffer of `duration` seconds.
///
/// Clips are placed with the same sample math as live playback from 0;
/// buffers at another rate are resampled to `sample_rate` first.
pub fn render_mixdown(
    clips: &[PlayableClip],
    duration: f64,
    sample_rate: u32,
    channels: u16,
) -> Result<AudioBuffer, RenderError> {
    let mut context = OfflineContext::new(duration, sample_rate, channels)?;
    let mut resampled: HashMap<usize, AudioArc> = HashMap::new();
    let mut skipped = 0usize;

    for playable in clips {
        let clip = conform_rate(&playable.clip, sample_rate, &mut resampled)?;
        let Some(span) = plan_playback(&clip, 0.0) else {
            skipped += 1;
            continue;
        };
        context.mix(&clip.audio, &span, playable.gain, playable.pan);
    }

    tracing::debug!(
        clips = clips.len(),
        skipped,
        frames = context.frames,
        "mixdown rendered"
    );
    Ok(context.finish())
}

fn conform_rate<'a>(
    clip: &'a Clip,
    sample_rate: u32,
    cache: &mut HashMap<usize, AudioArc>,
) -> Result<Cow<'a, Clip>, RenderError> {
    if clip.sample_rate() == sample_rate {
        return Ok(Cow::Borrowed(clip));
    }

    let key = clip.audio.samples().as_ptr() as usize;
    let audio = match cache.get(&key) {
        Some(audio) => audio.clone(),
        None => {
            let audio =
                resample_audio_arc(&clip.audio, sample_rate).map_err(RenderError::Resample)?;
            cache.insert(key, audio.clone());
            audio
        }
    };

    let mut conformed = clip.clone();
    conformed.audio = audio;
    Ok(Cow::Owned(conformed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use arranger_transport::{ClipId, TrackId};

    fn playable(samples: Vec<f32>, channels: u16, start_time: f64) -> PlayableClip {
        let audio = AudioArc::new(samples, 48000, channels);
        PlayableClip {
            track: TrackId(1),
            clip: Clip::new(ClipId(1), "dc", audio, start_time, 0.0),
            gain: 1.0,
            pan: 0.0,
        }
    }

    #[test]
    fn test_buffer_is_sized_from_duration() {
        let buffer = render_mixdown(&[], 1.0, 48000, 2).unwrap();
        assert_eq!(buffer.frames(), 48000);
        assert_eq!(buffer.samples.len(), 96000);
        assert!(buffer.samples.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn test_float_noise_does_not_add_a_frame() {
        // 0.1 + 0.2 is a hair above 0.3
        let buffer = render_mixdown(&[], 0.1 + 0.2, 48000, 1).unwrap();
        assert_eq!(buffer.frames(), 14400);

        let buffer = render_mixdown(&[], 0.30001, 48000, 1).unwrap();
        assert_eq!(buffer.frames(), 14401);
    }

    #[test]
    fn test_clip_lands_at_its_start_time() {
        let clip = playable(vec![0.5; 480 * 2], 2, 0.5);
        let buffer = render_mixdown(&[clip], 1.0, 48000, 2).unwrap();

        assert_eq!(buffer.samples[23999 * 2], 0.0);
        assert!((buffer.samples[24000 * 2] - 0.5).abs() < 1e-6);
        assert!((buffer.samples[(24000 + 479) * 2 + 1] - 0.5).abs() < 1e-6);
        assert_eq!(buffer.samples[(24000 + 480) * 2], 0.0);
    }

    #[test]
    fn test_trimmed_region_only() {
        let mut samples = vec![0.1; 4800];
        samples[..480].fill(0.9);
        let mut clip = playable(samples, 1, 0.0);
        clip.clip = clip.clip.with_trim(0.01, 0.0).unwrap();

        let buffer = render_mixdown(&[clip], 0.1, 48000, 1).unwrap();

        assert!((buffer.samples[0] - 0.1).abs() < 1e-6);
        assert_eq!(buffer.samples[4320], 0.0);
    }

    #[test]
    fn test_overlapping_clips_sum() {
        let a = playable(vec![0.25; 480], 1, 0.0);
        let mut b = playable(vec![0.25; 480], 1, 0.0);
        b.gain = 0.5;

        let buffer = render_mixdown(&[a, b], 0.01, 48000, 1).unwrap();
        assert!((buffer.samples[10] - 0.375).abs() < 1e-6);
    }

    #[test]
    fn test_tail_past_duration_is_cut() {
        let clip = playable(vec![0.5; 48000], 1, 0.5);
        let buffer = render_mixdown(&[clip], 1.0, 48000, 1).unwrap();
        assert_eq!(buffer.frames(), 48000);
        assert!((buffer.samples[47999] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_other_rates_are_conformed() {
        let audio = AudioArc::new(vec![0.0; 44100], 44100, 1);
        let clip = PlayableClip {
            track: TrackId(1),
            clip: Clip::new(ClipId(1), "slow", audio, 0.0, 0.0),
            gain: 1.0,
            pan: 0.0,
        };
        let buffer = render_mixdown(&[clip], 1.0, 48000, 2).unwrap();
        assert_eq!(buffer.sample_rate, 48000);
    }

    #[test]
    fn test_conformed_clip_keeps_its_tail() {
        let audio = AudioArc::new(vec![0.5; 44100], 44100, 1);
        let clip = PlayableClip {
            track: TrackId(1),
            clip: Clip::new(ClipId(1), "slow", audio, 0.5, 0.0),
            gain: 1.0,
            pan: 0.0,
        };

        let buffer = render_mixdown(&[clip], 1.5, 48000, 1).unwrap();

        assert_eq!(buffer.frames(), 72000);
        assert_eq!(buffer.samples[23999], 0.0);
        assert!((buffer.samples[24200] - 0.5).abs() < 0.05);
        assert!((buffer.samples[71900] - 0.5).abs() < 0.05);
        assert!(buffer.samples[71999] > 0.3);
    }

    #[test]
    fn test_invalid_targets() {
        assert!(matches!(
            render_mixdown(&[], 0.0, 48000, 2),
            Err(RenderError::EmptyRender(_))
        ));
        assert!(matches!(
            render_mixdown(&[], 1.0, 48000, 6),
            Err(RenderError::UnsupportedChannels(6))
        ));
        assert!(matches!(
            render_mixdown(&[], 1.0, 0, 2),
            Err(RenderError::InvalidSampleRate(0))
        ));
    }
}
