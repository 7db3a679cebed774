use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arranger_transport::{AudioArc, stereo_frame};
use basedrop::{Collector, Handle, Owned};
use cpal::{
    FromSample, SizedSample,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};

use crate::output::{AudioOutput, PlaybackUnit, UnitId};

/// Pending voice sets between the control thread and the callback. Only
/// the newest one is ever used, so a short queue is enough.
const BATCH_QUEUE: usize = 16;

/// A unit as the audio callback sees it, in device frames.
#[derive(Clone)]
struct Voice {
    id: UnitId,
    audio: AudioArc,
    start_frame: u64,
    src_start: usize,
    src_end: usize,
    /// Source frames advanced per device frame.
    step: f64,
    gain: f32,
    pan: f32,
}

impl Voice {
    fn new(id: UnitId, unit: PlaybackUnit, device_rate: u32) -> Self {
        let src_rate = unit.audio.sample_rate() as f64;
        let src_start = (unit.offset * src_rate).round().max(0.0) as usize;
        let src_len = (unit.length * src_rate).round().max(0.0) as usize;
        let src_end = (src_start + src_len).min(unit.audio.frames());

        Self {
            id,
            start_frame: (unit.when.max(0.0) * device_rate as f64).round() as u64,
            src_start,
            src_end,
            step: src_rate / device_rate as f64,
            gain: unit.gain,
            pan: unit.pan,
            audio: unit.audio,
        }
    }

    #[inline]
    fn source_frame(&self, clock: u64) -> Option<usize> {
        if clock < self.start_frame {
            return None;
        }
        let elapsed = (clock - self.start_frame) as f64 * self.step;
        let frame = self.src_start + elapsed as usize;
        (frame < self.src_end).then_some(frame)
    }

    #[inline]
    fn finished(&self, clock: u64) -> bool {
        clock >= self.start_frame
            && self.src_start + ((clock - self.start_frame) as f64 * self.step) as usize
                >= self.src_end
    }
}

/// The complete set of sounding voices, replaced wholesale on every commit.
///
/// The callback only plays a batch whose generation matches the live
/// generation counter, so bumping the counter silences it at once.
struct Batch {
    generation: u64,
    voices: Vec<Voice>,
}

impl Batch {
    #[inline]
    fn mix(&self, clock: u64) -> (f32, f32) {
        let mut left = 0.0f32;
        let mut right = 0.0f32;
        for voice in &self.voices {
            if let Some(source) = voice.source_frame(clock) {
                let (l, r) = stereo_frame(&voice.audio, source, voice.gain, voice.pan);
                left += l;
                right += r;
            }
        }
        (left, right)
    }
}

/// Control-thread copy of the voice set. Starts and stops edit it freely;
/// nothing reaches the callback until [`VoiceSet::publish`].
#[derive(Default)]
struct VoiceSet {
    voices: Vec<Voice>,
    next_id: u64,
    generation: u64,
}

impl VoiceSet {
    fn start(&mut self, unit: PlaybackUnit, device_rate: u32) -> UnitId {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.voices.push(Voice::new(id, unit, device_rate));
        id
    }

    fn stop(&mut self, id: UnitId) {
        self.voices.retain(|v| v.id != id);
    }

    /// Drop voices that have played out by `clock` and snapshot the rest
    /// under a fresh generation.
    fn publish(&mut self, clock: u64) -> Batch {
        self.voices.retain(|v| !v.finished(clock));
        self.generation += 1;
        Batch {
            generation: self.generation,
            voices: self.voices.clone(),
        }
    }
}

/// Default output device driven by a cpal stream.
///
/// Starts and stops are collected on the control thread and handed to the
/// audio callback as one batch per [`AudioOutput::commit`] through a
/// lock-free ring. The callback never allocates or frees: replaced batches
/// go back to the collector. The audio clock is the number of frames the
/// callback has produced.
pub struct CpalOutput {
    batches: rtrb::Producer<Owned<Batch>>,
    clock: Arc<AtomicU64>,
    live_generation: Arc<AtomicU64>,
    sample_rate: u32,
    voices: VoiceSet,
    collector: Collector,
    handle: Handle,
    _stream: cpal::Stream,
}

impl CpalOutput {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOutput for CpalOutput {
    fn now(&self) -> f64 {
        self.clock.load(Ordering::Acquire) as f64 / self.sample_rate as f64
    }

    fn start_unit(&mut self, unit: PlaybackUnit) -> anyhow::Result<UnitId> {
        Ok(self.voices.start(unit, self.sample_rate))
    }

    fn stop_unit(&mut self, id: UnitId) {
        self.voices.stop(id);
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.collector.collect();

        let batch = self.voices.publish(self.clock.load(Ordering::Acquire));
        let generation = batch.generation;
        let voices = batch.voices.len();

        // Older batches stop sounding now, even if the new one cannot be queued.
        self.live_generation.store(generation, Ordering::Release);
        self.batches
            .push(Owned::new(&self.handle, batch))
            .map_err(|_| anyhow::anyhow!("audio callback is not draining its queue"))?;

        tracing::trace!(generation, voices, "voice set published");
        Ok(())
    }
}

/// Open the default output device and start its stream.
pub fn start() -> anyhow::Result<CpalOutput> {
    let collector = Collector::new();
    let handle = collector.handle();

    let (batch_tx, batch_rx) = rtrb::RingBuffer::<Owned<Batch>>::new(BATCH_QUEUE);
    let clock = Arc::new(AtomicU64::new(0));
    let live_generation = Arc::new(AtomicU64::new(0));

    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no output device found"))?;

    let config = device.default_output_config()?;
    let sample_rate = config.sample_rate().0;
    tracing::info!(
        device = device.name().unwrap_or_default(),
        sample_rate,
        channels = config.channels(),
        "opening output stream"
    );

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => build_stream::<f32>(
            &device,
            &config.into(),
            batch_rx,
            clock.clone(),
            live_generation.clone(),
        )?,
        cpal::SampleFormat::I16 => build_stream::<i16>(
            &device,
            &config.into(),
            batch_rx,
            clock.clone(),
            live_generation.clone(),
        )?,
        sample_format => anyhow::bail!("unsupported sample format '{sample_format}'"),
    };

    stream.play()?;

    Ok(CpalOutput {
        batches: batch_tx,
        clock,
        live_generation,
        sample_rate,
        voices: VoiceSet::default(),
        collector,
        handle,
        _stream: stream,
    })
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut batch_rx: rtrb::Consumer<Owned<Batch>>,
    clock: Arc<AtomicU64>,
    live_generation: Arc<AtomicU64>,
) -> anyhow::Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let output_channels = config.channels as usize;
    let mut current: Option<Owned<Batch>> = None;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            while let Ok(batch) = batch_rx.pop() {
                current = Some(batch);
            }

            let live = live_generation.load(Ordering::Acquire);
            let batch = current.as_deref().filter(|b| b.generation == live);
            let mut now = clock.load(Ordering::Relaxed);

            for frame in data.chunks_mut(output_channels) {
                let (left, right) = batch.map_or((0.0, 0.0), |b| b.mix(now));

                if output_channels == 1 {
                    frame[0] = T::from_sample((left + right) * 0.5);
                } else {
                    for (ch, sample) in frame.iter_mut().enumerate() {
                        let value = match ch {
                            0 => left,
                            1 => right,
                            _ => 0.0,
                        };
                        *sample = T::from_sample(value);
                    }
                }

                now += 1;
            }

            clock.store(now, Ordering::Release);
        },
        |err| tracing::error!("stream error: {err}"),
        None,
    )?;

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(when: f64, seconds: f64) -> PlaybackUnit {
        PlaybackUnit {
            audio: AudioArc::new(vec![0.5; 48000], 48000, 1),
            when,
            offset: 0.0,
            length: seconds,
            gain: 1.0,
            pan: 0.0,
        }
    }

    fn voice(start_frame: u64, src_start: usize, src_end: usize, step: f64) -> Voice {
        Voice {
            id: UnitId(0),
            audio: AudioArc::new(vec![0.0; 1000], 48000, 1),
            start_frame,
            src_start,
            src_end,
            step,
            gain: 1.0,
            pan: 0.0,
        }
    }

    #[test]
    fn test_voice_waits_for_start_frame() {
        let v = voice(100, 10, 20, 1.0);
        assert_eq!(v.source_frame(99), None);
        assert_eq!(v.source_frame(100), Some(10));
        assert_eq!(v.source_frame(109), Some(19));
        assert_eq!(v.source_frame(110), None);
        assert!(!v.finished(50));
        assert!(v.finished(110));
    }

    #[test]
    fn test_voice_steps_at_rate_ratio() {
        // a 24 kHz buffer on a 48 kHz device advances half a frame per frame
        let v = voice(0, 0, 100, 0.5);
        assert_eq!(v.source_frame(3), Some(1));
        assert_eq!(v.source_frame(199), Some(99));
        assert!(v.finished(200));
    }

    #[test]
    fn test_voice_set_keeps_every_started_unit() {
        let mut set = VoiceSet::default();
        let ids: Vec<UnitId> = (0..600)
            .map(|i| set.start(unit(i as f64 * 0.01, 0.5), 48000))
            .collect();

        let batch = set.publish(0);
        assert_eq!(batch.voices.len(), 600);
        assert_eq!(batch.generation, 1);

        set.stop(ids[10]);
        set.stop(ids[599]);
        let batch = set.publish(0);
        assert_eq!(batch.voices.len(), 598);
        assert_eq!(batch.generation, 2);
        assert!(batch.voices.iter().all(|v| v.id != ids[10]));
    }

    #[test]
    fn test_publish_drops_finished_voices() {
        let mut set = VoiceSet::default();
        set.start(unit(0.0, 0.5), 48000);
        set.start(unit(1.0, 0.5), 48000);

        // 0.75 s in: the first unit has played out, the second has not started
        let batch = set.publish(36000);
        assert_eq!(batch.voices.len(), 1);
        assert_eq!(batch.voices[0].start_frame, 48000);
    }

    #[test]
    fn test_batch_mixes_only_sounding_voices() {
        let mut set = VoiceSet::default();
        set.start(unit(0.0, 0.5), 48000);
        set.start(unit(0.25, 0.5), 48000);
        let batch = set.publish(0);

        let (l0, _) = batch.mix(100);
        let (l1, _) = batch.mix(15000);
        let (l2, r2) = batch.mix(30000);
        assert!(l1 > l0);
        assert!((l0 - l2).abs() < 1e-6);
        assert!((l2 - r2).abs() < 1e-6);
        assert_eq!(batch.mix(40000), (0.0, 0.0));
    }
}
