//! Sound asset provider: turns files into shared, decoded buffers.

mod cache;
mod import;

use std::fs::File;
use std::path::Path;

use anyhow::Context;
use arranger_transport::{AudioArc, AudioBuffer};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub use cache::{AudioCache, SoundLibrary, SoundProvider};
pub use import::{BatchImport, DecodedSound, ImportFailure, decode_batch};

/// Decode a supported container into a shared interleaved buffer.
pub fn decode_file(path: &Path) -> anyhow::Result<AudioArc> {
    let buffer = decode_file_to_buffer(path)
        .with_context(|| format!("failed to decode {}", path.display()))?;
    if buffer.samples.is_empty() {
        anyhow::bail!("{} contains no audio", path.display());
    }
    Ok(AudioArc::from_audio_buffer(buffer))
}

fn decode_file_to_buffer(path: &Path) -> anyhow::Result<AudioBuffer> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;

    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| anyhow::anyhow!("no default track"))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    let mut channels = track.codec_params.channels.map(|c| c.count()).unwrap_or(0) as u16;
    let track_id = track.id;

    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::debug!(path = %path.display(), reason, "skipping undecodable packet");
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count() as u16;
        }
        let duration = decoded.capacity() as u64;

        let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
        sample_buf.copy_interleaved_ref(decoded);
        samples.extend_from_slice(sample_buf.samples());
    }

    if channels == 0 {
        anyhow::bail!("unknown channel layout");
    }

    Ok(AudioBuffer {
        samples,
        sample_rate,
        channels,
    })
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    /// Write a 16-bit WAV of `frames` frames holding a ramp.
    pub fn write_wav(path: &Path, frames: usize, sample_rate: u32, channels: u16) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for frame in 0..frames {
            for _ in 0..channels {
                writer
                    .write_sample(((frame % 100) as i16) * 100)
                    .expect("write sample");
            }
        }
        writer.finalize().expect("finalize wav");
    }
}
