use std::io::Cursor;

use arranger_transport::AudioBuffer;

use crate::RenderError;

/// Scale a float sample into the signed 16-bit range, clamping hard.
#[inline]
pub(crate) fn to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode as a 16-bit PCM RIFF/WAVE file in memory.
pub fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, RenderError> {
    let spec = hound::WavSpec {
        channels: buffer.channels,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut bytes = Vec::with_capacity(44 + buffer.samples.len() * 2);
    let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
        .map_err(|e| RenderError::Encoder(e.to_string()))?;

    for &sample in &buffer.samples {
        writer
            .write_sample(to_i16(sample))
            .map_err(|e| RenderError::Encoder(e.to_string()))?;
    }

    writer
        .finalize()
        .map_err(|e| RenderError::Encoder(e.to_string()))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk_size(bytes: &[u8], id: &[u8; 4]) -> Option<u32> {
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let size = u32::from_le_bytes(bytes[pos + 4..pos + 8].try_into().ok()?);
            if &bytes[pos..pos + 4] == id {
                return Some(size);
            }
            pos += 8 + size as usize;
        }
        None
    }

    #[test]
    fn test_header_describes_pcm16() {
        let buffer = AudioBuffer::silence(100, 44100, 2);
        let bytes = encode_wav(&buffer).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u16::from_le_bytes([bytes[22], bytes[23]]), 2);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 44100);
        assert_eq!(u16::from_le_bytes([bytes[34], bytes[35]]), 16);
        assert_eq!(chunk_size(&bytes, b"data"), Some(400));
    }

    #[test]
    fn test_samples_are_clamped() {
        assert_eq!(to_i16(2.0), 32767);
        assert_eq!(to_i16(-2.0), -32768);
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(0.5), 16383);
    }

    #[test]
    fn test_round_trips_through_reader() {
        let buffer = AudioBuffer {
            samples: vec![0.0, 1.5, -1.5, 0.25],
            sample_rate: 48000,
            channels: 1,
        };
        let bytes = encode_wav(&buffer).unwrap();

        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![0, 32767, -32768, 8191]);
    }
}
