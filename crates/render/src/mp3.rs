use arranger_transport::AudioBuffer;
use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

use crate::RenderError;
use crate::wav::to_i16;

/// Samples per channel handed to the encoder at a time; one MPEG-1 Layer III
/// frame.
pub const MP3_FRAME: usize = 1152;

fn lame_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=111 => Bitrate::Kbps96,
        112..=127 => Bitrate::Kbps112,
        128..=159 => Bitrate::Kbps128,
        160..=191 => Bitrate::Kbps160,
        192..=223 => Bitrate::Kbps192,
        224..=255 => Bitrate::Kbps224,
        256..=319 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Encode to MP3 with LAME, streaming fixed-size frames and flushing at the
/// end. Mono input is encoded as dual mono.
pub fn encode_mp3(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>, RenderError> {
    let mut builder =
        Builder::new().ok_or_else(|| RenderError::Encoder("LAME init failed".to_string()))?;
    builder
        .set_num_channels(2)
        .map_err(|e| RenderError::Encoder(format!("LAME set channels failed: {e:?}")))?;
    builder
        .set_sample_rate(buffer.sample_rate)
        .map_err(|e| RenderError::Encoder(format!("LAME set sample rate failed: {e:?}")))?;
    builder
        .set_brate(lame_bitrate(bitrate_kbps))
        .map_err(|e| RenderError::Encoder(format!("LAME set bitrate failed: {e:?}")))?;
    builder
        .set_quality(Quality::Good)
        .map_err(|e| RenderError::Encoder(format!("LAME set quality failed: {e:?}")))?;
    let mut encoder = builder
        .build()
        .map_err(|e| RenderError::Encoder(format!("LAME build failed: {e:?}")))?;

    let channels = buffer.channels.max(1) as usize;
    let frames = buffer.frames();
    let mut left = Vec::with_capacity(frames);
    let mut right = Vec::with_capacity(frames);
    for frame in buffer.samples.chunks_exact(channels) {
        let l = to_i16(frame[0]);
        left.push(l);
        right.push(if channels > 1 { to_i16(frame[1]) } else { l });
    }

    let mut output: Vec<u8> = Vec::new();
    for (l, r) in left.chunks(MP3_FRAME).zip(right.chunks(MP3_FRAME)) {
        output.reserve(mp3lame_encoder::max_required_buffer_size(l.len()));
        let written = encoder
            .encode(DualPcm { left: l, right: r }, output.spare_capacity_mut())
            .map_err(|e| RenderError::Encoder(format!("LAME encode failed: {e:?}")))?;
        // SAFETY: the encoder initialised `written` bytes of spare capacity
        unsafe {
            output.set_len(output.len() + written);
        }
    }

    output.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(output.spare_capacity_mut())
        .map_err(|e| RenderError::Encoder(format!("LAME flush failed: {e:?}")))?;
    // SAFETY: as above, for the flushed tail
    unsafe {
        output.set_len(output.len() + flushed);
    }

    Ok(output)
}
