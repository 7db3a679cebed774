//! Offline mixdown of an arrangement and encoding of the result.

mod mixdown;
mod mp3;
mod wav;

use arranger_transport::PlayableClip;

pub use mixdown::render_mixdown;
pub use mp3::{MP3_FRAME, encode_mp3};
pub use wav::encode_wav;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("nothing to render: duration {0} s")]
    EmptyRender(f64),

    #[error("unsupported sample rate {0}")]
    InvalidSampleRate(u32),

    #[error("unsupported channel count {0}, expected 1 or 2")]
    UnsupportedChannels(u16),

    #[error("failed to resample clip audio: {0}")]
    Resample(#[source] anyhow::Error),

    #[error("encoder error: {0}")]
    Encoder(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Wav,
    Mp3,
}

impl ExportFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::Mp3 => "audio/mp3",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::Mp3 => "mp3",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::Mp3),
            other => Err(format!("unknown export format '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExportSettings {
    pub sample_rate: u32,
    pub channels: u16,
    pub mp3_bitrate_kbps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            channels: 2,
            mp3_bitrate_kbps: 192,
        }
    }
}

/// An encoded mixdown, ready to hand to whoever saves or downloads it.
#[derive(Debug, Clone)]
pub struct ExportedAudio {
    pub format: ExportFormat,
    pub bytes: Vec<u8>,
}

impl ExportedAudio {
    pub fn mime(&self) -> &'static str {
        self.format.mime()
    }
}

/// Render `clips` for `duration` seconds and encode the result.
///
/// Nothing is returned unless both rendering and encoding succeed.
pub fn export(
    clips: &[PlayableClip],
    duration: f64,
    settings: &ExportSettings,
    format: ExportFormat,
) -> Result<ExportedAudio, RenderError> {
    let buffer = render_mixdown(clips, duration, settings.sample_rate, settings.channels)?;
    let bytes = match format {
        ExportFormat::Wav => encode_wav(&buffer)?,
        ExportFormat::Mp3 => encode_mp3(&buffer, settings.mp3_bitrate_kbps)?,
    };
    tracing::info!(
        mime = format.mime(),
        bytes = bytes.len(),
        duration,
        "mixdown exported"
    );
    Ok(ExportedAudio { format, bytes })
}
