use arranger_render::ExportSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::edit::MIN_CLIP_DURATION;
use crate::placement::PLACEMENT_GAP;

/// Tunables for editing, scheduling and export, read from
/// `<config_dir>/arranger/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Seconds left between a placed clip and the one it was pushed past.
    pub placement_gap: f64,
    /// Shortest audible span a trim may leave.
    pub min_clip_duration: f64,
    /// Seconds between `play` and the first scheduled unit on the audio clock.
    pub schedule_lookahead: f64,
    pub export: ExportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            placement_gap: PLACEMENT_GAP,
            min_clip_duration: MIN_CLIP_DURATION,
            schedule_lookahead: arranger_engine::DEFAULT_LOOKAHEAD,
            export: ExportConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub mp3_bitrate_kbps: u32,
}

impl Default for ExportConfig {
    fn default() -> Self {
        let settings = ExportSettings::default();
        Self {
            sample_rate: settings.sample_rate,
            channels: settings.channels,
            mp3_bitrate_kbps: settings.mp3_bitrate_kbps,
        }
    }
}

impl From<ExportConfig> for ExportSettings {
    fn from(config: ExportConfig) -> Self {
        ExportSettings {
            sample_rate: config.sample_rate,
            channels: config.channels,
            mp3_bitrate_kbps: config.mp3_bitrate_kbps,
        }
    }
}

impl EngineConfig {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("arranger").join("config.toml"))
    }

    /// User configuration, or defaults when there is none.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("no config directory, using defaults");
                Self::default()
            }
        }
    }

    /// Read `path`; missing or malformed files yield defaults.
    pub fn load_from(path: &Path) -> Self {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) => {
                tracing::debug!(path = %path.display(), "config not read: {e}");
                return Self::default();
            }
        };

        match toml::from_str::<Self>(&contents) {
            Ok(config) => config.sanitized(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "invalid config, using defaults: {e}");
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = Self::config_path()
            .ok_or_else(|| anyhow::anyhow!("no config directory on this platform"))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Replace out-of-range values with their defaults.
    fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if !(self.placement_gap.is_finite() && self.placement_gap >= 0.0) {
            tracing::warn!(value = self.placement_gap, "ignoring placement_gap");
            self.placement_gap = defaults.placement_gap;
        }
        if !(self.min_clip_duration.is_finite() && self.min_clip_duration > 0.0) {
            tracing::warn!(value = self.min_clip_duration, "ignoring min_clip_duration");
            self.min_clip_duration = defaults.min_clip_duration;
        }
        if !(self.schedule_lookahead.is_finite() && self.schedule_lookahead >= 0.0) {
            tracing::warn!(value = self.schedule_lookahead, "ignoring schedule_lookahead");
            self.schedule_lookahead = defaults.schedule_lookahead;
        }
        self
    }
}
