use crate::{ClipData, Project, ProjectError};
use arranger_decode::SoundProvider;
use arranger_transport::{Clip, ClipId, Track, TrackId};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// A clip whose sound could not be resolved; kept so the caller can report it.
#[derive(Debug, Clone, PartialEq)]
pub struct OfflineClip {
    pub track_id: TrackId,
    pub sound_id: String,
    pub start_time: f64,
    pub error: String,
}

#[derive(Debug)]
pub struct LoadedProject {
    pub name: String,
    pub bpm: f64,
    pub duration: f64,
    pub tracks: Vec<Track>,
    /// Clips that were dropped because their sound is missing or undecodable
    pub offline_clips: Vec<OfflineClip>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectMetadata {
    pub name: String,
    pub bpm: f64,
    pub duration: f64,
    pub track_count: usize,
    pub clip_count: usize,
}

fn load_project_data(path: &Path) -> Result<Project, ProjectError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);

    // Try JSON first, fall back to MessagePack
    serde_json::from_reader(reader).or_else(|_| {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        rmp_serde::decode::from_read(reader).map_err(ProjectError::from)
    })
}

/// Parse a project document held in memory, JSON or MessagePack.
pub fn decode_project(bytes: &[u8]) -> Result<Project, ProjectError> {
    serde_json::from_slice(bytes)
        .or_else(|_| rmp_serde::decode::from_slice(bytes).map_err(ProjectError::from))
}

pub fn load_project(path: &Path) -> Result<Project, ProjectError> {
    let project = load_project_data(path)?;
    tracing::debug!(path = %path.display(), tracks = project.tracks.len(), "project loaded");
    Ok(project)
}

pub fn load_project_metadata(path: &Path) -> Result<ProjectMetadata, ProjectError> {
    let project = load_project_data(path)?;

    let clip_count: usize = project.tracks.iter().map(|t| t.clips.len()).sum();

    Ok(ProjectMetadata {
        name: project.name,
        bpm: project.bpm,
        duration: project.duration,
        track_count: project.tracks.len(),
        clip_count,
    })
}

/// Rebuild live tracks from a stored project.
///
/// Track ids follow document order starting at 1 and clip ids are handed out
/// sequentially across the whole project. A clip whose sound the provider
/// cannot supply becomes an [`OfflineClip`] instead of failing the load.
pub fn resolve_project(project: &Project, sounds: &mut impl SoundProvider) -> LoadedProject {
    let mut tracks = Vec::with_capacity(project.tracks.len());
    let mut offline_clips = Vec::new();
    let mut next_clip = 1u64;

    for (index, track_data) in project.tracks.iter().enumerate() {
        let mut track = Track::new(TrackId(index as u64 + 1), track_data.name.clone());
        track.volume = track_data.volume.clamp(0.0, 1.0);
        track.pan = track_data.pan.clamp(-1.0, 1.0);
        track.mute = track_data.mute;
        track.solo = track_data.solo;

        for clip_data in &track_data.clips {
            let Some(audio) = sounds.load_sound(&clip_data.sound_id) else {
                tracing::warn!(
                    track = %track.id,
                    sound_id = clip_data.sound_id,
                    "sound unavailable, clip left offline"
                );
                offline_clips.push(OfflineClip {
                    track_id: track.id,
                    sound_id: clip_data.sound_id.clone(),
                    start_time: clip_data.start_time,
                    error: format!("sound '{}' could not be loaded", clip_data.sound_id),
                });
                continue;
            };

            let id = ClipId(next_clip);
            next_clip += 1;

            let clip = Clip::new(
                id,
                clip_data.sound_id.clone(),
                audio,
                clip_data.start_time,
                clip_data.offset.unwrap_or(0.0),
            )
            .with_name(display_name(&clip_data.sound_id));

            let mut clip = apply_trims(clip, clip_data);
            clip.refresh_waveform();
            track.insert_clip(clip);
        }

        tracks.push(track);
    }

    LoadedProject {
        name: project.name.clone(),
        bpm: project.bpm,
        duration: project.duration,
        tracks,
        offline_clips,
    }
}

/// Trims come from `trimStart`/`trimEnd`; a missing `trimEnd` is derived
/// from the stored duration when there is one.
fn apply_trims(clip: Clip, data: &ClipData) -> Clip {
    let trim_start = data.trim_start.unwrap_or(0.0);
    let trim_end = match (data.trim_end, data.duration) {
        (Some(trim_end), _) => trim_end,
        (None, Some(duration)) => (clip.original_duration - trim_start - duration).max(0.0),
        (None, None) => 0.0,
    };

    if trim_start == 0.0 && trim_end == 0.0 {
        return clip;
    }

    let id = clip.id;
    let untrimmed = clip.clone();
    clip.with_trim(trim_start, trim_end).unwrap_or_else(|| {
        tracing::warn!(
            clip = %id,
            trim_start,
            trim_end,
            "stored trims leave nothing audible, loading untrimmed"
        );
        untrimmed
    })
}

fn display_name(sound_id: &str) -> String {
    Path::new(sound_id)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| sound_id.to_string())
}
