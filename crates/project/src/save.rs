use crate::{ClipData, Project, ProjectError, TrackData};
use arranger_transport::{Clip, Track};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

fn non_zero(value: f64) -> Option<f64> {
    (value != 0.0).then_some(value)
}

impl Project {
    /// Snapshot live tracks. Audio is referenced by sound id only.
    pub fn from_tracks(name: impl Into<String>, bpm: f64, tracks: &[Track]) -> Self {
        Self {
            name: name.into(),
            bpm,
            duration: tracks.iter().map(Track::end_time).fold(0.0, f64::max),
            tracks: tracks
                .iter()
                .map(|track| TrackData {
                    name: track.name.clone(),
                    volume: track.volume,
                    pan: track.pan,
                    mute: track.mute,
                    solo: track.solo,
                    clips: track.clips().iter().map(ClipData::from).collect(),
                })
                .collect(),
        }
    }
}

impl From<&Clip> for ClipData {
    fn from(clip: &Clip) -> Self {
        Self {
            sound_id: clip.sound_id.clone(),
            start_time: clip.start_time,
            duration: Some(clip.duration),
            trim_start: non_zero(clip.trim_start),
            trim_end: non_zero(clip.trim_end),
            offset: non_zero(clip.offset),
        }
    }
}

/// Pretty-printed JSON, the format written to disk.
pub fn encode_project(project: &Project) -> Result<Vec<u8>, ProjectError> {
    Ok(serde_json::to_vec_pretty(project)?)
}

pub fn encode_project_msgpack(project: &Project) -> Result<Vec<u8>, ProjectError> {
    Ok(rmp_serde::encode::to_vec_named(project)?)
}

pub fn save_project(path: &Path, project: &Project) -> Result<(), ProjectError> {
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, project)?;

    tracing::info!(path = %path.display(), tracks = project.tracks.len(), "project saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{load_project, resolve_project};
    use arranger_transport::{AudioArc, ClipId, TrackId};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn create_test_track(audio: &AudioArc) -> Track {
        let mut track = Track::new(TrackId(1), "Test Track".to_string());
        track.volume = 0.9;
        track.pan = -0.5;
        track.insert_clip(Clip::new(ClipId(1), "kick.wav", audio.clone(), 0.0, 0.0));
        track.insert_clip(
            Clip::new(ClipId(2), "kick.wav", audio.clone(), 1.5, 0.0)
                .with_trim(0.25, 0.0)
                .unwrap(),
        );
        track
    }

    #[test]
    fn test_from_tracks_writes_only_set_fields() {
        let audio = AudioArc::new(vec![0.0; 48000], 48000, 1);
        let project = Project::from_tracks("Song", 120.0, &[create_test_track(&audio)]);

        assert_eq!(project.duration, 2.25);
        let clips = &project.tracks[0].clips;
        assert_eq!(clips[0].trim_start, None);
        assert_eq!(clips[0].duration, Some(1.0));
        assert_eq!(clips[1].trim_start, Some(0.25));
        assert_eq!(clips[1].trim_end, None);
        assert_eq!(clips[1].offset, None);
    }

    #[test]
    fn test_save_and_reload_roundtrip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("song.json");
        let audio = AudioArc::new(vec![0.0; 48000], 48000, 1);

        let project = Project::from_tracks("Song", 120.0, &[create_test_track(&audio)]);
        save_project(&path, &project).expect("save");

        let reloaded = load_project(&path).expect("load");
        assert_eq!(reloaded, project);

        let mut sounds = HashMap::new();
        sounds.insert("kick.wav".to_string(), audio);
        let loaded = resolve_project(&reloaded, &mut sounds);

        let track = &loaded.tracks[0];
        assert_eq!(track.volume, 0.9);
        assert_eq!(track.pan, -0.5);
        assert_eq!(track.clips().len(), 2);
        assert_eq!(track.clips()[1].start_time, 1.5);
        assert_eq!(track.clips()[1].trim_start, 0.25);
        assert!((track.clips()[1].duration - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_encoders_agree() {
        let audio = AudioArc::new(vec![0.0; 96000], 48000, 2);
        let project = Project::from_tracks("Song", 90.0, &[create_test_track(&audio)]);

        let json = encode_project(&project).unwrap();
        let msgpack = encode_project_msgpack(&project).unwrap();

        assert!(msgpack.len() < json.len());
        assert_eq!(crate::decode_project(&json).unwrap(), project);
        assert_eq!(crate::decode_project(&msgpack).unwrap(), project);
    }
}
