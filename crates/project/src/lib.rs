mod load;
mod save;

use serde::{Deserialize, Serialize};

pub use load::{
    LoadedProject, OfflineClip, ProjectMetadata, decode_project, load_project,
    load_project_metadata, resolve_project,
};
pub use save::{encode_project, encode_project_msgpack, save_project};

/// A named arrangement as it is stored. Audio is never serialized; each clip
/// names its sound and is re-resolved through a sound provider on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub name: String,
    pub bpm: f64,
    pub duration: f64,
    pub tracks: Vec<TrackData>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackData {
    pub name: String,
    #[serde(default = "unity")]
    pub volume: f32,
    #[serde(default)]
    pub pan: f32,
    #[serde(default)]
    pub mute: bool,
    #[serde(default)]
    pub solo: bool,
    #[serde(default)]
    pub clips: Vec<ClipData>,
}

fn unity() -> f32 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipData {
    pub sound_id: String,
    pub start_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trim_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<f64>,
}

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] rmp_serde::encode::Error),

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] rmp_serde::decode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_project() -> Project {
        Project {
            name: "Test Project".to_string(),
            bpm: 120.0,
            duration: 4.5,
            tracks: vec![
                TrackData {
                    name: "Drums".to_string(),
                    volume: 0.8,
                    pan: -0.2,
                    mute: false,
                    solo: false,
                    clips: vec![
                        ClipData {
                            sound_id: "drums/kick.wav".to_string(),
                            start_time: 0.0,
                            duration: None,
                            trim_start: None,
                            trim_end: None,
                            offset: None,
                        },
                        ClipData {
                            sound_id: "drums/snare.wav".to_string(),
                            start_time: 0.5,
                            duration: Some(0.25),
                            trim_start: Some(0.05),
                            trim_end: None,
                            offset: None,
                        },
                    ],
                },
                TrackData {
                    name: "Keys".to_string(),
                    volume: 1.0,
                    pan: 0.0,
                    mute: true,
                    solo: false,
                    clips: vec![],
                },
            ],
        }
    }

    #[test]
    fn test_json_uses_camel_case_keys() {
        let json = serde_json::to_string(&sample_project()).expect("serialize");

        assert!(json.contains("\"soundId\":\"drums/kick.wav\""));
        assert!(json.contains("\"startTime\":0.5"));
        assert!(json.contains("\"trimStart\":0.05"));
        assert!(!json.contains("trimEnd"));
        assert!(!json.contains("offset"));
    }

    #[test]
    fn test_json_roundtrip() {
        let project = sample_project();
        let json = serde_json::to_vec(&project).expect("serialize");
        let decoded: Project = serde_json::from_slice(&json).expect("deserialize");
        assert_eq!(decoded, project);
    }

    #[test]
    fn test_msgpack_roundtrip() {
        let project = sample_project();
        let bytes = rmp_serde::encode::to_vec_named(&project).expect("serialize");
        let decoded: Project = rmp_serde::decode::from_slice(&bytes).expect("deserialize");
        assert_eq!(decoded, project);
    }

    #[test]
    fn test_minimal_document_defaults() {
        let json = r#"{
            "name": "Sketch",
            "bpm": 90,
            "duration": 2,
            "tracks": [{ "name": "One", "clips": [{ "soundId": "a.wav", "startTime": 1 }] }]
        }"#;

        let project: Project = serde_json::from_str(json).expect("deserialize");
        let track = &project.tracks[0];

        assert_eq!(track.volume, 1.0);
        assert_eq!(track.pan, 0.0);
        assert!(!track.mute && !track.solo);
        assert_eq!(track.clips[0].start_time, 1.0);
        assert!(track.clips[0].duration.is_none());
    }
}
