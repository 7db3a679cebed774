use crate::clip::{Clip, ClipId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(pub u64);

impl std::fmt::Display for TrackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "track#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    pub id: TrackId,
    pub name: String,
    /// Sorted by `start_time`. Overlap is tolerated here; placement keeps
    /// committed states free of it.
    clips: Vec<Clip>,
    pub volume: f32,
    pub pan: f32,
    pub mute: bool,
    pub solo: bool,
}

impl Track {
    pub fn new(id: TrackId, name: String) -> Self {
        Self {
            id,
            name,
            clips: Vec::new(),
            volume: 1.0,
            pan: 0.0,
            mute: false,
            solo: false,
        }
    }

    pub fn from_clips(id: TrackId, name: String, clips: Vec<Clip>) -> Self {
        let mut track = Self::new(id, name);
        for clip in clips {
            track.insert_clip(clip);
        }
        track
    }

    pub fn clips(&self) -> &[Clip] {
        &self.clips
    }

    pub fn clip(&self, id: ClipId) -> Option<&Clip> {
        self.clips.iter().find(|c| c.id == id)
    }

    pub fn contains_clip(&self, id: ClipId) -> bool {
        self.clips.iter().any(|c| c.id == id)
    }

    pub fn clear_clips(&mut self) {
        self.clips.clear();
    }

    /// Insert keeping clips ordered by start time.
    pub fn insert_clip(&mut self, clip: Clip) {
        let index = self.clips.partition_point(|c| c.start_time <= clip.start_time);
        self.clips.insert(index, clip);
    }

    pub fn remove_clip(&mut self, id: ClipId) -> Option<Clip> {
        let index = self.clips.iter().position(|c| c.id == id)?;
        Some(self.clips.remove(index))
    }

    /// Mutate one clip in place; ordering is restored afterwards.
    pub fn update_clip<R>(&mut self, id: ClipId, f: impl FnOnce(&mut Clip) -> R) -> Option<R> {
        let clip = self.clips.iter_mut().find(|c| c.id == id)?;
        let result = f(clip);
        self.clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
        Some(result)
    }

    /// Apply `f` to every clip; ordering is restored afterwards.
    pub fn update_clips(&mut self, mut f: impl FnMut(&mut Clip)) {
        for clip in &mut self.clips {
            f(clip);
        }
        self.clips.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));
    }

    /// End of the last audible clip, 0 for an empty track.
    pub fn end_time(&self) -> f64 {
        self.clips.iter().map(Clip::end_time).fold(0.0, f64::max)
    }
}

/// A clip ready for the scheduler or renderer, with its track's mix applied.
#[derive(Debug, Clone)]
pub struct PlayableClip {
    pub track: TrackId,
    pub clip: Clip,
    pub gain: f32,
    pub pan: f32,
}

/// Flatten tracks into what should sound, honouring mute and solo.
///
/// When any track is soloed only soloed tracks play; otherwise every
/// non-muted track plays.
pub fn resolve_playable_clips(tracks: &[Track]) -> Vec<PlayableClip> {
    let any_solo = tracks.iter().any(|t| t.solo);
    tracks
        .iter()
        .filter(|t| if any_solo { t.solo } else { !t.mute })
        .flat_map(|track| {
            track.clips().iter().map(move |clip| PlayableClip {
                track: track.id,
                clip: clip.clone(),
                gain: track.volume,
                pan: track.pan,
            })
        })
        .collect()
}

/// Latest clip end across `clips`.
pub fn playable_end_time(clips: &[PlayableClip]) -> f64 {
    clips.iter().map(|p| p.clip.end_time()).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioArc;

    fn clip(id: u64, start_time: f64) -> Clip {
        let audio = AudioArc::new(vec![0.0; 4800], 48000, 1);
        Clip::new(ClipId(id), "tick", audio, start_time, 0.0)
    }

    fn track(id: u64, clips: Vec<Clip>) -> Track {
        Track::from_clips(TrackId(id), format!("Track {id}"), clips)
    }

    #[test]
    fn test_insert_keeps_start_order() {
        let mut track = Track::new(TrackId(1), "Drums".to_string());
        track.insert_clip(clip(1, 2.0));
        track.insert_clip(clip(2, 0.5));
        track.insert_clip(clip(3, 1.0));

        let starts: Vec<f64> = track.clips().iter().map(|c| c.start_time).collect();
        assert_eq!(starts, vec![0.5, 1.0, 2.0]);
    }

    #[test]
    fn test_update_clip_resorts() {
        let mut track = track(1, vec![clip(1, 0.0), clip(2, 1.0)]);
        track.update_clip(ClipId(1), |c| c.start_time = 3.0).unwrap();

        assert_eq!(track.clips()[0].id, ClipId(2));
        assert_eq!(track.clips()[1].id, ClipId(1));
    }

    #[test]
    fn test_update_unknown_clip() {
        let mut track = track(1, vec![clip(1, 0.0)]);
        assert!(track.update_clip(ClipId(9), |c| c.start_time = 1.0).is_none());
    }

    #[test]
    fn test_remove_clip() {
        let mut track = track(1, vec![clip(1, 0.0), clip(2, 1.0)]);
        let removed = track.remove_clip(ClipId(1)).unwrap();

        assert_eq!(removed.id, ClipId(1));
        assert_eq!(track.clips().len(), 1);
        assert!(track.remove_clip(ClipId(1)).is_none());
    }

    #[test]
    fn test_end_time() {
        let track = track(1, vec![clip(1, 0.0), clip(2, 1.0)]);
        assert!((track.end_time() - 1.1).abs() < 1e-9);
        assert_eq!(Track::new(TrackId(2), String::new()).end_time(), 0.0);
    }

    #[test]
    fn test_muted_tracks_are_dropped() {
        let mut muted = track(1, vec![clip(1, 0.0)]);
        muted.mute = true;
        let audible = track(2, vec![clip(2, 0.0), clip(3, 1.0)]);

        let playable = resolve_playable_clips(&[muted, audible]);

        assert_eq!(playable.len(), 2);
        assert!(playable.iter().all(|p| p.track == TrackId(2)));
    }

    #[test]
    fn test_solo_wins_over_mute_state() {
        let mut soloed = track(1, vec![clip(1, 0.0)]);
        soloed.solo = true;
        soloed.mute = true;
        soloed.volume = 0.5;
        soloed.pan = -0.25;
        let other = track(2, vec![clip(2, 0.0)]);

        let playable = resolve_playable_clips(&[soloed, other]);

        assert_eq!(playable.len(), 1);
        assert_eq!(playable[0].clip.id, ClipId(1));
        assert_eq!(playable[0].gain, 0.5);
        assert_eq!(playable[0].pan, -0.25);
    }

    #[test]
    fn test_playable_end_time() {
        let playable = resolve_playable_clips(&[track(1, vec![clip(1, 2.0)])]);
        assert!((playable_end_time(&playable) - 2.1).abs() < 1e-9);
        assert_eq!(playable_end_time(&[]), 0.0);
    }
}
