use std::path::Path;
use std::sync::Arc;

use arranger_transport::{
    AudioArc, Clip, ClipId, PlayableClip, Track, TrackId, WaveformData, resolve_playable_clips,
};

use crate::config::EngineConfig;
use crate::edit::{self, EditError, TrimOutcome, TrimSide};
use crate::placement::find_free_start_excluding;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

/// Change notifications delivered to subscribers after each mutation.
#[derive(Debug, Clone, PartialEq)]
pub enum ArrangementEvent {
    TrackAdded(TrackId),
    TrackRemoved(TrackId),
    /// Name, mix, mute or solo changed.
    TrackChanged(TrackId),
    ClipAdded { track: TrackId, clip: ClipId },
    ClipRemoved { track: TrackId, clip: ClipId },
    /// Position, trims or track changed.
    ClipChanged { track: TrackId, clip: ClipId },
    /// The clip's waveform overview needs regenerating.
    WaveformStale { track: TrackId, clip: ClipId },
}

type Observer = Box<dyn FnMut(&ArrangementEvent)>;

/// The tracks of one arrangement and every mutation allowed on them.
///
/// Clip placement always goes through the placement resolver, so committed
/// states never contain overlapping clips on one track.
pub struct Arrangement {
    tracks: Vec<Track>,
    active_track: Option<TrackId>,
    next_track: u64,
    next_clip: u64,
    placement_gap: f64,
    min_clip_duration: f64,
    observers: Vec<(ObserverId, Observer)>,
    next_observer: u64,
}

impl std::fmt::Debug for Arrangement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Arrangement")
            .field("tracks", &self.tracks)
            .field("active_track", &self.active_track)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl Default for Arrangement {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl Arrangement {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            tracks: Vec::new(),
            active_track: None,
            next_track: 1,
            next_clip: 1,
            placement_gap: config.placement_gap,
            min_clip_duration: config.min_clip_duration,
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Adopt already-built tracks, e.g. from a loaded project. New ids are
    /// allocated past the highest ones present.
    pub fn from_tracks(tracks: Vec<Track>, config: &EngineConfig) -> Self {
        let mut arrangement = Self::new(config);
        arrangement.next_track = tracks.iter().map(|t| t.id.0 + 1).max().unwrap_or(1);
        arrangement.next_clip = tracks
            .iter()
            .flat_map(|t| t.clips().iter().map(|c| c.id.0 + 1))
            .max()
            .unwrap_or(1);
        arrangement.active_track = tracks.first().map(|t| t.id);
        arrangement.tracks = tracks;
        arrangement
    }

    pub fn subscribe(&mut self, observer: impl FnMut(&ArrangementEvent) + 'static) -> ObserverId {
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push((id, Box::new(observer)));
        id
    }

    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(observer, _)| *observer != id);
        self.observers.len() != before
    }

    fn emit(&mut self, event: ArrangementEvent) {
        for (_, observer) in &mut self.observers {
            observer(&event);
        }
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Locate a clip on any track.
    pub fn find_clip(&self, id: ClipId) -> Option<(TrackId, &Clip)> {
        self.tracks
            .iter()
            .find_map(|t| t.clip(id).map(|c| (t.id, c)))
    }

    pub fn active_track(&self) -> Option<TrackId> {
        self.active_track
    }

    pub fn set_active_track(&mut self, id: TrackId) -> Result<(), EditError> {
        self.track_index(id)?;
        self.active_track = Some(id);
        Ok(())
    }

    /// Latest clip end across every track.
    pub fn duration(&self) -> f64 {
        self.tracks.iter().map(Track::end_time).fold(0.0, f64::max)
    }

    /// What should sound right now, with mute and solo applied.
    pub fn playable_clips(&self) -> Vec<PlayableClip> {
        resolve_playable_clips(&self.tracks)
    }

    pub fn add_track(&mut self, name: Option<String>) -> TrackId {
        let id = TrackId(self.next_track);
        self.next_track += 1;
        let name = name.unwrap_or_else(|| format!("Track {}", id.0));

        self.tracks.push(Track::new(id, name));
        self.active_track = Some(id);
        tracing::debug!(track = %id, "track added");
        self.emit(ArrangementEvent::TrackAdded(id));
        id
    }

    /// Remove a track and its clips. If it was active, the track that took
    /// its place (or the one before it) becomes active.
    pub fn remove_track(&mut self, id: TrackId) -> Result<Track, EditError> {
        let index = self.track_index(id)?;
        let track = self.tracks.remove(index);

        if self.active_track == Some(id) {
            let neighbour = self
                .tracks
                .get(index)
                .or_else(|| index.checked_sub(1).and_then(|i| self.tracks.get(i)));
            self.active_track = neighbour.map(|t| t.id);
        }

        tracing::debug!(track = %id, clips = track.clips().len(), "track removed");
        self.emit(ArrangementEvent::TrackRemoved(id));
        Ok(track)
    }

    pub fn rename_track(&mut self, id: TrackId, name: impl Into<String>) -> Result<(), EditError> {
        self.track_mut(id)?.name = name.into();
        self.emit(ArrangementEvent::TrackChanged(id));
        Ok(())
    }

    /// Volume is clamped to 0..1 and pan to -1..1.
    pub fn set_track_mix(&mut self, id: TrackId, volume: f32, pan: f32) -> Result<(), EditError> {
        let track = self.track_mut(id)?;
        track.volume = volume.clamp(0.0, 1.0);
        track.pan = pan.clamp(-1.0, 1.0);
        self.emit(ArrangementEvent::TrackChanged(id));
        Ok(())
    }

    pub fn set_mute(&mut self, id: TrackId, mute: bool) -> Result<(), EditError> {
        self.track_mut(id)?.mute = mute;
        self.emit(ArrangementEvent::TrackChanged(id));
        Ok(())
    }

    pub fn set_solo(&mut self, id: TrackId, solo: bool) -> Result<(), EditError> {
        self.track_mut(id)?.solo = solo;
        self.emit(ArrangementEvent::TrackChanged(id));
        Ok(())
    }

    /// Place a new clip of `audio` on `track` at the first free position at
    /// or after `desired_start`.
    pub fn place_clip(
        &mut self,
        track: TrackId,
        sound_id: impl Into<String>,
        audio: AudioArc,
        desired_start: f64,
    ) -> Result<ClipId, EditError> {
        self.track_index(track)?;
        let sound_id = sound_id.into();
        let name = display_name(&sound_id);
        let clip = Clip::new(self.allocate_clip(), sound_id, audio, 0.0, 0.0).with_name(name);
        self.insert_placed(track, clip, desired_start)
    }

    /// Place a clip on a fresh track named after the sound.
    pub fn place_clip_on_new_track(
        &mut self,
        sound_id: impl Into<String>,
        audio: AudioArc,
        desired_start: f64,
    ) -> (TrackId, ClipId) {
        let sound_id = sound_id.into();
        let name = display_name(&sound_id);
        let track = self.add_track(Some(name.clone()));
        let clip = Clip::new(self.allocate_clip(), sound_id, audio, 0.0, 0.0).with_name(name);
        let id = clip.id;
        self.insert_at(track, clip, desired_start);
        (track, id)
    }

    /// Copy an existing clip, trims included, onto `target`. The copy shares
    /// the source's audio buffer.
    pub fn paste_clip(
        &mut self,
        source: ClipId,
        target: TrackId,
        desired_start: f64,
    ) -> Result<ClipId, EditError> {
        self.track_index(target)?;
        let (_, clip) = self.find_clip(source).ok_or(EditError::UnknownClip(source))?;
        let mut copy = clip.clone();
        copy.id = self.allocate_clip();
        self.insert_placed(target, copy, desired_start)
    }

    /// Move a clip to `target` (possibly its own track) at the first free
    /// position at or after `desired_start`. Returns the settled start.
    pub fn move_clip(
        &mut self,
        clip: ClipId,
        target: TrackId,
        desired_start: f64,
    ) -> Result<f64, EditError> {
        let target_index = self.track_index(target)?;
        let origin_index = self.clip_track_index(clip)?;

        let start = find_free_start_excluding(
            &self.tracks[target_index],
            desired_start,
            self.tracks[origin_index]
                .clip(clip)
                .map_or(0.0, |c| c.duration),
            Some(clip),
            self.placement_gap,
        );

        let origin = self.tracks[origin_index].id;
        if origin_index == target_index {
            self.tracks[origin_index].update_clip(clip, |c| c.start_time = start);
        } else {
            let Some(mut moved) = self.tracks[origin_index].remove_clip(clip) else {
                return Err(EditError::UnknownClip(clip));
            };
            moved.start_time = start;
            self.tracks[target_index].insert_clip(moved);
            self.emit(ArrangementEvent::ClipRemoved { track: origin, clip });
            self.emit(ArrangementEvent::ClipAdded { track: target, clip });
        }

        tracing::debug!(%clip, from = %origin, to = %target, start, "clip moved");
        self.emit(ArrangementEvent::ClipChanged { track: target, clip });
        Ok(start)
    }

    pub fn remove_clip(&mut self, clip: ClipId) -> Result<Clip, EditError> {
        let index = self.clip_track_index(clip)?;
        let track = self.tracks[index].id;
        let removed = self.tracks[index]
            .remove_clip(clip)
            .ok_or(EditError::UnknownClip(clip))?;
        self.emit(ArrangementEvent::ClipRemoved { track, clip });
        Ok(removed)
    }

    pub fn trim_clip(
        &mut self,
        clip: ClipId,
        side: TrimSide,
        delta: f64,
    ) -> Result<TrimOutcome, EditError> {
        let index = self.clip_track_index(clip)?;
        let track = self.tracks[index].id;
        let min_duration = self.min_clip_duration;
        let outcome = self.tracks[index]
            .update_clip(clip, |c| edit::trim_clip(c, side, delta, min_duration))
            .ok_or(EditError::UnknownClip(clip))?;

        if outcome.waveform_stale {
            self.emit(ArrangementEvent::ClipChanged { track, clip });
            self.emit(ArrangementEvent::WaveformStale { track, clip });
        }
        Ok(outcome)
    }

    /// Split a clip at timeline position `at`; returns the id of the new
    /// right-hand clip.
    pub fn split_clip(&mut self, clip: ClipId, at: f64) -> Result<ClipId, EditError> {
        let index = self.clip_track_index(clip)?;
        let track = self.tracks[index].id;
        let new_id = ClipId(self.next_clip);

        let right = self.tracks[index]
            .update_clip(clip, |c| edit::split_clip(c, at, new_id))
            .ok_or(EditError::UnknownClip(clip))??;
        self.next_clip += 1;
        self.tracks[index].insert_clip(right);

        tracing::debug!(%clip, right = %new_id, at, "clip split");
        self.emit(ArrangementEvent::ClipChanged { track, clip });
        self.emit(ArrangementEvent::WaveformStale { track, clip });
        self.emit(ArrangementEvent::ClipAdded {
            track,
            clip: new_id,
        });
        Ok(new_id)
    }

    /// Split every clip whose window strictly contains `position`. Returns
    /// the new right-hand clips.
    pub fn split_all_at(&mut self, position: f64) -> Vec<(TrackId, ClipId)> {
        let targets: Vec<ClipId> = self
            .tracks
            .iter()
            .flat_map(|t| t.clips().iter())
            .filter(|c| c.contains_strictly(position))
            .map(|c| c.id)
            .collect();

        let mut created = Vec::with_capacity(targets.len());
        for clip in targets {
            match self.split_clip(clip, position) {
                Ok(right) => {
                    if let Some((track, _)) = self.find_clip(right) {
                        created.push((track, right));
                    }
                }
                Err(e) => tracing::warn!(%clip, "split skipped: {e}"),
            }
        }
        created
    }

    /// Regenerate a clip's waveform overview for its current trim window.
    pub fn refresh_waveform(&mut self, clip: ClipId) -> Result<Arc<WaveformData>, EditError> {
        let index = self.clip_track_index(clip)?;
        let track = self.tracks[index].id;
        let waveform = self.tracks[index]
            .update_clip(clip, Clip::refresh_waveform)
            .ok_or(EditError::UnknownClip(clip))?;
        self.emit(ArrangementEvent::ClipChanged { track, clip });
        Ok(waveform)
    }

    fn allocate_clip(&mut self) -> ClipId {
        let id = ClipId(self.next_clip);
        self.next_clip += 1;
        id
    }

    fn insert_placed(
        &mut self,
        track: TrackId,
        clip: Clip,
        desired_start: f64,
    ) -> Result<ClipId, EditError> {
        self.track_index(track)?;
        let id = clip.id;
        self.insert_at(track, clip, desired_start);
        Ok(id)
    }

    /// Resolve placement on an existing track and insert.
    fn insert_at(&mut self, track: TrackId, mut clip: Clip, desired_start: f64) {
        let Some(target) = self.tracks.iter_mut().find(|t| t.id == track) else {
            return;
        };
        clip.start_time = find_free_start_excluding(
            target,
            desired_start,
            clip.duration,
            None,
            self.placement_gap,
        );
        let id = clip.id;
        tracing::debug!(clip = %id, %track, start = clip.start_time, "clip placed");
        target.insert_clip(clip);
        self.emit(ArrangementEvent::ClipAdded { track, clip: id });
    }

    fn track_index(&self, id: TrackId) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| t.id == id)
            .ok_or(EditError::UnknownTrack(id))
    }

    fn track_mut(&mut self, id: TrackId) -> Result<&mut Track, EditError> {
        self.tracks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or(EditError::UnknownTrack(id))
    }

    fn clip_track_index(&self, clip: ClipId) -> Result<usize, EditError> {
        self.tracks
            .iter()
            .position(|t| t.contains_clip(clip))
            .ok_or(EditError::UnknownClip(clip))
    }
}

fn display_name(sound_id: &str) -> String {
    Path::new(sound_id)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| sound_id.to_string())
}
