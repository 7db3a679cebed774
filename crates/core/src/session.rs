use std::path::{Path, PathBuf};

use arranger_decode::{ImportFailure, SoundProvider, decode_batch};
use arranger_engine::{AudioOutput, PlaybackState, ScheduleReport, Scheduler};
use arranger_project::{OfflineClip, Project, resolve_project};
use arranger_render::{ExportFormat, ExportedAudio, RenderError};
use arranger_transport::{ClipId, TrackId};

use crate::arrangement::Arrangement;
use crate::config::EngineConfig;
use crate::edit::EditError;
use crate::playhead::{LoopRegion, PlayheadDriver, PlayheadStep};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Edit(#[from] EditError),

    #[error("playback failed: {0:#}")]
    Playback(#[source] anyhow::Error),

    #[error("import failed: {0:#}")]
    Import(#[source] anyhow::Error),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("invalid loop region {start}..{end}")]
    InvalidLoop { start: f64, end: f64 },
}

#[derive(Debug, Default)]
pub struct ImportSummary {
    pub placed: Vec<(TrackId, ClipId)>,
    pub failures: Vec<ImportFailure>,
}

/// An arrangement wired to a scheduler and a playhead.
///
/// Every transport action goes through stop + play on the scheduler, so a
/// seek, a loop wrap or an edit while playing all reschedule from the
/// current playhead with the same sample math.
pub struct Session<O: AudioOutput> {
    name: String,
    bpm: f64,
    arrangement: Arrangement,
    scheduler: Scheduler<O>,
    playhead: PlayheadDriver,
    config: EngineConfig,
    sound_root: Option<PathBuf>,
}

impl<O: AudioOutput> Session<O> {
    pub fn new(output: O, config: EngineConfig) -> Self {
        Self {
            name: "Untitled".to_string(),
            bpm: 120.0,
            arrangement: Arrangement::new(&config),
            scheduler: Scheduler::with_lookahead(output, config.schedule_lookahead),
            playhead: PlayheadDriver::new(),
            config,
            sound_root: None,
        }
    }

    /// Open a stored project, resolving its sounds through `sounds`.
    /// Clips whose sound is unavailable are returned rather than loaded.
    pub fn from_project(
        output: O,
        config: EngineConfig,
        project: &Project,
        sounds: &mut impl SoundProvider,
    ) -> (Self, Vec<OfflineClip>) {
        let loaded = resolve_project(project, sounds);
        let mut session = Self::new(output, config);
        session.name = loaded.name;
        session.bpm = loaded.bpm;
        session.arrangement = Arrangement::from_tracks(loaded.tracks, &session.config);
        session.playhead.set_end_time(session.arrangement.duration());

        tracing::info!(
            name = session.name,
            tracks = session.arrangement.tracks().len(),
            offline = loaded.offline_clips.len(),
            "project opened"
        );
        (session, loaded.offline_clips)
    }

    /// Snapshot for saving.
    pub fn to_project(&self) -> Project {
        Project::from_tracks(self.name.clone(), self.bpm, self.arrangement.tracks())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Imported files under `root` are stored by their path relative to it.
    pub fn set_sound_root(&mut self, root: impl Into<PathBuf>) {
        self.sound_root = Some(root.into());
    }

    pub fn arrangement(&self) -> &Arrangement {
        &self.arrangement
    }

    /// Apply an edit; if playing, playback is rescheduled from the playhead.
    pub fn edit<R>(&mut self, f: impl FnOnce(&mut Arrangement) -> R) -> Result<R, SessionError> {
        let result = f(&mut self.arrangement);
        self.playhead.set_end_time(self.arrangement.duration());
        self.reschedule()?;
        Ok(result)
    }

    pub fn output(&self) -> &O {
        self.scheduler.output()
    }

    pub fn output_mut(&mut self) -> &mut O {
        self.scheduler.output_mut()
    }

    pub fn state(&self) -> PlaybackState {
        self.scheduler.state()
    }

    pub fn is_playing(&self) -> bool {
        self.scheduler.is_playing()
    }

    pub fn position(&self) -> f64 {
        self.playhead.position()
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.playhead.loop_region()
    }

    pub fn play(&mut self) -> Result<ScheduleReport, SessionError> {
        self.playhead.set_end_time(self.arrangement.duration());
        let report = self.schedule_from(self.playhead.position())?;
        self.playhead.start();
        Ok(report)
    }

    /// Stop sounding but keep the playhead where it is.
    pub fn pause(&mut self) {
        self.scheduler.pause();
        self.playhead.stop();
    }

    /// Stop and rewind to the start.
    pub fn stop(&mut self) {
        self.scheduler.stop();
        self.playhead.stop();
        self.playhead.set_position(0.0);
    }

    pub fn seek(&mut self, position: f64) -> Result<(), SessionError> {
        self.playhead.set_position(position);
        tracing::debug!(position = self.playhead.position(), "seek");
        self.reschedule()?;
        Ok(())
    }

    /// Set or clear the loop. Takes effect the next time the playhead
    /// reaches the loop end.
    pub fn set_loop(&mut self, region: Option<(f64, f64)>) -> Result<(), SessionError> {
        let region = match region {
            Some((start, end)) => {
                Some(LoopRegion::new(start, end).ok_or(SessionError::InvalidLoop { start, end })?)
            }
            None => None,
        };
        tracing::debug!(?region, "loop set");
        self.playhead.set_loop(region);
        Ok(())
    }

    /// Advance the playhead by `dt` seconds, wrapping into the loop or
    /// stopping at the end of the arrangement.
    pub fn tick(&mut self, dt: f64) -> Result<PlayheadStep, SessionError> {
        let step = self.playhead.advance(dt);
        match step {
            PlayheadStep::Wrapped(position) => {
                tracing::debug!(position, "loop wrapped");
                self.schedule_from(position)?;
            }
            PlayheadStep::Ended(position) => {
                tracing::debug!(position, "reached end");
                self.scheduler.stop();
            }
            PlayheadStep::Idle | PlayheadStep::Advanced(_) => {}
        }
        Ok(step)
    }

    /// Restart playback from the playhead if playing; `None` otherwise.
    pub fn reschedule(&mut self) -> Result<Option<ScheduleReport>, SessionError> {
        if !self.scheduler.is_playing() {
            return Ok(None);
        }
        self.schedule_from(self.playhead.position()).map(Some)
    }

    fn schedule_from(&mut self, position: f64) -> Result<ScheduleReport, SessionError> {
        let clips = self.arrangement.playable_clips();
        self.scheduler.play(&clips, position).map_err(|e| {
            self.playhead.stop();
            SessionError::Playback(e)
        })
    }

    /// Decode `paths` and place each decoded sound on `track` (or the active
    /// track, or a new one) at the playhead, one after another. Files that
    /// fail to decode are reported, not fatal, unless all of them fail.
    pub fn import_files<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        track: Option<TrackId>,
    ) -> Result<ImportSummary, SessionError> {
        let batch = decode_batch(paths).map_err(SessionError::Import)?;
        let desired = self.playhead.position();
        let mut target = track.or(self.arrangement.active_track());
        let mut placed = Vec::with_capacity(batch.sounds.len());

        for sound in batch.sounds {
            let sound_id = self.sound_id_for(&sound.path);
            let entry = match target {
                Some(track) => {
                    let clip = self
                        .arrangement
                        .place_clip(track, sound_id, sound.audio, desired)?;
                    (track, clip)
                }
                None => {
                    let (track, clip) =
                        self.arrangement
                            .place_clip_on_new_track(sound_id, sound.audio, desired);
                    target = Some(track);
                    (track, clip)
                }
            };
            placed.push(entry);
        }

        tracing::info!(
            placed = placed.len(),
            failed = batch.failures.len(),
            "import finished"
        );
        self.playhead.set_end_time(self.arrangement.duration());
        self.reschedule()?;

        Ok(ImportSummary {
            placed,
            failures: batch.failures,
        })
    }

    /// Render the whole arrangement from 0 and encode it.
    pub fn export(&self, format: ExportFormat) -> Result<ExportedAudio, SessionError> {
        let clips = self.arrangement.playable_clips();
        let duration = self.arrangement.duration();
        Ok(arranger_render::export(
            &clips,
            duration,
            &self.config.export.into(),
            format,
        )?)
    }

    fn sound_id_for(&self, path: &Path) -> String {
        let relative = self
            .sound_root
            .as_deref()
            .and_then(|root| path.strip_prefix(root).ok())
            .unwrap_or(path);
        relative.to_string_lossy().replace('\\', "/")
    }
}
