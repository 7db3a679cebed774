use arranger_transport::{PlayableClip, plan_playback};

use crate::output::{AudioOutput, PlaybackUnit, UnitId};

/// Lead time between `play` and the first unit start, so every start call
/// lands in the future on the audio clock.
pub const DEFAULT_LOOKAHEAD: f64 = 0.005;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScheduleReport {
    /// Audio-clock time that corresponds to the timeline origin.
    pub base: f64,
    pub scheduled: usize,
    /// Clips already finished at the origin or with a negligible remainder.
    pub skipped: usize,
}

/// Maps timeline positions onto audio-clock scheduled buffer playback.
///
/// There is no in-place retiming: seeking and looping are `stop` followed
/// by `play` from the new position.
pub struct Scheduler<O: AudioOutput> {
    output: O,
    lookahead: f64,
    state: PlaybackState,
    active: Vec<UnitId>,
    schedule_base: f64,
    timeline_origin: f64,
}

impl<O: AudioOutput> Scheduler<O> {
    pub fn new(output: O) -> Self {
        Self::with_lookahead(output, DEFAULT_LOOKAHEAD)
    }

    pub fn with_lookahead(output: O, lookahead: f64) -> Self {
        Self {
            output,
            lookahead: lookahead.max(0.0),
            state: PlaybackState::Stopped,
            active: Vec::new(),
            schedule_base: 0.0,
            timeline_origin: 0.0,
        }
    }

    /// Start (or restart) playback of `clips` from timeline position `from`.
    ///
    /// All units share one schedule base, so their relative timing is exact,
    /// and reach the output as a single commit. If the output refuses a unit
    /// or the commit, everything scheduled by this call is stopped again and
    /// the error is returned.
    pub fn play(&mut self, clips: &[PlayableClip], from: f64) -> anyhow::Result<ScheduleReport> {
        if self.state.is_playing() {
            self.stop();
        }

        let from = from.max(0.0);
        let base = self.output.now() + self.lookahead;
        let mut scheduled = 0;
        let mut skipped = 0;

        for playable in clips {
            let Some(span) = plan_playback(&playable.clip, from) else {
                tracing::trace!(clip = %playable.clip.id, from, "nothing left to play");
                skipped += 1;
                continue;
            };

            let unit = PlaybackUnit {
                audio: playable.clip.audio.clone(),
                when: base + span.delay,
                offset: span.offset,
                length: span.length,
                gain: playable.gain,
                pan: playable.pan,
            };

            match self.output.start_unit(unit) {
                Ok(id) => {
                    self.active.push(id);
                    scheduled += 1;
                }
                Err(e) => {
                    self.release_units();
                    return Err(e.context(format!("failed to schedule {}", playable.clip.id)));
                }
            }
        }

        if let Err(e) = self.output.commit() {
            self.release_units();
            return Err(e.context("failed to start playback"));
        }

        self.schedule_base = base;
        self.timeline_origin = from;
        self.state = PlaybackState::Playing;
        tracing::debug!(from, base, scheduled, skipped, "playback scheduled");

        Ok(ScheduleReport {
            base,
            scheduled,
            skipped,
        })
    }

    /// Halt and release every scheduled unit. Idempotent.
    pub fn stop(&mut self) {
        if self.state.is_playing() {
            tracing::debug!(units = self.active.len(), "playback stopped");
        }
        self.release_units();
        self.state = PlaybackState::Stopped;
    }

    /// There is no paused audio state; the caller keeps the playhead and
    /// resumes with `play`.
    pub fn pause(&mut self) {
        self.stop();
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn schedule_base(&self) -> f64 {
        self.schedule_base
    }

    pub fn timeline_origin(&self) -> f64 {
        self.timeline_origin
    }

    pub fn active_units(&self) -> usize {
        self.active.len()
    }

    pub fn output(&self) -> &O {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut O {
        &mut self.output
    }

    fn release_units(&mut self) {
        for id in self.active.drain(..) {
            self.output.stop_unit(id);
        }
        if let Err(e) = self.output.commit() {
            tracing::warn!("failed to release units: {e}");
        }
    }
}
