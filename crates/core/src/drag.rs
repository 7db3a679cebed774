use arranger_transport::{ClipId, TrackId};

use crate::arrangement::Arrangement;

/// What the pointer picked up.
#[derive(Debug, Clone, PartialEq)]
pub enum DragSource {
    /// A clip already on the timeline.
    Clip {
        clip: ClipId,
        origin_track: TrackId,
        origin_start: f64,
    },
    /// A sound dragged in from the library. Its pointer delta is measured
    /// from the timeline origin.
    Sound { sound_id: String },
}

/// Result of releasing a drag.
#[derive(Debug, Clone, PartialEq)]
pub enum DragCommit {
    /// The clip was moved and settled at `start`.
    Moved {
        clip: ClipId,
        track: TrackId,
        start: f64,
    },
    /// A sound was dropped; the caller decodes it and places it with
    /// [`Arrangement::place_clip`] (or on a new track when `track` is `None`).
    SoundDropped {
        sound_id: String,
        track: Option<TrackId>,
        desired_start: f64,
    },
}

/// State of one pointer drag, kept purely in data.
///
/// The committed model is not touched until [`DragSession::end`]; in between
/// a view draws the dragged item displaced by [`DragSession::preview_offset`].
#[derive(Debug, Default)]
pub struct DragSession {
    source: Option<DragSource>,
    offset: f64,
    hovered_track: Option<TrackId>,
}

impl DragSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start dragging a clip, capturing its current track and position.
    pub fn begin_clip(&mut self, arrangement: &Arrangement, clip: ClipId) -> Option<DragSource> {
        let (track, c) = arrangement.find_clip(clip)?;
        let source = DragSource::Clip {
            clip,
            origin_track: track,
            origin_start: c.start_time,
        };
        self.begin(source.clone());
        Some(source)
    }

    pub fn begin(&mut self, source: DragSource) {
        self.hovered_track = match &source {
            DragSource::Clip { origin_track, .. } => Some(*origin_track),
            DragSource::Sound { .. } => None,
        };
        self.source = Some(source);
        self.offset = 0.0;
    }

    pub fn is_active(&self) -> bool {
        self.source.is_some()
    }

    /// True while a library sound, not a timeline clip, is being dragged.
    pub fn is_sound_drag(&self) -> bool {
        matches!(self.source, Some(DragSource::Sound { .. }))
    }

    pub fn source(&self) -> Option<&DragSource> {
        self.source.as_ref()
    }

    pub fn hovered_track(&self) -> Option<TrackId> {
        self.hovered_track
    }

    /// Record pointer movement; returns the preview offset to draw with.
    ///
    /// A clip's offset is clamped so its preview never starts before 0.
    pub fn update(&mut self, pointer_delta: f64, hovered_track: Option<TrackId>) -> f64 {
        let Some(source) = &self.source else {
            return 0.0;
        };
        let origin = match source {
            DragSource::Clip { origin_start, .. } => *origin_start,
            DragSource::Sound { .. } => 0.0,
        };
        let delta = if pointer_delta.is_finite() {
            pointer_delta
        } else {
            0.0
        };
        self.offset = delta.max(-origin);
        if hovered_track.is_some() {
            self.hovered_track = hovered_track;
        }
        self.offset
    }

    pub fn preview_offset(&self) -> f64 {
        self.offset
    }

    /// Where the dragged item would start if released now, before placement.
    pub fn candidate_start(&self) -> Option<f64> {
        match self.source.as_ref()? {
            DragSource::Clip { origin_start, .. } => Some(origin_start + self.offset),
            DragSource::Sound { .. } => Some(self.offset.max(0.0)),
        }
    }

    /// Release the drag. A clip is moved onto the hovered track at the
    /// nearest free position; a sound drop is handed back to the caller.
    pub fn end(&mut self, arrangement: &mut Arrangement) -> Option<DragCommit> {
        let desired_start = self.candidate_start()?;
        let hovered = self.hovered_track.take();
        let source = self.source.take()?;
        self.offset = 0.0;

        match source {
            DragSource::Clip {
                clip, origin_track, ..
            } => {
                let track = hovered.unwrap_or(origin_track);
                match arrangement.move_clip(clip, track, desired_start) {
                    Ok(start) => Some(DragCommit::Moved { clip, track, start }),
                    Err(e) => {
                        tracing::warn!(%clip, "drag dropped: {e}");
                        None
                    }
                }
            }
            DragSource::Sound { sound_id } => Some(DragCommit::SoundDropped {
                sound_id,
                track: hovered,
                desired_start,
            }),
        }
    }

    /// Abandon the drag; the model is left as it was.
    pub fn cancel(&mut self) -> Option<DragSource> {
        self.offset = 0.0;
        self.hovered_track = None;
        self.source.take()
    }
}
