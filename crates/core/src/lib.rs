//! Editing and transport on top of the timeline model: placement, trim and
//! split, the owned arrangement, drag sessions, the playhead driver and the
//! session that ties them to a scheduler.

pub mod arrangement;
pub mod config;
pub mod drag;
pub mod edit;
pub mod placement;
pub mod playhead;
pub mod session;

pub use arrangement::{Arrangement, ArrangementEvent, ObserverId};
pub use config::{EngineConfig, ExportConfig};
pub use drag::{DragCommit, DragSession, DragSource};
pub use edit::{EditError, MIN_CLIP_DURATION, TrimOutcome, TrimSide, split_clip, trim_clip};
pub use placement::{PLACEMENT_GAP, find_free_start, find_free_start_excluding};
pub use playhead::{LoopRegion, PlayheadDriver, PlayheadStep};
pub use session::{ImportSummary, Session, SessionError};

pub use arranger_decode::{SoundLibrary, SoundProvider, decode_file};
pub use arranger_engine::{
    AudioOutput, CpalOutput, NullOutput, PlaybackState, ScheduleReport, start as open_output,
};
pub use arranger_project::{
    OfflineClip, Project, ProjectError, load_project, load_project_metadata, save_project,
};
pub use arranger_render::{ExportFormat, ExportedAudio, RenderError};
pub use arranger_transport::{AudioArc, Clip, ClipId, Track, TrackId, WaveformData};
