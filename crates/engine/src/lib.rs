//! Real-time playback: the scheduler and the outputs it schedules onto.

mod device;
mod output;
mod scheduler;

pub use device::{CpalOutput, start};
pub use output::{AudioOutput, NullOutput, PlaybackUnit, UnitId};
pub use scheduler::{DEFAULT_LOOKAHEAD, PlaybackState, ScheduleReport, Scheduler};
