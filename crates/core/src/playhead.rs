//! The displayed playhead, advanced by wall-clock time between scheduler
//! calls. It never feeds sample offsets; those come from the scheduler.

/// A loop between two timeline positions, `start < end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
}

impl LoopRegion {
    pub fn new(start: f64, end: f64) -> Option<Self> {
        (start.is_finite() && end.is_finite() && start >= 0.0 && end > start)
            .then_some(Self { start, end })
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    /// Position after running past `end` to `position`.
    pub fn wrap(&self, position: f64) -> f64 {
        self.start + (position - self.end).rem_euclid(self.len())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayheadStep {
    /// Not playing; nothing moved.
    Idle,
    Advanced(f64),
    /// Ran past the loop end and jumped back; playback must be rescheduled.
    Wrapped(f64),
    /// Reached the end of the arrangement; playback stopped.
    Ended(f64),
}

#[derive(Debug, Default)]
pub struct PlayheadDriver {
    position: f64,
    playing: bool,
    loop_region: Option<LoopRegion>,
    end_time: f64,
}

impl PlayheadDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn set_position(&mut self, position: f64) {
        self.position = if position.is_finite() {
            position.max(0.0)
        } else {
            0.0
        };
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    pub fn stop(&mut self) {
        self.playing = false;
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.loop_region
    }

    pub fn set_loop(&mut self, region: Option<LoopRegion>) {
        self.loop_region = region;
    }

    /// Where playback ends when not looping.
    pub fn set_end_time(&mut self, end_time: f64) {
        self.end_time = end_time.max(0.0);
    }

    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Move the playhead forward by `dt` seconds of wall-clock time.
    ///
    /// Crossing the loop end wraps back into the loop, whether or not any
    /// clip reaches that far. Without a loop ahead, reaching the end of the
    /// arrangement stops the driver.
    pub fn advance(&mut self, dt: f64) -> PlayheadStep {
        if !self.playing || !(dt > 0.0) {
            return PlayheadStep::Idle;
        }

        let next = self.position + dt;

        // Inside an active loop the loop end governs, even past the last clip.
        if let Some(region) = self.loop_region {
            if self.position < region.end {
                if next >= region.end {
                    self.position = region.wrap(next);
                    return PlayheadStep::Wrapped(self.position);
                }
                self.position = next;
                return PlayheadStep::Advanced(next);
            }
        }

        if next >= self.end_time {
            self.position = self.end_time.max(self.position);
            self.playing = false;
            return PlayheadStep::Ended(self.position);
        }

        self.position = next;
        PlayheadStep::Advanced(next)
    }
}
