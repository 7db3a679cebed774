use arranger_transport::AudioArc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(pub u64);

/// One fire-and-forget buffer playback: start `audio` at audio-clock time
/// `when`, reading `length` seconds from `offset` seconds into the buffer.
#[derive(Debug, Clone)]
pub struct PlaybackUnit {
    pub audio: AudioArc,
    pub when: f64,
    pub offset: f64,
    pub length: f64,
    pub gain: f32,
    pub pan: f32,
}

/// The host audio subsystem the scheduler hands units to.
///
/// The clock is monotonic and only ever read; once started, a unit plays
/// on its own until it ends or is stopped. Starts and stops may be staged
/// until [`AudioOutput::commit`], which the scheduler calls once per batch.
pub trait AudioOutput {
    /// Current audio-clock time in seconds.
    fn now(&self) -> f64;

    fn start_unit(&mut self, unit: PlaybackUnit) -> anyhow::Result<UnitId>;

    /// Halt a unit. Unknown or finished ids are ignored.
    fn stop_unit(&mut self, id: UnitId);

    /// Apply every start and stop made since the last commit.
    fn commit(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Output without a device: a manually advanced clock and a record of the
/// units currently started. Useful for headless hosts and tests.
#[derive(Debug, Default)]
pub struct NullOutput {
    now: f64,
    next_id: u64,
    active: Vec<(UnitId, PlaybackUnit)>,
    started_total: usize,
    commits: usize,
}

impl NullOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&mut self, seconds: f64) {
        self.now += seconds.max(0.0);
    }

    pub fn active(&self) -> &[(UnitId, PlaybackUnit)] {
        &self.active
    }

    pub fn started_total(&self) -> usize {
        self.started_total
    }

    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl AudioOutput for NullOutput {
    fn now(&self) -> f64 {
        self.now
    }

    fn start_unit(&mut self, unit: PlaybackUnit) -> anyhow::Result<UnitId> {
        let id = UnitId(self.next_id);
        self.next_id += 1;
        self.active.push((id, unit));
        self.started_total += 1;
        Ok(id)
    }

    fn stop_unit(&mut self, id: UnitId) {
        self.active.retain(|(active, _)| *active != id);
    }

    fn commit(&mut self) -> anyhow::Result<()> {
        self.commits += 1;
        Ok(())
    }
}
