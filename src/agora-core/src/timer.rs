//! Stage countdown timer.
//!
//! The timer does not own time. The caller feeds it one `tick()` per second
//! while it is running and reacts to the returned [`Tick`].

/// Remaining seconds at or below which the warning cue sounds.
pub const DEFAULT_WARNING_THRESHOLD: i64 = 30;

/// Result of a single one-second tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Seconds remaining after the tick.
    pub seconds: i64,
    /// The warning cue should sound on this tick.
    pub warning: bool,
    /// The countdown reached zero on this tick; the timer has stopped.
    pub completed: bool,
}

#[derive(Debug, Clone)]
pub struct Timer {
    seconds: i64,
    running: bool,
    warned: bool,
    warning_threshold: i64,
}

impl Timer {
    /// A paused timer holding `seconds`.
    pub fn new(seconds: i64) -> Self {
        Self {
            seconds,
            running: false,
            warned: false,
            warning_threshold: DEFAULT_WARNING_THRESHOLD,
        }
    }

    pub fn with_warning_threshold(mut self, threshold: i64) -> Self {
        self.warning_threshold = threshold;
        self
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance the countdown by one second.
    ///
    /// Returns `None` when the timer is paused or already at (or below) zero;
    /// in the latter case the timer stops without reporting completion again.
    pub fn tick(&mut self) -> Option<Tick> {
        if !self.running {
            return None;
        }
        if self.seconds <= 0 {
            self.running = false;
            return None;
        }

        let next = self.seconds - 1;
        self.seconds = next;

        let warning = next <= self.warning_threshold && next > 0 && !self.warned;
        if warning {
            self.warned = true;
        }

        let completed = next <= 0;
        if completed {
            self.running = false;
        }

        Some(Tick {
            seconds: next,
            warning,
            completed,
        })
    }

    /// Start when paused, pause when running.
    pub fn toggle(&mut self) {
        self.running = !self.running;
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    /// Manual reset: set the duration and stop. The warning stays spent.
    pub fn reset(&mut self, seconds: i64) {
        self.seconds = seconds;
        self.running = false;
    }

    /// Reset for a new stage: also re-arms the warning cue.
    pub fn restart_epoch(&mut self, seconds: i64) {
        self.reset(seconds);
        self.warned = false;
    }

    /// Add one minute without touching the running state.
    pub fn add_minute(&mut self) {
        self.seconds += 60;
    }

    /// Overwrite the remaining seconds (e.g. when resuming a saved session).
    pub fn set_seconds(&mut self, seconds: i64) {
        self.seconds = seconds;
    }

    /// `MM:SS`, clamped at zero.
    pub fn display(&self) -> String {
        let remaining = self.seconds.max(0);
        format!("{:02}:{:02}", remaining / 60, remaining % 60)
    }
}
