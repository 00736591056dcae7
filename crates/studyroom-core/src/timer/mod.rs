mod driver;
mod engine;
mod guard;
mod intents;
mod phase;
mod recording;
mod reconcile;
mod state;
mod synced;

pub use driver::RedrawLoop;
pub use engine::LocalPhaseTimer;
pub use guard::{IntervalKey, TransitionGuard};
pub use intents::Intent;
pub use phase::{
    BoundaryPolicy, Ceilings, Phase, TimerSettings, DEFAULT_ACTIVE_CEILING_SECS,
    DEFAULT_ACTIVE_SECS, DEFAULT_REST_CEILING_SECS, DEFAULT_REST_SECS,
};
pub use reconcile::{parse_snapshot, reconcile, Reconciled};
pub use state::{
    format_hms, percent_complete, resume_anchor, running_seconds_left, DisplayState,
    SessionPatch, SessionState,
};
pub use synced::{ControllerHandle, ObserverStatus, ReaderHandle, SyncedPhaseTimer};

use crate::error::TimerError;
use crate::events::Event;

/// Read side shared by both timer modes.
pub trait PhaseTimer {
    /// Current display, derived from scratch at the clock's "now".
    fn display_state(&self) -> DisplayState;

    /// Redraw tick. Never authoritative: it re-derives the countdown and runs
    /// the zero-crossing transition at most once per boundary.
    fn tick(&mut self) -> Result<Option<Event>, TimerError>;
}

/// Mutating intents. Implemented by the local timer and by the synced
/// controller handle only.
pub trait TimerControl: PhaseTimer {
    fn start(&mut self) -> Result<Option<Event>, TimerError>;
    fn pause(&mut self) -> Result<Option<Event>, TimerError>;
    fn reset(&mut self) -> Result<Option<Event>, TimerError>;
    fn set_duration(&mut self, phase: Phase, minutes: u32) -> Result<Option<Event>, TimerError>;

    fn toggle(&mut self) -> Result<Option<Event>, TimerError> {
        if self.display_state().is_running {
            self.pause()
        } else {
            self.start()
        }
    }

    fn apply_intent(&mut self, intent: Intent) -> Result<Option<Event>, TimerError> {
        match intent {
            Intent::Start => self.start(),
            Intent::Pause => self.pause(),
            Intent::Toggle => self.toggle(),
            Intent::Reset => self.reset(),
            Intent::SetDuration { phase, minutes } => self.set_duration(phase, minutes),
        }
    }
}
