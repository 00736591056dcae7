use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::timer::{DisplayState, Phase};

/// Every state change the engine makes, or observes, produces an Event.
/// The control surface prints or renders them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        seconds_left: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        /// Minutes filed with the progress recorder, if any.
        recorded_minutes: Option<u32>,
        at: DateTime<Utc>,
    },
    TimerReset {
        recorded_minutes: Option<u32>,
        at: DateTime<Utc>,
    },
    /// A running phase reached zero and the next phase was anchored.
    PhaseCompleted {
        completed: Phase,
        next: Phase,
        recorded_minutes: Option<u32>,
        at: DateTime<Utc>,
    },
    DurationChanged {
        phase: Phase,
        duration_secs: u64,
        at: DateTime<Utc>,
    },
    /// A mirror adopted a different phase from a remote snapshot.
    PhaseChanged {
        phase: Phase,
        is_running: bool,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        #[serde(flatten)]
        display: DisplayState,
        at: DateTime<Utc>,
    },
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::TimerStarted { .. } => "timer_started",
            Event::TimerPaused { .. } => "timer_paused",
            Event::TimerReset { .. } => "timer_reset",
            Event::PhaseCompleted { .. } => "phase_completed",
            Event::DurationChanged { .. } => "duration_changed",
            Event::PhaseChanged { .. } => "phase_changed",
            Event::StateSnapshot { .. } => "state_snapshot",
        }
    }
}
