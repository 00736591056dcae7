use chrono::{FixedOffset, Local, Offset};
use serde::{Deserialize, Serialize};

/// Default Active phase length (25 minutes).
pub const DEFAULT_ACTIVE_SECS: u64 = 25 * 60;
/// Default Rest phase length (5 minutes).
pub const DEFAULT_REST_SECS: u64 = 5 * 60;
/// Default ceiling for the Active phase (one day).
pub const DEFAULT_ACTIVE_CEILING_SECS: u64 = 86_400;
/// Default ceiling for the Rest phase (30 minutes).
pub const DEFAULT_REST_CEILING_SECS: u64 = 30 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Active,
    Rest,
}

impl Phase {
    pub fn other(self) -> Self {
        match self {
            Phase::Active => Phase::Rest,
            Phase::Rest => Phase::Active,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Phase::Active => "active",
            Phase::Rest => "rest",
        }
    }
}

impl std::str::FromStr for Phase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" | "study" | "focus" => Ok(Phase::Active),
            "rest" | "break" => Ok(Phase::Rest),
            other => Err(format!("unknown phase '{other}' (expected active or rest)")),
        }
    }
}

/// What to show when a paused snapshot reports zero seconds left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryPolicy {
    /// Show the full duration of the current phase.
    #[default]
    ResetFull,
    /// Keep zero; a later start crosses the boundary immediately.
    Preserve,
}

/// Per-phase upper bounds, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ceilings {
    pub active_secs: u64,
    pub rest_secs: u64,
}

impl Ceilings {
    pub fn for_phase(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Active => self.active_secs,
            Phase::Rest => self.rest_secs,
        }
    }

    /// Clamp a duration to `[1, ceiling]` for the given phase.
    pub fn clamp(&self, phase: Phase, secs: u64) -> u64 {
        secs.clamp(1, self.for_phase(phase).max(1))
    }
}

impl Default for Ceilings {
    fn default() -> Self {
        Self {
            active_secs: DEFAULT_ACTIVE_CEILING_SECS,
            rest_secs: DEFAULT_REST_CEILING_SECS,
        }
    }
}

/// Engine-wide settings shared by both timer modes.
#[derive(Debug, Clone)]
pub struct TimerSettings {
    pub active_secs: u64,
    pub rest_secs: u64,
    pub ceilings: Ceilings,
    pub boundary_policy: BoundaryPolicy,
    /// Offset used to place recorded minutes on a calendar day.
    pub utc_offset: FixedOffset,
    /// Who progress is recorded for. Nothing is recorded when unset.
    pub user_id: Option<String>,
}

impl TimerSettings {
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn with_durations(mut self, active_secs: u64, rest_secs: u64) -> Self {
        self.active_secs = self.ceilings.clamp(Phase::Active, active_secs);
        self.rest_secs = self.ceilings.clamp(Phase::Rest, rest_secs);
        self
    }
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            active_secs: DEFAULT_ACTIVE_SECS,
            rest_secs: DEFAULT_REST_SECS,
            ceilings: Ceilings::default(),
            boundary_policy: BoundaryPolicy::default(),
            utc_offset: Local::now().offset().fix(),
            user_id: None,
        }
    }
}
