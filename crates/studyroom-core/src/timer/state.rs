//! The session record and the pure countdown derivation.
//!
//! `seconds_left` is always recomputed from `(phase, is_running,
//! anchor_time | remaining_seconds, now)`. Nothing here keeps a decrementing
//! counter, so a missed tick or a suspended process never skews the result.

use serde::{Deserialize, Serialize};

use super::phase::{BoundaryPolicy, Phase, TimerSettings};

/// Authoritative session record, stored locally or as a remote document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub phase: Phase,
    pub active_duration: u64,
    pub rest_duration: u64,
    pub is_running: bool,
    /// Epoch ms the current run is measured from. Authoritative while running.
    #[serde(default)]
    pub anchor_time: Option<i64>,
    /// Paused-at value. Authoritative while paused.
    pub remaining_seconds: u64,
    #[serde(default)]
    pub controller_id: Option<String>,
    /// Epoch ms the current run actually began (used for progress only).
    #[serde(default)]
    pub run_started_at: Option<i64>,
}

impl SessionState {
    /// Fresh local session: paused, Active phase, full duration.
    pub fn new(active_secs: u64, rest_secs: u64) -> Self {
        Self {
            phase: Phase::Active,
            active_duration: active_secs,
            rest_duration: rest_secs,
            is_running: false,
            anchor_time: None,
            remaining_seconds: active_secs,
            controller_id: None,
            run_started_at: None,
        }
    }

    pub fn from_settings(settings: &TimerSettings) -> Self {
        Self::new(settings.active_secs, settings.rest_secs)
    }

    /// Fresh shared session document owned by `controller_id`.
    pub fn new_shared(
        active_secs: u64,
        rest_secs: u64,
        controller_id: impl Into<String>,
        now_ms: i64,
    ) -> Self {
        Self {
            anchor_time: Some(now_ms),
            controller_id: Some(controller_id.into()),
            ..Self::new(active_secs, rest_secs)
        }
    }

    pub fn duration_of(&self, phase: Phase) -> u64 {
        match phase {
            Phase::Active => self.active_duration,
            Phase::Rest => self.rest_duration,
        }
    }

    pub fn total_duration(&self) -> u64 {
        self.duration_of(self.phase)
    }

    /// Seconds left at `now_ms`, clamped to `[0, total]`.
    pub fn seconds_left(&self, now_ms: i64) -> u64 {
        let total = self.total_duration();
        if !self.is_running {
            return self.remaining_seconds.min(total);
        }
        match self.anchor_time {
            Some(anchor) => running_seconds_left(total, anchor, now_ms),
            None => self.remaining_seconds.min(total),
        }
    }

    /// Seconds left as shown to the user, with the boundary policy applied to a
    /// paused-at-zero state.
    pub fn displayed_seconds_left(&self, now_ms: i64, policy: BoundaryPolicy) -> u64 {
        let left = self.seconds_left(now_ms);
        if !self.is_running && left == 0 && policy == BoundaryPolicy::ResetFull {
            return self.total_duration();
        }
        left
    }

    /// True once a running countdown has reached zero.
    pub fn has_crossed_boundary(&self, now_ms: i64) -> bool {
        self.is_running && self.seconds_left(now_ms) == 0
    }

    /// Instant the running countdown hits zero, if running.
    pub fn boundary_at(&self) -> Option<i64> {
        if !self.is_running {
            return None;
        }
        let total_ms = i64::try_from(self.total_duration()).unwrap_or(i64::MAX / 1000) * 1000;
        self.anchor_time.map(|anchor| anchor.saturating_add(total_ms))
    }

    /// Seconds of the current run that count as studied at `now_ms`: from
    /// `run_started_at` (or the anchor) up to `now` or the boundary, whichever
    /// is earlier.
    pub fn run_elapsed_secs(&self, now_ms: i64) -> u64 {
        if !self.is_running {
            return 0;
        }
        let Some(start) = self.run_started_at.or(self.anchor_time) else {
            return 0;
        };
        let end = self.boundary_at().map_or(now_ms, |b| b.min(now_ms));
        let elapsed_ms = end.saturating_sub(start).max(0);
        (elapsed_ms / 1000) as u64
    }

    /// Build the display snapshot at `now_ms`.
    pub fn display(&self, now_ms: i64, policy: BoundaryPolicy, can_control: bool) -> DisplayState {
        let seconds_left = self.displayed_seconds_left(now_ms, policy);
        DisplayState {
            phase: self.phase,
            seconds_left,
            total_seconds: self.total_duration(),
            is_running: self.is_running,
            percent_complete: percent_complete(seconds_left, self.total_duration()),
            can_control,
        }
    }

    /// Apply a partial update in place.
    pub fn apply_patch(&mut self, patch: &SessionPatch) {
        if let Some(phase) = patch.phase {
            self.phase = phase;
        }
        if let Some(v) = patch.active_duration {
            self.active_duration = v;
        }
        if let Some(v) = patch.rest_duration {
            self.rest_duration = v;
        }
        if let Some(v) = patch.is_running {
            self.is_running = v;
        }
        if let Some(v) = patch.anchor_time {
            self.anchor_time = Some(v);
        }
        if let Some(v) = patch.remaining_seconds {
            self.remaining_seconds = v;
        }
        if let Some(v) = patch.run_started_at {
            self.run_started_at = Some(v);
        }
    }
}

/// `max(total - floor((now - anchor) / 1000), 0)`, also clamped to `total`
/// when the anchor lies in the future.
pub fn running_seconds_left(total: u64, anchor_ms: i64, now_ms: i64) -> u64 {
    let elapsed_secs = now_ms.saturating_sub(anchor_ms).div_euclid(1000);
    let total_i = i64::try_from(total).unwrap_or(i64::MAX);
    total_i.saturating_sub(elapsed_secs).clamp(0, total_i) as u64
}

/// Anchor that makes a countdown resume with exactly `seconds_left` remaining.
pub fn resume_anchor(now_ms: i64, total: u64, seconds_left: u64) -> i64 {
    let consumed = total.saturating_sub(seconds_left);
    let consumed_ms = i64::try_from(consumed).unwrap_or(i64::MAX / 1000) * 1000;
    now_ms.saturating_sub(consumed_ms)
}

pub fn percent_complete(seconds_left: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    100.0 - (seconds_left as f64 / total as f64) * 100.0
}

/// Partial write with merge semantics: only `Some` fields change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_running: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_started_at: Option<i64>,
}

impl SessionPatch {
    pub fn is_empty(&self) -> bool {
        *self == SessionPatch::default()
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }

    /// Patch for setting the duration of `phase`.
    pub fn duration(phase: Phase, secs: u64) -> Self {
        match phase {
            Phase::Active => Self {
                active_duration: Some(secs),
                ..Self::default()
            },
            Phase::Rest => Self {
                rest_duration: Some(secs),
                ..Self::default()
            },
        }
    }
}

/// What the control surface renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayState {
    pub phase: Phase,
    pub seconds_left: u64,
    pub total_seconds: u64,
    pub is_running: bool,
    pub percent_complete: f64,
    pub can_control: bool,
}

impl DisplayState {
    pub fn formatted(&self) -> String {
        format_hms(self.seconds_left)
    }
}

/// Format seconds as `HH:MM:SS`.
pub fn format_hms(secs: u64) -> String {
    let h = secs / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{h:02}:{m:02}:{s:02}")
}
