//! Intent planning.
//!
//! Each controller intent is turned into a [`SessionPatch`] against the
//! current state. The local timer applies the patch at once; the synced
//! controller writes it to the store and applies it only once the write
//! succeeded. `None` means the intent has nothing to do (start while running,
//! pause while paused).

use serde::{Deserialize, Serialize};

use super::guard::IntervalKey;
use super::phase::{BoundaryPolicy, Phase};
use super::state::{resume_anchor, SessionPatch, SessionState};

/// A request from the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
    Start,
    Pause,
    /// Start when paused, pause when running.
    Toggle,
    Reset,
    SetDuration { phase: Phase, minutes: u32 },
}

pub(crate) fn plan_start(
    state: &SessionState,
    now_ms: i64,
    policy: BoundaryPolicy,
) -> Option<SessionPatch> {
    if state.is_running {
        return None;
    }
    let left = state.displayed_seconds_left(now_ms, policy);
    Some(SessionPatch {
        is_running: Some(true),
        anchor_time: Some(resume_anchor(now_ms, state.total_duration(), left)),
        remaining_seconds: Some(left),
        run_started_at: Some(now_ms),
        ..SessionPatch::default()
    })
}

pub(crate) fn plan_pause(state: &SessionState, now_ms: i64) -> Option<SessionPatch> {
    if !state.is_running {
        return None;
    }
    Some(SessionPatch {
        is_running: Some(false),
        remaining_seconds: Some(state.seconds_left(now_ms)),
        ..SessionPatch::default()
    })
}

pub(crate) fn plan_reset(state: &SessionState, now_ms: i64) -> SessionPatch {
    SessionPatch {
        phase: Some(Phase::Active),
        is_running: Some(false),
        anchor_time: Some(now_ms),
        remaining_seconds: Some(state.active_duration),
        ..SessionPatch::default()
    }
}

/// `secs` must already be clamped to the phase ceiling.
pub(crate) fn plan_duration(
    state: &SessionState,
    phase: Phase,
    secs: u64,
    now_ms: i64,
) -> SessionPatch {
    let mut patch = SessionPatch::duration(phase, secs);
    if phase != state.phase {
        return patch;
    }
    if state.is_running {
        // Re-anchor so the running countdown keeps its value, capped at the
        // new total.
        let left = state.seconds_left(now_ms).min(secs);
        patch.anchor_time = Some(resume_anchor(now_ms, secs, left));
    } else {
        patch.remaining_seconds = Some(secs);
        patch.anchor_time = Some(now_ms);
    }
    patch
}

/// Plan the zero-crossing transition, if the running interval has crossed.
pub(crate) fn plan_transition(
    state: &SessionState,
    now_ms: i64,
) -> Option<(IntervalKey, SessionPatch)> {
    if !state.has_crossed_boundary(now_ms) {
        return None;
    }
    let key = IntervalKey {
        phase: state.phase,
        anchor_ms: state.anchor_time?,
    };
    let next = state.phase.other();
    let patch = SessionPatch {
        phase: Some(next),
        is_running: Some(true),
        anchor_time: Some(now_ms),
        remaining_seconds: Some(state.duration_of(next)),
        run_started_at: Some(now_ms),
        ..SessionPatch::default()
    };
    Some((key, patch))
}

#[cfg(test)]
mod tests {
    use super::*;

    const T0: i64 = 1_700_000_000_000;

    fn paused(active: u64, remaining: u64) -> SessionState {
        SessionState {
            remaining_seconds: remaining,
            ..SessionState::new(active, 300)
        }
    }

    fn apply(state: &SessionState, patch: &SessionPatch) -> SessionState {
        let mut next = state.clone();
        next.apply_patch(patch);
        next
    }

    #[test]
    fn start_preserves_remaining() {
        let s = paused(1500, 1490);
        let patch = plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap();
        let running = apply(&s, &patch);
        assert_eq!(running.seconds_left(T0), 1490);
        assert_eq!(running.run_started_at, Some(T0));
    }

    #[test]
    fn start_while_running_is_noop() {
        let s = apply(&paused(1500, 1500), &plan_start(&paused(1500, 1500), T0, BoundaryPolicy::ResetFull).unwrap());
        assert!(plan_start(&s, T0 + 10, BoundaryPolicy::ResetFull).is_none());
    }

    #[test]
    fn start_at_zero_follows_policy() {
        let s = paused(1500, 0);
        let full = apply(&s, &plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap());
        assert_eq!(full.seconds_left(T0), 1500);
        let kept = apply(&s, &plan_start(&s, T0, BoundaryPolicy::Preserve).unwrap());
        assert!(kept.has_crossed_boundary(T0));
    }

    #[test]
    fn pause_captures_derived_value() {
        let s = paused(1500, 1500);
        let running = apply(&s, &plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap());
        let paused_again = apply(&running, &plan_pause(&running, T0 + 10_000).unwrap());
        assert!(!paused_again.is_running);
        assert_eq!(paused_again.remaining_seconds, 1490);
        assert!(plan_pause(&paused_again, T0 + 20_000).is_none());
    }

    #[test]
    fn reset_returns_to_active_full() {
        let mut s = paused(1500, 12);
        s.phase = Phase::Rest;
        let r = apply(&s, &plan_reset(&s, T0));
        assert_eq!(r.phase, Phase::Active);
        assert_eq!(r.remaining_seconds, 1500);
        assert!(!r.is_running);
    }

    #[test]
    fn duration_edit_paused_same_phase_resets_remaining() {
        let s = paused(1500, 1500);
        let e = apply(&s, &plan_duration(&s, Phase::Active, 600, T0));
        assert_eq!(e.active_duration, 600);
        assert_eq!(e.remaining_seconds, 600);
        assert_eq!(e.anchor_time, Some(T0));
    }

    #[test]
    fn duration_edit_other_phase_only_changes_duration() {
        let mut s = paused(1500, 200);
        s.phase = Phase::Rest;
        let e = apply(&s, &plan_duration(&s, Phase::Active, 600, T0));
        assert_eq!(e.active_duration, 600);
        assert_eq!(e.remaining_seconds, 200);
        assert_eq!(e.phase, Phase::Rest);
    }

    #[test]
    fn duration_edit_while_running_keeps_countdown() {
        let s = paused(1500, 1500);
        let running = apply(&s, &plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap());
        let now = T0 + 100_000;
        assert_eq!(running.seconds_left(now), 1400);
        let edited = apply(&running, &plan_duration(&running, Phase::Active, 3000, now));
        assert_eq!(edited.active_duration, 3000);
        assert_eq!(edited.seconds_left(now), 1400);
        assert_eq!(edited.seconds_left(now + 10_000), 1390);

        let shorter = apply(&running, &plan_duration(&running, Phase::Active, 1200, now));
        assert_eq!(shorter.seconds_left(now), 1200);
    }

    #[test]
    fn duration_edit_below_remaining_counts_down_at_once() {
        let s = paused(1500, 1500);
        let running = apply(&s, &plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap());
        let now = T0 + 100_000;
        let edited = apply(&running, &plan_duration(&running, Phase::Active, 600, now));
        assert_eq!(edited.seconds_left(now), 600);
        assert_eq!(edited.seconds_left(now + 5_000), 595);
        assert_eq!(edited.anchor_time, Some(now));
    }

    #[test]
    fn transition_only_after_zero() {
        let s = paused(1500, 1500);
        let running = apply(&s, &plan_start(&s, T0, BoundaryPolicy::ResetFull).unwrap());
        assert!(plan_transition(&running, T0 + 1_499_999).is_none());
        let (key, patch) = plan_transition(&running, T0 + 1_500_000).unwrap();
        assert_eq!(key.phase, Phase::Active);
        assert_eq!(key.anchor_ms, T0);
        let next = apply(&running, &patch);
        assert_eq!(next.phase, Phase::Rest);
        assert_eq!(next.seconds_left(T0 + 1_500_000), 300);
        assert!(next.is_running);
    }
}
