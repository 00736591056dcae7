//! Snapshot validation and the reconciliation reducer.
//!
//! A snapshot is the raw document delivered by the store. It is first parsed
//! and validated, then folded into the observer's previous state by
//! [`reconcile`]. The reducer is pure: the same `(previous, snapshot)` pair
//! always produces the same state, which makes re-delivery harmless.

use serde_json::Value;

use super::phase::BoundaryPolicy;
use super::state::SessionState;
use crate::error::TimerError;

/// Outcome of folding one snapshot into the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciled {
    pub state: SessionState,
    pub phase_changed: bool,
    pub running_changed: bool,
}

/// Parse a raw document. Missing or ill-typed required fields make the
/// snapshot malformed; the caller keeps its previous state.
pub fn parse_snapshot(doc: &Value) -> Result<SessionState, TimerError> {
    if doc.is_null() {
        return Err(TimerError::MalformedSnapshot("document is empty or deleted".into()));
    }
    let state: SessionState = serde_json::from_value(doc.clone())
        .map_err(|e| TimerError::MalformedSnapshot(e.to_string()))?;
    if state.active_duration == 0 || state.rest_duration == 0 {
        return Err(TimerError::MalformedSnapshot(
            "durations must be positive".into(),
        ));
    }
    if state.is_running && state.anchor_time.is_none() {
        return Err(TimerError::MalformedSnapshot(
            "running session without anchorTime".into(),
        ));
    }
    Ok(state)
}

/// Fold `incoming` into `previous`.
///
/// - phase, running flag, anchor and durations are adopted as-is, so every
///   mirror derives the same countdown as the controller;
/// - a paused snapshot sitting at zero is resolved by `policy`;
/// - a snapshot without `controllerId` keeps the previously known one.
pub fn reconcile(
    previous: Option<&SessionState>,
    incoming: SessionState,
    policy: BoundaryPolicy,
) -> Reconciled {
    let mut next = incoming;

    if !next.is_running {
        let total = next.total_duration();
        next.remaining_seconds = next.remaining_seconds.min(total);
        if next.remaining_seconds == 0 && policy == BoundaryPolicy::ResetFull {
            next.remaining_seconds = total;
        }
    }

    if next.controller_id.is_none() {
        next.controller_id = previous.and_then(|p| p.controller_id.clone());
    }

    let phase_changed = previous.is_some_and(|p| p.phase != next.phase);
    let running_changed = previous.is_some_and(|p| p.is_running != next.is_running);
    Reconciled {
        state: next,
        phase_changed,
        running_changed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::Phase;
    use serde_json::json;

    const T0: i64 = 1_700_000_000_000;

    fn doc_running() -> Value {
        json!({
            "phase": "active",
            "activeDuration": 1500,
            "restDuration": 300,
            "isRunning": true,
            "anchorTime": T0,
            "remainingSeconds": 1500,
            "controllerId": "alice"
        })
    }

    #[test]
    fn parses_valid_document() {
        let state = parse_snapshot(&doc_running()).unwrap();
        assert_eq!(state.phase, Phase::Active);
        assert_eq!(state.anchor_time, Some(T0));
        assert_eq!(state.controller_id.as_deref(), Some("alice"));
    }

    #[test]
    fn missing_phase_is_malformed() {
        let mut doc = doc_running();
        doc.as_object_mut().unwrap().remove("phase");
        assert!(matches!(
            parse_snapshot(&doc),
            Err(TimerError::MalformedSnapshot(_))
        ));
    }

    #[test]
    fn running_without_anchor_is_malformed() {
        let mut doc = doc_running();
        doc.as_object_mut().unwrap().remove("anchorTime");
        assert!(parse_snapshot(&doc).is_err());
    }

    #[test]
    fn null_document_is_malformed() {
        assert!(parse_snapshot(&Value::Null).is_err());
    }

    #[test]
    fn zero_duration_is_malformed() {
        let mut doc = doc_running();
        doc["restDuration"] = json!(0);
        assert!(parse_snapshot(&doc).is_err());
    }

    #[test]
    fn paused_zero_resets_to_full_by_default() {
        let mut doc = doc_running();
        doc["isRunning"] = json!(false);
        doc["remainingSeconds"] = json!(0);
        doc["phase"] = json!("rest");
        let state = parse_snapshot(&doc).unwrap();
        let out = reconcile(None, state, BoundaryPolicy::ResetFull);
        assert_eq!(out.state.remaining_seconds, 300);
    }

    #[test]
    fn paused_zero_is_kept_under_preserve() {
        let mut doc = doc_running();
        doc["isRunning"] = json!(false);
        doc["remainingSeconds"] = json!(0);
        let state = parse_snapshot(&doc).unwrap();
        let out = reconcile(None, state, BoundaryPolicy::Preserve);
        assert_eq!(out.state.remaining_seconds, 0);
    }

    #[test]
    fn remote_durations_are_adopted_unclamped() {
        let mut doc = doc_running();
        doc["activeDuration"] = json!(7200);
        doc["restDuration"] = json!(3600);
        let state = parse_snapshot(&doc).unwrap();
        let out = reconcile(None, state, BoundaryPolicy::ResetFull);
        assert_eq!(out.state.active_duration, 7200);
        assert_eq!(out.state.rest_duration, 3600);
        assert_eq!(out.state.seconds_left(T0 + 5000), 7195);
    }

    #[test]
    fn controller_is_carried_over_when_absent() {
        let prev = parse_snapshot(&doc_running()).unwrap();
        let mut doc = doc_running();
        doc.as_object_mut().unwrap().remove("controllerId");
        let incoming = parse_snapshot(&doc).unwrap();
        let out = reconcile(Some(&prev), incoming, BoundaryPolicy::ResetFull);
        assert_eq!(out.state.controller_id.as_deref(), Some("alice"));
    }

    #[test]
    fn reconcile_is_idempotent() {
        let snapshot = parse_snapshot(&doc_running()).unwrap();
        let once = reconcile(None, snapshot.clone(), BoundaryPolicy::ResetFull);
        let twice = reconcile(Some(&once.state), snapshot, BoundaryPolicy::ResetFull);
        assert_eq!(once.state, twice.state);
        assert!(!twice.phase_changed);
        assert!(!twice.running_changed);
        assert_eq!(
            once.state.seconds_left(T0 + 5000),
            twice.state.seconds_left(T0 + 5000)
        );
    }

    #[test]
    fn phase_change_is_reported() {
        let prev = parse_snapshot(&doc_running()).unwrap();
        let mut doc = doc_running();
        doc["phase"] = json!("rest");
        let incoming = parse_snapshot(&doc).unwrap();
        let out = reconcile(Some(&prev), incoming, BoundaryPolicy::ResetFull);
        assert!(out.phase_changed);
        assert_eq!(out.state.phase, Phase::Rest);
    }
}
