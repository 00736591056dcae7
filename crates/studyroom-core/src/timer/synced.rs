//! Synchronized phase timer.
//!
//! The authoritative state lives in a remote session document. Every observer
//! mirrors it through a subscription and derives its own countdown; exactly
//! one observer (the document's `controllerId`) may write.
//!
//! Writing is only reachable through a [`ControllerHandle`], which
//! [`SyncedPhaseTimer::controller`] hands out to the controller alone. Other
//! observers get a [`ReaderHandle`] with no mutating methods.
//!
//! Writes are confirmed before they are applied: a failed write leaves the
//! last confirmed snapshot in place and is returned to the caller.

use serde_json::Value;
use std::sync::Arc;

use super::guard::TransitionGuard;
use super::intents::{plan_duration, plan_pause, plan_reset, plan_start, plan_transition, Intent};
use super::phase::{Phase, TimerSettings};
use super::reconcile::{parse_snapshot, reconcile};
use super::recording::ProgressHook;
use super::state::{DisplayState, SessionPatch, SessionState};
use super::{PhaseTimer, TimerControl};
use crate::clock::{ms_to_utc, Clock};
use crate::error::{CoreError, TimerError};
use crate::events::Event;
use crate::progress::ProgressRecorder;
use crate::store::{SessionStore, Subscription};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverStatus {
    Disconnected,
    Subscribed,
}

pub struct SyncedPhaseTimer {
    session_id: String,
    observer_id: String,
    store: Arc<dyn SessionStore>,
    subscription: Subscription,
    confirmed: SessionState,
    settings: TimerSettings,
    clock: Arc<dyn Clock>,
    progress: ProgressHook,
    guard: TransitionGuard,
}

impl SyncedPhaseTimer {
    /// Subscribe to `session_id` and adopt its current document.
    ///
    /// # Errors
    /// Fails if the document does not exist, is malformed, or the store
    /// cannot be reached.
    pub fn join(
        store: Arc<dyn SessionStore>,
        session_id: &str,
        observer_id: impl Into<String>,
        settings: TimerSettings,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        let progress = ProgressHook::new(None, &settings);
        Self::join_with(store, session_id, observer_id.into(), settings, clock, progress)
    }

    fn join_with(
        store: Arc<dyn SessionStore>,
        session_id: &str,
        observer_id: String,
        settings: TimerSettings,
        clock: Arc<dyn Clock>,
        progress: ProgressHook,
    ) -> Result<Self, CoreError> {
        let subscription = store.subscribe(session_id)?;
        let doc = store
            .read(session_id)?
            .ok_or_else(|| TimerError::SessionNotFound(session_id.to_string()))?;
        let incoming = parse_snapshot(&doc)?;
        let confirmed = reconcile(None, incoming, settings.boundary_policy).state;
        tracing::info!(
            session = session_id,
            observer = %observer_id,
            controller = ?confirmed.controller_id,
            "Joined shared session"
        );
        Ok(Self {
            session_id: session_id.to_string(),
            observer_id,
            store,
            subscription,
            confirmed,
            settings,
            clock,
            progress,
            guard: TransitionGuard::default(),
        })
    }

    pub fn with_recorder(mut self, recorder: impl ProgressRecorder + 'static) -> Self {
        self.progress = ProgressHook::new(Some(Box::new(recorder)), &self.settings);
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn observer_id(&self) -> &str {
        &self.observer_id
    }

    pub fn controller_id(&self) -> Option<&str> {
        self.confirmed.controller_id.as_deref()
    }

    pub fn can_control(&self) -> bool {
        self.controller_id() == Some(self.observer_id.as_str())
    }

    /// Last confirmed session state.
    pub fn confirmed_state(&self) -> &SessionState {
        &self.confirmed
    }

    pub fn status(&self) -> ObserverStatus {
        if self.subscription.is_closed() {
            ObserverStatus::Disconnected
        } else {
            ObserverStatus::Subscribed
        }
    }

    /// Capability to mutate the session. `None` unless this observer is the
    /// controller.
    pub fn controller(&mut self) -> Option<ControllerHandle<'_>> {
        if self.can_control() {
            Some(ControllerHandle { timer: self })
        } else {
            None
        }
    }

    pub fn reader(&self) -> ReaderHandle<'_> {
        ReaderHandle { timer: self }
    }

    /// Forward a control-surface intent. Without control rights nothing is
    /// written and `PermissionDenied` is returned.
    pub fn apply_intent(&mut self, intent: Intent) -> Result<Option<Event>, TimerError> {
        let observer_id = self.observer_id.clone();
        let controller_id = self.confirmed.controller_id.clone();
        match self.controller() {
            Some(mut handle) => handle.apply_intent(intent),
            None => {
                tracing::debug!(observer = %observer_id, ?intent, "Ignoring intent from non-controller");
                Err(TimerError::PermissionDenied {
                    observer_id,
                    controller_id,
                })
            }
        }
    }

    /// Drain pending snapshots from the subscription. Returns a
    /// `PhaseChanged` event when the adopted phase differs from the previous
    /// one.
    pub fn sync(&mut self) -> Option<Event> {
        let mut event = None;
        while let Some(doc) = self.subscription.poll() {
            match self.ingest(&doc) {
                Ok(Some(e)) => event = Some(e),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(session = %self.session_id, error = %err, "Ignoring snapshot");
                }
            }
        }
        event
    }

    /// Fold one snapshot into the mirror. A malformed snapshot is rejected
    /// and the previous state is kept.
    pub fn ingest(&mut self, doc: &Value) -> Result<Option<Event>, TimerError> {
        let incoming = parse_snapshot(doc)?;
        let out = reconcile(Some(&self.confirmed), incoming, self.settings.boundary_policy);
        self.confirmed = out.state;
        tracing::debug!(
            session = %self.session_id,
            phase = self.confirmed.phase.label(),
            running = self.confirmed.is_running,
            "Reconciled snapshot"
        );
        if out.phase_changed {
            return Ok(Some(Event::PhaseChanged {
                phase: self.confirmed.phase,
                is_running: self.confirmed.is_running,
                at: self.clock.now_utc(),
            }));
        }
        Ok(None)
    }

    /// Detach from the session.
    pub fn leave(self) {
        tracing::info!(session = %self.session_id, observer = %self.observer_id, "Left shared session");
        self.subscription.unsubscribe();
    }

    /// Leave the current session, then join `session_id` with the same
    /// identity, settings and recorder.
    pub fn switch_session(self, session_id: &str) -> Result<Self, CoreError> {
        let Self {
            session_id: old,
            observer_id,
            store,
            subscription,
            settings,
            clock,
            progress,
            ..
        } = self;
        subscription.unsubscribe();
        tracing::info!(from = %old, to = session_id, "Switching shared session");
        Self::join_with(store, session_id, observer_id, settings, clock, progress)
    }
}

impl PhaseTimer for SyncedPhaseTimer {
    fn display_state(&self) -> DisplayState {
        self.confirmed.display(
            self.clock.now_ms(),
            self.settings.boundary_policy,
            self.can_control(),
        )
    }

    fn tick(&mut self) -> Result<Option<Event>, TimerError> {
        let observed = self.sync();
        if let Some(mut handle) = self.controller() {
            if let Some(event) = handle.complete_phase()? {
                return Ok(Some(event));
            }
        }
        Ok(observed)
    }
}

/// Write capability for a shared session. Only the controller can obtain one.
pub struct ControllerHandle<'a> {
    timer: &'a mut SyncedPhaseTimer,
}

impl ControllerHandle<'_> {
    /// Write `patch`, then apply it to the confirmed state.
    fn commit(&mut self, patch: &SessionPatch) -> Result<(), TimerError> {
        let timer = &mut *self.timer;
        timer
            .store
            .write(&timer.session_id, &patch.to_json())
            .map_err(|err| {
                tracing::warn!(session = %timer.session_id, error = %err, "Session write failed");
                TimerError::RemoteWrite(err)
            })?;
        timer.confirmed.apply_patch(patch);
        Ok(())
    }

    /// Run the zero-crossing transition if the running phase has ended.
    fn complete_phase(&mut self) -> Result<Option<Event>, TimerError> {
        let now = self.timer.clock.now_ms();
        let Some((key, patch)) = plan_transition(&self.timer.confirmed, now) else {
            return Ok(None);
        };
        if !self.timer.guard.claim(key) {
            return Ok(None);
        }
        let completed = self.timer.confirmed.phase;
        let elapsed = self.timer.confirmed.run_elapsed_secs(now);
        if let Err(err) = self.commit(&patch) {
            self.timer.guard.release(key);
            return Err(err);
        }
        let recorded_minutes = self.timer.progress.record(completed, elapsed, now);
        tracing::info!(
            session = %self.timer.session_id,
            completed = completed.label(),
            next = completed.other().label(),
            "Phase completed"
        );
        Ok(Some(Event::PhaseCompleted {
            completed,
            next: completed.other(),
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }

    fn refresh(&mut self) {
        self.timer.sync();
    }
}

impl PhaseTimer for ControllerHandle<'_> {
    fn display_state(&self) -> DisplayState {
        self.timer.display_state()
    }

    fn tick(&mut self) -> Result<Option<Event>, TimerError> {
        self.timer.tick()
    }
}

impl TimerControl for ControllerHandle<'_> {
    fn start(&mut self) -> Result<Option<Event>, TimerError> {
        self.refresh();
        let now = self.timer.clock.now_ms();
        let policy = self.timer.settings.boundary_policy;
        let Some(patch) = plan_start(&self.timer.confirmed, now, policy) else {
            return Ok(None);
        };
        self.commit(&patch)?;
        let seconds_left = self.timer.confirmed.seconds_left(now);
        tracing::info!(session = %self.timer.session_id, seconds_left, "Shared timer started");
        Ok(Some(Event::TimerStarted {
            phase: self.timer.confirmed.phase,
            seconds_left,
            at: ms_to_utc(now),
        }))
    }

    fn pause(&mut self) -> Result<Option<Event>, TimerError> {
        self.refresh();
        let now = self.timer.clock.now_ms();
        let Some(patch) = plan_pause(&self.timer.confirmed, now) else {
            return Ok(None);
        };
        let phase = self.timer.confirmed.phase;
        let elapsed = self.timer.confirmed.run_elapsed_secs(now);
        self.commit(&patch)?;
        let recorded_minutes = self.timer.progress.record(phase, elapsed, now);
        tracing::info!(
            session = %self.timer.session_id,
            remaining = self.timer.confirmed.remaining_seconds,
            "Shared timer paused"
        );
        Ok(Some(Event::TimerPaused {
            phase,
            remaining_secs: self.timer.confirmed.remaining_seconds,
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }

    fn reset(&mut self) -> Result<Option<Event>, TimerError> {
        self.refresh();
        let now = self.timer.clock.now_ms();
        let phase = self.timer.confirmed.phase;
        let elapsed = self.timer.confirmed.run_elapsed_secs(now);
        let patch = plan_reset(&self.timer.confirmed, now);
        self.commit(&patch)?;
        let recorded_minutes = self.timer.progress.record(phase, elapsed, now);
        tracing::info!(session = %self.timer.session_id, "Shared timer reset");
        Ok(Some(Event::TimerReset {
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }

    fn set_duration(&mut self, phase: Phase, minutes: u32) -> Result<Option<Event>, TimerError> {
        self.refresh();
        let now = self.timer.clock.now_ms();
        let secs = self
            .timer
            .settings
            .ceilings
            .clamp(phase, u64::from(minutes).saturating_mul(60));
        let patch = plan_duration(&self.timer.confirmed, phase, secs, now);
        self.commit(&patch)?;
        tracing::info!(session = %self.timer.session_id, phase = phase.label(), duration_secs = secs, "Shared duration changed");
        Ok(Some(Event::DurationChanged {
            phase,
            duration_secs: secs,
            at: ms_to_utc(now),
        }))
    }
}

/// Read-only view of a shared session.
pub struct ReaderHandle<'a> {
    timer: &'a SyncedPhaseTimer,
}

impl ReaderHandle<'_> {
    pub fn display_state(&self) -> DisplayState {
        self.timer.display_state()
    }

    pub fn session_id(&self) -> &str {
        self.timer.session_id()
    }

    pub fn controller_id(&self) -> Option<&str> {
        self.timer.controller_id()
    }
}
