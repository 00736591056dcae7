//! Local phase timer.
//!
//! A private countdown with a single observer who is implicitly the
//! controller. State lives in memory (the CLI persists it between runs).
//! There are no internal threads: the caller drives `tick()` periodically,
//! and every intent takes effect immediately.
//!
//! ## Usage
//!
//! ```ignore
//! let mut timer = LocalPhaseTimer::new(settings, Arc::new(SystemClock));
//! timer.start()?;
//! // In a loop:
//! timer.tick()?; // Some(Event::PhaseCompleted) when a phase ends
//! ```

use std::sync::Arc;

use super::guard::TransitionGuard;
use super::intents::{plan_duration, plan_pause, plan_reset, plan_start, plan_transition};
use super::phase::{Phase, TimerSettings};
use super::recording::ProgressHook;
use super::state::{DisplayState, SessionPatch, SessionState};
use super::{PhaseTimer, TimerControl};
use crate::clock::{ms_to_utc, Clock};
use crate::error::TimerError;
use crate::events::Event;
use crate::progress::ProgressRecorder;

pub struct LocalPhaseTimer {
    state: SessionState,
    settings: TimerSettings,
    clock: Arc<dyn Clock>,
    progress: ProgressHook,
    guard: TransitionGuard,
}

impl LocalPhaseTimer {
    /// Fresh timer: paused, Active phase, configured durations.
    pub fn new(settings: TimerSettings, clock: Arc<dyn Clock>) -> Self {
        let state = SessionState::from_settings(&settings);
        Self::restore(state, settings, clock)
    }

    /// Resume from a previously persisted state. Durations are clamped to the
    /// current ceilings and the controller id is dropped.
    pub fn restore(mut state: SessionState, settings: TimerSettings, clock: Arc<dyn Clock>) -> Self {
        state.active_duration = settings.ceilings.clamp(Phase::Active, state.active_duration);
        state.rest_duration = settings.ceilings.clamp(Phase::Rest, state.rest_duration);
        state.controller_id = None;
        if state.is_running && state.anchor_time.is_none() {
            state.is_running = false;
        }
        let progress = ProgressHook::new(None, &settings);
        Self {
            state,
            settings,
            clock,
            progress,
            guard: TransitionGuard::default(),
        }
    }

    pub fn with_recorder(mut self, recorder: impl ProgressRecorder + 'static) -> Self {
        self.progress = ProgressHook::new(Some(Box::new(recorder)), &self.settings);
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    fn apply(&mut self, patch: &SessionPatch) {
        self.state.apply_patch(patch);
        if !self.state.is_running {
            self.state.run_started_at = None;
        }
    }
}

impl PhaseTimer for LocalPhaseTimer {
    fn display_state(&self) -> DisplayState {
        self.state
            .display(self.clock.now_ms(), self.settings.boundary_policy, true)
    }

    fn tick(&mut self) -> Result<Option<Event>, TimerError> {
        let now = self.clock.now_ms();
        let Some((key, patch)) = plan_transition(&self.state, now) else {
            return Ok(None);
        };
        if !self.guard.claim(key) {
            return Ok(None);
        }
        let completed = self.state.phase;
        let elapsed = self.state.run_elapsed_secs(now);
        let recorded_minutes = self.progress.record(completed, elapsed, now);
        self.apply(&patch);
        tracing::info!(
            completed = completed.label(),
            next = self.state.phase.label(),
            "Phase completed"
        );
        Ok(Some(Event::PhaseCompleted {
            completed,
            next: self.state.phase,
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }
}

impl TimerControl for LocalPhaseTimer {
    fn start(&mut self) -> Result<Option<Event>, TimerError> {
        let now = self.clock.now_ms();
        let Some(patch) = plan_start(&self.state, now, self.settings.boundary_policy) else {
            return Ok(None);
        };
        self.apply(&patch);
        let seconds_left = self.state.seconds_left(now);
        tracing::info!(phase = self.state.phase.label(), seconds_left, "Timer started");
        Ok(Some(Event::TimerStarted {
            phase: self.state.phase,
            seconds_left,
            at: ms_to_utc(now),
        }))
    }

    fn pause(&mut self) -> Result<Option<Event>, TimerError> {
        let now = self.clock.now_ms();
        let Some(patch) = plan_pause(&self.state, now) else {
            return Ok(None);
        };
        let phase = self.state.phase;
        let elapsed = self.state.run_elapsed_secs(now);
        let recorded_minutes = self.progress.record(phase, elapsed, now);
        self.apply(&patch);
        tracing::info!(phase = phase.label(), remaining = self.state.remaining_seconds, "Timer paused");
        Ok(Some(Event::TimerPaused {
            phase,
            remaining_secs: self.state.remaining_seconds,
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }

    fn reset(&mut self) -> Result<Option<Event>, TimerError> {
        let now = self.clock.now_ms();
        let recorded_minutes = self
            .progress
            .record(self.state.phase, self.state.run_elapsed_secs(now), now);
        let patch = plan_reset(&self.state, now);
        self.apply(&patch);
        tracing::info!("Timer reset");
        Ok(Some(Event::TimerReset {
            recorded_minutes,
            at: ms_to_utc(now),
        }))
    }

    fn set_duration(&mut self, phase: Phase, minutes: u32) -> Result<Option<Event>, TimerError> {
        let now = self.clock.now_ms();
        let secs = self
            .settings
            .ceilings
            .clamp(phase, u64::from(minutes).saturating_mul(60));
        let patch = plan_duration(&self.state, phase, secs, now);
        self.apply(&patch);
        tracing::info!(phase = phase.label(), duration_secs = secs, "Duration changed");
        Ok(Some(Event::DurationChanged {
            phase,
            duration_secs: secs,
            at: ms_to_utc(now),
        }))
    }
}
