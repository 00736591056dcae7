use chrono::FixedOffset;

use super::phase::{Phase, TimerSettings};
use crate::progress::{minutes_for, ProgressRecorder, WeekSlot};

/// Files elapsed Active time with the progress recorder.
///
/// Only Active time is recorded, only when a user is known and more than zero
/// seconds elapsed. Recorder failures are logged and never abort the intent
/// that triggered them.
pub(crate) struct ProgressHook {
    recorder: Option<Box<dyn ProgressRecorder>>,
    user_id: Option<String>,
    offset: FixedOffset,
}

impl ProgressHook {
    pub(crate) fn new(recorder: Option<Box<dyn ProgressRecorder>>, settings: &TimerSettings) -> Self {
        Self {
            recorder,
            user_id: settings.user_id.clone(),
            offset: settings.utc_offset,
        }
    }

    /// Returns the minutes handed to the recorder, if it was called.
    pub(crate) fn record(&self, phase: Phase, elapsed_secs: u64, now_ms: i64) -> Option<u32> {
        if phase != Phase::Active || elapsed_secs == 0 {
            return None;
        }
        let recorder = self.recorder.as_ref()?;
        let user_id = self.user_id.as_deref()?;
        let slot = WeekSlot::at(now_ms, self.offset);
        let minutes = minutes_for(elapsed_secs);
        match recorder.record(user_id, slot, minutes) {
            Ok(()) => {
                tracing::info!(
                    user = user_id,
                    week = %slot.week_id(),
                    day = slot.day_index,
                    minutes,
                    "Recorded study progress"
                );
                Some(minutes)
            }
            Err(err) => {
                tracing::warn!(error = %err, user = user_id, "Failed to record study progress");
                None
            }
        }
    }
}

impl std::fmt::Debug for ProgressHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHook")
            .field("has_recorder", &self.recorder.is_some())
            .field("user_id", &self.user_id)
            .field("offset", &self.offset)
            .finish()
    }
}
