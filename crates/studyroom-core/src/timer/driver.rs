use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::state::DisplayState;
use super::PhaseTimer;
use crate::events::Event;

/// Periodic redraw of a timer on the tokio runtime.
///
/// Each frame calls [`PhaseTimer::tick`] and hands the fresh display to
/// `on_frame`. The loop holds no countdown of its own. Dropping the loop (or
/// calling [`RedrawLoop::stop`]) aborts the task, so switching sessions or
/// modes never leaves an orphaned ticker behind.
pub struct RedrawLoop {
    handle: JoinHandle<()>,
}

impl RedrawLoop {
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, F>(timer: Arc<Mutex<T>>, period: Duration, mut on_frame: F) -> Self
    where
        T: PhaseTimer + Send + 'static,
        F: FnMut(&DisplayState, Option<&Event>) + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let (display, event) = {
                    let Ok(mut guard) = timer.lock() else {
                        tracing::error!("Timer lock poisoned, stopping redraw loop");
                        break;
                    };
                    let event = match guard.tick() {
                        Ok(event) => event,
                        Err(err) => {
                            tracing::warn!(error = %err, "Tick failed");
                            None
                        }
                    };
                    (guard.display_state(), event)
                };
                on_frame(&display, event.as_ref());
            }
        });
        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for RedrawLoop {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::timer::{LocalPhaseTimer, TimerControl, TimerSettings};

    fn frames_after(
        frames: &Arc<Mutex<Vec<u64>>>,
    ) -> impl FnMut(&DisplayState, Option<&Event>) + Send + 'static {
        let frames = frames.clone();
        move |d, _| frames.lock().unwrap().push(d.seconds_left)
    }

    #[tokio::test(start_paused = true)]
    async fn redraws_each_period() {
        let clock = ManualClock::new(0);
        let timer = Arc::new(Mutex::new(LocalPhaseTimer::new(
            TimerSettings::default(),
            Arc::new(clock.clone()),
        )));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let redraw = RedrawLoop::spawn(timer, Duration::from_secs(1), frames_after(&frames));

        tokio::time::sleep(Duration::from_millis(3_500)).await;
        let count = frames.lock().unwrap().len();
        assert!(count >= 3, "expected at least 3 frames, got {count}");
        assert!(frames.lock().unwrap().iter().all(|&s| s == 1500));
        redraw.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_loop_draws_nothing() {
        let clock = ManualClock::new(0);
        let timer = Arc::new(Mutex::new(LocalPhaseTimer::new(
            TimerSettings::default(),
            Arc::new(clock.clone()),
        )));
        timer.lock().unwrap().start().unwrap();
        let frames = Arc::new(Mutex::new(Vec::new()));
        let redraw = RedrawLoop::spawn(timer, Duration::from_secs(1), frames_after(&frames));

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        drop(redraw);
        let count = frames.lock().unwrap().len();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(frames.lock().unwrap().len(), count);
    }
}
