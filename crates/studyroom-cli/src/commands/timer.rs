use clap::Subcommand;
use std::sync::{Arc, Mutex};
use studyroom_core::storage::Database;
use studyroom_core::timer::{LocalPhaseTimer, Phase, PhaseTimer, SessionState, TimerControl};
use studyroom_core::{Config, Intent, RedrawLoop, SystemClock};

use super::{forward_frames, frame_channel, print_frame, print_json, print_outcome, runtime, tick_period, CliResult};

const TIMER_KEY: &str = "local_timer";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Start or resume the countdown
    Start,
    /// Pause the countdown
    Pause,
    /// Start when paused, pause when running
    Toggle,
    /// Back to a paused, full Active phase
    Reset,
    /// Change the duration of a phase
    SetDuration {
        /// active | rest
        phase: Phase,
        minutes: u32,
    },
    /// Redraw the countdown until interrupted
    Watch {
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
    },
}

fn load_timer(db: &Database, config: &Config) -> Result<LocalPhaseTimer, Box<dyn std::error::Error>> {
    let settings = config.timer_settings();
    let clock = Arc::new(SystemClock);
    let timer = match db.kv_get(TIMER_KEY)? {
        Some(json) => match serde_json::from_str::<SessionState>(&json) {
            Ok(state) => LocalPhaseTimer::restore(state, settings, clock),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable timer state");
                LocalPhaseTimer::new(settings, clock)
            }
        },
        None => LocalPhaseTimer::new(settings, clock),
    };
    // A second connection is the recorder's own.
    Ok(timer.with_recorder(Database::open()?))
}

fn save_timer(db: &Database, timer: &LocalPhaseTimer) -> CliResult {
    let json = serde_json::to_string(timer.state())?;
    db.kv_set(TIMER_KEY, &json)?;
    Ok(())
}

pub fn run(action: TimerAction) -> CliResult {
    let config = Config::load()?;
    let db = Database::open()?;
    let mut timer = load_timer(&db, &config)?;

    // Catch up on a boundary crossed while no process was running.
    if let Some(event) = timer.tick()? {
        print_json(&event)?;
    }

    let intent = match action {
        TimerAction::Status => None,
        TimerAction::Start => Some(Intent::Start),
        TimerAction::Pause => Some(Intent::Pause),
        TimerAction::Toggle => Some(Intent::Toggle),
        TimerAction::Reset => Some(Intent::Reset),
        TimerAction::SetDuration { phase, minutes } => Some(Intent::SetDuration { phase, minutes }),
        TimerAction::Watch { frames } => {
            save_timer(&db, &timer)?;
            return watch(db, timer, config.timer.tick_interval_ms, frames);
        }
    };

    let event = match intent {
        Some(intent) => timer.apply_intent(intent)?,
        None => None,
    };
    save_timer(&db, &timer)?;
    print_outcome(event, timer.display_state())
}

fn watch(db: Database, timer: LocalPhaseTimer, tick_ms: u64, frames: Option<u64>) -> CliResult {
    let timer = Arc::new(Mutex::new(timer));
    let rt = runtime()?;
    rt.block_on(async {
        let (tx, mut rx) = frame_channel();
        let redraw = RedrawLoop::spawn(timer.clone(), tick_period(tick_ms), forward_frames(tx));
        let mut seen = 0u64;
        while let Some(frame) = rx.recv().await {
            print_frame(&frame)?;
            if frame.event.is_some() {
                let guard = timer.lock().map_err(|_| "timer lock poisoned")?;
                save_timer(&db, &guard)?;
            }
            seen += 1;
            if frames.is_some_and(|limit| seen >= limit) {
                break;
            }
        }
        redraw.stop();
        Ok::<(), Box<dyn std::error::Error>>(())
    })?;
    let guard = timer.lock().map_err(|_| "timer lock poisoned")?;
    save_timer(&db, &guard)
}
