use clap::Subcommand;
use serde_json::json;
use std::sync::{Arc, Mutex};
use studyroom_core::storage::{data_dir, database::DB_FILE, Database};
use studyroom_core::store::{create_shared_session, SessionStore};
use studyroom_core::timer::{Phase, PhaseTimer};
use studyroom_core::{Config, Intent, RedrawLoop, SqliteSessionStore, SyncedPhaseTimer, SystemClock};

use super::{forward_frames, frame_channel, print_frame, print_json, print_outcome, runtime, tick_period, CliResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Create a shared session controlled by this observer
    Create {
        /// Active phase length in minutes (defaults to config)
        #[arg(long)]
        active: Option<u32>,
        /// Rest phase length in minutes (defaults to config)
        #[arg(long)]
        rest: Option<u32>,
    },
    /// Print the session as seen by this observer
    Status { id: String },
    Start { id: String },
    Pause { id: String },
    Toggle { id: String },
    Reset { id: String },
    SetDuration {
        id: String,
        /// active | rest
        phase: Phase,
        minutes: u32,
    },
    /// Mirror the session until interrupted
    Watch {
        id: String,
        /// Stop after this many frames
        #[arg(long)]
        frames: Option<u64>,
    },
    /// Delete the session document
    Delete { id: String },
}

fn open_store() -> Result<Arc<SqliteSessionStore>, Box<dyn std::error::Error>> {
    Ok(Arc::new(SqliteSessionStore::open_at(data_dir()?.join(DB_FILE))?))
}

fn join(
    store: &Arc<SqliteSessionStore>,
    id: &str,
    observer: &str,
    config: &Config,
) -> Result<SyncedPhaseTimer, Box<dyn std::error::Error>> {
    let timer = SyncedPhaseTimer::join(
        store.clone(),
        id,
        observer,
        config.timer_settings(),
        Arc::new(SystemClock),
    )?;
    Ok(timer.with_recorder(Database::open()?))
}

pub fn run(action: SessionAction, observer: Option<String>) -> CliResult {
    let config = Config::load()?;
    let observer = observer.unwrap_or_else(|| config.identity.observer_id.clone());
    let store = open_store()?;

    let (id, intent) = match action {
        SessionAction::Create { active, rest } => {
            let settings = config.timer_settings();
            let active_secs = active.map_or(settings.active_secs, |m| u64::from(m) * 60);
            let rest_secs = rest.map_or(settings.rest_secs, |m| u64::from(m) * 60);
            let settings = settings.with_durations(active_secs, rest_secs);
            let id = create_shared_session(store.as_ref(), &settings, &observer, &SystemClock)?;
            return print_json(&json!({
                "session_id": id,
                "controller_id": observer,
                "active_duration": settings.active_secs,
                "rest_duration": settings.rest_secs,
            }));
        }
        SessionAction::Delete { id } => {
            let timer = join(&store, &id, &observer, &config)?;
            if !timer.can_control() {
                return Err(format!("observer '{observer}' cannot delete session {id}").into());
            }
            timer.leave();
            store.delete(&id)?;
            return print_json(&json!({ "deleted": id }));
        }
        SessionAction::Watch { id, frames } => {
            let timer = join(&store, &id, &observer, &config)?;
            return watch(store, timer, config.timer.tick_interval_ms, frames);
        }
        SessionAction::Status { id } => (id, None),
        SessionAction::Start { id } => (id, Some(Intent::Start)),
        SessionAction::Pause { id } => (id, Some(Intent::Pause)),
        SessionAction::Toggle { id } => (id, Some(Intent::Toggle)),
        SessionAction::Reset { id } => (id, Some(Intent::Reset)),
        SessionAction::SetDuration { id, phase, minutes } => {
            (id, Some(Intent::SetDuration { phase, minutes }))
        }
    };

    let mut timer = join(&store, &id, &observer, &config)?;
    // The controller completes a phase that ran out while nobody watched.
    if let Some(event) = timer.tick()? {
        print_json(&event)?;
    }
    let event = match intent {
        Some(intent) => timer.apply_intent(intent)?,
        None => None,
    };
    print_outcome(event, timer.display_state())
}

fn watch(
    store: Arc<SqliteSessionStore>,
    timer: SyncedPhaseTimer,
    tick_ms: u64,
    frames: Option<u64>,
) -> CliResult {
    let id = timer.session_id().to_string();
    let timer = Arc::new(Mutex::new(timer));
    let rt = runtime()?;
    rt.block_on(async {
        let (tx, mut rx) = frame_channel();
        let redraw = RedrawLoop::spawn(timer.clone(), tick_period(tick_ms), forward_frames(tx));
        let mut seen = 0u64;
        while let Some(frame) = rx.recv().await {
            print_frame(&frame)?;
            seen += 1;
            if frames.is_some_and(|limit| seen >= limit) {
                break;
            }
            // Pick up writes made by other processes before the next frame.
            if let Err(e) = store.refresh(&id) {
                tracing::warn!(session = %id, error = %e, "Session refresh failed");
            }
        }
        redraw.stop();
        Ok::<(), Box<dyn std::error::Error>>(())
    })
}
