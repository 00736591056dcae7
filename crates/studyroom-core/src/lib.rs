//! # Studyroom Core Library
//!
//! This library provides the core logic for the Studyroom phase timer: an
//! alternating Active/Rest countdown that runs either on one machine or as a
//! shared session mirrored by many observers. All operations are available via
//! the standalone CLI binary, which is a thin layer over this crate.
//!
//! ## Architecture
//!
//! - **Timer**: the countdown is derived from wall-clock anchors on every read,
//!   never decremented. [`LocalPhaseTimer`] owns its state;
//!   [`SyncedPhaseTimer`] mirrors a remote document and only its controller
//!   may write.
//! - **Store**: [`SessionStore`] holds shared session documents and pushes
//!   every committed version to subscribers.
//! - **Progress**: completed Active time is filed per user, week and day.
//! - **Storage**: SQLite persistence and TOML configuration.
//!
//! ## Key Components
//!
//! - [`PhaseTimer`] / [`TimerControl`]: read and control surfaces
//! - [`ControllerHandle`]: write capability for shared sessions
//! - [`Database`]: local state and weekly progress
//! - [`Config`]: application configuration management

pub mod clock;
pub mod error;
pub mod events;
pub mod progress;
pub mod storage;
pub mod store;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{ConfigError, CoreError, DatabaseError, StoreError, TimerError};
pub use events::Event;
pub use progress::{MemoryProgress, ProgressRecorder, WeekProgress, WeekSlot};
pub use storage::{Config, Database, SqliteSessionStore};
pub use store::{create_shared_session, MemorySessionStore, SessionStore, Subscription};
pub use timer::{
    BoundaryPolicy, ControllerHandle, DisplayState, Intent, LocalPhaseTimer, Phase, PhaseTimer,
    ReaderHandle, RedrawLoop, SessionState, SyncedPhaseTimer, TimerControl, TimerSettings,
};
