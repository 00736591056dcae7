pub mod config;
pub mod session;
pub mod stats;
pub mod timer;

use serde::Serialize;
use std::time::Duration;
use studyroom_core::{Clock, DisplayState, Event, SystemClock};
use tokio::sync::mpsc;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the event produced by an intent, or the current display when the
/// intent had nothing to do.
pub fn print_outcome(event: Option<Event>, display: DisplayState) -> CliResult {
    match event {
        Some(event) => print_json(&event),
        None => print_json(&Event::StateSnapshot {
            display,
            at: SystemClock.now_utc(),
        }),
    }
}

/// One redraw delivered to a `watch` command.
pub struct Frame {
    pub display: DisplayState,
    pub event: Option<Event>,
}

pub fn frame_channel() -> (mpsc::UnboundedSender<Frame>, mpsc::UnboundedReceiver<Frame>) {
    mpsc::unbounded_channel()
}

/// Redraw callback that forwards frames to the printing side.
pub fn forward_frames(
    tx: mpsc::UnboundedSender<Frame>,
) -> impl FnMut(&DisplayState, Option<&Event>) + Send + 'static {
    move |display, event| {
        let _ = tx.send(Frame {
            display: display.clone(),
            event: event.cloned(),
        });
    }
}

pub fn print_frame(frame: &Frame) -> CliResult {
    if let Some(event) = &frame.event {
        print_json(event)?;
    }
    println!(
        "{} {} {}",
        frame.display.phase.label(),
        frame.display.formatted(),
        if frame.display.is_running { "running" } else { "paused" }
    );
    Ok(())
}

pub fn tick_period(ms: u64) -> Duration {
    Duration::from_millis(ms.max(10))
}

pub fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
