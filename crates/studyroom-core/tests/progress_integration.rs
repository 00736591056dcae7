//! Integration tests for study progress recorded by the timer into SQLite.

use std::sync::Arc;

use chrono::{FixedOffset, NaiveDate, TimeZone, Utc};
use studyroom_core::progress::WeekSlot;
use studyroom_core::{Database, LocalPhaseTimer, ManualClock, PhaseTimer, TimerControl, TimerSettings};

fn ms(y: i32, m: u32, d: u32, h: u32, min: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap().timestamp_millis()
}

#[test]
fn test_completed_phase_lands_in_week_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyroom.db");
    // Wednesday 2025-02-12 09:00 UTC
    let clock = ManualClock::new(ms(2025, 2, 12, 9, 0));
    let settings = TimerSettings::default()
        .with_user("u1")
        .with_offset(FixedOffset::east_opt(0).unwrap());

    let mut timer = LocalPhaseTimer::new(settings, Arc::new(clock.clone()))
        .with_recorder(Database::open_at(&path).unwrap());
    timer.start().unwrap();
    clock.advance_ms(25 * 60_000);
    timer.tick().unwrap();

    let db = Database::open_at(&path).unwrap();
    let slot = WeekSlot::from_date(NaiveDate::from_ymd_opt(2025, 2, 12).unwrap());
    assert_eq!(slot.day_index, 2);
    let week = db.week_progress("u1", slot.year, slot.week).unwrap().unwrap();
    assert_eq!(week.days[2].study, 25);
    assert_eq!(week.total_minutes(), 25);
}

#[test]
fn test_offset_moves_recording_to_local_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyroom.db");
    // Sunday 2025-02-16 23:30 UTC is already Monday in UTC+9.
    let start = ms(2025, 2, 16, 23, 30);
    let clock = ManualClock::new(start);
    let settings = TimerSettings::default()
        .with_user("u1")
        .with_offset(FixedOffset::east_opt(9 * 3600).unwrap());

    let mut timer = LocalPhaseTimer::new(settings, Arc::new(clock.clone()))
        .with_recorder(Database::open_at(&path).unwrap());
    timer.start().unwrap();
    clock.advance_ms(12 * 60_000 + 40_000);
    timer.pause().unwrap();

    let monday = WeekSlot::from_date(NaiveDate::from_ymd_opt(2025, 2, 17).unwrap());
    assert_eq!(monday.day_index, 0);
    let db = Database::open_at(&path).unwrap();
    let week = db.week_progress("u1", monday.year, monday.week).unwrap().unwrap();
    // 12m40s rounds to 13 minutes.
    assert_eq!(week.days[0].study, 13);
}

#[test]
fn test_rest_and_paused_time_are_not_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("studyroom.db");
    let clock = ManualClock::new(ms(2025, 3, 3, 8, 0));
    let settings = TimerSettings::default()
        .with_user("u1")
        .with_offset(FixedOffset::east_opt(0).unwrap());

    let mut timer = LocalPhaseTimer::new(settings, Arc::new(clock.clone()))
        .with_recorder(Database::open_at(&path).unwrap());
    timer.start().unwrap();
    clock.advance_ms(25 * 60_000);
    timer.tick().unwrap();
    clock.advance_ms(5 * 60_000);
    timer.tick().unwrap();
    timer.pause().unwrap();
    clock.advance_ms(60 * 60_000);
    timer.reset().unwrap();
    assert!(!timer.display_state().is_running);

    let db = Database::open_at(&path).unwrap();
    let weeks = db.weeks_for_user("u1").unwrap();
    assert_eq!(weeks.len(), 1);
    assert_eq!(weeks[0].total_minutes(), 25);
}

#[test]
fn test_week_numbering_starts_with_january_first() {
    // 2025-01-01 is a Wednesday: it is in week 1, as is the following Sunday.
    let jan1 = WeekSlot::from_date(NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
    assert_eq!((jan1.week, jan1.day_index), (1, 2));
    let jan5 = WeekSlot::from_date(NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
    assert_eq!((jan5.week, jan5.day_index), (1, 6));
    let jan6 = WeekSlot::from_date(NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
    assert_eq!((jan6.week, jan6.day_index), (2, 0));
    assert_eq!(jan6.week_id(), "2025-W2");
}
