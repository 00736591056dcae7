//! Study progress recording.
//!
//! The engine reports elapsed Active minutes to a [`ProgressRecorder`]. Minutes
//! are filed per user under a calendar week (`"{year}-W{week}"`) and a day of
//! that week. Week 1 is the Monday-started week containing January 1st; day
//! index 0 is Monday and 6 is Sunday.

use chrono::{Datelike, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::clock::ms_to_utc;
use crate::error::{CoreError, Result};

/// Calendar position of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeekSlot {
    pub year: i32,
    pub week: u32,
    /// 0 = Monday .. 6 = Sunday
    pub day_index: u8,
}

impl WeekSlot {
    pub fn from_date(date: NaiveDate) -> Self {
        let jan1 = NaiveDate::from_ymd_opt(date.year(), 1, 1).unwrap_or(date);
        let lead = jan1.weekday().num_days_from_monday();
        Self {
            year: date.year(),
            week: (date.ordinal0() + lead) / 7 + 1,
            day_index: date.weekday().num_days_from_monday() as u8,
        }
    }

    /// Slot for an instant, seen from `offset`.
    pub fn at(epoch_ms: i64, offset: FixedOffset) -> Self {
        let local = ms_to_utc(epoch_ms).with_timezone(&offset);
        Self::from_date(local.date_naive())
    }

    /// Document id of the week, e.g. `2025-W7`.
    pub fn week_id(&self) -> String {
        week_id(self.year, self.week)
    }
}

pub fn week_id(year: i32, week: u32) -> String {
    format!("{year}-W{week}")
}

/// Whole minutes recorded for `elapsed_secs`, rounded to the nearest minute.
pub fn minutes_for(elapsed_secs: u64) -> u32 {
    u32::try_from((elapsed_secs + 30) / 60).unwrap_or(u32::MAX)
}

/// One day inside a week record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayProgress {
    pub study: u32,
}

/// A user's week of study minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekProgress {
    pub year: i32,
    pub week_number: u32,
    pub days: Vec<DayProgress>,
}

impl WeekProgress {
    pub fn empty(year: i32, week_number: u32) -> Self {
        Self {
            year,
            week_number,
            days: vec![DayProgress::default(); 7],
        }
    }

    /// Add minutes to a day, growing legacy records that hold fewer than
    /// seven days.
    pub fn add(&mut self, day_index: u8, minutes: u32) {
        let idx = usize::from(day_index.min(6));
        if self.days.len() <= idx {
            self.days.resize(7, DayProgress::default());
        }
        self.days[idx].study = self.days[idx].study.saturating_add(minutes);
    }

    pub fn is_empty(&self) -> bool {
        self.days.iter().all(|d| d.study == 0)
    }

    pub fn total_minutes(&self) -> u32 {
        self.days.iter().map(|d| d.study).sum()
    }

    pub fn id(&self) -> String {
        week_id(self.year, self.week_number)
    }
}

/// Durable sink for study minutes.
pub trait ProgressRecorder: Send {
    /// Accumulate `minutes` into the user's day. A week whose days are all
    /// zero afterwards is not kept.
    fn record(&self, user_id: &str, slot: WeekSlot, minutes: u32) -> Result<()>;
}

/// In-memory recorder. Clones share the same log, so a test can keep one
/// handle while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MemoryProgress {
    inner: Arc<Mutex<MemoryProgressInner>>,
}

#[derive(Debug, Default)]
struct MemoryProgressInner {
    calls: Vec<(String, WeekSlot, u32)>,
    weeks: Vec<(String, WeekProgress)>,
}

impl MemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `record` call in order.
    pub fn calls(&self) -> Vec<(String, WeekSlot, u32)> {
        self.inner
            .lock()
            .map(|g| g.calls.clone())
            .unwrap_or_default()
    }

    pub fn week(&self, user_id: &str, year: i32, week: u32) -> Option<WeekProgress> {
        let guard = self.inner.lock().ok()?;
        guard
            .weeks
            .iter()
            .find(|(u, w)| u == user_id && w.year == year && w.week_number == week)
            .map(|(_, w)| w.clone())
    }
}

impl ProgressRecorder for MemoryProgress {
    fn record(&self, user_id: &str, slot: WeekSlot, minutes: u32) -> Result<()> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| CoreError::Custom("progress log poisoned".into()))?;
        guard.calls.push((user_id.to_string(), slot, minutes));

        let pos = guard
            .weeks
            .iter()
            .position(|(u, w)| u == user_id && w.year == slot.year && w.week_number == slot.week);
        let mut week = match pos {
            Some(i) => guard.weeks.remove(i).1,
            None => WeekProgress::empty(slot.year, slot.week),
        };
        week.add(slot.day_index, minutes);
        if !week.is_empty() {
            guard.weeks.push((user_id.to_string(), week));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn jan_first_is_week_one() {
        // 2025-01-01 is a Wednesday.
        let slot = WeekSlot::from_date(date(2025, 1, 1));
        assert_eq!(slot.week, 1);
        assert_eq!(slot.day_index, 2);
    }

    #[test]
    fn week_rolls_over_on_monday() {
        // Sunday 2025-01-05 still week 1, Monday 2025-01-06 week 2.
        assert_eq!(WeekSlot::from_date(date(2025, 1, 5)).week, 1);
        assert_eq!(WeekSlot::from_date(date(2025, 1, 5)).day_index, 6);
        assert_eq!(WeekSlot::from_date(date(2025, 1, 6)).week, 2);
        assert_eq!(WeekSlot::from_date(date(2025, 1, 6)).day_index, 0);
    }

    #[test]
    fn year_starting_on_monday() {
        // 2024-01-01 is a Monday.
        assert_eq!(WeekSlot::from_date(date(2024, 1, 7)).week, 1);
        assert_eq!(WeekSlot::from_date(date(2024, 1, 8)).week, 2);
    }

    #[test]
    fn slot_uses_offset() {
        // 2025-01-05T23:30:00Z is already Monday in UTC+1.
        let ms = chrono::NaiveDate::from_ymd_opt(2025, 1, 5)
            .unwrap()
            .and_hms_opt(23, 30, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let utc = WeekSlot::at(ms, FixedOffset::east_opt(0).unwrap());
        let cet = WeekSlot::at(ms, FixedOffset::east_opt(3600).unwrap());
        assert_eq!((utc.week, utc.day_index), (1, 6));
        assert_eq!((cet.week, cet.day_index), (2, 0));
    }

    #[test]
    fn minutes_round_to_nearest() {
        assert_eq!(minutes_for(0), 0);
        assert_eq!(minutes_for(29), 0);
        assert_eq!(minutes_for(30), 1);
        assert_eq!(minutes_for(1500), 25);
        assert_eq!(minutes_for(89), 1);
        assert_eq!(minutes_for(90), 2);
    }

    #[test]
    fn memory_recorder_accumulates_and_drops_empty_weeks() {
        let rec = MemoryProgress::new();
        let slot = WeekSlot { year: 2025, week: 7, day_index: 3 };
        rec.record("u1", slot, 25).unwrap();
        rec.record("u1", slot, 10).unwrap();
        assert_eq!(rec.week("u1", 2025, 7).unwrap().days[3].study, 35);

        rec.record("u2", slot, 0).unwrap();
        assert!(rec.week("u2", 2025, 7).is_none());
        assert_eq!(rec.calls().len(), 3);
    }

    #[test]
    fn legacy_short_week_is_extended() {
        let mut week = WeekProgress {
            year: 2025,
            week_number: 1,
            days: vec![DayProgress { study: 5 }],
        };
        week.add(5, 10);
        assert_eq!(week.days.len(), 7);
        assert_eq!(week.total_minutes(), 15);
        assert_eq!(week.id(), "2025-W1");
    }
}
