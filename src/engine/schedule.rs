use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use chrono_tz::Tz;

use crate::errors::AppError;
use crate::models::schedule::{is_allowed_time, DayEntry, DayOfWeek, WeeklySchedule};

/// Whether a branch is open at the given local wall-clock time.
///
/// A day with no entry counts as closed. Opening and closing instants are
/// both inside the window. Windows never cross midnight.
pub fn is_open_now(schedule: &WeeklySchedule, now: NaiveDateTime) -> bool {
    let today = DayOfWeek::from(now.weekday());
    let Some(entry) = schedule.get(today) else {
        return false;
    };
    if entry.is_closed {
        return false;
    }
    match (entry.opening_time, entry.closing_time) {
        (Some(open), Some(close)) => {
            let time = now.time();
            open <= time && time <= close
        }
        _ => false,
    }
}

/// Same as [`is_open_now`] for an absolute instant, read in the branch's zone.
pub fn is_open_at(schedule: &WeeklySchedule, instant: DateTime<Utc>, tz: Tz) -> bool {
    let local = instant.with_timezone(&tz).naive_local();
    is_open_now(schedule, local)
}

/// Check one entry before it is written.
pub fn validate_day_entry(entry: &DayEntry) -> Result<(), AppError> {
    if entry.is_closed {
        return Ok(());
    }
    let day = entry.day_of_week;
    let (open, close) = match (entry.opening_time, entry.closing_time) {
        (Some(open), Some(close)) => (open, close),
        (None, _) => {
            return Err(AppError::InvalidSchedule(format!(
                "{}: opening time is required for a working day",
                day
            )))
        }
        (_, None) => {
            return Err(AppError::InvalidSchedule(format!(
                "{}: closing time is required for a working day",
                day
            )))
        }
    };
    for time in [open, close] {
        if !is_allowed_time(time) {
            return Err(AppError::InvalidSchedule(format!(
                "{}: {} is not an allowed time slot",
                day,
                time.format("%H:%M:%S")
            )));
        }
    }
    if open >= close {
        return Err(AppError::InvalidSchedule(format!(
            "{}: opening time {} must be before closing time {}",
            day,
            open.format("%H:%M"),
            close.format("%H:%M")
        )));
    }
    Ok(())
}

pub fn validate_schedule(schedule: &WeeklySchedule) -> Result<(), AppError> {
    schedule.iter().try_for_each(validate_day_entry)
}

/// Add a closed entry for every day the schedule lacks.
/// Returns the days that were added.
pub fn fill_missing_days(schedule: &mut WeeklySchedule) -> Vec<DayOfWeek> {
    let missing = schedule.missing_days();
    for &day in &missing {
        schedule.insert(DayEntry::closed(day));
    }
    missing
}

/// Text for the operator's schedule preview, one line per day.
pub fn schedule_preview(schedule: &WeeklySchedule) -> String {
    if schedule.is_unset() {
        return "Режим работы не установлен".to_string();
    }
    schedule
        .iter()
        .map(|entry| format!("{}: {}", entry.day_of_week, entry.hours_label()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime, TimeZone};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    // 2025-03-03 is a Monday.
    fn monday_at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 3)
            .unwrap()
            .and_hms_opt(h, m, s)
            .unwrap()
    }

    fn weekday_schedule() -> WeeklySchedule {
        let mut schedule = WeeklySchedule::new();
        schedule.insert(DayEntry::open(DayOfWeek::Monday, t(9, 0), t(19, 0)));
        schedule
    }

    #[test]
    fn test_boundaries_inclusive() {
        let schedule = weekday_schedule();
        assert!(!is_open_now(&schedule, monday_at(8, 59, 59)));
        assert!(is_open_now(&schedule, monday_at(9, 0, 0)));
        assert!(is_open_now(&schedule, monday_at(13, 30, 0)));
        assert!(is_open_now(&schedule, monday_at(19, 0, 0)));
        assert!(!is_open_now(&schedule, monday_at(19, 0, 1)));
    }

    #[test]
    fn test_missing_day_is_closed() {
        let schedule = weekday_schedule();
        // Tuesday, no entry
        let tuesday = monday_at(12, 0, 0) + chrono::Duration::days(1);
        assert!(!is_open_now(&schedule, tuesday));
        assert!(!is_open_now(&WeeklySchedule::new(), monday_at(12, 0, 0)));
    }

    #[test]
    fn test_closed_day_ignores_stray_times() {
        let mut schedule = WeeklySchedule::new();
        schedule.insert(DayEntry {
            day_of_week: DayOfWeek::Monday,
            is_closed: true,
            opening_time: Some(t(0, 0)),
            closing_time: Some(t(23, 30)),
        });
        assert!(!is_open_now(&schedule, monday_at(12, 0, 0)));
    }

    #[test]
    fn test_open_day_without_times_reads_closed() {
        let mut schedule = WeeklySchedule::new();
        schedule.insert(DayEntry {
            day_of_week: DayOfWeek::Monday,
            is_closed: false,
            opening_time: None,
            closing_time: None,
        });
        assert!(!is_open_now(&schedule, monday_at(12, 0, 0)));
    }

    #[test]
    fn test_is_open_at_uses_branch_zone() {
        let schedule = weekday_schedule();
        let tz = chrono_tz::Europe::Moscow;
        // 06:30 UTC is 09:30 in Moscow
        let instant = Utc.with_ymd_and_hms(2025, 3, 3, 6, 30, 0).unwrap();
        assert!(is_open_at(&schedule, instant, tz));
        // 16:30 UTC is 19:30 in Moscow
        let instant = Utc.with_ymd_and_hms(2025, 3, 3, 16, 30, 0).unwrap();
        assert!(!is_open_at(&schedule, instant, tz));
    }

    #[test]
    fn test_open_entry_without_times_rejected() {
        let entry = DayEntry {
            day_of_week: DayOfWeek::Wednesday,
            is_closed: false,
            opening_time: None,
            closing_time: None,
        };
        assert!(matches!(
            validate_day_entry(&entry),
            Err(AppError::InvalidSchedule(_))
        ));

        let entry = DayEntry {
            closing_time: None,
            ..DayEntry::open(DayOfWeek::Wednesday, t(9, 0), t(19, 0))
        };
        assert!(validate_day_entry(&entry).is_err());
    }

    #[test]
    fn test_closing_before_opening_rejected() {
        let overnight = DayEntry::open(DayOfWeek::Friday, t(22, 0), t(6, 0));
        assert!(validate_day_entry(&overnight).is_err());
        let empty = DayEntry::open(DayOfWeek::Friday, t(9, 0), t(9, 0));
        assert!(validate_day_entry(&empty).is_err());
    }

    #[test]
    fn test_off_slot_time_rejected() {
        let entry = DayEntry::open(DayOfWeek::Friday, t(9, 15), t(19, 0));
        assert!(validate_day_entry(&entry).is_err());
        assert!(validate_day_entry(&DayEntry::open(DayOfWeek::Friday, t(9, 30), t(18, 0))).is_ok());
    }

    #[test]
    fn test_closed_entry_always_valid() {
        let entry = DayEntry {
            opening_time: Some(t(19, 0)),
            closing_time: Some(t(9, 0)),
            ..DayEntry::closed(DayOfWeek::Sunday)
        };
        assert!(validate_day_entry(&entry).is_ok());
    }

    #[test]
    fn test_fill_missing_days() {
        let mut schedule = weekday_schedule();
        let added = fill_missing_days(&mut schedule);
        assert_eq!(added.len(), 6);
        assert!(schedule.is_complete());
        assert!(!schedule.get(DayOfWeek::Monday).unwrap().is_closed);
        assert!(schedule.get(DayOfWeek::Saturday).unwrap().is_closed);
        assert!(fill_missing_days(&mut schedule).is_empty());
        validate_schedule(&schedule).unwrap();
    }

    #[test]
    fn test_schedule_preview() {
        assert_eq!(schedule_preview(&WeeklySchedule::new()), "Режим работы не установлен");
        let mut schedule = weekday_schedule();
        schedule.insert(DayEntry::closed(DayOfWeek::Sunday));
        assert_eq!(
            schedule_preview(&schedule),
            "Понедельник: 09:00 - 19:00\nВоскресенье: Выходной"
        );
    }
}
