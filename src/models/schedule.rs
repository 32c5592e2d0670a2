use std::collections::BTreeMap;

use chrono::{NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Serialize};

/// First hour of the day an opening/closing time may fall on.
pub const FIRST_SLOT_HOUR: u32 = 6;
/// Allowed opening/closing times are spaced this many minutes apart.
pub const TIME_SLOT_MINUTES: u32 = 30;
/// Every allowed opening/closing time as (hour, minute): 06:00, 06:30, … 23:30.
pub const ALLOWED_TIME_SLOTS: [(u32, u32); 36] = build_time_slots();

const fn build_time_slots() -> [(u32, u32); 36] {
    let mut slots = [(0, 0); 36];
    let mut i = 0;
    while i < 36 {
        let minutes = (i as u32) * TIME_SLOT_MINUTES;
        slots[i] = (FIRST_SLOT_HOUR + minutes / 60, minutes % 60);
        i += 1;
    }
    slots
}

/// Whether `time` is one of [`ALLOWED_TIME_SLOTS`].
pub fn is_allowed_time(time: NaiveTime) -> bool {
    if time.second() != 0 || time.nanosecond() != 0 {
        return false;
    }
    ALLOWED_TIME_SLOTS
        .iter()
        .any(|&(h, m)| time.hour() == h && time.minute() == m)
}

/// Day of week, numbered Monday=0 … Sunday=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        DayOfWeek::Monday,
        DayOfWeek::Tuesday,
        DayOfWeek::Wednesday,
        DayOfWeek::Thursday,
        DayOfWeek::Friday,
        DayOfWeek::Saturday,
        DayOfWeek::Sunday,
    ];

    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Option<DayOfWeek> {
        Self::ALL.get(index as usize).copied()
    }

    /// Name shown on the site.
    pub fn label(&self) -> &'static str {
        match self {
            DayOfWeek::Monday => "Понедельник",
            DayOfWeek::Tuesday => "Вторник",
            DayOfWeek::Wednesday => "Среда",
            DayOfWeek::Thursday => "Четверг",
            DayOfWeek::Friday => "Пятница",
            DayOfWeek::Saturday => "Суббота",
            DayOfWeek::Sunday => "Воскресенье",
        }
    }
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        // chrono numbers Monday as 0 as well
        Self::ALL[day.num_days_from_monday() as usize]
    }
}

impl From<DayOfWeek> for u8 {
    fn from(day: DayOfWeek) -> Self {
        day.index()
    }
}

impl TryFrom<u8> for DayOfWeek {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        DayOfWeek::from_index(value).ok_or_else(|| format!("Unknown day of week: {}", value))
    }
}

impl std::fmt::Display for DayOfWeek {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One weekday's opening hours.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEntry {
    pub day_of_week: DayOfWeek,
    pub is_closed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opening_time: Option<NaiveTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closing_time: Option<NaiveTime>,
}

impl DayEntry {
    pub fn open(day_of_week: DayOfWeek, opening_time: NaiveTime, closing_time: NaiveTime) -> Self {
        Self {
            day_of_week,
            is_closed: false,
            opening_time: Some(opening_time),
            closing_time: Some(closing_time),
        }
    }

    pub fn closed(day_of_week: DayOfWeek) -> Self {
        Self {
            day_of_week,
            is_closed: true,
            opening_time: None,
            closing_time: None,
        }
    }

    /// Hours as displayed in branch listings: "09:00 - 19:00" or "Выходной".
    pub fn hours_label(&self) -> String {
        if self.is_closed {
            return "Выходной".to_string();
        }
        let fmt = |t: Option<NaiveTime>| {
            t.map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "--:--".to_string())
        };
        format!("{} - {}", fmt(self.opening_time), fmt(self.closing_time))
    }
}

/// Opening hours of one branch, at most one entry per day.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DayEntry>", into = "Vec<DayEntry>")]
pub struct WeeklySchedule {
    entries: BTreeMap<DayOfWeek, DayEntry>,
}

impl WeeklySchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the entry for its day.
    pub fn insert(&mut self, entry: DayEntry) -> Option<DayEntry> {
        self.entries.insert(entry.day_of_week, entry)
    }

    pub fn get(&self, day: DayOfWeek) -> Option<&DayEntry> {
        self.entries.get(&day)
    }

    /// Entries ordered Monday first.
    pub fn iter(&self) -> impl Iterator<Item = &DayEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No hours configured at all. Not the same as every day closed.
    pub fn is_unset(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.entries.len() == DayOfWeek::ALL.len()
    }

    pub fn missing_days(&self) -> Vec<DayOfWeek> {
        DayOfWeek::ALL
            .into_iter()
            .filter(|day| !self.entries.contains_key(day))
            .collect()
    }
}

impl FromIterator<DayEntry> for WeeklySchedule {
    fn from_iter<I: IntoIterator<Item = DayEntry>>(iter: I) -> Self {
        let mut schedule = WeeklySchedule::new();
        for entry in iter {
            schedule.insert(entry);
        }
        schedule
    }
}

impl From<Vec<DayEntry>> for WeeklySchedule {
    fn from(entries: Vec<DayEntry>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<WeeklySchedule> for Vec<DayEntry> {
    fn from(schedule: WeeklySchedule) -> Self {
        schedule.entries.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_time_slots() {
        assert_eq!(ALLOWED_TIME_SLOTS[0], (6, 0));
        assert_eq!(ALLOWED_TIME_SLOTS[1], (6, 30));
        assert_eq!(ALLOWED_TIME_SLOTS[35], (23, 30));
        assert!(is_allowed_time(t(9, 0)));
        assert!(is_allowed_time(t(17, 30)));
        assert!(!is_allowed_time(t(9, 15)));
        assert!(!is_allowed_time(t(5, 30)));
        assert!(!is_allowed_time(NaiveTime::from_hms_opt(9, 0, 1).unwrap()));
    }

    #[test]
    fn test_day_of_week_from_chrono() {
        assert_eq!(DayOfWeek::from(Weekday::Mon), DayOfWeek::Monday);
        assert_eq!(DayOfWeek::from(Weekday::Sun), DayOfWeek::Sunday);
        assert_eq!(DayOfWeek::Sunday.index(), 6);
        assert_eq!(DayOfWeek::from_index(7), None);
        assert!(DayOfWeek::try_from(9u8).is_err());
    }

    #[test]
    fn test_insert_replaces_same_day() {
        let mut schedule = WeeklySchedule::new();
        schedule.insert(DayEntry::open(DayOfWeek::Monday, t(9, 0), t(19, 0)));
        let previous = schedule.insert(DayEntry::closed(DayOfWeek::Monday));
        assert!(previous.is_some());
        assert_eq!(schedule.len(), 1);
        assert!(schedule.get(DayOfWeek::Monday).unwrap().is_closed);
    }

    #[test]
    fn test_unset_vs_all_closed() {
        assert!(WeeklySchedule::new().is_unset());
        let all_closed: WeeklySchedule = DayOfWeek::ALL.into_iter().map(DayEntry::closed).collect();
        assert!(!all_closed.is_unset());
        assert!(all_closed.is_complete());
        assert!(all_closed.missing_days().is_empty());
    }

    #[test]
    fn test_hours_label() {
        assert_eq!(DayEntry::open(DayOfWeek::Friday, t(9, 0), t(19, 0)).hours_label(), "09:00 - 19:00");
        assert_eq!(DayEntry::closed(DayOfWeek::Sunday).hours_label(), "Выходной");
        let partial = DayEntry {
            day_of_week: DayOfWeek::Tuesday,
            is_closed: false,
            opening_time: Some(t(10, 0)),
            closing_time: None,
        };
        assert_eq!(partial.hours_label(), "10:00 - --:--");
    }

    #[test]
    fn test_schedule_json_is_ordered_list() {
        let schedule: WeeklySchedule = vec![
            DayEntry::closed(DayOfWeek::Sunday),
            DayEntry::open(DayOfWeek::Monday, t(9, 0), t(19, 0)),
        ]
        .into();
        let json = serde_json::to_value(&schedule).unwrap();
        assert_eq!(json[0]["day_of_week"], 0);
        assert_eq!(json[1]["day_of_week"], 6);

        let back: WeeklySchedule = serde_json::from_value(json).unwrap();
        assert_eq!(back, schedule);
    }
}
