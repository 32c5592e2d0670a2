use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::Connection;
use tracing::info;

use crate::data::storage;
use crate::engine::schedule::validate_schedule;
use crate::errors::AppError;
use crate::models::branch::{Branch, NewBranch};
use crate::models::schedule::{DayEntry, DayOfWeek, WeeklySchedule};

/// Result of a seeding run.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedOutcome {
    Created(Branch),
    AlreadyExists(Branch),
}

fn demo_branch() -> NewBranch {
    NewBranch {
        city: "Кострома".to_string(),
        street: "Самоковская".to_string(),
        house: "10Б".to_string(),
        phone: "+7 (4942) 123-456".to_string(),
        description: "Главный филиал ломбарда".to_string(),
        latitude: Some(57.7680),
        longitude: Some(40.9269),
        is_active: true,
    }
}

/// Mon–Fri 09:00–19:00, Sat 10:00–17:00, Sun closed.
pub fn demo_schedule() -> WeeklySchedule {
    let hm = |h: u32, m: u32| NaiveTime::from_hms_opt(h, m, 0).unwrap_or_default();
    DayOfWeek::ALL
        .into_iter()
        .map(|day| match day {
            DayOfWeek::Saturday => DayEntry::open(day, hm(10, 0), hm(17, 0)),
            DayOfWeek::Sunday => DayEntry::closed(day),
            _ => DayEntry::open(day, hm(9, 0), hm(19, 0)),
        })
        .collect()
}

/// Create the demo branch unless a branch at the same address exists.
pub fn seed_branches(conn: &mut Connection, now: DateTime<Utc>) -> Result<SeedOutcome, AppError> {
    let new = demo_branch();
    if let Some(existing) = storage::find_branch(conn, &new.city, &new.street, &new.house)? {
        info!("Branch already exists: {}", existing);
        return Ok(SeedOutcome::AlreadyExists(existing));
    }

    let schedule = demo_schedule();
    validate_schedule(&schedule)?;
    let branch = Branch::create(new, now);
    storage::insert_branch(conn, &branch, &schedule)?;
    info!("Created branch: {}", branch);
    Ok(SeedOutcome::Created(branch))
}
