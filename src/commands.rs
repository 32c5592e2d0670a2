use std::collections::BTreeMap;
use std::sync::MutexGuard;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};

use crate::data::seed::{self, SeedOutcome};
use crate::data::storage;
use crate::engine::{pricing, schedule};
use crate::errors::{AppError, ErrorResponse};
use crate::models::branch::{Branch, NewBranch};
use crate::models::price::{MetalKind, PriceEntry, PriceSubmission, PriceTable};
use crate::models::schedule::{DayEntry, WeeklySchedule};
use crate::utils::export;
use crate::AppState;

fn db(state: &AppState) -> Result<MutexGuard<'_, Connection>, AppError> {
    state
        .db
        .lock()
        .map_err(|_| AppError::Internal("database lock poisoned".into()))
}

// ── Branch views ──

/// One line of a branch's opening hours, ready to display.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScheduleLine {
    pub day: String,
    pub time: String,
    pub is_closed: bool,
}

/// A branch as shown on the branch list and map.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BranchView {
    pub id: String,
    pub city: String,
    pub address: String,
    pub phone: String,
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub schedule: Vec<ScheduleLine>,
    pub is_open_now: bool,
    pub status_color: &'static str,
    pub status_text: &'static str,
}

impl BranchView {
    pub fn build(branch: &Branch, hours: &WeeklySchedule, is_open_now: bool) -> Self {
        let (lat, lon) = match branch.coordinates() {
            Some((lat, lon)) => (Some(lat), Some(lon)),
            None => (None, None),
        };
        Self {
            id: branch.id.clone(),
            city: branch.city.clone(),
            address: branch.address(),
            phone: branch.phone.clone(),
            description: branch.description.clone(),
            latitude: lat,
            longitude: lon,
            schedule: hours
                .iter()
                .map(|entry| ScheduleLine {
                    day: entry.day_of_week.label().to_string(),
                    time: entry.hours_label(),
                    is_closed: entry.is_closed,
                })
                .collect(),
            is_open_now,
            status_color: if is_open_now { "green" } else { "red" },
            status_text: if is_open_now { "Открыт" } else { "Закрыт" },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BranchListing {
    pub branches: Vec<BranchView>,
    pub total_branches: usize,
    /// Branches open at the moment the listing was built.
    pub open_branches: usize,
    /// Branches with coordinates, as JSON for the map widget.
    pub map_json: String,
}

/// All active branches with their hours and current open/closed state.
pub fn list_branches(state: &AppState, now: DateTime<Utc>) -> Result<BranchListing, AppError> {
    let conn = db(state)?;
    let mut branches = Vec::new();
    for branch in storage::get_active_branches(&conn)? {
        let hours = storage::get_schedule(&conn, &branch.id)?;
        let open = schedule::is_open_at(&hours, now, state.tz);
        branches.push(BranchView::build(&branch, &hours, open));
    }
    drop(conn);

    let map_json = export::branches_map_json(&branches)?;
    let open_branches = branches.iter().filter(|b| b.is_open_now).count();
    info!("Listed {} branches, {} open", branches.len(), open_branches);

    Ok(BranchListing {
        total_branches: branches.len(),
        open_branches,
        branches,
        map_json,
    })
}

/// Number of active branches, shown on the "about" page.
pub fn active_branch_count(state: &AppState) -> Result<usize, AppError> {
    let conn = db(state)?;
    storage::count_active_branches(&conn)
}

/// Add a branch. Every submitted day is validated before anything is written;
/// days the operator left out are stored as closed.
pub fn create_branch(
    state: &AppState,
    new: NewBranch,
    entries: Vec<DayEntry>,
    now: DateTime<Utc>,
) -> Result<Branch, AppError> {
    for entry in &entries {
        schedule::validate_day_entry(entry)?;
    }
    let mut hours: WeeklySchedule = entries.into();
    let added = schedule::fill_missing_days(&mut hours);
    if !added.is_empty() {
        info!("Filled {} missing days as closed", added.len());
    }

    let branch = Branch::create(new, now);
    let mut conn = db(state)?;
    storage::insert_branch(&mut conn, &branch, &hours)?;
    Ok(branch)
}

/// Change one day of a branch's hours.
pub fn update_schedule_entry(
    state: &AppState,
    branch_id: &str,
    entry: DayEntry,
) -> Result<(), AppError> {
    schedule::validate_day_entry(&entry)?;
    let conn = db(state)?;
    storage::get_branch_by_id(&conn, branch_id)?;
    storage::upsert_day_entry(&conn, branch_id, &entry)?;
    info!("Updated {} hours for branch {}", entry.day_of_week, branch_id);
    Ok(())
}

/// Replace a branch's whole week. Validated like [`create_branch`];
/// days left out are stored as closed.
pub fn replace_branch_schedule(
    state: &AppState,
    branch_id: &str,
    entries: Vec<DayEntry>,
) -> Result<WeeklySchedule, AppError> {
    for entry in &entries {
        schedule::validate_day_entry(entry)?;
    }
    let mut hours: WeeklySchedule = entries.into();
    schedule::fill_missing_days(&mut hours);

    let mut conn = db(state)?;
    storage::replace_schedule(&mut conn, branch_id, &hours)?;
    info!("Replaced schedule for branch {}", branch_id);
    Ok(hours)
}

/// Show or hide a branch on the public list.
pub fn set_branch_active(state: &AppState, branch_id: &str, active: bool) -> Result<(), AppError> {
    let conn = db(state)?;
    storage::set_branch_active(&conn, branch_id, active)?;
    info!("Branch {} is now {}", branch_id, if active { "active" } else { "hidden" });
    Ok(())
}

/// Text preview of a branch's hours for the operator.
pub fn schedule_preview(state: &AppState, branch_id: &str) -> Result<String, AppError> {
    let conn = db(state)?;
    storage::get_branch_by_id(&conn, branch_id)?;
    let hours = storage::get_schedule(&conn, branch_id)?;
    Ok(schedule::schedule_preview(&hours))
}

pub fn seed_demo_data(state: &AppState, now: DateTime<Utc>) -> Result<SeedOutcome, AppError> {
    let mut conn = db(state)?;
    seed::seed_branches(&mut conn, now)
}

// ── Prices ──

#[derive(Debug, Clone, Serialize)]
pub struct PriceListView {
    pub gold: Vec<PriceEntry>,
    pub silver: Vec<PriceEntry>,
    pub latest_update: DateTime<Utc>,
}

/// Current price list. With no prices stored yet, `latest_update` is `now`.
pub fn get_price_list(state: &AppState, now: DateTime<Utc>) -> Result<PriceListView, AppError> {
    let table = current_prices(state)?;
    Ok(PriceListView {
        gold: table.for_metal(MetalKind::Gold).into_iter().cloned().collect(),
        silver: table.for_metal(MetalKind::Silver).into_iter().cloned().collect(),
        latest_update: table.last_updated().unwrap_or(now),
    })
}

pub fn current_prices(state: &AppState) -> Result<PriceTable, AppError> {
    let conn = db(state)?;
    storage::get_price_table(&conn)
}

/// Derived gold prices for a typed reference, to prefill the update form.
pub fn preview_gold_prices(
    state: &AppState,
    gold_reference: &str,
) -> Result<BTreeMap<u16, Decimal>, AppError> {
    let reference = pricing::parse_price(gold_reference, "Gold price", state.config.pricing.precision)?;
    pricing::derive_gold_prices(reference, &state.config.pricing)
}

/// What the operator sees after submitting the price form.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PriceFormOutcome {
    Committed { table: PriceTable },
    /// The form comes back exactly as submitted, with the reason.
    Rejected {
        form: PriceSubmission,
        error: ErrorResponse,
    },
}

/// Validate a price submission and commit the new table atomically.
/// A rejected submission leaves the stored table untouched.
pub fn submit_price_form(
    state: &AppState,
    submission: PriceSubmission,
    now: DateTime<Utc>,
) -> PriceFormOutcome {
    match commit_prices(state, &submission, now) {
        Ok(table) => PriceFormOutcome::Committed { table },
        Err(err) => {
            warn!("Price update rejected: {}", err);
            PriceFormOutcome::Rejected {
                error: ErrorResponse::from(&err),
                form: submission,
            }
        }
    }
}

pub fn commit_prices(
    state: &AppState,
    submission: &PriceSubmission,
    now: DateTime<Utc>,
) -> Result<PriceTable, AppError> {
    let table = pricing::build_price_table(submission, &state.config.pricing, now)?;
    let mut conn = db(state)?;
    storage::replace_price_table(&mut conn, &table)?;
    info!(
        "Prices committed: gold {} @{}, silver {}, rounding {}",
        submission.gold_reference.trim(),
        state.config.pricing.reference_purity,
        submission.silver_price.trim(),
        state.config.pricing.rounding
    );
    Ok(table)
}
