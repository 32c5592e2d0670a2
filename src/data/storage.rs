use std::str::FromStr;

use chrono::{DateTime, NaiveTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::errors::AppError;
use crate::models::branch::Branch;
use crate::models::price::{MetalKind, PriceEntry, PriceTable};
use crate::models::schedule::{DayEntry, DayOfWeek, WeeklySchedule};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS branches (
    id TEXT PRIMARY KEY,
    city TEXT NOT NULL,
    street TEXT NOT NULL,
    house TEXT NOT NULL,
    phone TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    latitude REAL,
    longitude REAL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS working_hours (
    branch_id TEXT NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
    day_of_week INTEGER NOT NULL CHECK (day_of_week BETWEEN 0 AND 6),
    is_closed INTEGER NOT NULL DEFAULT 0,
    opening_time TEXT,
    closing_time TEXT,
    UNIQUE (branch_id, day_of_week)
);

CREATE TABLE IF NOT EXISTS metal_prices (
    metal_type TEXT NOT NULL,
    purity INTEGER NOT NULL,
    price_per_gram TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (metal_type, purity)
);

CREATE INDEX IF NOT EXISTS idx_branches_active ON branches(is_active);
";

/// Open (or create) the database at `path` and make sure the schema exists.
/// `":memory:"` gives a throwaway in-memory store.
pub fn initialize_database(path: &str) -> Result<Connection, AppError> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.execute_batch(SCHEMA)?;
    debug!("Schema ready at {}", path);
    Ok(conn)
}

// ── Branches ──

const BRANCH_COLUMNS: &str = "id, city, street, house, phone, description, latitude, longitude, \
     is_active, created_at, updated_at";

fn branch_from_row(row: &Row<'_>) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get(0)?,
        city: row.get(1)?,
        street: row.get(2)?,
        house: row.get(3)?,
        phone: row.get(4)?,
        description: row.get(5)?,
        latitude: row.get(6)?,
        longitude: row.get(7)?,
        is_active: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// Insert a branch together with its schedule in one transaction.
pub fn insert_branch(
    conn: &mut Connection,
    branch: &Branch,
    schedule: &WeeklySchedule,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    tx.execute(
        &format!("INSERT INTO branches ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)", BRANCH_COLUMNS),
        params![
            branch.id,
            branch.city,
            branch.street,
            branch.house,
            branch.phone,
            branch.description,
            branch.latitude,
            branch.longitude,
            branch.is_active,
            branch.created_at,
            branch.updated_at,
        ],
    )?;
    for entry in schedule.iter() {
        upsert_day_entry(&tx, &branch.id, entry)?;
    }
    tx.commit()?;
    info!("Branch stored: {} ({} schedule rows)", branch, schedule.len());
    Ok(())
}

pub fn get_branch_by_id(conn: &Connection, branch_id: &str) -> Result<Branch, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM branches WHERE id = ?1", BRANCH_COLUMNS),
        params![branch_id],
        branch_from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound(format!("Branch {}", branch_id)))
}

/// Look a branch up by its address.
pub fn find_branch(
    conn: &Connection,
    city: &str,
    street: &str,
    house: &str,
) -> Result<Option<Branch>, AppError> {
    let branch = conn
        .query_row(
            &format!(
                "SELECT {} FROM branches WHERE city = ?1 AND street = ?2 AND house = ?3",
                BRANCH_COLUMNS
            ),
            params![city, street, house],
            branch_from_row,
        )
        .optional()?;
    Ok(branch)
}

pub fn get_active_branches(conn: &Connection) -> Result<Vec<Branch>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM branches WHERE is_active = 1 ORDER BY city, street, house",
        BRANCH_COLUMNS
    ))?;
    let branches = stmt
        .query_map([], branch_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(branches)
}

pub fn count_active_branches(conn: &Connection) -> Result<usize, AppError> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM branches WHERE is_active = 1",
        [],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub fn set_branch_active(conn: &Connection, branch_id: &str, active: bool) -> Result<(), AppError> {
    let changed = conn.execute(
        "UPDATE branches SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active, Utc::now(), branch_id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("Branch {}", branch_id)));
    }
    Ok(())
}

// ── Schedules ──

fn day_entry_from_row(row: &Row<'_>) -> rusqlite::Result<DayEntry> {
    let day: u8 = row.get(0)?;
    let day_of_week = DayOfWeek::from_index(day).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            Type::Integer,
            format!("day_of_week out of range: {}", day).into(),
        )
    })?;
    Ok(DayEntry {
        day_of_week,
        is_closed: row.get(1)?,
        opening_time: row.get::<_, Option<NaiveTime>>(2)?,
        closing_time: row.get::<_, Option<NaiveTime>>(3)?,
    })
}

pub fn get_schedule(conn: &Connection, branch_id: &str) -> Result<WeeklySchedule, AppError> {
    let mut stmt = conn.prepare(
        "SELECT day_of_week, is_closed, opening_time, closing_time
         FROM working_hours WHERE branch_id = ?1 ORDER BY day_of_week",
    )?;
    let entries = stmt
        .query_map(params![branch_id], day_entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries.into())
}

/// Insert or overwrite the row for one day of a branch.
pub fn upsert_day_entry(conn: &Connection, branch_id: &str, entry: &DayEntry) -> Result<(), AppError> {
    let (opening, closing) = if entry.is_closed {
        (None, None)
    } else {
        (entry.opening_time, entry.closing_time)
    };
    conn.execute(
        "INSERT INTO working_hours (branch_id, day_of_week, is_closed, opening_time, closing_time)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT (branch_id, day_of_week) DO UPDATE SET
             is_closed = excluded.is_closed,
             opening_time = excluded.opening_time,
             closing_time = excluded.closing_time",
        params![branch_id, entry.day_of_week.index(), entry.is_closed, opening, closing],
    )?;
    Ok(())
}

/// Swap a branch's whole schedule for `schedule`.
pub fn replace_schedule(
    conn: &mut Connection,
    branch_id: &str,
    schedule: &WeeklySchedule,
) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    let touched = tx.execute(
        "UPDATE branches SET updated_at = ?1 WHERE id = ?2",
        params![Utc::now(), branch_id],
    )?;
    if touched == 0 {
        return Err(AppError::NotFound(format!("Branch {}", branch_id)));
    }
    tx.execute("DELETE FROM working_hours WHERE branch_id = ?1", params![branch_id])?;
    for entry in schedule.iter() {
        upsert_day_entry(&tx, branch_id, entry)?;
    }
    tx.commit()?;
    Ok(())
}

// ── Prices ──

fn price_from_row(row: &Row<'_>) -> rusqlite::Result<PriceEntry> {
    let metal: String = row.get(0)?;
    let metal = MetalKind::from_str(&metal).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Text, e.into())
    })?;
    let price: String = row.get(2)?;
    let price_per_gram = Decimal::from_str(&price).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e))
    })?;
    Ok(PriceEntry {
        metal,
        purity: row.get(1)?,
        price_per_gram,
        updated_at: row.get::<_, DateTime<Utc>>(3)?,
    })
}

pub fn get_price_table(conn: &Connection) -> Result<PriceTable, AppError> {
    let mut stmt = conn.prepare(
        "SELECT metal_type, purity, price_per_gram, updated_at
         FROM metal_prices ORDER BY metal_type, purity",
    )?;
    let entries = stmt
        .query_map([], price_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries.into())
}

/// Write every row of `table` in one transaction, replacing existing rows
/// with the same (metal, purity). Readers see either the old or the new
/// table, never a mix.
pub fn replace_price_table(conn: &mut Connection, table: &PriceTable) -> Result<(), AppError> {
    let tx = conn.transaction()?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO metal_prices (metal_type, purity, price_per_gram, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (metal_type, purity) DO UPDATE SET
                 price_per_gram = excluded.price_per_gram,
                 updated_at = excluded.updated_at",
        )?;
        for entry in table.iter() {
            stmt.execute(params![
                entry.metal.as_str(),
                entry.purity,
                entry.price_per_gram.to_string(),
                entry.updated_at,
            ])?;
        }
    }
    tx.commit()?;
    info!("Price table replaced: {} rows", table.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::branch::NewBranch;
    use rust_decimal_macros::dec;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn sample_branch(city: &str, active: bool) -> Branch {
        Branch::create(
            NewBranch {
                city: city.into(),
                street: "Советская".into(),
                house: "1".into(),
                phone: "+7 000".into(),
                description: "test".into(),
                latitude: Some(57.0),
                longitude: Some(40.0),
                is_active: active,
            },
            Utc::now(),
        )
    }

    fn sample_schedule() -> WeeklySchedule {
        vec![
            DayEntry::open(DayOfWeek::Monday, t(9, 0), t(19, 0)),
            DayEntry::closed(DayOfWeek::Sunday),
        ]
        .into()
    }

    #[test]
    fn test_branch_round_trip_with_schedule() {
        let mut conn = initialize_database(":memory:").unwrap();
        let branch = sample_branch("Кострома", true);
        insert_branch(&mut conn, &branch, &sample_schedule()).unwrap();

        let loaded = get_branch_by_id(&conn, &branch.id).unwrap();
        assert_eq!(loaded.city, "Кострома");
        assert_eq!(loaded.latitude, Some(57.0));
        assert_eq!(get_schedule(&conn, &branch.id).unwrap(), sample_schedule());
    }

    #[test]
    fn test_missing_branch_not_found() {
        let conn = initialize_database(":memory:").unwrap();
        assert!(matches!(
            get_branch_by_id(&conn, "nope"),
            Err(AppError::NotFound(_))
        ));
        assert!(find_branch(&conn, "a", "b", "c").unwrap().is_none());
    }

    #[test]
    fn test_active_branches_only() {
        let mut conn = initialize_database(":memory:").unwrap();
        let open = sample_branch("Ярославль", true);
        let hidden = sample_branch("Иваново", false);
        insert_branch(&mut conn, &open, &WeeklySchedule::new()).unwrap();
        insert_branch(&mut conn, &hidden, &WeeklySchedule::new()).unwrap();

        let active = get_active_branches(&conn).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, open.id);
        assert_eq!(count_active_branches(&conn).unwrap(), 1);

        set_branch_active(&conn, &hidden.id, true).unwrap();
        assert_eq!(count_active_branches(&conn).unwrap(), 2);
    }

    #[test]
    fn test_one_row_per_day() {
        let mut conn = initialize_database(":memory:").unwrap();
        let branch = sample_branch("Кострома", true);
        insert_branch(&mut conn, &branch, &sample_schedule()).unwrap();

        upsert_day_entry(&conn, &branch.id, &DayEntry::closed(DayOfWeek::Monday)).unwrap();
        let schedule = get_schedule(&conn, &branch.id).unwrap();
        assert_eq!(schedule.len(), 2);
        assert!(schedule.get(DayOfWeek::Monday).unwrap().is_closed);

        let rows: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM working_hours WHERE branch_id = ?1 AND day_of_week = 0",
                params![branch.id],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn test_replace_schedule() {
        let mut conn = initialize_database(":memory:").unwrap();
        let branch = sample_branch("Кострома", true);
        insert_branch(&mut conn, &branch, &sample_schedule()).unwrap();

        let new: WeeklySchedule = vec![DayEntry::open(DayOfWeek::Saturday, t(10, 0), t(17, 0))].into();
        replace_schedule(&mut conn, &branch.id, &new).unwrap();
        assert_eq!(get_schedule(&conn, &branch.id).unwrap(), new);

        assert!(replace_schedule(&mut conn, "ghost", &new).is_err());
    }

    #[test]
    fn test_price_table_replace() {
        let mut conn = initialize_database(":memory:").unwrap();
        assert!(get_price_table(&conn).unwrap().is_empty());

        let now = Utc::now();
        let table: PriceTable = vec![
            PriceEntry { metal: MetalKind::Gold, purity: 585, price_per_gram: dec!(5000), updated_at: now },
            PriceEntry { metal: MetalKind::Silver, purity: 925, price_per_gram: dec!(80.50), updated_at: now },
        ]
        .into();
        replace_price_table(&mut conn, &table).unwrap();

        let update: PriceTable = vec![PriceEntry {
            metal: MetalKind::Gold,
            purity: 585,
            price_per_gram: dec!(5100),
            updated_at: now,
        }]
        .into();
        replace_price_table(&mut conn, &update).unwrap();

        let loaded = get_price_table(&conn).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.price(MetalKind::Gold, 585), Some(dec!(5100)));
        assert_eq!(loaded.price(MetalKind::Silver, 925), Some(dec!(80.50)));
    }
}
