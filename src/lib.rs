pub mod commands;
pub mod data;
pub mod engine;
pub mod errors;
pub mod models;
pub mod utils;

use std::fs;
use std::sync::Mutex;

use chrono_tz::Tz;
use rusqlite::Connection;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::errors::AppError;
use crate::models::config::SiteConfig;

/// Shared application state, passed to every command.
pub struct AppState {
    pub db: Mutex<Connection>,
    pub config: SiteConfig,
    /// Zone branch hours are kept in.
    pub tz: Tz,
}

impl AppState {
    /// Validate the config and open the database it points to.
    pub fn open(config: SiteConfig) -> Result<Self, AppError> {
        config.validate()?;
        let tz = config.tz()?;

        let db_path = config.database_path.to_string_lossy().to_string();
        if db_path != ":memory:" {
            if let Some(parent) = config.database_path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
        }
        let conn = data::storage::initialize_database(&db_path)?;
        info!("Database ready at {}", db_path);

        Ok(Self {
            db: Mutex::new(conn),
            config,
            tz,
        })
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}
