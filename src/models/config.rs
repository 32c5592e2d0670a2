use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use rust_decimal::RoundingStrategy;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::price::{MetalKind, DEFAULT_REFERENCE_PURITY};

/// Environment variable naming the config file when no path is given.
pub const CONFIG_ENV_VAR: &str = "LOMBARD_CONFIG";

/// Site-wide settings, read from a TOML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// SQLite file holding branches, schedules and prices.
    pub database_path: PathBuf,
    /// IANA zone the branches keep their hours in.
    pub timezone: String,
    pub pricing: PricingConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/lombard.db"),
            timezone: "Europe/Moscow".to_string(),
            pricing: PricingConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Load from `path`, or from `$LOMBARD_CONFIG`, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let path = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };
        let config = match path {
            Some(p) => {
                let contents = std::fs::read_to_string(&p).map_err(|e| {
                    AppError::InvalidConfig(format!("Cannot read {}: {}", p.display(), e))
                })?;
                Self::from_toml(&contents)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(contents: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.tz()?;
        self.pricing.validate()
    }

    pub fn tz(&self) -> Result<Tz, AppError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| AppError::InvalidConfig(format!("Unknown timezone {}: {}", self.timezone, e)))
    }
}

/// How derived gold prices are computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub reference_purity: u16,
    /// Fractional digits kept on derived prices.
    pub precision: u32,
    pub rounding: PriceRounding,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            reference_purity: DEFAULT_REFERENCE_PURITY,
            precision: 2,
            rounding: PriceRounding::HalfEven,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if !MetalKind::Gold.is_known_purity(self.reference_purity) {
            return Err(AppError::InvalidConfig(format!(
                "Reference purity {} is not a tracked gold purity",
                self.reference_purity
            )));
        }
        if self.precision > 8 {
            return Err(AppError::InvalidConfig(format!(
                "Price precision {} is out of range (0-8)",
                self.precision
            )));
        }
        Ok(())
    }
}

/// Tie-break used when a derived price falls exactly between two cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRounding {
    /// 0.125 -> 0.12, 0.135 -> 0.14
    HalfEven,
    /// 0.125 -> 0.13
    HalfUp,
}

impl PriceRounding {
    pub fn strategy(&self) -> RoundingStrategy {
        match self {
            PriceRounding::HalfEven => RoundingStrategy::MidpointNearestEven,
            PriceRounding::HalfUp => RoundingStrategy::MidpointAwayFromZero,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PriceRounding::HalfEven => "half_even",
            PriceRounding::HalfUp => "half_up",
        }
    }
}

impl std::fmt::Display for PriceRounding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
