use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A pawnshop branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub city: String,
    pub street: String,
    pub house: String,
    pub phone: String,
    #[serde(default)]
    pub description: String,
    /// Coordinates used to place the branch on the map.
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Branch {
    /// Build a new branch record with a fresh id.
    pub fn create(new: NewBranch, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            city: new.city,
            street: new.street,
            house: new.house,
            phone: new.phone,
            description: new.description,
            latitude: new.latitude,
            longitude: new.longitude,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        }
    }

    /// Street and house, without the city.
    pub fn address(&self) -> String {
        format!("{}, {}", self.street, self.house)
    }

    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) if lat != 0.0 && lon != 0.0 => Some((lat, lon)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Branch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}, {}, {}", self.city, self.street, self.house)
    }
}

/// Fields an operator fills in when adding a branch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBranch {
    pub city: String,
    pub street: String,
    pub house: String,
    pub phone: String,
    #[serde(default)]
    pub description: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}
