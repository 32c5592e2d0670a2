use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Gold purities tracked on the price list.
pub const GOLD_PURITIES: [u16; 5] = [375, 500, 585, 750, 850];
/// Silver has a single tracked purity.
pub const SILVER_PURITIES: [u16; 1] = [925];
/// Purity the operator quotes the gold reference price for.
pub const DEFAULT_REFERENCE_PURITY: u16 = 585;
pub const SILVER_PURITY: u16 = 925;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetalKind {
    Gold,
    Silver,
}

impl MetalKind {
    pub fn purities(&self) -> &'static [u16] {
        match self {
            MetalKind::Gold => &GOLD_PURITIES,
            MetalKind::Silver => &SILVER_PURITIES,
        }
    }

    pub fn is_known_purity(&self, purity: u16) -> bool {
        self.purities().contains(&purity)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MetalKind::Gold => "gold",
            MetalKind::Silver => "silver",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetalKind::Gold => "Золото",
            MetalKind::Silver => "Серебро",
        }
    }
}

impl std::fmt::Display for MetalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MetalKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "gold" => Ok(MetalKind::Gold),
            "silver" => Ok(MetalKind::Silver),
            _ => Err(format!("Unknown metal: {}", s)),
        }
    }
}

/// Price per gram for one metal at one purity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceEntry {
    pub metal: MetalKind,
    pub purity: u16,
    pub price_per_gram: Decimal,
    pub updated_at: DateTime<Utc>,
}

/// The full price list. Keys are unique per (metal, purity); inserting
/// an existing key replaces the old row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<PriceEntry>", into = "Vec<PriceEntry>")]
pub struct PriceTable {
    entries: BTreeMap<(MetalKind, u16), PriceEntry>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: PriceEntry) -> Option<PriceEntry> {
        self.entries.insert((entry.metal, entry.purity), entry)
    }

    pub fn get(&self, metal: MetalKind, purity: u16) -> Option<&PriceEntry> {
        self.entries.get(&(metal, purity))
    }

    pub fn price(&self, metal: MetalKind, purity: u16) -> Option<Decimal> {
        self.get(metal, purity).map(|e| e.price_per_gram)
    }

    /// Rows for one metal, ordered by purity.
    pub fn for_metal(&self, metal: MetalKind) -> Vec<&PriceEntry> {
        self.entries
            .range((metal, u16::MIN)..=(metal, u16::MAX))
            .map(|(_, entry)| entry)
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PriceEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.entries.values().map(|e| e.updated_at).max()
    }
}

impl FromIterator<PriceEntry> for PriceTable {
    fn from_iter<I: IntoIterator<Item = PriceEntry>>(iter: I) -> Self {
        let mut table = PriceTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

impl From<Vec<PriceEntry>> for PriceTable {
    fn from(entries: Vec<PriceEntry>) -> Self {
        entries.into_iter().collect()
    }
}

impl From<PriceTable> for Vec<PriceEntry> {
    fn from(table: PriceTable) -> Self {
        table.entries.into_values().collect()
    }
}

/// Raw values typed by the operator on the price update form.
/// Kept as strings so a rejected form can be shown back exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSubmission {
    /// Gold price per gram at the reference purity.
    pub gold_reference: String,
    /// Silver price per gram (925).
    pub silver_price: String,
    /// Gold purity -> price typed over the derived default.
    #[serde(default)]
    pub overrides: BTreeMap<u16, String>,
}
