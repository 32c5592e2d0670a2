use std::path::Path;

use crate::commands::BranchView;
use crate::errors::AppError;
use crate::models::price::PriceTable;

/// Write the price table to a CSV file, gold first, each metal by purity.
/// Prices are padded to `precision` digits.
pub fn write_prices_csv(table: &PriceTable, path: &Path, precision: u32) -> Result<(), AppError> {
    let digits = precision as usize;
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| AppError::FileWrite(format!("Cannot create CSV: {}", e)))?;

    wtr.write_record(["Metal", "Purity", "Price per gram", "Updated"])?;

    for entry in table.iter() {
        wtr.write_record(&[
            entry.metal.label().to_string(),
            entry.purity.to_string(),
            format!("{:.*}", digits, entry.price_per_gram),
            entry.updated_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        ])?;
    }

    wtr.flush().map_err(|e| AppError::FileWrite(e.to_string()))?;
    Ok(())
}

/// JSON array of the branches that can be placed on the map.
pub fn branches_map_json(branches: &[BranchView]) -> Result<String, AppError> {
    let with_coords: Vec<&BranchView> = branches
        .iter()
        .filter(|b| b.latitude.is_some() && b.longitude.is_some())
        .collect();
    Ok(serde_json::to_string(&with_coords)?)
}
