use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::errors::AppError;
use crate::models::config::{PriceRounding, PricingConfig};
use crate::models::price::{
    MetalKind, PriceEntry, PriceSubmission, PriceTable, GOLD_PURITIES, SILVER_PURITY,
};

/// Scale a reference price linearly by purity.
///
/// Each target gets `round(reference_price * purity / reference_purity, precision)`.
/// The reference purity itself gets `reference_price` back untouched.
pub fn derive_prices(
    reference_price: Decimal,
    reference_purity: u16,
    target_purities: &[u16],
    precision: u32,
    rounding: PriceRounding,
) -> Result<BTreeMap<u16, Decimal>, AppError> {
    if reference_price <= Decimal::ZERO {
        return Err(AppError::InvalidPrice(format!(
            "Reference price must be positive, got {}",
            reference_price
        )));
    }
    check_scale(reference_price, precision, "Reference price")?;
    if reference_purity == 0 {
        return Err(AppError::InvalidPrice("Reference purity cannot be zero".into()));
    }

    let divisor = Decimal::from(reference_purity);
    let mut prices = BTreeMap::new();
    for &purity in target_purities {
        if purity == reference_purity {
            prices.insert(purity, reference_price);
            continue;
        }
        let scaled = reference_price
            .checked_mul(Decimal::from(purity))
            .and_then(|v| v.checked_div(divisor))
            .ok_or_else(|| {
                AppError::InvalidPrice(format!("Reference price {} is too large", reference_price))
            })?;
        let rounded = scaled.round_dp_with_strategy(precision, rounding.strategy());
        if rounded <= Decimal::ZERO {
            return Err(AppError::InvalidPrice(format!(
                "Reference price {} is too small: purity {} rounds to zero",
                reference_price, purity
            )));
        }
        prices.insert(purity, rounded);
    }
    Ok(prices)
}

/// Prices carry at most `precision` fractional digits; trailing zeros don't count.
fn check_scale(value: Decimal, precision: u32, field: &str) -> Result<(), AppError> {
    if value.normalize().scale() > precision {
        return Err(AppError::InvalidPrice(format!(
            "{} {} has more than {} decimal places",
            field, value, precision
        )));
    }
    Ok(())
}

/// Gold prices for every tracked purity, using the configured reference.
pub fn derive_gold_prices(
    reference_price: Decimal,
    config: &PricingConfig,
) -> Result<BTreeMap<u16, Decimal>, AppError> {
    derive_prices(
        reference_price,
        config.reference_purity,
        &GOLD_PURITIES,
        config.precision,
        config.rounding,
    )
}

/// Parse an operator-typed price. Accepts a comma as decimal separator.
/// More than `precision` fractional digits is rejected.
pub fn parse_price(raw: &str, field: &str, precision: u32) -> Result<Decimal, AppError> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if cleaned.is_empty() {
        return Err(AppError::InvalidPrice(format!("{} is required", field)));
    }
    let value = Decimal::from_str(&cleaned)
        .map_err(|_| AppError::InvalidPrice(format!("{}: '{}' is not a number", field, raw.trim())))?;
    if value <= Decimal::ZERO {
        return Err(AppError::InvalidPrice(format!(
            "{} must be greater than zero, got {}",
            field, value
        )));
    }
    check_scale(value, precision, field)?;
    Ok(value)
}

/// Turn an operator submission into the complete table to commit.
///
/// Every value is parsed and checked before anything is built, so a bad
/// field yields an error and no table at all.
pub fn build_price_table(
    submission: &PriceSubmission,
    config: &PricingConfig,
    now: DateTime<Utc>,
) -> Result<PriceTable, AppError> {
    let gold_reference = parse_price(&submission.gold_reference, "Gold price", config.precision)?;
    let silver_price = parse_price(&submission.silver_price, "Silver price", config.precision)?;

    let mut gold = derive_gold_prices(gold_reference, config)?;
    for (&purity, raw) in &submission.overrides {
        if raw.trim().is_empty() {
            continue;
        }
        if !MetalKind::Gold.is_known_purity(purity) {
            return Err(AppError::InvalidPrice(format!(
                "Purity {} is not tracked for gold",
                purity
            )));
        }
        let value = parse_price(raw, &format!("Gold {}", purity), config.precision)?;
        gold.insert(purity, value);
    }

    let mut table: PriceTable = gold
        .into_iter()
        .map(|(purity, price)| PriceEntry {
            metal: MetalKind::Gold,
            purity,
            price_per_gram: price,
            updated_at: now,
        })
        .collect();
    table.insert(PriceEntry {
        metal: MetalKind::Silver,
        purity: SILVER_PURITY,
        price_per_gram: silver_price,
        updated_at: now,
    });
    Ok(table)
}
