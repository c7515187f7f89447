//! Token amount scaling between human decimal strings and integer base
//! units. Everything goes through `U256` and the ethers unit parsers so
//! that 18-decimal tokens never lose precision to floating point.

use anyhow::{Context, Result};
use ethers::types::U256;
use ethers::utils::{format_units, parse_units, ParseUnits};

/// Converts a human decimal-string amount into integer base units
/// (`value * 10^decimals`).
pub fn to_base_units(value: &str, decimals: u32) -> Result<U256> {
    let parsed = parse_units(value, decimals)
        .with_context(|| format!("can't scale '{}' by 10^{}", value, decimals))?;
    match parsed {
        ParseUnits::U256(units) => Ok(units),
        ParseUnits::I256(_) => anyhow::bail!("negative amount '{}' has no base units", value),
    }
}

/// Converts integer base units back into a human decimal string.
pub fn from_base_units(value: U256, decimals: u32) -> Result<String> {
    let formatted = format_units(value, decimals)
        .with_context(|| format!("can't format {} with {} decimals", value, decimals))?;
    Ok(formatted)
}
