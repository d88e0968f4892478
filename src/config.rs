//! User configuration loaded from `<config_home>/lotbook/config.toml`.
//!
//! Every section is optional; missing keys fall back to defaults. Tax rates
//! are exact decimals and should be written as strings (`"0.37"`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::pricing::PriceSettings;
use crate::reports::performance::PerformanceSettings;
use crate::tax::analysis::TaxRates;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tax: TaxConfig,
    pub pricing: PricingConfig,
    pub performance: PerformanceConfig,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxConfig {
    pub short_term_rate: Decimal,
    pub long_term_rate: Decimal,
}

impl Default for TaxConfig {
    fn default() -> Self {
        Self {
            short_term_rate: Decimal::new(37, 2),
            long_term_rate: Decimal::new(20, 2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub staleness_days: i64,
    pub lookback_days: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        let settings = PriceSettings::default();
        Self {
            staleness_days: settings.staleness_days,
            lookback_days: settings.lookback_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PerformanceConfig {
    pub risk_free_rate: f64,
    pub trading_days_per_year: f64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        let settings = PerformanceSettings::default();
        Self {
            risk_free_rate: settings.risk_free_rate,
            trading_days_per_year: settings.trading_days_per_year,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

impl Config {
    /// Default location of the config file, if a config directory can be resolved
    pub fn default_path() -> Option<PathBuf> {
        dir_spec::config_home().map(|dir| dir.join("lotbook").join("config.toml"))
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config at {:?}", path))?;
        let config: Config =
            toml::from_str(&raw).with_context(|| format!("Invalid config at {:?}", path))?;
        debug!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn tax_rates(&self) -> TaxRates {
        TaxRates {
            short_term: self.tax.short_term_rate,
            long_term: self.tax.long_term_rate,
        }
    }

    pub fn price_settings(&self) -> PriceSettings {
        PriceSettings {
            staleness_days: self.pricing.staleness_days,
            lookback_days: self.pricing.lookback_days,
        }
    }

    pub fn performance_settings(&self) -> PerformanceSettings {
        PerformanceSettings {
            risk_free_rate: self.performance.risk_free_rate,
            trading_days_per_year: self.performance.trading_days_per_year,
        }
    }
}
