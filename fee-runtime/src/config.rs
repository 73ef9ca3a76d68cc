//! Fee manager configuration, loaded from JSON.
//!
//! ```json
//! {
//!   "fee_manager_id": "fee-manager",
//!   "funds": [
//!     {
//!       "fund_id": "alpha",
//!       "comptroller": "alpha-comptroller",
//!       "performance": { "rate_bps": 1000, "recipient": "manager" },
//!       "management": { "annual_rate_bps": 200, "recipient": "manager" }
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeeError;
use crate::fees::{management, performance};
use crate::manager::FundSettings;
use crate::math;

/// Environment variable holding the path of the JSON config file
pub const FEE_MANAGER_CONFIG_ENV: &str = "FEE_MANAGER_CONFIG";

const MAX_BPS: u32 = 10_000;

fn default_initial_share_price() -> Decimal {
    performance::DEFAULT_INITIAL_SHARE_PRICE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeManagerConfig {
    pub fee_manager_id: String,
    #[serde(default)]
    pub funds: Vec<FundConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundConfig {
    pub fund_id: String,
    /// Only this caller may invoke the fund's fee hooks
    pub comptroller: String,
    #[serde(default)]
    pub performance: Option<PerformanceFeeConfig>,
    #[serde(default)]
    pub management: Option<ManagementFeeConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceFeeConfig {
    pub rate_bps: u32,
    pub recipient: String,
    #[serde(default = "default_initial_share_price")]
    pub initial_share_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagementFeeConfig {
    pub annual_rate_bps: u32,
    pub recipient: String,
}

impl FeeManagerConfig {
    pub fn from_json(json: &str) -> Result<Self, FeeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FeeError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading fee manager config");
        Self::from_json(&json)
    }

    /// Load from the file named by `FEE_MANAGER_CONFIG`
    pub fn from_env() -> Result<Self, FeeError> {
        let path = std::env::var(FEE_MANAGER_CONFIG_ENV).map_err(|_| {
            FeeError::ConfigError(format!("{FEE_MANAGER_CONFIG_ENV} is not set"))
        })?;
        Self::from_file(path)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), FeeError> {
        if self.fee_manager_id.is_empty() {
            return Err(FeeError::ConfigError(
                "fee_manager_id cannot be empty".into(),
            ));
        }

        let mut seen = HashSet::new();
        for fund in &self.funds {
            if !seen.insert(fund.fund_id.as_str()) {
                return Err(FeeError::ConfigError(format!(
                    "duplicate fund id {}",
                    fund.fund_id
                )));
            }
            fund.validate()?;
        }
        Ok(())
    }
}

impl FundConfig {
    pub fn validate(&self) -> Result<(), FeeError> {
        if self.fund_id.is_empty() {
            return Err(FeeError::ConfigError("fund_id cannot be empty".into()));
        }
        if self.comptroller.is_empty() {
            return Err(FeeError::ConfigError(format!(
                "fund {} has no comptroller",
                self.fund_id
            )));
        }
        if let Some(perf) = &self.performance {
            if perf.rate_bps >= MAX_BPS {
                return Err(FeeError::ConfigError(format!(
                    "fund {}: performance rate_bps {} must be below {MAX_BPS}",
                    self.fund_id, perf.rate_bps
                )));
            }
        }
        if let Some(mgmt) = &self.management {
            if mgmt.annual_rate_bps >= MAX_BPS {
                return Err(FeeError::ConfigError(format!(
                    "fund {}: management annual_rate_bps {} must be below {MAX_BPS}",
                    self.fund_id, mgmt.annual_rate_bps
                )));
            }
        }
        Ok(())
    }

    /// Build the fee states this fund starts with
    pub fn settings(&self) -> Result<FundSettings, FeeError> {
        let performance = self
            .performance
            .as_ref()
            .map(|perf| {
                performance::add_fund_settings_at(
                    math::bps_to_fraction(perf.rate_bps),
                    perf.recipient.clone(),
                    perf.initial_share_price,
                )
            })
            .transpose()?;
        let management = self
            .management
            .as_ref()
            .map(|mgmt| {
                management::add_fund_settings(
                    math::bps_to_fraction(mgmt.annual_rate_bps),
                    mgmt.recipient.clone(),
                )
            })
            .transpose()?;
        Ok(FundSettings {
            performance,
            management,
        })
    }
}
