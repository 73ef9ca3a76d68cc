//! Fee manager: wires per-fund fee state, the gav oracle and the shares
//! ledger into a single `invoke_hook` call.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::FeeManagerConfig;
use crate::error::FeeError;
use crate::fees::{Fee, FeeSettlement, ManagementFee, PerformanceFee};
use crate::ledger::{GavOracle, Mint, SharesLedger};
use crate::math;
use crate::types::{FeeEvent, FeeHook, FeeState, FundSnapshot, ManagementFeeState};

/// Fees a fund adopts at configuration time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSettings {
    pub performance: Option<FeeState>,
    pub management: Option<ManagementFeeState>,
}

/// A registered fund and the caller allowed to drive its hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundFees {
    pub comptroller: String,
    pub settings: FundSettings,
}

pub struct FeeManager {
    id: String,
    performance_fee: PerformanceFee,
    management_fee: ManagementFee,
    funds: HashMap<String, FundFees>,
}

impl FeeManager {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            performance_fee: PerformanceFee::new(id.clone()),
            management_fee: ManagementFee::new(id.clone()),
            id,
            funds: HashMap::new(),
        }
    }

    /// Build a manager and register every configured fund.
    pub fn from_config(config: &FeeManagerConfig) -> Result<Self, FeeError> {
        config.validate()?;
        let mut manager = Self::new(config.fee_manager_id.clone());
        for fund in &config.funds {
            manager.register_fund(&fund.fund_id, &fund.comptroller, fund.settings()?)?;
        }
        Ok(manager)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Adopt fees for a new fund. A fund is configured once; carrying state
    /// over from a migrated fund is not supported.
    pub fn register_fund(
        &mut self,
        fund_id: &str,
        comptroller: &str,
        settings: FundSettings,
    ) -> Result<(), FeeError> {
        if fund_id.is_empty() || comptroller.is_empty() {
            return Err(FeeError::InvalidSetting(
                "fund id and comptroller are required".into(),
            ));
        }
        if self.funds.contains_key(fund_id) {
            return Err(FeeError::AlreadyConfigured(fund_id.to_string()));
        }

        tracing::info!(
            fund_id,
            comptroller,
            performance = settings.performance.is_some(),
            management = settings.management.is_some(),
            "fund fees registered"
        );
        self.funds.insert(
            fund_id.to_string(),
            FundFees {
                comptroller: comptroller.to_string(),
                settings,
            },
        );
        Ok(())
    }

    pub fn fund(&self, fund_id: &str) -> Option<&FundFees> {
        self.funds.get(fund_id)
    }

    pub fn performance_state(&self, fund_id: &str) -> Option<&FeeState> {
        self.funds
            .get(fund_id)
            .and_then(|fund| fund.settings.performance.as_ref())
    }

    pub fn management_state(&self, fund_id: &str) -> Option<&ManagementFeeState> {
        self.funds
            .get(fund_id)
            .and_then(|fund| fund.settings.management.as_ref())
    }

    /// Run every fee eligible on `hook` for `fund_id`.
    ///
    /// Flow:
    /// 1. Check `caller` is the fund's comptroller
    /// 2. Read gav and total supply from the collaborators
    /// 3. Settle the management fee, then the performance fee against the
    ///    supply diluted by the management mint
    /// 4. Run updates against the final supply
    /// 5. Mint all fee shares, then commit the new fee states
    ///
    /// Fee states are staged on a copy, so any error leaves both the manager
    /// and the ledger untouched.
    pub fn invoke_hook(
        &mut self,
        caller: &str,
        fund_id: &str,
        hook: FeeHook,
        oracle: &impl GavOracle,
        ledger: &mut impl SharesLedger,
        now: DateTime<Utc>,
    ) -> Result<Vec<FeeEvent>, FeeError> {
        let fund = self
            .funds
            .get(fund_id)
            .ok_or_else(|| FeeError::UnknownFund(fund_id.to_string()))?;
        if caller != fund.comptroller {
            tracing::warn!(fund_id, caller, ?hook, "rejected fee hook from non comptroller");
            return Err(FeeError::UnauthorizedCaller {
                caller: caller.to_string(),
                reason: format!("Only the comptroller of {fund_id} can invoke fee hooks"),
            });
        }

        let mut staged = fund.settings.clone();
        if !self.runs_on(&staged, hook) {
            tracing::debug!(fund_id, ?hook, "no fee runs on hook");
            return Ok(Vec::new());
        }

        let gav = oracle.calc_gav(fund_id)?;
        let mut supply = ledger.total_supply(fund_id)?;
        let mut mints = Vec::new();
        let mut events = Vec::new();

        if let Some(state) = staged.management.as_mut() {
            if self.management_fee.eligibility(hook).settles {
                let settlement = self.management_fee.settle(
                    &self.id,
                    fund_id,
                    state,
                    FundSnapshot::new(gav, supply),
                    now,
                )?;
                supply = collect(settlement, supply, &mut mints, &mut events)?;
            }
        }
        if let Some(state) = staged.performance.as_mut() {
            if self.performance_fee.eligibility(hook).settles {
                let settlement = self.performance_fee.settle(
                    &self.id,
                    fund_id,
                    state,
                    FundSnapshot::new(gav, supply),
                    now,
                )?;
                supply = collect(settlement, supply, &mut mints, &mut events)?;
            }
        }

        let snapshot = FundSnapshot::new(gav, supply);
        if let Some(state) = staged.management.as_mut() {
            if self.management_fee.eligibility(hook).updates {
                events.extend(self.management_fee.update(&self.id, fund_id, state, snapshot)?);
            }
        }
        if let Some(state) = staged.performance.as_mut() {
            if self.performance_fee.eligibility(hook).updates {
                events.extend(self.performance_fee.update(&self.id, fund_id, state, snapshot)?);
            }
        }

        if !mints.is_empty() {
            ledger.mint_all(fund_id, &mints)?;
        }
        if let Some(fund) = self.funds.get_mut(fund_id) {
            fund.settings = staged;
        }

        tracing::info!(
            fund_id,
            ?hook,
            %gav,
            mints = mints.len(),
            events = events.len(),
            "fee hook complete"
        );
        Ok(events)
    }

    fn runs_on(&self, settings: &FundSettings, hook: FeeHook) -> bool {
        let perf = settings.performance.is_some() && {
            let on = self.performance_fee.eligibility(hook);
            on.settles || on.updates
        };
        let mgmt = settings.management.is_some() && {
            let on = self.management_fee.eligibility(hook);
            on.settles || on.updates
        };
        perf || mgmt
    }
}

/// Queue a settlement's mint and events, returning the diluted supply
fn collect(
    settlement: Option<FeeSettlement>,
    supply: Decimal,
    mints: &mut Vec<Mint>,
    events: &mut Vec<FeeEvent>,
) -> Result<Decimal, FeeError> {
    let Some(settlement) = settlement else {
        return Ok(supply);
    };
    let diluted = math::add(supply, settlement.shares_due)?;
    mints.push(Mint {
        recipient: settlement.recipient,
        shares: settlement.shares_due,
    });
    events.extend(settlement.events);
    Ok(diluted)
}
