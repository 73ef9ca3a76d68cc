use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Points in a fund's lifecycle at which fees may run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeeHook {
    Continuous,
    PreBuyShares,
    PostBuyShares,
    PreRedeemShares,
    PostRedeemShares,
}

impl FeeHook {
    pub const ALL: [FeeHook; 5] = [
        FeeHook::Continuous,
        FeeHook::PreBuyShares,
        FeeHook::PostBuyShares,
        FeeHook::PreRedeemShares,
        FeeHook::PostRedeemShares,
    ];
}

/// What a fee does on a given hook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HookEligibility {
    pub settles: bool,
    pub updates: bool,
}

/// Identifies a fee implementation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FeeKind {
    Performance,
    Management,
}

/// Per-fund performance fee state, persisted by the embedding application.
///
/// Created by [`crate::fees::performance::add_fund_settings`]. The rate and
/// recipient never change afterwards and the high-water-mark only moves up
/// through [`FeeState::apply`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeState {
    high_water_mark: Decimal,
    rate: Decimal,
    recipient: String,
    #[serde(default)]
    last_share_price: Option<Decimal>,
}

impl FeeState {
    pub(crate) fn new(high_water_mark: Decimal, rate: Decimal, recipient: String) -> Self {
        Self {
            high_water_mark,
            rate,
            recipient,
            last_share_price: None,
        }
    }

    /// Denomination-asset value per share unit at which fees were last paid
    pub fn high_water_mark(&self) -> Decimal {
        self.high_water_mark
    }

    /// Fraction in `[0, 1)`
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    /// Last gav-per-share observed on an updating hook
    pub fn last_share_price(&self) -> Option<Decimal> {
        self.last_share_price
    }

    /// Persist the result of a settlement. The mark never moves down.
    pub fn apply(&mut self, settlement: &PerformanceSettlement) {
        if settlement.next_high_water_mark > self.high_water_mark {
            self.high_water_mark = settlement.next_high_water_mark;
        }
    }

    pub(crate) fn record_share_price(&mut self, share_price: Decimal) -> Option<Decimal> {
        self.last_share_price.replace(share_price)
    }
}

/// Per-fund management fee state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagementFeeState {
    annual_rate: Decimal,
    recipient: String,
    #[serde(default)]
    last_settled: Option<DateTime<Utc>>,
}

impl ManagementFeeState {
    pub(crate) fn new(annual_rate: Decimal, recipient: String) -> Self {
        Self {
            annual_rate,
            recipient,
            last_settled: None,
        }
    }

    /// Annual fraction of gav
    pub fn annual_rate(&self) -> Decimal {
        self.annual_rate
    }

    pub fn recipient(&self) -> &str {
        &self.recipient
    }

    pub fn last_settled(&self) -> Option<DateTime<Utc>> {
        self.last_settled
    }

    pub(crate) fn stamp(&mut self, at: DateTime<Utc>) {
        self.last_settled = Some(at);
    }
}

/// Fund values read from the GAV oracle and the shares ledger for one hook
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FundSnapshot {
    pub gav: Decimal,
    pub total_shares_supply: Decimal,
}

impl FundSnapshot {
    pub fn new(gav: Decimal, total_shares_supply: Decimal) -> Self {
        Self {
            gav,
            total_shares_supply,
        }
    }
}

/// Emitted when a performance fee pays out
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settled {
    /// Gav per share before dilution
    pub share_price: Decimal,
    pub shares_due: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HighWaterMarkUpdated {
    pub next_high_water_mark: Decimal,
}

/// Outcome of one performance-fee settlement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PerformanceSettlement {
    pub shares_due: Decimal,
    pub next_high_water_mark: Decimal,
    /// Present only when a fee was owed
    pub settled: Option<Settled>,
    pub high_water_mark_updated: Option<HighWaterMarkUpdated>,
}

impl PerformanceSettlement {
    pub(crate) fn no_fee(high_water_mark: Decimal) -> Self {
        Self {
            shares_due: Decimal::ZERO,
            next_high_water_mark: high_water_mark,
            settled: None,
            high_water_mark_updated: None,
        }
    }

    pub fn is_payout(&self) -> bool {
        self.shares_due > Decimal::ZERO
    }
}

/// Records handed back to the caller of a hook, tagged by fund
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FeeEvent {
    Settled {
        fund_id: String,
        fee: FeeKind,
        recipient: String,
        share_price: Decimal,
        shares_due: Decimal,
    },
    HighWaterMarkUpdated {
        fund_id: String,
        next_high_water_mark: Decimal,
    },
    SharePriceUpdated {
        fund_id: String,
        previous: Option<Decimal>,
        next: Decimal,
    },
}

impl FeeEvent {
    pub fn fund_id(&self) -> &str {
        match self {
            FeeEvent::Settled { fund_id, .. }
            | FeeEvent::HighWaterMarkUpdated { fund_id, .. }
            | FeeEvent::SharePriceUpdated { fund_id, .. } => fund_id,
        }
    }
}
