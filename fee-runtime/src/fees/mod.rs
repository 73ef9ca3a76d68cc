pub mod management;
pub mod performance;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::FeeError;
use crate::types::{FeeEvent, FeeHook, FeeKind, FundSnapshot, HookEligibility};

pub use management::ManagementFee;
pub use performance::PerformanceFee;

/// Common trait for fees driven by a fee manager
pub trait Fee {
    /// Per-fund state the embedding application persists
    type State: Clone;

    fn kind(&self) -> FeeKind;

    /// Identity of the only caller allowed to settle or update
    fn fee_manager(&self) -> &str;

    fn eligibility(&self, hook: FeeHook) -> HookEligibility;

    /// Compute what is owed and advance `state`. Returns `None` when nothing
    /// is due. Minting the shares is left to the caller.
    fn settle(
        &self,
        caller: &str,
        fund_id: &str,
        state: &mut Self::State,
        snapshot: FundSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<FeeSettlement>, FeeError>;

    /// Move the fee's reference point without paying out
    fn update(
        &self,
        caller: &str,
        fund_id: &str,
        state: &mut Self::State,
        snapshot: FundSnapshot,
    ) -> Result<Vec<FeeEvent>, FeeError>;

    fn ensure_fee_manager(&self, caller: &str) -> Result<(), FeeError> {
        if caller != self.fee_manager() {
            tracing::warn!(caller, fee = ?self.kind(), "rejected call from non fee manager");
            return Err(FeeError::only_fee_manager(caller));
        }
        Ok(())
    }
}

/// Shares owed to a fee recipient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeeSettlement {
    pub kind: FeeKind,
    pub recipient: String,
    pub shares_due: Decimal,
    pub events: Vec<FeeEvent>,
}

/// Reject negative oracle or ledger values before any arithmetic.
pub(crate) fn check_snapshot(snapshot: &FundSnapshot) -> Result<(), FeeError> {
    if snapshot.gav < Decimal::ZERO {
        return Err(FeeError::InvariantViolation(format!(
            "negative gav {}",
            snapshot.gav
        )));
    }
    if snapshot.total_shares_supply < Decimal::ZERO {
        return Err(FeeError::InvariantViolation(format!(
            "negative shares supply {}",
            snapshot.total_shares_supply
        )));
    }
    Ok(())
}
