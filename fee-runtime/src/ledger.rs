//! Collaborators the fee manager reads from and writes to.
//!
//! Valuation and share bookkeeping belong to the embedding application; the
//! fee manager only needs a fund's gav, its total supply, and a way to mint
//! fee shares.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::FeeError;

/// Source of a fund's gross asset value in its denomination asset
pub trait GavOracle {
    fn calc_gav(&self, fund_id: &str) -> Result<Decimal, FeeError>;
}

/// A share mint owed to a fee recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub recipient: String,
    pub shares: Decimal,
}

/// Share ledger of one or more funds
pub trait SharesLedger {
    fn total_supply(&self, fund_id: &str) -> Result<Decimal, FeeError>;

    /// Mint every entry or none of them.
    fn mint_all(&mut self, fund_id: &str, mints: &[Mint]) -> Result<(), FeeError>;
}

/// Fixed gav per fund, keyed by fund id
impl GavOracle for HashMap<String, Decimal> {
    fn calc_gav(&self, fund_id: &str) -> Result<Decimal, FeeError> {
        self.get(fund_id).copied().ok_or_else(|| FeeError::Collaborator {
            source_name: "gav oracle".into(),
            message: format!("no gav for fund {fund_id}"),
        })
    }
}

/// In-process share ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InMemoryLedger {
    balances: HashMap<String, HashMap<String, Decimal>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `holder` with shares bought into `fund_id`
    pub fn issue(&mut self, fund_id: &str, holder: &str, shares: Decimal) -> Result<(), FeeError> {
        check_amount(shares)?;
        let holders = self.balances.entry(fund_id.to_string()).or_default();
        let supply = checked_sum(holders.values())?;
        supply
            .checked_add(shares)
            .ok_or(FeeError::Overflow("share supply"))?;
        let balance = holders.entry(holder.to_string()).or_default();
        *balance = balance
            .checked_add(shares)
            .ok_or(FeeError::Overflow("share balance"))?;
        Ok(())
    }

    /// Remove redeemed shares from `holder`
    pub fn burn(&mut self, fund_id: &str, holder: &str, shares: Decimal) -> Result<(), FeeError> {
        check_amount(shares)?;
        let balance = self
            .balances
            .get_mut(fund_id)
            .and_then(|holders| holders.get_mut(holder))
            .ok_or_else(|| FeeError::Collaborator {
                source_name: "shares ledger".into(),
                message: format!("{holder} holds no shares of {fund_id}"),
            })?;
        if *balance < shares {
            return Err(FeeError::Collaborator {
                source_name: "shares ledger".into(),
                message: format!("{holder} holds {balance}, cannot burn {shares}"),
            });
        }
        *balance -= shares;
        Ok(())
    }

    pub fn balance_of(&self, fund_id: &str, holder: &str) -> Decimal {
        self.balances
            .get(fund_id)
            .and_then(|holders| holders.get(holder))
            .copied()
            .unwrap_or_default()
    }
}

impl SharesLedger for InMemoryLedger {
    fn total_supply(&self, fund_id: &str) -> Result<Decimal, FeeError> {
        match self.balances.get(fund_id) {
            Some(holders) => checked_sum(holders.values()),
            None => Ok(Decimal::ZERO),
        }
    }

    fn mint_all(&mut self, fund_id: &str, mints: &[Mint]) -> Result<(), FeeError> {
        let mut supply = self.total_supply(fund_id)?;
        for mint in mints {
            check_amount(mint.shares)?;
            supply = supply
                .checked_add(mint.shares)
                .ok_or(FeeError::Overflow("share supply"))?;
        }
        for mint in mints {
            self.issue(fund_id, &mint.recipient, mint.shares)?;
        }
        Ok(())
    }
}

fn checked_sum<'a>(mut amounts: impl Iterator<Item = &'a Decimal>) -> Result<Decimal, FeeError> {
    amounts.try_fold(Decimal::ZERO, |total, amount| {
        total
            .checked_add(*amount)
            .ok_or(FeeError::Overflow("share supply"))
    })
}

fn check_amount(shares: Decimal) -> Result<(), FeeError> {
    if shares < Decimal::ZERO {
        return Err(FeeError::InvariantViolation(format!(
            "negative share amount {shares}"
        )));
    }
    Ok(())
}
