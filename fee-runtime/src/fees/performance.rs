//! Performance fee: a share of gains above the fund's high-water-mark, paid
//! by minting dilutive shares to the fee recipient.
//!
//! The fee value is converted to shares with the direct form
//! `shares_due = supply * fee_value / (gav - fee_value)`, floored at
//! [`crate::math::PRECISION`] decimals. After the mint the gross value per
//! share, `gav / (supply + shares_due)`, becomes the new high-water-mark.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::{Fee, FeeSettlement, check_snapshot};
use crate::error::FeeError;
use crate::math;
use crate::types::{
    FeeEvent, FeeHook, FeeKind, FeeState, FundSnapshot, HighWaterMarkUpdated, HookEligibility,
    PerformanceSettlement, Settled,
};

/// One unit of denomination asset per share unit
pub const DEFAULT_INITIAL_SHARE_PRICE: Decimal = Decimal::ONE;

/// Seed a fund's fee state at the default initial share price.
pub fn add_fund_settings(
    rate: Decimal,
    recipient: impl Into<String>,
) -> Result<FeeState, FeeError> {
    add_fund_settings_at(rate, recipient, DEFAULT_INITIAL_SHARE_PRICE)
}

/// Seed a fund's fee state with the high-water-mark at `initial_share_price`.
pub fn add_fund_settings_at(
    rate: Decimal,
    recipient: impl Into<String>,
    initial_share_price: Decimal,
) -> Result<FeeState, FeeError> {
    if rate < Decimal::ZERO || rate >= Decimal::ONE {
        return Err(FeeError::InvalidSetting(format!(
            "performance fee rate {rate} must be in [0, 1)"
        )));
    }
    let recipient = recipient.into();
    if recipient.is_empty() {
        return Err(FeeError::InvalidSetting(
            "performance fee recipient cannot be empty".into(),
        ));
    }
    if initial_share_price <= Decimal::ZERO {
        return Err(FeeError::InvalidSetting(format!(
            "initial share price {initial_share_price} must be positive"
        )));
    }
    Ok(FeeState::new(
        math::truncate(initial_share_price),
        rate,
        recipient,
    ))
}

/// Which hooks settle and which update the reference share price
pub fn eligible_on_hook(hook: FeeHook) -> HookEligibility {
    match hook {
        FeeHook::Continuous => HookEligibility {
            settles: true,
            updates: true,
        },
        FeeHook::PreBuyShares => HookEligibility {
            settles: true,
            updates: false,
        },
        FeeHook::PostBuyShares => HookEligibility {
            settles: false,
            updates: true,
        },
        FeeHook::PreRedeemShares => HookEligibility {
            settles: true,
            updates: true,
        },
        _ => HookEligibility::default(),
    }
}

/// Compute shares due and the next high-water-mark. Pure: `state` is not
/// touched, persist the result with [`FeeState::apply`].
///
/// A zero supply, a share price at or below the mark, or a fee too small to
/// yield a single share unit at 18 decimals all return a no-op settlement
/// that leaves the mark where it is.
pub fn settle(
    state: &FeeState,
    gav: Decimal,
    total_shares_supply: Decimal,
) -> Result<PerformanceSettlement, FeeError> {
    check_snapshot(&FundSnapshot::new(gav, total_shares_supply))?;
    let high_water_mark = state.high_water_mark();
    if high_water_mark < Decimal::ZERO {
        return Err(FeeError::InvariantViolation(format!(
            "negative high-water-mark {high_water_mark}"
        )));
    }

    if total_shares_supply.is_zero() {
        return Ok(PerformanceSettlement::no_fee(high_water_mark));
    }

    let gav_per_share = math::div(gav, total_shares_supply)?;
    if gav_per_share <= high_water_mark {
        return Ok(PerformanceSettlement::no_fee(high_water_mark));
    }

    let gain = gav_per_share - high_water_mark;
    let fee_value = math::mul(math::mul(gain, state.rate())?, total_shares_supply)?;
    if fee_value.is_zero() {
        return Ok(PerformanceSettlement::no_fee(high_water_mark));
    }

    let shares_due = math::dilutive_shares(total_shares_supply, fee_value, gav)?;
    if shares_due.is_zero() {
        return Ok(PerformanceSettlement::no_fee(high_water_mark));
    }

    let diluted_supply = math::add(total_shares_supply, shares_due)?;
    // floor rounding can land a hair under the old mark when the gain is dust
    let next_high_water_mark = math::div(gav, diluted_supply)?.max(high_water_mark);

    Ok(PerformanceSettlement {
        shares_due,
        next_high_water_mark,
        settled: Some(Settled {
            share_price: gav_per_share,
            shares_due,
        }),
        high_water_mark_updated: Some(HighWaterMarkUpdated {
            next_high_water_mark,
        }),
    })
}

/// Performance fee handle bound to the fee manager allowed to drive it
#[derive(Debug, Clone)]
pub struct PerformanceFee {
    fee_manager: String,
}

impl PerformanceFee {
    pub fn new(fee_manager: impl Into<String>) -> Self {
        Self {
            fee_manager: fee_manager.into(),
        }
    }
}

impl Fee for PerformanceFee {
    type State = FeeState;

    fn kind(&self) -> FeeKind {
        FeeKind::Performance
    }

    fn fee_manager(&self) -> &str {
        &self.fee_manager
    }

    fn eligibility(&self, hook: FeeHook) -> HookEligibility {
        eligible_on_hook(hook)
    }

    fn settle(
        &self,
        caller: &str,
        fund_id: &str,
        state: &mut FeeState,
        snapshot: FundSnapshot,
        _now: DateTime<Utc>,
    ) -> Result<Option<FeeSettlement>, FeeError> {
        self.ensure_fee_manager(caller)?;
        let settlement = settle(state, snapshot.gav, snapshot.total_shares_supply)
            .inspect_err(|e| tracing::warn!(fund_id, "performance fee settlement failed: {e}"))?;

        let Some(settled) = settlement.settled.clone() else {
            tracing::debug!(
                fund_id,
                high_water_mark = %state.high_water_mark(),
                "no performance fee due"
            );
            return Ok(None);
        };

        state.apply(&settlement);
        tracing::info!(
            fund_id,
            share_price = %settled.share_price,
            shares_due = %settled.shares_due,
            next_high_water_mark = %settlement.next_high_water_mark,
            "performance fee settled"
        );

        Ok(Some(FeeSettlement {
            kind: FeeKind::Performance,
            recipient: state.recipient().to_string(),
            shares_due: settlement.shares_due,
            events: vec![
                FeeEvent::Settled {
                    fund_id: fund_id.to_string(),
                    fee: FeeKind::Performance,
                    recipient: state.recipient().to_string(),
                    share_price: settled.share_price,
                    shares_due: settled.shares_due,
                },
                FeeEvent::HighWaterMarkUpdated {
                    fund_id: fund_id.to_string(),
                    next_high_water_mark: settlement.next_high_water_mark,
                },
            ],
        }))
    }

    fn update(
        &self,
        caller: &str,
        fund_id: &str,
        state: &mut FeeState,
        snapshot: FundSnapshot,
    ) -> Result<Vec<FeeEvent>, FeeError> {
        self.ensure_fee_manager(caller)?;
        check_snapshot(&snapshot)?;
        if snapshot.total_shares_supply.is_zero() {
            return Ok(Vec::new());
        }

        let share_price = math::div(snapshot.gav, snapshot.total_shares_supply)?;
        let previous = state.record_share_price(share_price);
        tracing::debug!(fund_id, %share_price, "performance fee share price updated");

        Ok(vec![FeeEvent::SharePriceUpdated {
            fund_id: fund_id.to_string(),
            previous,
            next: share_price,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ten_percent() -> FeeState {
        add_fund_settings(dec!(0.1), "recipient").unwrap()
    }

    #[test]
    fn test_add_fund_settings_seeds_initial_share_price() {
        let state = ten_percent();
        assert_eq!(state.high_water_mark(), Decimal::ONE);
        assert_eq!(state.rate(), dec!(0.1));
        assert_eq!(state.recipient(), "recipient");
        assert_eq!(state.last_share_price(), None);

        let state = add_fund_settings_at(dec!(0.2), "r", dec!(100)).unwrap();
        assert_eq!(state.high_water_mark(), dec!(100));
    }

    #[test]
    fn test_add_fund_settings_rejects_bad_rate() {
        assert!(add_fund_settings(Decimal::ONE, "r").is_err());
        assert!(add_fund_settings(dec!(1.5), "r").is_err());
        assert!(add_fund_settings(dec!(-0.1), "r").is_err());
        assert!(add_fund_settings(Decimal::ZERO, "r").is_ok());
        assert!(add_fund_settings(dec!(0.1), "").is_err());
        assert!(add_fund_settings_at(dec!(0.1), "r", Decimal::ZERO).is_err());
    }

    #[test]
    fn test_settle_above_hwm() {
        let settlement = settle(&ten_percent(), dec!(3), dec!(2)).unwrap();

        // gain 0.5/share, fee value 0.1, shares = 2 * 0.1 / 2.9
        assert_eq!(settlement.shares_due, dec!(0.068965517241379310));
        assert_eq!(settlement.next_high_water_mark, dec!(1.45));
        assert_eq!(
            settlement.settled,
            Some(Settled {
                share_price: dec!(1.5),
                shares_due: dec!(0.068965517241379310),
            })
        );
        assert_eq!(
            settlement.high_water_mark_updated,
            Some(HighWaterMarkUpdated {
                next_high_water_mark: dec!(1.45)
            })
        );
        assert!(settlement.is_payout());
    }

    #[test]
    fn test_settle_large_fund() {
        // supply * fee value is past Decimal::MAX here
        let state = add_fund_settings(dec!(0.2), "r").unwrap();
        let gav = dec!(3000000000000000);
        let supply = dec!(2000000000000000);
        let settlement = settle(&state, gav, supply).unwrap();

        // fee value 2e14, shares = 2e15 * 2e14 / 2.8e15
        assert!((settlement.shares_due - dec!(142857142857142.857142)).abs() < dec!(0.01));
        assert!((settlement.next_high_water_mark - dec!(1.4)).abs() < dec!(0.000000000001));
        assert_eq!(settlement.settled.unwrap().share_price, dec!(1.5));
    }

    #[test]
    fn test_settle_below_hwm() {
        let state = ten_percent();
        let settlement = settle(&state, dec!(1.5), dec!(2)).unwrap();
        assert_eq!(settlement.shares_due, Decimal::ZERO);
        assert_eq!(settlement.next_high_water_mark, Decimal::ONE);
        assert!(settlement.settled.is_none());
        assert!(settlement.high_water_mark_updated.is_none());
    }

    #[test]
    fn test_settle_at_hwm_is_no_fee() {
        let settlement = settle(&ten_percent(), dec!(2), dec!(2)).unwrap();
        assert!(!settlement.is_payout());
        assert_eq!(settlement.next_high_water_mark, Decimal::ONE);
    }

    #[test]
    fn test_settle_zero_supply_is_noop() {
        let settlement = settle(&ten_percent(), dec!(1000), Decimal::ZERO).unwrap();
        assert_eq!(settlement, PerformanceSettlement::no_fee(Decimal::ONE));
    }

    #[test]
    fn test_settle_zero_rate_never_pays() {
        let state = add_fund_settings(Decimal::ZERO, "r").unwrap();
        let settlement = settle(&state, dec!(10), dec!(1)).unwrap();
        assert!(!settlement.is_payout());
        assert_eq!(settlement.next_high_water_mark, Decimal::ONE);
    }

    #[test]
    fn test_settle_rejects_negative_inputs() {
        let state = ten_percent();
        assert!(matches!(
            settle(&state, dec!(-1), dec!(1)),
            Err(FeeError::InvariantViolation(_))
        ));
        assert!(matches!(
            settle(&state, dec!(1), dec!(-1)),
            Err(FeeError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_apply_moves_hwm_up_only() {
        let mut state = ten_percent();
        let settlement = settle(&state, dec!(3), dec!(2)).unwrap();
        state.apply(&settlement);
        assert_eq!(state.high_water_mark(), dec!(1.45));

        // Share price falls: nothing due, mark holds
        let settlement = settle(&state, dec!(2), dec!(2.068965517241379310)).unwrap();
        state.apply(&settlement);
        assert_eq!(state.high_water_mark(), dec!(1.45));
    }

    #[test]
    fn test_hook_table() {
        let on = |hook| eligible_on_hook(hook);
        assert_eq!(on(FeeHook::Continuous), HookEligibility { settles: true, updates: true });
        assert_eq!(on(FeeHook::PreBuyShares), HookEligibility { settles: true, updates: false });
        assert_eq!(on(FeeHook::PostBuyShares), HookEligibility { settles: false, updates: true });
        assert_eq!(on(FeeHook::PreRedeemShares), HookEligibility { settles: true, updates: true });
        assert_eq!(on(FeeHook::PostRedeemShares), HookEligibility::default());
    }

    #[test]
    fn test_fee_handle_rejects_other_callers() {
        let fee = PerformanceFee::new("fee-manager");
        let mut state = ten_percent();
        let err = fee
            .settle(
                "someone-else",
                "fund",
                &mut state,
                FundSnapshot::new(dec!(3), dec!(2)),
                Utc::now(),
            )
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unauthorized caller someone-else: Only the FeeManager can make this call"
        );
        assert_eq!(state, ten_percent());

        assert!(fee
            .update("someone-else", "fund", &mut state, FundSnapshot::new(dec!(3), dec!(2)))
            .is_err());
    }

    #[test]
    fn test_fee_handle_settles_and_records_events() {
        let fee = PerformanceFee::new("fee-manager");
        let mut state = ten_percent();
        let settlement = fee
            .settle(
                "fee-manager",
                "fund",
                &mut state,
                FundSnapshot::new(dec!(3), dec!(2)),
                Utc::now(),
            )
            .unwrap()
            .expect("fee due");

        assert_eq!(settlement.kind, FeeKind::Performance);
        assert_eq!(settlement.recipient, "recipient");
        assert_eq!(settlement.shares_due, dec!(0.068965517241379310));
        assert_eq!(settlement.events.len(), 2);
        assert_eq!(state.high_water_mark(), dec!(1.45));
    }

    #[test]
    fn test_update_records_share_price_without_moving_hwm() {
        let fee = PerformanceFee::new("fm");
        let mut state = ten_percent();

        let events = fee
            .update("fm", "fund", &mut state, FundSnapshot::new(dec!(3), dec!(2)))
            .unwrap();
        assert_eq!(
            events,
            vec![FeeEvent::SharePriceUpdated {
                fund_id: "fund".into(),
                previous: None,
                next: dec!(1.5),
            }]
        );
        assert_eq!(state.last_share_price(), Some(dec!(1.5)));
        assert_eq!(state.high_water_mark(), Decimal::ONE);

        let events = fee
            .update("fm", "fund", &mut state, FundSnapshot::new(dec!(0), dec!(0)))
            .unwrap();
        assert!(events.is_empty());
    }
}
