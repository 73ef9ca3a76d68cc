use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::{Fee, FeeSettlement, check_snapshot};
use crate::error::FeeError;
use crate::math;
use crate::types::{FeeEvent, FeeHook, FeeKind, FundSnapshot, HookEligibility, ManagementFeeState};

/// Seed a fund's management fee state. The accrual clock starts on the first
/// settling hook.
pub fn add_fund_settings(
    annual_rate: Decimal,
    recipient: impl Into<String>,
) -> Result<ManagementFeeState, FeeError> {
    if annual_rate < Decimal::ZERO || annual_rate >= Decimal::ONE {
        return Err(FeeError::InvalidSetting(format!(
            "management fee rate {annual_rate} must be in [0, 1)"
        )));
    }
    let recipient = recipient.into();
    if recipient.is_empty() {
        return Err(FeeError::InvalidSetting(
            "management fee recipient cannot be empty".into(),
        ));
    }
    Ok(ManagementFeeState::new(annual_rate, recipient))
}

pub fn eligible_on_hook(hook: FeeHook) -> HookEligibility {
    let settles = matches!(
        hook,
        FeeHook::Continuous | FeeHook::PreBuyShares | FeeHook::PreRedeemShares
    );
    HookEligibility {
        settles,
        updates: false,
    }
}

/// Management fee accrued over `seconds_elapsed`, in the denomination asset.
///
/// The fund keeps `(1 - annual_rate)` of its value per whole year, and a
/// linear share of that for the part-year left over. The retained fraction
/// never drops below one unit of 1e-18, so the fee stays strictly under
/// `gav` however long the fund went unsettled.
pub fn accrued_fee_value(
    gav: Decimal,
    annual_rate: Decimal,
    seconds_elapsed: i64,
) -> Result<Decimal, FeeError> {
    if seconds_elapsed <= 0 || annual_rate.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let years = (seconds_elapsed / math::SECONDS_PER_YEAR) as u64;
    let remainder = seconds_elapsed % math::SECONDS_PER_YEAR;

    let part_year = math::mul_div(
        annual_rate,
        Decimal::from(remainder),
        Decimal::from(math::SECONDS_PER_YEAR),
    )?;
    let retained = math::mul(
        math::pow(Decimal::ONE - annual_rate, years)?,
        Decimal::ONE - part_year,
    )?
    .max(MIN_RETAINED);
    math::mul(gav, Decimal::ONE - retained)
}

const MIN_RETAINED: Decimal = Decimal::from_parts(1, 0, 0, false, math::PRECISION);

#[derive(Debug, Clone)]
pub struct ManagementFee {
    fee_manager: String,
}

impl ManagementFee {
    pub fn new(fee_manager: impl Into<String>) -> Self {
        Self {
            fee_manager: fee_manager.into(),
        }
    }
}

impl Fee for ManagementFee {
    type State = ManagementFeeState;

    fn kind(&self) -> FeeKind {
        FeeKind::Management
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
        state: &mut ManagementFeeState,
        snapshot: FundSnapshot,
        now: DateTime<Utc>,
    ) -> Result<Option<FeeSettlement>, FeeError> {
        self.ensure_fee_manager(caller)?;
        check_snapshot(&snapshot)?;

        let Some(last_settled) = state.last_settled() else {
            state.stamp(now);
            tracing::debug!(fund_id, "management fee clock started");
            return Ok(None);
        };
        if now <= last_settled {
            return Ok(None);
        }

        // An empty fund owes nothing for the idle period
        if snapshot.total_shares_supply.is_zero() || snapshot.gav.is_zero() {
            state.stamp(now);
            return Ok(None);
        }

        let seconds_elapsed = (now - last_settled).num_seconds();
        let fee_value = accrued_fee_value(snapshot.gav, state.annual_rate(), seconds_elapsed)?;
        let shares_due =
            math::dilutive_shares(snapshot.total_shares_supply, fee_value, snapshot.gav)
                .inspect_err(|e| tracing::warn!(fund_id, "management fee settlement failed: {e}"))?;
        if shares_due.is_zero() {
            // keep accruing from the same point until at least one share unit is due
            return Ok(None);
        }

        let share_price = math::div(snapshot.gav, snapshot.total_shares_supply)?;
        // sub-second leftovers carry into the next settlement
        state.stamp(last_settled + Duration::seconds(seconds_elapsed));
        tracing::info!(
            fund_id,
            seconds_elapsed,
            fee_value = %fee_value,
            shares_due = %shares_due,
            "management fee settled"
        );

        Ok(Some(FeeSettlement {
            kind: FeeKind::Management,
            recipient: state.recipient().to_string(),
            shares_due,
            events: vec![FeeEvent::Settled {
                fund_id: fund_id.to_string(),
                fee: FeeKind::Management,
                recipient: state.recipient().to_string(),
                share_price,
                shares_due,
            }],
        }))
    }

    fn update(
        &self,
        caller: &str,
        _fund_id: &str,
        _state: &mut ManagementFeeState,
        _snapshot: FundSnapshot,
    ) -> Result<Vec<FeeEvent>, FeeError> {
        self.ensure_fee_manager(caller)?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_management_fee_one_year() {
        let fee = accrued_fee_value(dec!(1000000), dec!(0.02), math::SECONDS_PER_YEAR).unwrap();
        assert_eq!(fee, dec!(20000));
    }

    #[test]
    fn test_management_fee_half_year() {
        let fee =
            accrued_fee_value(dec!(1000000), dec!(0.02), math::SECONDS_PER_YEAR / 2).unwrap();
        assert_eq!(fee, dec!(10000));
    }

    #[test]
    fn test_management_fee_compounds_over_whole_years() {
        // keeps 0.98^2 = 0.9604 of the fund
        let fee = accrued_fee_value(dec!(1000000), dec!(0.02), 2 * math::SECONDS_PER_YEAR).unwrap();
        assert_eq!(fee, dec!(39600));

        // two and a half years: 0.9604 * 0.99
        let elapsed = 2 * math::SECONDS_PER_YEAR + math::SECONDS_PER_YEAR / 2;
        let fee = accrued_fee_value(dec!(1000000), dec!(0.02), elapsed).unwrap();
        assert_eq!(fee, dec!(49204));
    }

    #[test]
    fn test_accrued_fee_stays_below_gav() {
        let gav = dec!(100);
        for years in [1, 2, 5, 50, 100, 10_000] {
            let fee = accrued_fee_value(gav, dec!(0.5), years * math::SECONDS_PER_YEAR).unwrap();
            assert!(fee < gav, "{years} years charged {fee}");
        }
        let fee = accrued_fee_value(gav, dec!(0.9999), 200 * math::SECONDS_PER_YEAR).unwrap();
        assert!(fee < gav);
    }

    #[test]
    fn test_first_settle_only_starts_clock() {
        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.02), "manager").unwrap();
        let out = fee
            .settle("fm", "fund", &mut state, FundSnapshot::new(dec!(100), dec!(100)), t0())
            .unwrap();
        assert!(out.is_none());
        assert_eq!(state.last_settled(), Some(t0()));
    }

    #[test]
    fn test_settle_after_a_year_mints_dilutive_shares() {
        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.02), "manager").unwrap();
        let snapshot = FundSnapshot::new(dec!(1000), dec!(1000));
        fee.settle("fm", "fund", &mut state, snapshot, t0()).unwrap();

        let a_year_later = t0() + Duration::seconds(math::SECONDS_PER_YEAR);
        let settlement = fee
            .settle("fm", "fund", &mut state, snapshot, a_year_later)
            .unwrap()
            .expect("fee due");

        // fee value 20 of 1000 → 1000 * 20 / 980
        assert_eq!(settlement.shares_due, dec!(20.408163265306122448));
        assert_eq!(settlement.recipient, "manager");
        assert_eq!(state.last_settled(), Some(a_year_later));
    }

    #[test]
    fn test_long_idle_fund_still_settles() {
        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.5), "manager").unwrap();
        let snapshot = FundSnapshot::new(dec!(100), dec!(100));
        fee.settle("fm", "fund", &mut state, snapshot, t0()).unwrap();

        // well past the point a linear accrual would charge the whole fund
        let redeem_at = t0() + Duration::days(800);
        let settlement = fee
            .settle("fm", "fund", &mut state, snapshot, redeem_at)
            .unwrap()
            .expect("fee due");
        assert!(settlement.shares_due > Decimal::ZERO);
        assert_eq!(state.last_settled(), Some(redeem_at));

        let diluted = FundSnapshot::new(dec!(100), dec!(100) + settlement.shares_due);
        let later = redeem_at + Duration::days(30);
        assert!(fee.settle("fm", "fund", &mut state, diluted, later).unwrap().is_some());

        let century = later + Duration::days(365 * 100);
        assert!(fee.settle("fm", "fund", &mut state, diluted, century).is_ok());
    }

    #[test]
    fn test_clock_advances_by_whole_seconds_charged() {
        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.5), "manager").unwrap();
        let snapshot = FundSnapshot::new(dec!(1000000), dec!(1000000));
        fee.settle("fm", "fund", &mut state, snapshot, t0()).unwrap();

        let now = t0() + Duration::milliseconds(1500);
        let settlement = fee.settle("fm", "fund", &mut state, snapshot, now).unwrap();
        assert!(settlement.is_some());
        // the unbilled half second stays on the clock
        assert_eq!(state.last_settled(), Some(t0() + Duration::seconds(1)));
    }

    #[test]
    fn test_empty_fund_restarts_clock() {
        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.02), "manager").unwrap();
        fee.settle("fm", "fund", &mut state, FundSnapshot::new(dec!(0), dec!(0)), t0())
            .unwrap();
        let later = t0() + Duration::days(30);
        let out = fee
            .settle("fm", "fund", &mut state, FundSnapshot::new(dec!(0), dec!(0)), later)
            .unwrap();
        assert!(out.is_none());
        assert_eq!(state.last_settled(), Some(later));
    }

    #[test]
    fn test_hook_table() {
        assert!(eligible_on_hook(FeeHook::Continuous).settles);
        assert!(eligible_on_hook(FeeHook::PreBuyShares).settles);
        assert!(eligible_on_hook(FeeHook::PreRedeemShares).settles);
        assert!(!eligible_on_hook(FeeHook::PostBuyShares).settles);
        assert!(FeeHook::ALL.iter().all(|h| !eligible_on_hook(*h).updates));
    }

    #[test]
    fn test_rejects_bad_settings_and_callers() {
        assert!(add_fund_settings(dec!(1), "m").is_err());
        assert!(add_fund_settings(dec!(0.01), "").is_err());

        let fee = ManagementFee::new("fm");
        let mut state = add_fund_settings(dec!(0.02), "manager").unwrap();
        assert!(matches!(
            fee.settle("intruder", "fund", &mut state, FundSnapshot::new(dec!(1), dec!(1)), t0()),
            Err(FeeError::UnauthorizedCaller { .. })
        ));
        assert_eq!(state.last_settled(), None);
    }
}
