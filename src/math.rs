//! Pure share math. No Solana types or accounts.
//!
//! Everything here is `Option`-returning integer arithmetic with u128
//! intermediates so it can be property-tested and model-checked in isolation.

/// Fixed-point scale of the exchange rate (base units per share).
pub const RATE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Exchange rate of a fresh pool: one base unit per share.
pub const INITIAL_EXCHANGE_RATE: u128 = RATE_SCALE;

/// Denominator for basis-point fees.
pub const BPS_DENOMINATOR: u64 = 10_000;

/// Upper bound of a per-step conversion percentage.
pub const MAX_PERCENTAGE: u8 = 100;

fn to_u64(v: u128) -> Option<u64> {
    if v > u64::MAX as u128 {
        None
    } else {
        Some(v as u64)
    }
}

// ═══════════════════════════════════════════════════════════════
// Senior share ledger
// ═══════════════════════════════════════════════════════════════

/// Shares minted for a deposit at `exchange_rate`.
///
/// # Returns
/// * `Some(shares)` - `floor(amount * RATE_SCALE / exchange_rate)` (pool-favoring)
/// * `None` - zero rate or overflow
pub fn shares_for_deposit(amount: u64, exchange_rate: u128) -> Option<u64> {
    if exchange_rate == 0 {
        return None;
    }
    let shares = (amount as u128)
        .checked_mul(RATE_SCALE)?
        .checked_div(exchange_rate)?;
    to_u64(shares)
}

/// Base-asset value of `shares` at `exchange_rate`, rounded down.
pub fn base_for_shares(shares: u64, exchange_rate: u128) -> Option<u64> {
    let base = (shares as u128)
        .checked_mul(exchange_rate)?
        .checked_div(RATE_SCALE)?;
    to_u64(base)
}

/// Base-asset value the ledger already accounts for: outstanding shares at
/// the current rate plus undistributed fees.
pub fn accounted_holdings(total_shares: u64, exchange_rate: u128, fees_holdings: u64) -> Option<u128> {
    (total_shares as u128)
        .checked_mul(exchange_rate)?
        .checked_div(RATE_SCALE)?
        .checked_add(fees_holdings as u128)
}

/// Result of folding newly observed holdings into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accrual {
    pub exchange_rate: u128,
    pub fees_holdings: u64,
    /// Yield credited to share holders through the rate.
    pub senior_yield: u64,
    /// Yield credited to `fees_holdings`.
    pub fee_yield: u64,
}

/// Fold adapter holdings into the exchange rate and fee balance.
///
/// Unaccounted holdings are split: `fee_rate_bps` of them go to fees, the
/// rest raises the rate by `senior * RATE_SCALE / total_shares`.
///
/// # Invariant
/// The returned rate is never below `exchange_rate`. A shortfall (holdings
/// below what is accounted) leaves state unchanged. With no shares
/// outstanding all yield goes to fees. After accrual,
/// `accounted_holdings(..) <= holdings`.
pub fn accrue(
    holdings: u64,
    total_shares: u64,
    exchange_rate: u128,
    fees_holdings: u64,
    fee_rate_bps: u64,
) -> Option<Accrual> {
    let unchanged = Accrual {
        exchange_rate,
        fees_holdings,
        senior_yield: 0,
        fee_yield: 0,
    };
    if fee_rate_bps > BPS_DENOMINATOR {
        return None;
    }
    let accounted = accounted_holdings(total_shares, exchange_rate, fees_holdings)?;
    let holdings = holdings as u128;
    if holdings <= accounted {
        return Some(unchanged);
    }
    let gained = holdings - accounted;

    if total_shares == 0 {
        let fee_yield = to_u64(gained)?;
        return Some(Accrual {
            exchange_rate,
            fees_holdings: fees_holdings.checked_add(fee_yield)?,
            senior_yield: 0,
            fee_yield,
        });
    }

    let fee = gained
        .checked_mul(fee_rate_bps as u128)?
        .checked_div(BPS_DENOMINATOR as u128)?;
    let senior = gained - fee;
    let rate_increase = senior
        .checked_mul(RATE_SCALE)?
        .checked_div(total_shares as u128)?;
    // Rounding dust of the rate increase stays unaccounted for the next pass.
    let credited = rate_increase
        .checked_mul(total_shares as u128)?
        .checked_div(RATE_SCALE)?;

    Some(Accrual {
        exchange_rate: exchange_rate.checked_add(rate_increase)?,
        fees_holdings: fees_holdings.checked_add(to_u64(fee)?)?,
        senior_yield: to_u64(credited)?,
        fee_yield: to_u64(fee)?,
    })
}

// ═══════════════════════════════════════════════════════════════
// Fractions
// ═══════════════════════════════════════════════════════════════

/// `floor(amount * bps / 10_000)`.
pub fn bps_of(amount: u64, bps: u64) -> Option<u64> {
    let v = (amount as u128)
        .checked_mul(bps as u128)?
        .checked_div(BPS_DENOMINATOR as u128)?;
    to_u64(v)
}

/// `floor(amount * percentage / 100)`; `None` for percentages above 100.
pub fn percent_of(amount: u64, percentage: u8) -> Option<u64> {
    if percentage > MAX_PERCENTAGE {
        return None;
    }
    let v = (amount as u128)
        .checked_mul(percentage as u128)?
        .checked_div(MAX_PERCENTAGE as u128)?;
    to_u64(v)
}

// ═══════════════════════════════════════════════════════════════
// Insurance fund units
// ═══════════════════════════════════════════════════════════════

/// Entitlement units minted for an insurance deposit.
///
/// # Returns
/// * `Some(units)` - 1:1 for the first depositor, otherwise
///   `floor(amount * total_supply_lp / holdings)`
/// * `None` - overflow, or units outstanding against an empty fund
///   (a new depositor would buy a claim on nothing while diluting
///   holders waiting on the next conversion)
///
/// With no units outstanding the depositor mints 1:1 and becomes the sole
/// holder, so any residual holdings (late conversion proceeds, dust) accrue
/// to them on redemption.
pub fn lp_for_deposit(total_supply_lp: u64, holdings: u64, amount: u64) -> Option<u64> {
    if total_supply_lp == 0 {
        Some(amount)
    } else if holdings == 0 {
        None
    } else {
        let lp = (amount as u128)
            .checked_mul(total_supply_lp as u128)?
            .checked_div(holdings as u128)?;
        to_u64(lp)
    }
}

/// Insurance-asset amount released when a position is redeemed.
///
/// `principal` exactly when no units are outstanding, otherwise the
/// pro-rata share `floor(balance * holdings / total_supply_lp)`.
pub fn redemption_amount(balance: u64, total_supply_lp: u64, holdings: u64, principal: u64) -> Option<u64> {
    if total_supply_lp == 0 {
        return Some(principal);
    }
    let v = (balance as u128)
        .checked_mul(holdings as u128)?
        .checked_div(total_supply_lp as u128)?;
    to_u64(v)
}

/// Earnings above principal; never negative.
pub fn earnings(entitlement: u64, principal: u64) -> u64 {
    entitlement.saturating_sub(principal)
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u64 = 1_000_000_000;

    // ── Share conversion ──

    #[test]
    fn test_initial_rate_is_one_to_one() {
        assert_eq!(shares_for_deposit(10 * UNIT, INITIAL_EXCHANGE_RATE), Some(10 * UNIT));
        assert_eq!(base_for_shares(10 * UNIT, INITIAL_EXCHANGE_RATE), Some(10 * UNIT));
    }

    #[test]
    fn test_shares_round_down() {
        // rate 3.0: 10 base → 3 shares (3.33 floored)
        assert_eq!(shares_for_deposit(10, 3 * RATE_SCALE), Some(3));
        assert_eq!(base_for_shares(3, 3 * RATE_SCALE), Some(9));
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert_eq!(shares_for_deposit(100, 0), None);
    }

    #[test]
    fn test_sequential_deposits_accumulate() {
        let rate = INITIAL_EXCHANGE_RATE;
        let total = shares_for_deposit(10 * UNIT, rate).unwrap()
            + shares_for_deposit(35 * UNIT, rate).unwrap()
            + shares_for_deposit(35 * UNIT, rate).unwrap();
        assert_eq!(total, 80 * UNIT);
    }

    // ── Accrual ──

    #[test]
    fn test_accrue_no_yield_is_noop() {
        let a = accrue(1_000, 1_000, RATE_SCALE, 0, 1_000).unwrap();
        assert_eq!(a.exchange_rate, RATE_SCALE);
        assert_eq!(a.fees_holdings, 0);
        assert_eq!(a.senior_yield, 0);
    }

    #[test]
    fn test_accrue_splits_fee_and_rate() {
        // 1000 shares at 1.0, holdings grow by 100, 10% fee
        let a = accrue(1_100, 1_000, RATE_SCALE, 0, 1_000).unwrap();
        assert_eq!(a.fee_yield, 10);
        assert_eq!(a.fees_holdings, 10);
        assert_eq!(a.senior_yield, 90);
        assert_eq!(a.exchange_rate, RATE_SCALE + RATE_SCALE * 90 / 1_000);
        assert!(accounted_holdings(1_000, a.exchange_rate, a.fees_holdings).unwrap() <= 1_100);
    }

    #[test]
    fn test_accrue_shortfall_keeps_rate() {
        let a = accrue(900, 1_000, RATE_SCALE, 0, 1_000).unwrap();
        assert_eq!(a.exchange_rate, RATE_SCALE);
        assert_eq!(a.fees_holdings, 0);
    }

    #[test]
    fn test_accrue_without_shares_goes_to_fees() {
        let a = accrue(500, 0, RATE_SCALE, 20, 1_000).unwrap();
        assert_eq!(a.exchange_rate, RATE_SCALE);
        assert_eq!(a.fees_holdings, 500);
        assert_eq!(a.fee_yield, 480);
    }

    #[test]
    fn test_accrue_counts_existing_fees() {
        // fees already account for 50 of the 1_050 holdings
        let a = accrue(1_050, 1_000, RATE_SCALE, 50, 1_000).unwrap();
        assert_eq!(a.exchange_rate, RATE_SCALE);
        assert_eq!(a.fees_holdings, 50);
    }

    #[test]
    fn test_accrue_rejects_fee_above_100_percent() {
        assert_eq!(accrue(1_100, 1_000, RATE_SCALE, 0, 10_001), None);
    }

    #[test]
    fn test_accrue_full_fee() {
        let a = accrue(1_100, 1_000, RATE_SCALE, 0, BPS_DENOMINATOR).unwrap();
        assert_eq!(a.exchange_rate, RATE_SCALE);
        assert_eq!(a.fees_holdings, 100);
    }

    // ── Fractions ──

    #[test]
    fn test_percent_of_bounds() {
        assert_eq!(percent_of(1_000, 0), Some(0));
        assert_eq!(percent_of(1_000, 50), Some(500));
        assert_eq!(percent_of(1_000, 100), Some(1_000));
        assert_eq!(percent_of(1_000, 101), None);
    }

    #[test]
    fn test_bps_of() {
        assert_eq!(bps_of(10_000, 1_000), Some(1_000));
        assert_eq!(bps_of(u64::MAX, BPS_DENOMINATOR), Some(u64::MAX));
        assert_eq!(bps_of(9, 1_000), Some(0));
    }

    // ── Insurance units ──

    #[test]
    fn test_first_insurance_deposit_one_to_one() {
        assert_eq!(lp_for_deposit(0, 0, 100_000), Some(100_000));
    }

    #[test]
    fn test_first_deposit_claims_residual_holdings() {
        let units = lp_for_deposit(0, 5_000, 100).unwrap();
        assert_eq!(units, 100);
        // Sole holder redeems the deposit plus the residual.
        assert_eq!(redemption_amount(units, units, 5_100, 100), Some(5_100));
    }

    #[test]
    fn test_deposit_blocked_when_units_back_nothing() {
        assert_eq!(lp_for_deposit(1_000, 0, 100), None);
    }

    #[test]
    fn test_insurance_pro_rata() {
        // holdings doubled since the first deposit
        assert_eq!(lp_for_deposit(1_000, 2_000, 500), Some(250));
    }

    #[test]
    fn test_redemption_pro_rata() {
        assert_eq!(redemption_amount(250, 1_000, 3_000, 100), Some(750));
    }

    #[test]
    fn test_redemption_without_supply_returns_principal() {
        assert_eq!(redemption_amount(250, 0, 3_000, 100), Some(100));
    }

    #[test]
    fn test_earnings_never_negative() {
        assert_eq!(earnings(90, 100), 0);
        assert_eq!(earnings(130, 100), 30);
    }
}
