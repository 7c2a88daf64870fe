//! Property-based tests (proptest) for share and insurance math.
//! Complements the Kani proofs with production-scale values.

use proptest::prelude::*;
use tranche_vault::math::{
    accounted_holdings, accrue, base_for_shares, bps_of, lp_for_deposit, percent_of, redemption_amount,
    shares_for_deposit, BPS_DENOMINATOR, RATE_SCALE,
};

proptest! {
    // ── Share ledger ──

    #[test]
    fn prop_deposit_withdraw_no_inflation(
        amount in 1u64..1_000_000_000_000_000,
        rate in RATE_SCALE..=100 * RATE_SCALE,
    ) {
        let shares = shares_for_deposit(amount, rate).unwrap();
        let back = base_for_shares(shares, rate).unwrap();
        prop_assert!(back <= amount, "Got back {} > deposited {}", back, amount);
    }

    #[test]
    fn prop_par_rate_is_exact(amount in 0u64..u64::MAX) {
        let shares = shares_for_deposit(amount, RATE_SCALE).unwrap();
        prop_assert_eq!(shares, amount);
        prop_assert_eq!(base_for_shares(shares, RATE_SCALE).unwrap(), amount);
    }

    #[test]
    fn prop_accrue_never_lowers_rate(
        holdings in 0u64..10_000_000_000_000_000,
        shares in 0u64..1_000_000_000_000_000,
        rate in RATE_SCALE..=10 * RATE_SCALE,
        fees in 0u64..1_000_000_000_000,
        fee_bps in 0u64..=BPS_DENOMINATOR,
    ) {
        let a = accrue(holdings, shares, rate, fees, fee_bps).unwrap();
        prop_assert!(a.exchange_rate >= rate);
        prop_assert!(a.fees_holdings >= fees);
    }

    #[test]
    fn prop_accrue_never_overcredits(
        holdings in 0u64..10_000_000_000_000_000,
        shares in 1u64..1_000_000_000_000_000,
        rate in RATE_SCALE..=10 * RATE_SCALE,
        fees in 0u64..1_000_000_000_000,
        fee_bps in 0u64..=BPS_DENOMINATOR,
    ) {
        let before = accounted_holdings(shares, rate, fees).unwrap();
        let a = accrue(holdings, shares, rate, fees, fee_bps).unwrap();
        let after = accounted_holdings(shares, a.exchange_rate, a.fees_holdings).unwrap();
        if (holdings as u128) > before {
            prop_assert!(after <= holdings as u128, "accounted {} > holdings {}", after, holdings);
        } else {
            prop_assert_eq!(after, before);
        }
    }

    #[test]
    fn prop_fee_split_matches_rate(
        gained in 1u64..1_000_000_000_000,
        fee_bps in 0u64..=BPS_DENOMINATOR,
    ) {
        let a = accrue(gained, 0, RATE_SCALE, 0, fee_bps).unwrap();
        // With no shares outstanding everything is fees.
        prop_assert_eq!(a.fees_holdings, gained);
        prop_assert_eq!(a.exchange_rate, RATE_SCALE);
    }

    // ── Fractions ──

    #[test]
    fn prop_fractions_bounded(amount in 0u64..u64::MAX, pct in 0u8..=100, bps in 0u64..=BPS_DENOMINATOR) {
        prop_assert!(percent_of(amount, pct).unwrap() <= amount);
        prop_assert!(bps_of(amount, bps).unwrap() <= amount);
        prop_assert_eq!(percent_of(amount, 100).unwrap(), amount);
    }

    // ── Insurance units ──

    #[test]
    fn prop_first_insurer_exact(amount in 1u64..u64::MAX) {
        let units = lp_for_deposit(0, 0, amount).unwrap();
        prop_assert_eq!(units, amount);
        prop_assert_eq!(redemption_amount(units, units, amount, amount).unwrap(), amount);
    }

    #[test]
    fn prop_insurance_no_inflation(
        supply in 1u64..1_000_000_000_000,
        holdings in 1u64..1_000_000_000_000,
        deposit in 1u64..1_000_000_000_000,
    ) {
        let units = lp_for_deposit(supply, holdings, deposit).unwrap();
        let back = redemption_amount(units, supply + units, holdings + deposit, deposit).unwrap();
        prop_assert!(back <= deposit, "Got back {} > deposited {}", back, deposit);
    }

    #[test]
    fn prop_insurance_no_dilution(
        supply in 1u64..1_000_000_000_000,
        holdings in 1u64..1_000_000_000_000,
        deposit in 1u64..1_000_000_000_000,
    ) {
        let before = redemption_amount(supply, supply, holdings, 0).unwrap();
        let units = lp_for_deposit(supply, holdings, deposit).unwrap();
        let after = redemption_amount(supply, supply + units, holdings + deposit, 0).unwrap();
        prop_assert!(after >= before, "Dilution: {} < {}", after, before);
    }

    #[test]
    fn prop_pro_rata_never_exceeds_holdings(
        a in 1u64..1_000_000_000_000,
        b in 1u64..1_000_000_000_000,
        holdings in 0u64..10_000_000_000_000,
    ) {
        let total = a + b;
        let paid = redemption_amount(a, total, holdings, 0).unwrap()
            + redemption_amount(b, total, holdings, 0).unwrap();
        prop_assert!(paid <= holdings);
    }
}

#[test]
fn test_units_against_empty_fund_rejected() {
    assert_eq!(lp_for_deposit(100, 0, 50), None);
}
