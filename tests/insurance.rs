//! Insurance fund flows: positions, unlock delay, pro-rata earnings.

mod common;

use common::*;
use solana_program::pubkey::Pubkey;
use tranche_vault::deployment::{ConversionArgs, Deployment};
use tranche_vault::error::VaultError;
use tranche_vault::ports::PositionStore;
use tranche_vault::state::{AdapterKind, PositionRecord, Tranche, DEFAULT_UNFREEZE_DELAY};

fn usdc_of(d: &Deployment, k: &Keys, owner: &Pubkey) -> u64 {
    d.tokens.balance(&k.usdc, owner)
}

#[test]
fn test_deposit_mints_insurance_position() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);

    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    assert_eq!(id, 1);
    assert_eq!(d.fund_deposit(&k.bob, 50 * UNIT).unwrap(), 2);

    let record = d.pool.position(&d.positions, 1).unwrap();
    assert_eq!(record.tranche().unwrap(), Tranche::Insurance);
    assert_eq!(record.principal, 100 * UNIT);
    assert_eq!(record.balance, 100 * UNIT);
    assert_eq!(record.expiration, 0);
    assert_eq!(d.positions.owner_of(1), Some(k.alice));
    assert_eq!(d.positions.ids_of(&k.bob), vec![2]);

    assert_eq!(d.fund.state.total_principal, 150 * UNIT);
    assert_eq!(d.fund.state.total_supply_lp, 150 * UNIT);
    assert_eq!(usdc_of(&d, &k, &k.alice), USER_USDC - 100 * UNIT);
    assert_eq!(d.fund_deposit(&k.alice, 0), Err(VaultError::ZeroAmount.into()));
}

#[test]
fn test_only_fee_manager_mints_positions() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    assert_eq!(
        d.pool.mint_insurance_position(&mut d.positions, &k.alice, &k.alice, UNIT, UNIT),
        Err(VaultError::MustBeFeeManager.into())
    );
    assert!(d.positions.is_empty());
}

#[test]
fn test_earnings_split_pro_rata() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let a = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    let b = d.fund_deposit(&k.bob, 300 * UNIT).unwrap();
    assert_eq!(d.fund.state.total_supply_lp, 400 * UNIT);

    d.tokens.credit(&k.usdc, &k.fund, 40 * UNIT);
    assert_eq!(d.pending_earnings(a).unwrap(), 10 * UNIT);
    assert_eq!(d.pending_earnings(b).unwrap(), 30 * UNIT);

    // A later depositor buys in at the current ratio and earns nothing yet.
    let c = d.fund_deposit(&k.carol, 110 * UNIT).unwrap();
    assert_eq!(d.pending_earnings(c).unwrap(), 0);
    assert_eq!(d.pending_earnings(a).unwrap(), 10 * UNIT);
}

#[test]
fn test_unfreeze_boundary() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();

    assert_eq!(d.fund_withdraw(&k.alice, id), Err(VaultError::TooEarly.into()));
    assert_eq!(d.begin_unfreeze(&k.bob, id), Err(VaultError::MustBeOwner.into()));
    assert_eq!(d.begin_unfreeze(&k.alice, id).unwrap(), DEFAULT_UNFREEZE_DELAY);
    assert_eq!(d.begin_unfreeze(&k.alice, id), Err(VaultError::AlreadyUnfreezing.into()));

    d.advance(DEFAULT_UNFREEZE_DELAY - 1);
    assert_eq!(d.fund_withdraw(&k.alice, id), Err(VaultError::TooEarly.into()));

    d.advance(1);
    assert_eq!(d.fund_withdraw(&k.bob, id), Err(VaultError::MustBeOwner.into()));
    assert_eq!(d.fund_withdraw(&k.alice, id).unwrap(), 100 * UNIT);
    assert_eq!(usdc_of(&d, &k, &k.alice), USER_USDC);
    assert_eq!(d.positions.owner_of(id), None);
    assert_eq!(d.fund.state.total_principal, 0);
    assert_eq!(d.fund.state.total_supply_lp, 0);
    assert_eq!(d.fund_withdraw(&k.alice, id), Err(VaultError::PositionNotFound.into()));
}

#[test]
fn test_withdraw_pays_earnings() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let a = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    let b = d.fund_deposit(&k.bob, 100 * UNIT).unwrap();
    d.tokens.credit(&k.usdc, &k.fund, 20 * UNIT);

    d.begin_unfreeze(&k.alice, a).unwrap();
    d.advance(DEFAULT_UNFREEZE_DELAY);
    assert_eq!(d.fund_withdraw(&k.alice, a).unwrap(), 110 * UNIT);
    assert_eq!(d.pending_earnings(b).unwrap(), 10 * UNIT);
}

#[test]
fn test_emergency_withdraw_returns_principal_only() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let a = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    let b = d.fund_deposit(&k.bob, 100 * UNIT).unwrap();
    d.tokens.credit(&k.usdc, &k.fund, 20 * UNIT);

    // The unlock delay still applies.
    assert_eq!(d.fund_emergency_withdraw(&k.alice, a), Err(VaultError::TooEarly.into()));

    d.begin_unfreeze(&k.alice, a).unwrap();
    d.advance(DEFAULT_UNFREEZE_DELAY);
    assert_eq!(d.fund_emergency_withdraw(&k.alice, a).unwrap(), 100 * UNIT);
    assert_eq!(d.fund.state.total_principal, 100 * UNIT);
    assert_eq!(d.fund.state.total_supply_lp, 100 * UNIT);
    // Forfeited earnings stay with the remaining holder.
    assert_eq!(d.pending_earnings(b).unwrap(), 20 * UNIT);
}

#[test]
fn test_fund_rejects_senior_positions() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    d.fund_deposit(&k.bob, 100 * UNIT).unwrap();
    let senior = PositionRecord::new(&k.pool, &k.alice, 500, Tranche::Senior, 10 * UNIT, 10 * UNIT);
    d.positions.mint(&k.pool, senior).unwrap();

    assert_eq!(d.pending_earnings(500), Err(VaultError::MustBeInsuranceNft.into()));
    d.advance(DEFAULT_UNFREEZE_DELAY);
    assert_eq!(d.fund_withdraw(&k.alice, 500), Err(VaultError::MustBeInsuranceNft.into()));
    assert_eq!(d.fund_emergency_withdraw(&k.alice, 500), Err(VaultError::MustBeInsuranceNft.into()));

    assert_eq!(d.positions.owner_of(500), Some(k.alice));
    assert_eq!(usdc_of(&d, &k, &k.fund), 100 * UNIT);
    assert_eq!(d.fund.state.total_supply_lp, 100 * UNIT);
}

#[test]
fn test_transferred_position_follows_new_owner() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();

    assert_eq!(d.transfer_position(&k.bob, id, &k.carol), Err(VaultError::MustBeOwner.into()));
    d.transfer_position(&k.alice, id, &k.bob).unwrap();
    assert_eq!(d.positions.owner_of(id), Some(k.bob));
    assert!(d.positions.ids_of(&k.alice).is_empty());

    assert_eq!(d.begin_unfreeze(&k.alice, id), Err(VaultError::MustBeOwner.into()));
    d.begin_unfreeze(&k.bob, id).unwrap();
    d.advance(DEFAULT_UNFREEZE_DELAY);
    assert_eq!(d.fund_withdraw(&k.bob, id).unwrap(), 100 * UNIT);
    assert_eq!(usdc_of(&d, &k, &k.bob), USER_USDC + 100 * UNIT);
}

#[test]
fn test_shutdown_pauses_fund() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    d.begin_unfreeze(&k.alice, id).unwrap();
    d.advance(DEFAULT_UNFREEZE_DELAY);

    d.pool.shut_down_pool(&k.governance, true).unwrap();
    assert_eq!(d.fund_withdraw(&k.alice, id), Err(VaultError::RemovalPaused.into()));
    assert_eq!(d.fund_emergency_withdraw(&k.alice, id), Err(VaultError::RemovalPaused.into()));
    assert_eq!(d.fund_deposit(&k.bob, UNIT), Err(VaultError::PoolShutDown.into()));

    d.pool.shut_down_pool(&k.governance, false).unwrap();
    d.pool.disable_deposits(&k.governance, true).unwrap();
    assert_eq!(d.fund_deposit(&k.bob, UNIT), Err(VaultError::DepositsDisabled.into()));
    assert_eq!(d.fund_withdraw(&k.alice, id).unwrap(), 100 * UNIT);
}

#[test]
fn test_update_converts_pool_fees_into_earnings() {
    let (mut d, k) = deployment(AdapterKind::LiveFarm);
    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    d.deposit(&k.bob, 50 * UNIT).unwrap();

    d.farm.fund_rewards(&mut d.tokens, 0, 10 * UNIT).unwrap();
    d.autocompound().unwrap();

    let gained = d.fund_update().unwrap();
    assert!(gained > 0);
    assert_eq!(d.pool.state.fees_holdings, 0);
    // Conversions leave nothing unconverted behind.
    assert_eq!(lp_of(&d, &k, &k.fund), 0);
    assert_eq!(d.tokens.balance(&k.mjt, &k.fund), 0);
    assert_eq!(d.tokens.balance(&k.wkcs, &k.fund), 0);
    // Sole holder is entitled to everything the fund gained.
    assert_eq!(d.pending_earnings(id).unwrap(), gained);
}

#[test]
fn test_update_forwards_treasury_cut() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    d.fund.set_treasury(&k.governance, &k.treasury).unwrap();
    d.fund.set_treasury_fee(&k.governance, 5_000).unwrap();
    d.deposit(&k.alice, 100 * UNIT).unwrap();
    d.tokens.credit(&k.lp, &k.adapter, 20 * UNIT);

    // 2 base of fees, half of it to the treasury.
    d.fund_update().unwrap();
    assert_eq!(lp_of(&d, &k, &k.treasury), UNIT);
    assert!(usdc_of(&d, &k, &k.fund) > 0);
}

#[test]
fn test_fund_conversion_validation() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let too_much = ConversionArgs {
        percentages: vec![100, 101, 100],
        ..k.fund_conversions()
    };
    assert_eq!(
        d.init_fund_conversions(&k.governance, &too_much),
        Err(VaultError::BadPercentage.into())
    );
    let ragged = ConversionArgs {
        percentages: vec![100, 100],
        ..k.fund_conversions()
    };
    assert_eq!(
        d.init_fund_conversions(&k.governance, &ragged),
        Err(VaultError::InvalidConversions.into())
    );
    assert_eq!(
        d.init_fund_conversions(&k.bob, &k.fund_conversions()),
        Err(VaultError::MustBeGovernance.into())
    );
}

#[test]
fn test_earnings_never_decrease_across_updates() {
    let (mut d, k) = deployment(AdapterKind::LiveFarm);
    let id = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    d.deposit(&k.bob, 50 * UNIT).unwrap();

    let mut last = d.pending_earnings(id).unwrap();
    for _ in 0..4 {
        d.farm.fund_rewards(&mut d.tokens, 0, 10 * UNIT).unwrap();
        d.autocompound().unwrap();
        d.fund_update().unwrap();
        let earned = d.pending_earnings(id).unwrap();
        assert!(earned >= last);
        last = earned;
    }
    assert!(last > 0);
}

#[test]
fn test_residual_holdings_go_to_next_depositor() {
    let (mut d, k) = deployment(AdapterKind::TestDouble);
    let a = d.fund_deposit(&k.alice, 100 * UNIT).unwrap();
    d.begin_unfreeze(&k.alice, a).unwrap();
    d.advance(DEFAULT_UNFREEZE_DELAY);
    d.fund_withdraw(&k.alice, a).unwrap();
    assert_eq!(d.fund.state.total_supply_lp, 0);

    // Proceeds landing after the last holder left.
    d.tokens.credit(&k.usdc, &k.fund, 7 * UNIT);
    let b = d.fund_deposit(&k.bob, 50 * UNIT).unwrap();
    assert_eq!(d.pool.position(&d.positions, b).unwrap().balance, 50 * UNIT);
    assert_eq!(d.pending_earnings(b).unwrap(), 7 * UNIT);
}
