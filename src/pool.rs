//! Share ledger: exchange-rate accounting for senior depositors, fee
//! accrual, circuit breakers, and the writer side of the position registry.

use bytemuck::Zeroable;
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;
use crate::governance::{Governance, Ownable};
use crate::math;
use crate::ports::{AdapterPort, Externals, PositionStore};
use crate::position;
use crate::state::{
    PoolState, PositionRecord, Tranche, DEFAULT_FEE_RATE_BPS, DEFAULT_UNFREEZE_DELAY, KIND_POOL,
    SELECTOR_FEES_HOLDINGS, SELECTOR_SENIOR_RATE,
};

#[derive(Debug, Clone)]
pub struct SharePool {
    pub key: Pubkey,
    pub state: PoolState,
}

impl Ownable for SharePool {
    fn governance(&self) -> &Governance {
        &self.state.governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        &mut self.state.governance
    }
}

fn non_zero(key: &Pubkey) -> ProgramResult {
    if *key == Pubkey::default() {
        return Err(VaultError::ZeroAddress.into());
    }
    Ok(())
}

impl SharePool {
    /// New pool. Starts shut down with deposits disabled; governance opens it.
    pub fn initialize(
        key: &Pubkey,
        bump: u8,
        governance: &Pubkey,
        base_asset: &Pubkey,
        share_mint: &Pubkey,
        adapter: &Pubkey,
    ) -> Result<Self, ProgramError> {
        for k in [governance, base_asset, share_mint, adapter] {
            non_zero(k)?;
        }
        let mut state = PoolState::zeroed();
        state.kind = KIND_POOL;
        state.is_initialized = 1;
        state.bump = bump;
        state.shut_down = 1;
        state.deposits_disabled = 1;
        state.governance = Governance::new(governance);
        state.base_asset = base_asset.to_bytes();
        state.share_mint = share_mint.to_bytes();
        state.adapter = adapter.to_bytes();
        state.next_position_id = 1;
        state.unfreeze_delay = DEFAULT_UNFREEZE_DELAY;
        state.fee_rate_bps = DEFAULT_FEE_RATE_BPS;
        state.set_exchange_rate(math::INITIAL_EXCHANGE_RATE);

        msg!("Pool initialized for base asset {} (shut down, deposits disabled)", base_asset);
        Ok(Self { key: *key, state })
    }

    pub fn from_state(key: &Pubkey, state: PoolState) -> Result<Self, ProgramError> {
        if state.kind != KIND_POOL {
            return Err(VaultError::InvalidAccountKind.into());
        }
        if state.is_initialized != 1 {
            return Err(VaultError::NotInitialized.into());
        }
        Ok(Self { key: *key, state })
    }

    fn check_adapter(&self, adapter: &dyn AdapterPort) -> ProgramResult {
        if adapter.address() != self.state.adapter_pubkey() {
            msg!("Error: adapter {} is not the pool adapter", adapter.address());
            return Err(VaultError::AccountMismatch.into());
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Senior shares
    // ═══════════════════════════════════════════════════════════════

    /// Deposit base asset, mint shares at the pre-deposit rate.
    pub fn deposit(
        &mut self,
        adapter: &mut dyn AdapterPort,
        ext: &mut Externals,
        caller: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        if self.state.deposits_are_disabled() {
            return Err(VaultError::DepositsDisabled.into());
        }
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        if self.state.is_shut_down() {
            return Err(VaultError::PoolShutDown.into());
        }

        let rate = self.update_exchange_rate(&*adapter, &*ext)?;
        let adapter_key = adapter.address();
        let received = ext
            .tokens
            .transfer(&self.state.base_asset_pubkey(), caller, &adapter_key, amount)?;
        let shares = math::shares_for_deposit(received, rate).ok_or(VaultError::MathOverflow)?;
        if shares == 0 {
            return Err(VaultError::ZeroAmount.into());
        }

        adapter.deploy_capital(ext, &self.key, received)?;
        ext.tokens
            .mint_to(&self.state.share_mint_pubkey(), &self.key, caller, shares)?;

        self.state.total_shares = self
            .state
            .total_shares
            .checked_add(shares)
            .ok_or(VaultError::MathOverflow)?;

        msg!("Deposited {} base, minted {} shares at rate {}", received, shares, rate);
        Ok(shares)
    }

    /// Burn shares, pay out their base-asset value.
    pub fn withdraw(
        &mut self,
        adapter: &mut dyn AdapterPort,
        ext: &mut Externals,
        caller: &Pubkey,
        shares: u64,
    ) -> Result<u64, ProgramError> {
        if self.state.is_shut_down() {
            return Err(VaultError::RemovalPaused.into());
        }
        if shares == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        let share_mint = self.state.share_mint_pubkey();
        if ext.tokens.balance_of(&share_mint, caller)? < shares {
            return Err(VaultError::InsufficientShares.into());
        }

        let rate = self.update_exchange_rate(&*adapter, &*ext)?;
        let amount = math::base_for_shares(shares, rate).ok_or(VaultError::MathOverflow)?;

        ext.tokens.burn(&share_mint, &self.key, caller, shares)?;
        self.state.total_shares = self
            .state
            .total_shares
            .checked_sub(shares)
            .ok_or(VaultError::MathUnderflow)?;

        if amount > 0 {
            adapter.return_capital(ext, &self.key, amount, caller)?;
        }

        msg!("FundsWithdrawn: {} shares, {} base, rate {}, owner {}", shares, amount, rate, caller);
        Ok(amount)
    }

    /// Fold adapter holdings into the rate. Callable by anyone.
    pub fn update_exchange_rate(&mut self, adapter: &dyn AdapterPort, ext: &Externals) -> Result<u128, ProgramError> {
        self.check_adapter(adapter)?;
        let holdings = adapter.get_holdings_view(ext)?;
        let accrual = math::accrue(
            holdings,
            self.state.total_shares,
            self.state.exchange_rate(),
            self.state.fees_holdings,
            self.state.fee_rate_bps,
        )
        .ok_or(VaultError::MathOverflow)?;

        if accrual.senior_yield > 0 || accrual.fee_yield > 0 {
            msg!(
                "ExchangeRateUpdated: rate {}, +{} senior, +{} fees",
                accrual.exchange_rate,
                accrual.senior_yield,
                accrual.fee_yield
            );
        }
        self.state.set_exchange_rate(accrual.exchange_rate);
        self.state.fees_holdings = accrual.fees_holdings;
        Ok(accrual.exchange_rate)
    }

    /// Base-asset value of `shares` at the stored rate.
    pub fn shares_value(&self, shares: u64) -> Option<u64> {
        math::base_for_shares(shares, self.state.exchange_rate())
    }

    // ═══════════════════════════════════════════════════════════════
    // Fees
    // ═══════════════════════════════════════════════════════════════

    /// Pay `fees_holdings` to `to` and zero it. Governance or fee manager.
    pub fn withdraw_fees(
        &mut self,
        adapter: &mut dyn AdapterPort,
        ext: &mut Externals,
        caller: &Pubkey,
        to: &Pubkey,
    ) -> Result<u64, ProgramError> {
        if !self.state.governance.is_governance(caller) && *caller != self.state.fee_manager_pubkey() {
            return Err(VaultError::WithdrawUnauthorized.into());
        }
        non_zero(to)?;

        self.update_exchange_rate(&*adapter, &*ext)?;
        let fees = self.state.fees_holdings;
        self.state.fees_holdings = 0;
        if fees > 0 {
            adapter.return_capital(ext, &self.key, fees, to)?;
        }

        msg!("FeesWithdrawn: {} base to {} by {}", fees, to, caller);
        Ok(fees)
    }

    // ═══════════════════════════════════════════════════════════════
    // Governance
    // ═══════════════════════════════════════════════════════════════

    /// Emergency override of the senior rate (selector 0) or
    /// `fees_holdings` (selector 2). Only while shut down.
    pub fn set_exchange_rate(&mut self, caller: &Pubkey, selector: u8, value: u128) -> ProgramResult {
        self.only_governance(caller)?;
        if !self.state.is_shut_down() {
            return Err(VaultError::PoolMustBeShutDown.into());
        }
        match selector {
            SELECTOR_SENIOR_RATE => {
                if value == 0 {
                    return Err(VaultError::ZeroAmount.into());
                }
                self.state.set_exchange_rate(value);
                msg!("Senior exchange rate set to {}", value);
            }
            SELECTOR_FEES_HOLDINGS => {
                self.state.fees_holdings = u64::try_from(value).map_err(|_| VaultError::MathOverflow)?;
                msg!("Fees holdings set to {}", value);
            }
            _ => return Err(VaultError::InvalidTranche.into()),
        }
        Ok(())
    }

    pub fn shut_down_pool(&mut self, caller: &Pubkey, shut_down: bool) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.shut_down = shut_down as u8;
        msg!("Pool shut_down = {}", shut_down);
        Ok(())
    }

    pub fn disable_deposits(&mut self, caller: &Pubkey, disabled: bool) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.deposits_disabled = disabled as u8;
        msg!("Pool deposits_disabled = {}", disabled);
        Ok(())
    }

    /// Rebind the adapter. Call `update_exchange_rate` after migrating capital.
    pub fn set_adapter(&mut self, caller: &Pubkey, adapter: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        non_zero(adapter)?;
        self.state.adapter = adapter.to_bytes();
        msg!("Pool adapter set to {}", adapter);
        Ok(())
    }

    pub fn set_fee_manager(&mut self, caller: &Pubkey, fee_manager: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        non_zero(fee_manager)?;
        self.state.fee_manager = fee_manager.to_bytes();
        msg!("Pool fee manager set to {}", fee_manager);
        Ok(())
    }

    pub fn set_fee_rate(&mut self, caller: &Pubkey, fee_rate_bps: u64) -> ProgramResult {
        self.only_governance(caller)?;
        if fee_rate_bps > math::BPS_DENOMINATOR {
            return Err(VaultError::BadPercentage.into());
        }
        self.state.fee_rate_bps = fee_rate_bps;
        msg!("Pool fee rate set to {} bps", fee_rate_bps);
        Ok(())
    }

    pub fn set_unfreeze_delay(&mut self, caller: &Pubkey, seconds: u64) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.unfreeze_delay = i64::try_from(seconds).map_err(|_| VaultError::MathOverflow)?;
        msg!("Unfreeze delay set to {}s", seconds);
        Ok(())
    }

    /// Rescue a stray token held by the pool key.
    pub fn sweep_erc(&mut self, ext: &mut Externals, caller: &Pubkey, token: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
        self.only_governance(caller)?;
        if *token == self.state.base_asset_pubkey() || *token == self.state.share_mint_pubkey() {
            return Err(VaultError::ProtectedToken.into());
        }
        non_zero(to)?;
        let amount = ext.tokens.balance_of(token, &self.key)?;
        if amount > 0 {
            ext.tokens.transfer(token, &self.key, to, amount)?;
        }
        msg!("Swept {} of {} to {}", amount, token, to);
        Ok(amount)
    }

    // ═══════════════════════════════════════════════════════════════
    // Positions
    // ═══════════════════════════════════════════════════════════════

    fn load_position(&self, positions: &dyn PositionStore, id: u64) -> Result<PositionRecord, ProgramError> {
        match positions.get(id)? {
            Some(record) if record.pool == self.key.to_bytes() => Ok(record),
            _ => Err(VaultError::PositionNotFound.into()),
        }
    }

    /// Start the unlock delay of a position. Owner only.
    pub fn begin_unfreeze(
        &mut self,
        positions: &mut dyn PositionStore,
        caller: &Pubkey,
        id: u64,
        now: i64,
    ) -> Result<i64, ProgramError> {
        let mut record = self.load_position(&*positions, id)?;
        let expiration = position::begin_unfreeze(&mut record, caller, now, self.state.unfreeze_delay)?;
        positions.update(&self.key, record)?;
        msg!("Position {} unfreezing, redeemable at {}", id, expiration);
        Ok(expiration)
    }

    pub fn transfer_position(
        &mut self,
        positions: &mut dyn PositionStore,
        caller: &Pubkey,
        id: u64,
        to: &Pubkey,
    ) -> ProgramResult {
        let mut record = self.load_position(&*positions, id)?;
        if record.owner != caller.to_bytes() {
            return Err(VaultError::MustBeOwner.into());
        }
        non_zero(to)?;
        record.owner = to.to_bytes();
        positions.update(&self.key, record)
    }

    /// Mint an insurance position on the fee manager's behalf.
    pub fn mint_insurance_position(
        &mut self,
        positions: &mut dyn PositionStore,
        minter: &Pubkey,
        owner: &Pubkey,
        principal: u64,
        balance: u64,
    ) -> Result<u64, ProgramError> {
        if *minter != self.state.fee_manager_pubkey() {
            return Err(VaultError::MustBeFeeManager.into());
        }
        let id = self.state.next_position_id;
        self.state.next_position_id = id.checked_add(1).ok_or(VaultError::MathOverflow)?;
        let record = PositionRecord::new(&self.key, owner, id, Tranche::Insurance, principal, balance);
        positions.mint(&self.key, record)?;
        Ok(id)
    }

    /// Burn a position on the fee manager's behalf.
    pub fn burn_position(
        &self,
        positions: &mut dyn PositionStore,
        burner: &Pubkey,
        id: u64,
    ) -> Result<PositionRecord, ProgramError> {
        if *burner != self.state.fee_manager_pubkey() {
            return Err(VaultError::MustBeFeeManager.into());
        }
        self.load_position(&*positions, id)?;
        positions.burn(&self.key, id)
    }

    pub fn position(&self, positions: &dyn PositionStore, id: u64) -> Result<PositionRecord, ProgramError> {
        self.load_position(positions, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    fn pool() -> SharePool {
        SharePool::initialize(&key(10), 255, &key(1), &key(2), &key(3), &key(4)).unwrap()
    }

    #[test]
    fn test_initialize_defaults() {
        let p = pool();
        assert!(p.state.is_shut_down());
        assert!(p.state.deposits_are_disabled());
        assert_eq!(p.state.exchange_rate(), math::INITIAL_EXCHANGE_RATE);
        assert_eq!(p.state.next_position_id, 1);
        assert_eq!(p.state.unfreeze_delay, DEFAULT_UNFREEZE_DELAY);
        assert_eq!(p.state.fee_rate_bps, DEFAULT_FEE_RATE_BPS);
    }

    #[test]
    fn test_initialize_rejects_zero_keys() {
        let r = SharePool::initialize(&key(10), 255, &key(1), &Pubkey::default(), &key(3), &key(4));
        assert_eq!(r.err(), Some(VaultError::ZeroAddress.into()));
    }

    #[test]
    fn test_set_exchange_rate_requires_shutdown() {
        let mut p = pool();
        p.shut_down_pool(&key(1), false).unwrap();
        assert_eq!(
            p.set_exchange_rate(&key(1), SELECTOR_SENIOR_RATE, 5),
            Err(VaultError::PoolMustBeShutDown.into())
        );
        p.shut_down_pool(&key(1), true).unwrap();
        p.set_exchange_rate(&key(1), SELECTOR_SENIOR_RATE, 5).unwrap();
        assert_eq!(p.state.exchange_rate(), 5);
        p.set_exchange_rate(&key(1), SELECTOR_FEES_HOLDINGS, 77).unwrap();
        assert_eq!(p.state.fees_holdings, 77);
        assert_eq!(p.set_exchange_rate(&key(1), 1, 5), Err(VaultError::InvalidTranche.into()));
    }

    #[test]
    fn test_set_exchange_rate_governance_only() {
        let mut p = pool();
        assert_eq!(
            p.set_exchange_rate(&key(9), SELECTOR_SENIOR_RATE, 5),
            Err(VaultError::MustBeGovernance.into())
        );
    }

    #[test]
    fn test_toggles_are_independent() {
        let mut p = pool();
        p.shut_down_pool(&key(1), false).unwrap();
        assert!(!p.state.is_shut_down());
        assert!(p.state.deposits_are_disabled());
        p.disable_deposits(&key(1), false).unwrap();
        assert!(!p.state.deposits_are_disabled());
        assert_eq!(p.shut_down_pool(&key(9), true), Err(VaultError::MustBeGovernance.into()));
    }

    #[test]
    fn test_fee_rate_bounds() {
        let mut p = pool();
        p.set_fee_rate(&key(1), 10_000).unwrap();
        assert_eq!(p.set_fee_rate(&key(1), 10_001), Err(VaultError::BadPercentage.into()));
    }

    #[test]
    fn test_setters_reject_zero_address() {
        let mut p = pool();
        assert_eq!(p.set_adapter(&key(1), &Pubkey::default()), Err(VaultError::ZeroAddress.into()));
        assert_eq!(p.set_fee_manager(&key(1), &Pubkey::default()), Err(VaultError::ZeroAddress.into()));
    }
}
