//! Insurance fund: a second ledger in the insurance asset. Insurance
//! depositors hold time-locked positions; the pool's accrued fees are
//! converted into the insurance asset and shared pro rata.

use bytemuck::Zeroable;
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::conversion::run_conversions;
use crate::error::VaultError;
use crate::governance::{Governance, Ownable};
use crate::math;
use crate::pool::SharePool;
use crate::ports::{AdapterPort, Externals, PositionStore};
use crate::position;
use crate::state::{ConversionTable, FundState, PositionRecord, Tranche, DEFAULT_TREASURY_FEE_BPS, KIND_FUND};

#[derive(Debug, Clone)]
pub struct InsuranceFund {
    pub key: Pubkey,
    pub state: FundState,
}

impl Ownable for InsuranceFund {
    fn governance(&self) -> &Governance {
        &self.state.governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        &mut self.state.governance
    }
}

impl InsuranceFund {
    pub fn initialize(
        key: &Pubkey,
        bump: u8,
        governance: &Pubkey,
        pool: &Pubkey,
        insurance_asset: &Pubkey,
        base_asset: &Pubkey,
    ) -> Result<Self, ProgramError> {
        for k in [governance, pool, insurance_asset, base_asset] {
            if *k == Pubkey::default() {
                return Err(VaultError::ZeroAddress.into());
            }
        }
        let mut state = FundState::zeroed();
        state.kind = KIND_FUND;
        state.is_initialized = 1;
        state.bump = bump;
        state.governance = Governance::new(governance);
        state.pool = pool.to_bytes();
        state.insurance_asset = insurance_asset.to_bytes();
        state.base_asset = base_asset.to_bytes();
        state.treasury_fee_bps = DEFAULT_TREASURY_FEE_BPS;
        msg!("Insurance fund initialized for pool {}", pool);
        Ok(Self { key: *key, state })
    }

    pub fn from_state(key: &Pubkey, state: FundState) -> Result<Self, ProgramError> {
        if state.kind != KIND_FUND {
            return Err(VaultError::InvalidAccountKind.into());
        }
        if state.is_initialized != 1 {
            return Err(VaultError::NotInitialized.into());
        }
        Ok(Self { key: *key, state })
    }

    fn check_pool(&self, pool: &SharePool) -> ProgramResult {
        if pool.key != self.state.pool_pubkey() {
            return Err(VaultError::AccountMismatch.into());
        }
        Ok(())
    }

    /// Insurance asset held by the fund.
    pub fn holdings(&self, ext: &Externals) -> Result<u64, ProgramError> {
        ext.tokens.balance_of(&self.state.insurance_asset_pubkey(), &self.key)
    }

    // ═══════════════════════════════════════════════════════════════
    // Deposits
    // ═══════════════════════════════════════════════════════════════

    /// Deposit insurance asset, receive a new insurance position.
    pub fn deposit(
        &mut self,
        pool: &mut SharePool,
        positions: &mut dyn PositionStore,
        ext: &mut Externals,
        caller: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        self.check_pool(pool)?;
        if amount == 0 {
            return Err(VaultError::ZeroAmount.into());
        }
        if pool.state.is_shut_down() {
            return Err(VaultError::PoolShutDown.into());
        }
        if pool.state.deposits_are_disabled() {
            return Err(VaultError::DepositsDisabled.into());
        }

        let holdings = self.holdings(ext)?;
        let received = ext
            .tokens
            .transfer(&self.state.insurance_asset_pubkey(), caller, &self.key, amount)?;
        let units = math::lp_for_deposit(self.state.total_supply_lp, holdings, received)
            .ok_or(VaultError::MathOverflow)?;
        if units == 0 {
            return Err(VaultError::ZeroAmount.into());
        }

        let id = pool.mint_insurance_position(positions, &self.key, caller, received, units)?;
        self.state.total_principal = self
            .state
            .total_principal
            .checked_add(received)
            .ok_or(VaultError::MathOverflow)?;
        self.state.total_supply_lp = self
            .state
            .total_supply_lp
            .checked_add(units)
            .ok_or(VaultError::MathOverflow)?;

        msg!("FundsDeposited: {} insurance asset, {} units, position {}, owner {}", received, units, id, caller);
        Ok(id)
    }

    // ═══════════════════════════════════════════════════════════════
    // Earnings
    // ═══════════════════════════════════════════════════════════════

    /// Pull pool fees, forward the treasury cut, convert the rest into the
    /// insurance asset. Anyone may call; a no-op until conversions are set.
    /// Returns the insurance asset gained.
    pub fn update(
        &mut self,
        pool: &mut SharePool,
        adapter: &mut dyn AdapterPort,
        ext: &mut Externals,
    ) -> Result<u64, ProgramError> {
        self.check_pool(pool)?;
        if !self.state.conversions.is_configured() {
            msg!("Fund conversions not set, skipping update");
            return Ok(0);
        }

        let before = self.holdings(ext)?;
        let fund_key = self.key;
        let fees = pool.withdraw_fees(adapter, ext, &fund_key, &fund_key)?;

        if let Some(treasury) = self.state.treasury_pubkey() {
            let cut = math::bps_of(fees, self.state.treasury_fee_bps).ok_or(VaultError::MathOverflow)?;
            if cut > 0 {
                ext.tokens
                    .transfer(&self.state.base_asset_pubkey(), &fund_key, &treasury, cut)?;
                msg!("Treasury cut {} to {}", cut, treasury);
            }
        }

        run_conversions(&self.state.conversions, &fund_key, ext)?;

        let gained = self.holdings(ext)?.saturating_sub(before);
        msg!("Fund updated: {} fees converted into {} insurance asset", fees, gained);
        Ok(gained)
    }

    fn insurance_position(
        &self,
        pool: &SharePool,
        positions: &dyn PositionStore,
        id: u64,
    ) -> Result<PositionRecord, ProgramError> {
        let record = pool.position(positions, id)?;
        if record.tranche()? != Tranche::Insurance {
            return Err(VaultError::MustBeInsuranceNft.into());
        }
        Ok(record)
    }

    /// Current entitlement of position `id`.
    pub fn entitlement(
        &self,
        pool: &SharePool,
        positions: &dyn PositionStore,
        ext: &Externals,
        id: u64,
    ) -> Result<u64, ProgramError> {
        let record = self.insurance_position(pool, positions, id)?;
        math::redemption_amount(record.balance, self.state.total_supply_lp, self.holdings(ext)?, record.principal)
            .ok_or_else(|| VaultError::MathOverflow.into())
    }

    /// Entitlement above principal.
    pub fn pending_earnings(
        &self,
        pool: &SharePool,
        positions: &dyn PositionStore,
        ext: &Externals,
        id: u64,
    ) -> Result<u64, ProgramError> {
        let record = self.insurance_position(pool, positions, id)?;
        let entitlement = self.entitlement(pool, positions, ext, id)?;
        Ok(math::earnings(entitlement, record.principal))
    }

    // ═══════════════════════════════════════════════════════════════
    // Redemption
    // ═══════════════════════════════════════════════════════════════

    fn redeemable_position(
        &self,
        pool: &SharePool,
        positions: &dyn PositionStore,
        caller: &Pubkey,
        id: u64,
        now: i64,
    ) -> Result<PositionRecord, ProgramError> {
        self.check_pool(pool)?;
        let record = self.insurance_position(pool, positions, id)?;
        if record.owner != caller.to_bytes() {
            return Err(VaultError::MustBeOwner.into());
        }
        if pool.state.is_shut_down() {
            return Err(VaultError::RemovalPaused.into());
        }
        position::ensure_redeemable(&record, now)?;
        Ok(record)
    }

    fn release(
        &mut self,
        pool: &SharePool,
        positions: &mut dyn PositionStore,
        ext: &mut Externals,
        record: &PositionRecord,
        amount: u64,
    ) -> ProgramResult {
        pool.burn_position(positions, &self.key, record.id)?;
        self.state.total_supply_lp = self
            .state
            .total_supply_lp
            .checked_sub(record.balance)
            .ok_or(VaultError::MathUnderflow)?;
        self.state.total_principal = self
            .state
            .total_principal
            .checked_sub(record.principal)
            .ok_or(VaultError::MathUnderflow)?;
        if amount > 0 {
            let asset = self.state.insurance_asset_pubkey();
            if amount > ext.tokens.balance_of(&asset, &self.key)? {
                return Err(VaultError::InsufficientBalance.into());
            }
            ext.tokens.transfer(&asset, &self.key, &record.owner_pubkey(), amount)?;
        }
        Ok(())
    }

    /// Redeem an unlocked insurance position for its pro-rata share.
    pub fn withdraw(
        &mut self,
        pool: &SharePool,
        positions: &mut dyn PositionStore,
        ext: &mut Externals,
        caller: &Pubkey,
        id: u64,
        now: i64,
    ) -> Result<u64, ProgramError> {
        let record = self.redeemable_position(pool, &*positions, caller, id, now)?;
        let amount = math::redemption_amount(
            record.balance,
            self.state.total_supply_lp,
            self.holdings(ext)?,
            record.principal,
        )
        .ok_or(VaultError::MathOverflow)?;
        self.release(pool, positions, ext, &record, amount)?;

        msg!(
            "FundsWithdrawn: tranche {}, principal {}, earnings {}, position {}, owner {}, caller {}",
            record.tranche,
            record.principal,
            math::earnings(amount, record.principal),
            id,
            record.owner_pubkey(),
            caller
        );
        Ok(amount)
    }

    /// Redeem an unlocked insurance position for exactly its principal,
    /// leaving any earnings to the remaining holders. The unlock delay
    /// still applies.
    pub fn emergency_withdraw(
        &mut self,
        pool: &SharePool,
        positions: &mut dyn PositionStore,
        ext: &mut Externals,
        caller: &Pubkey,
        id: u64,
        now: i64,
    ) -> Result<u64, ProgramError> {
        let record = self.redeemable_position(pool, &*positions, caller, id, now)?;
        self.release(pool, positions, ext, &record, record.principal)?;
        msg!("Emergency withdrew principal {} of position {} to {}", record.principal, id, caller);
        Ok(record.principal)
    }

    // ═══════════════════════════════════════════════════════════════
    // Governance
    // ═══════════════════════════════════════════════════════════════

    /// Replace the conversion table and approve its routers.
    #[allow(clippy::too_many_arguments)]
    pub fn init_conversions(
        &mut self,
        ext: &mut Externals,
        caller: &Pubkey,
        routers: &[Pubkey],
        tokens_from: &[Pubkey],
        tokens_to: &[Pubkey],
        percentages: &[u8],
        operations: &[u8],
    ) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.conversions = ConversionTable::build(routers, tokens_from, tokens_to, percentages, operations)?;
        msg!("Fund conversions set ({} steps)", self.state.conversions.len);
        self.approve_routers(ext)
    }

    /// Grant every configured router a maximum allowance over the tokens
    /// the fund converts.
    fn approve_routers(&self, ext: &mut Externals) -> ProgramResult {
        for c in self.state.conversions.entries() {
            ext.tokens.approve(&c.token_from, &self.key, &c.router, u64::MAX)?;
            ext.tokens.approve(&c.token_to, &self.key, &c.router, u64::MAX)?;
            let pair = ext
                .routers
                .router_mut(&c.router)
                .and_then(|r| r.pair_for(&c.token_from, &c.token_to));
            if let Some(pair) = pair {
                ext.tokens.approve(&pair, &self.key, &c.router, u64::MAX)?;
            }
        }
        Ok(())
    }

    pub fn set_pool(&mut self, caller: &Pubkey, pool: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        if *pool == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        self.state.pool = pool.to_bytes();
        msg!("Fund pool set to {}", pool);
        Ok(())
    }

    /// Zero key disables the treasury cut.
    pub fn set_treasury(&mut self, caller: &Pubkey, treasury: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.treasury = treasury.to_bytes();
        msg!("Fund treasury set to {}", treasury);
        Ok(())
    }

    pub fn set_treasury_fee(&mut self, caller: &Pubkey, bps: u64) -> ProgramResult {
        self.only_governance(caller)?;
        if bps > math::BPS_DENOMINATOR {
            return Err(VaultError::BadPercentage.into());
        }
        self.state.treasury_fee_bps = bps;
        msg!("Fund treasury fee set to {} bps", bps);
        Ok(())
    }

    pub fn sweep_erc(&mut self, ext: &mut Externals, caller: &Pubkey, token: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
        self.only_governance(caller)?;
        if *token == self.state.insurance_asset_pubkey() {
            return Err(VaultError::ProtectedToken.into());
        }
        if *to == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        let amount = ext.tokens.balance_of(token, &self.key)?;
        if amount > 0 {
            ext.tokens.transfer(token, &self.key, to, amount)?;
        }
        msg!("Swept {} of {} to {}", amount, token, to);
        Ok(amount)
    }
}
