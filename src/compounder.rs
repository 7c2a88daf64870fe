//! Autocompounder: owns the farm stake, harvests rewards, converts them
//! back into the staked asset and restakes.

use bytemuck::Zeroable;
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::conversion::run_conversions;
use crate::error::VaultError;
use crate::governance::{Governance, Ownable};
use crate::ports::Externals;
use crate::state::{CompounderState, ConversionTable, KIND_COMPOUNDER};

#[derive(Debug, Clone)]
pub struct Autocompounder {
    pub key: Pubkey,
    pub state: CompounderState,
}

impl Ownable for Autocompounder {
    fn governance(&self) -> &Governance {
        &self.state.governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        &mut self.state.governance
    }
}

impl Autocompounder {
    pub fn initialize(
        key: &Pubkey,
        bump: u8,
        governance: &Pubkey,
        adapter: &Pubkey,
        base_asset: &Pubkey,
        chef: &Pubkey,
        pid: u64,
    ) -> Result<Self, ProgramError> {
        for k in [governance, adapter, base_asset, chef] {
            if *k == Pubkey::default() {
                return Err(VaultError::ZeroAddress.into());
            }
        }
        let mut state = CompounderState::zeroed();
        state.kind = KIND_COMPOUNDER;
        state.is_initialized = 1;
        state.bump = bump;
        state.autocompound_enabled = 1;
        state.governance = Governance::new(governance);
        state.adapter = adapter.to_bytes();
        state.base_asset = base_asset.to_bytes();
        state.chef = chef.to_bytes();
        state.pid = pid;
        msg!("Autocompounder initialized on chef {} pid {}", chef, pid);
        Ok(Self { key: *key, state })
    }

    pub fn from_state(key: &Pubkey, state: CompounderState) -> Result<Self, ProgramError> {
        if state.kind != KIND_COMPOUNDER {
            return Err(VaultError::InvalidAccountKind.into());
        }
        if state.is_initialized != 1 {
            return Err(VaultError::NotInitialized.into());
        }
        Ok(Self { key: *key, state })
    }

    fn check_chef(&self, ext: &Externals) -> ProgramResult {
        if ext.farm.address() != self.state.chef_pubkey() {
            msg!("Error: farm {} is not the configured chef", ext.farm.address());
            return Err(VaultError::AccountMismatch.into());
        }
        Ok(())
    }

    fn only_adapter(&self, caller: &Pubkey) -> ProgramResult {
        if *caller != self.state.adapter_pubkey() {
            return Err(VaultError::MustBeAdapter.into());
        }
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Compounding
    // ═══════════════════════════════════════════════════════════════

    /// Harvest and restake the converted rewards. Anyone may call; a no-op while disabled.
    /// Returns the amount restaked.
    pub fn autocompound(&mut self, ext: &mut Externals) -> Result<u64, ProgramError> {
        if self.state.autocompound_enabled == 0 {
            msg!("Autocompound disabled, skipping");
            return Ok(0);
        }
        self.check_chef(ext)?;
        let pid = self.state.pid;

        // A zero deposit harvests pending rewards to us.
        ext.farm.deposit(&mut *ext.tokens, pid, &self.key, 0)?;

        if self.state.conversions.is_configured() {
            run_conversions(&self.state.conversions, &self.key, ext)?;
        }

        let amount = ext.tokens.balance_of(&self.state.base_asset_pubkey(), &self.key)?;
        if amount > 0 {
            ext.farm.deposit(&mut *ext.tokens, pid, &self.key, amount)?;
        }
        msg!("Autocompounded {} into pid {}", amount, pid);
        Ok(amount)
    }

    /// Staked amount, which is what the adapter reports as holdings.
    pub fn get_chef_holdings(&self, ext: &Externals) -> Result<u64, ProgramError> {
        self.check_chef(ext)?;
        ext.farm.user_info(self.state.pid, &self.key)
    }

    // ═══════════════════════════════════════════════════════════════
    // Adapter hooks
    // ═══════════════════════════════════════════════════════════════

    /// Stake `amount` the adapter has just handed over. Adapter only.
    pub fn blend(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64) -> ProgramResult {
        self.only_adapter(caller)?;
        self.check_chef(ext)?;
        if amount == 0 {
            return Ok(());
        }
        let held = ext.tokens.balance_of(&self.state.base_asset_pubkey(), &self.key)?;
        if held < amount {
            return Err(VaultError::InsufficientBalance.into());
        }
        ext.farm.deposit(&mut *ext.tokens, self.state.pid, &self.key, amount)?;
        msg!("Blended {} into pid {}", amount, self.state.pid);
        Ok(())
    }

    /// Unstake `amount` and send it to `to`. Adapter only.
    pub fn spill(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        self.only_adapter(caller)?;
        self.check_chef(ext)?;
        if amount == 0 {
            return Ok(());
        }
        let staked = ext.farm.user_info(self.state.pid, &self.key)?;
        if staked < amount {
            return Err(VaultError::InsufficientBalance.into());
        }
        ext.farm.withdraw(&mut *ext.tokens, self.state.pid, &self.key, amount)?;
        ext.tokens
            .transfer(&self.state.base_asset_pubkey(), &self.key, to, amount)?;
        msg!("Spilled {} from pid {} to {}", amount, self.state.pid, to);
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════════
    // Governance
    // ═══════════════════════════════════════════════════════════════

    /// Replace the conversion table and re-issue approvals for it.
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
        msg!("Autocompounder conversions set ({} steps)", self.state.conversions.len);
        self.approve_all(ext)
    }

    pub fn set_chef(&mut self, caller: &Pubkey, chef: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        if *chef == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        self.state.chef = chef.to_bytes();
        msg!("Autocompounder chef set to {}", chef);
        Ok(())
    }

    pub fn set_adapter(&mut self, caller: &Pubkey, adapter: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        if *adapter == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        self.state.adapter = adapter.to_bytes();
        msg!("Autocompounder adapter set to {}", adapter);
        Ok(())
    }

    pub fn set_autocompound_enabled(&mut self, caller: &Pubkey, enabled: bool) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.autocompound_enabled = enabled as u8;
        msg!("Autocompound enabled = {}", enabled);
        Ok(())
    }

    /// Re-issue maximum approvals to the chef and every configured router.
    pub fn reset_approvals(&mut self, ext: &mut Externals, caller: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        self.approve_all(ext)
    }

    fn approve_all(&self, ext: &mut Externals) -> ProgramResult {
        let base = self.state.base_asset_pubkey();
        ext.tokens.approve(&base, &self.key, &self.state.chef_pubkey(), u64::MAX)?;

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
        msg!("Autocompounder approvals reset");
        Ok(())
    }

    /// Pull `amount` out of the farm into our own balance, skipping
    /// conversions. Takes the farm's emergency path when `amount` covers
    /// the whole stake.
    pub fn emergency_withdraw(&mut self, ext: &mut Externals, caller: &Pubkey, pid: u64, amount: u64) -> Result<u64, ProgramError> {
        self.only_governance(caller)?;
        self.check_chef(ext)?;
        let staked = ext.farm.user_info(pid, &self.key)?;
        let pulled = if amount >= staked {
            ext.farm.emergency_withdraw(&mut *ext.tokens, pid, &self.key)?;
            staked
        } else {
            ext.farm.withdraw(&mut *ext.tokens, pid, &self.key, amount)?;
            amount
        };
        msg!("Emergency withdrew {} from pid {}", pulled, pid);
        Ok(pulled)
    }

    /// Governance rescue of any token held here, base LP included, so stake
    /// pulled by `emergency_withdraw` can be moved out.
    pub fn sweep_erc(&mut self, ext: &mut Externals, caller: &Pubkey, token: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
        self.only_governance(caller)?;
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
