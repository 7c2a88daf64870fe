//! Adapter variants behind `AdapterPort`.
//!
//! `LiveFarm` stakes capital through its autocompounder; `TestDouble`
//! simply holds it.

use bytemuck::Zeroable;
use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::compounder::Autocompounder;
use crate::error::VaultError;
use crate::governance::{Governance, Ownable};
use crate::ports::{AdapterPort, Externals};
use crate::state::{AdapterKind, AdapterState, KIND_ADAPTER};

fn new_state(
    bump: u8,
    kind: AdapterKind,
    governance: &Pubkey,
    pool: &Pubkey,
    base_asset: &Pubkey,
) -> Result<AdapterState, ProgramError> {
    for k in [governance, base_asset] {
        if *k == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
    }
    let mut state = AdapterState::zeroed();
    state.kind = KIND_ADAPTER;
    state.is_initialized = 1;
    state.bump = bump;
    state.adapter_kind = kind as u8;
    state.governance = Governance::new(governance);
    state.pool = pool.to_bytes();
    state.base_asset = base_asset.to_bytes();
    Ok(state)
}

fn only_pool(state: &AdapterState, caller: &Pubkey) -> ProgramResult {
    if state.pool != caller.to_bytes() {
        return Err(VaultError::MustBePool.into());
    }
    Ok(())
}

/// Base asset included: a test double's capital can be rescued this way.
fn sweep(ext: &mut Externals, holder: &Pubkey, token: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
    if *to == Pubkey::default() {
        return Err(VaultError::ZeroAddress.into());
    }
    let amount = ext.tokens.balance_of(token, holder)?;
    if amount > 0 {
        ext.tokens.transfer(token, holder, to, amount)?;
    }
    msg!("Swept {} of {} to {}", amount, token, to);
    Ok(amount)
}

// ═══════════════════════════════════════════════════════════════
// Live farm adapter
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FarmAdapter {
    pub key: Pubkey,
    pub state: AdapterState,
    pub compounder: Autocompounder,
}

impl FarmAdapter {
    pub fn initialize(
        key: &Pubkey,
        bump: u8,
        governance: &Pubkey,
        pool: &Pubkey,
        compounder: Autocompounder,
    ) -> Result<Self, ProgramError> {
        let base = compounder.state.base_asset_pubkey();
        let mut state = new_state(bump, AdapterKind::LiveFarm, governance, pool, &base)?;
        state.compounder = compounder.key.to_bytes();
        msg!("Farm adapter initialized for pool {}", pool);
        Ok(Self { key: *key, state, compounder })
    }

    /// Bind a loaded autocompounder to its adapter state.
    pub fn from_parts(key: &Pubkey, state: AdapterState, compounder: Autocompounder) -> Result<Self, ProgramError> {
        if state.compounder_pubkey() != compounder.key {
            return Err(VaultError::AccountMismatch.into());
        }
        Ok(Self { key: *key, state, compounder })
    }

    /// Swap in a different autocompounder. Capital staked by the old one
    /// must be migrated separately.
    pub fn set_autocompounder(&mut self, caller: &Pubkey, compounder: Autocompounder) -> Result<Autocompounder, ProgramError> {
        self.only_governance(caller)?;
        self.state.compounder = compounder.key.to_bytes();
        msg!("Adapter autocompounder set to {}", compounder.key);
        Ok(std::mem::replace(&mut self.compounder, compounder))
    }

    pub fn set_lp(&mut self, caller: &Pubkey, lp: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        if *lp == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        self.state.base_asset = lp.to_bytes();
        msg!("Adapter LP set to {}", lp);
        Ok(())
    }
}

impl Ownable for FarmAdapter {
    fn governance(&self) -> &Governance {
        &self.state.governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        &mut self.state.governance
    }
}

impl AdapterPort for FarmAdapter {
    fn address(&self) -> Pubkey {
        self.key
    }

    fn deploy_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64) -> ProgramResult {
        only_pool(&self.state, caller)?;
        let base = self.state.base_asset_pubkey();
        let held = ext.tokens.balance_of(&base, &self.key)?;
        if amount > held {
            return Err(VaultError::InsufficientBalance.into());
        }
        let received = ext.tokens.transfer(&base, &self.key, &self.compounder.key, amount)?;
        self.compounder.blend(ext, &self.key, received)?;
        msg!("Deployed {} capital", received);
        Ok(())
    }

    fn return_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        only_pool(&self.state, caller)?;
        self.compounder.spill(ext, &self.key, amount, to)?;
        msg!("Returned {} capital to {}", amount, to);
        Ok(())
    }

    fn get_holdings_view(&self, ext: &Externals) -> Result<u64, ProgramError> {
        self.compounder.get_chef_holdings(ext)
    }

    fn set_pool(&mut self, caller: &Pubkey, pool: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        if *pool == Pubkey::default() {
            return Err(VaultError::ZeroAddress.into());
        }
        self.state.pool = pool.to_bytes();
        msg!("Adapter pool set to {}", pool);
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
// Pass-through test double
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct PassThroughAdapter {
    pub key: Pubkey,
    pub state: AdapterState,
}

impl PassThroughAdapter {
    pub fn initialize(
        key: &Pubkey,
        bump: u8,
        governance: &Pubkey,
        pool: &Pubkey,
        base_asset: &Pubkey,
    ) -> Result<Self, ProgramError> {
        let state = new_state(bump, AdapterKind::TestDouble, governance, pool, base_asset)?;
        msg!("Pass-through adapter initialized for pool {}", pool);
        Ok(Self { key: *key, state })
    }
}

impl Ownable for PassThroughAdapter {
    fn governance(&self) -> &Governance {
        &self.state.governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        &mut self.state.governance
    }
}

impl AdapterPort for PassThroughAdapter {
    fn address(&self) -> Pubkey {
        self.key
    }

    fn deploy_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64) -> ProgramResult {
        only_pool(&self.state, caller)?;
        let held = ext.tokens.balance_of(&self.state.base_asset_pubkey(), &self.key)?;
        if amount > held {
            return Err(VaultError::InsufficientBalance.into());
        }
        Ok(())
    }

    fn return_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        only_pool(&self.state, caller)?;
        let base = self.state.base_asset_pubkey();
        if amount > ext.tokens.balance_of(&base, &self.key)? {
            return Err(VaultError::InsufficientBalance.into());
        }
        ext.tokens.transfer(&base, &self.key, to, amount)?;
        Ok(())
    }

    fn get_holdings_view(&self, ext: &Externals) -> Result<u64, ProgramError> {
        ext.tokens.balance_of(&self.state.base_asset_pubkey(), &self.key)
    }

    /// Accepts the zero key so a test double can be detached.
    fn set_pool(&mut self, caller: &Pubkey, pool: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        self.state.pool = pool.to_bytes();
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub enum Adapter {
    LiveFarm(FarmAdapter),
    TestDouble(PassThroughAdapter),
}

impl Adapter {
    /// Rebuild from stored state. A live-farm adapter needs its
    /// autocompounder loaded alongside.
    pub fn from_state(key: &Pubkey, state: AdapterState, compounder: Option<Autocompounder>) -> Result<Self, ProgramError> {
        if state.kind != KIND_ADAPTER {
            return Err(VaultError::InvalidAccountKind.into());
        }
        if state.is_initialized != 1 {
            return Err(VaultError::NotInitialized.into());
        }
        match state.adapter_kind()? {
            AdapterKind::LiveFarm => {
                let compounder = compounder.ok_or(VaultError::AccountMismatch)?;
                Ok(Adapter::LiveFarm(FarmAdapter::from_parts(key, state, compounder)?))
            }
            AdapterKind::TestDouble => Ok(Adapter::TestDouble(PassThroughAdapter { key: *key, state })),
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Adapter::LiveFarm(_) => AdapterKind::LiveFarm,
            Adapter::TestDouble(_) => AdapterKind::TestDouble,
        }
    }

    pub fn state(&self) -> &AdapterState {
        match self {
            Adapter::LiveFarm(a) => &a.state,
            Adapter::TestDouble(a) => &a.state,
        }
    }

    pub fn compounder(&self) -> Option<&Autocompounder> {
        match self {
            Adapter::LiveFarm(a) => Some(&a.compounder),
            Adapter::TestDouble(_) => None,
        }
    }

    pub fn compounder_mut(&mut self) -> Option<&mut Autocompounder> {
        match self {
            Adapter::LiveFarm(a) => Some(&mut a.compounder),
            Adapter::TestDouble(_) => None,
        }
    }

    pub fn sweep_erc(&mut self, ext: &mut Externals, caller: &Pubkey, token: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
        self.only_governance(caller)?;
        let key = self.address();
        sweep(ext, &key, token, to)
    }
}

impl Ownable for Adapter {
    fn governance(&self) -> &Governance {
        &self.state().governance
    }

    fn governance_mut(&mut self) -> &mut Governance {
        match self {
            Adapter::LiveFarm(a) => &mut a.state.governance,
            Adapter::TestDouble(a) => &mut a.state.governance,
        }
    }
}

impl AdapterPort for Adapter {
    fn address(&self) -> Pubkey {
        match self {
            Adapter::LiveFarm(a) => a.address(),
            Adapter::TestDouble(a) => a.address(),
        }
    }

    fn deploy_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64) -> ProgramResult {
        match self {
            Adapter::LiveFarm(a) => a.deploy_capital(ext, caller, amount),
            Adapter::TestDouble(a) => a.deploy_capital(ext, caller, amount),
        }
    }

    fn return_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult {
        match self {
            Adapter::LiveFarm(a) => a.return_capital(ext, caller, amount, to),
            Adapter::TestDouble(a) => a.return_capital(ext, caller, amount, to),
        }
    }

    fn get_holdings_view(&self, ext: &Externals) -> Result<u64, ProgramError> {
        match self {
            Adapter::LiveFarm(a) => a.get_holdings_view(ext),
            Adapter::TestDouble(a) => a.get_holdings_view(ext),
        }
    }

    fn set_pool(&mut self, caller: &Pubkey, pool: &Pubkey) -> ProgramResult {
        match self {
            Adapter::LiveFarm(a) => a.set_pool(caller, pool),
            Adapter::TestDouble(a) => a.set_pool(caller, pool),
        }
    }
}
