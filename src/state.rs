use bytemuck::{Pod, Zeroable};
use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;
use crate::governance::Governance;

// ═══════════════════════════════════════════════════════════════
// Account kinds, seeds, defaults
// ═══════════════════════════════════════════════════════════════

pub const KIND_POOL: u8 = 1;
pub const KIND_POSITION: u8 = 2;
pub const KIND_FUND: u8 = 3;
pub const KIND_COMPOUNDER: u8 = 4;
pub const KIND_ADAPTER: u8 = 5;

pub const POOL_SEED: &[u8] = b"pool";
pub const FUND_SEED: &[u8] = b"fund";
pub const COMPOUNDER_SEED: &[u8] = b"compounder";
pub const ADAPTER_SEED: &[u8] = b"adapter";
pub const POSITION_SEED: &[u8] = b"position";
pub const VAULT_SEED: &[u8] = b"vault";

/// Seconds between `begin_unfreeze` and redeemability (7 days).
pub const DEFAULT_UNFREEZE_DELAY: i64 = 604_800;

/// Share of harvested yield routed to `fees_holdings`.
pub const DEFAULT_FEE_RATE_BPS: u64 = 1_000;

/// Share of withdrawn fees forwarded to the treasury by the insurance fund.
pub const DEFAULT_TREASURY_FEE_BPS: u64 = 1_000;

/// Conversion steps a single table can hold.
pub const MAX_CONVERSIONS: usize = 8;

/// `set_exchange_rate` selector for the senior rate.
pub const SELECTOR_SENIOR_RATE: u8 = 0;
/// `set_exchange_rate` selector for `fees_holdings`.
pub const SELECTOR_FEES_HOLDINGS: u8 = 2;

/// Position tranche. `Junior` is reserved and never issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tranche {
    Senior = 0,
    Junior = 1,
    Insurance = 2,
}

impl TryFrom<u8> for Tranche {
    type Error = ProgramError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Tranche::Senior),
            1 => Ok(Tranche::Junior),
            2 => Ok(Tranche::Insurance),
            _ => Err(VaultError::InvalidTranche.into()),
        }
    }
}

/// Which adapter implementation an adapter account runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdapterKind {
    LiveFarm = 0,
    TestDouble = 1,
}

impl TryFrom<u8> for AdapterKind {
    type Error = ProgramError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(AdapterKind::LiveFarm),
            1 => Ok(AdapterKind::TestDouble),
            _ => Err(VaultError::InvalidAccountKind.into()),
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Pool (share ledger)
// ═══════════════════════════════════════════════════════════════

/// Share ledger state, one per base asset.
/// PDA seeds: [b"pool", base_asset_mint]
///
/// The pool PDA is mint authority of the share mint and the only writer of
/// position records.
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct PoolState {
    /// Account discriminator (KIND_POOL)
    pub kind: u8,
    pub is_initialized: u8,
    pub bump: u8,
    /// 1 = withdrawals paused, emergency setters unlocked
    pub shut_down: u8,
    /// 1 = deposits rejected
    pub deposits_disabled: u8,
    pub _padding: [u8; 3],

    pub governance: Governance,

    /// Deposited asset (an LP token of the farmed pair)
    pub base_asset: [u8; 32],

    /// Fungible share mint (authority = pool PDA)
    pub share_mint: [u8; 32],

    /// Adapter account holding deployed capital
    pub adapter: [u8; 32],

    /// May pull fees and mint insurance positions (normally the insurance fund)
    pub fee_manager: [u8; 32],

    /// Shares outstanding
    pub total_shares: u64,

    /// Undistributed fee accrual, in base-asset units
    pub fees_holdings: u64,

    /// Id handed to the next minted position (ids start at 1)
    pub next_position_id: u64,

    /// Seconds from `begin_unfreeze` to redeemability
    pub unfreeze_delay: i64,

    /// Share of yield routed to `fees_holdings`, in bps
    pub fee_rate_bps: u64,

    /// Base units per share scaled by RATE_SCALE, little-endian u128
    pub exchange_rate: [u8; 16],

    /// Reserved for future use
    pub _reserved: [u8; 64],
}

/// Size of PoolState in bytes
pub const POOL_STATE_SIZE: usize = core::mem::size_of::<PoolState>();

impl PoolState {
    pub fn governance_pubkey(&self) -> Pubkey {
        self.governance.governance_pubkey()
    }

    pub fn base_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_asset)
    }

    pub fn share_mint_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.share_mint)
    }

    pub fn adapter_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.adapter)
    }

    pub fn fee_manager_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.fee_manager)
    }

    pub fn exchange_rate(&self) -> u128 {
        u128::from_le_bytes(self.exchange_rate)
    }

    pub fn set_exchange_rate(&mut self, rate: u128) {
        self.exchange_rate = rate.to_le_bytes();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down != 0
    }

    pub fn deposits_are_disabled(&self) -> bool {
        self.deposits_disabled != 0
    }
}

// ═══════════════════════════════════════════════════════════════
// Position records (non-fungible)
// ═══════════════════════════════════════════════════════════════

/// One non-fungible position.
/// PDA seeds: [b"position", pool, id_le_bytes]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct PositionRecord {
    pub kind: u8,
    pub is_initialized: u8,
    pub bump: u8,
    /// Tranche as u8 (see `Tranche`)
    pub tranche: u8,
    pub _padding: [u8; 4],

    /// Pool that minted this position
    pub pool: [u8; 32],

    /// Current holder
    pub owner: [u8; 32],

    pub id: u64,

    /// Amount originally committed
    pub principal: u64,

    /// Entitlement units
    pub balance: u64,

    /// 0 = not unlocking; otherwise unix time at which it becomes redeemable
    pub expiration: i64,

    pub _reserved: [u8; 24],
}

/// Size of PositionRecord in bytes
pub const POSITION_RECORD_SIZE: usize = core::mem::size_of::<PositionRecord>();

impl PositionRecord {
    pub fn new(pool: &Pubkey, owner: &Pubkey, id: u64, tranche: Tranche, principal: u64, balance: u64) -> Self {
        let mut record = Self::zeroed();
        record.kind = KIND_POSITION;
        record.is_initialized = 1;
        record.tranche = tranche as u8;
        record.pool = pool.to_bytes();
        record.owner = owner.to_bytes();
        record.id = id;
        record.principal = principal;
        record.balance = balance;
        record
    }

    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }

    pub fn owner_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.owner)
    }

    pub fn tranche(&self) -> Result<Tranche, ProgramError> {
        Tranche::try_from(self.tranche)
    }
}

// ═══════════════════════════════════════════════════════════════
// Conversion tables
// ═══════════════════════════════════════════════════════════════

/// Stored conversion step. Decoded by `conversion::Conversion`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ConversionSlot {
    pub router: [u8; 32],
    pub token_from: [u8; 32],
    pub token_to: [u8; 32],
    /// Percent of the current `token_from` balance, 0..=100
    pub percentage: u8,
    /// `ConversionOp` bits
    pub operations: u8,
    pub _padding: [u8; 6],
}

/// Ordered conversion steps; `len == 0` means not configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct ConversionTable {
    pub len: u8,
    pub _padding: [u8; 7],
    pub slots: [ConversionSlot; MAX_CONVERSIONS],
}

// ═══════════════════════════════════════════════════════════════
// Insurance fund
// ═══════════════════════════════════════════════════════════════

/// Insurance fund state.
/// PDA seeds: [b"fund", pool]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct FundState {
    pub kind: u8,
    pub is_initialized: u8,
    pub bump: u8,
    pub _padding: [u8; 5],

    pub governance: Governance,

    pub pool: [u8; 32],

    /// Asset insurance holders deposit and are paid in
    pub insurance_asset: [u8; 32],

    /// Asset received from the pool's fee withdrawals
    pub base_asset: [u8; 32],

    /// Receives the treasury cut of withdrawn fees (zeros = none)
    pub treasury: [u8; 32],

    /// Sum of live insurance principals
    pub total_principal: u64,

    /// Entitlement units outstanding
    pub total_supply_lp: u64,

    pub treasury_fee_bps: u64,

    pub conversions: ConversionTable,

    pub _reserved: [u8; 64],
}

/// Size of FundState in bytes
pub const FUND_STATE_SIZE: usize = core::mem::size_of::<FundState>();

impl FundState {
    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }

    pub fn insurance_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.insurance_asset)
    }

    pub fn base_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_asset)
    }

    pub fn treasury_pubkey(&self) -> Option<Pubkey> {
        if self.treasury == [0; 32] {
            None
        } else {
            Some(Pubkey::new_from_array(self.treasury))
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Autocompounder
// ═══════════════════════════════════════════════════════════════

/// Autocompounder state.
/// PDA seeds: [b"compounder", pool]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct CompounderState {
    pub kind: u8,
    pub is_initialized: u8,
    pub bump: u8,
    /// 0 = autocompound is a no-op
    pub autocompound_enabled: u8,
    pub _padding: [u8; 4],

    pub governance: Governance,

    /// Only caller allowed into blend/spill
    pub adapter: [u8; 32],

    /// Staked asset
    pub base_asset: [u8; 32],

    /// Farm (chef) the position is staked in
    pub chef: [u8; 32],

    /// Farm pool id
    pub pid: u64,

    pub conversions: ConversionTable,

    pub _reserved: [u8; 64],
}

/// Size of CompounderState in bytes
pub const COMPOUNDER_STATE_SIZE: usize = core::mem::size_of::<CompounderState>();

impl CompounderState {
    pub fn adapter_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.adapter)
    }

    pub fn base_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_asset)
    }

    pub fn chef_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.chef)
    }
}

// ═══════════════════════════════════════════════════════════════
// Adapter
// ═══════════════════════════════════════════════════════════════

/// Adapter state.
/// PDA seeds: [b"adapter", pool]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
#[repr(C)]
pub struct AdapterState {
    pub kind: u8,
    pub is_initialized: u8,
    pub bump: u8,
    /// `AdapterKind` as u8
    pub adapter_kind: u8,
    pub _padding: [u8; 4],

    pub governance: Governance,

    /// Only caller allowed to move capital
    pub pool: [u8; 32],

    pub base_asset: [u8; 32],

    /// Autocompounder (live farm adapters only)
    pub compounder: [u8; 32],

    pub _reserved: [u8; 64],
}

/// Size of AdapterState in bytes
pub const ADAPTER_STATE_SIZE: usize = core::mem::size_of::<AdapterState>();

impl AdapterState {
    pub fn pool_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.pool)
    }

    pub fn base_asset_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.base_asset)
    }

    pub fn compounder_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.compounder)
    }

    pub fn adapter_kind(&self) -> Result<AdapterKind, ProgramError> {
        AdapterKind::try_from(self.adapter_kind)
    }
}

// ═══════════════════════════════════════════════════════════════
// PDA derivation
// ═══════════════════════════════════════════════════════════════

/// Derive the pool PDA for a base asset.
/// This PDA is share mint authority and position minter.
pub fn derive_pool_pda(program_id: &Pubkey, base_asset: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POOL_SEED, base_asset.as_ref()], program_id)
}

pub fn derive_fund_pda(program_id: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[FUND_SEED, pool.as_ref()], program_id)
}

pub fn derive_compounder_pda(program_id: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[COMPOUNDER_SEED, pool.as_ref()], program_id)
}

pub fn derive_adapter_pda(program_id: &Pubkey, pool: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[ADAPTER_SEED, pool.as_ref()], program_id)
}

/// Derive the PDA of position `id` minted by `pool`.
pub fn derive_position_pda(program_id: &Pubkey, pool: &Pubkey, id: u64) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[POSITION_SEED, pool.as_ref(), &id.to_le_bytes()], program_id)
}

/// Derive the one token account a program-owned `holder` keeps for `mint`.
/// Balances of program accounts are only ever read from this address.
pub fn derive_vault_pda(program_id: &Pubkey, holder: &Pubkey, mint: &Pubkey) -> (Pubkey, u8) {
    Pubkey::find_program_address(&[VAULT_SEED, holder.as_ref(), mint.as_ref()], program_id)
}
