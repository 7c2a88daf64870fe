//! A complete in-memory deployment: pool, adapter, insurance fund and the
//! position registry wired to the simulated collaborators in [`crate::sim`].
//!
//! Every mutating call runs atomically. When it fails, all state (balances,
//! farm stakes, pair reserves, engine state) is restored to what it was
//! before the call, the same all-or-nothing behavior a transaction has on
//! chain.

use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

use crate::adapter::Adapter;
use crate::fund::InsuranceFund;
use crate::pool::SharePool;
use crate::ports::{AdapterPort, Externals};
use crate::position::PositionBook;
use crate::sim::{MemoryFarm, MemoryTokens, RouterBook};

#[derive(Debug, Clone)]
pub struct Deployment {
    pub tokens: MemoryTokens,
    pub farm: MemoryFarm,
    pub routers: RouterBook,
    pub pool: SharePool,
    pub adapter: Adapter,
    pub fund: InsuranceFund,
    pub positions: PositionBook,
    /// Unix timestamp used for unlock checks.
    pub now: i64,
}

/// Parallel arrays describing a conversion table.
#[derive(Debug, Clone, Default)]
pub struct ConversionArgs {
    pub routers: Vec<Pubkey>,
    pub tokens_from: Vec<Pubkey>,
    pub tokens_to: Vec<Pubkey>,
    pub percentages: Vec<u8>,
    pub operations: Vec<u8>,
}

impl Deployment {
    pub fn new(
        tokens: MemoryTokens,
        farm: MemoryFarm,
        routers: RouterBook,
        pool: SharePool,
        adapter: Adapter,
        fund: InsuranceFund,
    ) -> Self {
        let positions = PositionBook::new(&pool.key);
        Self {
            tokens,
            farm,
            routers,
            pool,
            adapter,
            fund,
            positions,
            now: 0,
        }
    }

    pub fn advance(&mut self, seconds: i64) {
        self.now += seconds;
    }

    fn atomic<T>(&mut self, op: impl FnOnce(&mut Self) -> Result<T, ProgramError>) -> Result<T, ProgramError> {
        let snapshot = self.clone();
        let result = op(self);
        if result.is_err() {
            *self = snapshot;
        }
        result
    }

    // ═══════════════════════════════════════════════════════════════
    // Pool
    // ═══════════════════════════════════════════════════════════════

    pub fn deposit(&mut self, caller: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.pool.deposit(&mut d.adapter, &mut ext, caller, amount)
        })
    }

    pub fn withdraw(&mut self, caller: &Pubkey, shares: u64) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.pool.withdraw(&mut d.adapter, &mut ext, caller, shares)
        })
    }

    pub fn update_exchange_rate(&mut self) -> Result<u128, ProgramError> {
        self.atomic(|d| {
            let ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.pool.update_exchange_rate(&d.adapter, &ext)
        })
    }

    pub fn withdraw_fees(&mut self, caller: &Pubkey, to: &Pubkey) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.pool.withdraw_fees(&mut d.adapter, &mut ext, caller, to)
        })
    }

    pub fn begin_unfreeze(&mut self, caller: &Pubkey, id: u64) -> Result<i64, ProgramError> {
        let now = self.now;
        self.atomic(|d| d.pool.begin_unfreeze(&mut d.positions, caller, id, now))
    }

    pub fn transfer_position(&mut self, caller: &Pubkey, id: u64, to: &Pubkey) -> ProgramResult {
        self.atomic(|d| d.pool.transfer_position(&mut d.positions, caller, id, to))
    }

    /// Adapter holdings as the pool sees them.
    pub fn holdings(&mut self) -> Result<u64, ProgramError> {
        let ext = Externals::new(&mut self.tokens, &mut self.farm, &mut self.routers);
        self.adapter.get_holdings_view(&ext)
    }

    pub fn exchange_rate(&self) -> u128 {
        self.pool.state.exchange_rate()
    }

    // ═══════════════════════════════════════════════════════════════
    // Autocompounder
    // ═══════════════════════════════════════════════════════════════

    /// Harvest and restake. A no-op on the pass-through adapter.
    pub fn autocompound(&mut self) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            match d.adapter.compounder_mut() {
                Some(compounder) => compounder.autocompound(&mut ext),
                None => Ok(0),
            }
        })
    }

    pub fn init_compounder_conversions(&mut self, caller: &Pubkey, args: &ConversionArgs) -> ProgramResult {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            let compounder = d.adapter.compounder_mut().ok_or(ProgramError::InvalidArgument)?;
            compounder.init_conversions(
                &mut ext,
                caller,
                &args.routers,
                &args.tokens_from,
                &args.tokens_to,
                &args.percentages,
                &args.operations,
            )
        })
    }

    pub fn reset_approvals(&mut self, caller: &Pubkey) -> ProgramResult {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            let compounder = d.adapter.compounder_mut().ok_or(ProgramError::InvalidArgument)?;
            compounder.reset_approvals(&mut ext, caller)
        })
    }

    // ═══════════════════════════════════════════════════════════════
    // Insurance fund
    // ═══════════════════════════════════════════════════════════════

    pub fn fund_deposit(&mut self, caller: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.fund.deposit(&mut d.pool, &mut d.positions, &mut ext, caller, amount)
        })
    }

    pub fn fund_update(&mut self) -> Result<u64, ProgramError> {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.fund.update(&mut d.pool, &mut d.adapter, &mut ext)
        })
    }

    pub fn fund_withdraw(&mut self, caller: &Pubkey, id: u64) -> Result<u64, ProgramError> {
        let now = self.now;
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.fund.withdraw(&d.pool, &mut d.positions, &mut ext, caller, id, now)
        })
    }

    pub fn fund_emergency_withdraw(&mut self, caller: &Pubkey, id: u64) -> Result<u64, ProgramError> {
        let now = self.now;
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.fund.emergency_withdraw(&d.pool, &mut d.positions, &mut ext, caller, id, now)
        })
    }

    pub fn init_fund_conversions(&mut self, caller: &Pubkey, args: &ConversionArgs) -> ProgramResult {
        self.atomic(|d| {
            let mut ext = Externals::new(&mut d.tokens, &mut d.farm, &mut d.routers);
            d.fund.init_conversions(
                &mut ext,
                caller,
                &args.routers,
                &args.tokens_from,
                &args.tokens_to,
                &args.percentages,
                &args.operations,
            )
        })
    }

    pub fn pending_earnings(&mut self, id: u64) -> Result<u64, ProgramError> {
        let ext = Externals::new(&mut self.tokens, &mut self.farm, &mut self.routers);
        self.fund.pending_earnings(&self.pool, &self.positions, &ext, id)
    }
}
