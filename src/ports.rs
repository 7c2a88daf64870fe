//! Capability interfaces the engine calls.
//!
//! The engine never touches accounts or CPIs directly. On-chain these are
//! backed by `cpi`; host tests back them with `sim`.

use solana_program::{entrypoint::ProgramResult, program_error::ProgramError, pubkey::Pubkey};

use crate::state::PositionRecord;

/// Fungible token balances keyed by (token, owner).
pub trait TokenLedger {
    fn balance_of(&self, token: &Pubkey, owner: &Pubkey) -> Result<u64, ProgramError>;

    /// Move `amount` from `from` to `to`; `from` authorizes. Returns the
    /// amount `to` actually received.
    fn transfer(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<u64, ProgramError>;

    /// Move `amount` out of `from` on the strength of an allowance granted
    /// to `spender`. Returns the amount received.
    fn transfer_from(
        &mut self,
        token: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError>;

    fn mint_to(&mut self, mint: &Pubkey, authority: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult;

    fn burn(&mut self, mint: &Pubkey, authority: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult;

    fn approve(&mut self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) -> ProgramResult;

    fn allowance(&self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> Result<u64, ProgramError>;
}

/// Staking farm ("chef"). Deposits and withdrawals harvest pending rewards
/// to `user` as a side effect.
pub trait Farm {
    fn address(&self) -> Pubkey;

    fn deposit(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult;

    fn withdraw(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult;

    /// Return the whole stake, forfeiting rewards.
    fn emergency_withdraw(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey) -> ProgramResult;

    /// Staked amount of `user` in `pid`.
    fn user_info(&self, pid: u64, user: &Pubkey) -> Result<u64, ProgramError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Swap {
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub amount_in: u64,
    pub amount_out_min: u64,
    /// Pays `amount_in`, must have approved the router
    pub owner: Pubkey,
    pub to: Pubkey,
    pub supporting_fee_on_transfer: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveLiquidity {
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub liquidity: u64,
    pub amount_a_min: u64,
    pub amount_b_min: u64,
    pub owner: Pubkey,
    pub to: Pubkey,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddLiquidity {
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub amount_a_desired: u64,
    pub amount_b_desired: u64,
    pub amount_a_min: u64,
    pub amount_b_min: u64,
    pub owner: Pubkey,
    pub to: Pubkey,
}

/// Swap venue.
pub trait Router {
    fn address(&self) -> Pubkey;

    /// LP token of the (a, b) pair, if the venue lists it.
    fn pair_for(&self, token_a: &Pubkey, token_b: &Pubkey) -> Option<Pubkey>;

    fn swap_exact_tokens_for_tokens(&mut self, tokens: &mut dyn TokenLedger, swap: &Swap) -> ProgramResult;

    fn remove_liquidity(&mut self, tokens: &mut dyn TokenLedger, removal: &RemoveLiquidity) -> ProgramResult;

    fn add_liquidity(&mut self, tokens: &mut dyn TokenLedger, addition: &AddLiquidity) -> ProgramResult;
}

pub trait RouterRegistry {
    fn router_mut(&mut self, key: &Pubkey) -> Option<&mut dyn Router>;
}

/// External collaborators handed to every engine call.
pub struct Externals<'a> {
    pub tokens: &'a mut dyn TokenLedger,
    pub farm: &'a mut dyn Farm,
    pub routers: &'a mut dyn RouterRegistry,
}

impl<'a> Externals<'a> {
    pub fn new(
        tokens: &'a mut dyn TokenLedger,
        farm: &'a mut dyn Farm,
        routers: &'a mut dyn RouterRegistry,
    ) -> Self {
        Self { tokens, farm, routers }
    }
}

/// Where the pool moves base asset to earn yield.
pub trait AdapterPort {
    fn address(&self) -> Pubkey;

    /// Put `amount` (already transferred to the adapter) to work.
    /// Fails rather than clamps when the adapter holds less.
    fn deploy_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64) -> ProgramResult;

    /// Send `amount` of base asset to `to`. Fails rather than clamps.
    fn return_capital(&mut self, ext: &mut Externals, caller: &Pubkey, amount: u64, to: &Pubkey) -> ProgramResult;

    /// Base-asset value currently held on the pool's behalf.
    fn get_holdings_view(&self, ext: &Externals) -> Result<u64, ProgramError>;

    fn set_pool(&mut self, caller: &Pubkey, pool: &Pubkey) -> ProgramResult;
}

/// Position registry. Every write names the writer; only the owning pool
/// is accepted.
pub trait PositionStore {
    fn get(&self, id: u64) -> Result<Option<PositionRecord>, ProgramError>;

    fn mint(&mut self, minter: &Pubkey, record: PositionRecord) -> ProgramResult;

    fn update(&mut self, writer: &Pubkey, record: PositionRecord) -> ProgramResult;

    fn burn(&mut self, burner: &Pubkey, id: u64) -> Result<PositionRecord, ProgramError>;
}
