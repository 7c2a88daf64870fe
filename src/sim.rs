//! In-memory collaborators for host-side runs: a token ledger, a
//! MasterChef-style farm and a constant-product router.
//!
//! They implement the same capability traits the on-chain CPI layer does,
//! so the engine runs unchanged against either.

use std::collections::BTreeMap;

use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;
use crate::math;
use crate::ports::{AddLiquidity, Farm, RemoveLiquidity, Router, RouterRegistry, Swap, TokenLedger};

/// Reward-per-share precision of the farm.
pub const ACC_REWARD_PRECISION: u128 = 1_000_000_000_000;

/// Swap fee kept by the pair, in bps.
pub const SWAP_FEE_BPS: u64 = 30;

/// Integer square root (floor).
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = (x + 1) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Output of a constant-product swap after the pair fee.
pub fn get_amount_out(amount_in: u64, reserve_in: u64, reserve_out: u64) -> Option<u64> {
    if reserve_in == 0 || reserve_out == 0 {
        return None;
    }
    let keep = (math::BPS_DENOMINATOR - SWAP_FEE_BPS) as u128;
    let in_with_fee = (amount_in as u128).checked_mul(keep)?;
    let numerator = in_with_fee.checked_mul(reserve_out as u128)?;
    let denominator = (reserve_in as u128)
        .checked_mul(math::BPS_DENOMINATOR as u128)?
        .checked_add(in_with_fee)?;
    u64::try_from(numerator / denominator).ok()
}

// ═══════════════════════════════════════════════════════════════
// Token ledger
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct MemoryTokens {
    balances: BTreeMap<(Pubkey, Pubkey), u64>,
    allowances: BTreeMap<(Pubkey, Pubkey, Pubkey), u64>,
    mint_authorities: BTreeMap<Pubkey, Pubkey>,
    supplies: BTreeMap<Pubkey, u64>,
    transfer_fee_bps: BTreeMap<Pubkey, u64>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_mint(&mut self, mint: &Pubkey, authority: &Pubkey) {
        self.mint_authorities.insert(*mint, *authority);
        self.supplies.entry(*mint).or_insert(0);
    }

    /// Burn `bps` of every transfer of `token` (fee-on-transfer token).
    pub fn set_transfer_fee(&mut self, token: &Pubkey, bps: u64) {
        self.transfer_fee_bps.insert(*token, bps);
    }

    /// Faucet: mint without an authority check.
    pub fn credit(&mut self, token: &Pubkey, owner: &Pubkey, amount: u64) {
        *self.balances.entry((*token, *owner)).or_insert(0) += amount;
        *self.supplies.entry(*token).or_insert(0) += amount;
    }

    pub fn balance(&self, token: &Pubkey, owner: &Pubkey) -> u64 {
        self.balances.get(&(*token, *owner)).copied().unwrap_or(0)
    }

    pub fn total_supply(&self, token: &Pubkey) -> u64 {
        self.supplies.get(token).copied().unwrap_or(0)
    }

    fn debit(&mut self, token: &Pubkey, owner: &Pubkey, amount: u64) -> ProgramResult {
        let bal = self.balances.entry((*token, *owner)).or_insert(0);
        *bal = bal.checked_sub(amount).ok_or(VaultError::InsufficientBalance)?;
        Ok(())
    }

    fn add(&mut self, token: &Pubkey, owner: &Pubkey, amount: u64) -> ProgramResult {
        let bal = self.balances.entry((*token, *owner)).or_insert(0);
        *bal = bal.checked_add(amount).ok_or(VaultError::MathOverflow)?;
        Ok(())
    }

    fn move_funds(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        let fee_bps = self.transfer_fee_bps.get(token).copied().unwrap_or(0);
        let fee = math::bps_of(amount, fee_bps).ok_or(VaultError::MathOverflow)?;
        self.debit(token, from, amount)?;
        let received = amount - fee;
        self.add(token, to, received)?;
        if fee > 0 {
            let supply = self.supplies.entry(*token).or_insert(0);
            *supply = supply.saturating_sub(fee);
        }
        Ok(received)
    }
}

impl TokenLedger for MemoryTokens {
    fn balance_of(&self, token: &Pubkey, owner: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self.balance(token, owner))
    }

    fn transfer(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        self.move_funds(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        let key = (*token, *from, *spender);
        let allowed = self.allowances.get(&key).copied().unwrap_or(0);
        if allowed < amount {
            return Err(VaultError::InsufficientAllowance.into());
        }
        // u64::MAX is an infinite approval
        if allowed != u64::MAX {
            self.allowances.insert(key, allowed - amount);
        }
        self.move_funds(token, from, to, amount)
    }

    fn mint_to(&mut self, mint: &Pubkey, authority: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        if self.mint_authorities.get(mint) != Some(authority) {
            return Err(VaultError::OnlyPoolCanMint.into());
        }
        self.add(mint, to, amount)?;
        let supply = self.supplies.entry(*mint).or_insert(0);
        *supply = supply.checked_add(amount).ok_or(VaultError::MathOverflow)?;
        Ok(())
    }

    fn burn(&mut self, mint: &Pubkey, authority: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult {
        if self.mint_authorities.get(mint) != Some(authority) {
            return Err(VaultError::OnlyPoolCanBurn.into());
        }
        self.debit(mint, from, amount)?;
        let supply = self.supplies.entry(*mint).or_insert(0);
        *supply = supply.checked_sub(amount).ok_or(VaultError::MathUnderflow)?;
        Ok(())
    }

    fn approve(&mut self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) -> ProgramResult {
        self.allowances.insert((*token, *owner, *spender), amount);
        Ok(())
    }

    fn allowance(&self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self.allowances.get(&(*token, *owner, *spender)).copied().unwrap_or(0))
    }
}

// ═══════════════════════════════════════════════════════════════
// Farm
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone)]
pub struct FarmPool {
    pub lp_token: Pubkey,
    pub reward_token: Pubkey,
    pub acc_reward_per_share: u128,
    pub total_staked: u64,
    /// Rewards funded while nothing was staked
    pub undistributed: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct FarmUser {
    amount: u64,
    reward_debt: u128,
}

/// MasterChef-style farm. Rewards are pushed in with `fund_rewards` and
/// paid out on every deposit/withdraw.
#[derive(Debug, Clone)]
pub struct MemoryFarm {
    address: Pubkey,
    pools: Vec<FarmPool>,
    users: BTreeMap<(u64, Pubkey), FarmUser>,
}

impl MemoryFarm {
    pub fn new(address: &Pubkey) -> Self {
        Self {
            address: *address,
            pools: Vec::new(),
            users: BTreeMap::new(),
        }
    }

    /// Register a staking pool; returns its pid.
    pub fn add_pool(&mut self, lp_token: &Pubkey, reward_token: &Pubkey) -> u64 {
        self.pools.push(FarmPool {
            lp_token: *lp_token,
            reward_token: *reward_token,
            acc_reward_per_share: 0,
            total_staked: 0,
            undistributed: 0,
        });
        (self.pools.len() - 1) as u64
    }

    pub fn pool(&self, pid: u64) -> Option<&FarmPool> {
        self.pools.get(pid as usize)
    }

    /// Mint `amount` reward tokens to the farm and spread them over stakers.
    pub fn fund_rewards(&mut self, tokens: &mut MemoryTokens, pid: u64, amount: u64) -> ProgramResult {
        let address = self.address;
        let pool = self.pool_mut(pid)?;
        tokens.credit(&pool.reward_token, &address, amount);
        pool.undistributed = pool.undistributed.checked_add(amount).ok_or(VaultError::MathOverflow)?;
        Self::distribute(pool)
    }

    pub fn pending_reward(&self, pid: u64, user: &Pubkey) -> u64 {
        let (Some(pool), Some(info)) = (self.pool(pid), self.users.get(&(pid, *user))) else {
            return 0;
        };
        let accrued = (info.amount as u128) * pool.acc_reward_per_share / ACC_REWARD_PRECISION;
        u64::try_from(accrued.saturating_sub(info.reward_debt)).unwrap_or(u64::MAX)
    }

    fn pool_mut(&mut self, pid: u64) -> Result<&mut FarmPool, ProgramError> {
        self.pools.get_mut(pid as usize).ok_or(ProgramError::InvalidArgument)
    }

    fn distribute(pool: &mut FarmPool) -> ProgramResult {
        if pool.total_staked == 0 || pool.undistributed == 0 {
            return Ok(());
        }
        let per_share = (pool.undistributed as u128)
            .checked_mul(ACC_REWARD_PRECISION)
            .ok_or(VaultError::MathOverflow)?
            / pool.total_staked as u128;
        pool.acc_reward_per_share = pool
            .acc_reward_per_share
            .checked_add(per_share)
            .ok_or(VaultError::MathOverflow)?;
        pool.undistributed = 0;
        Ok(())
    }

    /// Pay out pending rewards; returns the user's record.
    fn settle(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey) -> Result<FarmUser, ProgramError> {
        let pending = self.pending_reward(pid, user);
        let reward = self.pool_mut(pid)?.reward_token;
        if pending > 0 {
            let pay = pending.min(tokens.balance_of(&reward, &self.address)?);
            if pay > 0 {
                tokens.transfer(&reward, &self.address, user, pay)?;
            }
        }
        Ok(self.users.get(&(pid, *user)).copied().unwrap_or_default())
    }

    fn store(&mut self, pid: u64, user: &Pubkey, mut info: FarmUser) -> ProgramResult {
        let acc = self.pool_mut(pid)?.acc_reward_per_share;
        info.reward_debt = (info.amount as u128)
            .checked_mul(acc)
            .ok_or(VaultError::MathOverflow)?
            / ACC_REWARD_PRECISION;
        if info.amount == 0 {
            self.users.remove(&(pid, *user));
        } else {
            self.users.insert((pid, *user), info);
        }
        Ok(())
    }
}

impl Farm for MemoryFarm {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn deposit(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult {
        let mut info = self.settle(tokens, pid, user)?;
        if amount > 0 {
            let address = self.address;
            let lp = self.pool_mut(pid)?.lp_token;
            let received = tokens.transfer_from(&lp, &address, user, &address, amount)?;
            info.amount = info.amount.checked_add(received).ok_or(VaultError::MathOverflow)?;
            let pool = self.pool_mut(pid)?;
            pool.total_staked = pool.total_staked.checked_add(received).ok_or(VaultError::MathOverflow)?;
        }
        self.store(pid, user, info)?;
        // Rewards parked while nothing was staked go to whoever is staked now.
        Self::distribute(self.pool_mut(pid)?)
    }

    fn withdraw(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult {
        let mut info = self.settle(tokens, pid, user)?;
        if info.amount < amount {
            return Err(VaultError::InsufficientBalance.into());
        }
        info.amount -= amount;
        let lp = {
            let pool = self.pool_mut(pid)?;
            pool.total_staked -= amount;
            pool.lp_token
        };
        if amount > 0 {
            tokens.transfer(&lp, &self.address, user, amount)?;
        }
        self.store(pid, user, info)
    }

    fn emergency_withdraw(&mut self, tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey) -> ProgramResult {
        let info = self.users.remove(&(pid, *user)).unwrap_or_default();
        let lp = {
            let pool = self.pool_mut(pid)?;
            pool.total_staked = pool.total_staked.saturating_sub(info.amount);
            pool.lp_token
        };
        if info.amount > 0 {
            tokens.transfer(&lp, &self.address, user, info.amount)?;
        }
        msg!("Farm emergency withdraw: {} returned to {}", info.amount, user);
        Ok(())
    }

    fn user_info(&self, pid: u64, user: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self.users.get(&(pid, *user)).map(|u| u.amount).unwrap_or(0))
    }
}

// ═══════════════════════════════════════════════════════════════
// Router
// ═══════════════════════════════════════════════════════════════

/// Constant-product pair. The LP mint key doubles as the pair's address.
#[derive(Debug, Clone)]
pub struct Pair {
    pub lp_mint: Pubkey,
    pub token_a: Pubkey,
    pub token_b: Pubkey,
    pub reserve_a: u64,
    pub reserve_b: u64,
    pub lp_supply: u64,
}

impl Pair {
    /// Reserves oriented as (reserve of `token`, reserve of the other side).
    fn reserves_for(&self, token: &Pubkey) -> (u64, u64) {
        if *token == self.token_a {
            (self.reserve_a, self.reserve_b)
        } else {
            (self.reserve_b, self.reserve_a)
        }
    }

    fn credit_reserves(&mut self, token: &Pubkey, add_in: u64, sub_out: u64) -> ProgramResult {
        let (r_in, r_out) = if *token == self.token_a {
            (&mut self.reserve_a, &mut self.reserve_b)
        } else {
            (&mut self.reserve_b, &mut self.reserve_a)
        };
        *r_in = r_in.checked_add(add_in).ok_or(VaultError::MathOverflow)?;
        *r_out = r_out.checked_sub(sub_out).ok_or(VaultError::MathUnderflow)?;
        Ok(())
    }
}

fn sorted(a: &Pubkey, b: &Pubkey) -> (Pubkey, Pubkey) {
    if a < b {
        (*a, *b)
    } else {
        (*b, *a)
    }
}

#[derive(Debug, Clone)]
pub struct ConstantProductRouter {
    address: Pubkey,
    pairs: BTreeMap<(Pubkey, Pubkey), Pair>,
}

impl ConstantProductRouter {
    pub fn new(address: &Pubkey) -> Self {
        Self {
            address: *address,
            pairs: BTreeMap::new(),
        }
    }

    /// List a pair. The router becomes mint authority of `lp_mint`.
    pub fn create_pair(&mut self, tokens: &mut MemoryTokens, token_a: &Pubkey, token_b: &Pubkey, lp_mint: &Pubkey) {
        tokens.create_mint(lp_mint, &self.address);
        let (a, b) = sorted(token_a, token_b);
        self.pairs.insert(
            (a, b),
            Pair {
                lp_mint: *lp_mint,
                token_a: a,
                token_b: b,
                reserve_a: 0,
                reserve_b: 0,
                lp_supply: 0,
            },
        );
    }

    pub fn pair(&self, token_a: &Pubkey, token_b: &Pubkey) -> Option<&Pair> {
        self.pairs.get(&sorted(token_a, token_b))
    }

    fn pair_mut(&mut self, token_a: &Pubkey, token_b: &Pubkey) -> Result<&mut Pair, ProgramError> {
        self.pairs
            .get_mut(&sorted(token_a, token_b))
            .ok_or_else(|| VaultError::PairNotFound.into())
    }
}

impl Router for ConstantProductRouter {
    fn address(&self) -> Pubkey {
        self.address
    }

    fn pair_for(&self, token_a: &Pubkey, token_b: &Pubkey) -> Option<Pubkey> {
        self.pair(token_a, token_b).map(|p| p.lp_mint)
    }

    fn swap_exact_tokens_for_tokens(&mut self, tokens: &mut dyn TokenLedger, swap: &Swap) -> ProgramResult {
        let address = self.address;
        let pair = self.pair_mut(&swap.token_in, &swap.token_out)?;
        let (reserve_in, reserve_out) = pair.reserves_for(&swap.token_in);
        let received = tokens.transfer_from(&swap.token_in, &address, &swap.owner, &pair.lp_mint, swap.amount_in)?;
        if received < swap.amount_in && !swap.supporting_fee_on_transfer {
            msg!("Swap rejected: pair received {} of {} (K)", received, swap.amount_in);
            return Err(VaultError::ExternalCallFailed.into());
        }
        let out = get_amount_out(received, reserve_in, reserve_out).ok_or(VaultError::MathOverflow)?;
        if out < swap.amount_out_min {
            return Err(VaultError::ExternalCallFailed.into());
        }
        if out > 0 {
            tokens.transfer(&swap.token_out, &pair.lp_mint, &swap.to, out)?;
        }
        pair.credit_reserves(&swap.token_in, received, out)
    }

    fn remove_liquidity(&mut self, tokens: &mut dyn TokenLedger, removal: &RemoveLiquidity) -> ProgramResult {
        let address = self.address;
        let pair = self.pair_mut(&removal.token_a, &removal.token_b)?;
        if pair.lp_supply == 0 {
            return Err(VaultError::ExternalCallFailed.into());
        }
        let lp = pair.lp_mint;
        let liquidity = tokens.transfer_from(&lp, &address, &removal.owner, &lp, removal.liquidity)?;
        let (reserve_a, reserve_b) = pair.reserves_for(&removal.token_a);
        let supply = pair.lp_supply;
        let share = |reserve: u64| -> Result<u64, ProgramError> {
            let v = (liquidity as u128) * reserve as u128 / supply as u128;
            u64::try_from(v).map_err(|_| VaultError::MathOverflow.into())
        };
        let amount_a = share(reserve_a)?;
        let amount_b = share(reserve_b)?;
        if amount_a < removal.amount_a_min || amount_b < removal.amount_b_min {
            return Err(VaultError::ExternalCallFailed.into());
        }

        tokens.burn(&lp, &address, &lp, liquidity)?;
        pair.lp_supply -= liquidity;
        if removal.token_a == pair.token_a {
            pair.reserve_a -= amount_a;
            pair.reserve_b -= amount_b;
        } else {
            pair.reserve_b -= amount_a;
            pair.reserve_a -= amount_b;
        }
        tokens.transfer(&removal.token_a, &lp, &removal.to, amount_a)?;
        tokens.transfer(&removal.token_b, &lp, &removal.to, amount_b)?;
        Ok(())
    }

    fn add_liquidity(&mut self, tokens: &mut dyn TokenLedger, addition: &AddLiquidity) -> ProgramResult {
        let address = self.address;
        let pair = self.pair_mut(&addition.token_a, &addition.token_b)?;
        let (reserve_a, reserve_b) = pair.reserves_for(&addition.token_a);

        let (amount_a, amount_b) = if reserve_a == 0 && reserve_b == 0 {
            (addition.amount_a_desired, addition.amount_b_desired)
        } else {
            let quote = |amount: u64, r_from: u64, r_to: u64| -> u64 {
                ((amount as u128) * r_to as u128 / r_from as u128).min(u64::MAX as u128) as u64
            };
            let b_optimal = quote(addition.amount_a_desired, reserve_a, reserve_b);
            if b_optimal <= addition.amount_b_desired {
                (addition.amount_a_desired, b_optimal)
            } else {
                (quote(addition.amount_b_desired, reserve_b, reserve_a), addition.amount_b_desired)
            }
        };
        if amount_a < addition.amount_a_min || amount_b < addition.amount_b_min {
            return Err(VaultError::ExternalCallFailed.into());
        }

        let lp = pair.lp_mint;
        let got_a = tokens.transfer_from(&addition.token_a, &address, &addition.owner, &lp, amount_a)?;
        let got_b = tokens.transfer_from(&addition.token_b, &address, &addition.owner, &lp, amount_b)?;

        let liquidity = if pair.lp_supply == 0 {
            isqrt((got_a as u128) * got_b as u128)
        } else {
            let from_a = (got_a as u128) * pair.lp_supply as u128 / reserve_a as u128;
            let from_b = (got_b as u128) * pair.lp_supply as u128 / reserve_b as u128;
            from_a.min(from_b)
        };
        let liquidity = u64::try_from(liquidity).map_err(|_| VaultError::MathOverflow)?;
        if liquidity == 0 {
            return Err(VaultError::ExternalCallFailed.into());
        }

        tokens.mint_to(&lp, &address, &addition.to, liquidity)?;
        pair.lp_supply = pair.lp_supply.checked_add(liquidity).ok_or(VaultError::MathOverflow)?;
        if addition.token_a == pair.token_a {
            pair.reserve_a = pair.reserve_a.checked_add(got_a).ok_or(VaultError::MathOverflow)?;
            pair.reserve_b = pair.reserve_b.checked_add(got_b).ok_or(VaultError::MathOverflow)?;
        } else {
            pair.reserve_b = pair.reserve_b.checked_add(got_a).ok_or(VaultError::MathOverflow)?;
            pair.reserve_a = pair.reserve_a.checked_add(got_b).ok_or(VaultError::MathOverflow)?;
        }
        Ok(())
    }
}

/// Routers by address.
#[derive(Debug, Clone, Default)]
pub struct RouterBook {
    routers: BTreeMap<Pubkey, ConstantProductRouter>,
}

impl RouterBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, router: ConstantProductRouter) {
        self.routers.insert(router.address, router);
    }

    pub fn get(&self, key: &Pubkey) -> Option<&ConstantProductRouter> {
        self.routers.get(key)
    }

    pub fn get_mut(&mut self, key: &Pubkey) -> Option<&mut ConstantProductRouter> {
        self.routers.get_mut(key)
    }
}

impl RouterRegistry for RouterBook {
    fn router_mut(&mut self, key: &Pubkey) -> Option<&mut dyn Router> {
        self.routers.get_mut(key).map(|r| r as &mut dyn Router)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    #[test]
    fn test_isqrt() {
        assert_eq!(isqrt(0), 0);
        assert_eq!(isqrt(1), 1);
        assert_eq!(isqrt(15), 3);
        assert_eq!(isqrt(16), 4);
        assert_eq!(isqrt(1_000_000_000_000), 1_000_000);
    }

    #[test]
    fn test_amount_out_keeps_fee() {
        // 1:1 pool of 1e6 each, swapping 1_000 → a little under 1_000 minus 0.3%
        let out = get_amount_out(1_000, 1_000_000, 1_000_000).unwrap();
        assert!(out < 997);
        assert!(out > 990);
    }

    #[test]
    fn test_transfer_fee_burns() {
        let mut t = MemoryTokens::new();
        t.set_transfer_fee(&key(1), 100); // 1%
        t.credit(&key(1), &key(2), 10_000);
        let got = t.transfer(&key(1), &key(2), &key(3), 10_000).unwrap();
        assert_eq!(got, 9_900);
        assert_eq!(t.balance(&key(1), &key(3)), 9_900);
        assert_eq!(t.total_supply(&key(1)), 9_900);
    }

    #[test]
    fn test_allowance_spent_unless_infinite() {
        let mut t = MemoryTokens::new();
        t.credit(&key(1), &key(2), 1_000);
        t.approve(&key(1), &key(2), &key(9), 600).unwrap();
        t.transfer_from(&key(1), &key(9), &key(2), &key(3), 400).unwrap();
        assert_eq!(t.allowance(&key(1), &key(2), &key(9)).unwrap(), 200);
        assert_eq!(
            t.transfer_from(&key(1), &key(9), &key(2), &key(3), 300),
            Err(VaultError::InsufficientAllowance.into())
        );
        t.approve(&key(1), &key(2), &key(9), u64::MAX).unwrap();
        t.transfer_from(&key(1), &key(9), &key(2), &key(3), 300).unwrap();
        assert_eq!(t.allowance(&key(1), &key(2), &key(9)).unwrap(), u64::MAX);
    }

    #[test]
    fn test_mint_requires_authority() {
        let mut t = MemoryTokens::new();
        t.create_mint(&key(5), &key(6));
        assert_eq!(t.mint_to(&key(5), &key(7), &key(1), 10), Err(VaultError::OnlyPoolCanMint.into()));
        t.mint_to(&key(5), &key(6), &key(1), 10).unwrap();
        assert_eq!(t.burn(&key(5), &key(7), &key(1), 10), Err(VaultError::OnlyPoolCanBurn.into()));
        t.burn(&key(5), &key(6), &key(1), 10).unwrap();
        assert_eq!(t.total_supply(&key(5)), 0);
    }

    #[test]
    fn test_farm_pays_rewards_pro_rata() {
        let (lp, reward, farm_key) = (key(1), key(2), key(50));
        let mut t = MemoryTokens::new();
        let mut farm = MemoryFarm::new(&farm_key);
        let pid = farm.add_pool(&lp, &reward);
        for user in [key(10), key(11)] {
            t.credit(&lp, &user, 1_000);
            t.approve(&lp, &user, &farm_key, u64::MAX).unwrap();
        }
        farm.deposit(&mut t, pid, &key(10), 1_000).unwrap();
        farm.deposit(&mut t, pid, &key(11), 1_000).unwrap();
        farm.fund_rewards(&mut t, pid, 500).unwrap();

        assert_eq!(farm.pending_reward(pid, &key(10)), 250);
        farm.deposit(&mut t, pid, &key(10), 0).unwrap();
        assert_eq!(t.balance(&reward, &key(10)), 250);
        assert_eq!(farm.pending_reward(pid, &key(10)), 0);
        assert_eq!(farm.user_info(pid, &key(10)).unwrap(), 1_000);
    }

    #[test]
    fn test_farm_withdraw_and_emergency() {
        let (lp, reward, farm_key) = (key(1), key(2), key(50));
        let mut t = MemoryTokens::new();
        let mut farm = MemoryFarm::new(&farm_key);
        let pid = farm.add_pool(&lp, &reward);
        t.credit(&lp, &key(10), 1_000);
        t.approve(&lp, &key(10), &farm_key, u64::MAX).unwrap();
        farm.deposit(&mut t, pid, &key(10), 1_000).unwrap();

        assert_eq!(
            farm.withdraw(&mut t, pid, &key(10), 1_001),
            Err(VaultError::InsufficientBalance.into())
        );
        farm.withdraw(&mut t, pid, &key(10), 400).unwrap();
        assert_eq!(t.balance(&lp, &key(10)), 400);
        farm.fund_rewards(&mut t, pid, 100).unwrap();
        farm.emergency_withdraw(&mut t, pid, &key(10)).unwrap();
        assert_eq!(t.balance(&lp, &key(10)), 1_000);
        assert_eq!(t.balance(&reward, &key(10)), 0);
        assert_eq!(farm.user_info(pid, &key(10)).unwrap(), 0);
    }

    fn router_with_pair(t: &mut MemoryTokens) -> ConstantProductRouter {
        let (a, b, lp, r, lp_provider) = (key(1), key(2), key(3), key(40), key(41));
        let mut router = ConstantProductRouter::new(&r);
        router.create_pair(t, &a, &b, &lp);
        t.credit(&a, &lp_provider, 1_000_000);
        t.credit(&b, &lp_provider, 1_000_000);
        t.approve(&a, &lp_provider, &r, u64::MAX).unwrap();
        t.approve(&b, &lp_provider, &r, u64::MAX).unwrap();
        router
            .add_liquidity(
                t,
                &AddLiquidity {
                    token_a: a,
                    token_b: b,
                    amount_a_desired: 1_000_000,
                    amount_b_desired: 1_000_000,
                    amount_a_min: 0,
                    amount_b_min: 0,
                    owner: lp_provider,
                    to: lp_provider,
                },
            )
            .unwrap();
        router
    }

    #[test]
    fn test_router_swap_and_remove() {
        let mut t = MemoryTokens::new();
        let mut router = router_with_pair(&mut t);
        assert_eq!(t.balance(&key(3), &key(41)), 1_000_000);

        t.credit(&key(1), &key(7), 10_000);
        t.approve(&key(1), &key(7), &key(40), u64::MAX).unwrap();
        let swap = Swap {
            token_in: key(1),
            token_out: key(2),
            amount_in: 10_000,
            amount_out_min: 0,
            owner: key(7),
            to: key(7),
            supporting_fee_on_transfer: false,
        };
        router.swap_exact_tokens_for_tokens(&mut t, &swap).unwrap();
        let out = t.balance(&key(2), &key(7));
        assert_eq!(out, get_amount_out(10_000, 1_000_000, 1_000_000).unwrap());

        let removal = RemoveLiquidity {
            token_a: key(1),
            token_b: key(2),
            liquidity: 500_000,
            amount_a_min: 0,
            amount_b_min: 0,
            owner: key(41),
            to: key(41),
        };
        t.approve(&key(3), &key(41), &key(40), u64::MAX).unwrap();
        router.remove_liquidity(&mut t, &removal).unwrap();
        assert_eq!(t.balance(&key(1), &key(41)), 505_000);
        assert_eq!(t.balance(&key(3), &key(41)), 500_000);
        assert_eq!(router.pair(&key(1), &key(2)).unwrap().lp_supply, 500_000);
    }

    #[test]
    fn test_fee_token_needs_supporting_swap() {
        let mut t = MemoryTokens::new();
        let mut router = router_with_pair(&mut t);
        t.set_transfer_fee(&key(1), 200);
        t.credit(&key(1), &key(7), 10_000);
        t.approve(&key(1), &key(7), &key(40), u64::MAX).unwrap();
        let mut swap = Swap {
            token_in: key(1),
            token_out: key(2),
            amount_in: 10_000,
            amount_out_min: 0,
            owner: key(7),
            to: key(7),
            supporting_fee_on_transfer: false,
        };
        let mut plain = t.clone();
        assert_eq!(
            router.clone().swap_exact_tokens_for_tokens(&mut plain, &swap),
            Err(VaultError::ExternalCallFailed.into())
        );
        swap.supporting_fee_on_transfer = true;
        router.swap_exact_tokens_for_tokens(&mut t, &swap).unwrap();
        assert!(t.balance(&key(2), &key(7)) > 0);
    }
}
