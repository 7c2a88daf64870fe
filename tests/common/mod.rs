//! Shared fixture: a full deployment on the in-memory venues.
//!
//! Tokens: MJT (farm reward), WKCS, USDC (insurance asset). The pool's base
//! asset is the MJT/WKCS pair LP, which the farm stakes on pid 0.

#![allow(dead_code)]

use solana_program::pubkey::Pubkey;
use tranche_vault::adapter::{Adapter, FarmAdapter, PassThroughAdapter};
use tranche_vault::compounder::Autocompounder;
use tranche_vault::deployment::{ConversionArgs, Deployment};
use tranche_vault::fund::InsuranceFund;
use tranche_vault::pool::SharePool;
use tranche_vault::ports::{AddLiquidity, Router, TokenLedger};
use tranche_vault::sim::{ConstantProductRouter, MemoryFarm, MemoryTokens, RouterBook};
use tranche_vault::state::AdapterKind;

pub const UNIT: u64 = 1_000_000_000;
pub const SEED_LIQUIDITY: u64 = 1_000_000 * UNIT;
pub const USER_LP: u64 = 1_000 * UNIT;
pub const USER_USDC: u64 = 1_000 * UNIT;

pub const OP_REMOVE: u8 = 0b0001;
pub const OP_SWAP: u8 = 0b0010;
pub const OP_ADD: u8 = 0b0100;
pub const OP_FEE: u8 = 0b1000;

pub fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

pub struct Keys {
    pub governance: Pubkey,
    pub alice: Pubkey,
    pub bob: Pubkey,
    pub carol: Pubkey,
    pub treasury: Pubkey,
    pub seeder: Pubkey,
    pub mjt: Pubkey,
    pub wkcs: Pubkey,
    pub usdc: Pubkey,
    pub lp: Pubkey,
    pub lp_mjt_usdc: Pubkey,
    pub lp_wkcs_usdc: Pubkey,
    pub share_mint: Pubkey,
    pub router: Pubkey,
    pub farm: Pubkey,
    pub pool: Pubkey,
    pub adapter: Pubkey,
    pub compounder: Pubkey,
    pub fund: Pubkey,
}

impl Keys {
    pub fn new() -> Self {
        Self {
            governance: key(1),
            alice: key(2),
            bob: key(3),
            carol: key(4),
            treasury: key(5),
            seeder: key(6),
            mjt: key(10),
            wkcs: key(11),
            usdc: key(12),
            lp: key(13),
            lp_mjt_usdc: key(14),
            lp_wkcs_usdc: key(15),
            share_mint: key(16),
            router: key(20),
            farm: key(21),
            pool: key(30),
            adapter: key(31),
            compounder: key(32),
            fund: key(33),
        }
    }

    pub fn compounder_conversions(&self) -> ConversionArgs {
        ConversionArgs {
            routers: vec![self.router],
            tokens_from: vec![self.mjt],
            tokens_to: vec![self.wkcs],
            percentages: vec![50],
            operations: vec![OP_SWAP | OP_ADD | OP_FEE],
        }
    }

    pub fn fund_conversions(&self) -> ConversionArgs {
        ConversionArgs {
            routers: vec![self.router; 3],
            tokens_from: vec![self.mjt, self.mjt, self.wkcs],
            tokens_to: vec![self.wkcs, self.usdc, self.usdc],
            percentages: vec![100; 3],
            operations: vec![OP_REMOVE, OP_SWAP | OP_FEE, OP_SWAP | OP_FEE],
        }
    }
}

fn seed_pair(tokens: &mut MemoryTokens, router: &mut ConstantProductRouter, k: &Keys, a: &Pubkey, b: &Pubkey) {
    add_liquidity(tokens, router, k, &k.seeder, a, b, SEED_LIQUIDITY);
}

/// Mint `amount` of both tokens to `user` and add them to the a/b pair.
fn add_liquidity(
    tokens: &mut MemoryTokens,
    router: &mut ConstantProductRouter,
    k: &Keys,
    user: &Pubkey,
    a: &Pubkey,
    b: &Pubkey,
    amount: u64,
) {
    tokens.credit(a, user, amount);
    tokens.credit(b, user, amount);
    tokens.approve(a, user, &k.router, u64::MAX).unwrap();
    tokens.approve(b, user, &k.router, u64::MAX).unwrap();
    router
        .add_liquidity(
            tokens,
            &AddLiquidity {
                token_a: *a,
                token_b: *b,
                amount_a_desired: amount,
                amount_b_desired: amount,
                amount_a_min: 0,
                amount_b_min: 0,
                owner: *user,
                to: *user,
            },
        )
        .unwrap();
}

/// Open pool wired to `kind`, conversions configured, users funded with
/// `USER_LP` base asset and `USER_USDC` insurance asset.
pub fn deployment(kind: AdapterKind) -> (Deployment, Keys) {
    let k = Keys::new();
    let gov = k.governance;

    let mut tokens = MemoryTokens::new();
    tokens.create_mint(&k.share_mint, &k.pool);

    let mut router = ConstantProductRouter::new(&k.router);
    router.create_pair(&mut tokens, &k.mjt, &k.wkcs, &k.lp);
    router.create_pair(&mut tokens, &k.mjt, &k.usdc, &k.lp_mjt_usdc);
    router.create_pair(&mut tokens, &k.wkcs, &k.usdc, &k.lp_wkcs_usdc);
    seed_pair(&mut tokens, &mut router, &k, &k.mjt, &k.wkcs);
    seed_pair(&mut tokens, &mut router, &k, &k.mjt, &k.usdc);
    seed_pair(&mut tokens, &mut router, &k, &k.wkcs, &k.usdc);

    for user in [k.alice, k.bob, k.carol] {
        add_liquidity(&mut tokens, &mut router, &k, &user, &k.mjt, &k.wkcs, USER_LP);
        tokens.credit(&k.usdc, &user, USER_USDC);
    }

    let mut farm = MemoryFarm::new(&k.farm);
    let pid = farm.add_pool(&k.lp, &k.mjt);
    assert_eq!(pid, 0);

    let mut routers = RouterBook::new();
    routers.insert(router);

    let mut pool = SharePool::initialize(&k.pool, 255, &gov, &k.lp, &k.share_mint, &k.adapter).unwrap();
    pool.set_fee_manager(&gov, &k.fund).unwrap();
    pool.shut_down_pool(&gov, false).unwrap();
    pool.disable_deposits(&gov, false).unwrap();

    let adapter = match kind {
        AdapterKind::LiveFarm => {
            let compounder =
                Autocompounder::initialize(&k.compounder, 254, &gov, &k.adapter, &k.lp, &k.farm, pid).unwrap();
            Adapter::LiveFarm(FarmAdapter::initialize(&k.adapter, 253, &gov, &k.pool, compounder).unwrap())
        }
        AdapterKind::TestDouble => {
            Adapter::TestDouble(PassThroughAdapter::initialize(&k.adapter, 253, &gov, &k.pool, &k.lp).unwrap())
        }
    };
    let fund = InsuranceFund::initialize(&k.fund, 252, &gov, &k.pool, &k.usdc, &k.lp).unwrap();

    let mut d = Deployment::new(tokens, farm, routers, pool, adapter, fund);
    if kind == AdapterKind::LiveFarm {
        d.init_compounder_conversions(&gov, &k.compounder_conversions()).unwrap();
    }
    d.init_fund_conversions(&gov, &k.fund_conversions()).unwrap();
    (d, k)
}

pub fn shares_of(d: &Deployment, k: &Keys, owner: &Pubkey) -> u64 {
    d.tokens.balance(&k.share_mint, owner)
}

pub fn lp_of(d: &Deployment, k: &Keys, owner: &Pubkey) -> u64 {
    d.tokens.balance(&k.lp, owner)
}
