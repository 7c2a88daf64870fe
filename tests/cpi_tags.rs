//! CPI tag verification tests.
//!
//! Token tags must match the SPL Token instruction enum. Tag mismatches =
//! calling the wrong instruction.
//!
//!   Tag 3: Transfer
//!   Tag 4: Approve
//!   Tag 7: MintTo
//!   Tag 8: Burn

use solana_program::pubkey::Pubkey;
use tranche_vault::cpi::{
    add_liquidity_data, farm_data, remove_liquidity_data, swap_data, token_amount_data, FARM_TAG_DEPOSIT,
    FARM_TAG_EMERGENCY_WITHDRAW, FARM_TAG_USER_INFO, FARM_TAG_WITHDRAW, ROUTER_TAG_ADD_LIQUIDITY,
    ROUTER_TAG_REMOVE_LIQUIDITY, ROUTER_TAG_SWAP, ROUTER_TAG_SWAP_SUPPORTING_FEE, SPL_TOKEN_PROGRAM_ID,
    TOKEN_2022_PROGRAM_ID, TOKEN_TAG_APPROVE, TOKEN_TAG_BURN, TOKEN_TAG_MINT_TO, TOKEN_TAG_TRANSFER,
};
use tranche_vault::ports::{AddLiquidity, RemoveLiquidity, Swap};

fn key(n: u8) -> Pubkey {
    Pubkey::new_from_array([n; 32])
}

fn swap(supporting_fee_on_transfer: bool) -> Swap {
    Swap {
        token_in: key(1),
        token_out: key(2),
        amount_in: 1_000,
        amount_out_min: 900,
        owner: key(3),
        to: key(3),
        supporting_fee_on_transfer,
    }
}

#[test]
fn test_spl_token_tags() {
    assert_eq!(TOKEN_TAG_TRANSFER, 3);
    assert_eq!(TOKEN_TAG_APPROVE, 4);
    assert_eq!(TOKEN_TAG_MINT_TO, 7);
    assert_eq!(TOKEN_TAG_BURN, 8);
}

#[test]
fn test_token_amount_layout() {
    let data = token_amount_data(TOKEN_TAG_TRANSFER, 0x0102_0304_0506_0708);
    assert_eq!(data.len(), 9);
    assert_eq!(data[0], 3);
    assert_eq!(&data[1..9], &0x0102_0304_0506_0708u64.to_le_bytes());
}

#[test]
fn test_token_program_ids() {
    assert_eq!(SPL_TOKEN_PROGRAM_ID.to_string(), "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
    assert_eq!(TOKEN_2022_PROGRAM_ID.to_string(), "TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");
}

#[test]
fn test_farm_tags_distinct() {
    let tags = [FARM_TAG_DEPOSIT, FARM_TAG_WITHDRAW, FARM_TAG_EMERGENCY_WITHDRAW, FARM_TAG_USER_INFO];
    for (i, a) in tags.iter().enumerate() {
        for b in &tags[i + 1..] {
            assert_ne!(a, b);
        }
    }
    let data = farm_data(FARM_TAG_WITHDRAW, 7, 500);
    assert_eq!(data.len(), 17);
    assert_eq!(data[0], FARM_TAG_WITHDRAW);
    assert_eq!(&data[1..9], &7u64.to_le_bytes());
    assert_eq!(&data[9..17], &500u64.to_le_bytes());
}

#[test]
fn test_swap_tag_follows_fee_flag() {
    // CRITICAL: fee-on-transfer tokens revert on the plain swap path
    assert_eq!(swap_data(&swap(false))[0], ROUTER_TAG_SWAP);
    assert_eq!(swap_data(&swap(true))[0], ROUTER_TAG_SWAP_SUPPORTING_FEE);
    assert_ne!(ROUTER_TAG_SWAP, ROUTER_TAG_SWAP_SUPPORTING_FEE);

    let data = swap_data(&swap(false));
    assert_eq!(data.len(), 81);
    assert_eq!(&data[1..9], &1_000u64.to_le_bytes());
    assert_eq!(&data[9..17], &900u64.to_le_bytes());
    assert_eq!(&data[17..49], key(1).as_ref());
    assert_eq!(&data[49..81], key(2).as_ref());
}

#[test]
fn test_liquidity_layouts() {
    let removal = RemoveLiquidity {
        token_a: key(1),
        token_b: key(2),
        liquidity: 42,
        amount_a_min: 1,
        amount_b_min: 2,
        owner: key(3),
        to: key(3),
    };
    let data = remove_liquidity_data(&removal);
    assert_eq!(data[0], ROUTER_TAG_REMOVE_LIQUIDITY);
    assert_eq!(data.len(), 89);
    assert_eq!(&data[1..9], &42u64.to_le_bytes());

    let addition = AddLiquidity {
        token_a: key(1),
        token_b: key(2),
        amount_a_desired: 10,
        amount_b_desired: 20,
        amount_a_min: 0,
        amount_b_min: 0,
        owner: key(3),
        to: key(3),
    };
    let data = add_liquidity_data(&addition);
    assert_eq!(data[0], ROUTER_TAG_ADD_LIQUIDITY);
    assert_eq!(data.len(), 97);
    assert_eq!(&data[9..17], &20u64.to_le_bytes());
    assert_eq!(&data[65..97], key(2).as_ref());
}
