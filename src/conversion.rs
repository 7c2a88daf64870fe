//! Conversion routing: ordered remove-liquidity / swap / add-liquidity steps
//! executed against registered routers.
//!
//! Each step acts on a percentage of the holder's *current* balance, so
//! earlier steps feed later ones. Received amounts are always measured as
//! balance deltas, which keeps fee-on-transfer tokens honest.

use bytemuck::Zeroable;
use enumflags2::{bitflags, BitFlags};
use solana_program::{msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;
use crate::math;
use crate::ports::{AddLiquidity, Externals, RemoveLiquidity, Swap};
use crate::state::{ConversionSlot, ConversionTable, MAX_CONVERSIONS};

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionOp {
    RemoveLiquidity = 0b0001,
    Swap = 0b0010,
    AddLiquidity = 0b0100,
    /// Swap through the fee-on-transfer tolerant path
    SupportFeeOnTransfer = 0b1000,
}

pub type ConversionOps = BitFlags<ConversionOp>;

/// Decoded conversion step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversion {
    pub router: Pubkey,
    pub token_from: Pubkey,
    pub token_to: Pubkey,
    pub percentage: u8,
    pub operations: ConversionOps,
}

impl Conversion {
    fn from_slot(slot: &ConversionSlot) -> Self {
        Self {
            router: Pubkey::new_from_array(slot.router),
            token_from: Pubkey::new_from_array(slot.token_from),
            token_to: Pubkey::new_from_array(slot.token_to),
            percentage: slot.percentage,
            operations: BitFlags::from_bits_truncate(slot.operations),
        }
    }
}

/// One movement performed while converting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionReceipt {
    pub token_from: Pubkey,
    pub token_to: Pubkey,
    pub amount_from: u64,
    pub amount_to: u64,
}

impl ConversionTable {
    /// Validate parallel arrays and pack them into a table.
    ///
    /// Fails with `InvalidConversions` when the arrays are empty, differ in
    /// length, exceed `MAX_CONVERSIONS`, name a zero key, or carry unknown or
    /// empty operation bits; with `BadPercentage` when a percentage exceeds 100.
    pub fn build(
        routers: &[Pubkey],
        tokens_from: &[Pubkey],
        tokens_to: &[Pubkey],
        percentages: &[u8],
        operations: &[u8],
    ) -> Result<Self, ProgramError> {
        let len = routers.len();
        if len == 0
            || len > MAX_CONVERSIONS
            || tokens_from.len() != len
            || tokens_to.len() != len
            || percentages.len() != len
            || operations.len() != len
        {
            return Err(VaultError::InvalidConversions.into());
        }

        let mut table = ConversionTable::zeroed();
        for i in 0..len {
            if percentages[i] > math::MAX_PERCENTAGE {
                return Err(VaultError::BadPercentage.into());
            }
            let ops = ConversionOps::from_bits(operations[i])
                .map_err(|_| ProgramError::from(VaultError::InvalidConversions))?;
            if ops.is_empty() {
                return Err(VaultError::InvalidConversions.into());
            }
            let zero = Pubkey::default();
            if routers[i] == zero || tokens_from[i] == zero || tokens_to[i] == zero {
                return Err(VaultError::InvalidConversions.into());
            }
            table.slots[i] = ConversionSlot {
                router: routers[i].to_bytes(),
                token_from: tokens_from[i].to_bytes(),
                token_to: tokens_to[i].to_bytes(),
                percentage: percentages[i],
                operations: ops.bits(),
                _padding: [0; 6],
            };
        }
        table.len = len as u8;
        Ok(table)
    }

    pub fn is_configured(&self) -> bool {
        self.len > 0
    }

    pub fn entries(&self) -> impl Iterator<Item = Conversion> + '_ {
        let len = (self.len as usize).min(MAX_CONVERSIONS);
        self.slots[..len].iter().map(Conversion::from_slot)
    }

    /// Distinct routers in table order.
    pub fn routers(&self) -> Vec<Pubkey> {
        let mut out: Vec<Pubkey> = Vec::new();
        for c in self.entries() {
            if !out.contains(&c.router) {
                out.push(c.router);
            }
        }
        out
    }
}

/// Run every step of `table` for `holder`.
///
/// Rejected with `ConversionsNotSet` when the table is empty. Any failing
/// step fails the whole call.
pub fn run_conversions(
    table: &ConversionTable,
    holder: &Pubkey,
    ext: &mut Externals,
) -> Result<Vec<ConversionReceipt>, ProgramError> {
    if !table.is_configured() {
        return Err(VaultError::ConversionsNotSet.into());
    }
    let mut receipts = Vec::new();
    for conversion in table.entries() {
        convert_step(&conversion, holder, ext, &mut receipts)?;
    }
    Ok(receipts)
}

fn convert_step(
    conversion: &Conversion,
    holder: &Pubkey,
    ext: &mut Externals,
    receipts: &mut Vec<ConversionReceipt>,
) -> Result<(), ProgramError> {
    let from = conversion.token_from;
    let to = conversion.token_to;
    let ops = conversion.operations;

    let router = ext
        .routers
        .router_mut(&conversion.router)
        .ok_or(VaultError::RouterNotFound)?;

    if ops.contains(ConversionOp::RemoveLiquidity) {
        let pair = router.pair_for(&from, &to).ok_or(VaultError::PairNotFound)?;
        let liquidity = math::percent_of(ext.tokens.balance_of(&pair, holder)?, conversion.percentage)
            .ok_or(VaultError::MathOverflow)?;
        if liquidity > 0 {
            let before_from = ext.tokens.balance_of(&from, holder)?;
            let before_to = ext.tokens.balance_of(&to, holder)?;
            router.remove_liquidity(
                &mut *ext.tokens,
                &RemoveLiquidity {
                    token_a: from,
                    token_b: to,
                    liquidity,
                    amount_a_min: 0,
                    amount_b_min: 0,
                    owner: *holder,
                    to: *holder,
                },
            )?;
            let got_from = ext.tokens.balance_of(&from, holder)?.saturating_sub(before_from);
            let got_to = ext.tokens.balance_of(&to, holder)?.saturating_sub(before_to);
            msg!("FundsConverted: {} {} -> {} {} + {} {}", liquidity, pair, got_from, from, got_to, to);
            receipts.push(ConversionReceipt { token_from: pair, token_to: from, amount_from: liquidity, amount_to: got_from });
            receipts.push(ConversionReceipt { token_from: pair, token_to: to, amount_from: 0, amount_to: got_to });
        }
    }

    if ops.contains(ConversionOp::Swap) {
        let amount_in = math::percent_of(ext.tokens.balance_of(&from, holder)?, conversion.percentage)
            .ok_or(VaultError::MathOverflow)?;
        if amount_in > 0 {
            let before = ext.tokens.balance_of(&to, holder)?;
            router.swap_exact_tokens_for_tokens(
                &mut *ext.tokens,
                &Swap {
                    token_in: from,
                    token_out: to,
                    amount_in,
                    amount_out_min: 0,
                    owner: *holder,
                    to: *holder,
                    supporting_fee_on_transfer: ops.contains(ConversionOp::SupportFeeOnTransfer),
                },
            )?;
            let amount_to = ext.tokens.balance_of(&to, holder)?.saturating_sub(before);
            msg!("FundsConverted: {} {} -> {} {}", amount_in, from, amount_to, to);
            receipts.push(ConversionReceipt { token_from: from, token_to: to, amount_from: amount_in, amount_to });
        }
    }

    if ops.contains(ConversionOp::AddLiquidity) {
        let amount_a = ext.tokens.balance_of(&from, holder)?;
        let amount_b = ext.tokens.balance_of(&to, holder)?;
        if amount_a > 0 && amount_b > 0 {
            let pair = router.pair_for(&from, &to).ok_or(VaultError::PairNotFound)?;
            let before = ext.tokens.balance_of(&pair, holder)?;
            router.add_liquidity(
                &mut *ext.tokens,
                &AddLiquidity {
                    token_a: from,
                    token_b: to,
                    amount_a_desired: amount_a,
                    amount_b_desired: amount_b,
                    amount_a_min: 0,
                    amount_b_min: 0,
                    owner: *holder,
                    to: *holder,
                },
            )?;
            let minted = ext.tokens.balance_of(&pair, holder)?.saturating_sub(before);
            msg!("FundsConverted: {} {} + {} {} -> {} {}", amount_a, from, amount_b, to, minted, pair);
            receipts.push(ConversionReceipt { token_from: from, token_to: pair, amount_from: amount_a, amount_to: minted });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(n: u8) -> Pubkey {
        Pubkey::new_from_array([n; 32])
    }

    const SWAP_FEE_ADD: u8 = 0b1110;

    #[test]
    fn test_build_single_step() {
        let t = ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[50], &[SWAP_FEE_ADD]).unwrap();
        assert!(t.is_configured());
        let steps: Vec<Conversion> = t.entries().collect();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].percentage, 50);
        assert!(steps[0].operations.contains(ConversionOp::Swap));
        assert!(steps[0].operations.contains(ConversionOp::SupportFeeOnTransfer));
        assert!(steps[0].operations.contains(ConversionOp::AddLiquidity));
        assert!(!steps[0].operations.contains(ConversionOp::RemoveLiquidity));
    }

    #[test]
    fn test_percentage_bounds() {
        assert!(ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[100], &[2]).is_ok());
        assert_eq!(
            ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[101], &[2]),
            Err(VaultError::BadPercentage.into())
        );
        assert!(ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[0], &[2]).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_mismatched() {
        assert_eq!(
            ConversionTable::build(&[], &[], &[], &[], &[]),
            Err(VaultError::InvalidConversions.into())
        );
        assert_eq!(
            ConversionTable::build(&[key(1), key(1)], &[key(2)], &[key(3)], &[10], &[2]),
            Err(VaultError::InvalidConversions.into())
        );
        assert_eq!(
            ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[10, 20], &[2]),
            Err(VaultError::InvalidConversions.into())
        );
    }

    #[test]
    fn test_rejects_bad_operation_bits() {
        assert_eq!(
            ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[10], &[0]),
            Err(VaultError::InvalidConversions.into())
        );
        assert_eq!(
            ConversionTable::build(&[key(1)], &[key(2)], &[key(3)], &[10], &[0b1_0000]),
            Err(VaultError::InvalidConversions.into())
        );
    }

    #[test]
    fn test_rejects_too_many_steps() {
        let n = MAX_CONVERSIONS + 1;
        let keys = vec![key(1); n];
        assert_eq!(
            ConversionTable::build(&keys, &keys, &keys, &vec![10; n], &vec![2; n]),
            Err(VaultError::InvalidConversions.into())
        );
    }

    #[test]
    fn test_distinct_routers_keep_order() {
        let t = ConversionTable::build(
            &[key(5), key(4), key(5)],
            &[key(2); 3],
            &[key(3); 3],
            &[100; 3],
            &[2; 3],
        )
        .unwrap();
        assert_eq!(t.routers(), vec![key(5), key(4)]);
    }

    #[test]
    fn test_unconfigured_table() {
        assert!(!ConversionTable::zeroed().is_configured());
    }
}
