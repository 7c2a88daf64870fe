use solana_program::{program_error::ProgramError, pubkey::Pubkey};

use crate::state::AdapterKind;

/// Which governed account an instruction addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Component {
    Pool = 0,
    Adapter = 1,
    Compounder = 2,
    Fund = 3,
}

impl TryFrom<u8> for Component {
    type Error = ProgramError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            0 => Ok(Component::Pool),
            1 => Ok(Component::Adapter),
            2 => Ok(Component::Compounder),
            3 => Ok(Component::Fund),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}

/// One encoded conversion step: router(32) + from(32) + to(32) + percentage(1) + operations(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConversionEntry {
    pub router: Pubkey,
    pub token_from: Pubkey,
    pub token_to: Pubkey,
    pub percentage: u8,
    pub operations: u8,
}

pub const CONVERSION_ENTRY_LEN: usize = 98;

/// Instructions for the tranche vault program.
///
/// Every instruction takes the same account frame; slots an instruction
/// does not touch may hold any account (the system program is customary).
///
///   0. `[signer, writable]` Caller (pays rent for created accounts)
///   1. `[writable]` Pool PDA
///   2. `[writable]` Adapter PDA
///   3. `[writable]` Autocompounder PDA
///   4. `[writable]` Insurance fund PDA
///   5. `[writable]` Position PDA
///   6. `[]` Token program
///   7. `[]` Farm program
///   8. `[]` Router program
///   9. `[]` System program
///  10.. Token accounts and mints touched by the call, then any accounts the
///       farm or router programs need, in their own order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultInstruction {
    /// Create the pool PDA for `base_asset`. Caller becomes governance.
    /// The adapter is bound to the adapter PDA of the new pool.
    InitPool { base_asset: Pubkey, share_mint: Pubkey },

    /// Create the adapter PDA. `LiveFarm` requires an initialized
    /// autocompounder in slot 3.
    InitAdapter { kind: AdapterKind, base_asset: Pubkey },

    /// Create the autocompounder PDA staking `base_asset` in `chef` pool `pid`.
    InitCompounder { base_asset: Pubkey, chef: Pubkey, pid: u64 },

    /// Create the insurance fund PDA.
    InitFund { insurance_asset: Pubkey, base_asset: Pubkey },

    /// Deposit base asset, receive shares.
    Deposit { amount: u64 },

    /// Burn shares, receive base asset.
    Withdraw { shares: u64 },

    /// Fold adapter holdings into the exchange rate. Permissionless.
    UpdateExchangeRate,

    /// Governance override while shut down. Selector 0 = senior rate,
    /// 2 = fees holdings.
    SetExchangeRate { selector: u8, value: u128 },

    /// Pay accrued fees to `to`. Governance or fee manager.
    WithdrawFees { to: Pubkey },

    ShutDownPool { shut_down: bool },
    DisableDeposits { disabled: bool },
    SetAdapter { adapter: Pubkey },
    SetFeeManager { fee_manager: Pubkey },
    SetFeeRate { fee_rate_bps: u64 },
    SetUnfreezeDelay { seconds: u64 },

    /// Move a stray token out of a component's holdings.
    SweepErc { component: Component, token: Pubkey, to: Pubkey },

    ProposeGovernance { component: Component, new_governance: Pubkey },
    AcceptGovernance { component: Component },

    /// Start the unlock delay of the position in slot 5.
    BeginUnfreeze { id: u64 },

    TransferPosition { id: u64, to: Pubkey },

    /// Harvest rewards and restake them. Permissionless.
    Autocompound,

    /// Replace the conversion table of the autocompounder or the fund.
    /// Data: component(1) + count(1) + count * 98 bytes.
    InitConversions { component: Component, conversions: Vec<ConversionEntry> },

    SetChef { chef: Pubkey },
    ResetApprovals,
    SetAutocompoundEnabled { enabled: bool },
    CompounderEmergencyWithdraw { pid: u64, amount: u64 },
    SetAutocompounder { compounder: Pubkey },
    SetLp { lp: Pubkey },
    SetAdapterPool { pool: Pubkey },

    /// Deposit insurance asset. Mints the position PDA for the pool's next id.
    FundDeposit { amount: u64 },

    /// Convert the pool's accrued fees into insurance asset. Permissionless.
    FundUpdate,

    FundWithdraw { id: u64 },
    FundEmergencyWithdraw { id: u64 },
    SetFundPool { pool: Pubkey },
    SetTreasury { treasury: Pubkey },
    SetTreasuryFee { bps: u64 },

    /// Return data: pending earnings (u64 LE) of position `id`.
    PendingEarnings { id: u64 },

    /// Return data: adapter holdings (u64 LE).
    GetHoldings,

    /// Create the `mint` vault of a component: the token account PDA
    /// `[b"vault", component, mint]`, passed first after the frame and
    /// followed by the mint. Permissionless; the caller pays rent.
    InitVault { component: Component, mint: Pubkey },
}

fn read_u8(rest: &[u8], at: usize) -> Result<u8, ProgramError> {
    rest.get(at).copied().ok_or(ProgramError::InvalidInstructionData)
}

fn read_bool(rest: &[u8], at: usize) -> Result<bool, ProgramError> {
    Ok(read_u8(rest, at)? != 0)
}

fn read_u64(rest: &[u8], at: usize) -> Result<u64, ProgramError> {
    rest.get(at..at + 8)
        .and_then(|b| b.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_u128(rest: &[u8], at: usize) -> Result<u128, ProgramError> {
    rest.get(at..at + 16)
        .and_then(|b| b.try_into().ok())
        .map(u128::from_le_bytes)
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_pubkey(rest: &[u8], at: usize) -> Result<Pubkey, ProgramError> {
    rest.get(at..at + 32)
        .and_then(|b| Pubkey::try_from(b).ok())
        .ok_or(ProgramError::InvalidInstructionData)
}

fn read_component(rest: &[u8], at: usize) -> Result<Component, ProgramError> {
    Component::try_from(read_u8(rest, at)?)
}

fn read_conversions(rest: &[u8]) -> Result<Vec<ConversionEntry>, ProgramError> {
    let count = read_u8(rest, 0)? as usize;
    let body = &rest[1..];
    if body.len() < count * CONVERSION_ENTRY_LEN {
        return Err(ProgramError::InvalidInstructionData);
    }
    body.chunks_exact(CONVERSION_ENTRY_LEN)
        .take(count)
        .map(|c| {
            Ok(ConversionEntry {
                router: read_pubkey(c, 0)?,
                token_from: read_pubkey(c, 32)?,
                token_to: read_pubkey(c, 64)?,
                percentage: read_u8(c, 96)?,
                operations: read_u8(c, 97)?,
            })
        })
        .collect()
}

impl VaultInstruction {
    pub fn unpack(data: &[u8]) -> Result<Self, ProgramError> {
        let (&tag, rest) = data.split_first().ok_or(ProgramError::InvalidInstructionData)?;

        match tag {
            0 => Ok(Self::InitPool {
                base_asset: read_pubkey(rest, 0)?,
                share_mint: read_pubkey(rest, 32)?,
            }),
            1 => Ok(Self::InitAdapter {
                kind: AdapterKind::try_from(read_u8(rest, 0)?)
                    .map_err(|_| ProgramError::InvalidInstructionData)?,
                base_asset: read_pubkey(rest, 1)?,
            }),
            2 => Ok(Self::InitCompounder {
                base_asset: read_pubkey(rest, 0)?,
                chef: read_pubkey(rest, 32)?,
                pid: read_u64(rest, 64)?,
            }),
            3 => Ok(Self::InitFund {
                insurance_asset: read_pubkey(rest, 0)?,
                base_asset: read_pubkey(rest, 32)?,
            }),
            4 => Ok(Self::Deposit { amount: read_u64(rest, 0)? }),
            5 => Ok(Self::Withdraw { shares: read_u64(rest, 0)? }),
            6 => Ok(Self::UpdateExchangeRate),
            7 => Ok(Self::SetExchangeRate {
                selector: read_u8(rest, 0)?,
                value: read_u128(rest, 1)?,
            }),
            8 => Ok(Self::WithdrawFees { to: read_pubkey(rest, 0)? }),
            9 => Ok(Self::ShutDownPool { shut_down: read_bool(rest, 0)? }),
            10 => Ok(Self::DisableDeposits { disabled: read_bool(rest, 0)? }),
            11 => Ok(Self::SetAdapter { adapter: read_pubkey(rest, 0)? }),
            12 => Ok(Self::SetFeeManager { fee_manager: read_pubkey(rest, 0)? }),
            13 => Ok(Self::SetFeeRate { fee_rate_bps: read_u64(rest, 0)? }),
            14 => Ok(Self::SetUnfreezeDelay { seconds: read_u64(rest, 0)? }),
            15 => Ok(Self::SweepErc {
                component: read_component(rest, 0)?,
                token: read_pubkey(rest, 1)?,
                to: read_pubkey(rest, 33)?,
            }),
            16 => Ok(Self::ProposeGovernance {
                component: read_component(rest, 0)?,
                new_governance: read_pubkey(rest, 1)?,
            }),
            17 => Ok(Self::AcceptGovernance { component: read_component(rest, 0)? }),
            18 => Ok(Self::BeginUnfreeze { id: read_u64(rest, 0)? }),
            19 => Ok(Self::TransferPosition {
                id: read_u64(rest, 0)?,
                to: read_pubkey(rest, 8)?,
            }),
            20 => Ok(Self::Autocompound),
            21 => {
                let component = read_component(rest, 0)?;
                if !matches!(component, Component::Compounder | Component::Fund) {
                    return Err(ProgramError::InvalidInstructionData);
                }
                Ok(Self::InitConversions {
                    component,
                    conversions: read_conversions(&rest[1..])?,
                })
            }
            22 => Ok(Self::SetChef { chef: read_pubkey(rest, 0)? }),
            23 => Ok(Self::ResetApprovals),
            24 => Ok(Self::SetAutocompoundEnabled { enabled: read_bool(rest, 0)? }),
            25 => Ok(Self::CompounderEmergencyWithdraw {
                pid: read_u64(rest, 0)?,
                amount: read_u64(rest, 8)?,
            }),
            26 => Ok(Self::SetAutocompounder { compounder: read_pubkey(rest, 0)? }),
            27 => Ok(Self::SetLp { lp: read_pubkey(rest, 0)? }),
            28 => Ok(Self::SetAdapterPool { pool: read_pubkey(rest, 0)? }),
            29 => Ok(Self::FundDeposit { amount: read_u64(rest, 0)? }),
            30 => Ok(Self::FundUpdate),
            31 => Ok(Self::FundWithdraw { id: read_u64(rest, 0)? }),
            32 => Ok(Self::FundEmergencyWithdraw { id: read_u64(rest, 0)? }),
            33 => Ok(Self::SetFundPool { pool: read_pubkey(rest, 0)? }),
            34 => Ok(Self::SetTreasury { treasury: read_pubkey(rest, 0)? }),
            35 => Ok(Self::SetTreasuryFee { bps: read_u64(rest, 0)? }),
            36 => Ok(Self::PendingEarnings { id: read_u64(rest, 0)? }),
            37 => Ok(Self::GetHoldings),
            38 => Ok(Self::InitVault {
                component: read_component(rest, 0)?,
                mint: read_pubkey(rest, 1)?,
            }),
            _ => Err(ProgramError::InvalidInstructionData),
        }
    }
}
