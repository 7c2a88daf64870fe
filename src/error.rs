use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use solana_program::program_error::ProgramError;
use thiserror::Error;

/// Coarse failure classes. Callers decide retry policy from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks the role the operation requires.
    Authorization,
    /// Operation is not valid in the current lifecycle state.
    State,
    /// Malformed input.
    Validation,
    /// Balance math underflowed or overflowed.
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, FromPrimitive)]
#[repr(u32)]
pub enum VaultError {
    /// Account already holds initialized state
    #[error("account already initialized")]
    AlreadyInitialized = 0,
    /// Account has no initialized state
    #[error("account not initialized")]
    NotInitialized = 1,
    #[error("must be governance")]
    MustBeGovernance = 2,
    #[error("must be new governance")]
    MustBeNewGovernance = 3,
    #[error("must be pool")]
    MustBePool = 4,
    #[error("must be adapter")]
    MustBeAdapter = 5,
    /// Caller does not own the position
    #[error("must be owner")]
    MustBeOwner = 6,
    /// Only governance or the fee manager may pull fees
    #[error("withdraw unauthorized")]
    WithdrawUnauthorized = 7,
    #[error("only pool can mint")]
    OnlyPoolCanMint = 8,
    #[error("only pool can burn")]
    OnlyPoolCanBurn = 9,
    #[error("must be fee manager")]
    MustBeFeeManager = 10,
    #[error("deposits disabled")]
    DepositsDisabled = 11,
    #[error("pool shut down")]
    PoolShutDown = 12,
    /// Withdrawals are paused while the pool is shut down
    #[error("removal paused")]
    RemovalPaused = 13,
    /// Emergency setters only work on a shut down pool
    #[error("pool must be shut down")]
    PoolMustBeShutDown = 14,
    #[error("NFT already unfreezing")]
    AlreadyUnfreezing = 15,
    /// Position is not unlocking yet, or its delay has not elapsed
    #[error("can't redeem NFT: too early")]
    TooEarly = 16,
    #[error("conversions not initialized")]
    ConversionsNotSet = 17,
    #[error("can't deposit 0")]
    ZeroAmount = 18,
    #[error("can't use 0 address")]
    ZeroAddress = 19,
    /// Conversion arrays empty, of unequal length, or too long
    #[error("invalid conversions")]
    InvalidConversions = 20,
    #[error("bad percentage")]
    BadPercentage = 21,
    #[error("must be insurance NFT")]
    MustBeInsuranceNft = 22,
    #[error("invalid tranche")]
    InvalidTranche = 23,
    #[error("position not found")]
    PositionNotFound = 24,
    #[error("insufficient share balance")]
    InsufficientShares = 25,
    /// Requested more than the holder has
    #[error("ds-math-sub-underflow")]
    InsufficientBalance = 26,
    #[error("insufficient allowance")]
    InsufficientAllowance = 27,
    #[error("math overflow")]
    MathOverflow = 28,
    #[error("math underflow")]
    MathUnderflow = 29,
    /// Sweeping a token the component accounts for
    #[error("can't sweep tracked asset")]
    ProtectedToken = 30,
    #[error("account kind mismatch")]
    InvalidAccountKind = 31,
    #[error("invalid PDA derivation")]
    InvalidPda = 32,
    /// Passed account differs from the key stored in state
    #[error("account does not match stored key")]
    AccountMismatch = 33,
    #[error("router not registered")]
    RouterNotFound = 34,
    #[error("pair not found")]
    PairNotFound = 35,
    /// Invariant check inside an external venue failed
    #[error("external call failed")]
    ExternalCallFailed = 36,
}

impl VaultError {
    pub fn kind(self) -> ErrorKind {
        use VaultError::*;
        match self {
            MustBeGovernance | MustBeNewGovernance | MustBePool | MustBeAdapter | MustBeOwner
            | WithdrawUnauthorized | OnlyPoolCanMint | OnlyPoolCanBurn | MustBeFeeManager
            | InsufficientAllowance => ErrorKind::Authorization,
            AlreadyInitialized | NotInitialized | DepositsDisabled | PoolShutDown
            | RemovalPaused | PoolMustBeShutDown | AlreadyUnfreezing | TooEarly
            | ConversionsNotSet | ExternalCallFailed => ErrorKind::State,
            ZeroAmount | ZeroAddress | InvalidConversions | BadPercentage | MustBeInsuranceNft
            | InvalidTranche | PositionNotFound | ProtectedToken | InvalidAccountKind | InvalidPda
            | AccountMismatch | RouterNotFound | PairNotFound => ErrorKind::Validation,
            InsufficientShares | InsufficientBalance | MathOverflow | MathUnderflow => {
                ErrorKind::Arithmetic
            }
        }
    }

    /// Recover the variant behind a `ProgramError::Custom` code.
    pub fn from_code(code: u32) -> Option<Self> {
        Self::from_u32(code)
    }

    pub fn from_program_error(err: &ProgramError) -> Option<Self> {
        match err {
            ProgramError::Custom(code) => Self::from_code(*code),
            _ => None,
        }
    }
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::Custom(e as u32)
    }
}
