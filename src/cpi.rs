//! CPI-backed collaborators: SPL token accounts, the farm program, the
//! router program and the account-backed position store.
//!
//! Token instruction data is built by hand from the SPL token tags, so the
//! program does not link a token crate. Farm and router programs follow the
//! MasterChef / UniswapV2-router interface, encoded as tag + LE fields.

use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    instruction::{AccountMeta, Instruction},
    msg,
    program::{get_return_data, invoke_signed},
    program_error::ProgramError,
    pubkey::Pubkey,
};

use crate::error::VaultError;
use crate::ports::{AddLiquidity, Farm, PositionStore, RemoveLiquidity, Router, RouterRegistry, Swap, TokenLedger};
use crate::state::{derive_vault_pda, PositionRecord, KIND_POSITION, POSITION_RECORD_SIZE};

pub const SPL_TOKEN_PROGRAM_ID: Pubkey = solana_program::pubkey!("TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA");
pub const TOKEN_2022_PROGRAM_ID: Pubkey = solana_program::pubkey!("TokenzQdBNbLqP5VEhdkAS6EPFLC1PHnBqCXEpPxuEb");

// ═══════════════════════════════════════════════════════════════
// SPL token instruction tags (spl-token TokenInstruction)
// ═══════════════════════════════════════════════════════════════

pub const TOKEN_TAG_TRANSFER: u8 = 3;
pub const TOKEN_TAG_APPROVE: u8 = 4;
pub const TOKEN_TAG_MINT_TO: u8 = 7;
pub const TOKEN_TAG_BURN: u8 = 8;
pub const TOKEN_TAG_INITIALIZE_ACCOUNT3: u8 = 18;

// ═══════════════════════════════════════════════════════════════
// Farm and router instruction tags
// ═══════════════════════════════════════════════════════════════

pub const FARM_TAG_DEPOSIT: u8 = 0;
pub const FARM_TAG_WITHDRAW: u8 = 1;
pub const FARM_TAG_EMERGENCY_WITHDRAW: u8 = 2;
pub const FARM_TAG_USER_INFO: u8 = 3;

pub const ROUTER_TAG_SWAP: u8 = 0;
pub const ROUTER_TAG_SWAP_SUPPORTING_FEE: u8 = 1;
pub const ROUTER_TAG_REMOVE_LIQUIDITY: u8 = 2;
pub const ROUTER_TAG_ADD_LIQUIDITY: u8 = 3;

/// Pair PDA seed of the router program: [b"pair", lower_mint, higher_mint].
pub const PAIR_SEED: &[u8] = b"pair";

/// SPL token account length and field offsets.
pub const TOKEN_ACCOUNT_LEN: usize = 165;
const MINT_LEN: usize = 82;

// ═══════════════════════════════════════════════════════════════
// Instruction data
// ═══════════════════════════════════════════════════════════════

/// tag(1) + amount(8). Transfer, Approve, MintTo and Burn share this shape.
pub fn token_amount_data(tag: u8, amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(9);
    data.push(tag);
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

/// tag(1) + owner(32)
pub fn initialize_account3_data(owner: &Pubkey) -> Vec<u8> {
    let mut data = Vec::with_capacity(33);
    data.push(TOKEN_TAG_INITIALIZE_ACCOUNT3);
    data.extend_from_slice(owner.as_ref());
    data
}

/// tag(1) + pid(8) + amount(8)
pub fn farm_data(tag: u8, pid: u64, amount: u64) -> Vec<u8> {
    let mut data = Vec::with_capacity(17);
    data.push(tag);
    data.extend_from_slice(&pid.to_le_bytes());
    data.extend_from_slice(&amount.to_le_bytes());
    data
}

/// tag(1) + amount_in(8) + amount_out_min(8) + token_in(32) + token_out(32)
pub fn swap_data(swap: &Swap) -> Vec<u8> {
    let tag = if swap.supporting_fee_on_transfer {
        ROUTER_TAG_SWAP_SUPPORTING_FEE
    } else {
        ROUTER_TAG_SWAP
    };
    let mut data = Vec::with_capacity(81);
    data.push(tag);
    data.extend_from_slice(&swap.amount_in.to_le_bytes());
    data.extend_from_slice(&swap.amount_out_min.to_le_bytes());
    data.extend_from_slice(swap.token_in.as_ref());
    data.extend_from_slice(swap.token_out.as_ref());
    data
}

/// tag(1) + liquidity(8) + amount_a_min(8) + amount_b_min(8) + token_a(32) + token_b(32)
pub fn remove_liquidity_data(removal: &RemoveLiquidity) -> Vec<u8> {
    let mut data = Vec::with_capacity(89);
    data.push(ROUTER_TAG_REMOVE_LIQUIDITY);
    data.extend_from_slice(&removal.liquidity.to_le_bytes());
    data.extend_from_slice(&removal.amount_a_min.to_le_bytes());
    data.extend_from_slice(&removal.amount_b_min.to_le_bytes());
    data.extend_from_slice(removal.token_a.as_ref());
    data.extend_from_slice(removal.token_b.as_ref());
    data
}

/// tag(1) + a_desired(8) + b_desired(8) + a_min(8) + b_min(8) + token_a(32) + token_b(32)
pub fn add_liquidity_data(addition: &AddLiquidity) -> Vec<u8> {
    let mut data = Vec::with_capacity(97);
    data.push(ROUTER_TAG_ADD_LIQUIDITY);
    data.extend_from_slice(&addition.amount_a_desired.to_le_bytes());
    data.extend_from_slice(&addition.amount_b_desired.to_le_bytes());
    data.extend_from_slice(&addition.amount_a_min.to_le_bytes());
    data.extend_from_slice(&addition.amount_b_min.to_le_bytes());
    data.extend_from_slice(addition.token_a.as_ref());
    data.extend_from_slice(addition.token_b.as_ref());
    data
}

// ═══════════════════════════════════════════════════════════════
// Account views
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAccountView {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    pub delegate: Option<Pubkey>,
    pub delegated_amount: u64,
}

/// Decode the fields we need from an SPL token account.
pub fn parse_token_account(data: &[u8]) -> Option<TokenAccountView> {
    if data.len() < TOKEN_ACCOUNT_LEN {
        return None;
    }
    let delegate = match u32::from_le_bytes(data[72..76].try_into().ok()?) {
        1 => Some(Pubkey::try_from(&data[76..108]).ok()?),
        _ => None,
    };
    Some(TokenAccountView {
        mint: Pubkey::try_from(&data[0..32]).ok()?,
        owner: Pubkey::try_from(&data[32..64]).ok()?,
        amount: u64::from_le_bytes(data[64..72].try_into().ok()?),
        delegate,
        delegated_amount: u64::from_le_bytes(data[121..129].try_into().ok()?),
    })
}

/// Mint authority of an SPL mint, if set.
pub fn parse_mint_authority(data: &[u8]) -> Option<Pubkey> {
    if data.len() < MINT_LEN {
        return None;
    }
    match u32::from_le_bytes(data[0..4].try_into().ok()?) {
        1 => Pubkey::try_from(&data[4..36]).ok(),
        _ => None,
    }
}

fn passthrough_metas(accounts: &[AccountInfo]) -> Vec<AccountMeta> {
    accounts
        .iter()
        .map(|a| AccountMeta {
            pubkey: *a.key,
            is_signer: false,
            is_writable: a.is_writable,
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════
// PDA signing
// ═══════════════════════════════════════════════════════════════

/// Seeds of every program PDA that may sign a CPI in this instruction.
#[derive(Debug, Default)]
pub struct PdaSigners {
    seeds: Vec<Vec<Vec<u8>>>,
}

impl PdaSigners {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, seeds: Vec<Vec<u8>>) {
        self.seeds.push(seeds);
    }

    pub fn len(&self) -> usize {
        self.seeds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeds.is_empty()
    }

    pub fn invoke(&self, ix: &Instruction, infos: &[AccountInfo]) -> ProgramResult {
        let inner: Vec<Vec<&[u8]>> = self
            .seeds
            .iter()
            .map(|s| s.iter().map(|part| part.as_slice()).collect())
            .collect();
        let outer: Vec<&[&[u8]]> = inner.iter().map(|v| v.as_slice()).collect();
        invoke_signed(ix, infos, &outer)
    }
}

fn find_account<'a, 'b>(accounts: &'b [AccountInfo<'a>], key: &Pubkey) -> Result<&'b AccountInfo<'a>, ProgramError> {
    accounts.iter().find(|a| a.key == key).ok_or_else(|| {
        msg!("Error: account {} not supplied", key);
        VaultError::AccountMismatch.into()
    })
}

// ═══════════════════════════════════════════════════════════════
// Token ledger over SPL token accounts
// ═══════════════════════════════════════════════════════════════

/// Program-owned token holders. Their token accounts are fixed: the vault
/// PDA for each mint, whatever else the caller supplies.
#[derive(Debug, Clone, Default)]
pub struct TokenVaults {
    program_id: Pubkey,
    holders: Vec<Pubkey>,
}

impl TokenVaults {
    pub fn new(program_id: &Pubkey) -> Self {
        Self {
            program_id: *program_id,
            holders: Vec::new(),
        }
    }

    pub fn add(&mut self, holder: &Pubkey) {
        if !self.holders.contains(holder) {
            self.holders.push(*holder);
        }
    }

    /// The only account `owner` may hold `mint` in, if `owner` is ours.
    pub fn canonical(&self, mint: &Pubkey, owner: &Pubkey) -> Option<Pubkey> {
        self.holders
            .contains(owner)
            .then(|| derive_vault_pda(&self.program_id, owner, mint).0)
    }
}

/// Resolves (mint, owner) to a token account supplied with the
/// instruction: the vault PDA for program-owned holders, otherwise the
/// first match. Missing accounts read as a zero balance.
pub struct CpiTokens<'a, 'b> {
    token_program: &'b AccountInfo<'a>,
    accounts: &'b [AccountInfo<'a>],
    signers: &'b PdaSigners,
    vaults: TokenVaults,
}

impl<'a, 'b> CpiTokens<'a, 'b> {
    pub fn new(
        token_program: &'b AccountInfo<'a>,
        accounts: &'b [AccountInfo<'a>],
        signers: &'b PdaSigners,
        vaults: TokenVaults,
    ) -> Self {
        Self {
            token_program,
            accounts,
            signers,
            vaults,
        }
    }

    fn token_account(&self, mint: &Pubkey, owner: &Pubkey) -> Option<(&'b AccountInfo<'a>, TokenAccountView)> {
        let canonical = self.vaults.canonical(mint, owner);
        self.accounts.iter().find_map(|a| {
            if a.owner != self.token_program.key {
                return None;
            }
            if canonical.is_some_and(|vault| vault != *a.key) {
                return None;
            }
            let view = parse_token_account(&a.try_borrow_data().ok()?)?;
            (view.mint == *mint && view.owner == *owner).then_some((a, view))
        })
    }

    fn required(&self, mint: &Pubkey, owner: &Pubkey) -> Result<(&'b AccountInfo<'a>, TokenAccountView), ProgramError> {
        self.token_account(mint, owner).ok_or_else(|| {
            msg!("Error: no {} token account for {}", mint, owner);
            VaultError::AccountMismatch.into()
        })
    }

    fn check_mint_authority(&self, mint: &AccountInfo<'a>, authority: &Pubkey, err: VaultError) -> ProgramResult {
        let data = mint.try_borrow_data()?;
        if parse_mint_authority(&data) != Some(*authority) {
            return Err(err.into());
        }
        Ok(())
    }

    fn invoke(&self, data: Vec<u8>, metas: Vec<AccountMeta>, mut infos: Vec<AccountInfo<'a>>) -> ProgramResult {
        let ix = Instruction {
            program_id: *self.token_program.key,
            accounts: metas,
            data,
        };
        infos.push(self.token_program.clone());
        self.signers.invoke(&ix, &infos)
    }

    fn transfer_with_authority(
        &mut self,
        token: &Pubkey,
        authority: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        let (src, _) = self.required(token, from)?;
        let (dst, before) = self.required(token, to)?;
        let auth = find_account(self.accounts, authority)?;
        self.invoke(
            token_amount_data(TOKEN_TAG_TRANSFER, amount),
            vec![
                AccountMeta::new(*src.key, false),
                AccountMeta::new(*dst.key, false),
                AccountMeta::new_readonly(*authority, true),
            ],
            vec![src.clone(), dst.clone(), auth.clone()],
        )?;
        let after = self.balance_of(token, to)?;
        Ok(after.saturating_sub(before.amount))
    }
}

impl TokenLedger for CpiTokens<'_, '_> {
    fn balance_of(&self, token: &Pubkey, owner: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self.token_account(token, owner).map(|(_, v)| v.amount).unwrap_or(0))
    }

    fn transfer(&mut self, token: &Pubkey, from: &Pubkey, to: &Pubkey, amount: u64) -> Result<u64, ProgramError> {
        self.transfer_with_authority(token, from, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &Pubkey,
        spender: &Pubkey,
        from: &Pubkey,
        to: &Pubkey,
        amount: u64,
    ) -> Result<u64, ProgramError> {
        self.transfer_with_authority(token, spender, from, to, amount)
    }

    fn mint_to(&mut self, mint: &Pubkey, authority: &Pubkey, to: &Pubkey, amount: u64) -> ProgramResult {
        let mint_info = find_account(self.accounts, mint)?;
        self.check_mint_authority(mint_info, authority, VaultError::OnlyPoolCanMint)?;
        let (dst, _) = self.required(mint, to)?;
        let auth = find_account(self.accounts, authority)?;
        self.invoke(
            token_amount_data(TOKEN_TAG_MINT_TO, amount),
            vec![
                AccountMeta::new(*mint, false),
                AccountMeta::new(*dst.key, false),
                AccountMeta::new_readonly(*authority, true),
            ],
            vec![mint_info.clone(), dst.clone(), auth.clone()],
        )
    }

    /// SPL burns are signed by the holder, so the holder (who signed the
    /// outer transaction) signs here; `authority` must still be the mint
    /// authority.
    fn burn(&mut self, mint: &Pubkey, authority: &Pubkey, from: &Pubkey, amount: u64) -> ProgramResult {
        let mint_info = find_account(self.accounts, mint)?;
        self.check_mint_authority(mint_info, authority, VaultError::OnlyPoolCanBurn)?;
        let (src, _) = self.required(mint, from)?;
        let holder = find_account(self.accounts, from)?;
        self.invoke(
            token_amount_data(TOKEN_TAG_BURN, amount),
            vec![
                AccountMeta::new(*src.key, false),
                AccountMeta::new(*mint, false),
                AccountMeta::new_readonly(*from, true),
            ],
            vec![src.clone(), mint_info.clone(), holder.clone()],
        )
    }

    fn approve(&mut self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey, amount: u64) -> ProgramResult {
        let Some((src, _)) = self.token_account(token, owner) else {
            // Nothing to approve until the holder has an account for `token`.
            msg!("No {} account for {}, approval skipped", token, owner);
            return Ok(());
        };
        let delegate = find_account(self.accounts, spender)?;
        let owner_info = find_account(self.accounts, owner)?;
        self.invoke(
            token_amount_data(TOKEN_TAG_APPROVE, amount),
            vec![
                AccountMeta::new(*src.key, false),
                AccountMeta::new_readonly(*spender, false),
                AccountMeta::new_readonly(*owner, true),
            ],
            vec![src.clone(), delegate.clone(), owner_info.clone()],
        )
    }

    fn allowance(&self, token: &Pubkey, owner: &Pubkey, spender: &Pubkey) -> Result<u64, ProgramError> {
        Ok(self
            .token_account(token, owner)
            .filter(|(_, v)| v.delegate == Some(*spender))
            .map(|(_, v)| v.delegated_amount)
            .unwrap_or(0))
    }
}

// ═══════════════════════════════════════════════════════════════
// Farm program
// ═══════════════════════════════════════════════════════════════

/// Farm program client. Its own accounts are forwarded from the
/// instruction's trailing accounts.
pub struct CpiFarm<'a, 'b> {
    program: &'b AccountInfo<'a>,
    accounts: &'b [AccountInfo<'a>],
    venue: &'b [AccountInfo<'a>],
    signers: &'b PdaSigners,
}

impl<'a, 'b> CpiFarm<'a, 'b> {
    pub fn new(
        program: &'b AccountInfo<'a>,
        accounts: &'b [AccountInfo<'a>],
        venue: &'b [AccountInfo<'a>],
        signers: &'b PdaSigners,
    ) -> Self {
        Self {
            program,
            accounts,
            venue,
            signers,
        }
    }

    fn call(&self, data: Vec<u8>, user: &Pubkey, user_signs: bool) -> ProgramResult {
        let user_info = find_account(self.accounts, user)?;
        let mut metas = vec![AccountMeta::new_readonly(*user, user_signs)];
        metas.extend(passthrough_metas(self.venue));
        let mut infos = vec![user_info.clone()];
        infos.extend(self.venue.iter().cloned());
        infos.push(self.program.clone());
        let ix = Instruction {
            program_id: *self.program.key,
            accounts: metas,
            data,
        };
        self.signers.invoke(&ix, &infos)
    }
}

impl Farm for CpiFarm<'_, '_> {
    fn address(&self) -> Pubkey {
        *self.program.key
    }

    fn deposit(&mut self, _tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult {
        self.call(farm_data(FARM_TAG_DEPOSIT, pid, amount), user, true)
    }

    fn withdraw(&mut self, _tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey, amount: u64) -> ProgramResult {
        self.call(farm_data(FARM_TAG_WITHDRAW, pid, amount), user, true)
    }

    fn emergency_withdraw(&mut self, _tokens: &mut dyn TokenLedger, pid: u64, user: &Pubkey) -> ProgramResult {
        self.call(farm_data(FARM_TAG_EMERGENCY_WITHDRAW, pid, 0), user, true)
    }

    /// Staked amount, read back from the farm's return data.
    fn user_info(&self, pid: u64, user: &Pubkey) -> Result<u64, ProgramError> {
        self.call(farm_data(FARM_TAG_USER_INFO, pid, 0), user, false)?;
        match get_return_data() {
            Some((program, data)) if program == *self.program.key && data.len() >= 8 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&data[..8]);
                Ok(u64::from_le_bytes(raw))
            }
            _ => {
                msg!("Error: farm returned no user info");
                Err(VaultError::ExternalCallFailed.into())
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Router program
// ═══════════════════════════════════════════════════════════════

pub struct CpiRouter<'a, 'b> {
    program: &'b AccountInfo<'a>,
    accounts: &'b [AccountInfo<'a>],
    venue: &'b [AccountInfo<'a>],
    signers: &'b PdaSigners,
}

impl<'a, 'b> CpiRouter<'a, 'b> {
    pub fn new(
        program: &'b AccountInfo<'a>,
        accounts: &'b [AccountInfo<'a>],
        venue: &'b [AccountInfo<'a>],
        signers: &'b PdaSigners,
    ) -> Self {
        Self {
            program,
            accounts,
            venue,
            signers,
        }
    }

    fn call(&self, data: Vec<u8>, owner: &Pubkey, to: &Pubkey) -> ProgramResult {
        let owner_info = find_account(self.accounts, owner)?;
        let to_info = find_account(self.accounts, to)?;
        let mut metas = vec![AccountMeta::new_readonly(*owner, true), AccountMeta::new_readonly(*to, false)];
        metas.extend(passthrough_metas(self.venue));
        let mut infos = vec![owner_info.clone(), to_info.clone()];
        infos.extend(self.venue.iter().cloned());
        infos.push(self.program.clone());
        let ix = Instruction {
            program_id: *self.program.key,
            accounts: metas,
            data,
        };
        self.signers.invoke(&ix, &infos)
    }
}

/// Pair address the router program derives for two mints.
pub fn pair_address(router: &Pubkey, token_a: &Pubkey, token_b: &Pubkey) -> Pubkey {
    let (lo, hi) = if token_a < token_b { (token_a, token_b) } else { (token_b, token_a) };
    Pubkey::find_program_address(&[PAIR_SEED, lo.as_ref(), hi.as_ref()], router).0
}

impl Router for CpiRouter<'_, '_> {
    fn address(&self) -> Pubkey {
        *self.program.key
    }

    fn pair_for(&self, token_a: &Pubkey, token_b: &Pubkey) -> Option<Pubkey> {
        Some(pair_address(self.program.key, token_a, token_b))
    }

    fn swap_exact_tokens_for_tokens(&mut self, _tokens: &mut dyn TokenLedger, swap: &Swap) -> ProgramResult {
        self.call(swap_data(swap), &swap.owner, &swap.to)
    }

    fn remove_liquidity(&mut self, _tokens: &mut dyn TokenLedger, removal: &RemoveLiquidity) -> ProgramResult {
        self.call(remove_liquidity_data(removal), &removal.owner, &removal.to)
    }

    fn add_liquidity(&mut self, _tokens: &mut dyn TokenLedger, addition: &AddLiquidity) -> ProgramResult {
        self.call(add_liquidity_data(addition), &addition.owner, &addition.to)
    }
}

/// The one router program supplied with the instruction.
pub struct CpiRouters<'a, 'b> {
    router: CpiRouter<'a, 'b>,
}

impl<'a, 'b> CpiRouters<'a, 'b> {
    pub fn new(router: CpiRouter<'a, 'b>) -> Self {
        Self { router }
    }
}

impl RouterRegistry for CpiRouters<'_, '_> {
    fn router_mut(&mut self, key: &Pubkey) -> Option<&mut dyn Router> {
        if *key == self.router.address() {
            Some(&mut self.router)
        } else {
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Position store over a single position PDA
// ═══════════════════════════════════════════════════════════════

pub struct AccountPositions<'a, 'b> {
    account: &'b AccountInfo<'a>,
    pool: Pubkey,
}

impl<'a, 'b> AccountPositions<'a, 'b> {
    pub fn new(account: &'b AccountInfo<'a>, pool: &Pubkey) -> Self {
        Self { account, pool: *pool }
    }

    fn read(&self) -> Result<Option<PositionRecord>, ProgramError> {
        let data = self.account.try_borrow_data()?;
        if data.len() < POSITION_RECORD_SIZE {
            return Ok(None);
        }
        let record: PositionRecord = bytemuck::pod_read_unaligned(&data[..POSITION_RECORD_SIZE]);
        if record.kind != KIND_POSITION || record.is_initialized != 1 {
            return Ok(None);
        }
        Ok(Some(record))
    }

    fn write(&self, record: &PositionRecord) -> ProgramResult {
        let mut data = self.account.try_borrow_mut_data()?;
        if data.len() < POSITION_RECORD_SIZE {
            return Err(ProgramError::AccountDataTooSmall);
        }
        data[..POSITION_RECORD_SIZE].copy_from_slice(bytemuck::bytes_of(record));
        Ok(())
    }
}

impl PositionStore for AccountPositions<'_, '_> {
    fn get(&self, id: u64) -> Result<Option<PositionRecord>, ProgramError> {
        Ok(self.read()?.filter(|r| r.id == id))
    }

    fn mint(&mut self, minter: &Pubkey, record: PositionRecord) -> ProgramResult {
        if *minter != self.pool {
            return Err(VaultError::OnlyPoolCanMint.into());
        }
        if record.id == 0 {
            return Err(VaultError::PositionNotFound.into());
        }
        if self.read()?.is_some() {
            return Err(VaultError::AlreadyInitialized.into());
        }
        self.write(&record)?;
        msg!("Position {} minted to {}", record.id, record.owner_pubkey());
        Ok(())
    }

    fn update(&mut self, writer: &Pubkey, record: PositionRecord) -> ProgramResult {
        if *writer != self.pool {
            return Err(VaultError::MustBePool.into());
        }
        let current = self.get(record.id)?.ok_or(VaultError::PositionNotFound)?;
        if current.owner != record.owner {
            msg!(
                "Position {} transferred {} -> {}",
                record.id,
                current.owner_pubkey(),
                record.owner_pubkey()
            );
        }
        self.write(&record)
    }

    fn burn(&mut self, burner: &Pubkey, id: u64) -> Result<PositionRecord, ProgramError> {
        if *burner != self.pool {
            return Err(VaultError::OnlyPoolCanBurn.into());
        }
        let record = self.get(id)?.ok_or(VaultError::PositionNotFound)?;
        let mut data = self.account.try_borrow_mut_data()?;
        data[..POSITION_RECORD_SIZE].fill(0);
        msg!("Position {} burned", id);
        Ok(record)
    }
}
