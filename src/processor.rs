use bytemuck::Pod;
use solana_program::{
    account_info::AccountInfo,
    entrypoint::ProgramResult,
    msg,
    instruction::{AccountMeta, Instruction},
    program::{invoke, invoke_signed, set_return_data},
    program_error::ProgramError,
    pubkey::Pubkey,
    rent::Rent,
    system_instruction,
    sysvar::{clock::Clock, Sysvar},
};

use crate::adapter::{Adapter, FarmAdapter, PassThroughAdapter};
use crate::compounder::Autocompounder;
use crate::cpi::{self, AccountPositions, CpiFarm, CpiRouter, CpiRouters, CpiTokens, PdaSigners, TokenVaults};
use crate::error::VaultError;
use crate::fund::InsuranceFund;
use crate::governance::Ownable;
use crate::instruction::{Component, ConversionEntry, VaultInstruction};
use crate::pool::SharePool;
use crate::ports::{AdapterPort, Externals};
use crate::state::{
    self, AdapterKind, AdapterState, CompounderState, FundState, PoolState, ADAPTER_STATE_SIZE,
    COMPOUNDER_STATE_SIZE, FUND_STATE_SIZE, POOL_STATE_SIZE, POSITION_RECORD_SIZE,
};

/// Verify the token program is SPL Token or Token-2022.
/// Without this check a fake token program would receive PDA signer
/// authority through invoke_signed.
fn verify_token_program(token_program: &AccountInfo) -> ProgramResult {
    if *token_program.key != cpi::SPL_TOKEN_PROGRAM_ID && *token_program.key != cpi::TOKEN_2022_PROGRAM_ID {
        msg!("Error: invalid token program {}", token_program.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Account frame
// ═══════════════════════════════════════════════════════════════

const FRAME_LEN: usize = 10;

struct Frame<'a, 'b> {
    caller: &'b AccountInfo<'a>,
    pool: &'b AccountInfo<'a>,
    adapter: &'b AccountInfo<'a>,
    compounder: &'b AccountInfo<'a>,
    fund: &'b AccountInfo<'a>,
    position: &'b AccountInfo<'a>,
    token_program: &'b AccountInfo<'a>,
    farm_program: &'b AccountInfo<'a>,
    router_program: &'b AccountInfo<'a>,
    system_program: &'b AccountInfo<'a>,
    all: &'b [AccountInfo<'a>],
    venue: &'b [AccountInfo<'a>],
}

impl<'a, 'b> Frame<'a, 'b> {
    fn parse(accounts: &'b [AccountInfo<'a>]) -> Result<Self, ProgramError> {
        if accounts.len() < FRAME_LEN {
            return Err(ProgramError::NotEnoughAccountKeys);
        }
        let caller = &accounts[0];
        if !caller.is_signer {
            return Err(ProgramError::MissingRequiredSignature);
        }
        Ok(Self {
            caller,
            pool: &accounts[1],
            adapter: &accounts[2],
            compounder: &accounts[3],
            fund: &accounts[4],
            position: &accounts[5],
            token_program: &accounts[6],
            farm_program: &accounts[7],
            router_program: &accounts[8],
            system_program: &accounts[9],
            all: accounts,
            venue: &accounts[FRAME_LEN..],
        })
    }
}

/// CPI clients for one instruction.
struct Session<'a, 's> {
    tokens: CpiTokens<'a, 's>,
    farm: CpiFarm<'a, 's>,
    routers: CpiRouters<'a, 's>,
}

impl<'a, 's> Session<'a, 's> {
    fn open(program_id: &Pubkey, f: &Frame<'a, 's>, signers: &'s PdaSigners) -> Result<Self, ProgramError> {
        verify_token_program(f.token_program)?;
        Ok(Self {
            tokens: CpiTokens::new(f.token_program, f.all, signers, vaults(program_id, f)),
            farm: CpiFarm::new(f.farm_program, f.all, f.venue, signers),
            routers: CpiRouters::new(CpiRouter::new(f.router_program, f.all, f.venue, signers)),
        })
    }

    fn externals(&mut self) -> Externals<'_> {
        Externals::new(&mut self.tokens, &mut self.farm, &mut self.routers)
    }
}

/// Every program-owned component slot holds tokens only in its vault PDAs.
fn vaults(program_id: &Pubkey, f: &Frame) -> TokenVaults {
    let mut vaults = TokenVaults::new(program_id);
    for account in [f.pool, f.adapter, f.compounder, f.fund] {
        if account.owner == program_id {
            vaults.add(account.key);
        }
    }
    vaults
}

// ═══════════════════════════════════════════════════════════════
// State accounts
// ═══════════════════════════════════════════════════════════════

fn load<T: Pod>(program_id: &Pubkey, account: &AccountInfo) -> Result<T, ProgramError> {
    if account.owner != program_id {
        msg!("Error: account {} is not owned by this program", account.key);
        return Err(ProgramError::IncorrectProgramId);
    }
    let data = account.try_borrow_data()?;
    let size = core::mem::size_of::<T>();
    if data.len() < size {
        return Err(ProgramError::AccountDataTooSmall);
    }
    Ok(bytemuck::pod_read_unaligned(&data[..size]))
}

fn store<T: Pod>(account: &AccountInfo, value: &T) -> ProgramResult {
    let mut data = account.try_borrow_mut_data()?;
    let bytes = bytemuck::bytes_of(value);
    if data.len() < bytes.len() {
        return Err(ProgramError::AccountDataTooSmall);
    }
    data[..bytes.len()].copy_from_slice(bytes);
    Ok(())
}

fn load_pool(program_id: &Pubkey, f: &Frame) -> Result<SharePool, ProgramError> {
    SharePool::from_state(f.pool.key, load::<PoolState>(program_id, f.pool)?)
}

fn load_compounder(program_id: &Pubkey, f: &Frame) -> Result<Autocompounder, ProgramError> {
    Autocompounder::from_state(f.compounder.key, load::<CompounderState>(program_id, f.compounder)?)
}

fn load_adapter(program_id: &Pubkey, f: &Frame) -> Result<Adapter, ProgramError> {
    let state: AdapterState = load(program_id, f.adapter)?;
    let compounder = match state.adapter_kind()? {
        AdapterKind::LiveFarm => Some(load_compounder(program_id, f)?),
        AdapterKind::TestDouble => None,
    };
    Adapter::from_state(f.adapter.key, state, compounder)
}

fn store_adapter(f: &Frame, adapter: &Adapter) -> ProgramResult {
    store(f.adapter, adapter.state())?;
    if let Some(compounder) = adapter.compounder() {
        store(f.compounder, &compounder.state)?;
    }
    Ok(())
}

fn load_fund(program_id: &Pubkey, f: &Frame) -> Result<InsuranceFund, ProgramError> {
    InsuranceFund::from_state(f.fund.key, load::<FundState>(program_id, f.fund)?)
}

/// Position store over slot 5, which must be the PDA of position `id`.
fn position_store<'a, 'b>(
    program_id: &Pubkey,
    f: &Frame<'a, 'b>,
    pool: &SharePool,
    id: u64,
) -> Result<AccountPositions<'a, 'b>, ProgramError> {
    let (expected, _) = state::derive_position_pda(program_id, &pool.key, id);
    if expected != *f.position.key {
        return Err(VaultError::InvalidPda.into());
    }
    if f.position.owner != program_id {
        return Err(ProgramError::IncorrectProgramId);
    }
    Ok(AccountPositions::new(f.position, &pool.key))
}

/// Seeds for the pool PDA and for each component slot holding its PDA.
fn pda_signers(program_id: &Pubkey, f: &Frame, pool: &SharePool) -> PdaSigners {
    let mut signers = PdaSigners::new();
    signers.add(vec![
        state::POOL_SEED.to_vec(),
        pool.state.base_asset.to_vec(),
        vec![pool.state.bump],
    ]);
    for (seed, account) in [
        (state::ADAPTER_SEED, f.adapter),
        (state::COMPOUNDER_SEED, f.compounder),
        (state::FUND_SEED, f.fund),
    ] {
        let (expected, bump) = Pubkey::find_program_address(&[seed, pool.key.as_ref()], program_id);
        if expected == *account.key {
            signers.add(vec![seed.to_vec(), pool.key.to_bytes().to_vec(), vec![bump]]);
        }
    }
    signers
}

fn create_pda_account<'a>(
    program_id: &Pubkey,
    payer: &AccountInfo<'a>,
    target: &AccountInfo<'a>,
    system_program: &AccountInfo<'a>,
    size: usize,
    seeds: &[&[u8]],
) -> ProgramResult {
    if !target.data_is_empty() {
        return Err(VaultError::AlreadyInitialized.into());
    }
    let rent = Rent::get()?;
    invoke_signed(
        &system_instruction::create_account(
            payer.key,
            target.key,
            rent.minimum_balance(size),
            size as u64,
            program_id,
        ),
        &[payer.clone(), target.clone(), system_program.clone()],
        &[seeds],
    )
}

/// Return the rent of a burned position to `to`.
fn close_account(account: &AccountInfo, to: &AccountInfo) -> ProgramResult {
    let lamports = account.lamports();
    **to.try_borrow_mut_lamports()? = to.lamports().checked_add(lamports).ok_or(VaultError::MathOverflow)?;
    **account.try_borrow_mut_lamports()? = 0;
    Ok(())
}

fn now() -> Result<i64, ProgramError> {
    Ok(Clock::get()?.unix_timestamp)
}

fn return_u64(value: u64) {
    set_return_data(&value.to_le_bytes());
}

type ConversionColumns = (Vec<Pubkey>, Vec<Pubkey>, Vec<Pubkey>, Vec<u8>, Vec<u8>);

fn conversion_columns(entries: &[ConversionEntry]) -> ConversionColumns {
    let mut columns: ConversionColumns = Default::default();
    for e in entries {
        columns.0.push(e.router);
        columns.1.push(e.token_from);
        columns.2.push(e.token_to);
        columns.3.push(e.percentage);
        columns.4.push(e.operations);
    }
    columns
}

// ═══════════════════════════════════════════════════════════════
// Dispatch
// ═══════════════════════════════════════════════════════════════

pub fn process(program_id: &Pubkey, accounts: &[AccountInfo], instruction_data: &[u8]) -> ProgramResult {
    let instruction = VaultInstruction::unpack(instruction_data)?;
    let f = Frame::parse(accounts)?;
    let caller = f.caller.key;

    match instruction {
        VaultInstruction::InitPool { base_asset, share_mint } => {
            process_init_pool(program_id, &f, &base_asset, &share_mint)
        }
        VaultInstruction::InitAdapter { kind, base_asset } => {
            process_init_adapter(program_id, &f, kind, &base_asset)
        }
        VaultInstruction::InitCompounder { base_asset, chef, pid } => {
            process_init_compounder(program_id, &f, &base_asset, &chef, pid)
        }
        VaultInstruction::InitFund { insurance_asset, base_asset } => {
            process_init_fund(program_id, &f, &insurance_asset, &base_asset)
        }

        VaultInstruction::Deposit { amount } => {
            with_pool_session(program_id, &f, |pool, adapter, ext| pool.deposit(adapter, ext, caller, amount))
                .map(|_| ())
        }
        VaultInstruction::Withdraw { shares } => {
            with_pool_session(program_id, &f, |pool, adapter, ext| pool.withdraw(adapter, ext, caller, shares))
                .map(|_| ())
        }
        VaultInstruction::UpdateExchangeRate => {
            with_pool_session(program_id, &f, |pool, adapter, ext| pool.update_exchange_rate(&*adapter, &*ext))
                .map(|_| ())
        }
        VaultInstruction::WithdrawFees { to } => {
            with_pool_session(program_id, &f, |pool, adapter, ext| pool.withdraw_fees(adapter, ext, caller, &to))
                .map(|_| ())
        }
        VaultInstruction::SetExchangeRate { selector, value } => {
            with_pool(program_id, &f, |pool| pool.set_exchange_rate(caller, selector, value))
        }
        VaultInstruction::ShutDownPool { shut_down } => {
            with_pool(program_id, &f, |pool| pool.shut_down_pool(caller, shut_down))
        }
        VaultInstruction::DisableDeposits { disabled } => {
            with_pool(program_id, &f, |pool| pool.disable_deposits(caller, disabled))
        }
        VaultInstruction::SetAdapter { adapter } => with_pool(program_id, &f, |pool| pool.set_adapter(caller, &adapter)),
        VaultInstruction::SetFeeManager { fee_manager } => {
            with_pool(program_id, &f, |pool| pool.set_fee_manager(caller, &fee_manager))
        }
        VaultInstruction::SetFeeRate { fee_rate_bps } => {
            with_pool(program_id, &f, |pool| pool.set_fee_rate(caller, fee_rate_bps))
        }
        VaultInstruction::SetUnfreezeDelay { seconds } => {
            with_pool(program_id, &f, |pool| pool.set_unfreeze_delay(caller, seconds))
        }

        VaultInstruction::SweepErc { component, token, to } => process_sweep(program_id, &f, component, &token, &to),
        VaultInstruction::ProposeGovernance { component, new_governance } => {
            process_governance(program_id, &f, component, |c| c.propose_governance(caller, &new_governance))
        }
        VaultInstruction::AcceptGovernance { component } => {
            process_governance(program_id, &f, component, |c| c.accept_governance(caller))
        }

        VaultInstruction::BeginUnfreeze { id } => {
            let now = now()?;
            let mut pool = load_pool(program_id, &f)?;
            let mut positions = position_store(program_id, &f, &pool, id)?;
            pool.begin_unfreeze(&mut positions, caller, id, now)?;
            Ok(())
        }
        VaultInstruction::TransferPosition { id, to } => {
            let mut pool = load_pool(program_id, &f)?;
            let mut positions = position_store(program_id, &f, &pool, id)?;
            pool.transfer_position(&mut positions, caller, id, &to)
        }

        VaultInstruction::Autocompound => {
            with_compounder_session(program_id, &f, |c, ext| c.autocompound(ext)).map(|_| ())
        }
        VaultInstruction::InitConversions { component, conversions } => {
            process_init_conversions(program_id, &f, component, &conversions)
        }
        VaultInstruction::SetChef { chef } => with_compounder(program_id, &f, |c| c.set_chef(caller, &chef)),
        VaultInstruction::ResetApprovals => {
            with_compounder_session(program_id, &f, |c, ext| c.reset_approvals(ext, caller))
        }
        VaultInstruction::SetAutocompoundEnabled { enabled } => {
            with_compounder(program_id, &f, |c| c.set_autocompound_enabled(caller, enabled))
        }
        VaultInstruction::CompounderEmergencyWithdraw { pid, amount } => {
            with_compounder_session(program_id, &f, |c, ext| c.emergency_withdraw(ext, caller, pid, amount))
                .map(|_| ())
        }

        VaultInstruction::SetAutocompounder { compounder } => {
            process_set_autocompounder(program_id, &f, &compounder)
        }
        VaultInstruction::SetLp { lp } => {
            let mut adapter = load_adapter(program_id, &f)?;
            match &mut adapter {
                Adapter::LiveFarm(a) => a.set_lp(caller, &lp)?,
                Adapter::TestDouble(_) => return Err(VaultError::InvalidAccountKind.into()),
            }
            store(f.adapter, adapter.state())
        }
        VaultInstruction::SetAdapterPool { pool } => {
            let mut adapter = load_adapter(program_id, &f)?;
            adapter.set_pool(caller, &pool)?;
            store(f.adapter, adapter.state())
        }

        VaultInstruction::FundDeposit { amount } => process_fund_deposit(program_id, &f, amount),
        VaultInstruction::FundUpdate => process_fund_update(program_id, &f),
        VaultInstruction::FundWithdraw { id } => process_fund_withdraw(program_id, &f, id, false),
        VaultInstruction::FundEmergencyWithdraw { id } => process_fund_withdraw(program_id, &f, id, true),
        VaultInstruction::SetFundPool { pool } => with_fund(program_id, &f, |fund| fund.set_pool(caller, &pool)),
        VaultInstruction::SetTreasury { treasury } => {
            with_fund(program_id, &f, |fund| fund.set_treasury(caller, &treasury))
        }
        VaultInstruction::SetTreasuryFee { bps } => {
            with_fund(program_id, &f, |fund| fund.set_treasury_fee(caller, bps))
        }

        VaultInstruction::PendingEarnings { id } => process_pending_earnings(program_id, &f, id),
        VaultInstruction::GetHoldings => {
            let holdings = with_pool_session(program_id, &f, |_, adapter, ext| adapter.get_holdings_view(ext))?;
            return_u64(holdings);
            Ok(())
        }
        VaultInstruction::InitVault { component, mint } => process_init_vault(program_id, &f, component, &mint),
    }
}

// ═══════════════════════════════════════════════════════════════
// Load / run / store helpers
// ═══════════════════════════════════════════════════════════════

fn with_pool(program_id: &Pubkey, f: &Frame, op: impl FnOnce(&mut SharePool) -> ProgramResult) -> ProgramResult {
    let mut pool = load_pool(program_id, f)?;
    op(&mut pool)?;
    store(f.pool, &pool.state)
}

fn with_pool_session<R>(
    program_id: &Pubkey,
    f: &Frame,
    op: impl FnOnce(&mut SharePool, &mut Adapter, &mut Externals) -> Result<R, ProgramError>,
) -> Result<R, ProgramError> {
    let mut pool = load_pool(program_id, f)?;
    let mut adapter = load_adapter(program_id, f)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let out = op(&mut pool, &mut adapter, &mut session.externals())?;
    store(f.pool, &pool.state)?;
    store_adapter(f, &adapter)?;
    Ok(out)
}

fn with_compounder(
    program_id: &Pubkey,
    f: &Frame,
    op: impl FnOnce(&mut Autocompounder) -> ProgramResult,
) -> ProgramResult {
    let mut compounder = load_compounder(program_id, f)?;
    op(&mut compounder)?;
    store(f.compounder, &compounder.state)
}

fn with_compounder_session<R>(
    program_id: &Pubkey,
    f: &Frame,
    op: impl FnOnce(&mut Autocompounder, &mut Externals) -> Result<R, ProgramError>,
) -> Result<R, ProgramError> {
    let pool = load_pool(program_id, f)?;
    let mut compounder = load_compounder(program_id, f)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let out = op(&mut compounder, &mut session.externals())?;
    store(f.compounder, &compounder.state)?;
    Ok(out)
}

fn with_fund(program_id: &Pubkey, f: &Frame, op: impl FnOnce(&mut InsuranceFund) -> ProgramResult) -> ProgramResult {
    let mut fund = load_fund(program_id, f)?;
    op(&mut fund)?;
    store(f.fund, &fund.state)
}

// ═══════════════════════════════════════════════════════════════
// 0-3: Account creation
// ═══════════════════════════════════════════════════════════════

fn process_init_pool(program_id: &Pubkey, f: &Frame, base_asset: &Pubkey, share_mint: &Pubkey) -> ProgramResult {
    let (expected_pool, bump) = state::derive_pool_pda(program_id, base_asset);
    if *f.pool.key != expected_pool {
        return Err(VaultError::InvalidPda.into());
    }
    let (adapter, _) = state::derive_adapter_pda(program_id, &expected_pool);
    let pool = SharePool::initialize(f.pool.key, bump, f.caller.key, base_asset, share_mint, &adapter)?;

    create_pda_account(
        program_id,
        f.caller,
        f.pool,
        f.system_program,
        POOL_STATE_SIZE,
        &[state::POOL_SEED, base_asset.as_ref(), &[bump]],
    )?;
    store(f.pool, &pool.state)
}

fn process_init_compounder(
    program_id: &Pubkey,
    f: &Frame,
    base_asset: &Pubkey,
    chef: &Pubkey,
    pid: u64,
) -> ProgramResult {
    let pool = load_pool(program_id, f)?;
    pool.only_governance(f.caller.key)?;
    let (expected, bump) = state::derive_compounder_pda(program_id, &pool.key);
    if *f.compounder.key != expected {
        return Err(VaultError::InvalidPda.into());
    }
    let (adapter, _) = state::derive_adapter_pda(program_id, &pool.key);
    let compounder = Autocompounder::initialize(f.compounder.key, bump, f.caller.key, &adapter, base_asset, chef, pid)?;

    create_pda_account(
        program_id,
        f.caller,
        f.compounder,
        f.system_program,
        COMPOUNDER_STATE_SIZE,
        &[state::COMPOUNDER_SEED, pool.key.as_ref(), &[bump]],
    )?;
    store(f.compounder, &compounder.state)
}

fn process_init_adapter(program_id: &Pubkey, f: &Frame, kind: AdapterKind, base_asset: &Pubkey) -> ProgramResult {
    let pool = load_pool(program_id, f)?;
    pool.only_governance(f.caller.key)?;
    let (expected, bump) = state::derive_adapter_pda(program_id, &pool.key);
    if *f.adapter.key != expected {
        return Err(VaultError::InvalidPda.into());
    }
    let adapter = match kind {
        AdapterKind::LiveFarm => {
            let compounder = load_compounder(program_id, f)?;
            Adapter::LiveFarm(FarmAdapter::initialize(f.adapter.key, bump, f.caller.key, &pool.key, compounder)?)
        }
        AdapterKind::TestDouble => Adapter::TestDouble(PassThroughAdapter::initialize(
            f.adapter.key,
            bump,
            f.caller.key,
            &pool.key,
            base_asset,
        )?),
    };

    create_pda_account(
        program_id,
        f.caller,
        f.adapter,
        f.system_program,
        ADAPTER_STATE_SIZE,
        &[state::ADAPTER_SEED, pool.key.as_ref(), &[bump]],
    )?;
    store(f.adapter, adapter.state())
}

fn process_init_fund(program_id: &Pubkey, f: &Frame, insurance_asset: &Pubkey, base_asset: &Pubkey) -> ProgramResult {
    let pool = load_pool(program_id, f)?;
    pool.only_governance(f.caller.key)?;
    let (expected, bump) = state::derive_fund_pda(program_id, &pool.key);
    if *f.fund.key != expected {
        return Err(VaultError::InvalidPda.into());
    }
    let fund = InsuranceFund::initialize(f.fund.key, bump, f.caller.key, &pool.key, insurance_asset, base_asset)?;

    create_pda_account(
        program_id,
        f.caller,
        f.fund,
        f.system_program,
        FUND_STATE_SIZE,
        &[state::FUND_SEED, pool.key.as_ref(), &[bump]],
    )?;
    store(f.fund, &fund.state)
}

/// Venue slot 0 is the vault PDA to create, slot 1 its mint.
fn process_init_vault(program_id: &Pubkey, f: &Frame, component: Component, mint: &Pubkey) -> ProgramResult {
    verify_token_program(f.token_program)?;
    let holder = match component {
        Component::Pool => f.pool,
        Component::Adapter => f.adapter,
        Component::Compounder => f.compounder,
        Component::Fund => f.fund,
    };
    if holder.owner != program_id || holder.data_is_empty() {
        return Err(VaultError::NotInitialized.into());
    }
    let (vault, mint_info) = match f.venue {
        [vault, mint_info, ..] => (vault, mint_info),
        _ => return Err(ProgramError::NotEnoughAccountKeys),
    };
    if mint_info.key != mint {
        return Err(VaultError::AccountMismatch.into());
    }
    let (expected, bump) = state::derive_vault_pda(program_id, holder.key, mint);
    if *vault.key != expected {
        return Err(VaultError::InvalidPda.into());
    }
    if !vault.data_is_empty() {
        return Err(VaultError::AlreadyInitialized.into());
    }

    let rent = Rent::get()?;
    invoke_signed(
        &system_instruction::create_account(
            f.caller.key,
            vault.key,
            rent.minimum_balance(cpi::TOKEN_ACCOUNT_LEN),
            cpi::TOKEN_ACCOUNT_LEN as u64,
            f.token_program.key,
        ),
        &[f.caller.clone(), vault.clone(), f.system_program.clone()],
        &[&[state::VAULT_SEED, holder.key.as_ref(), mint.as_ref(), &[bump]]],
    )?;
    invoke(
        &Instruction {
            program_id: *f.token_program.key,
            accounts: vec![AccountMeta::new(*vault.key, false), AccountMeta::new_readonly(*mint, false)],
            data: cpi::initialize_account3_data(holder.key),
        },
        &[vault.clone(), mint_info.clone(), f.token_program.clone()],
    )?;
    msg!("Vault {} created for {} ({})", vault.key, holder.key, mint);
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Component-addressed governance
// ═══════════════════════════════════════════════════════════════

fn process_governance(
    program_id: &Pubkey,
    f: &Frame,
    component: Component,
    op: impl FnOnce(&mut dyn Ownable) -> ProgramResult,
) -> ProgramResult {
    match component {
        Component::Pool => with_pool(program_id, f, |pool| op(pool)),
        Component::Adapter => {
            let mut adapter = load_adapter(program_id, f)?;
            op(&mut adapter)?;
            store(f.adapter, adapter.state())
        }
        Component::Compounder => with_compounder(program_id, f, |c| op(c)),
        Component::Fund => with_fund(program_id, f, |fund| op(fund)),
    }
}

fn process_sweep(program_id: &Pubkey, f: &Frame, component: Component, token: &Pubkey, to: &Pubkey) -> ProgramResult {
    let mut pool = load_pool(program_id, f)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let mut ext = session.externals();
    let caller = f.caller.key;

    match component {
        Component::Pool => {
            pool.sweep_erc(&mut ext, caller, token, to)?;
            store(f.pool, &pool.state)
        }
        Component::Adapter => load_adapter(program_id, f)?.sweep_erc(&mut ext, caller, token, to).map(|_| ()),
        Component::Compounder => load_compounder(program_id, f)?.sweep_erc(&mut ext, caller, token, to).map(|_| ()),
        Component::Fund => load_fund(program_id, f)?.sweep_erc(&mut ext, caller, token, to).map(|_| ()),
    }
}

fn process_init_conversions(
    program_id: &Pubkey,
    f: &Frame,
    component: Component,
    entries: &[ConversionEntry],
) -> ProgramResult {
    let caller = f.caller.key;
    let (routers, from, to, percentages, operations) = conversion_columns(entries);
    match component {
        Component::Compounder => with_compounder_session(program_id, f, |c, ext| {
            c.init_conversions(ext, caller, &routers, &from, &to, &percentages, &operations)
        }),
        Component::Fund => {
            let pool = load_pool(program_id, f)?;
            let mut fund = load_fund(program_id, f)?;
            let signers = pda_signers(program_id, f, &pool);
            let mut session = Session::open(program_id, f, &signers)?;
            fund.init_conversions(
                &mut session.externals(),
                caller,
                &routers,
                &from,
                &to,
                &percentages,
                &operations,
            )?;
            store(f.fund, &fund.state)
        }
        _ => Err(ProgramError::InvalidInstructionData),
    }
}

/// Slot 3 holds the new autocompounder. Stake held by the old one is
/// migrated separately.
fn process_set_autocompounder(program_id: &Pubkey, f: &Frame, compounder: &Pubkey) -> ProgramResult {
    let state: AdapterState = load(program_id, f.adapter)?;
    if state.adapter_kind()? != AdapterKind::LiveFarm {
        return Err(VaultError::InvalidAccountKind.into());
    }
    let replacement = load_compounder(program_id, f)?;
    if replacement.key != *compounder {
        return Err(VaultError::AccountMismatch.into());
    }
    let mut adapter = FarmAdapter {
        key: *f.adapter.key,
        state,
        compounder: replacement.clone(),
    };
    adapter.set_autocompounder(f.caller.key, replacement)?;
    store(f.adapter, &adapter.state)
}

// ═══════════════════════════════════════════════════════════════
// 29-36: Insurance fund
// ═══════════════════════════════════════════════════════════════

fn process_fund_deposit(program_id: &Pubkey, f: &Frame, amount: u64) -> ProgramResult {
    let mut pool = load_pool(program_id, f)?;
    let mut fund = load_fund(program_id, f)?;

    // The position PDA for the id the pool will assign next.
    let id = pool.state.next_position_id;
    let (expected, bump) = state::derive_position_pda(program_id, &pool.key, id);
    if *f.position.key != expected {
        return Err(VaultError::InvalidPda.into());
    }
    create_pda_account(
        program_id,
        f.caller,
        f.position,
        f.system_program,
        POSITION_RECORD_SIZE,
        &[state::POSITION_SEED, pool.key.as_ref(), &id.to_le_bytes(), &[bump]],
    )?;

    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let mut positions = AccountPositions::new(f.position, &pool.key);
    fund.deposit(&mut pool, &mut positions, &mut session.externals(), f.caller.key, amount)?;

    store(f.pool, &pool.state)?;
    store(f.fund, &fund.state)
}

fn process_fund_update(program_id: &Pubkey, f: &Frame) -> ProgramResult {
    let mut pool = load_pool(program_id, f)?;
    let mut adapter = load_adapter(program_id, f)?;
    let mut fund = load_fund(program_id, f)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    fund.update(&mut pool, &mut adapter, &mut session.externals())?;

    store(f.pool, &pool.state)?;
    store_adapter(f, &adapter)?;
    store(f.fund, &fund.state)
}

fn process_fund_withdraw(program_id: &Pubkey, f: &Frame, id: u64, emergency: bool) -> ProgramResult {
    let now = now()?;
    let pool = load_pool(program_id, f)?;
    let mut fund = load_fund(program_id, f)?;
    let mut positions = position_store(program_id, f, &pool, id)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let mut ext = session.externals();

    if emergency {
        fund.emergency_withdraw(&pool, &mut positions, &mut ext, f.caller.key, id, now)?;
    } else {
        fund.withdraw(&pool, &mut positions, &mut ext, f.caller.key, id, now)?;
    }

    store(f.fund, &fund.state)?;
    close_account(f.position, f.caller)
}

fn process_pending_earnings(program_id: &Pubkey, f: &Frame, id: u64) -> ProgramResult {
    let pool = load_pool(program_id, f)?;
    let fund = load_fund(program_id, f)?;
    let positions = position_store(program_id, f, &pool, id)?;
    let signers = pda_signers(program_id, f, &pool);
    let mut session = Session::open(program_id, f, &signers)?;
    let earnings = fund.pending_earnings(&pool, &positions, &session.externals(), id)?;
    return_u64(earnings);
    Ok(())
}
