//! Non-fungible position registry and lifecycle.
//!
//! Lifecycle: Deposited (expiration = 0) → Unlocking (now < expiration)
//! → Redeemable (now >= expiration) → burned.

use std::collections::{BTreeMap, BTreeSet};

use solana_program::{entrypoint::ProgramResult, msg, program_error::ProgramError, pubkey::Pubkey};

use crate::error::VaultError;
use crate::ports::PositionStore;
use crate::state::PositionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionPhase {
    Deposited,
    Unlocking,
    Redeemable,
}

pub fn phase(record: &PositionRecord, now: i64) -> PositionPhase {
    if record.expiration == 0 {
        PositionPhase::Deposited
    } else if now < record.expiration {
        PositionPhase::Unlocking
    } else {
        PositionPhase::Redeemable
    }
}

/// Start the unlock clock. Owner only, once.
pub fn begin_unfreeze(record: &mut PositionRecord, caller: &Pubkey, now: i64, delay: i64) -> Result<i64, ProgramError> {
    if record.owner != caller.to_bytes() {
        return Err(VaultError::MustBeOwner.into());
    }
    if record.expiration != 0 {
        return Err(VaultError::AlreadyUnfreezing.into());
    }
    let expiration = now.checked_add(delay).ok_or(VaultError::MathOverflow)?;
    // expiration 0 is the "not unlocking" sentinel
    record.expiration = expiration.max(1);
    Ok(record.expiration)
}

/// Fails with `TooEarly` unless the position is redeemable at `now`.
pub fn ensure_redeemable(record: &PositionRecord, now: i64) -> ProgramResult {
    match phase(record, now) {
        PositionPhase::Redeemable => Ok(()),
        _ => Err(VaultError::TooEarly.into()),
    }
}

/// In-memory registry: an arena indexed by id plus an owner index.
#[derive(Debug, Clone)]
pub struct PositionBook {
    pool: Pubkey,
    records: Vec<Option<PositionRecord>>,
    owners: BTreeMap<Pubkey, BTreeSet<u64>>,
}

impl PositionBook {
    pub fn new(pool: &Pubkey) -> Self {
        Self {
            pool: *pool,
            records: Vec::new(),
            owners: BTreeMap::new(),
        }
    }

    pub fn pool(&self) -> Pubkey {
        self.pool
    }

    /// Ids held by `owner`, ascending.
    pub fn ids_of(&self, owner: &Pubkey) -> Vec<u64> {
        self.owners
            .get(owner)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn owner_of(&self, id: u64) -> Option<Pubkey> {
        self.slot(id).and_then(|r| r.as_ref()).map(|r| r.owner_pubkey())
    }

    pub fn len(&self) -> usize {
        self.records.iter().filter(|r| r.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, id: u64) -> Option<&Option<PositionRecord>> {
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.records.get(idx)
    }

    fn slot_mut(&mut self, id: u64) -> Result<&mut Option<PositionRecord>, ProgramError> {
        let idx = usize::try_from(id)
            .ok()
            .and_then(|i| i.checked_sub(1))
            .ok_or(VaultError::PositionNotFound)?;
        if idx >= self.records.len() {
            self.records.resize(idx + 1, None);
        }
        Ok(&mut self.records[idx])
    }

    fn index_remove(&mut self, owner: &Pubkey, id: u64) {
        if let Some(ids) = self.owners.get_mut(owner) {
            ids.remove(&id);
            if ids.is_empty() {
                self.owners.remove(owner);
            }
        }
    }
}

impl PositionStore for PositionBook {
    fn get(&self, id: u64) -> Result<Option<PositionRecord>, ProgramError> {
        Ok(self.slot(id).copied().flatten())
    }

    fn mint(&mut self, minter: &Pubkey, record: PositionRecord) -> ProgramResult {
        if *minter != self.pool {
            return Err(VaultError::OnlyPoolCanMint.into());
        }
        let slot = self.slot_mut(record.id)?;
        if slot.is_some() {
            return Err(VaultError::AlreadyInitialized.into());
        }
        *slot = Some(record);
        self.owners.entry(record.owner_pubkey()).or_default().insert(record.id);
        Ok(())
    }

    fn update(&mut self, writer: &Pubkey, record: PositionRecord) -> ProgramResult {
        if *writer != self.pool {
            return Err(VaultError::MustBePool.into());
        }
        let slot = self.slot_mut(record.id)?;
        let previous = slot.ok_or(VaultError::PositionNotFound)?;
        *slot = Some(record);
        if previous.owner != record.owner {
            self.index_remove(&previous.owner_pubkey(), record.id);
            self.owners.entry(record.owner_pubkey()).or_default().insert(record.id);
            msg!("Position {} transferred to {}", record.id, record.owner_pubkey());
        }
        Ok(())
    }

    fn burn(&mut self, burner: &Pubkey, id: u64) -> Result<PositionRecord, ProgramError> {
        if *burner != self.pool {
            return Err(VaultError::OnlyPoolCanBurn.into());
        }
        let slot = self.slot_mut(id)?;
        let record = slot.take().ok_or(VaultError::PositionNotFound)?;
        self.index_remove(&record.owner_pubkey(), id);
        Ok(record)
    }
}
