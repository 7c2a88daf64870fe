//! Two-step governance transfer shared by every governed component.
//!
//! The current governance proposes a successor; the successor must accept
//! before the handover takes effect. Proposing the zero key withdraws a
//! pending proposal.

use bytemuck::{Pod, Zeroable};
use solana_program::{entrypoint::ProgramResult, msg, pubkey::Pubkey};

use crate::error::VaultError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Governance {
    /// Key allowed to call governance-gated operations
    pub governance: [u8; 32],
    /// Proposed successor (all zeros = none)
    pub new_governance: [u8; 32],
}

impl Governance {
    pub fn new(governance: &Pubkey) -> Self {
        Self {
            governance: governance.to_bytes(),
            new_governance: [0; 32],
        }
    }

    pub fn governance_pubkey(&self) -> Pubkey {
        Pubkey::new_from_array(self.governance)
    }

    pub fn pending_pubkey(&self) -> Option<Pubkey> {
        if self.new_governance == [0; 32] {
            None
        } else {
            Some(Pubkey::new_from_array(self.new_governance))
        }
    }

    pub fn is_governance(&self, who: &Pubkey) -> bool {
        self.governance == who.to_bytes()
    }
}

/// Capability composed into each governed component.
pub trait Ownable {
    fn governance(&self) -> &Governance;
    fn governance_mut(&mut self) -> &mut Governance;

    fn only_governance(&self, caller: &Pubkey) -> ProgramResult {
        if !self.governance().is_governance(caller) {
            return Err(VaultError::MustBeGovernance.into());
        }
        Ok(())
    }

    fn propose_governance(&mut self, caller: &Pubkey, to: &Pubkey) -> ProgramResult {
        self.only_governance(caller)?;
        self.governance_mut().new_governance = to.to_bytes();
        msg!("GovernanceProposed: {} -> {}", caller, to);
        Ok(())
    }

    fn accept_governance(&mut self, caller: &Pubkey) -> ProgramResult {
        let gov = self.governance_mut();
        match gov.pending_pubkey() {
            Some(pending) if pending == *caller => {
                gov.governance = pending.to_bytes();
                gov.new_governance = [0; 32];
                msg!("GovernanceAccepted: {}", caller);
                Ok(())
            }
            _ => Err(VaultError::MustBeNewGovernance.into()),
        }
    }
}
