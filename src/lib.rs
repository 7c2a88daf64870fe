//! Tranche Vault Program
//!
//! Yield aggregation over a liquidity-mining farm. Depositors hand the
//! pool a base asset (an LP token) and receive shares priced by an
//! exchange rate that only rises as the farm pays out.
//!
//! Architecture:
//! - SharePool (pool PDA per base asset) mints shares, owns the position registry
//! - Adapter PDA is the pool's single capital sink (live farm or pass-through)
//! - Autocompounder stakes into the farm, harvests rewards, re-adds liquidity
//! - InsuranceFund is the pool's fee manager: it takes the fee slice of
//!   rewards, converts them, and pays it out pro rata to time-locked
//!   insurance positions
//! - Every component has two-step governance (propose, then accept)
//!
//! The engines are written against the ports in [`ports`]. On chain the
//! ports are CPI clients ([`cpi`]); off chain [`sim`] supplies in-memory
//! token, farm and router venues and [`deployment`] wires them together.
//!
//! Instructions are listed on [`instruction::VaultInstruction`].

pub mod adapter;
pub mod compounder;
pub mod conversion;
pub mod cpi;
pub mod deployment;
pub mod error;
pub mod fund;
pub mod governance;
pub mod instruction;
pub mod math;
pub mod pool;
pub mod ports;
pub mod position;
pub mod processor;
pub mod sim;
pub mod state;

#[cfg(not(feature = "no-entrypoint"))]
mod entrypoint;
