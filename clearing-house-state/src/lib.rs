//! # Clearing House Account Layouts
//!
//! Off-chain mirror of the accounts owned by the clearing house program.
//!
//! Every account is an Anchor account: an 8-byte discriminator followed by the
//! Borsh-encoded body. Clients decode them with [`anchor_lang::AccountDeserialize`],
//! which rejects buffers whose discriminator belongs to a different account type.
//!
//! ## Key Concepts
//!
//! - **Global state:** [`State`] lives at a PDA derived from the program id (see
//!   [`state_address`]). It is the root of the account graph: the addresses of the
//!   markets account, the order state account and every history account are
//!   fields inside it.
//! - **History accounts:** Trade, deposit, funding payment, funding rate, curve and
//!   liquidation histories are ring buffers. `head` is the slot the next record
//!   will be written to.
//!
//! ## Modules
//!
//! - [`state`]: The global state, markets and order state accounts.
//! - [`history`]: The ring-buffer history accounts and their record types.

#![allow(unexpected_cfgs)]

pub mod history;
pub mod state;

use anchor_lang::prelude::*;
pub use history::*;
pub use state::*;

declare_id!("dammHkt7jmytvbS3nHTxQNEcP59aE57nxwV21YdqEDN");

/// Seed of the global state PDA.
pub const STATE_SEED: &[u8] = b"clearing_house";

/// Derives the address of the global [`State`] account for `program_id`.
pub fn state_address(program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[STATE_SEED], program_id).0
}
