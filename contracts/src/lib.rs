//! # SYNTHEX Contracts
//!
//! The vault engine and the pieces it is built from. Investors lock a stable
//! asset in a per-principal vault and mint a synthetic index token against
//! it, up to a collateral ratio applied to the live oracle price.
//!
//! - **access** — admin and investor capabilities.
//! - **guard** — the reentrancy guard every mutating operation runs under.
//! - **pricing** — oracle client and the collateral formula.
//! - **vault** — vault records, balance transitions, the registry.
//! - **engine** — [`VaultEngine`], which ties all of the above to the
//!   ledger and token collaborators.
//!
//! ## Design Principles
//!
//! 1. All monetary arithmetic is checked. Overflow is an error, never a wrap.
//! 2. Every check precedes every write. A failed operation changes nothing.
//! 3. Collaborators are traits, so the engine can be driven by anything that
//!    speaks the interface, including hostile test doubles.

pub mod access;
pub mod engine;
pub mod error;
pub mod guard;
pub mod pricing;
pub mod vault;

pub use access::{AccessControl, AccessError, AccessRegistry};
pub use engine::VaultEngine;
pub use error::{Capability, VaultError};
pub use vault::Vault;
