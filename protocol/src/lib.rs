// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # SYNTHEX Protocol — Shared Types & Collaborator Interfaces
//!
//! SYNTHEX lets investors lock a stable asset in a vault and mint a
//! synthetic tracked-index token against it. This crate holds everything the
//! vault engine talks to but does not own:
//!
//! - **types** — addresses, 256-bit amounts, vault ids.
//! - **config** — protocol constants and the engine configuration object.
//! - **oracle** — the price feed interface and a hand-driven feed.
//! - **ledger** — the stable asset interface and an in-memory ledger.
//! - **synthetic** — the index token interface and an in-memory token.
//! - **events** — domain events, the journal, and event sinks.
//!
//! The engine itself lives in `synthex-contracts`.
//!
//! ## Design Philosophy
//!
//! 1. Integers only. Rounding is truncation and it is part of the protocol.
//! 2. Collaborators are traits; the in-memory implementations are real
//!    enough to run a devnet, not mocks.
//! 3. If it touches money, it has tests. Plural.

pub mod config;
pub mod events;
pub mod ledger;
pub mod oracle;
pub mod synthetic;
pub mod types;

pub use events::{EventLog, EventRecord, EventSink, VaultEvent};
pub use ledger::{CollateralLedger, LedgerError, StableLedger};
pub use oracle::{ManualPriceOracle, OracleError, PriceOracle};
pub use synthetic::{IndexToken, SyntheticToken, TokenError};
pub use types::{Address, Amount, VaultId, U256};
