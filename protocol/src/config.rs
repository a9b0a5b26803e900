//! # Protocol Configuration & Constants
//!
//! Every magic number in SYNTHEX lives here, next to the [`EngineConfig`]
//! object that carries the mutable, admin-controlled parameters.
//!
//! The engine never reads configuration from ambient globals. It owns one
//! `EngineConfig`, takes a snapshot of it at the start of each operation and
//! threads that snapshot through every price and collateral computation.

use serde::{Deserialize, Serialize};

use crate::types::{Address, Amount, VaultId};

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string of the protocol crate.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Accounting Parameters
// ---------------------------------------------------------------------------

/// `ratio` is an integer percentage; the collateral formula divides by this.
pub const PERCENT_BASE: u64 = 100;

/// Default collateral-to-debt ratio: 150%.
pub const DEFAULT_RATIO: u64 = 150;

/// Default price divisor. A divisor of 1 passes the oracle price through.
pub const DEFAULT_DIVISOR: u64 = 1;

/// Decimal places of the raw oracle price and of both tokens.
/// Display only; the protocol itself never rescales by this.
pub const PRICE_DECIMALS: usize = 18;

/// Sentinel vault id meaning "this principal has no vault".
pub const NO_VAULT: VaultId = 0;

/// The first id handed out by the vault registry.
pub const FIRST_VAULT_ID: VaultId = 1;

// ---------------------------------------------------------------------------
// Node Parameters
// ---------------------------------------------------------------------------

/// Broadcast channel capacity for live event fan-out in the node.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Most journal records returned by one `GET /events` page.
pub const MAX_EVENTS_PAGE: usize = 500;

/// Default port of the node's JSON API.
pub const DEFAULT_API_PORT: u16 = 9841;

/// Default port of the node's Prometheus endpoint.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// Engine Configuration
// ---------------------------------------------------------------------------

/// Process-wide engine parameters.
///
/// Mutated only through the engine's administrative operations, which
/// replace a field unconditionally. In particular a zero `divisor` is
/// accepted here and only fails later, when a price is computed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Address of the synthetic-token service the engine mints through.
    pub synthetic_token: Address,
    /// Address of the price oracle.
    pub oracle: Address,
    /// Address of the stable asset ledger.
    pub stablecoin: Address,
    /// The engine's own account on the stable ledger, where collateral is held.
    pub custody: Address,
    /// Oracle price normalization factor.
    #[serde(with = "crate::types::decimal")]
    pub divisor: Amount,
    /// Collateral-to-debt ratio as an integer percentage (150 = 150%).
    #[serde(with = "crate::types::decimal")]
    pub ratio: Amount,
}

impl EngineConfig {
    /// Creates a configuration with the default divisor and ratio.
    pub fn new(
        custody: Address,
        stablecoin: Address,
        synthetic_token: Address,
        oracle: Address,
    ) -> Self {
        Self {
            synthetic_token,
            oracle,
            stablecoin,
            custody,
            divisor: Amount::from(DEFAULT_DIVISOR),
            ratio: Amount::from(DEFAULT_RATIO),
        }
    }

    /// Overrides the divisor.
    pub fn with_divisor(mut self, divisor: impl Into<Amount>) -> Self {
        self.divisor = divisor.into();
        self
    }

    /// Overrides the ratio.
    pub fn with_ratio(mut self, ratio: impl Into<Amount>) -> Self {
        self.ratio = ratio.into();
        self
    }
}
