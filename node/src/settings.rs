//! # Node Settings
//!
//! The JSON file read by `synthex-node run` and written by
//! `synthex-node init`. It describes the devnet the node assembles at start
//! up: who administers the engine, who may open vaults, the engine
//! parameters, the opening oracle price and the stable balances handed out
//! before the first request.
//!
//! Every field has a default, so a partial file only overrides what it names.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use synthex_protocol::config::{DEFAULT_DIVISOR, DEFAULT_RATIO, PRICE_DECIMALS};
use synthex_protocol::types::decimal;
use synthex_protocol::{Address, Amount};

/// An initial stable-asset balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaucetGrant {
    pub account: Address,
    #[serde(with = "decimal")]
    pub amount: Amount,
}

/// Everything the node needs to assemble its engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Network label reported by `/status`.
    pub network: String,
    /// The engine's custody account and token minter identity.
    pub custody: Address,
    /// Accounts holding the administrative capability. The first one
    /// bootstraps the access registry and grants the rest.
    pub admins: Vec<Address>,
    /// Accounts granted the investor capability at start up.
    pub investors: Vec<Address>,
    /// Address of the stable asset ledger.
    pub stablecoin: Address,
    /// Address of the synthetic index token.
    pub synthetic_token: Address,
    /// Ticker of the synthetic index token.
    pub token_symbol: String,
    /// Address of the price feed.
    pub oracle: Address,
    /// Opening raw oracle price.
    #[serde(with = "decimal")]
    pub oracle_price: Amount,
    #[serde(with = "decimal")]
    pub divisor: Amount,
    #[serde(with = "decimal")]
    pub ratio: Amount,
    /// Stable balances issued at start up.
    pub faucet: Vec<FaucetGrant>,
}

impl Default for NodeSettings {
    fn default() -> Self {
        Self {
            network: "devnet".into(),
            custody: "synthex-vault".into(),
            admins: vec!["admin".into()],
            investors: Vec::new(),
            stablecoin: "susd".into(),
            synthetic_token: "sidx".into(),
            token_symbol: "sIDX".into(),
            oracle: "index-feed".into(),
            // 2.0 in 18-decimal fixed point.
            oracle_price: Amount::from(2u64) * Amount::exp10(PRICE_DECIMALS),
            divisor: Amount::from(DEFAULT_DIVISOR),
            ratio: Amount::from(DEFAULT_RATIO),
            faucet: Vec::new(),
        }
    }
}

impl NodeSettings {
    /// Reads and validates a settings file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?;
        let settings: NodeSettings = serde_json::from_str(&raw)
            .with_context(|| format!("invalid settings in {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::warn!(path = %path.display(), "no settings file, using defaults");
            Ok(Self::default())
        }
    }

    /// Writes the settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(self).context("failed to encode settings")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write settings to {}", path.display()))
    }

    /// Rejects settings the node cannot start from.
    ///
    /// A zero divisor or ratio is deliberately allowed: the engine accepts
    /// both and the node should be able to reproduce that state.
    pub fn validate(&self) -> Result<()> {
        if self.admins.is_empty() {
            bail!("settings must name at least one admin");
        }
        if self.custody.is_zero() {
            bail!("settings must name a custody account");
        }
        if self.admins.contains(&self.custody) || self.investors.contains(&self.custody) {
            bail!("the custody account {} cannot hold capabilities", self.custody);
        }
        Ok(())
    }

    /// The bootstrap admin.
    pub fn primary_admin(&self) -> Option<&Address> {
        self.admins.first()
    }
}
