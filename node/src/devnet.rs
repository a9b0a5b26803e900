//! # Devnet Assembly
//!
//! Wires a [`VaultEngine`] to the in-memory reference collaborators
//! described by [`NodeSettings`], and keeps concrete handles on those
//! collaborators so the API can drive the simulated price feed and faucet.

use anyhow::{Context, Result};
use std::sync::Arc;

use synthex_contracts::{AccessRegistry, VaultEngine};
use synthex_protocol::{IndexToken, ManualPriceOracle, StableLedger};

use crate::settings::NodeSettings;

/// A vault engine together with the devnet collaborators behind it.
#[derive(Clone)]
pub struct Devnet {
    pub engine: Arc<VaultEngine>,
    pub ledger: Arc<StableLedger>,
    pub token: Arc<IndexToken>,
    pub oracle: Arc<ManualPriceOracle>,
}

impl Devnet {
    /// Builds the engine, grants the configured capabilities and issues the
    /// faucet balances. Every grant goes through the engine, so the journal
    /// starts with the full bootstrap history.
    pub fn from_settings(settings: &NodeSettings) -> Result<Self> {
        settings.validate()?;
        let admin = settings
            .primary_admin()
            .context("settings must name at least one admin")?
            .clone();

        let ledger = Arc::new(StableLedger::new(settings.stablecoin.clone()));
        let token = Arc::new(IndexToken::new(
            settings.synthetic_token.clone(),
            settings.token_symbol.clone(),
        ));
        let oracle = Arc::new(ManualPriceOracle::new(
            settings.oracle.clone(),
            settings.oracle_price,
        ));
        token.add_minter(&settings.custody);

        let engine = VaultEngine::new(
            settings.custody.clone(),
            Arc::new(AccessRegistry::new(admin.clone())),
            ledger.clone(),
            token.clone(),
            oracle.clone(),
        )
        .with_divisor(settings.divisor)
        .with_ratio(settings.ratio);

        for extra in settings.admins.iter().skip(1) {
            engine
                .grant_admin(&admin, extra)
                .with_context(|| format!("failed to grant admin to {extra}"))?;
        }
        for investor in &settings.investors {
            engine
                .grant_investor(&admin, investor)
                .with_context(|| format!("failed to grant investor to {investor}"))?;
        }
        for grant in &settings.faucet {
            ledger
                .issue(&grant.account, grant.amount)
                .with_context(|| format!("failed to fund {}", grant.account))?;
        }

        tracing::info!(
            custody = %settings.custody,
            admins = settings.admins.len(),
            investors = settings.investors.len(),
            funded = settings.faucet.len(),
            "devnet assembled"
        );

        Ok(Self {
            engine: Arc::new(engine),
            ledger,
            token,
            oracle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::FaucetGrant;
    use synthex_protocol::{Address, Amount, CollateralLedger};

    #[test]
    fn bootstrap_grants_and_funds() {
        let settings = NodeSettings {
            admins: vec!["admin".into(), "ops".into()],
            investors: vec!["alice".into()],
            faucet: vec![FaucetGrant {
                account: "alice".into(),
                amount: Amount::from(1_000u64),
            }],
            ..NodeSettings::default()
        };
        let devnet = Devnet::from_settings(&settings).unwrap();

        assert!(devnet.engine.is_admin(&"ops".into()));
        assert!(devnet.engine.has_investor_role(&"alice".into()));
        assert_eq!(devnet.ledger.balance_of(&"alice".into()), Amount::from(1_000u64));
        assert_eq!(devnet.engine.events().len(), 2);
        assert_eq!(devnet.engine.config().custody, Address::new("synthex-vault"));
    }

    #[test]
    fn engine_can_mint_through_its_token() {
        let settings = NodeSettings {
            investors: vec!["alice".into()],
            ..NodeSettings::default()
        };
        let devnet = Devnet::from_settings(&settings).unwrap();
        devnet.engine.create_vault(&"alice".into()).unwrap();
        devnet.engine.set_ratio(&"admin".into(), Amount::zero()).unwrap();
        devnet.engine.mint(&"alice".into(), Amount::from(3u64)).unwrap();
        assert!(devnet.token.is_minter(&settings.custody));
    }
}
