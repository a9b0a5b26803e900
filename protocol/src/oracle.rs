//! # Price Oracle Interface
//!
//! The engine consumes the index price as an opaque service: it asks for the
//! current raw price and gets an integer back, or an error. How the price is
//! produced is somebody else's problem.
//!
//! [`ManualPriceOracle`] is the reference implementation used by the devnet
//! node and the test suites. Its price is set by hand and it can be taken
//! offline to exercise the failure path.

use parking_lot::RwLock;
use thiserror::Error;

use crate::types::{Address, Amount};

/// Errors reported by a price source.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The price source could not produce a price right now.
    #[error("price feed {feed} is unavailable: {reason}")]
    Unavailable {
        /// Address of the feed that failed.
        feed: Address,
        /// Human-readable reason from the feed.
        reason: String,
    },
}

/// A read-only source of the raw index price.
///
/// Implementations must not cache on the engine's behalf. Every call is
/// expected to return the live value.
pub trait PriceOracle: Send + Sync {
    /// Address of this feed, recorded in the engine configuration.
    fn address(&self) -> Address;

    /// The current raw price, scaled by [`PRICE_DECIMALS`](crate::config::PRICE_DECIMALS).
    fn price(&self) -> Result<Amount, OracleError>;
}

/// A price feed whose value is set explicitly.
#[derive(Debug)]
pub struct ManualPriceOracle {
    address: Address,
    state: RwLock<FeedState>,
}

#[derive(Debug)]
struct FeedState {
    price: Amount,
    online: bool,
}

impl ManualPriceOracle {
    /// Creates an online feed reporting `price`.
    pub fn new(address: impl Into<Address>, price: impl Into<Amount>) -> Self {
        Self {
            address: address.into(),
            state: RwLock::new(FeedState {
                price: price.into(),
                online: true,
            }),
        }
    }

    /// Replaces the reported price.
    pub fn set_price(&self, price: impl Into<Amount>) {
        let price = price.into();
        self.state.write().price = price;
        tracing::debug!(feed = %self.address, %price, "manual oracle price updated");
    }

    /// Takes the feed offline (`false`) or back online (`true`).
    pub fn set_online(&self, online: bool) {
        self.state.write().online = online;
        tracing::debug!(feed = %self.address, online, "manual oracle availability changed");
    }

    /// Returns whether the feed currently answers.
    pub fn is_online(&self) -> bool {
        self.state.read().online
    }
}

impl PriceOracle for ManualPriceOracle {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn price(&self) -> Result<Amount, OracleError> {
        let state = self.state.read();
        if !state.online {
            return Err(OracleError::Unavailable {
                feed: self.address.clone(),
                reason: "feed is offline".into(),
            });
        }
        Ok(state.price)
    }
}
