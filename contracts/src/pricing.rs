//! # Pricing
//!
//! Turns the raw oracle price into the synthetic token's unit price and the
//! unit price into a collateral requirement.
//!
//! ```text
//! token_price         = oracle_price / divisor
//! required_collateral = token_price * amount * ratio / 100
//! ```
//!
//! Both are integer formulas evaluated left to right. The multiplication by
//! `ratio` happens before the single division by 100; reordering changes
//! the rounding and therefore the protocol's behavior.

use std::sync::Arc;

use synthex_protocol::config::PERCENT_BASE;
use synthex_protocol::{Address, Amount, PriceOracle};

use crate::error::VaultError;

/// Unit price of the synthetic token, truncating.
///
/// # Errors
///
/// [`VaultError::DivisionByZero`] when `divisor` is zero.
pub fn token_price(oracle_price: Amount, divisor: Amount) -> Result<Amount, VaultError> {
    oracle_price
        .checked_div(divisor)
        .ok_or(VaultError::DivisionByZero)
}

/// Collateral needed to back `amount` tokens at `token_price` and `ratio`.
///
/// # Errors
///
/// [`VaultError::ArithmeticOverflow`] if an intermediate product exceeds
/// 256 bits.
pub fn required_collateral(
    token_price: Amount,
    amount: Amount,
    ratio: Amount,
) -> Result<Amount, VaultError> {
    let overflow = || VaultError::ArithmeticOverflow("required collateral");
    let product = token_price
        .checked_mul(amount)
        .ok_or_else(overflow)?
        .checked_mul(ratio)
        .ok_or_else(overflow)?;
    Ok(product / Amount::from(PERCENT_BASE))
}

/// Read-only handle on the configured price feed.
///
/// No caching: each call goes to the feed.
#[derive(Clone)]
pub struct PriceOracleClient {
    oracle: Arc<dyn PriceOracle>,
}

impl PriceOracleClient {
    pub fn new(oracle: Arc<dyn PriceOracle>) -> Self {
        Self { oracle }
    }

    /// Address of the underlying feed.
    pub fn address(&self) -> Address {
        self.oracle.address()
    }

    /// The raw price as reported by the feed.
    pub fn current_unit_price(&self) -> Result<Amount, VaultError> {
        let price = self.oracle.price()?;
        tracing::debug!(feed = %self.oracle.address(), %price, "oracle price read");
        Ok(price)
    }

    /// The feed price normalized by `divisor`.
    pub fn token_price(&self, divisor: Amount) -> Result<Amount, VaultError> {
        token_price(self.current_unit_price()?, divisor)
    }
}

impl std::fmt::Debug for PriceOracleClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceOracleClient")
            .field("oracle", &self.oracle.address())
            .finish()
    }
}
