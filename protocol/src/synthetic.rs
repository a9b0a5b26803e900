//! # Synthetic Index Token
//!
//! The tracked-index token is minted and burned exclusively by the vault
//! engine. The token service is the source of truth for balances and total
//! supply: when the engine asks to burn more than a holder owns, it is the
//! token that says no.
//!
//! [`IndexToken`] is the in-memory reference implementation. Only addresses
//! registered as minters may mint or burn; everyone else gets
//! [`TokenError::UnauthorizedMinter`].

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during token supply operations.
#[derive(Debug, Error)]
pub enum TokenError {
    /// The caller is not an authorized minter.
    #[error("unauthorized: {0} is not a minter of this token")]
    UnauthorizedMinter(Address),

    /// The holder does not own enough tokens to burn.
    #[error("insufficient balance: {holder} has {balance}, tried to burn {amount}")]
    InsufficientBalance {
        /// Account the burn was requested from.
        holder: Address,
        /// Its current balance.
        balance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// Minting would overflow 256 bits.
    #[error("supply overflow: minting {amount} would exceed U256::MAX")]
    SupplyOverflow {
        /// Amount that was attempted.
        amount: Amount,
    },
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// Supply-changing interface of the synthetic token.
pub trait SyntheticToken: Send + Sync {
    /// Address of this token, recorded in the engine configuration.
    fn address(&self) -> Address;

    /// Creates `amount` new tokens in `to`'s account on behalf of `minter`.
    fn mint(&self, minter: &Address, to: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Destroys `amount` tokens held by `from` on behalf of `minter`.
    fn burn(&self, minter: &Address, from: &Address, amount: Amount) -> Result<(), TokenError>;

    /// Tokens held by `holder`.
    fn balance_of(&self, holder: &Address) -> Amount;

    /// Tokens in existence.
    fn total_supply(&self) -> Amount;
}

// ---------------------------------------------------------------------------
// IndexToken
// ---------------------------------------------------------------------------

/// In-memory synthetic index token.
#[derive(Debug)]
pub struct IndexToken {
    address: Address,
    symbol: String,
    state: Mutex<TokenState>,
}

#[derive(Debug, Default)]
struct TokenState {
    minters: HashSet<Address>,
    balances: HashMap<Address, Amount>,
    total_supply: Amount,
}

impl TokenState {
    fn ensure_minter(&self, minter: &Address) -> Result<(), TokenError> {
        if self.minters.contains(minter) {
            Ok(())
        } else {
            Err(TokenError::UnauthorizedMinter(minter.clone()))
        }
    }
}

impl IndexToken {
    /// Creates a token with zero supply and no minters.
    pub fn new(address: impl Into<Address>, symbol: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            symbol: symbol.into(),
            state: Mutex::new(TokenState::default()),
        }
    }

    /// Ticker symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Authorizes `minter` to mint and burn.
    pub fn add_minter(&self, minter: &Address) {
        self.state.lock().minters.insert(minter.clone());
        tracing::info!(token = %self.address, %minter, "minter authorized");
    }

    /// Withdraws `minter`'s authorization.
    pub fn remove_minter(&self, minter: &Address) {
        self.state.lock().minters.remove(minter);
        tracing::info!(token = %self.address, %minter, "minter removed");
    }

    /// Returns whether `account` may mint.
    pub fn is_minter(&self, account: &Address) -> bool {
        self.state.lock().minters.contains(account)
    }
}

impl SyntheticToken for IndexToken {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn mint(&self, minter: &Address, to: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut state = self.state.lock();
        state.ensure_minter(minter)?;

        let supply = state
            .total_supply
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;
        let balance = state
            .balances
            .get(to)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)
            .ok_or(TokenError::SupplyOverflow { amount })?;

        state.total_supply = supply;
        state.balances.insert(to.clone(), balance);
        Ok(())
    }

    fn burn(&self, minter: &Address, from: &Address, amount: Amount) -> Result<(), TokenError> {
        let mut state = self.state.lock();
        state.ensure_minter(minter)?;

        let balance = state.balances.get(from).copied().unwrap_or_default();
        if balance < amount {
            return Err(TokenError::InsufficientBalance {
                holder: from.clone(),
                balance,
                amount,
            });
        }

        state.balances.insert(from.clone(), balance - amount);
        state.total_supply = state.total_supply.saturating_sub(amount);
        Ok(())
    }

    fn balance_of(&self, holder: &Address) -> Amount {
        self.state
            .lock()
            .balances
            .get(holder)
            .copied()
            .unwrap_or_default()
    }

    fn total_supply(&self) -> Amount {
        self.state.lock().total_supply
    }
}
