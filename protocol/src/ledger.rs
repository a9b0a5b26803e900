//! # Stable Asset Ledger
//!
//! Collateral is denominated in a stable asset that lives on its own ledger.
//! The engine never touches balances directly; it asks the ledger to pull
//! funds from a depositor (`transfer_from`, spending an allowance the
//! depositor granted to the engine) or to pay funds out of custody
//! (`transfer`).
//!
//! [`StableLedger`] is an in-memory ERC-20 style ledger: balances,
//! allowances, a faucet for devnet, and a pause switch so the failure path of
//! every transfer can be exercised.

use std::collections::HashMap;

use parking_lot::Mutex;
use thiserror::Error;

use crate::types::{Address, Amount};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur when moving the stable asset.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The source account does not hold enough of the asset.
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// Account being debited.
        account: Address,
        /// Its current balance.
        balance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// The spender has not been approved for enough of the owner's funds.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}, needs {amount}")]
    InsufficientAllowance {
        /// Account whose funds are being spent.
        owner: Address,
        /// Account doing the spending.
        spender: Address,
        /// Remaining approved amount.
        allowance: Amount,
        /// Amount requested.
        amount: Amount,
    },

    /// A credit would overflow 256 bits.
    #[error("balance overflow crediting {amount} to {account}")]
    Overflow {
        /// Account being credited.
        account: Address,
        /// Amount that overflowed.
        amount: Amount,
    },

    /// All transfers are suspended.
    #[error("ledger {0} is paused")]
    Paused(Address),

    /// The ledger refused the transfer for an implementation-specific reason.
    #[error("transfer rejected: {0}")]
    Rejected(String),
}

// ---------------------------------------------------------------------------
// Interface
// ---------------------------------------------------------------------------

/// The engine's view of the stable asset.
pub trait CollateralLedger: Send + Sync {
    /// Address of this ledger, recorded in the engine configuration.
    fn address(&self) -> Address;

    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance on
    /// `from`'s funds. Nothing moves on error.
    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError>;

    /// Moves `amount` from `owner`'s own balance to `to`. Nothing moves on error.
    fn transfer(&self, owner: &Address, to: &Address, amount: Amount) -> Result<(), LedgerError>;

    /// Current balance of `account`.
    fn balance_of(&self, account: &Address) -> Amount;
}

// ---------------------------------------------------------------------------
// StableLedger
// ---------------------------------------------------------------------------

/// In-memory stable asset ledger.
#[derive(Debug)]
pub struct StableLedger {
    address: Address,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Address, Amount>,
    /// `(owner, spender) -> remaining allowance`.
    allowances: HashMap<(Address, Address), Amount>,
    total_supply: Amount,
    paused: bool,
}

impl LedgerState {
    fn balance(&self, account: &Address) -> Amount {
        self.balances.get(account).copied().unwrap_or_default()
    }

    /// Debit-then-credit with both legs checked before either is written.
    fn move_funds(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        let from_balance = self.balance(from);
        if from_balance < amount {
            return Err(LedgerError::InsufficientBalance {
                account: from.clone(),
                balance: from_balance,
                amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance(to)
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Overflow {
                account: to.clone(),
                amount,
            })?;

        self.balances.insert(from.clone(), from_balance - amount);
        self.balances.insert(to.clone(), to_balance);
        Ok(())
    }
}

impl StableLedger {
    /// Creates an empty, unpaused ledger.
    pub fn new(address: impl Into<Address>) -> Self {
        Self {
            address: address.into(),
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Creates new units of the asset in `to`'s account. Devnet faucet.
    pub fn issue(&self, to: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        let mut state = self.state.lock();
        let overflow = || LedgerError::Overflow {
            account: to.clone(),
            amount,
        };
        let supply = state.total_supply.checked_add(amount).ok_or_else(overflow)?;
        let balance = state.balance(to).checked_add(amount).ok_or_else(overflow)?;

        state.total_supply = supply;
        state.balances.insert(to.clone(), balance);
        tracing::debug!(ledger = %self.address, account = %to, %amount, "stable asset issued");
        Ok(balance)
    }

    /// Sets the amount `spender` may move out of `owner`'s account.
    /// Replaces any previous allowance.
    pub fn approve(&self, owner: &Address, spender: &Address, amount: Amount) {
        self.state
            .lock()
            .allowances
            .insert((owner.clone(), spender.clone()), amount);
        tracing::debug!(ledger = %self.address, %owner, %spender, %amount, "allowance set");
    }

    /// Remaining allowance of `spender` over `owner`'s funds.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state
            .lock()
            .allowances
            .get(&(owner.clone(), spender.clone()))
            .copied()
            .unwrap_or_default()
    }

    /// Total units in existence.
    pub fn total_supply(&self) -> Amount {
        self.state.lock().total_supply
    }

    /// Suspends (`true`) or resumes (`false`) all transfers.
    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
        tracing::info!(ledger = %self.address, paused, "stable ledger pause switch changed");
    }
}

impl CollateralLedger for StableLedger {
    fn address(&self) -> Address {
        self.address.clone()
    }

    fn transfer_from(
        &self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        if state.paused {
            return Err(LedgerError::Paused(self.address.clone()));
        }

        let key = (from.clone(), spender.clone());
        let allowance = state.allowances.get(&key).copied().unwrap_or_default();
        if allowance < amount {
            return Err(LedgerError::InsufficientAllowance {
                owner: from.clone(),
                spender: spender.clone(),
                allowance,
                amount,
            });
        }

        state.move_funds(from, to, amount)?;
        state.allowances.insert(key, allowance - amount);
        Ok(())
    }

    fn transfer(&self, owner: &Address, to: &Address, amount: Amount) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        if state.paused {
            return Err(LedgerError::Paused(self.address.clone()));
        }
        state.move_funds(owner, to, amount)
    }

    fn balance_of(&self, account: &Address) -> Amount {
        self.state.lock().balance(account)
    }
}
