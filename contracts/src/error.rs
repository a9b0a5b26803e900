//! Error taxonomy of the vault engine.
//!
//! Every engine operation performs all of its checks before it mutates
//! anything, so any error returned here means nothing was committed and no
//! value moved.

use std::fmt;

use serde::{Deserialize, Serialize};
use synthex_protocol::{Address, Amount, LedgerError, OracleError, TokenError, VaultId};
use thiserror::Error;

use crate::access::AccessError;

/// The capability a caller was missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May create and operate a vault.
    Investor,
    /// May change engine parameters and grant capabilities.
    Admin,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Investor => write!(f, "investor"),
            Capability::Admin => write!(f, "admin"),
        }
    }
}

/// Errors returned by [`VaultEngine`](crate::engine::VaultEngine) operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The caller lacks the capability the operation requires.
    #[error("unauthorized: {caller} does not hold the {capability} capability")]
    Unauthorized {
        /// Who tried.
        caller: Address,
        /// What they were missing.
        capability: Capability,
    },

    /// The caller has no vault.
    #[error("no vault exists for {0}")]
    VaultNotFound(Address),

    /// The caller already owns a vault.
    #[error("{owner} already owns vault {vault_id}")]
    VaultAlreadyExists {
        /// Owner of the existing vault.
        owner: Address,
        /// Its id.
        vault_id: VaultId,
    },

    /// The vault's free collateral does not cover a withdrawal or a mint.
    #[error("insufficient collateral: available {available}, required {required}")]
    InsufficientCollateral {
        /// Free collateral in the vault.
        available: Amount,
        /// Amount the operation needed.
        required: Amount,
    },

    /// A mutating operation was entered while another one was in flight.
    #[error("reentrant call rejected")]
    ReentrantCall,

    /// The price feed did not answer.
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    /// The stable asset ledger refused a transfer.
    #[error("collateral transfer failed: {0}")]
    TransferFailed(#[from] LedgerError),

    /// The synthetic token refused a mint or burn.
    #[error("synthetic token operation failed: {0}")]
    TokenOperationFailed(#[from] TokenError),

    /// A capability change was refused by the access registry.
    #[error("access change rejected: {0}")]
    AccessChange(#[from] AccessError),

    /// The configured divisor is zero.
    #[error("division by zero: price divisor is zero")]
    DivisionByZero,

    /// A 256-bit computation overflowed.
    #[error("arithmetic overflow in {0}")]
    ArithmeticOverflow(&'static str),
}

impl VaultError {
    /// Short machine-readable name of the variant, used in logs, metrics
    /// labels and API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            VaultError::Unauthorized { .. } => "unauthorized",
            VaultError::VaultNotFound(_) => "vault_not_found",
            VaultError::VaultAlreadyExists { .. } => "vault_already_exists",
            VaultError::InsufficientCollateral { .. } => "insufficient_collateral",
            VaultError::ReentrantCall => "reentrant_call",
            VaultError::OracleUnavailable(_) => "oracle_unavailable",
            VaultError::TransferFailed(_) => "transfer_failed",
            VaultError::TokenOperationFailed(_) => "token_operation_failed",
            VaultError::AccessChange(_) => "access_change_rejected",
            VaultError::DivisionByZero => "division_by_zero",
            VaultError::ArithmeticOverflow(_) => "arithmetic_overflow",
        }
    }
}
