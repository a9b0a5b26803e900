//! # Access Registry
//!
//! Capabilities are plain set membership queried by identity. There are two:
//!
//! - **admin** — may change engine parameters and hand out capabilities.
//! - **investor** — may create and operate a vault.
//!
//! The engine only sees the [`AccessControl`] trait, so tests and embedders
//! can substitute their own policy. [`AccessRegistry`] is the stock
//! implementation.
//!
//! The registry refuses to revoke the last administrator: a system with no
//! admin can never be reconfigured again.

use std::collections::BTreeSet;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use synthex_protocol::Address;
use thiserror::Error;

/// Errors raised by capability changes.
#[derive(Debug, Error)]
pub enum AccessError {
    /// Only an administrator may change capabilities.
    #[error("unauthorized: {0} is not an administrator")]
    NotAdmin(Address),

    /// Revoking this administrator would leave the system without one.
    #[error("cannot revoke {0}: it is the last administrator")]
    LastAdmin(Address),

    /// The engine's custody account cannot hold capabilities. Its ledger
    /// transfers to itself move nothing, so a vault it owned could be
    /// credited collateral that was never deposited.
    #[error("{0} is the custody account and cannot hold capabilities")]
    CustodyAccount(Address),
}

/// Capability predicates and mutations used by the engine.
pub trait AccessControl: Send + Sync {
    /// Returns whether `account` holds the administrative capability.
    fn is_admin(&self, account: &Address) -> bool;

    /// Returns whether `account` holds the investor capability.
    fn has_investor_role(&self, account: &Address) -> bool;

    /// Grants the investor capability. Granting twice is not an error.
    fn grant_investor(&self, caller: &Address, account: &Address) -> Result<(), AccessError>;

    /// Revokes the investor capability. Revoking a non-holder is not an error.
    fn revoke_investor(&self, caller: &Address, account: &Address) -> Result<(), AccessError>;

    /// Grants the administrative capability.
    fn grant_admin(&self, caller: &Address, account: &Address) -> Result<(), AccessError>;

    /// Revokes the administrative capability.
    fn revoke_admin(&self, caller: &Address, account: &Address) -> Result<(), AccessError>;
}

/// Snapshot of the registry membership.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roles {
    pub admins: BTreeSet<Address>,
    pub investors: BTreeSet<Address>,
}

/// In-memory capability registry.
#[derive(Debug)]
pub struct AccessRegistry {
    roles: RwLock<Roles>,
}

impl AccessRegistry {
    /// Creates a registry whose only member is `admin`.
    pub fn new(admin: Address) -> Self {
        let mut roles = Roles::default();
        roles.admins.insert(admin);
        Self {
            roles: RwLock::new(roles),
        }
    }

    /// Current membership.
    pub fn roles(&self) -> Roles {
        self.roles.read().clone()
    }

    fn ensure_admin(roles: &Roles, caller: &Address) -> Result<(), AccessError> {
        if roles.admins.contains(caller) {
            Ok(())
        } else {
            Err(AccessError::NotAdmin(caller.clone()))
        }
    }
}

impl AccessControl for AccessRegistry {
    fn is_admin(&self, account: &Address) -> bool {
        self.roles.read().admins.contains(account)
    }

    fn has_investor_role(&self, account: &Address) -> bool {
        self.roles.read().investors.contains(account)
    }

    fn grant_investor(&self, caller: &Address, account: &Address) -> Result<(), AccessError> {
        let mut roles = self.roles.write();
        Self::ensure_admin(&roles, caller)?;
        roles.investors.insert(account.clone());
        Ok(())
    }

    fn revoke_investor(&self, caller: &Address, account: &Address) -> Result<(), AccessError> {
        let mut roles = self.roles.write();
        Self::ensure_admin(&roles, caller)?;
        roles.investors.remove(account);
        Ok(())
    }

    fn grant_admin(&self, caller: &Address, account: &Address) -> Result<(), AccessError> {
        let mut roles = self.roles.write();
        Self::ensure_admin(&roles, caller)?;
        roles.admins.insert(account.clone());
        Ok(())
    }

    fn revoke_admin(&self, caller: &Address, account: &Address) -> Result<(), AccessError> {
        let mut roles = self.roles.write();
        Self::ensure_admin(&roles, caller)?;
        if roles.admins.contains(account) && roles.admins.len() == 1 {
            return Err(AccessError::LastAdmin(account.clone()));
        }
        roles.admins.remove(account);
        Ok(())
    }
}
