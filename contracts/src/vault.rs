//! # Vaults & the Vault Registry
//!
//! A [`Vault`] is one principal's position: free `collateral` and the
//! `stake` figure updated on mint and burn. Vaults are never deleted; a
//! fully unwound vault simply holds zeros.
//!
//! Balance transitions are pure: each returns the updated vault and leaves
//! the original untouched. The engine computes the new vault, performs the
//! external transfer, and only then commits it to the [`VaultRegistry`], so
//! a failed transfer leaves nothing to roll back.
//!
//! ## The `stake` formula
//!
//! ```text
//! mint:  collateral -= required;  stake = collateral + required
//! burn:  collateral += required;  stake = collateral - required
//! ```
//!
//! Because `stake` is computed from the *post-update* collateral, it always
//! ends up equal to the collateral the vault held before the operation,
//! rather than accumulating the amount backing outstanding debt. This is
//! almost certainly a defect in the accounting rule, but it is the rule
//! existing positions were recorded under, so it is reproduced literally.
//! Do not use `stake` as a measure of outstanding debt.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use synthex_protocol::config::{FIRST_VAULT_ID, NO_VAULT};
use synthex_protocol::types::decimal;
use synthex_protocol::{Address, Amount, VaultId};

use crate::error::VaultError;

/// One principal's collateralized position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub id: VaultId,
    #[serde(with = "decimal")]
    pub collateral: Amount,
    pub owner: Address,
    #[serde(with = "decimal")]
    pub stake: Amount,
}

impl Vault {
    fn open(id: VaultId, owner: Address) -> Self {
        Self {
            id,
            collateral: Amount::zero(),
            owner,
            stake: Amount::zero(),
        }
    }

    /// The zero-valued vault returned for ids that were never created.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `false` for the zero-valued placeholder.
    pub fn exists(&self) -> bool {
        self.id != NO_VAULT
    }

    /// `(id, collateral, owner, stake)`.
    pub fn as_tuple(&self) -> (VaultId, Amount, Address, Amount) {
        (self.id, self.collateral, self.owner.clone(), self.stake)
    }

    /// Adds `amount` to free collateral.
    pub fn deposit(&self, amount: Amount) -> Result<Vault, VaultError> {
        let collateral = self
            .collateral
            .checked_add(amount)
            .ok_or(VaultError::ArithmeticOverflow("collateral deposit"))?;
        Ok(Vault {
            collateral,
            ..self.clone()
        })
    }

    /// Takes `amount` out of free collateral.
    pub fn withdraw(&self, amount: Amount) -> Result<Vault, VaultError> {
        let collateral = self.debit(amount)?;
        Ok(Vault {
            collateral,
            ..self.clone()
        })
    }

    /// Moves `required` out of free collateral for a mint.
    pub fn lock_for_mint(&self, required: Amount) -> Result<Vault, VaultError> {
        let collateral = self.debit(required)?;
        // Cannot overflow: collateral + required is the previous collateral.
        let stake = collateral + required;
        Ok(Vault {
            collateral,
            stake,
            ..self.clone()
        })
    }

    /// Moves `required` back into free collateral for a burn.
    pub fn release_for_burn(&self, required: Amount) -> Result<Vault, VaultError> {
        let collateral = self
            .collateral
            .checked_add(required)
            .ok_or(VaultError::ArithmeticOverflow("collateral release"))?;
        // Cannot underflow: collateral - required is the previous collateral.
        let stake = collateral - required;
        Ok(Vault {
            collateral,
            stake,
            ..self.clone()
        })
    }

    fn debit(&self, amount: Amount) -> Result<Amount, VaultError> {
        self.collateral
            .checked_sub(amount)
            .ok_or(VaultError::InsufficientCollateral {
                available: self.collateral,
                required: amount,
            })
    }
}

/// Every vault ever created, plus the principal → id index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultRegistry {
    vaults: BTreeMap<VaultId, Vault>,
    owners: HashMap<Address, VaultId>,
    next_id: VaultId,
}

impl VaultRegistry {
    pub fn new() -> Self {
        Self {
            vaults: BTreeMap::new(),
            owners: HashMap::new(),
            next_id: FIRST_VAULT_ID,
        }
    }

    /// The vault id of `owner`, or [`NO_VAULT`].
    pub fn id_of(&self, owner: &Address) -> VaultId {
        self.owners.get(owner).copied().unwrap_or(NO_VAULT)
    }

    /// The vault with `id`, or the zero-valued vault.
    pub fn get(&self, id: VaultId) -> Vault {
        self.vaults.get(&id).cloned().unwrap_or_default()
    }

    /// The vault owned by `owner`.
    pub fn find_by_owner(&self, owner: &Address) -> Option<&Vault> {
        self.owners.get(owner).and_then(|id| self.vaults.get(id))
    }

    /// Creates a vault for `owner` with the next sequential id.
    ///
    /// # Errors
    ///
    /// [`VaultError::VaultAlreadyExists`] if `owner` already has one.
    pub fn open(&mut self, owner: &Address) -> Result<Vault, VaultError> {
        let existing = self.id_of(owner);
        if existing != NO_VAULT {
            return Err(VaultError::VaultAlreadyExists {
                owner: owner.clone(),
                vault_id: existing,
            });
        }

        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or(VaultError::ArithmeticOverflow("vault id"))?;

        let vault = Vault::open(id, owner.clone());
        self.vaults.insert(id, vault.clone());
        self.owners.insert(owner.clone(), id);
        Ok(vault)
    }

    /// Replaces a stored vault with an updated copy. Only vaults that were
    /// opened through this registry are accepted.
    pub fn commit(&mut self, vault: Vault) -> bool {
        match self.vaults.get_mut(&vault.id) {
            Some(slot) if slot.owner == vault.owner => {
                *slot = vault;
                true
            }
            _ => false,
        }
    }

    /// Number of vaults ever created.
    pub fn len(&self) -> usize {
        self.vaults.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vaults.is_empty()
    }

    /// All vaults in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Vault> {
        self.vaults.values()
    }
}

impl Default for VaultRegistry {
    fn default() -> Self {
        Self::new()
    }
}
