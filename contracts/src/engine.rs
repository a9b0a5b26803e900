//! # Vault Engine
//!
//! Owns the vault registry and the engine configuration, and orchestrates
//! every movement of value between depositors, custody, and the synthetic
//! token.
//!
//! ## Operation shape
//!
//! Every mutating vault operation runs the same sequence:
//!
//! 1. Claim the [`ReentrancyGuard`] (fail fast with `ReentrantCall`).
//! 2. Check the caller's investor capability.
//! 3. Load the caller's vault and snapshot the configuration.
//! 4. Read the oracle once, if the operation is priced.
//! 5. Compute the updated vault. All balance checks happen here.
//! 6. Call out to the ledger or the token.
//! 7. Commit the updated vault and emit one event.
//!
//! Nothing is written before step 7, so any failure, including a failed
//! external call, leaves the engine exactly as it was. A collaborator that
//! calls back into the engine during step 6 sees the pre-operation state
//! and cannot start another mutating operation.
//!
//! Administrative operations are single writes and do not take the guard.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use synthex_protocol::config::EngineConfig;
use synthex_protocol::{
    Address, Amount, CollateralLedger, EventLog, EventRecord, EventSink, PriceOracle,
    SyntheticToken, VaultEvent, VaultId,
};

use crate::access::{AccessControl, AccessError};
use crate::error::{Capability, VaultError};
use crate::guard::ReentrancyGuard;
use crate::pricing::{self, PriceOracleClient};
use crate::vault::{Vault, VaultRegistry};

/// Handles on the collaborators the engine currently talks to.
#[derive(Clone)]
struct Services {
    oracle: PriceOracleClient,
    ledger: Arc<dyn CollateralLedger>,
    token: Arc<dyn SyntheticToken>,
}

/// The collateralized-debt-position engine.
///
/// `Send + Sync`; share it behind an `Arc`.
pub struct VaultEngine {
    access: Arc<dyn AccessControl>,
    config: RwLock<EngineConfig>,
    services: RwLock<Services>,
    registry: Mutex<VaultRegistry>,
    guard: ReentrancyGuard,
    journal: EventLog,
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl VaultEngine {
    /// Creates an engine with the default divisor and ratio.
    ///
    /// `custody` is the engine's own identity: the account holding
    /// collateral on the ledger and the minter of the synthetic token.
    pub fn new(
        custody: Address,
        access: Arc<dyn AccessControl>,
        ledger: Arc<dyn CollateralLedger>,
        token: Arc<dyn SyntheticToken>,
        oracle: Arc<dyn PriceOracle>,
    ) -> Self {
        let config = EngineConfig::new(custody, ledger.address(), token.address(), oracle.address());
        Self {
            access,
            config: RwLock::new(config),
            services: RwLock::new(Services {
                oracle: PriceOracleClient::new(oracle),
                ledger,
                token,
            }),
            registry: Mutex::new(VaultRegistry::new()),
            guard: ReentrancyGuard::new(),
            journal: EventLog::new(),
            sinks: RwLock::new(Vec::new()),
        }
    }

    /// Sets the initial divisor. Construction-time only; emits no event.
    pub fn with_divisor(self, divisor: impl Into<Amount>) -> Self {
        self.config.write().divisor = divisor.into();
        self
    }

    /// Sets the initial ratio. Construction-time only; emits no event.
    pub fn with_ratio(self, ratio: impl Into<Amount>) -> Self {
        self.config.write().ratio = ratio.into();
        self
    }

    /// Registers an additional event consumer.
    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    // -----------------------------------------------------------------------
    // Vault operations
    // -----------------------------------------------------------------------

    /// Opens a vault for `caller`.
    ///
    /// # Errors
    ///
    /// `ReentrantCall`, `Unauthorized`, `VaultAlreadyExists`.
    pub fn create_vault(&self, caller: &Address) -> Result<Vault, VaultError> {
        self.guarded("create_vault", caller, || {
            self.require(caller, Capability::Investor)?;
            let vault = self.registry.lock().open(caller)?;

            tracing::info!(owner = %caller, vault_id = vault.id, "vault created");
            self.emit(VaultEvent::VaultCreated {
                owner: caller.clone(),
                vault_id: vault.id,
            });
            Ok(vault)
        })
    }

    /// Pulls `amount` of the stable asset from `caller` into custody and
    /// credits it to the caller's vault.
    ///
    /// The caller must have approved the engine's custody account on the
    /// ledger for at least `amount`.
    ///
    /// # Errors
    ///
    /// `ReentrantCall`, `Unauthorized`, `VaultNotFound`, `ArithmeticOverflow`,
    /// `TransferFailed`.
    pub fn add_collateral(&self, caller: &Address, amount: Amount) -> Result<Vault, VaultError> {
        self.guarded("add_collateral", caller, || {
            self.require(caller, Capability::Investor)?;
            let vault = self.vault_for(caller)?;
            let custody = self.config.read().custody.clone();
            let ledger = self.services.read().ledger.clone();

            let updated = vault.deposit(amount)?;
            tracing::debug!(owner = %caller, %amount, "pulling collateral into custody");
            ledger.transfer_from(&custody, caller, &custody, amount)?;

            self.commit(&updated);
            tracing::info!(
                owner = %caller,
                vault_id = updated.id,
                %amount,
                collateral = %updated.collateral,
                "collateral added"
            );
            self.emit(VaultEvent::CollateralAdded {
                owner: caller.clone(),
                vault_id: updated.id,
                amount,
            });
            Ok(updated)
        })
    }

    /// Returns `amount` of free collateral from custody to `caller`.
    ///
    /// # Errors
    ///
    /// `ReentrantCall`, `Unauthorized`, `VaultNotFound`,
    /// `InsufficientCollateral`, `TransferFailed`.
    pub fn remove_collateral(&self, caller: &Address, amount: Amount) -> Result<Vault, VaultError> {
        self.guarded("remove_collateral", caller, || {
            self.require(caller, Capability::Investor)?;
            let vault = self.vault_for(caller)?;
            let custody = self.config.read().custody.clone();
            let ledger = self.services.read().ledger.clone();

            let updated = vault.withdraw(amount)?;
            tracing::debug!(owner = %caller, %amount, "returning collateral from custody");
            ledger.transfer(&custody, caller, amount)?;

            self.commit(&updated);
            tracing::info!(
                owner = %caller,
                vault_id = updated.id,
                %amount,
                collateral = %updated.collateral,
                "collateral removed"
            );
            self.emit(VaultEvent::CollateralRemoved {
                owner: caller.clone(),
                vault_id: updated.id,
                amount,
            });
            Ok(updated)
        })
    }

    /// Mints `amount` synthetic tokens to `caller`, locking the required
    /// collateral at the current price.
    ///
    /// # Errors
    ///
    /// `ReentrantCall`, `Unauthorized`, `VaultNotFound`, `OracleUnavailable`,
    /// `DivisionByZero`, `ArithmeticOverflow`, `InsufficientCollateral`,
    /// `TokenOperationFailed`.
    pub fn mint(&self, caller: &Address, amount: Amount) -> Result<Vault, VaultError> {
        self.guarded("mint", caller, || {
            self.require(caller, Capability::Investor)?;
            let vault = self.vault_for(caller)?;
            let config = self.config();
            let services = self.services.read().clone();

            let price = services.oracle.token_price(config.divisor)?;
            let required = pricing::required_collateral(price, amount, config.ratio)?;
            let updated = vault.lock_for_mint(required)?;
            tracing::debug!(owner = %caller, %amount, %price, %required, "minting synthetic tokens");
            services.token.mint(&config.custody, caller, amount)?;

            self.commit(&updated);
            tracing::info!(
                owner = %caller,
                vault_id = updated.id,
                %amount,
                %required,
                collateral = %updated.collateral,
                stake = %updated.stake,
                "tokens minted"
            );
            self.emit(VaultEvent::TokensMinted {
                owner: caller.clone(),
                vault_id: updated.id,
                amount,
                collateral_locked: required,
            });
            Ok(updated)
        })
    }

    /// Burns `amount` synthetic tokens from `caller`, releasing collateral
    /// at the current price.
    ///
    /// There is no local check against what this vault minted; the token
    /// refuses the burn if the caller does not hold `amount`.
    ///
    /// # Errors
    ///
    /// `ReentrantCall`, `Unauthorized`, `VaultNotFound`, `OracleUnavailable`,
    /// `DivisionByZero`, `ArithmeticOverflow`, `TokenOperationFailed`.
    pub fn burn(&self, caller: &Address, amount: Amount) -> Result<Vault, VaultError> {
        self.guarded("burn", caller, || {
            self.require(caller, Capability::Investor)?;
            let vault = self.vault_for(caller)?;
            let config = self.config();
            let services = self.services.read().clone();

            let price = services.oracle.token_price(config.divisor)?;
            let required = pricing::required_collateral(price, amount, config.ratio)?;
            let updated = vault.release_for_burn(required)?;
            tracing::debug!(owner = %caller, %amount, %price, %required, "burning synthetic tokens");
            services.token.burn(&config.custody, caller, amount)?;

            self.commit(&updated);
            tracing::info!(
                owner = %caller,
                vault_id = updated.id,
                %amount,
                %required,
                collateral = %updated.collateral,
                stake = %updated.stake,
                "tokens burned"
            );
            self.emit(VaultEvent::TokensBurned {
                owner: caller.clone(),
                vault_id: updated.id,
                amount,
                collateral_released: required,
            });
            Ok(updated)
        })
    }

    // -----------------------------------------------------------------------
    // Administrative operations
    // -----------------------------------------------------------------------

    /// Points the engine at a different synthetic token.
    pub fn set_synthetic_token(
        &self,
        caller: &Address,
        token: Arc<dyn SyntheticToken>,
    ) -> Result<(), VaultError> {
        self.admin("set_synthetic_token", caller, || {
            let address = token.address();
            self.services.write().token = token;
            self.config.write().synthetic_token = address.clone();
            Ok(VaultEvent::SyntheticTokenChanged {
                by: caller.clone(),
                address,
            })
        })
    }

    /// Points the engine at a different price feed.
    pub fn set_oracle(&self, caller: &Address, oracle: Arc<dyn PriceOracle>) -> Result<(), VaultError> {
        self.admin("set_oracle", caller, || {
            let address = oracle.address();
            self.services.write().oracle = PriceOracleClient::new(oracle);
            self.config.write().oracle = address.clone();
            Ok(VaultEvent::OracleChanged {
                by: caller.clone(),
                address,
            })
        })
    }

    /// Points the engine at a different stable asset ledger.
    ///
    /// Collateral already in custody on the previous ledger stays there;
    /// moving it is an operational task outside the engine.
    pub fn set_stablecoin(
        &self,
        caller: &Address,
        ledger: Arc<dyn CollateralLedger>,
    ) -> Result<(), VaultError> {
        self.admin("set_stablecoin", caller, || {
            let address = ledger.address();
            self.services.write().ledger = ledger;
            self.config.write().stablecoin = address.clone();
            Ok(VaultEvent::StablecoinChanged {
                by: caller.clone(),
                address,
            })
        })
    }

    /// Replaces the price divisor. Zero is accepted and makes every priced
    /// operation fail with `DivisionByZero` until corrected.
    pub fn set_divisor(&self, caller: &Address, divisor: Amount) -> Result<(), VaultError> {
        self.admin("set_divisor", caller, || {
            self.config.write().divisor = divisor;
            Ok(VaultEvent::DivisorChanged {
                by: caller.clone(),
                divisor,
            })
        })
    }

    /// Replaces the collateral ratio. Zero is accepted and makes minting free.
    pub fn set_ratio(&self, caller: &Address, ratio: Amount) -> Result<(), VaultError> {
        self.admin("set_ratio", caller, || {
            self.config.write().ratio = ratio;
            Ok(VaultEvent::RatioChanged {
                by: caller.clone(),
                ratio,
            })
        })
    }

    /// Grants the investor capability to `account`.
    pub fn grant_investor(&self, caller: &Address, account: &Address) -> Result<(), VaultError> {
        self.admin("grant_investor", caller, || {
            self.refuse_custody(account)?;
            self.access.grant_investor(caller, account)?;
            Ok(VaultEvent::InvestorGranted {
                by: caller.clone(),
                account: account.clone(),
            })
        })
    }

    /// Revokes the investor capability from `account`. Its vault, if any,
    /// stays as it is but can no longer be operated.
    pub fn revoke_investor(&self, caller: &Address, account: &Address) -> Result<(), VaultError> {
        self.admin("revoke_investor", caller, || {
            self.access.revoke_investor(caller, account)?;
            Ok(VaultEvent::InvestorRevoked {
                by: caller.clone(),
                account: account.clone(),
            })
        })
    }

    /// Grants the administrative capability to `account`.
    pub fn grant_admin(&self, caller: &Address, account: &Address) -> Result<(), VaultError> {
        self.admin("grant_admin", caller, || {
            self.refuse_custody(account)?;
            self.access.grant_admin(caller, account)?;
            Ok(VaultEvent::AdminGranted {
                by: caller.clone(),
                account: account.clone(),
            })
        })
    }

    /// Revokes the administrative capability from `account`.
    pub fn revoke_admin(&self, caller: &Address, account: &Address) -> Result<(), VaultError> {
        self.admin("revoke_admin", caller, || {
            self.access.revoke_admin(caller, account)?;
            Ok(VaultEvent::AdminRevoked {
                by: caller.clone(),
                account: account.clone(),
            })
        })
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// The vault with `id`, or the zero-valued vault if it was never created.
    pub fn get_vault(&self, id: VaultId) -> Vault {
        self.registry.lock().get(id)
    }

    /// The vault id of `owner`, or `NO_VAULT`.
    pub fn vault_id_of(&self, owner: &Address) -> VaultId {
        self.registry.lock().id_of(owner)
    }

    /// The vault owned by `owner`.
    pub fn vault_of(&self, owner: &Address) -> Option<Vault> {
        self.registry.lock().find_by_owner(owner).cloned()
    }

    /// Number of vaults ever created.
    pub fn vault_count(&self) -> usize {
        self.registry.lock().len()
    }

    /// All vaults in id order.
    pub fn vaults(&self) -> Vec<Vault> {
        self.registry.lock().iter().cloned().collect()
    }

    /// Snapshot of the current configuration.
    pub fn config(&self) -> EngineConfig {
        self.config.read().clone()
    }

    /// The current unit price of the synthetic token.
    pub fn token_price(&self) -> Result<Amount, VaultError> {
        let divisor = self.config.read().divisor;
        let oracle = self.services.read().oracle.clone();
        oracle.token_price(divisor)
    }

    /// The collateral minting `amount` would lock at the current price.
    pub fn required_collateral(&self, amount: Amount) -> Result<Amount, VaultError> {
        let ratio = self.config.read().ratio;
        pricing::required_collateral(self.token_price()?, amount, ratio)
    }

    /// Returns whether `account` may operate a vault.
    pub fn has_investor_role(&self, account: &Address) -> bool {
        self.access.has_investor_role(account)
    }

    /// Returns whether `account` may administer the engine.
    pub fn is_admin(&self, account: &Address) -> bool {
        self.access.is_admin(account)
    }

    /// The event journal.
    pub fn events(&self) -> &EventLog {
        &self.journal
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Runs `op` under the reentrancy guard and logs rejections.
    fn guarded<T>(
        &self,
        operation: &'static str,
        caller: &Address,
        op: impl FnOnce() -> Result<T, VaultError>,
    ) -> Result<T, VaultError> {
        let result = self.guard.enter().and_then(|_scope| op());
        if let Err(err) = &result {
            tracing::warn!(operation, %caller, code = err.code(), error = %err, "vault operation rejected");
        }
        result
    }

    /// Runs an administrative write and emits the event it returns.
    fn admin(
        &self,
        operation: &'static str,
        caller: &Address,
        op: impl FnOnce() -> Result<VaultEvent, VaultError>,
    ) -> Result<(), VaultError> {
        let result = self.require(caller, Capability::Admin).and_then(|()| op());
        match result {
            Ok(event) => {
                tracing::info!(operation, %caller, "engine configuration changed");
                self.emit(event);
                Ok(())
            }
            Err(err) => {
                tracing::warn!(operation, %caller, code = err.code(), error = %err, "admin operation rejected");
                Err(err)
            }
        }
    }

    fn require(&self, caller: &Address, capability: Capability) -> Result<(), VaultError> {
        // Custody never operates a vault, whatever the access policy says.
        let held = match capability {
            Capability::Investor => {
                *caller != self.config.read().custody && self.access.has_investor_role(caller)
            }
            Capability::Admin => self.access.is_admin(caller),
        };
        if held {
            Ok(())
        } else {
            Err(VaultError::Unauthorized {
                caller: caller.clone(),
                capability,
            })
        }
    }

    fn refuse_custody(&self, account: &Address) -> Result<(), VaultError> {
        if *account == self.config.read().custody {
            return Err(AccessError::CustodyAccount(account.clone()).into());
        }
        Ok(())
    }

    fn vault_for(&self, owner: &Address) -> Result<Vault, VaultError> {
        self.vault_of(owner)
            .ok_or_else(|| VaultError::VaultNotFound(owner.clone()))
    }

    fn commit(&self, vault: &Vault) {
        let committed = self.registry.lock().commit(vault.clone());
        // The guard guarantees nobody replaced the vault between load and commit.
        debug_assert!(committed, "vault {} vanished while guarded", vault.id);
    }

    fn emit(&self, event: VaultEvent) -> EventRecord {
        let record = self.journal.append(event);
        // Sinks run without the lock held; one may register another sink.
        let sinks = self.sinks.read().clone();
        for sink in &sinks {
            sink.publish(&record);
        }
        record
    }
}

impl std::fmt::Debug for VaultEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultEngine")
            .field("config", &*self.config.read())
            .field("vaults", &self.registry.lock().len())
            .field("events", &self.journal.len())
            .finish()
    }
}
