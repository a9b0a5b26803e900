//! Integration tests for the administrative surface: parameter updates,
//! collaborator swaps, and capability management.

use std::sync::Arc;

use synthex_contracts::{AccessError, AccessRegistry, Capability, VaultEngine, VaultError};
use synthex_protocol::{
    Address, Amount, CollateralLedger, IndexToken, ManualPriceOracle, StableLedger,
    SyntheticToken, VaultEvent,
};

const ADMIN: &str = "admin";
const ENGINE: &str = "engine";

fn amt(v: u64) -> Amount {
    Amount::from(v)
}

fn admin() -> Address {
    Address::new(ADMIN)
}

fn engine_with(
    ledger: Arc<StableLedger>,
    token: Arc<IndexToken>,
    oracle: Arc<ManualPriceOracle>,
) -> VaultEngine {
    token.add_minter(&ENGINE.into());
    VaultEngine::new(
        ENGINE.into(),
        Arc::new(AccessRegistry::new(admin())),
        ledger,
        token,
        oracle,
    )
}

fn default_engine() -> VaultEngine {
    engine_with(
        Arc::new(StableLedger::new("usd")),
        Arc::new(IndexToken::new("idx", "sIDX")),
        Arc::new(ManualPriceOracle::new("feed", 10u64)),
    )
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

#[test]
fn non_admin_cannot_change_parameters() {
    let engine = default_engine();
    let mallory = Address::new("mallory");
    let before = engine.config();

    for result in [
        engine.set_ratio(&mallory, amt(1)),
        engine.set_divisor(&mallory, amt(1)),
        engine.grant_investor(&mallory, &mallory),
        engine.grant_admin(&mallory, &mallory),
        engine.set_oracle(&mallory, Arc::new(ManualPriceOracle::new("evil", 1u64))),
    ] {
        assert!(matches!(
            result,
            Err(VaultError::Unauthorized {
                capability: Capability::Admin,
                ..
            })
        ));
    }
    assert_eq!(engine.config(), before);
    assert!(!engine.has_investor_role(&mallory));
    assert!(engine.events().is_empty());
}

#[test]
fn investors_are_not_admins() {
    let engine = default_engine();
    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    assert!(engine.set_ratio(&alice, amt(10)).is_err());
    assert!(!engine.is_admin(&alice));
}

#[test]
fn parameter_updates_replace_unconditionally() {
    let engine = default_engine();
    engine.set_ratio(&admin(), amt(0)).unwrap();
    engine.set_divisor(&admin(), amt(0)).unwrap();
    assert!(engine.config().ratio.is_zero());
    assert!(engine.config().divisor.is_zero());

    engine.set_ratio(&admin(), amt(175)).unwrap();
    engine.set_divisor(&admin(), amt(100)).unwrap();
    assert_eq!(engine.config().ratio, amt(175));
    assert_eq!(engine.config().divisor, amt(100));

    let last = engine.events().last().unwrap();
    assert_eq!(
        last.event,
        VaultEvent::DivisorChanged {
            by: admin(),
            divisor: amt(100)
        }
    );
    assert_eq!(engine.events().len(), 4);
}

#[test]
fn zero_ratio_makes_minting_free() {
    let ledger = Arc::new(StableLedger::new("usd"));
    let engine = default_engine_sharing(ledger.clone());
    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    engine.create_vault(&alice).unwrap();

    engine.set_ratio(&admin(), amt(0)).unwrap();
    let vault = engine.mint(&alice, amt(1_000)).unwrap();
    assert!(vault.collateral.is_zero());
    assert!(vault.stake.is_zero());
}

fn default_engine_sharing(ledger: Arc<StableLedger>) -> VaultEngine {
    engine_with(
        ledger,
        Arc::new(IndexToken::new("idx", "sIDX")),
        Arc::new(ManualPriceOracle::new("feed", 10u64)),
    )
}

// ---------------------------------------------------------------------------
// Collaborator swaps
// ---------------------------------------------------------------------------

#[test]
fn swapping_the_oracle_changes_the_price_source() {
    let engine = default_engine();
    assert_eq!(engine.token_price().unwrap(), amt(10));

    let replacement = Arc::new(ManualPriceOracle::new("feed-v2", 42u64));
    engine.set_oracle(&admin(), replacement.clone()).unwrap();
    assert_eq!(engine.token_price().unwrap(), amt(42));
    assert_eq!(engine.config().oracle, Address::new("feed-v2"));

    replacement.set_price(50u64);
    assert_eq!(engine.token_price().unwrap(), amt(50));
    assert_eq!(
        engine.events().last().unwrap().event,
        VaultEvent::OracleChanged {
            by: admin(),
            address: "feed-v2".into()
        }
    );
}

#[test]
fn swapping_the_token_redirects_mints() {
    let old = Arc::new(IndexToken::new("idx", "sIDX"));
    let ledger = Arc::new(StableLedger::new("usd"));
    let engine = engine_with(
        ledger.clone(),
        old.clone(),
        Arc::new(ManualPriceOracle::new("feed", 10u64)),
    );
    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    ledger.issue(&alice, amt(1_000)).unwrap();
    ledger.approve(&alice, &ENGINE.into(), amt(1_000));
    engine.create_vault(&alice).unwrap();
    engine.add_collateral(&alice, amt(1_000)).unwrap();

    let new = Arc::new(IndexToken::new("idx-v2", "sIDX2"));
    new.add_minter(&ENGINE.into());
    engine.set_synthetic_token(&admin(), new.clone()).unwrap();
    engine.mint(&alice, amt(2)).unwrap();

    assert!(old.total_supply().is_zero());
    assert_eq!(new.balance_of(&alice), amt(2));
    assert_eq!(engine.config().synthetic_token, Address::new("idx-v2"));
}

#[test]
fn token_without_minter_rights_fails_the_mint() {
    let engine = default_engine();
    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    engine.create_vault(&alice).unwrap();
    engine.set_ratio(&admin(), amt(0)).unwrap();

    let unauthorized = Arc::new(IndexToken::new("idx-v3", "sIDX3"));
    engine.set_synthetic_token(&admin(), unauthorized).unwrap();
    let before = engine.get_vault(1);
    assert!(matches!(
        engine.mint(&alice, amt(1)),
        Err(VaultError::TokenOperationFailed(_))
    ));
    assert_eq!(engine.get_vault(1), before);
}

#[test]
fn swapping_the_stablecoin_moves_new_deposits() {
    let old = Arc::new(StableLedger::new("usd"));
    let engine = default_engine_sharing(old.clone());
    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    engine.create_vault(&alice).unwrap();

    let new = Arc::new(StableLedger::new("usd-v2"));
    new.issue(&alice, amt(300)).unwrap();
    new.approve(&alice, &ENGINE.into(), amt(300));
    engine.set_stablecoin(&admin(), new.clone()).unwrap();

    engine.add_collateral(&alice, amt(300)).unwrap();
    assert_eq!(new.balance_of(&ENGINE.into()), amt(300));
    assert!(old.balance_of(&ENGINE.into()).is_zero());
    assert_eq!(engine.config().stablecoin, Address::new("usd-v2"));
}

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

#[test]
fn grant_and_revoke_investor_gate_vault_creation() {
    let engine = default_engine();
    let alice = Address::new("alice");

    engine.grant_investor(&admin(), &alice).unwrap();
    engine.revoke_investor(&admin(), &alice).unwrap();
    assert!(matches!(
        engine.create_vault(&alice),
        Err(VaultError::Unauthorized { .. })
    ));

    engine.grant_investor(&admin(), &alice).unwrap();
    assert_eq!(engine.create_vault(&alice).unwrap().id, 1);

    let kinds: Vec<&str> = engine
        .events()
        .all()
        .iter()
        .map(|r| r.event.kind())
        .collect();
    assert_eq!(
        kinds,
        ["investor_granted", "investor_revoked", "investor_granted", "vault_created"]
    );
}

#[test]
fn custody_account_cannot_be_granted_capabilities() {
    let ledger = Arc::new(StableLedger::new("usd"));
    let engine = default_engine_sharing(ledger.clone());
    let custody = Address::new(ENGINE);

    for result in [
        engine.grant_investor(&admin(), &custody),
        engine.grant_admin(&admin(), &custody),
    ] {
        assert!(matches!(
            result,
            Err(VaultError::AccessChange(AccessError::CustodyAccount(_)))
        ));
    }
    assert!(!engine.has_investor_role(&custody));
    assert!(!engine.is_admin(&custody));
    assert!(engine.events().is_empty());
}

#[test]
fn custody_cannot_credit_itself_collateral() {
    use synthex_contracts::AccessControl;

    // A registry shared with the engine can be edited behind its back.
    let registry = Arc::new(AccessRegistry::new(admin()));
    let ledger = Arc::new(StableLedger::new("usd"));
    let token = Arc::new(IndexToken::new("idx", "sIDX"));
    token.add_minter(&ENGINE.into());
    let engine = VaultEngine::new(
        ENGINE.into(),
        registry.clone(),
        ledger.clone(),
        token.clone(),
        Arc::new(ManualPriceOracle::new("feed", 10u64)),
    );

    let alice = Address::new("alice");
    engine.grant_investor(&admin(), &alice).unwrap();
    ledger.issue(&alice, amt(1_000)).unwrap();
    ledger.approve(&alice, &ENGINE.into(), amt(1_000));
    engine.create_vault(&alice).unwrap();
    engine.add_collateral(&alice, amt(1_000)).unwrap();

    let custody = Address::new(ENGINE);
    registry.grant_investor(&admin(), &custody).unwrap();
    for result in [
        engine.create_vault(&custody),
        engine.add_collateral(&custody, amt(1_000)),
        engine.mint(&custody, amt(60)),
    ] {
        assert!(matches!(
            result,
            Err(VaultError::Unauthorized {
                capability: Capability::Investor,
                ..
            })
        ));
    }

    let backed: Amount = engine
        .vaults()
        .iter()
        .fold(Amount::zero(), |sum, v| sum + v.collateral + v.stake);
    assert_eq!(backed, ledger.balance_of(&custody));
    assert_eq!(engine.vault_count(), 1);
    assert!(token.total_supply().is_zero());
}

#[test]
fn sink_may_register_another_sink_while_publishing() {
    use std::sync::{Mutex, Weak};
    use synthex_protocol::{EventRecord, EventSink};

    struct Counter(Mutex<usize>);

    impl EventSink for Counter {
        fn publish(&self, _: &EventRecord) {
            *self.0.lock().unwrap() += 1;
        }
    }

    /// Attaches `late` to the engine on the first event it sees.
    struct Recruiter {
        engine: Mutex<Weak<VaultEngine>>,
        late: Arc<Counter>,
    }

    impl EventSink for Recruiter {
        fn publish(&self, _: &EventRecord) {
            let engine = std::mem::take(&mut *self.engine.lock().unwrap());
            if let Some(engine) = engine.upgrade() {
                engine.add_sink(self.late.clone());
            }
        }
    }

    let engine = Arc::new(default_engine());
    let late = Arc::new(Counter(Mutex::new(0)));
    engine.add_sink(Arc::new(Recruiter {
        engine: Mutex::new(Arc::downgrade(&engine)),
        late: late.clone(),
    }));

    engine.set_ratio(&admin(), amt(200)).unwrap();
    assert_eq!(*late.0.lock().unwrap(), 0);
    engine.set_ratio(&admin(), amt(150)).unwrap();
    assert_eq!(*late.0.lock().unwrap(), 1);
}

#[test]
fn admin_capability_can_be_handed_over() {
    let engine = default_engine();
    let ops = Address::new("ops");

    engine.grant_admin(&admin(), &ops).unwrap();
    engine.revoke_admin(&ops, &admin()).unwrap();
    assert!(engine.is_admin(&ops));
    assert!(!engine.is_admin(&admin()));
    assert!(engine.set_ratio(&admin(), amt(1)).is_err());

    let err = engine.revoke_admin(&ops, &ops).unwrap_err();
    assert!(matches!(err, VaultError::AccessChange(_)));
    assert!(engine.is_admin(&ops));
}

#[test]
fn custom_access_policy_can_be_substituted() {
    use synthex_contracts::AccessControl;

    /// Everyone invests, nobody administers.
    struct OpenDoor;

    impl AccessControl for OpenDoor {
        fn is_admin(&self, _: &Address) -> bool {
            false
        }
        fn has_investor_role(&self, _: &Address) -> bool {
            true
        }
        fn grant_investor(&self, caller: &Address, _: &Address) -> Result<(), AccessError> {
            Err(AccessError::NotAdmin(caller.clone()))
        }
        fn revoke_investor(&self, caller: &Address, _: &Address) -> Result<(), AccessError> {
            Err(AccessError::NotAdmin(caller.clone()))
        }
        fn grant_admin(&self, caller: &Address, _: &Address) -> Result<(), AccessError> {
            Err(AccessError::NotAdmin(caller.clone()))
        }
        fn revoke_admin(&self, caller: &Address, _: &Address) -> Result<(), AccessError> {
            Err(AccessError::NotAdmin(caller.clone()))
        }
    }

    let engine = VaultEngine::new(
        ENGINE.into(),
        Arc::new(OpenDoor),
        Arc::new(StableLedger::new("usd")),
        Arc::new(IndexToken::new("idx", "sIDX")),
        Arc::new(ManualPriceOracle::new("feed", 1u64)),
    );
    assert_eq!(engine.create_vault(&"anyone".into()).unwrap().id, 1);
    assert!(engine.set_ratio(&"anyone".into(), amt(1)).is_err());
    assert!(matches!(
        engine.create_vault(&ENGINE.into()),
        Err(VaultError::Unauthorized { .. })
    ));
}
