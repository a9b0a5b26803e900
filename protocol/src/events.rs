//! # Domain Events
//!
//! Every successful mutating call on the engine emits exactly one
//! [`VaultEvent`]. Events are wrapped in an [`EventRecord`] carrying a
//! sequence number and timestamp, appended to the engine's [`EventLog`], and
//! fanned out to any extra [`EventSink`]s (the node hangs its metrics and
//! live broadcast off these).

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{decimal, Address, Amount, VaultId};

/// Something that happened to a vault or to the engine configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VaultEvent {
    VaultCreated {
        owner: Address,
        vault_id: VaultId,
    },
    CollateralAdded {
        owner: Address,
        vault_id: VaultId,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    CollateralRemoved {
        owner: Address,
        vault_id: VaultId,
        #[serde(with = "decimal")]
        amount: Amount,
    },
    TokensMinted {
        owner: Address,
        vault_id: VaultId,
        #[serde(with = "decimal")]
        amount: Amount,
        /// Collateral moved into stake by this mint.
        #[serde(with = "decimal")]
        collateral_locked: Amount,
    },
    TokensBurned {
        owner: Address,
        vault_id: VaultId,
        #[serde(with = "decimal")]
        amount: Amount,
        /// Collateral moved back out of stake by this burn.
        #[serde(with = "decimal")]
        collateral_released: Amount,
    },
    SyntheticTokenChanged {
        by: Address,
        address: Address,
    },
    OracleChanged {
        by: Address,
        address: Address,
    },
    StablecoinChanged {
        by: Address,
        address: Address,
    },
    DivisorChanged {
        by: Address,
        #[serde(with = "decimal")]
        divisor: Amount,
    },
    RatioChanged {
        by: Address,
        #[serde(with = "decimal")]
        ratio: Amount,
    },
    InvestorGranted {
        by: Address,
        account: Address,
    },
    InvestorRevoked {
        by: Address,
        account: Address,
    },
    AdminGranted {
        by: Address,
        account: Address,
    },
    AdminRevoked {
        by: Address,
        account: Address,
    },
}

impl VaultEvent {
    /// Short machine-readable name, matching the serialized `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            VaultEvent::VaultCreated { .. } => "vault_created",
            VaultEvent::CollateralAdded { .. } => "collateral_added",
            VaultEvent::CollateralRemoved { .. } => "collateral_removed",
            VaultEvent::TokensMinted { .. } => "tokens_minted",
            VaultEvent::TokensBurned { .. } => "tokens_burned",
            VaultEvent::SyntheticTokenChanged { .. } => "synthetic_token_changed",
            VaultEvent::OracleChanged { .. } => "oracle_changed",
            VaultEvent::StablecoinChanged { .. } => "stablecoin_changed",
            VaultEvent::DivisorChanged { .. } => "divisor_changed",
            VaultEvent::RatioChanged { .. } => "ratio_changed",
            VaultEvent::InvestorGranted { .. } => "investor_granted",
            VaultEvent::InvestorRevoked { .. } => "investor_revoked",
            VaultEvent::AdminGranted { .. } => "admin_granted",
            VaultEvent::AdminRevoked { .. } => "admin_revoked",
        }
    }

    /// The vault this event concerns, if any.
    pub fn vault_id(&self) -> Option<VaultId> {
        match self {
            VaultEvent::VaultCreated { vault_id, .. }
            | VaultEvent::CollateralAdded { vault_id, .. }
            | VaultEvent::CollateralRemoved { vault_id, .. }
            | VaultEvent::TokensMinted { vault_id, .. }
            | VaultEvent::TokensBurned { vault_id, .. } => Some(*vault_id),
            _ => None,
        }
    }
}

/// A journaled event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the journal, starting at 1.
    pub sequence: u64,
    /// Globally unique id for downstream deduplication.
    pub id: Uuid,
    /// Wall-clock time of emission.
    pub emitted_at: DateTime<Utc>,
    /// The event itself.
    #[serde(flatten)]
    pub event: VaultEvent,
}

/// A consumer of emitted events.
///
/// Sinks are called synchronously after the engine has committed the
/// operation, so they must not block for long and must not call back into
/// the engine's mutating operations.
pub trait EventSink: Send + Sync {
    fn publish(&self, record: &EventRecord);
}

/// Append-only in-memory event journal.
///
/// Records are kept for the life of the process and the journal grows
/// without bound. Readers should page through it with [`EventLog::page`].
#[derive(Debug, Default)]
pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
}

impl EventLog {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps `event` in a record with the next sequence number, appends it
    /// and returns the record.
    pub fn append(&self, event: VaultEvent) -> EventRecord {
        let mut records = self.records.write();
        let record = EventRecord {
            sequence: records.len() as u64 + 1,
            id: Uuid::new_v4(),
            emitted_at: Utc::now(),
            event,
        };
        records.push(record.clone());
        record
    }

    /// All records with a sequence number greater than `after`.
    pub fn since(&self, after: u64) -> Vec<EventRecord> {
        let records = self.records.read();
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(records.len());
        records[start..].to_vec()
    }

    /// At most `limit` records with a sequence number greater than `after`,
    /// oldest first.
    pub fn page(&self, after: u64, limit: usize) -> Vec<EventRecord> {
        let records = self.records.read();
        let start = usize::try_from(after).unwrap_or(usize::MAX).min(records.len());
        let end = start.saturating_add(limit).min(records.len());
        records[start..end].to_vec()
    }

    /// Every record, oldest first.
    pub fn all(&self) -> Vec<EventRecord> {
        self.since(0)
    }

    /// The most recent record.
    pub fn last(&self) -> Option<EventRecord> {
        self.records.read().last().cloned()
    }

    /// Number of journaled records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Returns `true` if nothing has been journaled yet.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
