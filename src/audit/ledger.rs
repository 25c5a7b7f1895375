//! Audit Ledger
//!
//! Append-only, hash-chained sequence of compliance entries. A single
//! exclusive lock serializes appends so sequence numbers and chain links
//! follow append order; readers copy what they need under the shared lock
//! and do their work outside it.

use chrono::{DateTime, Utc};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info};

use crate::audit::entry::{AuditEntry, NewEvent};
use crate::audit::export::AppendObserver;
use crate::audit::hasher::hash_entry;
use crate::audit::verify::{verify_entries, IntegrityReport};
use crate::config::AuditConfig;
use crate::crypto::signatures::IntegritySigner;
use crate::error::ComplianceError;

#[derive(Debug, Default)]
pub(crate) struct LedgerState {
    pub(crate) entries: Vec<AuditEntry>,
    pub(crate) last_hash: String,
}

pub struct AuditLedger {
    config: Arc<AuditConfig>,
    signer: Arc<IntegritySigner>,
    pub(crate) state: RwLock<LedgerState>,
    observers: Vec<Arc<dyn AppendObserver>>,
}

impl AuditLedger {
    pub fn new(config: Arc<AuditConfig>, signer: Arc<IntegritySigner>) -> Self {
        info!(
            "Audit ledger initialized (signing mode: {:?}, system version: {})",
            signer.mode(),
            config.system_version
        );

        Self {
            config,
            signer,
            state: RwLock::new(LedgerState::default()),
            observers: Vec::new(),
        }
    }

    /// Register an observer notified of every appended entry.
    pub fn with_observer(mut self, observer: Arc<dyn AppendObserver>) -> Self {
        debug!("Registered append observer: {}", observer.name());
        self.observers.push(observer);
        self
    }

    fn read_state(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a new entry.
    ///
    /// Fails only when the entry cannot be hashed, in which case nothing is
    /// recorded. A signer without a usable key produces a weak signature and
    /// the entry is still appended.
    pub fn append(&self, event: NewEvent) -> Result<AuditEntry, ComplianceError> {
        let mut state = self.write_state();

        let sequence_number = state.entries.len() as u64 + 1;
        let now = Utc::now();
        let timestamp = match state.entries.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        let mut entry = AuditEntry::draft(sequence_number, timestamp, event, &self.config);
        entry.previous_hash = state.last_hash.clone();
        entry.entry_hash = hash_entry(&entry).map_err(|e| {
            error!(
                "Refusing to append {} event #{}: {}",
                entry.event_type, sequence_number, e
            );
            e
        })?;
        entry.signature = self
            .signer
            .sign(&entry.entry_hash, &entry.timestamp)
            .to_string();

        state.last_hash = entry.entry_hash.clone();
        state.entries.push(entry.clone());

        for observer in &self.observers {
            if let Err(e) = observer.on_append(&entry) {
                error!(
                    "Append observer {} failed on entry {}: {}",
                    observer.name(),
                    entry.entry_id,
                    e
                );
            }
        }

        debug!("Appended audit entry: {}", entry.summary());
        Ok(entry)
    }

    /// Entries with `start <= timestamp < end`, copied out of the ledger.
    pub fn snapshot(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<AuditEntry> {
        self.read_state()
            .entries
            .iter()
            .filter(|entry| entry.timestamp >= start && entry.timestamp < end)
            .cloned()
            .collect()
    }

    /// Copy of every entry in append order.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.read_state().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.read_state().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Hash of the most recent entry, empty for an empty ledger.
    pub fn head_hash(&self) -> String {
        self.read_state().last_hash.clone()
    }

    /// Verify every entry's hash, chain link and signature.
    pub fn verify_integrity(&self) -> IntegrityReport {
        let entries = self.entries();
        verify_entries(&entries, Some(&self.signer))
    }

    pub fn signer(&self) -> &IntegritySigner {
        &self.signer
    }
}
