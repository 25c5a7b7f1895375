//! Compliance Audit Ledger
//!
//! Tamper-evident record of compliance events: each entry is hashed over
//! its canonical fields, chained to its predecessor and signed.

pub mod entry;
pub mod export;
pub mod hasher;
pub mod ledger;
pub mod verify;

pub use entry::{AuditEntry, EventCategory, EventDetails, NewEvent, Severity, TargetType};
pub use export::{AppendObserver, JsonlExporter};
pub use hasher::hash_entry;
pub use ledger::AuditLedger;
pub use verify::{
    detect_gaps, find_tampered_entries, load_entries_from_jsonl, verify_entries,
    verify_jsonl_file, IntegrityBreach, IntegrityReport,
};
