//! Audit Ledger Verification
//!
//! Walks a sequence of entries and collects every integrity breach it finds.
//! Verification never stops at the first problem: a corrupted entry must not
//! hide later ones.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::audit::entry::AuditEntry;
use crate::audit::hasher::verify_entry_hash;
use crate::crypto::signatures::{EntrySignature, IntegritySigner};
use crate::error::ComplianceError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityBreach {
    HashMismatch {
        sequence_number: u64,
        entry_id: String,
    },
    ChainBreak {
        sequence_number: u64,
        entry_id: String,
        expected: String,
        found: String,
    },
    SequenceGap {
        entry_id: String,
        expected: u64,
        found: u64,
    },
    TimestampRegression {
        sequence_number: u64,
        entry_id: String,
    },
    InvalidSignature {
        sequence_number: u64,
        entry_id: String,
    },
    /// Weak pseudo-signature on a ledger checked against a public key
    SignatureDowngrade {
        sequence_number: u64,
        entry_id: String,
    },
}

impl IntegrityBreach {
    pub fn entry_id(&self) -> &str {
        match self {
            IntegrityBreach::HashMismatch { entry_id, .. }
            | IntegrityBreach::ChainBreak { entry_id, .. }
            | IntegrityBreach::SequenceGap { entry_id, .. }
            | IntegrityBreach::TimestampRegression { entry_id, .. }
            | IntegrityBreach::InvalidSignature { entry_id, .. }
            | IntegrityBreach::SignatureDowngrade { entry_id, .. } => entry_id,
        }
    }
}

impl fmt::Display for IntegrityBreach {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IntegrityBreach::HashMismatch {
                sequence_number,
                entry_id,
            } => write!(f, "Hash mismatch in entry {} (#{})", entry_id, sequence_number),
            IntegrityBreach::ChainBreak {
                sequence_number,
                entry_id,
                expected,
                found,
            } => write!(
                f,
                "Chain break at entry {} (#{}): expected previous hash {}, got {}",
                entry_id, sequence_number, expected, found
            ),
            IntegrityBreach::SequenceGap {
                entry_id,
                expected,
                found,
            } => write!(
                f,
                "Sequence gap at entry {}: expected #{}, got #{}",
                entry_id, expected, found
            ),
            IntegrityBreach::TimestampRegression {
                sequence_number,
                entry_id,
            } => write!(
                f,
                "Timestamp regression at entry {} (#{})",
                entry_id, sequence_number
            ),
            IntegrityBreach::InvalidSignature {
                sequence_number,
                entry_id,
            } => write!(
                f,
                "Invalid signature on entry {} (#{})",
                entry_id, sequence_number
            ),
            IntegrityBreach::SignatureDowngrade {
                sequence_number,
                entry_id,
            } => write!(
                f,
                "Weak signature on entry {} (#{}) where ECDSA was expected",
                entry_id, sequence_number
            ),
        }
    }
}

/// Outcome of an integrity verification run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub integrity_valid: bool,
    pub total_entries: u64,
    /// Entries whose hash (and signature, when checked) verified.
    pub verified_entries: u64,
    /// Entries carrying only a non-cryptographic pseudo-signature.
    pub weak_signatures: u64,
    pub signatures_checked: bool,
    pub breaches: Vec<IntegrityBreach>,
    pub last_verification_date: DateTime<Utc>,
}

impl IntegrityReport {
    pub fn breach_descriptions(&self) -> Vec<String> {
        self.breaches.iter().map(|b| b.to_string()).collect()
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        if self.integrity_valid {
            format!(
                "Audit ledger is valid ({}/{} entries verified, {} weak signatures)",
                self.verified_entries, self.total_entries, self.weak_signatures
            )
        } else {
            format!(
                "Audit ledger is invalid ({}/{} entries verified, {} breaches)",
                self.verified_entries,
                self.total_entries,
                self.breaches.len()
            )
        }
    }
}

/// Verify hashes, chain links, sequencing and timestamps of `entries`.
///
/// Signatures are checked only when a signer is supplied. A signer holding a
/// public key rejects weak pseudo-signatures as downgrades.
pub fn verify_entries(entries: &[AuditEntry], signer: Option<&IntegritySigner>) -> IntegrityReport {
    let mut breaches = Vec::new();
    let mut verified_entries = 0u64;
    let mut weak_signatures = 0u64;

    for (index, entry) in entries.iter().enumerate() {
        let expected_sequence = index as u64 + 1;
        let mut entry_ok = true;

        if entry.sequence_number != expected_sequence {
            breaches.push(IntegrityBreach::SequenceGap {
                entry_id: entry.entry_id.clone(),
                expected: expected_sequence,
                found: entry.sequence_number,
            });
        }

        if !verify_entry_hash(entry) {
            entry_ok = false;
            breaches.push(IntegrityBreach::HashMismatch {
                sequence_number: entry.sequence_number,
                entry_id: entry.entry_id.clone(),
            });
        }

        if let Some(previous) = index.checked_sub(1).map(|i| &entries[i]) {
            if entry.previous_hash != previous.entry_hash {
                breaches.push(IntegrityBreach::ChainBreak {
                    sequence_number: entry.sequence_number,
                    entry_id: entry.entry_id.clone(),
                    expected: previous.entry_hash.clone(),
                    found: entry.previous_hash.clone(),
                });
            }
            if entry.timestamp < previous.timestamp {
                breaches.push(IntegrityBreach::TimestampRegression {
                    sequence_number: entry.sequence_number,
                    entry_id: entry.entry_id.clone(),
                });
            }
        } else if !entry.previous_hash.is_empty() {
            breaches.push(IntegrityBreach::ChainBreak {
                sequence_number: entry.sequence_number,
                entry_id: entry.entry_id.clone(),
                expected: String::new(),
                found: entry.previous_hash.clone(),
            });
        }

        let is_weak = matches!(
            entry.signature.parse::<EntrySignature>(),
            Ok(EntrySignature::Weak(_))
        );
        if is_weak {
            weak_signatures += 1;
        }

        if let Some(signer) = signer {
            if is_weak && signer.public_key().is_some() {
                entry_ok = false;
                breaches.push(IntegrityBreach::SignatureDowngrade {
                    sequence_number: entry.sequence_number,
                    entry_id: entry.entry_id.clone(),
                });
            } else if !signer.verify_encoded(&entry.signature, &entry.entry_hash, &entry.timestamp) {
                entry_ok = false;
                breaches.push(IntegrityBreach::InvalidSignature {
                    sequence_number: entry.sequence_number,
                    entry_id: entry.entry_id.clone(),
                });
            }
        }

        if entry_ok {
            verified_entries += 1;
        }
    }

    let report = IntegrityReport {
        integrity_valid: breaches.is_empty(),
        total_entries: entries.len() as u64,
        verified_entries,
        weak_signatures,
        signatures_checked: signer.is_some(),
        breaches,
        last_verification_date: Utc::now(),
    };

    if report.integrity_valid {
        debug!("{}", report.summary());
    } else {
        warn!("{}", report.summary());
    }

    report
}

/// Sequence numbers of entries whose stored hash no longer matches
pub fn find_tampered_entries(entries: &[AuditEntry]) -> Vec<u64> {
    entries
        .iter()
        .filter(|entry| !verify_entry_hash(entry))
        .map(|entry| entry.sequence_number)
        .collect()
}

/// Information about a gap in the audit ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GapInfo {
    pub start_sequence: u64,
    pub end_sequence: u64,
    pub gap_type: GapType,
    pub description: String,
}

/// Type of gap detected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapType {
    TimeGap,
    HashGap,
}

/// Detect quiet periods longer than `max_quiet` and broken chain links
pub fn detect_gaps(entries: &[AuditEntry], max_quiet: Duration) -> Vec<GapInfo> {
    let mut gaps = Vec::new();

    for pair in entries.windows(2) {
        let (prev, curr) = (&pair[0], &pair[1]);

        let quiet = curr.timestamp - prev.timestamp;
        if quiet > max_quiet {
            gaps.push(GapInfo {
                start_sequence: prev.sequence_number,
                end_sequence: curr.sequence_number,
                gap_type: GapType::TimeGap,
                description: format!(
                    "Time gap of {} minutes between entries #{} and #{}",
                    quiet.num_minutes(),
                    prev.sequence_number,
                    curr.sequence_number
                ),
            });
        }

        if curr.previous_hash != prev.entry_hash {
            gaps.push(GapInfo {
                start_sequence: prev.sequence_number,
                end_sequence: curr.sequence_number,
                gap_type: GapType::HashGap,
                description: format!(
                    "Hash chain gap between entries #{} and #{}",
                    prev.sequence_number, curr.sequence_number
                ),
            });
        }
    }

    gaps
}

/// Load exported entries from a JSONL file
pub fn load_entries_from_jsonl(path: &Path) -> Result<Vec<AuditEntry>, ComplianceError> {
    let file = File::open(path)
        .map_err(|e| ComplianceError::ExportError(format!("Failed to open {:?}: {}", path, e)))?;

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| {
            ComplianceError::ExportError(format!("Failed to read line {}: {}", line_num + 1, e))
        })?;

        if line.trim().is_empty() {
            continue;
        }

        let entry: AuditEntry = serde_json::from_str(&line).map_err(|e| {
            ComplianceError::ExportError(format!(
                "Failed to parse entry at line {}: {}",
                line_num + 1,
                e
            ))
        })?;

        entries.push(entry);
    }

    debug!("Loaded {} entries from {:?}", entries.len(), path);
    Ok(entries)
}

/// Verify an exported JSONL ledger
pub fn verify_jsonl_file(
    path: &Path,
    signer: Option<&IntegritySigner>,
) -> Result<IntegrityReport, ComplianceError> {
    info!("Verifying exported audit ledger: {:?}", path);

    if !path.exists() {
        return Err(ComplianceError::ExportError(format!(
            "Audit ledger file does not exist: {:?}",
            path
        )));
    }

    let entries = load_entries_from_jsonl(path)?;
    Ok(verify_entries(&entries, signer))
}
