//! Entry hashing
//!
//! An entry's hash covers exactly its id, timestamp, event type, action and
//! action details. The fields are encoded as a JSON array headed by a format
//! version, with every object's keys sorted, so the digest can be recomputed
//! from the entry alone at any later time.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::audit::entry::{AuditEntry, EventDetails};
use crate::error::ComplianceError;

pub const HASH_FORMAT_VERSION: &str = "audit-entry-v1";

pub fn canonical_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Create the canonical byte encoding for hashing
pub fn canonical_bytes(
    entry_id: &str,
    timestamp: &DateTime<Utc>,
    event_type: &str,
    action: &str,
    details: &EventDetails,
) -> Result<Vec<u8>, ComplianceError> {
    let details = serde_json::to_value(details)
        .map_err(|e| ComplianceError::HashError(format!("action details: {}", e)))?;

    let canonical = Value::Array(vec![
        Value::String(HASH_FORMAT_VERSION.to_string()),
        Value::String(entry_id.to_string()),
        Value::String(canonical_timestamp(timestamp)),
        Value::String(event_type.to_string()),
        Value::String(action.to_string()),
        sort_keys(details),
    ]);

    serde_json::to_vec(&canonical).map_err(|e| ComplianceError::HashError(e.to_string()))
}

/// Calculate the SHA-256 hash (lowercase hex) of an entry's canonical fields
pub fn hash_entry(entry: &AuditEntry) -> Result<String, ComplianceError> {
    let bytes = canonical_bytes(
        &entry.entry_id,
        &entry.timestamp,
        &entry.event_type,
        &entry.action,
        &entry.action_details,
    )?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Verify an entry's stored hash against a fresh recomputation
pub fn verify_entry_hash(entry: &AuditEntry) -> bool {
    match hash_entry(entry) {
        Ok(hash) => !entry.entry_hash.is_empty() && hash == entry.entry_hash,
        Err(_) => false,
    }
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut pairs: Vec<(String, Value)> = map.into_iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in pairs {
                sorted.insert(key, sort_keys(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::NewEvent;
    use crate::config::AuditConfig;
    use serde_json::json;

    fn entry(details: EventDetails) -> AuditEntry {
        AuditEntry::draft(
            1,
            Utc::now(),
            NewEvent::new("user_report", "user-1", "cid-1", "flagged", details),
            &AuditConfig::default(),
        )
    }

    #[test]
    fn test_hash_is_deterministic() {
        let entry = entry(EventDetails::generic([("reason", json!("spam"))]));
        let hash1 = hash_entry(&entry).unwrap();
        let hash2 = hash_entry(&entry).unwrap();
        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_hash_ignores_unhashed_fields() {
        let mut entry = entry(EventDetails::default());
        let before = hash_entry(&entry).unwrap();

        entry.result = "failed".to_string();
        entry.sequence_number = 99;
        entry.previous_hash = "abc".to_string();
        entry.processing_time_ms = Some(5);
        assert_eq!(hash_entry(&entry).unwrap(), before);
    }

    #[test]
    fn test_hash_covers_hashed_fields() {
        let base = entry(EventDetails::generic([("reason", json!("spam"))]));
        let hash = hash_entry(&base).unwrap();

        let mut changed = base.clone();
        changed.action = "cleared".to_string();
        assert_ne!(hash_entry(&changed).unwrap(), hash);

        let mut changed = base.clone();
        changed.action_details = EventDetails::generic([("reason", json!("abuse"))]);
        assert_ne!(hash_entry(&changed).unwrap(), hash);

        let mut changed = base.clone();
        changed.timestamp = base.timestamp + chrono::Duration::nanoseconds(1);
        assert_ne!(hash_entry(&changed).unwrap(), hash);
    }

    #[test]
    fn test_nested_key_order_does_not_matter() {
        let a = entry(EventDetails::generic([(
            "meta",
            json!({"z": 1, "a": {"y": true, "b": false}}),
        )]));
        let mut b = a.clone();
        let mut nested = Map::new();
        let mut inner = Map::new();
        inner.insert("b".to_string(), json!(false));
        inner.insert("y".to_string(), json!(true));
        nested.insert("a".to_string(), Value::Object(inner));
        nested.insert("z".to_string(), json!(1));
        b.action_details = EventDetails::generic([("meta", Value::Object(nested))]);

        assert_eq!(hash_entry(&a).unwrap(), hash_entry(&b).unwrap());
    }

    #[test]
    fn test_verify_entry_hash() {
        let mut entry = entry(EventDetails::default());
        assert!(!verify_entry_hash(&entry));

        entry.entry_hash = hash_entry(&entry).unwrap();
        assert!(verify_entry_hash(&entry));

        entry.action = "tampered".to_string();
        assert!(!verify_entry_hash(&entry));
    }
}
