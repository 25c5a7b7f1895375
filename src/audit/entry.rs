//! Audit Entry
//!
//! Defines the immutable compliance audit entry, its typed event payloads
//! and the fixed classification rules applied at append time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::config::AuditConfig;

pub const DEFAULT_RESULT: &str = "success";

pub const APPLICABLE_LAWS: [&str; 3] = ["DMCA 17 USC 512", "CFAA", "Privacy Act"];

/// Coarse classification derived from the event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Dmca,
    User,
    System,
    Legal,
}

impl EventCategory {
    pub fn classify(event_type: &str) -> Self {
        if event_type.contains("dmca") {
            EventCategory::Dmca
        } else if event_type.contains("user") {
            EventCategory::User
        } else if event_type.contains("system") {
            EventCategory::System
        } else {
            EventCategory::Legal
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Dmca => "dmca",
            EventCategory::User => "user",
            EventCategory::System => "system",
            EventCategory::Legal => "legal",
        }
    }
}

/// Operational/legal weight of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Legal,
}

impl Severity {
    pub fn classify(event_type: &str) -> Self {
        match event_type {
            "dmca_takedown" | "dmca_reinstatement" => Severity::Legal,
            "system_error" | "integrity_breach" => Severity::Critical,
            "processing_delay" => Severity::Warning,
            _ => Severity::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
            Severity::Legal => "legal",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetType {
    Descriptor,
    Notice,
    User,
}

impl TargetType {
    pub fn classify(target_id: &str) -> Self {
        if target_id.starts_with("DMCA-") {
            TargetType::Notice
        } else if target_id.starts_with("user-") {
            TargetType::User
        } else {
            TargetType::Descriptor
        }
    }
}

/// Event-specific facts recorded with an entry.
///
/// The DMCA workflow events have fixed shapes; anything else goes in the
/// generic bag, whose keys are kept sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventDetails {
    Takedown {
        takedown_id: String,
        requestor_email: String,
        copyright_work: String,
        legal_framework: String,
    },
    CounterNotice {
        counter_notice_id: String,
        reinstatement_date: DateTime<Utc>,
        legal_framework: String,
        waiting_period_days: u32,
    },
    Reinstatement {
        reason: String,
        legal_framework: String,
        reinstatement_type: String,
    },
    Generic {
        #[serde(default)]
        fields: BTreeMap<String, serde_json::Value>,
    },
}

impl Default for EventDetails {
    fn default() -> Self {
        EventDetails::Generic {
            fields: BTreeMap::new(),
        }
    }
}

impl EventDetails {
    pub fn generic<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, serde_json::Value)>,
    {
        EventDetails::Generic {
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn requestor_email(&self) -> Option<&str> {
        match self {
            EventDetails::Takedown {
                requestor_email, ..
            } if !requestor_email.is_empty() => Some(requestor_email),
            _ => None,
        }
    }
}

/// Legal framework context attached to every entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalContext {
    pub jurisdiction: String,
    pub applicable_laws: Vec<String>,
    pub legal_basis: String,
    pub compliance_reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_hold_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_number: Option<String>,
}

/// Retention requirements for an entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionInfo {
    pub retention_days: u32,
    pub retention_reason: String,
    /// None while the entry is under legal hold.
    pub destruction_date: Option<DateTime<Utc>>,
    pub legal_hold: bool,
    pub compliance_class: String,
}

/// A compliance event as submitted by a caller, before the ledger
/// assigns sequence, time, hashes and signature.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub event_type: String,
    pub actor_id: String,
    pub target_id: String,
    pub action: String,
    pub details: EventDetails,
    pub result: Option<String>,
    pub processing_time: Option<Duration>,
}

impl NewEvent {
    pub fn new(
        event_type: impl Into<String>,
        actor_id: impl Into<String>,
        target_id: impl Into<String>,
        action: impl Into<String>,
        details: EventDetails,
    ) -> Self {
        Self {
            event_type: event_type.into(),
            actor_id: actor_id.into(),
            target_id: target_id.into(),
            action: action.into(),
            details,
            result: None,
            processing_time: None,
        }
    }

    pub fn with_result(mut self, result: impl Into<String>) -> Self {
        self.result = Some(result.into());
        self
    }

    pub fn with_processing_time(mut self, processing_time: Duration) -> Self {
        self.processing_time = Some(processing_time);
        self
    }
}

/// Unix seconds of 0001-01-01T00:00:00Z, the timestamp of an unset entry.
const ZERO_TIME_UNIX_SECS: i64 = -62_135_596_800;

/// Tamper-evident compliance audit entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub entry_id: String,
    pub timestamp: DateTime<Utc>,
    pub sequence_number: u64,

    pub event_type: String,
    pub event_category: EventCategory,
    pub severity: Severity,

    pub actor_id: String,
    pub target_id: String,
    pub target_type: TargetType,

    pub action: String,
    pub action_details: EventDetails,
    pub result: String,

    pub legal_context: Option<LegalContext>,
    pub compliance_notes: String,
    pub data_retention: Option<RetentionInfo>,

    pub previous_hash: String,
    pub entry_hash: String,
    pub signature: String,

    pub system_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl AuditEntry {
    /// Build an unsealed entry: classification, legal context and retention
    /// are filled in, chain fields are left empty for the ledger.
    pub(crate) fn draft(
        sequence_number: u64,
        timestamp: DateTime<Utc>,
        event: NewEvent,
        config: &AuditConfig,
    ) -> Self {
        let NewEvent {
            event_type,
            actor_id,
            target_id,
            action,
            details,
            result,
            processing_time,
        } = event;

        let legal_context = LegalContext {
            jurisdiction: config.jurisdiction.clone(),
            applicable_laws: APPLICABLE_LAWS.iter().map(|law| law.to_string()).collect(),
            legal_basis: legal_basis_for(&event_type).to_string(),
            compliance_reason: "DMCA safe harbor compliance".to_string(),
            legal_hold_status: config.legal_hold_enabled.then(|| "held".to_string()),
            case_number: None,
        };

        let data_retention = RetentionInfo {
            retention_days: config.retention_days,
            retention_reason: "Legal compliance and audit requirements".to_string(),
            destruction_date: if config.legal_hold_enabled {
                None
            } else {
                timestamp.checked_add_signed(config.retention_period())
            },
            legal_hold: config.legal_hold_enabled,
            compliance_class: "dmca".to_string(),
        };

        Self {
            entry_id: generate_entry_id(),
            timestamp,
            sequence_number,
            event_category: EventCategory::classify(&event_type),
            severity: Severity::classify(&event_type),
            target_type: TargetType::classify(&target_id),
            compliance_notes: compliance_notes(&event_type, &action),
            tags: tags_for(&event_type, &action),
            event_type,
            actor_id,
            target_id,
            action,
            action_details: details,
            result: result.unwrap_or_else(|| DEFAULT_RESULT.to_string()),
            legal_context: Some(legal_context),
            data_retention: Some(data_retention),
            previous_hash: String::new(),
            entry_hash: String::new(),
            signature: String::new(),
            system_version: config.system_version.clone(),
            processing_time_ms: processing_time
                .and_then(|d| u64::try_from(d.num_milliseconds()).ok()),
        }
    }

    pub fn processing_time(&self) -> Option<Duration> {
        self.processing_time_ms
            .and_then(|ms| i64::try_from(ms).ok())
            .map(Duration::milliseconds)
    }

    pub fn is_dmca(&self) -> bool {
        self.event_type.contains("dmca")
    }

    /// DMCA and legal events must carry a legal basis.
    pub fn requires_legal_basis(&self) -> bool {
        self.event_type.contains("dmca") || self.event_type.contains("legal")
    }

    pub fn has_legal_basis(&self) -> bool {
        self.legal_context
            .as_ref()
            .map(|ctx| !ctx.legal_basis.is_empty())
            .unwrap_or(false)
    }

    /// False for the zero time (0001-01-01T00:00:00Z) and anything before it.
    pub fn has_timestamp(&self) -> bool {
        (self.timestamp.timestamp(), self.timestamp.timestamp_subsec_nanos())
            > (ZERO_TIME_UNIX_SECS, 0)
    }

    /// Get a human-readable summary
    pub fn summary(&self) -> String {
        format!(
            "#{} {} {}: {} -> {} ({})",
            self.sequence_number,
            self.entry_id,
            self.event_type,
            self.action,
            self.target_id,
            self.result
        )
    }
}

pub fn legal_basis_for(event_type: &str) -> &'static str {
    if event_type.contains("dmca") {
        "DMCA 17 USC 512"
    } else if event_type.contains("privacy") {
        "Privacy Act compliance"
    } else {
        "General legal compliance"
    }
}

fn compliance_notes(event_type: &str, action: &str) -> String {
    format!(
        "Automated compliance logging for {} action: {}",
        event_type, action
    )
}

fn tags_for(event_type: &str, action: &str) -> Vec<String> {
    let mut tags = vec!["compliance".to_string(), event_type.to_string()];
    if action.contains("takedown") {
        tags.push("takedown".to_string());
    }
    if action.contains("reinstate") {
        tags.push("reinstatement".to_string());
    }
    tags
}

/// Opaque identifier: prefix plus 16 random hex characters.
pub(crate) fn generate_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..16])
}

pub fn generate_entry_id() -> String {
    generate_id("AE")
}
