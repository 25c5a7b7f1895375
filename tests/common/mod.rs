#![allow(dead_code)]

use chrono::Duration;
use compliance_audit::audit::{EventDetails, NewEvent};
use compliance_audit::crypto::IntegritySigner;
use compliance_audit::{AuditConfig, ComplianceAuditSystem};
use rand::rngs::OsRng;
use secp256k1::SecretKey;
use std::path::Path;

/// Default configuration with a one hour processing threshold
pub fn test_config() -> AuditConfig {
    let mut config = AuditConfig::default();
    config.alert_thresholds.processing_time_threshold_secs = Some(3600);
    config
}

/// Create a test signer with a fresh key
pub fn create_test_signer() -> IntegritySigner {
    IntegritySigner::new(SecretKey::new(&mut OsRng))
}

pub fn create_test_system() -> ComplianceAuditSystem {
    ComplianceAuditSystem::with_signer(test_config(), create_test_signer())
        .expect("Failed to create test system")
}

/// System mirroring every entry to `export_path`
pub fn create_exporting_system(export_path: &Path, signer: IntegritySigner) -> ComplianceAuditSystem {
    let mut config = test_config();
    config.export_path = Some(export_path.to_path_buf());
    ComplianceAuditSystem::with_signer(config, signer).expect("Failed to create test system")
}

/// A DMCA event with an explicit outcome
pub fn dmca_event(event_type: &str, result: &str) -> NewEvent {
    NewEvent::new(event_type, "", "bafy-descriptor", "dmca_action", EventDetails::default())
        .with_result(result)
}

/// A user event that took `minutes` to process
pub fn timed_event(minutes: i64) -> NewEvent {
    NewEvent::new("user_upload", "user-1", "bafy-descriptor", "upload_processed", EventDetails::default())
        .with_processing_time(Duration::minutes(minutes))
}

pub fn approx_eq(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}
