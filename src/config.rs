//! Audit configuration
//!
//! Pure data, validated once when the audit system is built and never
//! mutated afterwards. Durations are carried as whole seconds/days so the
//! same struct deserializes from YAML, TOML and environment variables.

pub mod loader;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ComplianceError;

/// Upper bound on `retention_days` (one hundred years).
pub const MAX_RETENTION_DAYS: u32 = 36_500;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub retention_days: u32,
    pub legal_hold_enabled: bool,
    pub require_cryptographic_proof: bool,
    pub system_version: String,
    pub jurisdiction: String,
    /// File holding a hex-encoded secp256k1 secret key. When unset an
    /// ephemeral key is generated at startup.
    pub signing_key_path: Option<PathBuf>,
    /// JSONL file every appended entry is mirrored to.
    pub export_path: Option<PathBuf>,
    pub server_host: String,
    pub server_port: u16,
    pub alert_thresholds: AlertThresholds,
    pub scoring: ScoringParameters,
}

/// When to raise compliance alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertThresholds {
    pub takedowns_per_day: u64,
    pub takedowns_per_requestor: u64,
    /// Counter-notice/takedown ratio above which takedown validation is suspect.
    pub counter_notice_ratio: f64,
    pub processing_time_threshold_secs: Option<u64>,
}

/// Penalties and thresholds used by the compliance scorer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringParameters {
    pub dmca_failure_penalty: f64,
    pub default_processing_threshold_secs: u64,
    pub severe_delay_penalty: f64,
    pub integrity_issue_penalty: f64,
    pub missing_field_penalty: f64,
    pub low_risk_threshold: f64,
    pub medium_risk_threshold: f64,
    pub high_takedown_volume: u64,
    pub high_counter_notice_ratio: f64,
    pub compliance_strength_threshold: f64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            retention_days: 7 * 365,
            legal_hold_enabled: true,
            require_cryptographic_proof: true,
            system_version: "noisefs-1.0".to_string(),
            jurisdiction: "US".to_string(),
            signing_key_path: None,
            export_path: None,
            server_host: "0.0.0.0".to_string(),
            server_port: 3000,
            alert_thresholds: AlertThresholds::default(),
            scoring: ScoringParameters::default(),
        }
    }
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            takedowns_per_day: 100,
            takedowns_per_requestor: 20,
            counter_notice_ratio: 0.3,
            processing_time_threshold_secs: Some(24 * 60 * 60),
        }
    }
}

impl Default for ScoringParameters {
    fn default() -> Self {
        Self {
            dmca_failure_penalty: 0.1,
            default_processing_threshold_secs: 24 * 60 * 60,
            severe_delay_penalty: 0.05,
            integrity_issue_penalty: 0.15,
            missing_field_penalty: 0.05,
            low_risk_threshold: 0.9,
            medium_risk_threshold: 0.7,
            high_takedown_volume: 1000,
            high_counter_notice_ratio: 0.5,
            compliance_strength_threshold: 0.9,
        }
    }
}

impl AuditConfig {
    pub fn retention_period(&self) -> Duration {
        Duration::days(i64::from(self.retention_days))
    }

    /// Processing-time limit shared by the scorer and the alert monitor.
    ///
    /// The alert threshold wins when set to a non-zero value, otherwise the
    /// scoring default applies.
    pub fn processing_threshold(&self) -> Duration {
        let secs = self
            .alert_thresholds
            .processing_time_threshold_secs
            .filter(|secs| *secs > 0)
            .unwrap_or(self.scoring.default_processing_threshold_secs);
        let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1_000);
        Duration::seconds(secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ComplianceError> {
        if self.retention_days == 0 {
            return Err(ComplianceError::ConfigError(
                "retention_days must be greater than zero".to_string(),
            ));
        }

        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(ComplianceError::ConfigError(format!(
                "retention_days must not exceed {}",
                MAX_RETENTION_DAYS
            )));
        }

        if self.system_version.trim().is_empty() {
            return Err(ComplianceError::ConfigError(
                "system_version must not be empty".to_string(),
            ));
        }

        if self.jurisdiction.trim().is_empty() {
            return Err(ComplianceError::ConfigError(
                "jurisdiction must not be empty".to_string(),
            ));
        }

        self.alert_thresholds.validate()?;
        self.scoring.validate()?;

        if self.processing_threshold() <= Duration::zero() {
            return Err(ComplianceError::ConfigError(
                "processing threshold must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

impl AlertThresholds {
    fn validate(&self) -> Result<(), ComplianceError> {
        if self.takedowns_per_day == 0 {
            return Err(ComplianceError::ConfigError(
                "alert_thresholds.takedowns_per_day must be greater than zero".to_string(),
            ));
        }

        if self.takedowns_per_requestor == 0 {
            return Err(ComplianceError::ConfigError(
                "alert_thresholds.takedowns_per_requestor must be greater than zero".to_string(),
            ));
        }

        check_unit_interval("alert_thresholds.counter_notice_ratio", self.counter_notice_ratio)
    }
}

impl ScoringParameters {
    fn validate(&self) -> Result<(), ComplianceError> {
        check_penalty("scoring.dmca_failure_penalty", self.dmca_failure_penalty)?;
        check_penalty("scoring.severe_delay_penalty", self.severe_delay_penalty)?;
        check_penalty("scoring.integrity_issue_penalty", self.integrity_issue_penalty)?;
        check_penalty("scoring.missing_field_penalty", self.missing_field_penalty)?;

        check_unit_interval("scoring.low_risk_threshold", self.low_risk_threshold)?;
        check_unit_interval("scoring.medium_risk_threshold", self.medium_risk_threshold)?;
        check_unit_interval("scoring.high_counter_notice_ratio", self.high_counter_notice_ratio)?;
        check_unit_interval(
            "scoring.compliance_strength_threshold",
            self.compliance_strength_threshold,
        )?;

        if self.medium_risk_threshold > self.low_risk_threshold {
            return Err(ComplianceError::ConfigError(format!(
                "scoring.medium_risk_threshold ({}) must not exceed scoring.low_risk_threshold ({})",
                self.medium_risk_threshold, self.low_risk_threshold
            )));
        }

        if self.default_processing_threshold_secs == 0 {
            return Err(ComplianceError::ConfigError(
                "scoring.default_processing_threshold_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

fn check_penalty(name: &str, value: f64) -> Result<(), ComplianceError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ComplianceError::ConfigError(format!(
            "{} ({}) must be a finite, non-negative number",
            name, value
        )));
    }
    Ok(())
}

fn check_unit_interval(name: &str, value: f64) -> Result<(), ComplianceError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ComplianceError::ConfigError(format!(
            "{} ({}) must be between 0.0 and 1.0",
            name, value
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AuditConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retention_period(), Duration::days(2555));
        assert_eq!(config.processing_threshold(), Duration::hours(24));
    }

    #[test]
    fn test_processing_threshold_falls_back_to_scoring_default() {
        let mut config = AuditConfig::default();
        config.alert_thresholds.processing_time_threshold_secs = None;
        config.scoring.default_processing_threshold_secs = 3600;
        assert_eq!(config.processing_threshold(), Duration::hours(1));

        config.alert_thresholds.processing_time_threshold_secs = Some(0);
        assert_eq!(config.processing_threshold(), Duration::hours(1));

        config.alert_thresholds.processing_time_threshold_secs = Some(60);
        assert_eq!(config.processing_threshold(), Duration::minutes(1));
    }

    #[test]
    fn test_retention_days_bounds() {
        let mut config = AuditConfig::default();
        config.retention_days = MAX_RETENTION_DAYS;
        assert!(config.validate().is_ok());

        config.retention_days = MAX_RETENTION_DAYS + 1;
        assert!(config.validate().is_err());

        config.retention_days = u32::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_negative_penalty_rejected() {
        let mut config = AuditConfig::default();
        config.scoring.dmca_failure_penalty = -0.1;
        assert!(config.validate().is_err());

        let mut config = AuditConfig::default();
        config.scoring.integrity_issue_penalty = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_large_penalty_accepted() {
        let mut config = AuditConfig::default();
        config.scoring.missing_field_penalty = 1_000.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_risk_threshold_ordering() {
        let mut config = AuditConfig::default();
        config.scoring.medium_risk_threshold = 0.95;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_retention_rejected() {
        let mut config = AuditConfig::default();
        config.retention_days = 0;
        assert!(config.validate().is_err());
    }
}
