//! Compliance Scoring
//!
//! Pure, order-insensitive scores over a slice of entries. Every score lies
//! in `[0.0, 1.0]`, and an input with nothing to judge scores 1.0.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::audit::entry::{AuditEntry, Severity};
use crate::audit::hasher::verify_entry_hash;
use crate::config::{AuditConfig, ScoringParameters};

pub const CRITICAL_SEVERITY_PENALTY: f64 = 0.1;
pub const WARNING_SEVERITY_PENALTY: f64 = 0.02;

pub const SUCCESS_RESULTS: [&str; 4] = ["success", "processed", "blacklisted", "reinstated"];
pub const FAILURE_RESULTS: [&str; 3] = ["failed", "rejected", "error"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores and qualitative findings for a set of entries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceAssessment {
    pub overall_score: f64,
    pub dmca_compliance: f64,
    pub processing_compliance: f64,
    pub audit_compliance: f64,
    pub risk_level: RiskLevel,
    pub strengths: Vec<String>,
    pub improvement_areas: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ComplianceScorer {
    params: ScoringParameters,
    processing_threshold_ms: u64,
    require_cryptographic_proof: bool,
}

impl ComplianceScorer {
    pub fn new(
        params: ScoringParameters,
        processing_threshold_ms: u64,
        require_cryptographic_proof: bool,
    ) -> Self {
        Self {
            params,
            processing_threshold_ms,
            require_cryptographic_proof,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        let threshold_ms = u64::try_from(config.processing_threshold().num_milliseconds()).unwrap_or(0);
        Self::new(
            config.scoring.clone(),
            threshold_ms,
            config.require_cryptographic_proof,
        )
    }

    pub fn params(&self) -> &ScoringParameters {
        &self.params
    }

    /// Share of DMCA events with a successful outcome, less a penalty per
    /// failed outcome.
    pub fn dmca_score(&self, entries: &[AuditEntry]) -> f64 {
        let mut dmca_events = 0u64;
        let mut successful = 0u64;
        let mut failed = 0u64;

        for entry in entries.iter().filter(|e| e.is_dmca()) {
            dmca_events += 1;
            if SUCCESS_RESULTS.contains(&entry.result.as_str()) {
                successful += 1;
            } else if FAILURE_RESULTS.contains(&entry.result.as_str()) {
                failed += 1;
            }
        }

        if dmca_events == 0 {
            return 1.0;
        }

        let success_rate = successful as f64 / dmca_events as f64;
        clamp_score(success_rate - penalty(failed, self.params.dmca_failure_penalty))
    }

    /// Share of timed entries processed within the threshold, less a penalty
    /// per entry that took more than twice the threshold.
    pub fn processing_score(&self, entries: &[AuditEntry]) -> f64 {
        let threshold = self.processing_threshold_ms;
        let severe = threshold.saturating_mul(2);

        let mut processable = 0u64;
        let mut timely = 0u64;
        let mut severely_delayed = 0u64;

        for ms in entries
            .iter()
            .filter_map(|e| e.processing_time_ms)
            .filter(|ms| *ms > 0)
        {
            processable += 1;
            if ms <= threshold {
                timely += 1;
            }
            if ms > severe {
                severely_delayed += 1;
            }
        }

        if processable == 0 {
            return 1.0;
        }

        let timely_rate = timely as f64 / processable as f64;
        clamp_score(timely_rate - penalty(severely_delayed, self.params.severe_delay_penalty))
    }

    /// Share of complete entries, less penalties for integrity problems and
    /// missing fields.
    pub fn audit_score(&self, entries: &[AuditEntry]) -> f64 {
        if entries.is_empty() {
            return 1.0;
        }

        let mut complete = 0u64;
        let mut integrity_issues = 0u64;
        let mut missing_fields = 0u64;

        for entry in entries {
            let mut is_complete = true;

            if entry.entry_id.is_empty()
                || !entry.has_timestamp()
                || entry.event_type.is_empty()
                || entry.action.is_empty()
            {
                missing_fields += 1;
                is_complete = false;
            }

            if self.require_cryptographic_proof {
                if entry.entry_hash.is_empty() || entry.signature.is_empty() {
                    integrity_issues += 1;
                    is_complete = false;
                }
                if !entry.entry_hash.is_empty() && !verify_entry_hash(entry) {
                    integrity_issues += 1;
                    is_complete = false;
                }
            }

            if entry.requires_legal_basis() && !entry.has_legal_basis() {
                missing_fields += 1;
                is_complete = false;
            }

            if is_complete {
                complete += 1;
            }
        }

        let completeness = complete as f64 / entries.len() as f64;
        clamp_score(
            completeness
                - penalty(integrity_issues, self.params.integrity_issue_penalty)
                - penalty(missing_fields, self.params.missing_field_penalty),
        )
    }

    /// Fixed deductions per critical and warning entry.
    pub fn overall_score(&self, entries: &[AuditEntry]) -> f64 {
        let mut critical = 0u64;
        let mut warnings = 0u64;

        for entry in entries {
            match entry.severity {
                Severity::Critical => critical += 1,
                Severity::Warning => warnings += 1,
                Severity::Info | Severity::Legal => {}
            }
        }

        clamp_score(
            1.0 - penalty(critical, CRITICAL_SEVERITY_PENALTY)
                - penalty(warnings, WARNING_SEVERITY_PENALTY),
        )
    }

    pub fn risk_level(&self, overall_score: f64) -> RiskLevel {
        if overall_score >= self.params.low_risk_threshold {
            RiskLevel::Low
        } else if overall_score >= self.params.medium_risk_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn assess(&self, entries: &[AuditEntry]) -> ComplianceAssessment {
        let overall_score = self.overall_score(entries);
        let dmca_compliance = self.dmca_score(entries);
        let processing_compliance = self.processing_score(entries);
        let audit_compliance = self.audit_score(entries);

        let mut strengths = Vec::new();
        let mut improvement_areas = Vec::new();
        let strong = self.params.compliance_strength_threshold;

        let findings = [
            (
                dmca_compliance,
                "Strong DMCA compliance procedures",
                "Improve DMCA processing efficiency",
            ),
            (
                processing_compliance,
                "Timely processing of compliance requests",
                "Reduce processing delays for compliance requests",
            ),
            (
                audit_compliance,
                "Excellent audit trail maintenance",
                "Enhance audit logging completeness",
            ),
        ];

        for (score, strength, area) in findings {
            if score >= strong {
                strengths.push(strength.to_string());
            } else {
                improvement_areas.push(area.to_string());
            }
        }

        ComplianceAssessment {
            overall_score,
            dmca_compliance,
            processing_compliance,
            audit_compliance,
            risk_level: self.risk_level(overall_score),
            strengths,
            improvement_areas,
        }
    }
}

/// Total penalty for `count` occurrences. Zero occurrences never penalize,
/// whatever the per-occurrence value.
fn penalty(count: u64, per_occurrence: f64) -> f64 {
    if count == 0 {
        0.0
    } else {
        count as f64 * per_occurrence
    }
}

fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EventDetails, NewEvent};
    use crate::audit::hasher::hash_entry;
    use chrono::{Duration, Utc};

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn entry(event_type: &str, result: &str, processing: Option<Duration>) -> AuditEntry {
        let mut event = NewEvent::new(event_type, "", "cid", "act", EventDetails::default())
            .with_result(result);
        if let Some(d) = processing {
            event = event.with_processing_time(d);
        }
        let mut entry = AuditEntry::draft(1, Utc::now(), event, &AuditConfig::default());
        entry.entry_hash = hash_entry(&entry).unwrap();
        entry.signature = "HASH-00000000000000000000000000000000".to_string();
        entry
    }

    fn scorer() -> ComplianceScorer {
        ComplianceScorer::from_config(&AuditConfig::default())
    }

    #[test]
    fn test_empty_inputs_score_perfectly() {
        let scorer = scorer();
        assert_eq!(scorer.dmca_score(&[]), 1.0);
        assert_eq!(scorer.processing_score(&[]), 1.0);
        assert_eq!(scorer.audit_score(&[]), 1.0);
        assert_eq!(scorer.overall_score(&[]), 1.0);
    }

    #[test]
    fn test_no_dmca_events_is_vacuous_pass() {
        let entries = vec![entry("user_login", "failed", None)];
        assert_eq!(scorer().dmca_score(&entries), 1.0);
    }

    #[test]
    fn test_dmca_worked_example() {
        let entries = vec![
            entry("dmca_takedown", "success", None),
            entry("dmca_takedown", "processed", None),
            entry("dmca_counter_notice", "failed", None),
            entry("dmca_reinstatement", "rejected", None),
        ];
        assert!(approx(scorer().dmca_score(&entries), 0.3));
    }

    #[test]
    fn test_unknown_results_are_neither_success_nor_failure() {
        let entries = vec![
            entry("dmca_takedown", "success", None),
            entry("dmca_takedown", "pending", None),
        ];
        assert!(approx(scorer().dmca_score(&entries), 0.5));
    }

    #[test]
    fn test_processing_worked_example() {
        let params = ScoringParameters::default();
        let scorer = ComplianceScorer::new(params, 3_600_000, true);
        let entries = vec![
            entry("dmca_takedown", "success", Some(Duration::minutes(30))),
            entry("dmca_takedown", "success", Some(Duration::hours(3))),
            entry("dmca_takedown", "success", None),
        ];
        assert!(approx(scorer.processing_score(&entries), 0.45));
    }

    #[test]
    fn test_delayed_but_not_severe_has_no_extra_penalty() {
        let scorer = ComplianceScorer::new(ScoringParameters::default(), 3_600_000, true);
        let entries = vec![
            entry("a", "success", Some(Duration::minutes(30))),
            entry("a", "success", Some(Duration::minutes(90))),
        ];
        assert!(approx(scorer.processing_score(&entries), 0.5));
    }

    #[test]
    fn test_audit_score_complete_entries() {
        let entries = vec![
            entry("dmca_takedown", "success", None),
            entry("user_login", "success", None),
        ];
        assert_eq!(scorer().audit_score(&entries), 1.0);
    }

    #[test]
    fn test_audit_score_penalizes_tampering_and_missing_basis() {
        let mut tampered = entry("user_login", "success", None);
        tampered.action = "rewritten".to_string();

        let mut no_basis = entry("dmca_takedown", "success", None);
        no_basis.legal_context = None;

        let ok = entry("user_login", "success", None);
        let entries = vec![tampered, no_basis, ok];

        // 1/3 complete, one integrity issue, one missing field
        let expected = 1.0 / 3.0 - 0.15 - 0.05;
        assert!(approx(scorer().audit_score(&entries), expected));
    }

    #[test]
    fn test_audit_score_without_crypto_requirement() {
        let mut unsigned = entry("user_login", "success", None);
        unsigned.signature.clear();

        let mut config = AuditConfig::default();
        config.require_cryptographic_proof = false;
        assert_eq!(ComplianceScorer::from_config(&config).audit_score(&[unsigned.clone()]), 1.0);

        // 0 complete, one integrity issue
        assert_eq!(scorer().audit_score(&[unsigned]), 0.0);
    }

    #[test]
    fn test_overall_score_deductions() {
        let entries = vec![
            entry("system_error", "success", None),
            entry("processing_delay", "success", None),
            entry("processing_delay", "success", None),
            entry("dmca_takedown", "success", None),
        ];
        assert!(approx(scorer().overall_score(&entries), 1.0 - 0.1 - 0.04));

        let many: Vec<_> = (0..20).map(|_| entry("integrity_breach", "success", None)).collect();
        assert_eq!(scorer().overall_score(&many), 0.0);
    }

    #[test]
    fn test_scores_stay_bounded_for_extreme_penalties() {
        let mut params = ScoringParameters::default();
        params.dmca_failure_penalty = f64::MAX;
        params.severe_delay_penalty = f64::INFINITY;
        params.integrity_issue_penalty = -1e300;
        params.missing_field_penalty = f64::NAN;
        let scorer = ComplianceScorer::new(params, 1, true);

        let mut broken = entry("dmca_takedown", "failed", Some(Duration::hours(1)));
        broken.legal_context = None;
        broken.action = "x".to_string();
        let entries = vec![broken, entry("dmca_takedown", "success", None)];

        for score in [
            scorer.dmca_score(&entries),
            scorer.processing_score(&entries),
            scorer.audit_score(&entries),
            scorer.overall_score(&entries),
        ] {
            assert!((0.0..=1.0).contains(&score), "score out of bounds: {}", score);
        }
    }

    #[test]
    fn test_scores_ignore_entry_order() {
        let mut entries = vec![
            entry("dmca_takedown", "success", Some(Duration::hours(30))),
            entry("dmca_takedown", "failed", Some(Duration::hours(1))),
            entry("system_error", "error", None),
        ];
        let scorer = scorer();
        let before = scorer.assess(&entries);
        entries.reverse();
        let after = scorer.assess(&entries);

        assert_eq!(before.dmca_compliance, after.dmca_compliance);
        assert_eq!(before.processing_compliance, after.processing_compliance);
        assert_eq!(before.audit_compliance, after.audit_compliance);
        assert_eq!(before.overall_score, after.overall_score);
    }

    #[test]
    fn test_risk_levels_and_findings() {
        let scorer = scorer();
        assert_eq!(scorer.risk_level(0.95), RiskLevel::Low);
        assert_eq!(scorer.risk_level(0.9), RiskLevel::Low);
        assert_eq!(scorer.risk_level(0.75), RiskLevel::Medium);
        assert_eq!(scorer.risk_level(0.2), RiskLevel::High);

        let assessment = scorer.assess(&[]);
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.strengths.len(), 3);
        assert!(assessment.improvement_areas.is_empty());

        let failing = vec![entry("dmca_takedown", "failed", None)];
        let assessment = scorer.assess(&failing);
        assert!(assessment
            .improvement_areas
            .contains(&"Improve DMCA processing efficiency".to_string()));
    }
}
