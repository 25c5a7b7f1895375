//! Compliance Reports
//!
//! Time-bounded reports composed from a ledger snapshot, the scorer, the
//! alert monitor and integrity verification. Report generation never
//! touches the ledger itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

use crate::audit::entry::{generate_id, AuditEntry};
use crate::audit::verify::IntegrityReport;
use crate::config::AuditConfig;
use crate::error::ComplianceError;
use crate::monitor::ComplianceAlert;
use crate::scoring::{ComplianceAssessment, ComplianceScorer, FAILURE_RESULTS, SUCCESS_RESULTS};

const LOW_COUNTER_NOTICE_RATIO: f64 = 0.1;

const STANDING_RECOMMENDATIONS: [&str; 3] = [
    "Continue maintaining comprehensive audit logs for legal protection",
    "Regular compliance training for staff handling DMCA notices",
    "Consider implementing automated compliance monitoring alerts",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    Comprehensive,
    Dmca,
    Integrity,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportType::Comprehensive => "comprehensive",
            ReportType::Dmca => "dmca",
            ReportType::Integrity => "integrity",
        }
    }

    pub fn includes_dmca(&self) -> bool {
        matches!(self, ReportType::Comprehensive | ReportType::Dmca)
    }

    pub fn includes_integrity(&self) -> bool {
        matches!(self, ReportType::Comprehensive | ReportType::Integrity)
    }
}

impl fmt::Display for ReportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportType {
    type Err = ComplianceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "comprehensive" => Ok(ReportType::Comprehensive),
            "dmca" => Ok(ReportType::Dmca),
            "integrity" => Ok(ReportType::Integrity),
            _ => Err(ComplianceError::UnknownReportType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatistics {
    pub total_events: u64,
    pub events_by_type: BTreeMap<String, u64>,
    pub events_by_severity: BTreeMap<String, u64>,
    pub average_processing_time_ms: Option<u64>,
    pub compliance_score: f64,
    /// Event counts keyed by UTC day (`YYYY-MM-DD`).
    pub events_per_day: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestorAnalysis {
    pub requestor_email: String,
    pub total_requests: u64,
    pub successful_takedowns: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DmcaAnalysis {
    pub total_takedowns: u64,
    pub total_counter_notices: u64,
    pub total_reinstatements: u64,
    pub counter_notice_ratio: f64,
    pub average_processing_time_ms: Option<u64>,
    pub top_requestors: Vec<RequestorAnalysis>,
    pub compliance_issues: Vec<String>,
    pub legal_risk_assessment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceReport {
    pub report_id: String,
    pub report_type: ReportType,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub system_version: String,

    pub statistics: ReportStatistics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dmca_analysis: Option<DmcaAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance_assessment: Option<ComplianceAssessment>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub legal_summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrity_verification: Option<IntegrityReport>,
    #[serde(default)]
    pub active_alerts: Vec<ComplianceAlert>,
}

pub struct ReportGenerator {
    config: Arc<AuditConfig>,
    scorer: ComplianceScorer,
}

impl ReportGenerator {
    pub fn new(config: Arc<AuditConfig>) -> Self {
        let scorer = ComplianceScorer::from_config(&config);
        Self { config, scorer }
    }

    pub fn scorer(&self) -> &ComplianceScorer {
        &self.scorer
    }

    /// Build a report over `entries`, which the caller has already limited
    /// to `[start, end)`.
    pub fn generate(
        &self,
        report_type: ReportType,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        entries: &[AuditEntry],
        integrity: Option<IntegrityReport>,
        active_alerts: Vec<ComplianceAlert>,
    ) -> Result<ComplianceReport, ComplianceError> {
        if start >= end {
            return Err(ComplianceError::invalid_time_range(start, end));
        }

        let report = ComplianceReport {
            report_id: generate_id("CR"),
            report_type,
            start_date: start,
            end_date: end,
            generated_at: Utc::now(),
            system_version: self.config.system_version.clone(),
            statistics: self.statistics(entries),
            dmca_analysis: report_type.includes_dmca().then(|| self.dmca_analysis(entries)),
            compliance_assessment: report_type
                .includes_dmca()
                .then(|| self.scorer.assess(entries)),
            recommendations: if report_type.includes_dmca() {
                self.recommendations(entries)
            } else {
                Vec::new()
            },
            legal_summary: (report_type == ReportType::Comprehensive)
                .then(|| legal_summary(entries.len())),
            integrity_verification: if report_type.includes_integrity() {
                integrity
            } else {
                None
            },
            active_alerts,
        };

        info!(
            "Generated {} compliance report {} covering {} entries",
            report.report_type,
            report.report_id,
            entries.len()
        );

        Ok(report)
    }

    pub fn statistics(&self, entries: &[AuditEntry]) -> ReportStatistics {
        let mut events_by_type = BTreeMap::new();
        let mut events_by_severity = BTreeMap::new();
        let mut events_per_day = BTreeMap::new();

        for entry in entries {
            *events_by_type.entry(entry.event_type.clone()).or_insert(0) += 1;
            *events_by_severity
                .entry(entry.severity.as_str().to_string())
                .or_insert(0) += 1;
            *events_per_day
                .entry(entry.timestamp.date_naive().to_string())
                .or_insert(0) += 1;
        }

        ReportStatistics {
            total_events: entries.len() as u64,
            events_by_type,
            events_by_severity,
            average_processing_time_ms: average_processing_ms(entries.iter()),
            compliance_score: self.scorer.overall_score(entries),
            events_per_day,
        }
    }

    pub fn dmca_analysis(&self, entries: &[AuditEntry]) -> DmcaAnalysis {
        let params = self.scorer.params();
        let mut total_takedowns = 0u64;
        let mut total_counter_notices = 0u64;
        let mut total_reinstatements = 0u64;
        let mut requestors: HashMap<&str, RequestorAnalysis> = HashMap::new();
        let mut compliance_issues = Vec::new();

        for entry in entries {
            match entry.event_type.as_str() {
                "dmca_takedown" => {
                    total_takedowns += 1;
                    if let Some(email) = entry.action_details.requestor_email() {
                        let analysis = requestors.entry(email).or_insert_with(|| RequestorAnalysis {
                            requestor_email: email.to_string(),
                            total_requests: 0,
                            successful_takedowns: 0,
                            success_rate: 0.0,
                        });
                        analysis.total_requests += 1;
                        if SUCCESS_RESULTS.contains(&entry.result.as_str()) {
                            analysis.successful_takedowns += 1;
                        }
                    }
                }
                "dmca_counter_notice" => total_counter_notices += 1,
                "dmca_reinstatement" => total_reinstatements += 1,
                _ => {}
            }

            if !entry.is_dmca() {
                continue;
            }
            if FAILURE_RESULTS.contains(&entry.result.as_str()) {
                compliance_issues.push(format!(
                    "DMCA event {} ({}) ended with result '{}'",
                    entry.entry_id, entry.event_type, entry.result
                ));
            }
            if !entry.has_legal_basis() {
                compliance_issues.push(format!(
                    "DMCA event {} ({}) has no recorded legal basis",
                    entry.entry_id, entry.event_type
                ));
            }
        }

        let counter_notice_ratio = ratio(total_counter_notices, total_takedowns);

        let mut top_requestors: Vec<RequestorAnalysis> = requestors
            .into_values()
            .map(|mut analysis| {
                analysis.success_rate =
                    analysis.successful_takedowns as f64 / analysis.total_requests as f64;
                analysis
            })
            .collect();
        top_requestors.sort_by(|a, b| {
            b.total_requests
                .cmp(&a.total_requests)
                .then_with(|| a.requestor_email.cmp(&b.requestor_email))
        });

        let legal_risk_assessment = if counter_notice_ratio > params.high_counter_notice_ratio {
            "Medium risk - high counter-notice ratio may indicate over-broad takedowns"
        } else if total_takedowns > params.high_takedown_volume {
            "Medium risk - high volume requires careful monitoring"
        } else {
            "Low risk - normal compliance patterns observed"
        }
        .to_string();

        DmcaAnalysis {
            total_takedowns,
            total_counter_notices,
            total_reinstatements,
            counter_notice_ratio,
            average_processing_time_ms: average_processing_ms(
                entries.iter().filter(|e| e.is_dmca()),
            ),
            top_requestors,
            compliance_issues,
            legal_risk_assessment,
        }
    }

    pub fn recommendations(&self, entries: &[AuditEntry]) -> Vec<String> {
        let takedowns = entries
            .iter()
            .filter(|e| e.event_type == "dmca_takedown")
            .count() as u64;
        let counter_notices = entries
            .iter()
            .filter(|e| e.event_type == "dmca_counter_notice")
            .count() as u64;

        let mut recommendations = Vec::new();

        if takedowns > 0 {
            let counter_ratio = ratio(counter_notices, takedowns);
            if counter_ratio > self.config.alert_thresholds.counter_notice_ratio {
                recommendations.push(
                    "High counter-notice ratio detected - review takedown validation procedures"
                        .to_string(),
                );
            }
            if counter_ratio < LOW_COUNTER_NOTICE_RATIO {
                recommendations.push(
                    "Low counter-notice ratio - ensure users are aware of counter-notice rights"
                        .to_string(),
                );
            }
        }

        recommendations.extend(STANDING_RECOMMENDATIONS.iter().map(|r| r.to_string()));
        recommendations
    }
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn average_processing_ms<'a>(entries: impl Iterator<Item = &'a AuditEntry>) -> Option<u64> {
    let (total, count) = entries
        .filter_map(|e| e.processing_time_ms)
        .filter(|ms| *ms > 0)
        .fold((0u128, 0u128), |(total, count), ms| (total + u128::from(ms), count + 1));

    (count > 0).then(|| u64::try_from(total / count).unwrap_or(u64::MAX))
}

fn legal_summary(event_count: usize) -> String {
    format!(
        "Legal compliance summary: {} compliance events recorded under a hash-chained, \
         signed audit trail. Takedowns follow DMCA 512(c) safe harbor procedures and \
         counter-notices are handled per DMCA 512(g). \
         Legal framework: DMCA 17 USC 512, with additional privacy protections.",
        event_count
    )
}
