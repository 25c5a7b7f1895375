//! Compliance Monitoring
//!
//! Keeps per-UTC-day counters fed by the ledger's append stream and raises
//! alerts when threshold rules fire. Alerts are never removed; resolving one
//! only marks it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{info, warn};

use crate::audit::entry::{generate_id, AuditEntry, Severity};
use crate::audit::export::AppendObserver;
use crate::config::{AlertThresholds, AuditConfig};
use crate::error::ComplianceError;

const TOP_REQUESTOR_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HighTakedownVolume,
    RequestorVolume,
    ProcessingDelay,
    CriticalEvent,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertType::HighTakedownVolume => "high_takedown_volume",
            AlertType::RequestorVolume => "requestor_volume",
            AlertType::ProcessingDelay => "processing_delay",
            AlertType::CriticalEvent => "critical_event",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComplianceAlert {
    pub alert_id: String,
    pub alert_type: AlertType,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
    pub condition: String,
    pub details: BTreeMap<String, Value>,
    /// Entry that caused the alert to fire.
    pub triggered_by: String,
    pub resolved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestorMetric {
    pub requestor_email: String,
    pub takedown_count: u64,
    pub last_activity: DateTime<Utc>,
}

/// Point-in-time view of the monitor's counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealTimeMetrics {
    pub day: Option<NaiveDate>,
    pub takedowns_today: u64,
    pub counter_notices_today: u64,
    pub processed_entries: u64,
    pub average_processing_time_ms: Option<u64>,
    pub top_requestors: Vec<RequestorMetric>,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct MonitorState {
    day: Option<NaiveDate>,
    takedowns_today: u64,
    counter_notices_today: u64,
    requestors_today: HashMap<String, RequestorMetric>,
    /// Volume rules already fired today, keyed by rule and subject.
    fired_today: HashSet<String>,
    processed_entries: u64,
    total_processing_ms: u128,
    last_updated: Option<DateTime<Utc>>,
    alerts: Vec<ComplianceAlert>,
}

impl MonitorState {
    /// Move to `day` if it is later than the current day. Returns false for
    /// entries stamped before the current day.
    fn roll_to(&mut self, day: NaiveDate) -> bool {
        match self.day {
            Some(current) if day < current => false,
            Some(current) if day == current => true,
            _ => {
                self.day = Some(day);
                self.takedowns_today = 0;
                self.counter_notices_today = 0;
                self.requestors_today.clear();
                self.fired_today.clear();
                true
            }
        }
    }
}

pub struct AlertMonitor {
    thresholds: AlertThresholds,
    processing_threshold_ms: u64,
    state: Mutex<MonitorState>,
}

impl AlertMonitor {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            thresholds: config.alert_thresholds.clone(),
            processing_threshold_ms: u64::try_from(config.processing_threshold().num_milliseconds())
                .unwrap_or(0),
            state: Mutex::new(MonitorState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Update counters with a newly appended entry and evaluate alert rules.
    ///
    /// Returns the alerts raised by this entry.
    pub fn observe(&self, entry: &AuditEntry) -> Vec<ComplianceAlert> {
        let mut state = self.lock();
        let mut raised = Vec::new();

        if let Some(ms) = entry.processing_time_ms.filter(|ms| *ms > 0) {
            state.processed_entries += 1;
            state.total_processing_ms += u128::from(ms);

            if ms > self.processing_threshold_ms {
                raised.push(self.alert(
                    entry,
                    AlertType::ProcessingDelay,
                    AlertSeverity::Warning,
                    format!(
                        "Processing time {}ms exceeded threshold of {}ms",
                        ms, self.processing_threshold_ms
                    ),
                    [
                        ("processing_time_ms", json!(ms)),
                        ("threshold_ms", json!(self.processing_threshold_ms)),
                    ],
                ));
            }
        }

        if entry.severity == Severity::Critical {
            raised.push(self.alert(
                entry,
                AlertType::CriticalEvent,
                AlertSeverity::Critical,
                format!("Critical event recorded: {}", entry.event_type),
                [
                    ("event_type", json!(entry.event_type)),
                    ("target_id", json!(entry.target_id)),
                ],
            ));
        }

        let counts_today = state.roll_to(entry.timestamp.date_naive());
        if counts_today {
            match entry.event_type.as_str() {
                "dmca_takedown" => {
                    state.takedowns_today += 1;
                    let takedowns = state.takedowns_today;
                    if takedowns > self.thresholds.takedowns_per_day
                        && state
                            .fired_today
                            .insert(AlertType::HighTakedownVolume.as_str().to_string())
                    {
                        raised.push(self.alert(
                            entry,
                            AlertType::HighTakedownVolume,
                            AlertSeverity::Warning,
                            format!("Daily takedowns exceeded threshold: {}", takedowns),
                            [
                                ("current_count", json!(takedowns)),
                                ("threshold", json!(self.thresholds.takedowns_per_day)),
                            ],
                        ));
                    }

                    if let Some(email) = entry.action_details.requestor_email() {
                        let metric = state
                            .requestors_today
                            .entry(email.to_string())
                            .or_insert_with(|| RequestorMetric {
                                requestor_email: email.to_string(),
                                takedown_count: 0,
                                last_activity: entry.timestamp,
                            });
                        metric.takedown_count += 1;
                        metric.last_activity = entry.timestamp;
                        let count = metric.takedown_count;

                        if count > self.thresholds.takedowns_per_requestor
                            && state.fired_today.insert(format!(
                                "{}:{}",
                                AlertType::RequestorVolume.as_str(),
                                email
                            ))
                        {
                            raised.push(self.alert(
                                entry,
                                AlertType::RequestorVolume,
                                AlertSeverity::Warning,
                                format!(
                                    "Requestor {} exceeded daily takedown threshold: {}",
                                    email, count
                                ),
                                [
                                    ("requestor_email", json!(email)),
                                    ("current_count", json!(count)),
                                    ("threshold", json!(self.thresholds.takedowns_per_requestor)),
                                ],
                            ));
                        }
                    }
                }
                "dmca_counter_notice" => state.counter_notices_today += 1,
                _ => {}
            }
        }

        state.last_updated = Some(Utc::now());

        for alert in &raised {
            warn!(
                "Compliance alert {} ({}): {}",
                alert.alert_id,
                alert.alert_type.as_str(),
                alert.condition
            );
        }
        state.alerts.extend(raised.iter().cloned());

        raised
    }

    fn alert<const N: usize>(
        &self,
        entry: &AuditEntry,
        alert_type: AlertType,
        severity: AlertSeverity,
        condition: String,
        details: [(&str, Value); N],
    ) -> ComplianceAlert {
        ComplianceAlert {
            alert_id: generate_id("CA"),
            alert_type,
            severity,
            timestamp: Utc::now(),
            condition,
            details: details
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
            triggered_by: entry.entry_id.clone(),
            resolved: false,
            resolution: None,
            resolved_at: None,
        }
    }

    /// Full alert history, oldest first.
    pub fn alerts(&self) -> Vec<ComplianceAlert> {
        self.lock().alerts.clone()
    }

    pub fn active_alerts(&self) -> Vec<ComplianceAlert> {
        self.lock()
            .alerts
            .iter()
            .filter(|alert| !alert.resolved)
            .cloned()
            .collect()
    }

    pub fn resolve(&self, alert_id: &str, resolution: &str) -> Result<ComplianceAlert, ComplianceError> {
        let mut state = self.lock();
        let alert = state
            .alerts
            .iter_mut()
            .find(|alert| alert.alert_id == alert_id)
            .ok_or_else(|| ComplianceError::AlertNotFound(alert_id.to_string()))?;

        if alert.resolved {
            return Err(ComplianceError::AlertAlreadyResolved(alert_id.to_string()));
        }

        alert.resolved = true;
        alert.resolution = Some(resolution.to_string());
        alert.resolved_at = Some(Utc::now());

        info!("Resolved compliance alert {}: {}", alert_id, resolution);
        Ok(alert.clone())
    }

    pub fn metrics(&self) -> RealTimeMetrics {
        self.metrics_at(Utc::now().date_naive())
    }

    /// Metrics as seen on `today`. Daily counters from an earlier day read as
    /// zero without touching the live state.
    pub fn metrics_at(&self, today: NaiveDate) -> RealTimeMetrics {
        let state = self.lock();
        let stale = state.day.map_or(true, |day| day < today);

        let mut top_requestors: Vec<RequestorMetric> = if stale {
            Vec::new()
        } else {
            state.requestors_today.values().cloned().collect()
        };
        top_requestors.sort_by(|a, b| {
            b.takedown_count
                .cmp(&a.takedown_count)
                .then_with(|| a.requestor_email.cmp(&b.requestor_email))
        });
        top_requestors.truncate(TOP_REQUESTOR_LIMIT);

        let average_processing_time_ms = (state.processed_entries > 0).then(|| {
            let avg = state.total_processing_ms / u128::from(state.processed_entries);
            u64::try_from(avg).unwrap_or(u64::MAX)
        });

        RealTimeMetrics {
            day: if stale { Some(today) } else { state.day },
            takedowns_today: if stale { 0 } else { state.takedowns_today },
            counter_notices_today: if stale { 0 } else { state.counter_notices_today },
            processed_entries: state.processed_entries,
            average_processing_time_ms,
            top_requestors,
            last_updated: state.last_updated,
        }
    }
}

impl AppendObserver for AlertMonitor {
    fn name(&self) -> &str {
        "alert-monitor"
    }

    fn on_append(&self, entry: &AuditEntry) -> Result<(), ComplianceError> {
        self.observe(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::entry::{EventDetails, NewEvent};
    use chrono::{Duration, TimeZone};

    fn config(per_day: u64, per_requestor: u64) -> AuditConfig {
        let mut config = AuditConfig::default();
        config.alert_thresholds.takedowns_per_day = per_day;
        config.alert_thresholds.takedowns_per_requestor = per_requestor;
        config.alert_thresholds.processing_time_threshold_secs = Some(3600);
        config
    }

    fn takedown(at: DateTime<Utc>, email: &str) -> AuditEntry {
        let details = EventDetails::Takedown {
            takedown_id: "T".to_string(),
            requestor_email: email.to_string(),
            copyright_work: "Work".to_string(),
            legal_framework: "DMCA 512(c)".to_string(),
        };
        AuditEntry::draft(
            1,
            at,
            NewEvent::new("dmca_takedown", "", "cid", "descriptor_blacklisted", details),
            &AuditConfig::default(),
        )
    }

    fn plain(event_type: &str, at: DateTime<Utc>) -> AuditEntry {
        AuditEntry::draft(
            1,
            at,
            NewEvent::new(event_type, "", "cid", "act", EventDetails::default()),
            &AuditConfig::default(),
        )
    }

    fn noon(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_daily_takedown_alert_fires_once() {
        let monitor = AlertMonitor::new(&config(2, 100));
        let mut raised = Vec::new();
        for i in 0..5 {
            raised.extend(monitor.observe(&takedown(noon(1), &format!("r{}@x.example", i))));
        }

        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].alert_type, AlertType::HighTakedownVolume);
        assert_eq!(raised[0].details["current_count"], json!(3));
        assert_eq!(monitor.metrics_at(noon(1).date_naive()).takedowns_today, 5);
    }

    #[test]
    fn test_counters_reset_on_new_day() {
        let monitor = AlertMonitor::new(&config(1, 100));
        monitor.observe(&takedown(noon(1), "a@x.example"));
        monitor.observe(&takedown(noon(1), "a@x.example"));
        monitor.observe(&plain("dmca_counter_notice", noon(1)));
        assert_eq!(monitor.alerts().len(), 1);

        monitor.observe(&takedown(noon(2), "a@x.example"));
        let metrics = monitor.metrics_at(noon(2).date_naive());
        assert_eq!(metrics.day, Some(noon(2).date_naive()));
        assert_eq!(metrics.takedowns_today, 1);
        assert_eq!(metrics.counter_notices_today, 0);

        // rule may fire again on the new day
        monitor.observe(&takedown(noon(2), "a@x.example"));
        assert_eq!(monitor.alerts().len(), 2);
    }

    #[test]
    fn test_quiet_day_reads_zero_counts() {
        let monitor = AlertMonitor::new(&config(100, 100));
        monitor.observe(&takedown(noon(1), "a@x.example"));
        monitor.observe(&plain("dmca_counter_notice", noon(1)));

        let mut slow = plain("user_upload", noon(1));
        slow.processing_time_ms = Some(5_000);
        monitor.observe(&slow);

        let metrics = monitor.metrics_at(noon(3).date_naive());
        assert_eq!(metrics.day, Some(noon(3).date_naive()));
        assert_eq!(metrics.takedowns_today, 0);
        assert_eq!(metrics.counter_notices_today, 0);
        assert!(metrics.top_requestors.is_empty());
        assert_eq!(metrics.processed_entries, 1);

        // the live state is untouched
        let metrics = monitor.metrics_at(noon(1).date_naive());
        assert_eq!(metrics.takedowns_today, 1);
        assert_eq!(metrics.counter_notices_today, 1);

        assert_eq!(monitor.metrics().takedowns_today, 0);
    }

    #[test]
    fn test_late_entries_do_not_count_toward_today() {
        let monitor = AlertMonitor::new(&config(100, 100));
        monitor.observe(&takedown(noon(2), "a@x.example"));
        monitor.observe(&takedown(noon(2) - Duration::days(1), "a@x.example"));

        let metrics = monitor.metrics_at(noon(2).date_naive());
        assert_eq!(metrics.takedowns_today, 1);
        assert_eq!(metrics.day, Some(noon(2).date_naive()));
    }

    #[test]
    fn test_requestor_volume_alert() {
        let monitor = AlertMonitor::new(&config(100, 2));
        for _ in 0..4 {
            monitor.observe(&takedown(noon(1), "studio@x.example"));
        }
        monitor.observe(&takedown(noon(1), "other@x.example"));

        let alerts = monitor.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, AlertType::RequestorVolume);
        assert_eq!(alerts[0].details["requestor_email"], json!("studio@x.example"));

        let top = monitor.metrics_at(noon(1).date_naive()).top_requestors;
        assert_eq!(top[0].requestor_email, "studio@x.example");
        assert_eq!(top[0].takedown_count, 4);
        assert_eq!(top[1].requestor_email, "other@x.example");
    }

    #[test]
    fn test_processing_delay_and_critical_alerts() {
        let monitor = AlertMonitor::new(&config(100, 100));

        let mut slow = plain("user_upload", noon(1));
        slow.processing_time_ms = Some(2 * 3_600_000);
        let raised = monitor.observe(&slow);
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].alert_type, AlertType::ProcessingDelay);
        assert_eq!(raised[0].triggered_by, slow.entry_id);

        let raised = monitor.observe(&plain("system_error", noon(1)));
        assert_eq!(raised.len(), 1);
        assert_eq!(raised[0].severity, AlertSeverity::Critical);

        let mut fast = plain("user_upload", noon(1));
        fast.processing_time_ms = Some(1_000);
        assert!(monitor.observe(&fast).is_empty());

        let metrics = monitor.metrics_at(noon(1).date_naive());
        assert_eq!(metrics.processed_entries, 2);
        assert_eq!(metrics.average_processing_time_ms, Some((7_200_000 + 1_000) / 2));
    }

    #[test]
    fn test_resolve_alert() {
        let monitor = AlertMonitor::new(&config(100, 100));
        let alert = monitor.observe(&plain("integrity_breach", noon(1))).remove(0);

        let resolved = monitor.resolve(&alert.alert_id, "investigated").unwrap();
        assert!(resolved.resolved);
        assert_eq!(resolved.resolution.as_deref(), Some("investigated"));
        assert!(resolved.resolved_at.is_some());

        assert!(matches!(
            monitor.resolve(&alert.alert_id, "again"),
            Err(ComplianceError::AlertAlreadyResolved(_))
        ));
        assert!(matches!(
            monitor.resolve("CA-missing", "x"),
            Err(ComplianceError::AlertNotFound(_))
        ));

        assert_eq!(monitor.alerts().len(), 1);
        assert!(monitor.active_alerts().is_empty());
    }
}
