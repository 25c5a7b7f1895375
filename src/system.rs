//! Compliance Audit System
//!
//! Facade wiring the ledger, alert monitor and report generator together.
//! This is the surface external collaborators call into.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

use crate::audit::entry::{AuditEntry, EventDetails, NewEvent};
use crate::audit::export::JsonlExporter;
use crate::audit::ledger::AuditLedger;
use crate::audit::verify::IntegrityReport;
use crate::config::AuditConfig;
use crate::crypto::signatures::IntegritySigner;
use crate::error::ComplianceError;
use crate::monitor::{AlertMonitor, ComplianceAlert, RealTimeMetrics};
use crate::report::{ComplianceReport, ReportGenerator, ReportType};

pub const TAKEDOWN_FRAMEWORK: &str = "DMCA 512(c)";
pub const COUNTER_NOTICE_FRAMEWORK: &str = "DMCA 512(g)";
pub const COUNTER_NOTICE_WAITING_DAYS: u32 = 14;

pub struct ComplianceAuditSystem {
    config: Arc<AuditConfig>,
    ledger: AuditLedger,
    monitor: Arc<AlertMonitor>,
    reports: ReportGenerator,
}

impl ComplianceAuditSystem {
    /// Build the system from configuration.
    ///
    /// Loads the signing key from `signing_key_path` when set, otherwise
    /// generates an ephemeral one.
    pub fn new(config: AuditConfig) -> Result<Self, ComplianceError> {
        let signer = match &config.signing_key_path {
            Some(path) => IntegritySigner::from_key_file(path)?,
            None => IntegritySigner::generate(),
        };
        Self::with_signer(config, signer)
    }

    pub fn with_signer(config: AuditConfig, signer: IntegritySigner) -> Result<Self, ComplianceError> {
        config.validate()?;
        let config = Arc::new(config);

        let monitor = Arc::new(AlertMonitor::new(&config));
        let mut ledger = AuditLedger::new(config.clone(), Arc::new(signer));

        if let Some(path) = &config.export_path {
            let exporter = JsonlExporter::create(path.clone())?;
            info!("Mirroring audit entries to {:?}", exporter.path());
            ledger = ledger.with_observer(Arc::new(exporter));
        }
        ledger = ledger.with_observer(monitor.clone());

        let reports = ReportGenerator::new(config.clone());

        info!(
            "Compliance audit system ready (jurisdiction: {}, cryptographic proof required: {})",
            config.jurisdiction, config.require_cryptographic_proof
        );

        Ok(Self {
            config,
            ledger,
            monitor,
            reports,
        })
    }

    /// Record a compliance event with default result and no processing time.
    pub fn log_event(
        &self,
        event_type: &str,
        actor_id: &str,
        target_id: &str,
        action: &str,
        details: EventDetails,
    ) -> Result<AuditEntry, ComplianceError> {
        self.record(NewEvent::new(event_type, actor_id, target_id, action, details))
    }

    pub fn record(&self, event: NewEvent) -> Result<AuditEntry, ComplianceError> {
        self.ledger.append(event)
    }

    pub fn log_dmca_takedown(
        &self,
        takedown_id: &str,
        descriptor_cid: &str,
        requestor_email: &str,
        copyright_work: &str,
    ) -> Result<AuditEntry, ComplianceError> {
        let details = EventDetails::Takedown {
            takedown_id: takedown_id.to_string(),
            requestor_email: requestor_email.to_string(),
            copyright_work: copyright_work.to_string(),
            legal_framework: TAKEDOWN_FRAMEWORK.to_string(),
        };
        self.log_event("dmca_takedown", "", descriptor_cid, "descriptor_blacklisted", details)
    }

    pub fn log_counter_notice(
        &self,
        counter_notice_id: &str,
        descriptor_cid: &str,
        user_id: &str,
        reinstatement_date: DateTime<Utc>,
    ) -> Result<AuditEntry, ComplianceError> {
        let details = EventDetails::CounterNotice {
            counter_notice_id: counter_notice_id.to_string(),
            reinstatement_date,
            legal_framework: COUNTER_NOTICE_FRAMEWORK.to_string(),
            waiting_period_days: COUNTER_NOTICE_WAITING_DAYS,
        };
        self.log_event(
            "dmca_counter_notice",
            user_id,
            descriptor_cid,
            "counter_notice_submitted",
            details,
        )
    }

    pub fn log_reinstatement(
        &self,
        descriptor_cid: &str,
        user_id: &str,
        reason: &str,
    ) -> Result<AuditEntry, ComplianceError> {
        let details = EventDetails::Reinstatement {
            reason: reason.to_string(),
            legal_framework: COUNTER_NOTICE_FRAMEWORK.to_string(),
            reinstatement_type: "automatic".to_string(),
        };
        self.log_event(
            "dmca_reinstatement",
            user_id,
            descriptor_cid,
            "descriptor_reinstated",
            details,
        )
    }

    /// Generate a report over entries stamped in `[start, end)`.
    pub fn generate_report(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        report_type: &str,
    ) -> Result<ComplianceReport, ComplianceError> {
        let report_type: ReportType = report_type.parse()?;
        if start >= end {
            return Err(ComplianceError::invalid_time_range(start, end));
        }

        let entries = self.ledger.snapshot(start, end);
        let integrity = report_type
            .includes_integrity()
            .then(|| self.ledger.verify_integrity());

        self.reports.generate(
            report_type,
            start,
            end,
            &entries,
            integrity,
            self.monitor.active_alerts(),
        )
    }

    pub fn verify_integrity(&self) -> IntegrityReport {
        self.ledger.verify_integrity()
    }

    pub fn snapshot(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<AuditEntry> {
        self.ledger.snapshot(start, end)
    }

    pub fn alerts(&self) -> Vec<ComplianceAlert> {
        self.monitor.alerts()
    }

    pub fn active_alerts(&self) -> Vec<ComplianceAlert> {
        self.monitor.active_alerts()
    }

    pub fn resolve_alert(&self, alert_id: &str, resolution: &str) -> Result<ComplianceAlert, ComplianceError> {
        self.monitor.resolve(alert_id, resolution)
    }

    pub fn metrics(&self) -> RealTimeMetrics {
        self.monitor.metrics()
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn ledger(&self) -> &AuditLedger {
        &self.ledger
    }
}
