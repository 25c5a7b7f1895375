pub mod api;
pub mod audit;
pub mod config;
pub mod crypto;
pub mod error;
pub mod monitor;
pub mod report;
pub mod scoring;
pub mod system;

pub use audit::{AuditEntry, AuditLedger, EventDetails, NewEvent};
pub use config::AuditConfig;
pub use error::{ComplianceError, ComplianceResult};
pub use system::ComplianceAuditSystem;
