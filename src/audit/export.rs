//! Append observers
//!
//! Observers see every entry in append order, right after it is recorded.
//! `JsonlExporter` mirrors the ledger to an append-only JSONL file.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::audit::entry::AuditEntry;
use crate::error::ComplianceError;

pub trait AppendObserver: Send + Sync {
    fn name(&self) -> &str;

    /// Called with the ledger's write lock held. Failures are logged by the
    /// ledger; the entry stays recorded.
    fn on_append(&self, entry: &AuditEntry) -> Result<(), ComplianceError>;
}

/// Writes one JSON entry per line
pub struct JsonlExporter {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonlExporter {
    pub fn create(path: impl Into<PathBuf>) -> Result<Self, ComplianceError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ComplianceError::ExportError(format!("Failed to create export directory: {}", e))
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| ComplianceError::ExportError(format!("Failed to open {:?}: {}", path, e)))?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AppendObserver for JsonlExporter {
    fn name(&self) -> &str {
        "jsonl-exporter"
    }

    fn on_append(&self, entry: &AuditEntry) -> Result<(), ComplianceError> {
        let json = serde_json::to_string(entry)?;

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{}", json)
            .map_err(|e| ComplianceError::ExportError(format!("Failed to write entry: {}", e)))?;
        file.flush()
            .map_err(|e| ComplianceError::ExportError(format!("Failed to flush export: {}", e)))?;

        debug!("Exported audit entry {} to {:?}", entry.entry_id, self.path);
        Ok(())
    }
}
