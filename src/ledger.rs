use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Terminal state for one file in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Converted { bytes_saved: i64 },
    MetadataRepaired { fields: Vec<String> },
    Rejected { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct LedgerEntry {
    pub path: PathBuf,
    pub outcome: Outcome,
}

/// Append-only record of per-file outcomes for one batch run. Appends are
/// serialized through a mutex so a worker pool can share one ledger.
#[derive(Debug, Default)]
pub struct RunLedger {
    entries: Mutex<Vec<LedgerEntry>>,
}

impl RunLedger {
    pub fn record(&self, path: PathBuf, outcome: Outcome) {
        let mut entries = self.entries.lock().expect("ledger poisoned");
        entries.push(LedgerEntry { path, outcome });
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.lock().expect("ledger poisoned").clone()
    }

    pub fn summarize(&self, started_at: DateTime<Utc>, elapsed: Duration) -> RunSummary {
        let entries = self.entries.lock().expect("ledger poisoned");
        let mut summary = RunSummary {
            started_at,
            elapsed_secs: elapsed.as_secs_f64(),
            scanned: entries.len(),
            ..RunSummary::default()
        };
        for entry in entries.iter() {
            match &entry.outcome {
                Outcome::Skipped => summary.skipped += 1,
                Outcome::Converted { bytes_saved } => {
                    summary.converted += 1;
                    summary.bytes_saved += bytes_saved;
                }
                Outcome::MetadataRepaired { .. } => summary.repaired += 1,
                Outcome::Rejected { reason } => {
                    summary.rejected += 1;
                    summary.failures.push(FailureNote {
                        path: entry.path.clone(),
                        reason: reason.clone(),
                    });
                }
                Outcome::Failed { reason } => {
                    summary.failed += 1;
                    summary.failures.push(FailureNote {
                        path: entry.path.clone(),
                        reason: reason.clone(),
                    });
                }
            }
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureNote {
    pub path: PathBuf,
    pub reason: String,
}

/// The one aggregate report a batch run produces; serialized as-is for the
/// notification endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub scanned: usize,
    pub skipped: usize,
    pub converted: usize,
    pub repaired: usize,
    pub rejected: usize,
    pub failed: usize,
    pub bytes_saved: i64,
    pub failures: Vec<FailureNote>,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            elapsed_secs: 0.0,
            scanned: 0,
            skipped: 0,
            converted: 0,
            repaired: 0,
            rejected: 0,
            failed: 0,
            bytes_saved: 0,
            failures: Vec::new(),
        }
    }
}

impl RunSummary {
    pub fn headline(&self) -> String {
        format!(
            "scanned {} files: {} converted, {} repaired, {} skipped, {} rejected, {} failed; saved {:.2} MiB in {:.1}s",
            self.scanned,
            self.converted,
            self.repaired,
            self.skipped,
            self.rejected,
            self.failed,
            self.bytes_saved as f64 / (1024.0 * 1024.0),
            self.elapsed_secs,
        )
    }
}
