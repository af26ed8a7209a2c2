use crate::config::Config;
use crate::ledger::{Outcome, RunLedger, RunSummary};
use crate::notifier::Notifier;
use crate::policy::{self, ActionDecision};
use crate::probe::{AudioProbe, FileRecord};
use crate::resolver;
use crate::tags;
use crate::transcoder::{CodecEngine, Transcoder};
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;
use walkdir::WalkDir;

/// Cooperative stop signal, checked between files. In-flight work is
/// allowed to finish; nothing already converted is rolled back.
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

pub struct BatchOrchestrator {
    config: Config,
    transcoder: Transcoder,
    notifier: Box<dyn Notifier>,
}

impl BatchOrchestrator {
    pub fn new(config: Config, engine: Box<dyn CodecEngine>, notifier: Box<dyn Notifier>) -> Self {
        let transcoder = Transcoder::new(engine, config.target);
        Self {
            config,
            transcoder,
            notifier,
        }
    }

    /// Walks the configured roots and runs every candidate file through
    /// probe, decision and conversion/repair. One file's failure never
    /// stops the batch; only an invalid configuration aborts the run.
    pub fn run(&self, cancel: &CancelFlag) -> Result<RunSummary> {
        self.config.validate().context("invalid configuration")?;
        let started = Instant::now();
        let started_at = Utc::now();
        let files = self.discover();
        tracing::info!(
            files = files.len(),
            jobs = self.config.effective_jobs(),
            "starting batch run"
        );

        let ledger = RunLedger::default();
        let bar = ProgressBar::new(files.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{bar:40} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );

        let jobs = self.config.effective_jobs();
        if jobs <= 1 || files.len() <= 1 {
            for path in &files {
                if cancel.is_cancelled() {
                    tracing::info!("cancel requested; stopping dispatch");
                    break;
                }
                self.process_file(path, &ledger);
                bar.inc(1);
            }
        } else {
            let (tx, rx) = crossbeam_channel::unbounded::<PathBuf>();
            thread::scope(|scope| {
                for _ in 0..jobs.min(files.len()) {
                    let rx = rx.clone();
                    let ledger = &ledger;
                    let bar = &bar;
                    scope.spawn(move || {
                        for path in rx.iter() {
                            if cancel.is_cancelled() {
                                break;
                            }
                            self.process_file(&path, ledger);
                            bar.inc(1);
                        }
                    });
                }
                drop(rx);
                for path in &files {
                    if cancel.is_cancelled() {
                        tracing::info!("cancel requested; stopping dispatch");
                        break;
                    }
                    let _ = tx.send(path.clone());
                }
                drop(tx);
            });
        }
        bar.finish_and_clear();

        let summary = ledger.summarize(started_at, started.elapsed());
        tracing::info!(
            scanned = summary.scanned,
            converted = summary.converted,
            repaired = summary.repaired,
            skipped = summary.skipped,
            rejected = summary.rejected,
            failed = summary.failed,
            "batch run complete"
        );
        if let Err(err) = self.notifier.notify(&summary) {
            tracing::warn!(error = %err, "summary notification failed");
        }
        Ok(summary)
    }

    fn discover(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for root in &self.config.roots {
            for entry in WalkDir::new(root).follow_links(false) {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(err) => {
                        tracing::warn!(error = %err, "skipping unreadable directory entry");
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                if entry.file_name().to_string_lossy().starts_with('.') {
                    continue;
                }
                if self.config.recognizes(entry.path()) {
                    files.push(entry.into_path());
                }
            }
        }
        files.sort();
        files
    }

    fn process_file(&self, path: &Path, ledger: &RunLedger) {
        let outcome = self.outcome_for(path);
        match &outcome {
            Outcome::Skipped => tracing::debug!(path = %path.display(), "already compliant"),
            Outcome::Converted { bytes_saved } => {
                tracing::info!(path = %path.display(), bytes_saved = *bytes_saved, "converted")
            }
            Outcome::MetadataRepaired { fields } => {
                tracing::info!(path = %path.display(), fields = ?fields, "metadata repaired")
            }
            Outcome::Rejected { reason } => {
                tracing::warn!(path = %path.display(), reason = %reason, "rejected")
            }
            Outcome::Failed { reason } => {
                tracing::warn!(path = %path.display(), reason = %reason, "failed")
            }
        }
        ledger.record(path.to_path_buf(), outcome);
    }

    fn outcome_for(&self, path: &Path) -> Outcome {
        let record = match AudioProbe.probe(path) {
            Ok(record) => record,
            Err(err) => {
                return Outcome::Rejected {
                    reason: err.to_string(),
                };
            }
        };
        match policy::decide(&record, &self.config.target) {
            ActionDecision::Skip => Outcome::Skipped,
            ActionDecision::Reject { reason } => Outcome::Rejected { reason },
            ActionDecision::RepairTags => self.repair_tags(&record),
            ActionDecision::Convert { .. } => self.convert(&record, false),
            ActionDecision::ConvertAndRepair { .. } => self.convert(&record, true),
        }
    }

    /// Metadata-only path for files whose audio is already compliant. A
    /// file nothing can be inferred for counts as skipped, which is what
    /// keeps a second run over the same tree change-free.
    fn repair_tags(&self, record: &FileRecord) -> Outcome {
        let diff = resolver::resolve(
            &record.tags,
            self.inference_path(&record.path),
            &self.config.inference,
        );
        if diff.is_empty() {
            return Outcome::Skipped;
        }
        match tags::write_missing(&record.path, &diff) {
            Ok(fields) if fields.is_empty() => Outcome::Skipped,
            Ok(fields) => Outcome::MetadataRepaired { fields },
            Err(err) => Outcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    fn convert(&self, record: &FileRecord, repair: bool) -> Outcome {
        match self.transcoder.transcode(&record.path) {
            Ok(conversion) => {
                if repair {
                    let diff = resolver::resolve(
                        &record.tags,
                        self.inference_path(&record.path),
                        &self.config.inference,
                    );
                    if !diff.is_empty() {
                        if let Err(err) = tags::write_missing(&conversion.output, &diff) {
                            tracing::warn!(
                                path = %conversion.output.display(),
                                error = %err,
                                "converted but tag repair failed"
                            );
                        }
                    }
                }
                Outcome::Converted {
                    bytes_saved: conversion.bytes_saved,
                }
            }
            Err(err) => Outcome::Failed {
                reason: err.to_string(),
            },
        }
    }

    // Inference works on root-relative paths so a library root like
    // "music/" is never mistaken for an artist directory.
    fn inference_path<'a>(&self, path: &'a Path) -> &'a Path {
        for root in &self.config.roots {
            if let Ok(stripped) = path.strip_prefix(root) {
                return stripped;
            }
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EncodeTarget;
    use crate::probe::Codec;
    use crate::transcoder::EngineError;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeEngine;

    impl CodecEngine for FakeEngine {
        fn encode(
            &self,
            _source: &Path,
            dest: &Path,
            _target: &EncodeTarget,
        ) -> Result<(), EngineError> {
            fs::write(dest, vec![1u8; 64]).expect("fake engine write");
            Ok(())
        }
    }

    #[derive(Clone, Default)]
    struct CapturingNotifier {
        seen: Arc<Mutex<Vec<RunSummary>>>,
    }

    impl Notifier for CapturingNotifier {
        fn notify(&self, summary: &RunSummary) -> Result<()> {
            self.seen.lock().expect("notifier lock").push(summary.clone());
            Ok(())
        }
    }

    fn write_wav(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for _ in 0..16_000 {
            writer.write_sample(0i16).expect("write sample");
        }
        writer.finalize().expect("finalize wav");
    }

    fn config_for(root: &Path, jobs: usize) -> Config {
        let mut config = Config::default();
        config.roots = vec![root.to_path_buf()];
        config.jobs = Some(jobs);
        config
    }

    fn orchestrator_with(config: Config, notifier: CapturingNotifier) -> BatchOrchestrator {
        BatchOrchestrator::new(config, Box::new(FakeEngine), Box::new(notifier))
    }

    #[test]
    fn corrupt_file_never_aborts_the_batch() {
        let dir = tempdir().expect("tempdir");
        write_wav(&dir.path().join("one.wav"));
        write_wav(&dir.path().join("two.wav"));
        fs::write(dir.path().join("bad.flac"), b"fLaC nonsense").expect("write bad file");

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config_for(dir.path(), 1), notifier.clone());
        let summary = orchestrator.run(&CancelFlag::default()).expect("run");

        assert_eq!(summary.scanned, 3);
        assert_eq!(summary.converted, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.failures.len(), 1);
        assert!(
            summary.failures[0]
                .path
                .to_string_lossy()
                .ends_with("bad.flac")
        );
    }

    #[test]
    fn parallel_run_records_every_file() {
        let dir = tempdir().expect("tempdir");
        for i in 0..6 {
            write_wav(&dir.path().join(format!("track{i}.wav")));
        }

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config_for(dir.path(), 4), notifier.clone());
        let summary = orchestrator.run(&CancelFlag::default()).expect("run");

        assert_eq!(summary.scanned, 6);
        assert_eq!(summary.converted, 6);
        assert_eq!(notifier.seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn cancelled_run_dispatches_nothing() {
        let dir = tempdir().expect("tempdir");
        write_wav(&dir.path().join("one.wav"));
        write_wav(&dir.path().join("two.wav"));

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config_for(dir.path(), 1), notifier.clone());
        let cancel = CancelFlag::default();
        cancel.cancel();
        let summary = orchestrator.run(&cancel).expect("run");

        assert_eq!(summary.scanned, 0);
        assert!(dir.path().join("one.wav").exists());
        assert_eq!(notifier.seen.lock().expect("lock").len(), 1);
    }

    #[test]
    fn notifier_gets_exactly_one_summary_per_run() {
        let dir = tempdir().expect("tempdir");
        write_wav(&dir.path().join("one.wav"));

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config_for(dir.path(), 1), notifier.clone());
        let summary = orchestrator.run(&CancelFlag::default()).expect("run");

        let seen = notifier.seen.lock().expect("lock");
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].scanned, summary.scanned);
        assert_eq!(seen[0].converted, summary.converted);
    }

    #[test]
    fn compliant_file_gets_tags_repaired_then_skips_on_second_run() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("Artist - Song.wav");
        write_wav(&path);

        // 16 kHz mono 16-bit PCM probes at exactly 256 kbps, so a wav
        // target makes the file compliant and exercises the
        // metadata-only path end to end.
        let mut config = config_for(dir.path(), 1);
        config.target = EncodeTarget {
            codec: Codec::Wav,
            bitrate_kbps: 256,
        };

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config, notifier.clone());
        let first = orchestrator.run(&CancelFlag::default()).expect("first run");
        assert_eq!(first.repaired, 1);
        assert_eq!(first.converted, 0);

        let record = AudioProbe.probe(&path).expect("probe after repair");
        assert_eq!(record.tags.artist.as_deref(), Some("Artist"));
        assert_eq!(record.tags.title.as_deref(), Some("Song"));

        let second = orchestrator.run(&CancelFlag::default()).expect("second run");
        assert_eq!(second.repaired, 0);
        assert_eq!(second.skipped, 1);
    }

    #[test]
    fn unsupported_container_is_rejected_not_fatal() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("clip.wma"), b"asf-ish bytes").expect("write wma");
        write_wav(&dir.path().join("fine.wav"));

        let notifier = CapturingNotifier::default();
        let orchestrator = orchestrator_with(config_for(dir.path(), 1), notifier.clone());
        let summary = orchestrator.run(&CancelFlag::default()).expect("run");

        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.converted, 1);
        assert!(dir.path().join("clip.wma").exists());
    }
}
