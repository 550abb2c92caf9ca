//! Batch processing of a screenshot folder
//!
//! Streams the folder listing lazily, skips files that already have a terminal
//! record, and runs the download, recognize, rename and persist pipeline for the
//! rest with bounded concurrency. An item only counts as done once its record is
//! written, so the record store is always a valid resume point.

use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::{Error, PersistenceError, RecognitionError, Result};
use crate::models::{ImageRecord, RecordStatus};
use crate::naming::{ProcessedName, compose_filename, extension_of, parse_processed_name};
use crate::persistence::PersistenceClient;
use crate::progress::{ProgressProvider, ProgressUpdate};
use crate::recognition::{Identification, RecognitionService};
use crate::retry::RetryPolicy;
use crate::storage::{FileFilter, FileRef, StorageClient, list_files};
use futures::stream::StreamExt;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Counters of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Files returned by the listing
    pub seen: usize,
    /// Files that went through the pipeline
    pub processed: usize,
    pub recognized: usize,
    pub unrecognized: usize,
    pub renamed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub elapsed_secs: u64,
}

impl RunStats {
    /// Counters to continue from after an interrupted run
    ///
    /// `seen` and `skipped` describe a single listing pass and start over.
    pub fn resumed_from(previous: &RunStats) -> Self {
        Self {
            seen: 0,
            skipped: 0,
            ..*previous
        }
    }

    /// Renamed share of processed files, 0 when nothing was processed
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            0.0
        } else {
            self.renamed as f64 / self.processed as f64
        }
    }

    /// Elapsed time as `Hh Mm`
    pub fn format_elapsed(&self) -> String {
        let minutes = self.elapsed_secs / 60;
        format!("{}h {}m", minutes / 60, minutes % 60)
    }
}

/// Result of [`BatchProcessor::run`]
#[derive(Debug, Clone)]
pub struct RunReport {
    pub stats: RunStats,
    /// The run stopped on a shutdown signal before the listing was exhausted
    pub interrupted: bool,
    pub dry_run: bool,
    /// Wall time of this invocation only
    pub elapsed: Duration,
}

/// Batch settings
#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub folder_id: String,
    /// Items in flight at once
    pub concurrency: usize,
    /// Recognize and log the planned names without renaming or writing records
    pub dry_run: bool,
    /// Reprocess files whose record is `failed`
    pub rescan_failed: bool,
    /// Retries for listing, download and rename
    pub storage_retry: RetryPolicy,
    /// Retries for record writes; exhaustion aborts the run
    pub persistence_retry: RetryPolicy,
    pub filter: FileFilter,
}

impl BatchConfig {
    pub fn new(folder_id: impl Into<String>) -> Self {
        Self {
            folder_id: folder_id.into(),
            concurrency: 1,
            dry_run: false,
            rescan_failed: false,
            storage_retry: RetryPolicy::default(),
            persistence_retry: RetryPolicy::default(),
            filter: FileFilter::default(),
        }
    }
}

/// What to do with a listed file
enum Work {
    Skip(FileRef, &'static str),
    Backfill(FileRef, ProcessedName),
    Process(FileRef, Option<RecordStatus>),
}

/// How an item ended
enum ItemOutcome {
    Skipped,
    Completed {
        record: ImageRecord,
        recognized: bool,
    },
}

struct ItemResult {
    file: FileRef,
    outcome: ItemOutcome,
}

/// Drives storage, recognition and persistence over one folder
pub struct BatchProcessor {
    storage: Arc<dyn StorageClient>,
    persistence: Arc<dyn PersistenceClient>,
    recognition: Arc<RecognitionService>,
    config: BatchConfig,
    progress: Arc<dyn ProgressProvider>,
    checkpoints: Option<CheckpointStore>,
}

impl BatchProcessor {
    pub fn new(
        storage: Arc<dyn StorageClient>,
        persistence: Arc<dyn PersistenceClient>,
        recognition: Arc<RecognitionService>,
        config: BatchConfig,
        progress: Arc<dyn ProgressProvider>,
        checkpoints: Option<CheckpointStore>,
    ) -> Self {
        Self {
            storage,
            persistence,
            recognition,
            config,
            progress,
            checkpoints,
        }
    }

    /// Process the folder until the listing is exhausted or `shutdown` resolves
    ///
    /// `resume` carries the counters of an interrupted run forward. Items still
    /// in flight when `shutdown` fires are dropped before their record is
    /// written.
    pub async fn run(
        &self,
        resume: Option<RunStats>,
        shutdown: impl Future<Output = ()>,
    ) -> Result<RunReport> {
        let start = Instant::now();
        let mut stats = resume.as_ref().map(RunStats::resumed_from).unwrap_or_default();
        let base_elapsed = stats.elapsed_secs;

        let (processed, attempts) = self
            .config
            .persistence_retry
            .execute("load processed records", || {
                self.persistence.list_processed_ids()
            })
            .await;
        let processed = processed?;
        info!(
            "Starting run on folder {} ({} known records, {} load attempt(s){})",
            self.config.folder_id,
            processed.len(),
            attempts,
            if self.config.dry_run { ", dry run" } else { "" }
        );

        let listing = list_files(
            Arc::clone(&self.storage),
            self.config.folder_id.clone(),
            self.config.storage_retry,
        );
        // Ids handled in this run; a store may list the same file again after a rename
        let claimed = Mutex::new(HashSet::new());
        let mut results = listing
            .map(|file| {
                let processed = &processed;
                let claimed = &claimed;
                async move {
                    let work = self.classify(file?, processed, claimed);
                    self.handle(work).await
                }
            })
            .buffer_unordered(self.config.concurrency.max(1));

        tokio::pin!(shutdown);
        let mut interrupted = false;
        let mut last_committed: Option<String> = None;

        loop {
            let next = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Shutdown requested, stopping after {} processed item(s)", stats.processed);
                    interrupted = true;
                    break;
                }
                next = results.next() => next,
            };

            let Some(result) = next else {
                break;
            };
            stats.elapsed_secs = base_elapsed + start.elapsed().as_secs();

            let item = match result {
                Ok(item) => item,
                Err(e) => {
                    // Listing failures and exhausted record writes end the run
                    self.save_checkpoint(&stats, last_committed.clone()).await;
                    return Err(e);
                }
            };

            stats.seen += 1;
            match item.outcome {
                ItemOutcome::Skipped => stats.skipped += 1,
                ItemOutcome::Completed { record, recognized } => {
                    stats.processed += 1;
                    if recognized {
                        stats.recognized += 1;
                    }
                    match record.status {
                        RecordStatus::Renamed => stats.renamed += 1,
                        RecordStatus::Unrecognized => stats.unrecognized += 1,
                        RecordStatus::Failed => stats.failed += 1,
                        RecordStatus::Pending | RecordStatus::Recognized => {}
                    }
                    last_committed = Some(record.source_id.clone());
                    self.save_checkpoint(&stats, last_committed.clone()).await;
                }
            }

            self.progress.report(ProgressUpdate::BatchProgress {
                discovered: stats.seen,
                processed: stats.processed,
                renamed: stats.renamed,
                failed: stats.failed,
                skipped: stats.skipped,
                current_file: Some(item.file.name.clone()),
            });
        }

        drop(results);
        stats.elapsed_secs = base_elapsed + start.elapsed().as_secs();

        if interrupted {
            self.save_checkpoint(&stats, last_committed).await;
        } else if let Some(store) = &self.checkpoints
            && let Err(e) = store.clear().await
        {
            warn!("Failed to remove checkpoint {}: {e}", store.path().display());
        }

        info!(
            "Run {}: seen {}, processed {}, recognized {}, renamed {}, unrecognized {}, failed {}, skipped {}, success rate {:.1}%, elapsed {}",
            if interrupted { "interrupted" } else { "complete" },
            stats.seen,
            stats.processed,
            stats.recognized,
            stats.renamed,
            stats.unrecognized,
            stats.failed,
            stats.skipped,
            stats.success_rate() * 100.0,
            stats.format_elapsed()
        );
        self.progress.complete();

        Ok(RunReport {
            stats,
            interrupted,
            dry_run: self.config.dry_run,
            elapsed: start.elapsed(),
        })
    }

    fn classify(
        &self,
        file: FileRef,
        processed: &HashMap<String, RecordStatus>,
        claimed: &Mutex<HashSet<String>>,
    ) -> Work {
        let first_sighting = claimed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file.id.clone());
        if !first_sighting {
            return Work::Skip(file, "already handled in this run");
        }

        let prior = processed.get(&file.id).copied();

        if let Some(status) = prior
            && status.is_terminal()
            && !(status == RecordStatus::Failed && self.config.rescan_failed)
        {
            return Work::Skip(file, "already processed");
        }

        if !self.config.filter.should_include(&file.name) {
            return Work::Skip(file, "excluded by filter");
        }

        if let Some(parsed) = parse_processed_name(&file.name) {
            if self.storage.has_stable_ids() && !self.config.dry_run {
                return Work::Backfill(file, parsed);
            }
            return Work::Skip(file, "already renamed");
        }

        Work::Process(file, prior)
    }

    async fn handle(&self, work: Work) -> Result<ItemResult> {
        match work {
            Work::Skip(file, reason) => {
                debug!("Skipping {} ({reason})", file.name);
                Ok(ItemResult {
                    file,
                    outcome: ItemOutcome::Skipped,
                })
            }
            Work::Backfill(file, parsed) => {
                let record = ImageRecord::backfilled(&file.id, &file.name, &parsed);
                self.persist(&record).await?;
                info!("Backfilled record for already renamed {}", file.name);
                Ok(ItemResult {
                    file,
                    outcome: ItemOutcome::Skipped,
                })
            }
            Work::Process(file, prior) => {
                let (record, recognized) = self.process(&file, prior).await?;
                Ok(ItemResult {
                    file,
                    outcome: ItemOutcome::Completed { record, recognized },
                })
            }
        }
    }

    fn stage(&self, file: &FileRef, stage: &str) {
        self.progress.report(ProgressUpdate::ItemStage {
            source_id: file.id.clone(),
            name: file.name.clone(),
            stage: stage.to_string(),
        });
    }

    async fn initial_record(&self, file: &FileRef, prior: Option<RecordStatus>) -> ImageRecord {
        if prior == Some(RecordStatus::Failed) {
            match self.persistence.get(&file.id).await {
                Ok(Some(mut record)) => match record.reset_for_rescan() {
                    Ok(()) => {
                        record.original_name = file.name.clone();
                        return record;
                    }
                    Err(e) => warn!("Could not reset failed record for {}: {e}", file.name),
                },
                Ok(None) => {}
                Err(e) => warn!("Could not load failed record for {}: {e}", file.name),
            }
        }
        ImageRecord::new(&file.id, &file.name)
    }

    /// Run the pipeline for one file and write its final record
    async fn process(
        &self,
        file: &FileRef,
        prior: Option<RecordStatus>,
    ) -> Result<(ImageRecord, bool)> {
        let mut record = self.initial_record(file, prior).await;

        self.stage(file, "download");
        let (download, _) = self
            .config
            .storage_retry
            .execute("download", || self.storage.download(file))
            .await;
        let image = match download {
            Ok(image) => image,
            Err(e) => {
                warn!("{}: download failed: {e}", file.name);
                record.mark_failed(&e)?;
                return self.finish(record, false).await;
            }
        };

        self.stage(file, "recognize");
        let outcome = match self.recognition.identify(&image).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("{}: recognition failed: {e}", file.name);
                if let Error::Recognition(RecognitionError::Unavailable { attempts, .. }) = &e {
                    record.attempts += *attempts;
                }
                record.mark_failed(&e)?;
                return self.finish(record, false).await;
            }
        };
        record.attempts += outcome.attempts;

        let scene = match outcome.identification {
            Identification::Match(scene) => scene,
            Identification::Unrecognized { reason } => {
                info!("{}: not recognized ({reason})", file.name);
                record.mark_unrecognized(reason)?;
                return self.finish(record, false).await;
            }
        };
        record.mark_recognized(&scene)?;

        let title = record.recognized_title.clone().unwrap_or_default();
        let new_name = compose_filename(
            &title,
            &scene.episode,
            &scene.timestamp,
            extension_of(&file.name).as_deref(),
        );

        if self.config.dry_run {
            info!("{} -> {new_name} (dry run)", file.name);
            return Ok((record, true));
        }

        if new_name != file.name {
            self.stage(file, "rename");
            let (renamed, _) = self
                .config
                .storage_retry
                .execute("rename", || self.storage.rename(&file.id, &new_name))
                .await;
            if let Err(e) = renamed {
                warn!("{}: rename to {new_name} failed: {e}", file.name);
                record.mark_failed(&e)?;
                return self.finish(record, true).await;
            }
        }
        record.mark_renamed(&new_name)?;
        info!(
            "{} -> {new_name} (similarity {:.1}%)",
            file.name,
            scene.similarity * 100.0
        );

        let result = self.finish(record, true).await?;
        if let Err(e) = self.persistence.update_title_index(&title).await {
            warn!("Failed to update title index for '{title}': {e}");
        }
        Ok(result)
    }

    /// Write the final record unless this is a dry run
    async fn finish(&self, record: ImageRecord, recognized: bool) -> Result<(ImageRecord, bool)> {
        if !self.config.dry_run {
            self.persist(&record).await?;
        }
        Ok((record, recognized))
    }

    async fn persist(&self, record: &ImageRecord) -> Result<()> {
        let (result, attempts) = self
            .config
            .persistence_retry
            .execute("save record", || self.persistence.upsert(record))
            .await;
        result.map_err(|e| {
            PersistenceError::exhausted(&record.source_id, attempts, e.to_string()).into()
        })
    }

    async fn save_checkpoint(&self, stats: &RunStats, last_committed: Option<String>) {
        if self.config.dry_run {
            return;
        }
        let Some(store) = &self.checkpoints else {
            return;
        };

        let mut checkpoint = Checkpoint::new(&self.config.folder_id, *stats);
        checkpoint.last_committed = last_committed;
        if let Err(e) = store.save(&checkpoint).await {
            warn!("Failed to write checkpoint {}: {e}", store.path().display());
        }
    }
}
