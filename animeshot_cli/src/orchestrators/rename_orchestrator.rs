//! Run command orchestrator
//!
//! Builds the storage, persistence and recognition clients from the loaded
//! configuration, drives one batch run and turns its report into a summary and
//! an exit status.

use crate::config::{AppConfig, StorageBackend};
use crate::error::{CliError, CliResult, ErrorContext};
use crate::progress::utils::format_duration_from_duration;
use crate::progress::{create_progress_infrastructure, render_progress};
use animeshot_core::error::{StorageError, ValidationError};
use animeshot_core::progress::ProgressProvider;
use animeshot_core::recognition::RecognitionCache;
use animeshot_core::{
    BatchConfig, BatchProcessor, CheckpointStore, DriveClient, DriveConfig, FileFilter,
    FirebaseClient, FirebaseConfig, LocalFolderStorage, PersistenceClient, RecognitionClient,
    RecognitionService, RetryPolicy, RunReport, RunStats, StorageClient, TraceMoeClient,
    TraceMoeConfig,
};
use colored::*;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Folders listed when the configured one cannot be used
const FOLDER_HINT_LIMIT: usize = 10;

/// Run command options
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Carry the counters of an interrupted run forward
    pub resume: bool,
    /// Reprocess items whose record is `failed`
    pub rescan_failed: bool,
    /// Recognize without renaming or writing records
    pub dry_run: bool,
    /// Extra include patterns, added to the configured ones
    pub include: Vec<String>,
    /// Extra exclude patterns, added to the configured ones
    pub exclude: Vec<String>,
    pub show_progress: bool,
}

/// Build the storage client for the configured backend
pub fn build_storage(config: &AppConfig) -> CliResult<Arc<dyn StorageClient>> {
    match config.storage.backend {
        StorageBackend::Drive => {
            let token = config
                .storage
                .access_token
                .clone()
                .filter(|t| !t.is_empty())
                .ok_or_else(|| ValidationError::missing_setting("storage.access_token"))
                .map_err(animeshot_core::Error::from)?;
            let drive = DriveClient::new(DriveConfig {
                api_base: config.storage.api_base.clone(),
                access_token: token,
                page_size: u32::try_from(config.batch.size).unwrap_or(u32::MAX),
                timeout: Duration::from_secs(config.storage.timeout_secs),
            })?;
            Ok(Arc::new(drive))
        }
        StorageBackend::Local => Ok(Arc::new(LocalFolderStorage::new(config.batch.size))),
    }
}

/// Build the record store client
pub fn build_persistence(config: &AppConfig) -> CliResult<Arc<dyn PersistenceClient>> {
    config
        .validate_persistence()
        .map_err(animeshot_core::Error::from)?;
    let database_url = config.persistence.database_url.clone().unwrap_or_default();

    let client = FirebaseClient::new(FirebaseConfig {
        database_url,
        auth_token: config.persistence.auth_token.clone(),
        timeout: Duration::from_secs(config.persistence.timeout_secs),
    })?;
    Ok(Arc::new(client))
}

/// Retry policy shared by every external call
pub fn retry_policy(config: &AppConfig) -> RetryPolicy {
    RetryPolicy::new(
        config.batch.max_retries,
        Duration::from_millis(config.batch.initial_backoff_ms),
        Duration::from_millis(config.batch.max_backoff_ms),
    )
}

/// Build the recognition service around the trace.moe client
pub fn build_recognition(config: &AppConfig) -> CliResult<Arc<RecognitionService>> {
    let settings = &config.recognition;
    let client = TraceMoeClient::new(TraceMoeConfig {
        search_url: settings.trace_moe_url.clone(),
        anilist_url: settings.anilist_url.clone(),
        api_key: settings.api_key.clone(),
        min_similarity: settings.min_similarity,
        min_request_interval: Duration::from_secs(settings.min_request_interval_secs),
        timeout: Duration::from_secs(settings.timeout_secs),
    })?;

    Ok(Arc::new(RecognitionService::new(
        Arc::new(client) as Arc<dyn RecognitionClient>,
        RecognitionCache::new(settings.cache_entries),
        retry_policy(config),
    )))
}

/// Orchestrator for the run command
pub struct RenameOrchestrator {
    config: AppConfig,
    storage: Arc<dyn StorageClient>,
    persistence: Arc<dyn PersistenceClient>,
    recognition: Arc<RecognitionService>,
    checkpoints: CheckpointStore,
}

impl RenameOrchestrator {
    /// Validate the configuration and build the production clients
    pub fn from_config(config: AppConfig) -> CliResult<Self> {
        config.validate().map_err(animeshot_core::Error::from)?;

        let storage = build_storage(&config)?;
        let persistence = build_persistence(&config)?;
        let recognition = build_recognition(&config)?;

        Ok(Self::with_clients(
            config,
            storage,
            persistence,
            recognition,
            CheckpointStore::new(crate::paths::get_checkpoint_path()),
        ))
    }

    /// Assemble an orchestrator from existing clients
    pub fn with_clients(
        config: AppConfig,
        storage: Arc<dyn StorageClient>,
        persistence: Arc<dyn PersistenceClient>,
        recognition: Arc<RecognitionService>,
        checkpoints: CheckpointStore,
    ) -> Self {
        Self {
            config,
            storage,
            persistence,
            recognition,
            checkpoints,
        }
    }

    fn folder_id(&self) -> CliResult<String> {
        self.config
            .storage
            .folder_id
            .clone()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                CliError::configuration("No folder configured")
                    .with_suggestion("Pass --folder or set storage.folder_id")
            })
    }

    async fn print_accessible_folders(&self) {
        match self.storage.list_folders(FOLDER_HINT_LIMIT).await {
            Ok(folders) if !folders.is_empty() => {
                eprintln!("{}", "Accessible folders:".bold());
                for folder in folders {
                    eprintln!("  {}  {}", folder.id.dimmed(), folder.name);
                }
            }
            Ok(_) => eprintln!("{}", "No accessible folders found".yellow()),
            Err(e) => debug!("Could not list folders: {e}"),
        }
    }

    /// Counters to start from: the checkpoint's when resuming the same folder
    async fn resume_stats(&self, folder_id: &str, resume: bool) -> Option<RunStats> {
        let checkpoint = match self.checkpoints.load().await {
            Ok(checkpoint) => checkpoint?,
            Err(e) => {
                warn!("Ignoring unreadable checkpoint: {e}");
                return None;
            }
        };

        if !resume {
            info!(
                "Found checkpoint from {}; starting fresh counters (use --resume to continue them)",
                checkpoint.updated_at
            );
            return None;
        }

        if checkpoint.folder_id != folder_id {
            warn!(
                "Checkpoint belongs to folder {}, not {folder_id}; starting fresh counters",
                checkpoint.folder_id
            );
            return None;
        }

        info!(
            "Resuming after {} (last committed: {})",
            checkpoint.updated_at,
            checkpoint.last_committed.as_deref().unwrap_or("none")
        );
        Some(checkpoint.stats)
    }

    /// Run the batch until the folder is exhausted or `shutdown` resolves
    pub async fn run(
        &self,
        options: RunOptions,
        shutdown: impl Future<Output = ()>,
    ) -> CliResult<RunReport> {
        let folder_id = self.folder_id()?;

        let folder = match self.storage.check_folder(&folder_id).await {
            Ok(folder) => folder,
            Err(e) => {
                if matches!(
                    e,
                    animeshot_core::Error::Storage(
                        StorageError::NotFound { .. } | StorageError::NotAFolder { .. }
                    )
                ) {
                    self.print_accessible_folders().await;
                }
                return Err(CliError::from(e).with_context("folder", &folder_id));
            }
        };
        debug!("Folder {} resolved to '{}'", folder.id, folder.name);

        let include: Vec<String> = self
            .config
            .batch
            .include
            .iter()
            .chain(&options.include)
            .cloned()
            .collect();
        let exclude: Vec<String> = self
            .config
            .batch
            .exclude
            .iter()
            .chain(&options.exclude)
            .cloned()
            .collect();
        let filter = FileFilter::new(&include, &exclude)?;

        let retry = retry_policy(&self.config);
        let batch_config = BatchConfig {
            folder_id: folder_id.clone(),
            concurrency: self.config.batch.concurrency,
            dry_run: options.dry_run,
            rescan_failed: options.rescan_failed,
            storage_retry: retry,
            persistence_retry: retry,
            filter,
        };

        let resume = self.resume_stats(&folder_id, options.resume).await;

        if options.dry_run {
            eprintln!(
                "{}",
                "DRY RUN - files are recognized but not renamed or recorded".yellow()
            );
        }
        eprintln!(
            "{} {} ({})",
            "Processing folder".cyan().bold(),
            folder.name.bold(),
            folder.id
        );

        let (progress, renderer) = if options.show_progress {
            let (provider, rx) = create_progress_infrastructure();
            (provider, Some(tokio::spawn(render_progress(rx))))
        } else {
            (<dyn ProgressProvider>::null(), None)
        };

        let processor = BatchProcessor::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.persistence),
            Arc::clone(&self.recognition),
            batch_config,
            Arc::clone(&progress),
            (!options.dry_run).then(|| self.checkpoints.clone()),
        );

        let result = processor.run(resume, shutdown).await;

        progress.complete();
        drop(processor);
        drop(progress);
        if let Some(handle) = renderer {
            let _ = tokio::time::timeout(Duration::from_millis(200), handle).await;
        }

        let report = result?;
        print_summary(&report);

        let tolerance = self.config.batch.failure_tolerance;
        if report.stats.failed > tolerance {
            return Err(CliError::tolerance_exceeded(report.stats.failed, tolerance));
        }

        Ok(report)
    }
}

/// Print the run summary to stderr
pub fn print_summary(report: &RunReport) {
    let stats = &report.stats;
    let heading = if report.interrupted {
        "Run interrupted".yellow().bold()
    } else if report.dry_run {
        "Dry run complete".cyan().bold()
    } else {
        "Run complete".green().bold()
    };

    eprintln!();
    eprintln!("{heading}");
    eprintln!("  Seen:          {}", stats.seen);
    eprintln!("  Processed:     {}", stats.processed);
    eprintln!("  Recognized:    {}", stats.recognized);
    eprintln!("  Renamed:       {}", stats.renamed.to_string().green());
    eprintln!("  Unrecognized:  {}", stats.unrecognized.to_string().yellow());
    eprintln!("  Failed:        {}", stats.failed.to_string().red());
    eprintln!("  Skipped:       {}", stats.skipped);
    eprintln!("  Success rate:  {:.1}%", stats.success_rate() * 100.0);
    eprintln!(
        "  Elapsed:       {} (this session {})",
        stats.format_elapsed(),
        format_duration_from_duration(report.elapsed)
    );

    if report.interrupted {
        eprintln!();
        eprintln!("Run 'animeshot run --resume' to continue.");
    }
}

/// List folders visible to the configured credentials
pub async fn list_folders(config: &AppConfig, limit: usize) -> CliResult<()> {
    let storage = build_storage(config)?;
    let folders = storage.list_folders(limit).await?;

    if folders.is_empty() {
        println!("{}", "No folders found".yellow());
        return Ok(());
    }

    let configured = config.storage.folder_id.as_deref();
    for folder in folders {
        let marker = if Some(folder.id.as_str()) == configured {
            "*".green().to_string()
        } else {
            " ".to_string()
        };
        println!("{marker} {}  {}", folder.id.dimmed(), folder.name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_from_config() {
        let mut config = AppConfig::default();
        config.batch.max_retries = 4;
        config.batch.initial_backoff_ms = 100;
        config.batch.max_backoff_ms = 1_000;

        let policy = retry_policy(&config);
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.initial_delay, Duration::from_millis(100));
        assert_eq!(policy.max_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_drive_backend_requires_token() {
        let config = AppConfig::default();
        let error = build_storage(&config).err().unwrap();
        assert_eq!(error.exit_code(), crate::error::ExitCode::Configuration);
    }

    #[test]
    fn test_local_backend_builds_without_token() {
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Local;
        assert!(build_storage(&config).is_ok());
    }

    #[test]
    fn test_persistence_requires_url() {
        let config = AppConfig::default();
        assert!(build_persistence(&config).is_err());
    }
}
