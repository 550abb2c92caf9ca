//! Progress rendering for the CLI
//!
//! The folder size is unknown until the listing ends, so the run is shown as a
//! spinner carrying the running counters rather than a bounded bar.

use animeshot_core::progress::ProgressUpdate;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;
use std::time::Duration;
use tokio::sync::mpsc;

/// Render progress updates from a channel until every sender is gone
pub async fn render_progress(mut rx: mpsc::Receiver<ProgressUpdate>) {
    let mut renderer = ProgressRenderer::new();

    while let Some(update) = rx.recv().await {
        renderer.handle_update(update);
    }

    renderer.finish();
}

/// Progress renderer that manages the run display
pub struct ProgressRenderer {
    batch_spinner: Option<ProgressBar>,
    last_counts: Option<String>,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self {
            batch_spinner: None,
            last_counts: None,
        }
    }

    /// Handle a progress update
    pub fn handle_update(&mut self, update: ProgressUpdate) {
        match update {
            ProgressUpdate::BatchProgress {
                discovered,
                processed,
                renamed,
                failed,
                skipped,
                current_file,
            } => {
                let counts = format!(
                    "{discovered} seen | {processed} processed | {renamed} renamed | {failed} failed | {skipped} skipped"
                );
                self.update_batch_progress(counts, current_file);
            }

            ProgressUpdate::ItemStage {
                source_id,
                name,
                stage,
            } => {
                debug!("{source_id}: {stage}");
                if let Some(spinner) = &self.batch_spinner {
                    spinner.set_message(format!("{} {}", stage.yellow(), name.cyan()));
                }
            }

            ProgressUpdate::Status { message } => self.show_status(&message),
        }
    }

    fn update_batch_progress(&mut self, counts: String, current_file: Option<String>) {
        let spinner = self.batch_spinner.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::default_spinner()
                .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏ ")
                .template("{spinner:.cyan} [{elapsed_precise}] {prefix}\n  {msg}")
            {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });

        spinner.set_prefix(counts.clone());
        if let Some(file) = current_file {
            spinner.set_message(format!("{} {}", "done".green(), file.cyan()));
        }
        self.last_counts = Some(counts);
    }

    fn show_status(&self, message: &str) {
        match &self.batch_spinner {
            Some(spinner) => spinner.println(format!("{} {}", "→".green(), message)),
            None => eprintln!("{} {}", "→".green(), message),
        }
    }

    /// Finish the display, leaving the final counters on screen
    pub fn finish(self) {
        if let Some(spinner) = self.batch_spinner {
            let counts = self.last_counts.unwrap_or_default();
            spinner.finish_with_message(format!("{} {}", "✓".green(), counts));
        }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}
