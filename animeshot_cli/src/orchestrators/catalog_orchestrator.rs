//! Read-only commands over the record store: status, titles and find

use crate::error::CliResult;
use animeshot_core::{AnimeTitleEntry, ImageRecord, PersistenceClient, RecordStatus};
use anyhow::Context;
use colored::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;
use std::sync::Arc;

/// Output format for catalog results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
    Csv,
}

/// Record counts per status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub by_status: BTreeMap<String, usize>,
}

impl StatusCounts {
    pub fn from_statuses(statuses: impl IntoIterator<Item = RecordStatus>) -> Self {
        let mut by_status: BTreeMap<String, usize> = RecordStatus::ALL
            .iter()
            .map(|status| (status.as_str().to_string(), 0))
            .collect();
        let mut total = 0;
        for status in statuses {
            *by_status.entry(status.as_str().to_string()).or_default() += 1;
            total += 1;
        }
        Self { total, by_status }
    }

    pub fn count(&self, status: RecordStatus) -> usize {
        self.by_status.get(status.as_str()).copied().unwrap_or(0)
    }
}

/// Orchestrator for the record store queries
pub struct CatalogOrchestrator {
    persistence: Arc<dyn PersistenceClient>,
}

impl CatalogOrchestrator {
    pub fn new(persistence: Arc<dyn PersistenceClient>) -> Self {
        Self { persistence }
    }

    pub async fn status_counts(&self) -> CliResult<StatusCounts> {
        let records = self.persistence.list_processed_ids().await?;
        Ok(StatusCounts::from_statuses(records.into_values()))
    }

    pub async fn status(&self, format: OutputFormat, out: &mut impl Write) -> CliResult<()> {
        let counts = self.status_counts().await?;
        write_status(out, &counts, format)?;
        Ok(())
    }

    pub async fn titles(&self, out: &mut impl Write) -> CliResult<()> {
        let titles = self.persistence.list_titles().await?;
        write_titles(out, &titles)?;
        Ok(())
    }

    pub async fn find(
        &self,
        title: &str,
        format: OutputFormat,
        out: &mut impl Write,
    ) -> CliResult<()> {
        let records = self.persistence.find_by_title(title).await?;
        write_records(out, title, &records, format)?;
        Ok(())
    }
}

pub fn write_status(
    out: &mut impl Write,
    counts: &StatusCounts,
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, counts)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            writer.write_record(["status", "count"])?;
            for (status, count) in &counts.by_status {
                let count = count.to_string();
                writer.write_record([status.as_str(), count.as_str()])?;
            }
            writer.flush()?;
        }
        OutputFormat::Human => {
            writeln!(out, "{}", "Record Status".cyan().bold())?;
            writeln!(out, "{}", "=============".cyan())?;
            for status in RecordStatus::ALL {
                let bullet = match status {
                    RecordStatus::Renamed => "●".green(),
                    RecordStatus::Failed => "●".red(),
                    RecordStatus::Unrecognized => "●".yellow(),
                    RecordStatus::Pending | RecordStatus::Recognized => "●".blue(),
                };
                writeln!(
                    out,
                    "  {bullet} {:<14}{}",
                    format!("{status}:"),
                    counts.count(status)
                )?;
            }
            writeln!(out, "  Total:          {}", counts.total)?;
        }
    }
    Ok(())
}

pub fn write_titles(out: &mut impl Write, titles: &[AnimeTitleEntry]) -> anyhow::Result<()> {
    if titles.is_empty() {
        writeln!(out, "No titles recorded yet")?;
        return Ok(());
    }
    for entry in titles {
        writeln!(
            out,
            "{}  {}",
            entry.title,
            entry.last_updated.format("%Y-%m-%d %H:%M").to_string().dimmed()
        )?;
    }
    Ok(())
}

pub fn write_records(
    out: &mut impl Write,
    title: &str,
    records: &[ImageRecord],
    format: OutputFormat,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, records)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let mut writer = csv::Writer::from_writer(out);
            for record in records {
                writer
                    .serialize(record)
                    .with_context(|| format!("Failed to write record {}", record.source_id))?;
            }
            writer.flush()?;
        }
        OutputFormat::Human => {
            if records.is_empty() {
                writeln!(out, "No records for '{title}'")?;
                return Ok(());
            }
            writeln!(
                out,
                "{} ({} record(s))",
                title.cyan().bold(),
                records.len()
            )?;
            for record in records {
                let name = record.new_name.as_deref().unwrap_or(&record.original_name);
                writeln!(
                    out,
                    "  Ep {:<4} {:<9} {:<12} {}",
                    record.episode.as_deref().unwrap_or("?"),
                    record.matched_timestamp.as_deref().unwrap_or("-"),
                    record.status.to_string(),
                    name
                )?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, episode: &str) -> ImageRecord {
        let mut record = ImageRecord::new(id, format!("{id}.jpg"));
        record.recognized_title = Some("Frieren".into());
        record.episode = Some(episode.into());
        record.matched_timestamp = Some("00:01:02".into());
        record
    }

    #[test]
    fn test_status_counts_include_every_status() {
        let counts = StatusCounts::from_statuses([
            RecordStatus::Renamed,
            RecordStatus::Renamed,
            RecordStatus::Failed,
        ]);
        assert_eq!(counts.total, 3);
        assert_eq!(counts.count(RecordStatus::Renamed), 2);
        assert_eq!(counts.count(RecordStatus::Pending), 0);
        assert_eq!(counts.by_status.len(), RecordStatus::ALL.len());
    }

    #[test]
    fn test_status_json() {
        let counts = StatusCounts::from_statuses([RecordStatus::Unrecognized]);
        let mut out = Vec::new();
        write_status(&mut out, &counts, OutputFormat::Json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["total"], 1);
        assert_eq!(value["by_status"]["unrecognized"], 1);
    }

    #[test]
    fn test_records_csv_has_header_and_rows() {
        let records = vec![record("a", "01"), record("b", "02")];
        let mut out = Vec::new();
        write_records(&mut out, "Frieren", &records, OutputFormat::Csv).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("source_id,original_name"));
        assert!(lines[1].starts_with("a,a.jpg"));
    }

    #[test]
    fn test_records_human_empty() {
        let mut out = Vec::new();
        write_records(&mut out, "Nothing", &[], OutputFormat::Human).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("No records for 'Nothing'"));
    }
}
