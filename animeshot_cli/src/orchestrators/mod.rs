//! Command orchestrators
//!
//! Orchestrators coordinate between the CLI layer and the core library
//! services.

pub mod catalog_orchestrator;
pub mod rename_orchestrator;

pub use catalog_orchestrator::{CatalogOrchestrator, OutputFormat};
pub use rename_orchestrator::{RenameOrchestrator, RunOptions};
