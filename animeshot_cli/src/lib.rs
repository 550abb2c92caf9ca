//! animeshot CLI library
//!
//! Exposes configuration, error and orchestration modules for the `animeshot`
//! binary and its integration tests.

pub mod config;
pub mod error;
pub mod orchestrators;
pub mod paths;
pub mod progress;
pub mod terminal;
