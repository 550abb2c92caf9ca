//! Progress reporting for the CLI
//!
//! The core reports through a channel-backed provider; a separate task renders
//! the updates with indicatif.

pub mod provider;
pub mod renderer;
pub mod utils;

pub use provider::{ChannelProvider, create_progress_infrastructure};
pub use renderer::{ProgressRenderer, render_progress};
pub use utils::format_duration;
