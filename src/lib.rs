//! Round scouting for tactical shooter match videos.
//!
//! The binary wires [`roundscout_core`] and [`roundscout_cv`] to ffmpeg and
//! tesseract and writes everything it finds into one output directory.

pub mod config;
pub mod logging;
pub mod media;
pub mod output;
pub mod pipeline;

pub use config::{ClusterMethod, Config, ReportFormat};
pub use pipeline::ScoutingEngine;
