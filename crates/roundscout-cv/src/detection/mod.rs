//! Minimap agent detection

pub mod config;
pub mod detector;
pub mod roster;
pub mod team;

pub use config::{DetectionConfig, TeamColorConfig};
pub use detector::AgentDetector;
pub use roster::UniquenessFilter;
pub use team::TeamClassifier;
